//! Audio file I/O for Convoplay
//!
//! Decodes WAV files (from disk or from an in-memory blob) into
//! non-interleaved 32-bit float buffers and writes rendered buffers back out.
//! No sample rate conversion happens here: the source rate travels with the
//! decoded audio and callers decide what to do with it.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;

use crate::engine::buffer::AudioBuffer;
use crate::error::{ConvoError, LoadError, Result};

/// Fully decoded audio plus its native sample rate
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub buffer: AudioBuffer,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn num_channels(&self) -> usize {
        self.buffer.num_channels()
    }

    pub fn num_frames(&self) -> usize {
        self.buffer.num_frames()
    }
}

/// Decode a WAV file from disk
///
/// # Errors
/// * `FileNotFound` - If the path does not exist
/// * `Io` - If the file cannot be opened or read
/// * `UnsupportedFormat` - If the file is not a WAV file or uses an unsupported encoding
/// * `InvalidAudio` - If the sample data is truncated or corrupt
pub fn decode_file(path: &Path) -> std::result::Result<DecodedAudio, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let file = File::open(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let reader = WavReader::new(BufReader::new(file))
        .map_err(|e| header_error(e, &path.display().to_string()))?;
    let decoded = decode_reader(reader)?;

    debug!(
        "Decoded {}: {} ch, {} frames @ {} Hz",
        path.display(),
        decoded.num_channels(),
        decoded.num_frames(),
        decoded.sample_rate
    );

    Ok(decoded)
}

/// Decode a WAV file held in memory (e.g. an embedded asset)
pub fn decode_bytes(bytes: &[u8]) -> std::result::Result<DecodedAudio, LoadError> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| header_error(e, "<memory>"))?;
    decode_reader(reader)
}

/// Write a buffer to a WAV file
///
/// # Arguments
/// * `buffer` - Audio to write; its `sample_rate` is used for the file header
/// * `path` - Destination path
/// * `bit_depth` - 16, 24 (integer) or 32 (float)
pub fn export_wav(buffer: &AudioBuffer, path: &Path, bit_depth: u16) -> Result<()> {
    let spec = wav_spec(buffer, bit_depth)?;
    let writer = WavWriter::create(path, spec).map_err(hound_to_io)?;
    write_samples(writer, buffer, bit_depth)
}

/// Encode a buffer as an in-memory WAV file
pub fn encode_wav_bytes(buffer: &AudioBuffer, bit_depth: u16) -> Result<Vec<u8>> {
    let spec = wav_spec(buffer, bit_depth)?;
    let mut cursor = Cursor::new(Vec::new());
    {
        let writer = WavWriter::new(&mut cursor, spec).map_err(hound_to_io)?;
        write_samples(writer, buffer, bit_depth)?;
    }
    Ok(cursor.into_inner())
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn decode_reader<R: Read>(reader: WavReader<R>) -> std::result::Result<DecodedAudio, LoadError> {
    let spec = reader.spec();
    let channels = spec.channels as usize;

    if channels == 0 {
        return Err(LoadError::UnsupportedFormat {
            format: "WAV file declares zero channels".to_string(),
        });
    }

    let interleaved = read_samples_as_f32(reader, spec)?;
    let buffer = AudioBuffer::from_interleaved(&interleaved, channels, spec.sample_rate);

    Ok(DecodedAudio {
        buffer,
        sample_rate: spec.sample_rate,
    })
}

/// Read samples from a WAV reader and convert to f32 in [-1, 1)
fn read_samples_as_f32<R: Read>(
    reader: WavReader<R>,
    spec: WavSpec,
) -> std::result::Result<Vec<f32>, LoadError> {
    match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => collect_samples::<R, f32>(reader, |v| v),
        (SampleFormat::Int, 8) => collect_samples::<R, i8>(reader, |v| v as f32 / 128.0),
        (SampleFormat::Int, 16) => collect_samples::<R, i16>(reader, |v| v as f32 / 32768.0),
        // 24-bit stored as i32 in hound
        (SampleFormat::Int, 24) => collect_samples::<R, i32>(reader, |v| v as f32 / 8388608.0),
        (SampleFormat::Int, 32) => {
            collect_samples::<R, i32>(reader, |v| (v as f64 / 2147483648.0) as f32)
        }
        (format, bits) => Err(LoadError::UnsupportedFormat {
            format: format!("{}-bit {:?} samples", bits, format),
        }),
    }
}

fn collect_samples<R: Read, S: hound::Sample>(
    reader: WavReader<R>,
    convert: impl Fn(S) -> f32,
) -> std::result::Result<Vec<f32>, LoadError> {
    reader
        .into_samples::<S>()
        .map(|s| s.map(&convert))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|e| LoadError::InvalidAudio {
            reason: format!("Failed to read samples: {}", e),
            source: Some(Box::new(e)),
        })
}

/// Map a header-parsing failure onto the load error taxonomy
///
/// A header that ends early is as good as no header at all, so it counts as
/// an unsupported format rather than an I/O fault.
fn header_error(err: hound::Error, origin: &str) -> LoadError {
    match err {
        hound::Error::IoError(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
            LoadError::UnsupportedFormat {
                format: format!("{}: truncated or missing WAV header", origin),
            }
        }
        hound::Error::IoError(io) => LoadError::Io {
            path: origin.to_string(),
            source: io,
        },
        hound::Error::FormatError(reason) => LoadError::UnsupportedFormat {
            format: format!("{}: {}", origin, reason),
        },
        hound::Error::Unsupported => LoadError::UnsupportedFormat {
            format: format!("{}: unsupported WAV feature", origin),
        },
        other => LoadError::InvalidAudio {
            reason: format!("{}: {}", origin, other),
            source: Some(Box::new(other)),
        },
    }
}

fn wav_spec(buffer: &AudioBuffer, bit_depth: u16) -> Result<WavSpec> {
    if !matches!(bit_depth, 16 | 24 | 32) {
        return Err(ConvoError::InvalidParameter {
            param: "bit_depth".to_string(),
            value: bit_depth.to_string(),
            expected: "16, 24 or 32".to_string(),
        });
    }

    Ok(WavSpec {
        channels: buffer.num_channels() as u16,
        sample_rate: buffer.sample_rate,
        bits_per_sample: bit_depth,
        sample_format: if bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    })
}

fn write_samples<W: Write + Seek>(
    mut writer: WavWriter<W>,
    buffer: &AudioBuffer,
    bit_depth: u16,
) -> Result<()> {
    for sample in buffer.to_interleaved() {
        match bit_depth {
            16 => {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled).map_err(hound_to_io)?;
            }
            24 => {
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled).map_err(hound_to_io)?;
            }
            _ => writer.write_sample(sample).map_err(hound_to_io)?,
        }
    }

    writer.finalize().map_err(hound_to_io)?;
    Ok(())
}

fn hound_to_io(err: hound::Error) -> ConvoError {
    match err {
        hound::Error::IoError(io) => ConvoError::Io(io),
        other => ConvoError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            other.to_string(),
        )),
    }
}

// ============================================================================
// Tests
// ============================================================================
