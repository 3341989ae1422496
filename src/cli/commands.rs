//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use log::{debug, info};

use crate::config::PlayerConfig;
use crate::context::PlayerContext;
use crate::dsp::{IrCatalog, LoadEvent};
use crate::engine::{
    calculate_peak, calculate_rms, decode_file, export_wav, AudioBuffer, BufferSink, PreviewEvent,
};

const WORKER_TIMEOUT: Duration = Duration::from_secs(60);
const OUTPUT_BIT_DEPTH: u16 = 24;

/// Peak and RMS of `buffer`, formatted for display
fn level_summary(buffer: &AudioBuffer) -> String {
    format!(
        "peak {:.1} dBFS, RMS {:.1} dBFS",
        calculate_peak(buffer),
        calculate_rms(buffer)
    )
}

/// Load `selection` through the background loader and wait until it is active.
fn activate_impulse(context: &PlayerContext, selection: &str) -> anyhow::Result<()> {
    let requested = context.select_impulse(selection)?;

    loop {
        let event = context
            .loader()
            .wait_event(WORKER_TIMEOUT)
            .ok_or_else(|| anyhow!("timed out loading impulse response '{}'", selection))?;
        if event.generation() != requested {
            continue;
        }
        return match event {
            LoadEvent::Published {
                name,
                channels,
                frames,
                ..
            } => {
                println!("Impulse response: {} ({} ch, {} frames)", name, channels, frames);
                Ok(())
            }
            LoadEvent::Failed { error, .. } => Err(anyhow::Error::new(error)
                .context(format!("failed to load impulse response '{}'", selection))),
            LoadEvent::Superseded { .. } => bail!("impulse response request was superseded"),
        };
    }
}

/// Play `input` through the real-time processor, block by block, into a WAV file.
pub fn render(
    config: PlayerConfig,
    input: &Path,
    ir: Option<&str>,
    output: &Path,
    block_size: Option<usize>,
    loops: u32,
) -> anyhow::Result<()> {
    if loops == 0 {
        bail!("--loops must be at least 1");
    }
    let block_size = block_size.unwrap_or(config.block_size);
    let config = PlayerConfig {
        block_size,
        max_block_size: config.max_block_size.max(block_size),
        looping: loops > 1,
        reverb_enabled: ir.is_some(),
        ..config
    };
    let context = PlayerContext::new(config)?;

    if let Some(selection) = ir {
        activate_impulse(&context, selection)?;
    }

    let decoded =
        decode_file(input).with_context(|| format!("failed to decode {}", input.display()))?;
    let sample_rate = decoded.sample_rate;
    let total_frames = decoded.num_frames() * loops as usize;
    info!(
        "Rendering {} ({} frames x {} passes, block {})",
        input.display(),
        decoded.num_frames(),
        loops,
        block_size
    );

    let mut processor = context.build_processor();
    processor.attach_source(decoded.buffer, sample_rate);
    let transport = processor.transport();
    transport.play();

    let mut sink = BufferSink::new(processor.num_channels(), sample_rate);
    let mut rendered = 0;
    while rendered < total_frames {
        let frames = block_size.min(total_frames - rendered);
        processor.process_block(frames, &mut sink);
        rendered += frames;
    }
    transport.stop();
    debug!("Rendered {} frames", rendered);

    let buffer = sink.into_buffer();
    export_wav(&buffer, output, OUTPUT_BIT_DEPTH)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "Rendered {:.2}s to {} ({})",
        buffer.duration_secs(),
        output.display(),
        level_summary(&buffer)
    );
    Ok(())
}

/// Render `input` with the whole impulse response via the preview worker.
pub fn preview(
    config: PlayerConfig,
    input: &Path,
    ir: &str,
    output: &Path,
) -> anyhow::Result<()> {
    let context = PlayerContext::new(config)?;
    activate_impulse(&context, ir)?;

    let requested = context.request_preview(input)?;
    loop {
        let event = context
            .preview()
            .wait_event(WORKER_TIMEOUT)
            .ok_or_else(|| anyhow!("timed out rendering preview of {}", input.display()))?;
        if event.generation() != requested {
            continue;
        }
        match event {
            PreviewEvent::Ready {
                buffer,
                sample_rate,
                ..
            } => {
                export_wav(&buffer, output, OUTPUT_BIT_DEPTH)
                    .with_context(|| format!("failed to write {}", output.display()))?;
                println!(
                    "Preview of {:.2}s at {} Hz written to {}",
                    buffer.duration_secs(),
                    sample_rate,
                    output.display()
                );
                return Ok(());
            }
            PreviewEvent::Failed { error, .. } => {
                return Err(anyhow::Error::new(error)
                    .context(format!("failed to render preview of {}", input.display())));
            }
        }
    }
}

/// Print the impulse-response catalog.
pub fn list_irs(config: &PlayerConfig, dir: Option<&Path>) -> anyhow::Result<()> {
    let mut catalog = IrCatalog::builtin();
    if let Some(configured) = &config.ir_directory {
        catalog.scan_dir(configured)?;
    }
    if let Some(dir) = dir {
        let added = catalog.scan_dir(dir)?;
        debug!("{} impulse responses found in {}", added, dir.display());
    }

    println!("Impulse responses:");
    println!("{:-<60}", "");
    for (i, entry) in catalog.entries().iter().enumerate() {
        println!("{:>3}. {:<20} {}", i + 1, entry.name, entry.source);
    }
    println!("{:-<60}", "");
    println!("{} available", catalog.len());

    Ok(())
}

/// Decode a file and print its shape.
pub fn info(path: &Path) -> anyhow::Result<()> {
    let decoded =
        decode_file(path).with_context(|| format!("failed to decode {}", path.display()))?;
    let buffer = &decoded.buffer;

    println!("File:        {}", path.display());
    println!("Channels:    {}", decoded.num_channels());
    println!("Frames:      {}", decoded.num_frames());
    println!("Sample rate: {} Hz", decoded.sample_rate);
    println!("Duration:    {:.3}s", buffer.duration_secs());
    println!("Level:       {}", level_summary(buffer));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_summary_reports_dbfs() {
        let buffer = AudioBuffer::from_channels(vec![vec![0.5, -0.5, 0.5, -0.5]], 48000).unwrap();
        assert_eq!(level_summary(&buffer), "peak -6.0 dBFS, RMS -6.0 dBFS");
    }

    #[test]
    fn test_level_summary_of_silence() {
        let buffer = AudioBuffer::new(2, 16, 48000);
        assert_eq!(level_summary(&buffer), "peak -inf dBFS, RMS -inf dBFS");
    }
}
