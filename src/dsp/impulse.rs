//! Impulse responses and the snapshot store
//!
//! An [`ImpulseResponse`] is immutable once built. Switching IRs never
//! touches a live instance: a new one is decoded off the audio thread and
//! its handle is swapped into the store in one atomic step. Readers that
//! still hold the previous handle keep it alive until they drop it.

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use log::info;
use uuid::Uuid;

use crate::engine::buffer::AudioBuffer;
use crate::engine::io::{decode_bytes, decode_file, DecodedAudio};
use crate::error::LoadError;

/// Longest IR prefix used on the real-time path, in samples
pub const MAX_REALTIME_IR_LENGTH: usize = 4096;

/// Sampled acoustic response of a space
#[derive(Debug, Clone)]
pub struct ImpulseResponse {
    id: Uuid,
    name: String,
    samples: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl ImpulseResponse {
    /// Build an IR from per-channel samples
    ///
    /// # Errors
    /// `InvalidAudio` if there are no channels or the channels differ in length.
    pub fn new(
        name: impl Into<String>,
        samples: Vec<Vec<f32>>,
        sample_rate: u32,
    ) -> std::result::Result<Self, LoadError> {
        let buffer = AudioBuffer::from_channels(samples, sample_rate)?;
        Ok(Self::from_buffer(name, buffer))
    }

    /// Convenience constructor for a single-channel IR
    pub fn mono(name: impl Into<String>, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            samples: vec![samples],
            sample_rate,
        }
    }

    fn from_buffer(name: impl Into<String>, buffer: AudioBuffer) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            sample_rate: buffer.sample_rate,
            samples: buffer.samples,
        }
    }

    fn from_decoded(name: impl Into<String>, decoded: DecodedAudio) -> Self {
        let mut buffer = decoded.buffer;
        buffer.sample_rate = decoded.sample_rate;
        Self::from_buffer(name, buffer)
    }

    /// Unique identity of this instance; a reload gets a new id
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    /// Number of samples per channel
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length used on the real-time path: `min(4096, len)`
    pub fn usable_len(&self) -> usize {
        self.len().min(MAX_REALTIME_IR_LENGTH)
    }

    /// Samples for the IR channel paired with `input_channel`
    ///
    /// Input channels beyond the IR's channel count use the IR's last channel.
    pub fn channel_for(&self, input_channel: usize) -> &[f32] {
        let index = input_channel.min(self.num_channels().saturating_sub(1));
        &self.samples[index]
    }
}

/// Handle to the active impulse response, or none
///
/// Cheap to clone; holding one keeps its IR alive.
#[derive(Debug, Clone, Default)]
pub struct ConvolutionSnapshot(Option<Arc<ImpulseResponse>>);

impl ConvolutionSnapshot {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new(ir: Arc<ImpulseResponse>) -> Self {
        Self(Some(ir))
    }

    pub fn impulse(&self) -> Option<&ImpulseResponse> {
        self.0.as_deref()
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// Identity of the held IR, if any
    pub fn id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|ir| ir.id())
    }
}

impl From<ImpulseResponse> for ConvolutionSnapshot {
    fn from(ir: ImpulseResponse) -> Self {
        Self::new(Arc::new(ir))
    }
}

/// Decodes impulse responses and publishes the active one
///
/// Loading may block the calling thread and must not run on the audio
/// thread. Publishing is a single atomic pointer swap.
#[derive(Debug, Default)]
pub struct ImpulseResponseStore {
    active: ArcSwapOption<ImpulseResponse>,
}

impl ImpulseResponseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an IR from a WAV file
    ///
    /// Nothing is published; a failed load leaves the active snapshot as it was.
    pub fn load_from_file(&self, path: &Path) -> std::result::Result<ImpulseResponse, LoadError> {
        let decoded = decode_file(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(ImpulseResponse::from_decoded(name, decoded))
    }

    /// Decode an IR from an in-memory WAV blob
    pub fn load_from_embedded_asset(
        &self,
        name: &str,
        bytes: &[u8],
    ) -> std::result::Result<ImpulseResponse, LoadError> {
        let decoded = decode_bytes(bytes)?;
        Ok(ImpulseResponse::from_decoded(name, decoded))
    }

    /// Install `ir` as the active snapshot
    ///
    /// The previous IR is released once the last reader holding it lets go.
    pub fn publish(&self, ir: ImpulseResponse) -> ConvolutionSnapshot {
        let ir = Arc::new(ir);
        info!(
            "Publishing impulse response '{}' ({} ch, {} samples, {} used in real time)",
            ir.name(),
            ir.num_channels(),
            ir.len(),
            ir.usable_len()
        );
        self.active.store(Some(Arc::clone(&ir)));
        ConvolutionSnapshot::new(ir)
    }

    /// Remove the active IR; subsequent processing passes audio through
    pub fn clear(&self) {
        self.active.store(None);
    }

    /// Take an owned handle to the active IR (off the audio thread)
    pub fn snapshot(&self) -> ConvolutionSnapshot {
        ConvolutionSnapshot(self.active.load_full())
    }

    /// Borrow the active IR for the duration of `f`
    ///
    /// Lock-free and allocation-free; this is the read used by the audio thread.
    #[inline]
    pub fn with_active<R>(&self, f: impl FnOnce(Option<&ImpulseResponse>) -> R) -> R {
        let guard = self.active.load();
        f(guard.as_deref())
    }
}
