//! Audio Buffer Management
//!
//! Provides the owned audio buffer used for decoded files and previews, and
//! the borrowed fixed-shape block view used on the real-time path.

use crate::error::LoadError;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert linear amplitude to decibels
///
/// # Returns
/// Value in decibels. Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Calculate the RMS level of an audio buffer in dB
///
/// Returns -f32::INFINITY for empty or silent buffers.
pub fn calculate_rms(buffer: &AudioBuffer) -> f32 {
    let total_samples = buffer.num_channels() * buffer.num_frames();
    if total_samples == 0 {
        return f32::NEG_INFINITY;
    }

    let sum_squares: f64 = buffer
        .samples
        .iter()
        .flat_map(|channel| channel.iter())
        .map(|&s| (s as f64) * (s as f64))
        .sum();

    let rms = (sum_squares / total_samples as f64).sqrt() as f32;
    linear_to_db(rms)
}

/// Calculate the peak level of an audio buffer in dB
pub fn calculate_peak(buffer: &AudioBuffer) -> f32 {
    let peak = buffer
        .samples
        .iter()
        .flat_map(|channel| channel.iter())
        .map(|&s| s.abs())
        .fold(0.0_f32, f32::max);

    linear_to_db(peak)
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Owned, non-interleaved 32-bit float audio
///
/// Each channel is a separate `Vec<f32>`; all channels have the same length.
///
/// # Example
/// ```
/// use convoplay::engine::AudioBuffer;
///
/// let buffer = AudioBuffer::new(2, 48000, 48000);
/// assert_eq!(buffer.num_channels(), 2);
/// assert_eq!(buffer.num_frames(), 48000);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is frames
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a zero-filled buffer of the given shape
    pub fn new(num_channels: usize, num_frames: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0_f32; num_frames]; num_channels],
            sample_rate,
        }
    }

    /// Build a buffer from per-channel sample vectors
    ///
    /// # Errors
    /// `InvalidAudio` if there are no channels or the channels differ in length.
    pub fn from_channels(
        samples: Vec<Vec<f32>>,
        sample_rate: u32,
    ) -> std::result::Result<Self, LoadError> {
        if samples.is_empty() {
            return Err(LoadError::InvalidAudio {
                reason: "audio must have at least one channel".to_string(),
                source: None,
            });
        }

        let frames = samples[0].len();
        if samples.iter().any(|ch| ch.len() != frames) {
            return Err(LoadError::InvalidAudio {
                reason: "all channels must have the same length".to_string(),
                source: None,
            });
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create a buffer from interleaved sample data
    ///
    /// Trailing samples that do not form a whole frame are dropped.
    pub fn from_interleaved(interleaved: &[f32], num_channels: usize, sample_rate: u32) -> Self {
        let num_channels = num_channels.max(1);
        let num_frames = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_frames); num_channels];

        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Self {
            samples,
            sample_rate,
        }
    }

    /// Convert the buffer to interleaved format (L, R, L, R, ... for stereo)
    pub fn to_interleaved(&self) -> Vec<f32> {
        let num_channels = self.num_channels();
        let num_frames = self.num_frames();
        let mut interleaved = Vec::with_capacity(num_channels * num_frames);

        for frame in 0..num_frames {
            for channel in &self.samples {
                interleaved.push(channel[frame]);
            }
        }

        interleaved
    }

    /// Get the number of channels
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of frames (samples per channel)
    #[inline]
    pub fn num_frames(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer holds no frames
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_frames() == 0
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_frames() as f64 / self.sample_rate as f64
    }

    /// Get immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Get mutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }

    /// Borrow the whole buffer as a processing block
    pub fn as_block(&mut self) -> AudioBlock<'_> {
        let frames = self.num_frames();
        AudioBlock::new(&mut self.samples, frames)
    }

    /// Check if all samples are finite (not NaN or Infinity)
    pub fn is_finite(&self) -> bool {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .all(|s| s.is_finite())
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::new(2, 0, 48000)
    }
}

// ============================================================================
// Audio Block
// ============================================================================

/// Borrowed view of `channels × frames` samples
///
/// The backing channel vectors may be longer than `frames` (they are sized
/// for the largest block at configuration time); only the first `frames`
/// samples of each channel belong to the block. Creating, reading and
/// writing a block never allocates.
#[derive(Debug)]
pub struct AudioBlock<'a> {
    channels: &'a mut [Vec<f32>],
    frames: usize,
}

impl<'a> AudioBlock<'a> {
    /// Wrap pre-allocated channel storage
    ///
    /// # Panics
    /// Panics if any channel is shorter than `frames`.
    pub fn new(channels: &'a mut [Vec<f32>], frames: usize) -> Self {
        assert!(
            channels.iter().all(|ch| ch.len() >= frames),
            "block storage shorter than requested frame count"
        );
        Self { channels, frames }
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.frames
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index][..self.frames]
    }

    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        let frames = self.frames;
        &mut self.channels[index][..frames]
    }

    /// Zero every sample in the block
    pub fn clear(&mut self) {
        let frames = self.frames;
        for channel in self.channels.iter_mut() {
            channel[..frames].fill(0.0);
        }
    }

    /// Read one frame's sample from a channel
    #[inline]
    pub fn get(&self, channel: usize, frame: usize) -> Option<f32> {
        if frame >= self.frames {
            return None;
        }
        self.channels.get(channel).map(|ch| ch[frame])
    }
}

// ============================================================================
// Tests
// ============================================================================
