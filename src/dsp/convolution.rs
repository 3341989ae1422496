//! Time-domain FIR convolution
//!
//! Direct-form convolution of audio blocks against an impulse response:
//!
//! ```text
//! out[n] = Σ in[n-k] * ir[k] * NORMALIZATION,  k in [0, irLen), 0 <= n-k < frames
//! ```
//!
//! The full linear result spans `frames + irLen - 1` samples. Only the
//! first `frames` are written back to the block; the tail is discarded at
//! every block boundary and nothing is carried into the next block. On the
//! real-time path this truncation makes long IRs lose energy at block
//! edges, which is the accepted price of a stateless, fixed-latency engine.

use rayon::prelude::*;

use crate::dsp::impulse::{ImpulseResponse, MAX_REALTIME_IR_LENGTH};
use crate::engine::buffer::AudioBlock;

/// Fixed headroom gain applied to every convolved sample
pub const NORMALIZATION: f32 = 0.1;

/// Output samples per rayon task in full-length convolution
const PARALLEL_CHUNK: usize = 4096;

/// How much of the impulse response to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrLength {
    /// `min(4096, len)` samples; the real-time setting
    Realtime,
    /// Every sample of the IR; for offline rendering
    Full,
}

impl IrLength {
    fn resolve(self, ir: &ImpulseResponse) -> usize {
        match self {
            IrLength::Realtime => ir.usable_len(),
            IrLength::Full => ir.len(),
        }
    }
}

/// Convolves blocks against an impulse response using pre-sized scratch
///
/// The scratch buffer is allocated once, at construction, for the largest
/// block and IR the engine will ever see. [`ConvolutionEngine::process`]
/// never allocates. An [`IrLength::Full`] engine spreads each channel over
/// the rayon pool and is meant for offline rendering only.
#[derive(Debug, Clone)]
pub struct ConvolutionEngine {
    scratch: Vec<f32>,
    max_block_size: usize,
    max_ir_length: usize,
    ir_length: IrLength,
}

impl ConvolutionEngine {
    /// Engine for the real-time path
    ///
    /// # Arguments
    /// * `max_block_size` - Largest number of frames passed to `process`
    pub fn realtime(max_block_size: usize) -> Self {
        Self::with_capacity(max_block_size, MAX_REALTIME_IR_LENGTH, IrLength::Realtime)
    }

    /// Engine that uses the whole IR, sized for one block of `frames` frames
    pub fn full_length(frames: usize, ir: &ImpulseResponse) -> Self {
        Self::with_capacity(frames, ir.len(), IrLength::Full)
    }

    pub fn with_capacity(max_block_size: usize, max_ir_length: usize, ir_length: IrLength) -> Self {
        Self {
            scratch: vec![0.0; max_block_size + max_ir_length],
            max_block_size,
            max_ir_length,
            ir_length,
        }
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    pub fn max_ir_length(&self) -> usize {
        self.max_ir_length
    }

    /// Allocated scratch length, in samples
    pub fn scratch_capacity(&self) -> usize {
        self.scratch.capacity()
    }

    /// Convolve `block` in place against `ir`
    ///
    /// With no IR, or an IR of length 0, the block is left untouched. Each
    /// input channel uses IR channel `min(channel, irChannels - 1)`. The
    /// block keeps its shape.
    ///
    /// # Panics
    /// Panics if the block or resolved IR length exceeds the capacity the
    /// engine was built with.
    pub fn process(&mut self, block: &mut AudioBlock<'_>, ir: Option<&ImpulseResponse>) {
        let ir = match ir {
            Some(ir) if !ir.is_empty() => ir,
            _ => return,
        };

        let frames = block.num_frames();
        if frames == 0 {
            return;
        }

        let ir_len = self.ir_length.resolve(ir);
        assert!(
            frames <= self.max_block_size && ir_len <= self.max_ir_length,
            "convolution block exceeds configured capacity"
        );

        let out_len = frames + ir_len - 1;
        for ch in 0..block.num_channels() {
            let kernel = &ir.channel_for(ch)[..ir_len];
            let out = &mut self.scratch[..out_len];
            match self.ir_length {
                IrLength::Realtime => convolve_range(block.channel(ch), kernel, out, 0),
                IrLength::Full => convolve_parallel(block.channel(ch), kernel, out),
            }
            block.channel_mut(ch).copy_from_slice(&out[..frames]);
        }
    }
}

/// Split the output into ranges and convolve them on the rayon pool
fn convolve_parallel(input: &[f32], ir: &[f32], out: &mut [f32]) {
    out.par_chunks_mut(PARALLEL_CHUNK)
        .enumerate()
        .for_each(|(i, chunk)| convolve_range(input, ir, chunk, i * PARALLEL_CHUNK));
}

/// Compute `out[j] = y[start + j]` of the normalized linear convolution
#[inline]
fn convolve_range(input: &[f32], ir: &[f32], out: &mut [f32], start: usize) {
    let frames = input.len();
    for (j, sample) in out.iter_mut().enumerate() {
        let n = start + j;
        let k_min = (n + 1).saturating_sub(frames);
        let k_max = n.min(ir.len() - 1);

        let mut acc = 0.0_f32;
        for k in k_min..=k_max {
            acc += input[n - k] * ir[k];
        }
        *sample = acc * NORMALIZATION;
    }
}
