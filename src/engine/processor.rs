//! Real-time processing boundary
//!
//! `RealtimeProcessor` is what an audio device callback drives. Each call
//! pulls a block from the source graph, convolves it when the reverb is
//! enabled, and hands it to an output sink. The call never allocates,
//! locks, logs or blocks; all storage is sized at construction.
//!
//! Shared state with the rest of the program is limited to [`EngineState`]:
//! an atomic enable flag and the atomically swapped IR snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::info;

use crate::dsp::{ConvolutionEngine, ConvolutionSnapshot, ImpulseResponse, ImpulseResponseStore};
use crate::engine::buffer::{AudioBlock, AudioBuffer};
use crate::engine::transport::{AudioSourceGraph, TransportHandle};

// ============================================================================
// Shared engine state
// ============================================================================

/// State read by the audio thread and written by everyone else
#[derive(Debug, Default)]
pub struct EngineState {
    enabled: AtomicBool,
    store: Arc<ImpulseResponseStore>,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State publishing through an existing store
    pub fn with_store(store: Arc<ImpulseResponseStore>) -> Self {
        Self {
            enabled: AtomicBool::new(false),
            store,
        }
    }

    /// Turn the reverb on or off; takes effect at the next block boundary
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn store(&self) -> &Arc<ImpulseResponseStore> {
        &self.store
    }

    /// Publish a new impulse response
    pub fn publish(&self, ir: ImpulseResponse) -> ConvolutionSnapshot {
        self.store.publish(ir)
    }

    pub fn snapshot(&self) -> ConvolutionSnapshot {
        self.store.snapshot()
    }
}

// ============================================================================
// Output sinks
// ============================================================================

/// Destination for processed blocks
pub trait OutputSink {
    /// Receive one processed block; must not hold on to it
    fn write_block(&mut self, block: &AudioBlock<'_>);
}

/// Writes blocks into an interleaved device buffer
///
/// Successive blocks are written one after another. Frames that would run
/// past the end of the buffer are dropped.
#[derive(Debug)]
pub struct InterleavedSink<'a> {
    out: &'a mut [f32],
    channels: usize,
    frame: usize,
}

impl<'a> InterleavedSink<'a> {
    pub fn new(out: &'a mut [f32], channels: usize) -> Self {
        Self {
            out,
            channels: channels.max(1),
            frame: 0,
        }
    }

    /// Frames written so far
    pub fn frames_written(&self) -> usize {
        self.frame
    }
}

impl OutputSink for InterleavedSink<'_> {
    fn write_block(&mut self, block: &AudioBlock<'_>) {
        let capacity = self.out.len() / self.channels;
        let frames = block.num_frames().min(capacity.saturating_sub(self.frame));
        let shared = block.num_channels().min(self.channels);

        for i in 0..frames {
            let base = (self.frame + i) * self.channels;
            for ch in 0..self.channels {
                self.out[base + ch] = if ch < shared {
                    block.channel(ch)[i]
                } else {
                    0.0
                };
            }
        }
        self.frame += frames;
    }
}

/// Collects every block into a growing buffer
///
/// Allocates; for offline rendering and tests, not for a device callback.
#[derive(Debug, Clone)]
pub struct BufferSink {
    buffer: AudioBuffer,
}

impl BufferSink {
    pub fn new(num_channels: usize, sample_rate: u32) -> Self {
        Self {
            buffer: AudioBuffer::new(num_channels, 0, sample_rate),
        }
    }

    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }

    pub fn into_buffer(self) -> AudioBuffer {
        self.buffer
    }
}

impl OutputSink for BufferSink {
    fn write_block(&mut self, block: &AudioBlock<'_>) {
        for (ch, dest) in self.buffer.samples.iter_mut().enumerate() {
            if ch < block.num_channels() {
                dest.extend_from_slice(block.channel(ch));
            } else {
                dest.resize(dest.len() + block.num_frames(), 0.0);
            }
        }
    }
}

// ============================================================================
// Realtime processor
// ============================================================================

/// Whether a source is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Idle,
    Running,
}

/// The audio-callback side of the player
pub struct RealtimeProcessor {
    state: Arc<EngineState>,
    graph: AudioSourceGraph,
    engine: ConvolutionEngine,
    block: Vec<Vec<f32>>,
    max_block_size: usize,
}

impl RealtimeProcessor {
    /// Build a processor with storage for `output_channels × max_block_size`
    pub fn new(state: Arc<EngineState>, output_channels: usize, max_block_size: usize) -> Self {
        let output_channels = output_channels.max(1);
        let max_block_size = max_block_size.max(1);
        Self {
            state,
            graph: AudioSourceGraph::new(),
            engine: ConvolutionEngine::realtime(max_block_size),
            block: vec![vec![0.0; max_block_size]; output_channels],
            max_block_size,
        }
    }

    /// Attach a decoded stream
    ///
    /// Takes `&mut self`: the device callback that owns this processor must
    /// be stopped while sources change.
    pub fn attach_source(&mut self, stream: AudioBuffer, sample_rate: u32) {
        info!(
            "Attaching source: {} ch, {:.2}s @ {} Hz",
            stream.num_channels(),
            stream.num_frames() as f64 / sample_rate.max(1) as f64,
            sample_rate
        );
        self.graph.attach_source(stream, sample_rate);
    }

    pub fn detach_source(&mut self) -> Option<AudioBuffer> {
        self.graph.detach_source()
    }

    pub fn processor_state(&self) -> ProcessorState {
        if self.graph.has_source() {
            ProcessorState::Running
        } else {
            ProcessorState::Idle
        }
    }

    pub fn transport(&self) -> TransportHandle {
        self.graph.handle()
    }

    pub fn graph(&self) -> &AudioSourceGraph {
        &self.graph
    }

    pub fn engine_state(&self) -> &Arc<EngineState> {
        &self.state
    }

    pub fn num_channels(&self) -> usize {
        self.block.len()
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    /// Produce `num_frames` frames and send them to `sink`
    ///
    /// Requests longer than the configured maximum are split into several
    /// blocks. While idle the sink receives silence.
    pub fn process_block<S: OutputSink + ?Sized>(&mut self, num_frames: usize, sink: &mut S) {
        let running = self.graph.has_source();
        let mut remaining = num_frames;

        while remaining > 0 {
            let frames = remaining.min(self.max_block_size);
            let mut block = AudioBlock::new(&mut self.block, frames);

            if running {
                self.graph.pull(&mut block);
                if self.state.is_enabled() {
                    let engine = &mut self.engine;
                    self.state
                        .store()
                        .with_active(|ir| engine.process(&mut block, ir));
                }
            } else {
                block.clear();
            }

            sink.write_block(&block);
            remaining -= frames;
        }
    }

    /// Device-callback entry point: fill an interleaved output buffer
    pub fn render_interleaved(&mut self, out: &mut [f32]) {
        let channels = self.num_channels();
        let frames = out.len() / channels;
        let mut sink = InterleavedSink::new(out, channels);
        self.process_block(frames, &mut sink);
    }

    #[cfg(test)]
    fn storage_fingerprint(&self) -> (Vec<*const f32>, usize) {
        (
            self.block.iter().map(|ch| ch.as_ptr()).collect(),
            self.engine.scratch_capacity(),
        )
    }
}
