//! Transport and audio source graph
//!
//! `AudioSourceGraph` wraps a decoded stream with play/stop/seek/loop and
//! supplies raw blocks to the real-time processor. The transport flags and
//! play position live in atomics shared with any number of
//! [`TransportHandle`]s, so non-real-time threads can drive and observe
//! playback while the audio thread pulls blocks without locking.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;

use crate::engine::buffer::{AudioBlock, AudioBuffer};

/// Transport states representing the current playback mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Stopped => write!(f, "Stopped"),
            TransportState::Playing => write!(f, "Playing"),
        }
    }
}

const NO_SEEK: u64 = u64::MAX;

/// Lock-free transport state shared between the graph and its handles
#[derive(Debug)]
struct TransportShared {
    playing: AtomicBool,
    looping: AtomicBool,
    /// Next frame to be read from the source
    position: AtomicU64,
    /// Seek target not yet picked up by `pull`, or `NO_SEEK`
    pending_seek: AtomicU64,
    /// Total source length in frames (0 when no source is attached)
    length: AtomicU64,
    sample_rate: AtomicU32,
}

impl Default for TransportShared {
    fn default() -> Self {
        Self {
            playing: AtomicBool::new(false),
            looping: AtomicBool::new(false),
            position: AtomicU64::new(0),
            pending_seek: AtomicU64::new(NO_SEEK),
            length: AtomicU64::new(0),
            sample_rate: AtomicU32::new(0),
        }
    }
}

impl TransportShared {
    fn play(&self) {
        if self.playing.swap(true, Ordering::AcqRel) {
            debug!("[TRANSPORT] Already playing");
        } else {
            debug!("[TRANSPORT] Play from frame {}", self.position());
        }
    }

    fn stop(&self) {
        if self.playing.swap(false, Ordering::AcqRel) {
            debug!("[TRANSPORT] Stopped at frame {}", self.position());
        } else {
            debug!("[TRANSPORT] Already stopped");
        }
    }

    fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::Release);
    }

    fn seek(&self, seconds: f64) {
        let rate = self.sample_rate.load(Ordering::Acquire);
        let length = self.length.load(Ordering::Acquire);
        let frame = ((seconds.max(0.0) * rate as f64) as u64).min(length);
        self.pending_seek.store(frame, Ordering::SeqCst);
        self.position.store(frame, Ordering::SeqCst);
    }

    /// Move the cursor without going through a seek request
    fn reset(&self, frame: u64) {
        self.pending_seek.store(NO_SEEK, Ordering::SeqCst);
        self.position.store(frame, Ordering::SeqCst);
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::Acquire)
    }

    fn current_position(&self) -> f64 {
        let rate = self.sample_rate.load(Ordering::Acquire);
        if rate == 0 {
            return 0.0;
        }
        self.position() as f64 / rate as f64
    }

    fn state(&self) -> TransportState {
        if self.playing.load(Ordering::Acquire) {
            TransportState::Playing
        } else {
            TransportState::Stopped
        }
    }
}

/// Cloneable remote control for an [`AudioSourceGraph`]
///
/// Safe to use from any thread while the graph is being pulled on the audio
/// thread.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    shared: Arc<TransportShared>,
}

impl TransportHandle {
    /// Start playback; no-op when already playing
    pub fn play(&self) {
        self.shared.play();
    }

    /// Stop playback, keeping the position; no-op when already stopped
    pub fn stop(&self) {
        self.shared.stop();
    }

    pub fn set_looping(&self, looping: bool) {
        self.shared.set_looping(looping);
    }

    pub fn is_looping(&self) -> bool {
        self.shared.looping.load(Ordering::Acquire)
    }

    /// Move the play position, clamped to `[0, length]`
    pub fn seek(&self, seconds: f64) {
        self.shared.seek(seconds);
    }

    /// Current play position in seconds
    pub fn current_position(&self) -> f64 {
        self.shared.current_position()
    }

    pub fn state(&self) -> TransportState {
        self.shared.state()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == TransportState::Playing
    }

    /// Length of the attached source in seconds
    pub fn length_secs(&self) -> f64 {
        let rate = self.shared.sample_rate.load(Ordering::Acquire);
        if rate == 0 {
            return 0.0;
        }
        self.shared.length.load(Ordering::Acquire) as f64 / rate as f64
    }
}

/// Decoded stream plus transport
///
/// Attaching or detaching a source requires `&mut self`; whoever owns the
/// graph (normally the real-time processor) must therefore not be running a
/// callback at the same time.
#[derive(Debug, Default)]
pub struct AudioSourceGraph {
    source: Option<AudioBuffer>,
    shared: Arc<TransportShared>,
}

impl AudioSourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a handle for driving the transport from another thread
    pub fn handle(&self) -> TransportHandle {
        TransportHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Attach a decoded stream, replacing any previous one
    ///
    /// Playback stops and the position rewinds to the start; the loop flag
    /// is preserved.
    pub fn attach_source(&mut self, stream: AudioBuffer, sample_rate: u32) {
        let mut stream = stream;
        stream.sample_rate = sample_rate;

        self.shared.playing.store(false, Ordering::Release);
        self.shared.reset(0);
        self.shared
            .length
            .store(stream.num_frames() as u64, Ordering::Release);
        self.shared.sample_rate.store(sample_rate, Ordering::Release);

        debug!(
            "[TRANSPORT] Source attached: {} ch, {} frames @ {} Hz",
            stream.num_channels(),
            stream.num_frames(),
            sample_rate
        );
        self.source = Some(stream);
    }

    /// Detach and return the current source
    pub fn detach_source(&mut self) -> Option<AudioBuffer> {
        self.shared.playing.store(false, Ordering::Release);
        self.shared.reset(0);
        self.shared.length.store(0, Ordering::Release);
        self.source.take()
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn source(&self) -> Option<&AudioBuffer> {
        self.source.as_ref()
    }

    pub fn play(&self) {
        self.shared.play();
    }

    pub fn stop(&self) {
        self.shared.stop();
    }

    pub fn set_looping(&self, looping: bool) {
        self.shared.set_looping(looping);
    }

    pub fn seek(&self, seconds: f64) {
        self.shared.seek(seconds);
    }

    pub fn current_position(&self) -> f64 {
        self.shared.current_position()
    }

    pub fn state(&self) -> TransportState {
        self.shared.state()
    }

    /// Fill `block` with the next frames of the source
    ///
    /// Called on the real-time thread: no allocation, locking or logging.
    /// Output channels beyond the source's channel count reuse the last
    /// source channel. When stopped, or with no source, the block is
    /// silent. At end-of-stream a looping graph continues from frame 0
    /// within the same block; otherwise the remainder is silent, playback
    /// stops and the position rewinds to 0. A seek issued while a block is
    /// being pulled takes effect at the next block.
    pub fn pull(&mut self, block: &mut AudioBlock<'_>) {
        let source = match &self.source {
            Some(source) if self.shared.playing.load(Ordering::Acquire) => source,
            _ => {
                block.clear();
                return;
            }
        };

        let length = source.num_frames();
        let frames = block.num_frames();
        let src_channels = source.num_channels();
        let seek = self.shared.pending_seek.swap(NO_SEEK, Ordering::SeqCst);
        let start = if seek == NO_SEEK {
            self.shared.position.load(Ordering::SeqCst)
        } else {
            seek
        };
        let mut position = (start as usize).min(length);
        let mut written = 0;

        while written < frames {
            if position >= length {
                if self.shared.looping.load(Ordering::Acquire) && length > 0 {
                    position = 0;
                } else {
                    for ch in 0..block.num_channels() {
                        block.channel_mut(ch)[written..].fill(0.0);
                    }
                    self.shared.playing.store(false, Ordering::Release);
                    position = 0;
                    break;
                }
            }

            let count = (frames - written).min(length - position);
            for ch in 0..block.num_channels() {
                let src = source.channel(ch.min(src_channels - 1));
                block.channel_mut(ch)[written..written + count]
                    .copy_from_slice(&src[position..position + count]);
            }
            written += count;
            position += count;
        }

        if position >= length && !self.shared.looping.load(Ordering::Acquire) {
            self.shared.playing.store(false, Ordering::Release);
            position = 0;
        }

        self.shared.position.store(position as u64, Ordering::SeqCst);
        // A seek that landed during this block wins over the cursor above
        let seek = self.shared.pending_seek.load(Ordering::SeqCst);
        if seek != NO_SEEK {
            self.shared.position.store(seek, Ordering::SeqCst);
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn source(frames: &[f32]) -> AudioBuffer {
        AudioBuffer::from_channels(vec![frames.to_vec()], 4).unwrap()
    }

    fn pull_frames(graph: &mut AudioSourceGraph, channels: usize, frames: usize) -> Vec<Vec<f32>> {
        let mut storage = vec![vec![9.0_f32; frames]; channels];
        let mut block = AudioBlock::new(&mut storage, frames);
        graph.pull(&mut block);
        storage
    }

    #[test]
    fn test_default_state_is_stopped() {
        let graph = AudioSourceGraph::new();
        assert_eq!(graph.state(), TransportState::Stopped);
        assert_eq!(graph.current_position(), 0.0);
        assert!(!graph.has_source());
    }

    #[test]
    fn test_pull_without_source_is_silent() {
        let mut graph = AudioSourceGraph::new();
        graph.play();
        let out = pull_frames(&mut graph, 2, 8);
        assert!(out.iter().flatten().all(|&s| s == 0.0));
    }

    #[test]
    fn test_pull_while_stopped_is_silent() {
        let mut graph = AudioSourceGraph::new();
        graph.attach_source(source(&[1.0, 2.0, 3.0, 4.0]), 4);
        let out = pull_frames(&mut graph, 1, 4);
        assert_eq!(out[0], vec![0.0; 4]);
        assert_eq!(graph.current_position(), 0.0);
    }

    #[test]
    fn test_play_and_stop_are_idempotent() {
        let mut graph = AudioSourceGraph::new();
        graph.attach_source(source(&[1.0; 8]), 4);

        graph.play();
        graph.play();
        assert_eq!(graph.state(), TransportState::Playing);

        pull_frames(&mut graph, 1, 2);
        graph.stop();
        graph.stop();
        assert_eq!(graph.state(), TransportState::Stopped);
        // Manual stop keeps the position
        assert!((graph.current_position() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_end_of_stream_stops_and_pads_with_silence() {
        let mut graph = AudioSourceGraph::new();
        graph.attach_source(source(&[1.0, 2.0, 3.0]), 4);
        graph.play();

        let out = pull_frames(&mut graph, 1, 5);
        assert_eq!(out[0], vec![1.0, 2.0, 3.0, 0.0, 0.0]);
        assert_eq!(graph.state(), TransportState::Stopped);
        assert_eq!(graph.current_position(), 0.0);
    }

    #[test]
    fn test_looping_continues_without_gap() {
        let mut graph = AudioSourceGraph::new();
        graph.attach_source(source(&[1.0, 2.0, 3.0, 4.0]), 4);
        graph.set_looping(true);
        graph.play();

        let first = pull_frames(&mut graph, 1, 4);
        assert_eq!(first[0], vec![1.0, 2.0, 3.0, 4.0]);

        let second = pull_frames(&mut graph, 1, 6);
        assert_eq!(second[0], vec![1.0, 2.0, 3.0, 4.0, 1.0, 2.0]);
        assert_eq!(graph.state(), TransportState::Playing);
    }

    #[test]
    fn test_mono_source_fills_all_output_channels() {
        let mut graph = AudioSourceGraph::new();
        graph.attach_source(source(&[0.5, -0.5]), 4);
        graph.play();

        let out = pull_frames(&mut graph, 2, 2);
        assert_eq!(out[0], vec![0.5, -0.5]);
        assert_eq!(out[1], vec![0.5, -0.5]);
    }

    #[test]
    fn test_seek_is_clamped() {
        let mut graph = AudioSourceGraph::new();
        graph.attach_source(source(&[0.0; 8]), 4);

        graph.seek(1.0);
        assert!((graph.current_position() - 1.0).abs() < 1e-9);

        graph.seek(100.0);
        assert!((graph.current_position() - 2.0).abs() < 1e-9);

        graph.seek(-3.0);
        assert_eq!(graph.current_position(), 0.0);
    }

    #[test]
    fn test_handle_drives_graph() {
        let mut graph = AudioSourceGraph::new();
        graph.attach_source(source(&[1.0, 2.0, 3.0, 4.0]), 4);
        let handle = graph.handle();

        handle.play();
        assert!(handle.is_playing());

        pull_frames(&mut graph, 1, 2);
        assert!((handle.current_position() - 0.5).abs() < 1e-9);
        assert!((handle.length_secs() - 1.0).abs() < 1e-9);

        handle.set_looping(true);
        assert!(handle.is_looping());
        handle.stop();
        assert_eq!(graph.state(), TransportState::Stopped);
    }

    #[test]
    fn test_attach_resets_transport() {
        let mut graph = AudioSourceGraph::new();
        graph.attach_source(source(&[1.0; 8]), 4);
        graph.play();
        pull_frames(&mut graph, 1, 4);

        graph.attach_source(source(&[2.0; 4]), 4);
        assert_eq!(graph.state(), TransportState::Stopped);
        assert_eq!(graph.current_position(), 0.0);

        let detached = graph.detach_source();
        assert!(detached.is_some());
        assert!(!graph.has_source());
    }

    #[test]
    fn test_stops_when_block_ends_on_last_frame() {
        let mut graph = AudioSourceGraph::new();
        graph.attach_source(source(&[1.0, 2.0, 3.0, 4.0]), 4);
        graph.play();

        let out = pull_frames(&mut graph, 1, 4);
        assert_eq!(out[0], vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(graph.state(), TransportState::Stopped);
        assert_eq!(graph.current_position(), 0.0);
    }

    #[test]
    fn test_looping_stays_playing_at_block_boundary() {
        let mut graph = AudioSourceGraph::new();
        graph.attach_source(source(&[1.0, 2.0, 3.0, 4.0]), 4);
        graph.set_looping(true);
        graph.play();

        pull_frames(&mut graph, 1, 4);
        assert_eq!(graph.state(), TransportState::Playing);
    }

    #[test]
    fn test_seek_between_pulls_moves_cursor() {
        let mut graph = AudioSourceGraph::new();
        graph.attach_source(source(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]), 4);
        graph.play();

        pull_frames(&mut graph, 1, 2);
        graph.handle().seek(1.0);
        let out = pull_frames(&mut graph, 1, 2);
        assert_eq!(out[0], vec![5.0, 6.0]);
        assert!((graph.current_position() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_seek_from_other_thread_during_pull_is_kept() {
        const RATE: u32 = 1000;
        const LENGTH: usize = 2_000_000;
        const BLOCK: usize = 1_000_000;

        let mut graph = AudioSourceGraph::new();
        let stream = AudioBuffer::from_channels(vec![vec![0.25; LENGTH]], RATE).unwrap();
        graph.attach_source(stream, RATE);
        graph.set_looping(true);
        graph.play();
        let handle = graph.handle();

        let barrier = Arc::new(std::sync::Barrier::new(2));
        let audio_barrier = Arc::clone(&barrier);
        let audio = std::thread::spawn(move || {
            let mut storage = vec![vec![0.0_f32; BLOCK]];
            audio_barrier.wait();
            let mut block = AudioBlock::new(&mut storage, BLOCK);
            graph.pull(&mut block);
            graph
        });

        barrier.wait();
        handle.seek(1900.0);
        let graph = audio.join().unwrap();

        // Either the seek landed during the pull and is kept as-is, or it
        // landed first and the pull read on from it (wrapping to 900 s).
        // The pull's own cursor (1000 s) must never overwrite it.
        let position = graph.current_position();
        assert!(
            (position - 1900.0).abs() < 1e-6 || (position - 900.0).abs() < 1e-6,
            "seek lost: position {}",
            position
        );
    }

    #[test]
    fn test_transport_state_display() {
        assert_eq!(format!("{}", TransportState::Stopped), "Stopped");
        assert_eq!(format!("{}", TransportState::Playing), "Playing");
    }
}
