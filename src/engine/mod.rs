//! Audio Engine Module
//!
//! Playback side of the player:
//! - Audio buffers and fixed-shape processing blocks
//! - WAV decode/encode
//! - Transport and the audio source graph
//! - The real-time processor driven by the device callback
//! - Offline preview rendering

pub mod buffer;
pub mod io;
pub mod preview;
pub mod processor;
pub mod transport;

pub use buffer::{calculate_peak, calculate_rms, AudioBlock, AudioBuffer};
pub use io::{decode_bytes, decode_file, encode_wav_bytes, export_wav, DecodedAudio};
pub use preview::{PreviewEvent, PreviewRenderer, PreviewSink, PreviewWorker};
pub use processor::{
    BufferSink, EngineState, InterleavedSink, OutputSink, ProcessorState, RealtimeProcessor,
};
pub use transport::{AudioSourceGraph, TransportHandle, TransportState};
