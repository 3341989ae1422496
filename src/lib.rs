//! Convoplay - Audio Player with Convolution Reverb
//!
//! Plays a decoded audio file and optionally colors it with a convolution
//! reverb chosen from a small set of impulse responses.
//!
//! # Architecture
//!
//! - `dsp`: impulse responses, the time-domain convolution engine, the IR
//!   catalog and the background IR loader
//! - `engine`: buffers, WAV I/O, transport, the real-time processor and the
//!   offline preview renderer
//! - `context`: the single object that wires state and workers together
//!
//! The audio callback only ever reads two pieces of shared state: an atomic
//! enable flag and an atomically swapped impulse-response snapshot.

pub mod config;
pub mod context;
pub mod dsp;
pub mod engine;
pub mod error;

pub mod cli;

pub use config::PlayerConfig;
pub use context::PlayerContext;
pub use error::{ConvoError, LoadError, Result};
