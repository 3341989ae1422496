//! Convolution reverb DSP
//!
//! Impulse-response state, the time-domain convolution engine, the
//! selectable IR catalog and the background loader that publishes new IRs.

mod catalog;
mod convolution;
mod impulse;
mod loader;

pub use catalog::{IrCatalog, IrEntry, IrSource};
pub use convolution::{ConvolutionEngine, IrLength, NORMALIZATION};
pub use impulse::{
    ConvolutionSnapshot, ImpulseResponse, ImpulseResponseStore, MAX_REALTIME_IR_LENGTH,
};
pub use loader::{IrLoader, LoadEvent};
