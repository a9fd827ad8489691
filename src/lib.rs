//! Frequency spectrum engine: direct DFT and radix-2 FFT, each on a single
//! worker or sharded across a fixed set of worker threads.

pub mod audio;
pub mod bench;
pub mod config;
pub mod controller;
pub mod error;
pub mod transform;
pub mod worker;

pub use audio::buffer::DataSink;
pub use audio::format::AudioFormat;
pub use config::EngineConfig;
pub use controller::{Controller, TransformMode};
pub use error::TransformError;
pub use transform::{SpectrumPoint, SpectrumResult};
