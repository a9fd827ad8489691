use thiserror::Error;

/// Errors raised by the transform engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// The sample buffer held no complete sample when the run started.
    #[error("no samples available")]
    EmptyInput,
    /// Real and imaginary vectors handed to the FFT core differ in length.
    #[error("mismatched FFT input lengths (real={real}, imag={imag})")]
    InvalidInput { real: usize, imag: usize },
    /// The run was cancelled before it finished.
    #[error("transform cancelled")]
    Cancelled,
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
    /// A run is still in flight; call `clear()` first.
    #[error("a transform run is already in progress")]
    Busy,
    /// The sample buffer cannot be written while workers are reading it.
    #[error("sample buffer is locked by an active run")]
    BufferLocked,
    #[error("shard {shard} failed: {reason}")]
    ShardFailed { shard: usize, reason: String },
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, TransformError>;
