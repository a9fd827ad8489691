pub mod cancel;
pub mod primitives;
pub mod spectrum;

pub use cancel::CancelToken;
pub use spectrum::{Band, SpectrumPoint, SpectrumResult};
