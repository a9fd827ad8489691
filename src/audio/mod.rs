pub mod buffer;
pub mod decode;
pub mod format;
pub mod tone;
