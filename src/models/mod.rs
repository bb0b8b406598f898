pub mod device;
pub mod document;

pub use device::*;
pub use document::*;
