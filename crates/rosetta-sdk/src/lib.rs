pub mod device;
pub mod tensor;

pub use device::*;
pub use tensor::*;
