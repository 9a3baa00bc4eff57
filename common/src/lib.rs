pub mod buffer3;
pub mod file_format;
pub mod file_utils;
pub mod log_setup;
pub mod serde;

pub use buffer3::Buffer3;
pub use file_format::SerdeFormat;
