pub mod device;
pub mod error;
pub mod loader;
pub mod model;
