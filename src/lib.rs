pub mod utils;
pub mod triton_client;
pub mod pipeline;
pub mod config;
pub mod error;
pub mod helper;
pub mod metrology;
pub mod modules;

pub use error::{MeasurementError, Result};
pub use pipeline::pipeline::TryOnPipeline;
