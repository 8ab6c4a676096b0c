pub mod analysis;
pub mod config;
pub mod error;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod processor;
pub mod report;

pub use error::{PipelineError, Result};
