pub mod analyzers;
pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod processors;
pub mod readers;
pub mod server;
pub mod utils;
pub mod writers;

pub use error::{PipelineError, Result};
