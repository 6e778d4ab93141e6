//! # robogen-core
//!
//! Orchestrates the generate, evaluate and optimize loop.
//!
//! - [`CodeGenerationPipeline`] - drives one run per request and never fails
//! - [`PipelineConfig`] - threshold, round budget and timeouts
//! - [`PipelineResult`] - everything a run produced

mod config;
mod context;
mod error;
mod pipeline;
mod result;

pub use config::{PipelineConfig, DEFAULT_MAX_ITERATIONS, DEFAULT_THRESHOLD};
pub use context::Phase;
pub use error::PipelineError;
pub use pipeline::{CodeGenerationPipeline, ProgressCallback};
pub use result::PipelineResult;
