//! Pictor Core
//!
//! Core types and logic for the pictor image-generation CLI.
//!
//! This crate contains:
//! - Domain types: jobs, results, and the resolved request payload
//! - Job-file parsing: line-delimited batch input into canonical jobs
//! - Payload building: merge of global defaults and per-job overrides,
//!   validated before any network activity
//! - Prompt augmentation: the fixed-order sectioned prompt template
//! - Output planning: deterministic destination paths per job
//!
//! Everything here is pure: no network and no filesystem access.

pub mod error;
pub mod job;
pub mod jobfile;
pub mod output;
pub mod payload;
pub mod prompt;

pub use error::CoreError;
pub use job::{Job, JobResult, JobStatus};
pub use jobfile::parse_jobs;
pub use output::{DownscaleOptions, OutputSpec};
pub use payload::{
    Background, ImageRequest, ImageSize, OutputFormat, Quality, RequestDefaults, build_request,
};
pub use prompt::PromptFields;

/// Maximum number of jobs accepted from a single batch input file.
pub const MAX_BATCH_JOBS: usize = 500;
