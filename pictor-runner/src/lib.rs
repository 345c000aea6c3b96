//! Pictor Runner
//!
//! The batch job execution engine: takes parsed jobs and turns them into
//! bounded-concurrency API calls with retry, backoff, and cooperative
//! cancellation, then aggregates per-job outcomes into a batch summary.
//!
//! Architecture:
//! - Retry: wraps one remote call with transient-failure classification
//!   and backoff
//! - Scheduler: semaphore-bounded task-per-job execution with best-effort
//!   or fail-fast failure handling
//! - Media: base64 decode, collision-checked writes, optional downscale
//! - Summary: per-job results keyed by sequence index

pub mod error;
pub mod media;
pub mod retry;
pub mod scheduler;
pub mod summary;

pub use error::JobError;
pub use scheduler::{BatchOptions, BatchRunner, ImageService};
pub use summary::BatchSummary;

/// Default number of simultaneously in-flight remote calls.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Default retry budget per remote call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
