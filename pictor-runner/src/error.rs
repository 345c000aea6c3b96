//! Error types for the batch engine

use std::path::PathBuf;

use pictor_client::ClientError;
use pictor_core::CoreError;
use thiserror::Error;

/// Errors scoped to one job's execution
#[derive(Debug, Error)]
pub enum JobError {
    /// The remote call failed (after retries, for transient classes)
    #[error(transparent)]
    Remote(#[from] ClientError),

    /// A destination path already exists and overwriting is not permitted
    #[error("output already exists: {0} (use --force to overwrite)")]
    OutputExists(PathBuf),

    /// The API returned image data that could not be base64-decoded
    #[error("failed to decode image data: {0}")]
    Decode(String),

    /// Downscaling or re-encoding failed
    #[error("image processing failed: {0}")]
    Image(String),

    /// Writing an output file failed
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The job was cancelled before it completed (fail-fast mode)
    #[error("cancelled before completion")]
    Cancelled,

    /// The job's payload failed validation
    #[error(transparent)]
    Invalid(#[from] CoreError),
}
