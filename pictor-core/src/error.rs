//! Error types for the core domain

use thiserror::Error;

/// Errors produced while parsing batch input or building request payloads
#[derive(Debug, Error)]
pub enum CoreError {
    /// A job line could not be parsed
    #[error("invalid input on line {line}: {message}")]
    InvalidInput {
        /// 1-based line number in the input stream
        line: usize,
        /// What was wrong with the line
        message: String,
    },

    /// The input contained no jobs after skipping blanks and comments
    #[error("no jobs found in input")]
    NoJobs,

    /// The input exceeded the batch job ceiling
    #[error("too many jobs ({count}); max is {max}")]
    TooManyJobs { count: usize, max: usize },

    /// A merged payload failed validation
    #[error("job {job}: invalid {field}: {message}")]
    Validation {
        /// Sequence index of the offending job
        job: usize,
        /// Name of the request parameter that failed
        field: &'static str,
        /// What was wrong with the value
        message: String,
    },
}

impl CoreError {
    /// Create a validation error for a specific job and field
    pub fn validation(job: usize, field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            job,
            field,
            message: message.into(),
        }
    }
}
