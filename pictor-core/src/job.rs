//! Job domain types
//!
//! A [`Job`] is one independent unit of work: one prompt, plus whatever
//! per-job overrides the batch input attached to it. Jobs are created once
//! by the job-file parser and are immutable afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::prompt::PromptFields;

/// One requested unit of work from the batch input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// 1-based position in the input stream, counting accepted jobs only.
    /// Used for labeling, output filenames, and result keys.
    pub sequence_index: usize,
    /// Non-empty prompt text, already trimmed.
    pub prompt: String,
    /// Augmentation-field overrides, with the job's `fields.*` values
    /// already merged over its flat top-level keys.
    pub fields: PromptFields,
    /// Request-parameter overrides; unset values inherit the global default.
    pub overrides: PayloadOverrides,
    /// Caller-specified base filename for this job's outputs.
    pub output_hint: Option<String>,
}

impl Job {
    /// Create a job carrying nothing but a prompt.
    pub fn from_prompt(sequence_index: usize, prompt: impl Into<String>) -> Self {
        Self {
            sequence_index,
            prompt: prompt.into(),
            fields: PromptFields::default(),
            overrides: PayloadOverrides::default(),
            output_hint: None,
        }
    }
}

/// Per-job request-parameter overrides as they appeared in the input.
///
/// Values are kept raw here; enum membership and range checks happen in the
/// payload builder so that failures can name the job and field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayloadOverrides {
    pub model: Option<String>,
    pub n: Option<u32>,
    pub size: Option<String>,
    pub quality: Option<String>,
    pub background: Option<String>,
    pub output_format: Option<String>,
    pub output_compression: Option<u32>,
    pub moderation: Option<String>,
}

/// Job execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Success,
    Failed,
}

/// Outcome record for one job, produced exactly once regardless of how many
/// retry attempts occurred.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub sequence_index: usize,
    pub status: JobStatus,
    /// Present iff the job failed.
    pub error_message: Option<String>,
    pub elapsed: Duration,
}

impl JobResult {
    /// Record a successful job.
    pub fn success(sequence_index: usize, elapsed: Duration) -> Self {
        Self {
            sequence_index,
            status: JobStatus::Success,
            error_message: None,
            elapsed,
        }
    }

    /// Record a failed job with its error message.
    pub fn failed(sequence_index: usize, message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            sequence_index,
            status: JobStatus::Failed,
            error_message: Some(message.into()),
            elapsed,
        }
    }

    /// Whether the job succeeded.
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_prompt_has_no_overrides() {
        let job = Job::from_prompt(3, "a cat");
        assert_eq!(job.sequence_index, 3);
        assert_eq!(job.prompt, "a cat");
        assert!(job.overrides.n.is_none());
        assert!(job.output_hint.is_none());
    }

    #[test]
    fn test_result_constructors() {
        let ok = JobResult::success(1, Duration::from_secs(2));
        assert!(ok.is_success());
        assert!(ok.error_message.is_none());

        let bad = JobResult::failed(2, "boom", Duration::ZERO);
        assert!(!bad.is_success());
        assert_eq!(bad.error_message.as_deref(), Some("boom"));
    }
}
