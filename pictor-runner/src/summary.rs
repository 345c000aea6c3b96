//! Batch result aggregation
//!
//! The summary is an explicit value returned from the scheduler; callers
//! derive the process exit status from it rather than from shared state.

use pictor_core::JobResult;

/// Aggregated outcome of a batch run, ordered by sequence index.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    results: Vec<JobResult>,
}

impl BatchSummary {
    /// Build a summary; results are sorted by sequence index so callers see
    /// input order regardless of completion order.
    pub fn new(mut results: Vec<JobResult>) -> Self {
        results.sort_by_key(|r| r.sequence_index);
        Self { results }
    }

    /// Per-job results in input order.
    pub fn results(&self) -> &[JobResult] {
        &self.results
    }

    /// Total number of jobs.
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Number of jobs that succeeded.
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Number of jobs that failed.
    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// True only when every job succeeded; the process may exit 0 only then.
    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}
