//! Concurrency scheduler
//!
//! Runs all batch jobs as independent tasks under a semaphore that bounds
//! the number of simultaneously in-flight remote calls. Each job builds its
//! payload and plans its outputs before taking a slot; the slot is held only
//! around the remote call (and its retries). Failure handling is either
//! best-effort (record and continue) or fail-fast (cancel everything that
//! has not started).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pictor_client::{ClientError, ImagesClient};
use pictor_core::output::{self, PlanRequest};
use pictor_core::{DownscaleOptions, ImageRequest, Job, JobResult, RequestDefaults, build_request};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::JobError;
use crate::media;
use crate::retry::run_with_retry;
use crate::summary::BatchSummary;
use crate::{DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS};

/// The remote image-generation collaborator.
///
/// Abstracted behind a trait so the scheduler can be exercised without a
/// network; [`ImagesClient`] is the production implementation.
#[async_trait]
pub trait ImageService: Send + Sync {
    /// Generate images for one validated request, returning base64 payloads.
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<String>, ClientError>;
}

#[async_trait]
impl ImageService for ImagesClient {
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<String>, ClientError> {
        ImagesClient::generate(self, request).await
    }
}

/// Settings for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Directory all output paths are rooted under.
    pub out_dir: PathBuf,
    /// Global request defaults merged under per-job overrides.
    pub defaults: RequestDefaults,
    /// Maximum simultaneously in-flight remote calls.
    pub concurrency: usize,
    /// Retry budget per remote call.
    pub max_attempts: u32,
    /// Abort the whole batch on the first job failure.
    pub fail_fast: bool,
    /// Overwrite existing output files.
    pub force: bool,
    /// Downscaled-sibling settings, when requested.
    pub downscale: Option<DownscaleOptions>,
}

impl BatchOptions {
    /// Options with engine defaults: concurrency 5, 3 attempts, best-effort.
    pub fn new(out_dir: impl Into<PathBuf>, defaults: RequestDefaults) -> Self {
        Self {
            out_dir: out_dir.into(),
            defaults,
            concurrency: DEFAULT_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            fail_fast: false,
            force: false,
            downscale: None,
        }
    }
}

/// Executes a batch of jobs against an [`ImageService`].
pub struct BatchRunner {
    service: Arc<dyn ImageService>,
    options: Arc<BatchOptions>,
}

impl BatchRunner {
    /// Create a runner for one batch.
    pub fn new(service: Arc<dyn ImageService>, options: BatchOptions) -> Self {
        Self {
            service,
            options: Arc::new(options),
        }
    }

    /// Run every job and aggregate the outcomes.
    ///
    /// Jobs complete in whatever order their calls resolve; the summary is
    /// keyed and ordered by sequence index. Every job gets exactly one
    /// result, including jobs cancelled by fail-fast mode.
    pub async fn run(&self, jobs: Vec<Job>) -> BatchSummary {
        let total = jobs.len();
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let cancel = CancellationToken::new();

        let mut handles: Vec<(usize, JoinHandle<JobResult>)> = Vec::with_capacity(total);
        for job in jobs {
            let idx = job.sequence_index;
            let handle = self.spawn_job_task(job, total, Arc::clone(&semaphore), cancel.clone());
            handles.push((idx, handle));
        }

        let mut results = Vec::with_capacity(total);
        for (idx, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!("job {idx} task panicked: {e}");
                    results.push(JobResult::failed(idx, "job task panicked", Duration::ZERO));
                }
            }
        }

        BatchSummary::new(results)
    }

    fn spawn_job_task(
        &self,
        job: Job,
        total: usize,
        semaphore: Arc<Semaphore>,
        cancel: CancellationToken,
    ) -> JoinHandle<JobResult> {
        let service = Arc::clone(&self.service);
        let options = Arc::clone(&self.options);

        tokio::spawn(async move {
            let idx = job.sequence_index;
            let started = Instant::now();

            match execute_job(job, total, service, &options, semaphore, &cancel).await {
                Ok(written) => {
                    info!("[job {idx}/{total}] wrote {} file(s)", written.len());
                    JobResult::success(idx, started.elapsed())
                }
                Err(err) => {
                    error!("[job {idx}/{total}] failed: {err}");
                    // Covers failure paths outside the remote call (payload
                    // validation, output writes); the remote-call path
                    // cancels earlier, while the slot is still held.
                    if options.fail_fast {
                        cancel.cancel();
                    }
                    JobResult::failed(idx, err.to_string(), started.elapsed())
                }
            }
        })
    }
}

/// One job, end to end: build payload, plan outputs, call with retries under
/// a slot, then decode and write.
async fn execute_job(
    job: Job,
    total: usize,
    service: Arc<dyn ImageService>,
    options: &BatchOptions,
    semaphore: Arc<Semaphore>,
    cancel: &CancellationToken,
) -> Result<Vec<PathBuf>, JobError> {
    let label = format!("[job {}/{}]", job.sequence_index, total);

    // Validation and planning happen before any slot is taken; an invalid
    // job never touches the network.
    let request = build_request(&job, &options.defaults)?;
    let format = request.effective_output_format();
    let (spec, warnings) = output::plan_job_outputs(PlanRequest {
        out_dir: &options.out_dir,
        format,
        sequence_index: job.sequence_index,
        prompt: &job.prompt,
        n: request.n,
        output_hint: job.output_hint.as_deref(),
        downscale_suffix: options.downscale.as_ref().map(|d| d.suffix.as_str()),
    });
    for warning in warnings {
        warn!("{label} {warning}");
    }

    let images = {
        let _permit = tokio::select! {
            _ = cancel.cancelled() => return Err(JobError::Cancelled),
            permit = Arc::clone(&semaphore).acquire_owned() => {
                permit.map_err(|_| JobError::Cancelled)?
            }
        };

        info!("{label} starting");
        let call_started = Instant::now();
        let result = run_with_retry(&label, options.max_attempts, cancel, || {
            let service = Arc::clone(&service);
            let request = request.clone();
            async move { service.generate(&request).await }
        })
        .await;

        match result {
            Ok(images) => {
                info!("{label} completed in {:.1}s", call_started.elapsed().as_secs_f64());
                images
            }
            Err(err) => {
                // Cancel while the slot is still held so no waiting job can
                // start a call after the first fail-fast failure.
                if options.fail_fast {
                    cancel.cancel();
                }
                return Err(err);
            }
        }
    };

    if cancel.is_cancelled() {
        // Cancelled mid-flight; never write partial output afterwards.
        return Err(JobError::Cancelled);
    }

    media::write_outputs(
        &images,
        &spec,
        options.force,
        options.downscale.as_ref().map(|d| d.max_dim),
        format,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use pictor_core::job::PayloadOverrides;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};

    enum Behavior {
        Succeed,
        FailFatal,
        /// Fail transiently this many times, then succeed.
        FlakyThenSucceed(u32),
        /// Fail fatally when the prompt contains "bad".
        FailOnBadPrompt,
    }

    struct MockService {
        behavior: Behavior,
        calls: AtomicU32,
        in_flight: AtomicU32,
        max_in_flight: AtomicU32,
    }

    impl MockService {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicU32::new(0),
                in_flight: AtomicU32::new(0),
                max_in_flight: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ImageService for MockService {
        async fn generate(&self, request: &ImageRequest) -> Result<Vec<String>, ClientError> {
            let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            // Hold the slot long enough for overlap to be observable.
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let fail = ClientError::Api {
                status: 400,
                message: "bad request".into(),
            };
            match self.behavior {
                Behavior::Succeed => {}
                Behavior::FailFatal => return Err(fail),
                Behavior::FlakyThenSucceed(failures) => {
                    if calls <= failures {
                        return Err(ClientError::RateLimited {
                            retry_after: Some(0.0),
                            message: "slow down".into(),
                        });
                    }
                }
                Behavior::FailOnBadPrompt => {
                    if request.prompt.contains("bad") {
                        return Err(fail);
                    }
                }
            }

            let payload = BASE64.encode(b"image-bytes");
            Ok(vec![payload; request.n as usize])
        }
    }

    fn options(dir: &Path) -> BatchOptions {
        BatchOptions::new(dir, RequestDefaults::default())
    }

    #[tokio::test]
    async fn test_batch_succeeds_with_planned_outputs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = MockService::new(Behavior::Succeed);

        let mut two = Job::from_prompt(2, "a dog");
        two.overrides = PayloadOverrides {
            n: Some(2),
            ..Default::default()
        };
        let jobs = vec![Job::from_prompt(1, "a cat"), two];

        let runner = BatchRunner::new(service.clone(), options(dir.path()));
        let summary = runner.run(jobs).await;

        assert!(summary.all_succeeded());
        assert_eq!(summary.total(), 2);
        assert!(dir.path().join("001-a-cat.png").exists());
        assert!(dir.path().join("002-a-dog-1.png").exists());
        assert!(dir.path().join("002-a-dog-2.png").exists());
    }

    #[tokio::test]
    async fn test_concurrency_limit_is_respected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = MockService::new(Behavior::Succeed);

        let jobs: Vec<Job> = (1..=8)
            .map(|i| Job::from_prompt(i, format!("prompt {i}")))
            .collect();

        let mut opts = options(dir.path());
        opts.concurrency = 2;
        let runner = BatchRunner::new(service.clone(), opts);
        let summary = runner.run(jobs).await;

        assert!(summary.all_succeeded());
        assert_eq!(service.calls(), 8);
        assert!(service.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_best_effort_records_failures_and_continues() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = MockService::new(Behavior::FailOnBadPrompt);

        let jobs = vec![
            Job::from_prompt(1, "a good cat"),
            Job::from_prompt(2, "a bad dog"),
            Job::from_prompt(3, "a good bird"),
        ];

        let runner = BatchRunner::new(service.clone(), options(dir.path()));
        let summary = runner.run(jobs).await;

        assert_eq!(service.calls(), 3);
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.failed(), 1);
        let failed = &summary.results()[1];
        assert_eq!(failed.sequence_index, 2);
        assert!(failed.error_message.as_deref().unwrap().contains("bad request"));
    }

    #[tokio::test]
    async fn test_fail_fast_stops_pending_jobs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = MockService::new(Behavior::FailFatal);

        let jobs: Vec<Job> = (1..=5)
            .map(|i| Job::from_prompt(i, format!("prompt {i}")))
            .collect();

        let mut opts = options(dir.path());
        opts.concurrency = 1;
        opts.fail_fast = true;
        let runner = BatchRunner::new(service.clone(), opts);
        let summary = runner.run(jobs).await;

        // The slot holder cancels before releasing, so exactly one remote
        // call is ever issued.
        assert_eq!(service.calls(), 1);
        assert_eq!(summary.total(), 5);
        assert_eq!(summary.failed(), 5);
        let cancelled = summary
            .results()
            .iter()
            .filter(|r| {
                r.error_message
                    .as_deref()
                    .is_some_and(|m| m.contains("cancelled"))
            })
            .count();
        assert_eq!(cancelled, 4);
    }

    #[tokio::test]
    async fn test_transient_failures_retry_then_succeed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = MockService::new(Behavior::FlakyThenSucceed(2));

        let mut opts = options(dir.path());
        opts.max_attempts = 3;
        let runner = BatchRunner::new(service.clone(), opts);
        let summary = runner.run(vec![Job::from_prompt(1, "a cat")]).await;

        assert!(summary.all_succeeded());
        assert_eq!(service.calls(), 3);
    }

    #[tokio::test]
    async fn test_invalid_job_fails_without_network() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = MockService::new(Behavior::Succeed);

        let mut job = Job::from_prompt(1, "a cat");
        job.overrides = PayloadOverrides {
            n: Some(99),
            ..Default::default()
        };

        let runner = BatchRunner::new(service.clone(), options(dir.path()));
        let summary = runner.run(vec![job]).await;

        assert_eq!(summary.failed(), 1);
        assert_eq!(service.calls(), 0);
        let message = summary.results()[0].error_message.as_deref().unwrap();
        assert!(message.contains("invalid n"));
    }

    #[tokio::test]
    async fn test_existing_output_fails_job_without_force() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("001-a-cat.png"), b"already here").expect("seed file");
        let service = MockService::new(Behavior::Succeed);

        let runner = BatchRunner::new(service.clone(), options(dir.path()));
        let summary = runner.run(vec![Job::from_prompt(1, "a cat")]).await;

        assert_eq!(summary.failed(), 1);
        let message = summary.results()[0].error_message.as_deref().unwrap();
        assert!(message.contains("already exists"));
    }
}
