//! `generate-batch` command handler

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;
use pictor_client::ImagesClient;
use pictor_core::output::{PlanRequest, plan_job_outputs};
use pictor_core::{JobStatus, build_request, parse_jobs};
use pictor_runner::{BatchOptions, BatchRunner, BatchSummary};
use serde_json::json;
use tracing::{info, warn};

use super::{SharedArgs, ensure_api_key};
use crate::config::Config;

const MAX_CONCURRENCY: usize = 25;
const MAX_ATTEMPTS_LIMIT: u32 = 10;

/// Arguments for concurrent batch generation
#[derive(Debug, Args)]
pub struct BatchArgs {
    #[command(flatten)]
    pub shared: SharedArgs,

    /// Job file, one prompt or JSON job per line
    #[arg(long)]
    pub input: PathBuf,

    /// Number of jobs allowed in flight at once (1-25)
    #[arg(long, default_value_t = pictor_runner::DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Attempts per job before it is recorded as failed (1-10)
    #[arg(long, default_value_t = pictor_runner::DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Stop scheduling new work after the first failed job
    #[arg(long)]
    pub fail_fast: bool,
}

/// Run every job in the input file through the batch scheduler.
pub async fn handle_batch(args: BatchArgs, config: &Config) -> Result<()> {
    let shared = &args.shared;
    shared.validate()?;

    if !(1..=MAX_CONCURRENCY).contains(&args.concurrency) {
        bail!("--concurrency must be between 1 and {MAX_CONCURRENCY}");
    }
    if !(1..=MAX_ATTEMPTS_LIMIT).contains(&args.max_attempts) {
        bail!("--max-attempts must be between 1 and {MAX_ATTEMPTS_LIMIT}");
    }
    let Some(out_dir) = shared.out_dir.clone() else {
        bail!("generate-batch requires --out-dir");
    };

    let input = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading job file {}", args.input.display()))?;
    let jobs = parse_jobs(&input)?;
    let defaults = shared.defaults();

    let api_key = ensure_api_key(shared.dry_run)?;

    if shared.dry_run {
        return print_batch_preview(&args, &out_dir, &jobs, &defaults);
    }

    let client = Arc::new(ImagesClient::with_base_url(
        api_key.unwrap_or_default(),
        &config.api_base,
    ));

    let mut options = BatchOptions::new(out_dir, defaults);
    options.concurrency = args.concurrency;
    options.max_attempts = args.max_attempts;
    options.fail_fast = args.fail_fast;
    options.force = shared.force;
    options.downscale = shared.downscale();

    info!(
        jobs = jobs.len(),
        concurrency = args.concurrency,
        "starting batch run"
    );
    let summary = BatchRunner::new(client, options).run(jobs).await;
    print_summary(&summary);

    if !summary.all_succeeded() {
        bail!("{} of {} job(s) failed", summary.failed(), summary.total());
    }
    Ok(())
}

/// Show what each job would send and write, without any network calls.
fn print_batch_preview(
    args: &BatchArgs,
    out_dir: &std::path::Path,
    jobs: &[pictor_core::Job],
    defaults: &pictor_core::RequestDefaults,
) -> Result<()> {
    let mut previews = Vec::with_capacity(jobs.len());
    for job in jobs {
        let request = build_request(job, defaults)?;
        let format = request.effective_output_format();
        let (spec, warnings) = plan_job_outputs(PlanRequest {
            out_dir,
            format,
            sequence_index: job.sequence_index,
            prompt: &job.prompt,
            n: request.n,
            output_hint: job.output_hint.as_deref(),
            downscale_suffix: args.shared.downscale_suffix_opt(),
        });
        for warning in warnings {
            warn!("{warning}");
        }
        let mut preview = json!({
            "job": job.sequence_index,
            "outputs": spec.outputs,
            "payload": serde_json::to_value(&request)?,
        });
        if let (Some(obj), Some(downscaled)) = (preview.as_object_mut(), &spec.downscaled) {
            obj.insert("outputs_downscaled".into(), json!(downscaled));
        }
        previews.push(preview);
    }
    println!("{}", serde_json::to_string_pretty(&previews)?);
    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    for result in summary.results() {
        match result.status {
            JobStatus::Success => println!(
                "{} job {:03} ({:.1}s)",
                "✓".green(),
                result.sequence_index,
                result.elapsed.as_secs_f64()
            ),
            JobStatus::Failed => println!(
                "{} job {:03}: {}",
                "✗".red(),
                result.sequence_index,
                result.error_message.as_deref().unwrap_or("unknown error")
            ),
        }
    }
    println!(
        "{}",
        format!(
            "{} succeeded, {} failed, {} total",
            summary.succeeded(),
            summary.failed(),
            summary.total()
        )
        .bold()
    );
}
