//! Batch job-file parsing
//!
//! Turns a line-delimited input into canonical [`Job`] records. Each
//! non-blank, non-comment line is either a bare prompt or a JSON object with
//! a `prompt` plus optional overrides. Parsing reads the input once and
//! never touches the network.

use serde::Deserialize;

use crate::MAX_BATCH_JOBS;
use crate::error::CoreError;
use crate::job::{Job, PayloadOverrides};
use crate::prompt::PromptFields;

/// Structured job line as it appears in the input file.
///
/// Flat augmentation keys are accepted for backward compatibility with the
/// bare-prompt syntax; values under `fields` win over them.
#[derive(Debug, Deserialize)]
struct RawJob {
    prompt: String,
    #[serde(default)]
    fields: PromptFields,
    #[serde(flatten)]
    flat_fields: PromptFields,
    #[serde(flatten)]
    overrides: PayloadOverrides,
    out: Option<String>,
}

/// Parse line-delimited batch input into ordered jobs.
///
/// Blank lines and lines starting with `#` are skipped and do not consume a
/// sequence index. Errors identify the offending 1-based line number.
pub fn parse_jobs(input: &str) -> Result<Vec<Job>, CoreError> {
    let mut jobs: Vec<Job> = Vec::new();

    for (line_no, raw) in input.lines().enumerate() {
        let line_no = line_no + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let sequence_index = jobs.len() + 1;
        let job = if line.starts_with('{') {
            parse_structured(line, line_no, sequence_index)?
        } else {
            Job::from_prompt(sequence_index, line)
        };
        jobs.push(job);
    }

    if jobs.is_empty() {
        return Err(CoreError::NoJobs);
    }
    if jobs.len() > MAX_BATCH_JOBS {
        return Err(CoreError::TooManyJobs {
            count: jobs.len(),
            max: MAX_BATCH_JOBS,
        });
    }

    Ok(jobs)
}

fn parse_structured(line: &str, line_no: usize, sequence_index: usize) -> Result<Job, CoreError> {
    let raw: RawJob = serde_json::from_str(line).map_err(|e| CoreError::InvalidInput {
        line: line_no,
        message: format!("invalid JSON: {e}"),
    })?;

    let prompt = raw.prompt.trim();
    if prompt.is_empty() {
        return Err(CoreError::InvalidInput {
            line: line_no,
            message: "missing or empty prompt".to_string(),
        });
    }

    Ok(Job {
        sequence_index,
        prompt: prompt.to_string(),
        fields: raw.fields.merged_over(&raw.flat_fields),
        overrides: raw.overrides,
        output_hint: raw.out,
    })
}
