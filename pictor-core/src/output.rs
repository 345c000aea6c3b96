//! Output planning
//!
//! Derives the deterministic destination paths for a job's images before any
//! remote call is made. Planning is pure: collisions with existing files are
//! detected at write time, not here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::payload::OutputFormat;

/// Default suffix for downscaled sibling files.
pub const DEFAULT_DOWNSCALE_SUFFIX: &str = "-web";

const SLUG_INPUT_CHARS: usize = 80;
const SLUG_MAX_CHARS: usize = 60;

/// Downscaled-variant settings shared by the planner and the writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownscaleOptions {
    /// Maximum bounding dimension of the downscaled copy.
    pub max_dim: u32,
    /// Filename suffix inserted before the extension.
    pub suffix: String,
}

impl DownscaleOptions {
    pub fn new(max_dim: u32, suffix: impl Into<String>) -> Self {
        Self {
            max_dim,
            suffix: suffix.into(),
        }
    }
}

/// Ordered destination paths for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    /// One path per requested image, in API order.
    pub outputs: Vec<PathBuf>,
    /// Parallel downscaled-sibling paths, present when downscaling was
    /// requested.
    pub downscaled: Option<Vec<PathBuf>>,
}

impl OutputSpec {
    /// Build a spec from raw output paths, deriving downscaled siblings when
    /// a suffix is supplied.
    pub fn new(outputs: Vec<PathBuf>, downscale_suffix: Option<&str>) -> Self {
        let downscaled = downscale_suffix.map(|suffix| {
            outputs
                .iter()
                .map(|p| derive_suffixed_path(p, suffix))
                .collect()
        });
        Self { outputs, downscaled }
    }
}

/// Inputs to [`plan_job_outputs`].
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    /// Run output directory all paths are rooted under.
    pub out_dir: &'a Path,
    /// Resolved output format for the job.
    pub format: OutputFormat,
    /// 1-based job sequence index.
    pub sequence_index: usize,
    /// Original (un-augmented) prompt, used for the slug.
    pub prompt: &'a str,
    /// Number of images the job will produce.
    pub n: u32,
    /// Caller-specified base filename, if any.
    pub output_hint: Option<&'a str>,
    /// Downscale suffix when downscaled siblings are wanted.
    pub downscale_suffix: Option<&'a str>,
}

/// Plan the destination paths for one batch job.
///
/// Returns the spec plus any non-fatal warnings (currently only an
/// extension/format mismatch on an explicit hint).
pub fn plan_job_outputs(req: PlanRequest<'_>) -> (OutputSpec, Vec<String>) {
    let mut warnings = Vec::new();
    let ext = req.format.extension();

    let base = match req.output_hint {
        Some(hint) => {
            // Only the filename component is honored; directory traversal in
            // the hint is always rebased under the output directory.
            let name = Path::new(hint)
                .file_name()
                .map(|n| PathBuf::from(n))
                .unwrap_or_else(|| PathBuf::from("job"));
            let (name, warning) = fix_extension(name, req.format);
            if let Some(w) = warning {
                warnings.push(format!("job {}: {w}", req.sequence_index));
            }
            req.out_dir.join(name)
        }
        None => {
            let prompt_head: String = req.prompt.chars().take(SLUG_INPUT_CHARS).collect();
            let slug = slugify(&prompt_head);
            req.out_dir
                .join(format!("{:03}-{slug}.{ext}", req.sequence_index))
        }
    };

    let outputs = number_siblings(&base, req.n);
    (OutputSpec::new(outputs, req.downscale_suffix), warnings)
}

/// Plan destination paths for a single-shot (non-batch) request.
///
/// With an output directory the files are `image_{i}.{ext}` inside it;
/// otherwise `out` is treated as the base file path, with the same extension
/// fixup and `-{i}` sibling rules as batch planning.
pub fn plan_single(
    out: &Path,
    out_dir: Option<&Path>,
    format: OutputFormat,
    n: u32,
) -> (Vec<PathBuf>, Vec<String>) {
    let ext = format.extension();

    if let Some(dir) = out_dir {
        let outputs = (1..=n).map(|i| dir.join(format!("image_{i}.{ext}"))).collect();
        return (outputs, Vec::new());
    }

    let mut warnings = Vec::new();
    let (base, warning) = fix_extension(out.to_path_buf(), format);
    if let Some(w) = warning {
        warnings.push(w);
    }

    if n == 1 {
        return (vec![base], warnings);
    }
    (number_siblings(&base, n), warnings)
}

/// Derive the downscaled-sibling path by inserting `suffix` before the
/// extension. A suffix with no leading separator gets a `-` prepended.
pub fn derive_suffixed_path(path: &Path, suffix: &str) -> PathBuf {
    let suffix = if !suffix.is_empty() && !suffix.starts_with('-') && !suffix.starts_with('_') {
        format!("-{suffix}")
    } else {
        suffix.to_string()
    };

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    path.with_file_name(name)
}

/// Lowercased, hyphen-collapsed filename slug; falls back to `job` when the
/// input carries no usable characters.
pub fn slugify(value: &str) -> String {
    let mut slug = String::new();
    let mut pending_hyphen = false;

    for c in value.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    let slug: String = slug.chars().take(SLUG_MAX_CHARS).collect();
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() { "job".to_string() } else { slug }
}

/// Append the format's extension when the path has none; keep a mismatched
/// extension but report it.
fn fix_extension(path: PathBuf, format: OutputFormat) -> (PathBuf, Option<String>) {
    match path.extension() {
        None => (path.with_extension(format.extension()), None),
        Some(ext) => {
            let ext = ext.to_string_lossy().to_ascii_lowercase();
            let matches = ext == format.extension() || (ext == "jpg" && format == OutputFormat::Jpeg);
            if matches {
                (path, None)
            } else {
                let warning = format!(
                    "output extension .{ext} does not match output format {format}"
                );
                (path, Some(warning))
            }
        }
    }
}

/// `-{1..n}` siblings on the base stem; `n == 1` keeps the base path alone.
fn number_siblings(base: &Path, n: u32) -> Vec<PathBuf> {
    if n <= 1 {
        return vec![base.to_path_buf()];
    }
    (1..=n)
        .map(|i| derive_suffixed_path(base, &format!("-{i}")))
        .collect()
}
