//! Request payload types and the payload builder
//!
//! The builder merges global defaults with per-job overrides and validates
//! the result before any output path is computed or any network resource is
//! touched. Absent values are dropped on serialization, never sent as nulls.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::job::Job;
use crate::prompt::{self, PromptFields};

/// Default model when neither the CLI nor the job names one.
pub const DEFAULT_MODEL: &str = "gpt-image-1.5";

/// Supported image sizes for GPT image models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSize {
    #[serde(rename = "1024x1024")]
    Square,
    #[serde(rename = "1536x1024")]
    Landscape,
    #[serde(rename = "1024x1536")]
    Portrait,
    #[serde(rename = "auto")]
    Auto,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1024x1024",
            Self::Landscape => "1536x1024",
            Self::Portrait => "1024x1536",
            Self::Auto => "auto",
        }
    }
}

impl FromStr for ImageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1024x1024" => Ok(Self::Square),
            "1536x1024" => Ok(Self::Landscape),
            "1024x1536" => Ok(Self::Portrait),
            "auto" => Ok(Self::Auto),
            other => Err(format!(
                "{other:?} is not one of 1024x1024, 1536x1024, 1024x1536, auto"
            )),
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendering quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
    Auto,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Auto => "auto",
        }
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "auto" => Ok(Self::Auto),
            other => Err(format!("{other:?} is not one of low, medium, high, auto")),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Background handling for generated images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Background {
    Transparent,
    Opaque,
    Auto,
}

impl Background {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transparent => "transparent",
            Self::Opaque => "opaque",
            Self::Auto => "auto",
        }
    }
}

impl FromStr for Background {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transparent" => Ok(Self::Transparent),
            "opaque" => Ok(Self::Opaque),
            "auto" => Ok(Self::Auto),
            other => Err(format!(
                "{other:?} is not one of transparent, opaque, auto"
            )),
        }
    }
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded output format. `jpg` normalizes to jpeg on parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
    Webp,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
        }
    }

    /// File extension for this format, without the leading dot.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    /// Whether the format can carry an alpha channel.
    pub fn supports_alpha(&self) -> bool {
        matches!(self, Self::Png | Self::Webp)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            other => Err(format!("{other:?} is not one of png, jpeg, jpg, webp")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Global request defaults resolved from the CLI before any job runs.
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    pub model: String,
    pub n: u32,
    pub size: ImageSize,
    pub quality: Quality,
    pub background: Option<Background>,
    pub output_format: Option<OutputFormat>,
    pub output_compression: Option<u32>,
    pub moderation: Option<String>,
    /// Augmentation hints applied to every job unless overridden.
    pub fields: PromptFields,
    /// Whether prompts are rewritten into the sectioned template.
    pub augment: bool,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            n: 1,
            size: ImageSize::Square,
            quality: Quality::Auto,
            background: None,
            output_format: None,
            output_compression: None,
            moderation: None,
            fields: PromptFields::default(),
            augment: true,
        }
    }
}

/// Fully resolved parameters for one remote call.
///
/// Serializes directly as the generations/edits request body; `None` fields
/// are omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub n: u32,
    pub size: ImageSize,
    pub quality: Quality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<Background>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_compression: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderation: Option<String>,
    /// Edit-only knob; never set for generations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_fidelity: Option<String>,
}

impl ImageRequest {
    /// Output format used for planning and encoding when the request left it
    /// unset: the API returns png by default.
    pub fn effective_output_format(&self) -> OutputFormat {
        self.output_format.unwrap_or(OutputFormat::Png)
    }
}

/// Build and validate the request payload for one job.
///
/// Merge precedence per parameter: job override wins over the global
/// default. Validation failures name the job's sequence index and the field
/// that failed.
pub fn build_request(job: &Job, defaults: &RequestDefaults) -> Result<ImageRequest, CoreError> {
    let idx = job.sequence_index;
    let over = &job.overrides;

    let n = over.n.unwrap_or(defaults.n);
    if !(1..=10).contains(&n) {
        return Err(CoreError::validation(
            idx,
            "n",
            format!("must be between 1 and 10, got {n}"),
        ));
    }

    let size = match &over.size {
        Some(raw) => raw
            .parse::<ImageSize>()
            .map_err(|e| CoreError::validation(idx, "size", e))?,
        None => defaults.size,
    };
    let quality = match &over.quality {
        Some(raw) => raw
            .parse::<Quality>()
            .map_err(|e| CoreError::validation(idx, "quality", e))?,
        None => defaults.quality,
    };
    let background = match &over.background {
        Some(raw) => Some(
            raw.parse::<Background>()
                .map_err(|e| CoreError::validation(idx, "background", e))?,
        ),
        None => defaults.background,
    };
    let output_format = match &over.output_format {
        Some(raw) => Some(
            raw.parse::<OutputFormat>()
                .map_err(|e| CoreError::validation(idx, "output_format", e))?,
        ),
        None => defaults.output_format,
    };

    let output_compression = over.output_compression.or(defaults.output_compression);
    if let Some(oc) = output_compression
        && oc > 100
    {
        return Err(CoreError::validation(
            idx,
            "output_compression",
            format!("must be between 0 and 100, got {oc}"),
        ));
    }

    // Transparency needs an alpha-capable encoding.
    let effective_format = output_format.unwrap_or(OutputFormat::Png);
    if background == Some(Background::Transparent) && !effective_format.supports_alpha() {
        return Err(CoreError::validation(
            idx,
            "background",
            "transparent background requires output format png or webp",
        ));
    }

    let fields = job.fields.merged_over(&defaults.fields);
    let prompt = if defaults.augment {
        prompt::augment(&job.prompt, &fields)
    } else {
        job.prompt.clone()
    };

    Ok(ImageRequest {
        model: over.model.clone().unwrap_or_else(|| defaults.model.clone()),
        prompt,
        n,
        size,
        quality,
        background,
        output_format,
        output_compression,
        moderation: over.moderation.clone().or_else(|| defaults.moderation.clone()),
        input_fidelity: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::PayloadOverrides;

    fn job_with(overrides: PayloadOverrides) -> Job {
        Job {
            overrides,
            ..Job::from_prompt(1, "a cat")
        }
    }

    #[test]
    fn test_defaults_flow_through() {
        let req = build_request(&Job::from_prompt(1, "a cat"), &RequestDefaults::default())
            .expect("valid request");
        assert_eq!(req.model, DEFAULT_MODEL);
        assert_eq!(req.n, 1);
        assert_eq!(req.size, ImageSize::Square);
        assert_eq!(req.quality, Quality::Auto);
        assert!(req.background.is_none());
        assert_eq!(req.prompt, "Primary request: a cat");
    }

    #[test]
    fn test_job_overrides_win_over_defaults() {
        let mut defaults = RequestDefaults::default();
        defaults.n = 2;
        defaults.quality = Quality::Low;

        let job = job_with(PayloadOverrides {
            n: Some(4),
            size: Some("1536x1024".into()),
            ..Default::default()
        });
        let req = build_request(&job, &defaults).expect("valid request");
        assert_eq!(req.n, 4);
        assert_eq!(req.size, ImageSize::Landscape);
        // Untouched parameter still inherits the default.
        assert_eq!(req.quality, Quality::Low);
    }

    #[test]
    fn test_n_out_of_range_is_rejected() {
        let job = job_with(PayloadOverrides {
            n: Some(11),
            ..Default::default()
        });
        let err = build_request(&job, &RequestDefaults::default()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation { job: 1, field: "n", .. }
        ));
    }

    #[test]
    fn test_bad_size_names_the_field() {
        let job = job_with(PayloadOverrides {
            size: Some("800x600".into()),
            ..Default::default()
        });
        let err = build_request(&job, &RequestDefaults::default()).unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "size", .. }));
    }

    #[test]
    fn test_compression_range() {
        let job = job_with(PayloadOverrides {
            output_compression: Some(101),
            ..Default::default()
        });
        let err = build_request(&job, &RequestDefaults::default()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation { field: "output_compression", .. }
        ));
    }

    #[test]
    fn test_transparent_needs_alpha_format() {
        let job = job_with(PayloadOverrides {
            background: Some("transparent".into()),
            output_format: Some("jpeg".into()),
            ..Default::default()
        });
        let err = build_request(&job, &RequestDefaults::default()).unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "background", .. }));

        let job = job_with(PayloadOverrides {
            background: Some("transparent".into()),
            output_format: Some("webp".into()),
            ..Default::default()
        });
        assert!(build_request(&job, &RequestDefaults::default()).is_ok());
    }

    #[test]
    fn test_jpg_normalizes_to_jpeg() {
        let job = job_with(PayloadOverrides {
            output_format: Some("jpg".into()),
            ..Default::default()
        });
        let req = build_request(&job, &RequestDefaults::default()).expect("valid request");
        assert_eq!(req.output_format, Some(OutputFormat::Jpeg));
    }

    #[test]
    fn test_no_augment_leaves_prompt_untouched() {
        let mut defaults = RequestDefaults::default();
        defaults.augment = false;
        let req = build_request(&Job::from_prompt(1, "a cat"), &defaults).expect("valid");
        assert_eq!(req.prompt, "a cat");
    }

    #[test]
    fn test_absent_values_are_not_serialized() {
        let req = build_request(&Job::from_prompt(1, "a cat"), &RequestDefaults::default())
            .expect("valid request");
        let json = serde_json::to_value(&req).expect("serializes");
        let obj = json.as_object().expect("object");
        assert!(!obj.contains_key("background"));
        assert!(!obj.contains_key("output_compression"));
        assert_eq!(obj["size"], "1024x1024");
    }
}
