//! Flags shared by every subcommand
//!
//! These map one-to-one onto the global request defaults and augmentation
//! fields; range checks run before any job does.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use pictor_core::payload::DEFAULT_MODEL;
use pictor_core::{
    Background, DownscaleOptions, ImageSize, OutputFormat, PromptFields, Quality, RequestDefaults,
};

/// Shared request and output flags
#[derive(Debug, Clone, Args)]
pub struct SharedArgs {
    /// Model to use
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Prompt text
    #[arg(long)]
    pub prompt: Option<String>,

    /// Read the prompt from a file instead
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,

    /// Number of images per request (1-10)
    #[arg(long, default_value_t = 1)]
    pub n: u32,

    /// Image size
    #[arg(long, default_value = "1024x1024")]
    pub size: ImageSize,

    /// Rendering quality
    #[arg(long, default_value = "auto")]
    pub quality: Quality,

    /// Background handling
    #[arg(long)]
    pub background: Option<Background>,

    /// Encoded output format (png, jpeg, webp)
    #[arg(long)]
    pub output_format: Option<OutputFormat>,

    /// Compression level for jpeg/webp (0-100)
    #[arg(long)]
    pub output_compression: Option<u32>,

    /// Moderation level
    #[arg(long)]
    pub moderation: Option<String>,

    /// Output file path (single-shot modes)
    #[arg(long, default_value = "output.png")]
    pub out: PathBuf,

    /// Output directory
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Overwrite existing output files
    #[arg(long)]
    pub force: bool,

    /// Print the request instead of calling the API
    #[arg(long)]
    pub dry_run: bool,

    /// Disable the structured prompt augmentation template
    #[arg(long = "no-augment", action = clap::ArgAction::SetFalse, default_value_t = true)]
    pub augment: bool,

    // Prompt augmentation hints
    #[arg(long)]
    pub use_case: Option<String>,
    #[arg(long)]
    pub scene: Option<String>,
    #[arg(long)]
    pub subject: Option<String>,
    #[arg(long)]
    pub style: Option<String>,
    #[arg(long)]
    pub composition: Option<String>,
    #[arg(long)]
    pub lighting: Option<String>,
    #[arg(long)]
    pub palette: Option<String>,
    #[arg(long)]
    pub materials: Option<String>,
    #[arg(long)]
    pub text: Option<String>,
    #[arg(long)]
    pub constraints: Option<String>,
    #[arg(long)]
    pub negative: Option<String>,

    /// Also write a downscaled copy bounded to this dimension
    #[arg(long)]
    pub downscale_max_dim: Option<u32>,

    /// Suffix for the downscaled copy's filename
    #[arg(long, default_value = pictor_core::output::DEFAULT_DOWNSCALE_SUFFIX)]
    pub downscale_suffix: String,
}

impl SharedArgs {
    /// Range-check the numeric flags; runs before any job is scheduled.
    pub fn validate(&self) -> Result<()> {
        if !(1..=10).contains(&self.n) {
            bail!("--n must be between 1 and 10");
        }
        if let Some(oc) = self.output_compression
            && oc > 100
        {
            bail!("--output-compression must be between 0 and 100");
        }
        if let Some(dim) = self.downscale_max_dim
            && dim < 1
        {
            bail!("--downscale-max-dim must be >= 1");
        }
        Ok(())
    }

    /// Resolve the prompt from `--prompt` or `--prompt-file`, never both.
    pub fn read_prompt(&self) -> Result<String> {
        match (&self.prompt, &self.prompt_file) {
            (Some(_), Some(_)) => bail!("use --prompt or --prompt-file, not both"),
            (Some(prompt), None) => Ok(prompt.trim().to_string()),
            (None, Some(path)) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("prompt file {}: {e}", path.display()))?;
                Ok(text.trim().to_string())
            }
            (None, None) => bail!("missing prompt; use --prompt or --prompt-file"),
        }
    }

    /// Fold the flags into the global request defaults.
    pub fn defaults(&self) -> RequestDefaults {
        RequestDefaults {
            model: self.model.clone(),
            n: self.n,
            size: self.size,
            quality: self.quality,
            background: self.background,
            output_format: self.output_format,
            output_compression: self.output_compression,
            moderation: self.moderation.clone(),
            fields: self.fields(),
            augment: self.augment,
        }
    }

    /// Augmentation hints supplied on the command line.
    pub fn fields(&self) -> PromptFields {
        PromptFields {
            use_case: self.use_case.clone(),
            scene: self.scene.clone(),
            subject: self.subject.clone(),
            style: self.style.clone(),
            composition: self.composition.clone(),
            lighting: self.lighting.clone(),
            palette: self.palette.clone(),
            materials: self.materials.clone(),
            text: self.text.clone(),
            constraints: self.constraints.clone(),
            negative: self.negative.clone(),
        }
    }

    /// Downscale settings when a target dimension was requested.
    pub fn downscale(&self) -> Option<DownscaleOptions> {
        self.downscale_max_dim
            .map(|dim| DownscaleOptions::new(dim, self.downscale_suffix.clone()))
    }

    /// Suffix for planned downscale siblings, when downscaling is on.
    pub fn downscale_suffix_opt(&self) -> Option<&str> {
        self.downscale_max_dim
            .map(|_| self.downscale_suffix.as_str())
    }
}
