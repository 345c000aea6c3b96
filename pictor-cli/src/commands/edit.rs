//! `edit` command handler

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use pictor_client::{ImageFile, ImagesClient};
use pictor_core::output::{OutputSpec, plan_single};
use pictor_core::{Job, build_request};
use pictor_runner::media;
use serde_json::json;
use tracing::{info, warn};

use super::{SharedArgs, ensure_api_key, print_written};
use crate::config::Config;

const MAX_IMAGE_BYTES: u64 = 50 * 1024 * 1024;

/// Arguments for image editing
#[derive(Debug, Args)]
pub struct EditArgs {
    #[command(flatten)]
    pub shared: SharedArgs,

    /// Source image(s); repeat the flag to send several
    #[arg(long, required = true)]
    pub image: Vec<PathBuf>,

    /// Optional PNG mask whose transparent areas mark the editable region
    #[arg(long)]
    pub mask: Option<PathBuf>,

    /// How closely the edit should preserve the source image
    #[arg(long)]
    pub input_fidelity: Option<String>,
}

/// Edit one or more source images according to the prompt.
pub async fn handle_edit(args: EditArgs, config: &Config) -> Result<()> {
    let shared = &args.shared;
    shared.validate()?;

    for path in &args.image {
        check_source_image(path, "--image")?;
    }
    if let Some(mask) = &args.mask {
        check_source_image(mask, "--mask")?;
        if mask.extension().is_none_or(|ext| ext != "png") {
            warn!("mask {} is not a .png; the API expects PNG masks", mask.display());
        }
    }

    let prompt = shared.read_prompt()?;
    let defaults = shared.defaults();
    let mut request = build_request(&Job::from_prompt(1, prompt), &defaults)?;
    request.input_fidelity = args.input_fidelity.clone();
    let format = request.effective_output_format();

    let out_dir = shared
        .out_dir
        .clone()
        .or_else(|| shared.out.is_dir().then(|| shared.out.clone()));
    let (paths, warnings) = plan_single(&shared.out, out_dir.as_deref(), format, request.n);
    for warning in warnings {
        warn!("{warning}");
    }
    let spec = OutputSpec::new(paths, shared.downscale_suffix_opt());

    let api_key = ensure_api_key(shared.dry_run)?;

    if shared.dry_run {
        print_edit_preview(&args, &request, &spec)?;
        return Ok(());
    }

    let images = read_image_files(&args.image)?;
    let mask = args.mask.as_deref().map(read_image_file).transpose()?;

    let client = ImagesClient::with_base_url(api_key.unwrap_or_default(), &config.api_base);

    info!("calling the images API; editing can take a couple of minutes");
    let started = std::time::Instant::now();
    let results = client.edit(&request, &images, mask.as_ref()).await?;
    info!("edit completed in {:.1}s", started.elapsed().as_secs_f64());

    let written = media::write_outputs(
        &results,
        &spec,
        shared.force,
        shared.downscale_max_dim,
        format,
    )?;
    print_written(&written);
    Ok(())
}

/// Verify the file exists and warn when it is unusually large.
fn check_source_image(path: &Path, flag: &str) -> Result<()> {
    let meta = std::fs::metadata(path)
        .map_err(|_| anyhow::anyhow!("{flag} file not found: {}", path.display()))?;
    if meta.len() > MAX_IMAGE_BYTES {
        warn!(
            "{} is {} MB; the API may reject files over 50 MB",
            path.display(),
            meta.len() / (1024 * 1024)
        );
    }
    Ok(())
}

fn read_image_files(paths: &[PathBuf]) -> Result<Vec<ImageFile>> {
    paths.iter().map(|p| read_image_file(p)).collect()
}

fn read_image_file(path: &Path) -> Result<ImageFile> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading image {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image.png".to_string());
    Ok(ImageFile { filename, bytes })
}

fn print_edit_preview(args: &EditArgs, request: &pictor_core::ImageRequest, spec: &OutputSpec) -> Result<()> {
    let mut preview = serde_json::to_value(request)?;
    if let Some(obj) = preview.as_object_mut() {
        obj.insert("endpoint".into(), json!("/v1/images/edits"));
        obj.insert(
            "images".into(),
            json!(
                args.image
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
            ),
        );
        if let Some(mask) = &args.mask {
            obj.insert("mask".into(), json!(mask.display().to_string()));
        }
        obj.insert("outputs".into(), json!(spec.outputs));
        if let Some(downscaled) = &spec.downscaled {
            obj.insert("outputs_downscaled".into(), json!(downscaled));
        }
    }
    println!("{}", serde_json::to_string_pretty(&preview)?);
    Ok(())
}
