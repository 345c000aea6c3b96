//! `generate` command handler

use anyhow::Result;
use clap::Args;
use pictor_client::ImagesClient;
use pictor_core::output::{OutputSpec, plan_single};
use pictor_core::{Job, build_request};
use pictor_runner::media;
use serde_json::json;
use tracing::{info, warn};

use super::{SharedArgs, ensure_api_key, print_written};
use crate::config::Config;

/// Arguments for single-shot generation
#[derive(Debug, Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub shared: SharedArgs,
}

/// Generate a single image request and write its outputs.
pub async fn handle_generate(args: GenerateArgs, config: &Config) -> Result<()> {
    let shared = &args.shared;
    shared.validate()?;

    let prompt = shared.read_prompt()?;
    let defaults = shared.defaults();
    let request = build_request(&Job::from_prompt(1, prompt), &defaults)?;
    let format = request.effective_output_format();

    // `--out` pointing at an existing directory behaves like `--out-dir`.
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
        print_request_preview(&request, &spec)?;
        return Ok(());
    }

    let api_key = api_key.unwrap_or_default();
    let client = ImagesClient::with_base_url(api_key, &config.api_base);

    info!("calling the images API; generation can take a couple of minutes");
    let started = std::time::Instant::now();
    let images = client.generate(&request).await?;
    info!("generation completed in {:.1}s", started.elapsed().as_secs_f64());

    let written = media::write_outputs(
        &images,
        &spec,
        shared.force,
        shared.downscale_max_dim,
        format,
    )?;
    print_written(&written);
    Ok(())
}

fn print_request_preview(
    request: &pictor_core::ImageRequest,
    spec: &OutputSpec,
) -> Result<()> {
    let mut preview = serde_json::to_value(request)?;
    if let Some(obj) = preview.as_object_mut() {
        obj.insert("endpoint".into(), json!("/v1/images/generations"));
        obj.insert("outputs".into(), json!(spec.outputs));
        if let Some(downscaled) = &spec.downscaled {
            obj.insert("outputs_downscaled".into(), json!(downscaled));
        }
    }
    println!("{}", serde_json::to_string_pretty(&preview)?);
    Ok(())
}
