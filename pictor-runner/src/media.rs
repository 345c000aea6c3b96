//! Image decode, write, and downscale
//!
//! Turns the API's base64 images into files at the planned destinations.
//! Collision checks happen here, per path, at write time.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use pictor_core::{OutputFormat, OutputSpec};
use tracing::info;

use crate::error::JobError;

/// Decode one base64 image payload.
pub fn decode_image(b64: &str) -> Result<Vec<u8>, JobError> {
    BASE64
        .decode(b64.trim())
        .map_err(|e| JobError::Decode(e.to_string()))
}

/// Resize to fit within `max_dim` on the longest side, preserving aspect
/// ratio and never upscaling, then re-encode as `format`. Alpha is flattened
/// onto white when encoding jpeg.
pub fn downscale(bytes: &[u8], max_dim: u32, format: OutputFormat) -> Result<Vec<u8>, JobError> {
    if max_dim < 1 {
        return Err(JobError::Image("downscale dimension must be >= 1".into()));
    }

    let img = image::load_from_memory(bytes).map_err(|e| JobError::Image(e.to_string()))?;
    let img = if img.width().max(img.height()) > max_dim {
        img.resize(max_dim, max_dim, FilterType::Lanczos3)
    } else {
        img
    };

    let img = match format {
        OutputFormat::Jpeg => DynamicImage::ImageRgb8(flatten_to_white(&img)),
        _ => img,
    };

    let encode_format = match format {
        OutputFormat::Png => ImageFormat::Png,
        OutputFormat::Jpeg => ImageFormat::Jpeg,
        OutputFormat::Webp => ImageFormat::WebP,
    };
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, encode_format)
        .map_err(|e| JobError::Image(e.to_string()))?;
    Ok(buf.into_inner())
}

fn flatten_to_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = f32::from(pixel[3]) / 255.0;
        let blend = |c: u8| (f32::from(c).mul_add(alpha, 255.0 * (1.0 - alpha))).round() as u8;
        out.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    out
}

/// Decode and write each image to its planned path, plus the downscaled
/// sibling when requested. Returns every path written.
///
/// A destination that already exists fails the job unless `force` is set.
pub fn write_outputs(
    images: &[String],
    spec: &OutputSpec,
    force: bool,
    downscale_max_dim: Option<u32>,
    format: OutputFormat,
) -> Result<Vec<PathBuf>, JobError> {
    let mut written = Vec::new();

    for (index, encoded) in images.iter().enumerate() {
        let Some(path) = spec.outputs.get(index) else {
            break;
        };

        let raw = decode_image(encoded)?;
        write_file(path, &raw, force)?;
        written.push(path.clone());

        let derived = spec.downscaled.as_ref().and_then(|d| d.get(index));
        if let (Some(max_dim), Some(derived)) = (downscale_max_dim, derived) {
            let resized = downscale(&raw, max_dim, format)?;
            write_file(derived, &resized, force)?;
            written.push(derived.clone());
        }
    }

    Ok(written)
}

fn write_file(path: &Path, bytes: &[u8], force: bool) -> Result<(), JobError> {
    if path.exists() && !force {
        return Err(JobError::OutputExists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| JobError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    fs::write(path, bytes).map_err(|e| JobError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    info!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn png_bytes(width: u32, height: u32, alpha: u8) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([10, 200, 30, alpha]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .expect("png encodes");
        buf.into_inner()
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        assert!(decode_image("!!not base64!!").is_err());
        assert_eq!(decode_image("aGk=").expect("decodes"), b"hi");
    }

    #[test]
    fn test_downscale_respects_bounding_box() {
        let big = png_bytes(64, 32, 255);
        let out = downscale(&big, 16, OutputFormat::Png).expect("downscales");
        let img = image::load_from_memory(&out).expect("valid png");
        assert_eq!((img.width(), img.height()), (16, 8));
    }

    #[test]
    fn test_downscale_never_upscales() {
        let small = png_bytes(8, 8, 255);
        let out = downscale(&small, 100, OutputFormat::Png).expect("re-encodes");
        let img = image::load_from_memory(&out).expect("valid png");
        assert_eq!((img.width(), img.height()), (8, 8));
    }

    #[test]
    fn test_jpeg_flattens_alpha_onto_white() {
        let transparent = png_bytes(4, 4, 0);
        let out = downscale(&transparent, 100, OutputFormat::Jpeg).expect("encodes");
        let img = image::load_from_memory(&out).expect("valid jpeg").to_rgb8();
        let pixel = img.get_pixel(0, 0);
        // Fully transparent source pixels come out white (within jpeg loss).
        assert!(pixel[0] > 240 && pixel[1] > 240 && pixel[2] > 240);
    }

    #[test]
    fn test_write_outputs_collision_and_force() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.png");
        let spec = OutputSpec::new(vec![path.clone()], None);
        let encoded = BASE64.encode(b"image-bytes");

        let written =
            write_outputs(&[encoded.clone()], &spec, false, None, OutputFormat::Png).expect("writes");
        assert_eq!(written, vec![path.clone()]);

        let err = write_outputs(&[encoded.clone()], &spec, false, None, OutputFormat::Png)
            .unwrap_err();
        assert!(matches!(err, JobError::OutputExists(_)));

        // Force overwrites in place.
        write_outputs(&[encoded], &spec, true, None, OutputFormat::Png).expect("overwrites");
    }

    #[test]
    fn test_write_outputs_creates_parents_and_downscales() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/img.png");
        let spec = OutputSpec::new(vec![path.clone()], Some("-web"));
        let encoded = BASE64.encode(&png_bytes(32, 32, 255));

        let written =
            write_outputs(&[encoded], &spec, false, Some(8), OutputFormat::Png).expect("writes");
        assert_eq!(written.len(), 2);
        assert!(path.exists());
        assert!(dir.path().join("nested/img-web.png").exists());
    }

    #[test]
    fn test_extra_images_beyond_plan_are_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("only.png");
        let spec = OutputSpec::new(vec![path], None);
        let encoded = BASE64.encode(b"bytes");

        let written = write_outputs(
            &[encoded.clone(), encoded],
            &spec,
            false,
            None,
            OutputFormat::Png,
        )
        .expect("writes");
        assert_eq!(written.len(), 1);
    }
}
