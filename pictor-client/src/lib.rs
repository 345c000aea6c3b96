//! Pictor HTTP Client
//!
//! A thin, type-safe client for the remote images API: JSON generations and
//! multipart edits. Errors come back as tagged [`ClientError`] variants so
//! the batch engine can classify transient vs fatal failures without
//! inspecting message text.

pub mod error;

pub use error::{ClientError, Result};

use std::fmt;

use pictor_core::ImageRequest;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use tracing::debug;

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// One binary image input for the edits endpoint.
#[derive(Debug, Clone)]
pub struct ImageFile {
    /// Original filename, forwarded as the multipart part filename.
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// HTTP client for the images API
///
/// The client is stateless with respect to job data and is shared read-only
/// across all batch tasks.
#[derive(Clone)]
pub struct ImagesClient {
    base_url: String,
    api_key: String,
    http: Client,
}

// The credential must never reach debug or log output.
impl fmt::Debug for ImagesClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagesClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
}

impl ImagesClient {
    /// Create a client against the default API base URL.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client against a custom base URL (trailing slash tolerated).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http: Client::new(),
        }
    }

    /// Create a client with a custom reqwest client (timeouts, proxies, TLS).
    pub fn with_client(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        http: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http,
        }
    }

    /// Get the base URL the client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Generate images for a validated request.
    ///
    /// Returns the base64-encoded images in API order.
    pub async fn generate(&self, request: &ImageRequest) -> Result<Vec<String>> {
        let url = format!("{}/images/generations", self.base_url);
        debug!("POST {url} (model {})", request.model);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(ClientError::from_transport)?;

        self.handle_response(response).await
    }

    /// Edit one or more images against a validated request.
    ///
    /// The request's scalar parameters become multipart text fields; each
    /// input image (and the optional mask) becomes a file part.
    pub async fn edit(
        &self,
        request: &ImageRequest,
        images: &[ImageFile],
        mask: Option<&ImageFile>,
    ) -> Result<Vec<String>> {
        let url = format!("{}/images/edits", self.base_url);
        debug!("POST {url} (model {}, {} image(s))", request.model, images.len());

        let mut form = request_form(request)?;
        // The API expects `image[]` for multiple inputs, plain `image` for one.
        let field = if images.len() > 1 { "image[]" } else { "image" };
        for image in images {
            form = form.part(field.to_string(), file_part(image));
        }
        if let Some(mask) = mask {
            form = form.part("mask", file_part(mask));
        }

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(ClientError::from_transport)?;

        self.handle_response(response).await
    }

    /// Check the status code, classify failures, and pull out the images.
    async fn handle_response(&self, response: reqwest::Response) -> Result<Vec<String>> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<f64>().ok());
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "too many requests".to_string());
            return Err(ClientError::RateLimited {
                retry_after,
                message,
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ImagesResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(format!("invalid JSON response: {e}")))?;

        let images: Vec<String> = body.data.into_iter().filter_map(|d| d.b64_json).collect();
        if images.is_empty() {
            return Err(ClientError::EmptyResponse);
        }
        Ok(images)
    }
}

/// Flatten the request's scalar parameters into multipart text fields.
fn request_form(request: &ImageRequest) -> Result<Form> {
    let value = serde_json::to_value(request)
        .map_err(|e| ClientError::Parse(format!("failed to encode request: {e}")))?;
    let object = match value {
        serde_json::Value::Object(map) => map,
        _ => return Err(ClientError::Parse("request did not encode to an object".into())),
    };

    let mut form = Form::new();
    for (key, value) in object {
        let text = match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        form = form.text(key, text);
    }
    Ok(form)
}

fn file_part(image: &ImageFile) -> Part {
    Part::bytes(image.bytes.clone())
        .file_name(image.filename.clone())
        .mime_str(mime_for(&image.filename))
        // The mime strings below are constant and always parse.
        .unwrap_or_else(|_| Part::bytes(image.bytes.clone()).file_name(image.filename.clone()))
}

fn mime_for(filename: &str) -> &'static str {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "application/octet-stream"
    }
}
