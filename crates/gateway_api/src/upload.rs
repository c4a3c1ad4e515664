//! Presigned image upload: request a target, PUT the bytes, resolve a read URL.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::client::{ensure_success, GatewayClient};
use crate::error::GatewayError;
use crate::headers::{APPLICATION_JSON, HEADER_CONTENT_TYPE};
use crate::url::{read_url, ApiRoute};

pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub object_key: String,
    pub read_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadUrlRequest<'a> {
    file_name: &'a str,
    content_type: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadTarget {
    #[serde(default)]
    upload_url: Option<String>,
    #[serde(default)]
    object_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadTargetEnvelope {
    #[serde(default)]
    body: Option<UploadTarget>,
    #[serde(flatten)]
    flat: UploadTarget,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadUrlBody {
    read_url: String,
}

impl ImageUpload {
    /// Build an upload, rejecting anything outside [`ALLOWED_IMAGE_TYPES`].
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, GatewayError> {
        let content_type = content_type.into();
        if !ALLOWED_IMAGE_TYPES.contains(&content_type.as_str()) {
            return Err(GatewayError::InvalidUpload(format!(
                "unsupported file type '{content_type}'; use JPG, PNG, GIF or WebP"
            )));
        }
        Ok(Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, GatewayError> {
        let content_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(content_type_for_extension)
            .ok_or_else(|| {
                GatewayError::InvalidUpload(format!(
                    "cannot infer an image type for {}",
                    path.display()
                ))
            })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = std::fs::read(path)?;
        Self::new(file_name, content_type, bytes)
    }

    /// Random object name that keeps the original extension.
    pub fn unique_object_name(&self) -> String {
        let id = uuid::Uuid::new_v4();
        match self.file_name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => format!("{id}.{ext}"),
            _ => id.to_string(),
        }
    }
}

pub fn content_type_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Extract `(upload_url, object_key)`, accepting a payload nested under `body`.
pub fn parse_upload_target(body: &str) -> Result<(String, String), GatewayError> {
    let envelope: UploadTargetEnvelope = serde_json::from_str(body)?;
    let target = envelope.body.unwrap_or(envelope.flat);
    match (target.upload_url, target.object_key) {
        (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => Ok((url, key)),
        _ => Err(GatewayError::InvalidUpload(
            "failed to retrieve valid upload credentials".to_owned(),
        )),
    }
}

impl GatewayClient {
    pub async fn upload_image(&self, upload: &ImageUpload) -> Result<UploadedImage, GatewayError> {
        let object_name = upload.unique_object_name();
        let request = UploadUrlRequest {
            file_name: &object_name,
            content_type: &upload.content_type,
        };
        let response = self
            .send_with_auth(
                || {
                    Ok(self
                        .http
                        .post(self.endpoint(ApiRoute::UploadUrl))
                        .headers(self.build_headers(APPLICATION_JSON)?)
                        .json(&request))
                },
                None,
            )
            .await?;
        let body = ensure_success(response, None).await?.text().await?;
        let (upload_url, object_key) = parse_upload_target(&body)?;

        let put = self
            .http
            .put(&upload_url)
            .header(HEADER_CONTENT_TYPE, &upload.content_type)
            .body(upload.bytes.clone())
            .send()
            .await?;
        ensure_success(put, None).await?;
        tracing::debug!(%object_key, bytes = upload.bytes.len(), "uploaded image");

        let read: ReadUrlBody = self
            .get_json(&read_url(&self.config().base_url, &object_key))
            .await?;
        Ok(UploadedImage {
            object_key,
            read_url: read.read_url,
        })
    }
}
