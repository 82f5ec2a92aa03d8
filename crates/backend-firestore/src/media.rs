//! Media hosting via Cloudinary unsigned uploads.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use client_core::{ClientError, ClientErrorCategory, MediaStore, classify_http_status};

const DEFAULT_UPLOAD_BASE_URL: &str = "https://api.cloudinary.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    /// Unsigned upload preset configured on the Cloudinary account.
    pub upload_preset: String,
    /// Override for tests; defaults to the public API endpoint.
    pub base_url: String,
}

impl CloudinaryConfig {
    pub fn new(cloud_name: impl Into<String>, upload_preset: impl Into<String>) -> Self {
        Self {
            cloud_name: cloud_name.into(),
            upload_preset: upload_preset.into(),
            base_url: DEFAULT_UPLOAD_BASE_URL.to_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// Cloudinary-backed [`MediaStore`].
pub struct CloudinaryUploader {
    http: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryUploader {
    pub fn new(config: CloudinaryConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| {
                ClientError::new(
                    ClientErrorCategory::Config,
                    "http_client_build",
                    err.to_string(),
                )
            })?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl MediaStore for CloudinaryUploader {
    async fn upload(&self, data: Vec<u8>, content_type: &str) -> Result<String, ClientError> {
        let url = format!(
            "{}/v1_1/{}/image/upload",
            self.config.base_url, self.config.cloud_name
        );
        let part = Part::bytes(data)
            .file_name("upload")
            .mime_str(content_type)
            .map_err(|err| {
                ClientError::new(
                    ClientErrorCategory::Validation,
                    "media_content_type",
                    err.to_string(),
                )
            })?;
        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.config.upload_preset.clone());

        debug!(%content_type, "uploading media");
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| {
                ClientError::new(
                    ClientErrorCategory::Network,
                    "media_upload_request",
                    err.to_string(),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ClientError::new(
                classify_http_status(status.as_u16()),
                "media_upload_failed",
                format!("upload rejected with status {status}: {detail}"),
            ));
        }

        let payload: UploadResponse = response.json().await.map_err(|err| {
            ClientError::new(
                ClientErrorCategory::Serialization,
                "media_response_decode",
                err.to_string(),
            )
        })?;
        Ok(payload.secure_url)
    }
}
