use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderName, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::Client;

use crate::config::{DEFAULT_REQUEST_TIMEOUT_SECS, GENERATE_SITE_PATH};
use crate::error::SubmitFailure;

use super::types::{RawResponse, SubmissionPayload};

/// Carries one payload to the generation service. Only transport failures are
/// errors here; status codes and bodies are judged by `response::classify`.
pub trait Transport: Send + Sync {
    fn submit(
        &self,
        payload: &SubmissionPayload,
    ) -> impl Future<Output = Result<RawResponse, SubmitFailure>> + Send;
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });
        Self {
            client,
            base_url: normalize_base_url(base_url),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn generate_site_url(&self) -> String {
        format!("{}{}", self.base_url, GENERATE_SITE_PATH)
    }

    fn build_form(payload: &SubmissionPayload) -> Result<Form, SubmitFailure> {
        let mut form = Form::new();
        for image in &payload.images {
            let part = Part::bytes(image.bytes.to_vec())
                .file_name(image.file_name.clone())
                .mime_str(&image.content_type)
                .map_err(|e| {
                    SubmitFailure::NetworkError(format!("Invalid content type: {}", e))
                })?;
            form = form.part(image.field.clone(), part);
        }
        for (name, value) in payload.text_fields() {
            form = form.text(name, value.to_string());
        }
        Ok(form)
    }
}

impl Transport for ApiClient {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<RawResponse, SubmitFailure> {
        let form = Self::build_form(payload)?;

        let resp = self
            .client
            .post(self.generate_site_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| SubmitFailure::NetworkError(e.to_string()))?;

        let status = resp.status().as_u16();
        let content_type = header_str(&resp, CONTENT_TYPE);
        let content_disposition = header_str(&resp, CONTENT_DISPOSITION);

        let body = resp
            .bytes()
            .await
            .map_err(|e| SubmitFailure::NetworkError(format!("Reading body failed: {}", e)))?;

        Ok(RawResponse {
            status,
            content_type,
            content_disposition,
            body: body.to_vec(),
        })
    }
}

fn header_str(resp: &reqwest::Response, name: HeaderName) -> Option<String> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Trailing slashes are dropped; a bare host gets `https://`.
fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}
