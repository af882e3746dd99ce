use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SubmitFailure;

pub const DEFAULT_ARCHIVE_NAME: &str = "puzzle_site.zip";

// ── Request ─────────────────────────────────────────────────────────────────

/// One binary part of the multipart request, named `image{ordinal}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePart {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Arc<[u8]>,
}

/// Everything sent to the generation service for one build.
///
/// `filenames` and `indices` follow slot-ordinal order so the service can
/// zip them with the image parts index-wise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionPayload {
    pub images: Vec<ImagePart>,
    pub filenames: Vec<String>,
    pub indices: Vec<String>,
    pub target_url: String,
    pub delivery_mode: String,
    pub title: String,
    pub fail_message: String,
}

impl SubmissionPayload {
    /// Text fields in wire order, repeated keys included.
    pub fn text_fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = Vec::with_capacity(self.filenames.len() * 2 + 4);
        for name in &self.filenames {
            fields.push(("filenames[]", name.as_str()));
        }
        for index in &self.indices {
            fields.push(("indices[]", index.as_str()));
        }
        fields.push(("targetUrl", self.target_url.as_str()));
        fields.push(("deliveryMode", self.delivery_mode.as_str()));
        fields.push(("title", self.title.as_str()));
        fields.push(("failMessage", self.fail_message.as_str()));
        fields
    }

    pub fn total_bytes(&self) -> usize {
        self.images.iter().map(|p| p.bytes.len()).sum()
    }
}

// ── Response ────────────────────────────────────────────────────────────────

/// Transport-level reply, before classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
}

/// JSON reply from the service. Either a deployed site or an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceReply {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub admin_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Downloadable site archive returned by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, &self.bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Archive(Artifact),
    Deployed {
        url: String,
        admin_url: Option<String>,
    },
}

impl SubmissionOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            SubmissionOutcome::Archive(_) => "archive",
            SubmissionOutcome::Deployed { .. } => "deployed",
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            SubmissionOutcome::Deployed { url, .. } => Some(url),
            SubmissionOutcome::Archive(_) => None,
        }
    }
}

// ── Status types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting {
        generation: u64,
    },
    Succeeded(SubmissionOutcome),
    Failed(SubmitFailure),
}

impl SubmissionState {
    pub fn is_submitting(&self) -> bool {
        matches!(self, SubmissionState::Submitting { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            SubmissionState::Idle => "idle",
            SubmissionState::Submitting { .. } => "submitting",
            SubmissionState::Succeeded(_) => "succeeded",
            SubmissionState::Failed(_) => "failed",
        }
    }
}
