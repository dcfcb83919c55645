//! Contracts for the external collaborators.
//!
//! The harness talks to two remote services: a document index that files
//! are uploaded into, and a generative model. Both are blocking from the
//! harness's point of view and may fail or hang; neither is modeled beyond
//! that.
//!
//! Implementations:
//!
//! | Backend | Index | Model | Module |
//! |---------|-------|-------|--------|
//! | `gemini` | ✓ | ✓ | [`crate::gemini`] |
//! | `local` | ✓ | — | [`crate::local_index`] |
//! | `disabled` | — | — | — |

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

/// A remote, searchable document store.
pub trait IndexService: Send + Sync {
    /// Create a new, empty index and return its identifier.
    fn create_index(&self) -> Result<String>;

    /// Upload one file into `index_id`. Atomic from the caller's view:
    /// either the whole document is indexed or the call fails.
    fn upload_document(&self, index_id: &str, path: &Path) -> Result<()>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}

/// Inline binary input sent alongside a prompt.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Output image shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageConfig {
    pub aspect_ratio: String,
    pub image_size: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: "16:9".to_string(),
            image_size: "1K".to_string(),
        }
    }
}

/// One generation call.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub attachments: Vec<Attachment>,
    pub search_grounding: bool,
    pub image_config: Option<ImageConfig>,
}

impl GenerateRequest {
    pub fn text(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

/// What came back. Either part may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateResponse {
    pub text: Option<String>,
    pub image: Option<Vec<u8>>,
}

impl GenerateResponse {
    pub fn is_empty(&self) -> bool {
        self.text.as_deref().map_or(true, |t| t.trim().is_empty()) && self.image.is_none()
    }
}

/// Best-effort MIME type from a file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "json" => "application/json",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

/// A hosted generative model.
pub trait GenerativeModel: Send + Sync {
    fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse>;

    fn name(&self) -> &str;
}
