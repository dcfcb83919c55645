//! Reference images sent alongside generation prompts.
//!
//! Images live under `<reference_dir>/<category>/`; only `jpg`, `jpeg` and
//! `png` files are picked up, in name order.

use std::fs;
use std::path::{Path, PathBuf};

use crate::remote::{mime_for_path, Attachment};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    pub filename: String,
    pub data: Vec<u8>,
}

impl ReferenceImage {
    pub fn to_attachment(&self) -> Attachment {
        Attachment {
            mime_type: mime_for_path(Path::new(&self.filename)).to_string(),
            data: self.data.clone(),
        }
    }
}

/// Load up to `max` reference images for `category`.
///
/// A missing folder yields an empty list; unreadable files are logged and
/// skipped, so fewer than `max` images may come back even when more exist.
pub fn load_reference_images(root: &Path, category: &str, max: usize) -> Vec<ReferenceImage> {
    let folder = root.join(category);
    let entries = match fs::read_dir(&folder) {
        Ok(entries) => entries,
        Err(_) => {
            tracing::debug!(folder = %folder.display(), "reference image folder not found");
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_image(p))
        .collect();
    paths.sort();
    paths.truncate(max);

    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        match fs::read(&path) {
            Ok(data) => {
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                tracing::debug!(file = %filename, "loaded reference image");
                images.push(ReferenceImage { filename, data });
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read reference image");
            }
        }
    }
    images
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}
