//! Knowledge-base discovery.
//!
//! Walks a directory tree and returns the files whose relative path matches
//! the configured include globs (by default, the supported document
//! extensions) and none of the excludes.

use anyhow::{bail, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::IngestConfig;

/// Directories never worth uploading from.
const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

pub fn scan_documents(root: &Path, config: &IngestConfig) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("Knowledge base directory does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs, true)?;

    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes, false)?;

    let mut files = Vec::new();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

/// Build a glob set. Include patterns match extensions case-insensitively
/// so `Guide.PDF` counts as a PDF.
fn build_globset(patterns: &[String], case_insensitive: bool) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel).unwrap();
    }

    #[test]
    fn test_whitelist_and_excludes() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        touch(root, "manual.pdf");
        touch(root, "notes/irrigation.txt");
        touch(root, "notes/deep/varieties.DOCX");
        touch(root, "data/prices.json");
        touch(root, "photo.jpg");
        touch(root, "script.py");
        touch(root, "node_modules/pkg/readme.txt");
        touch(root, ".git/objects/info.txt");

        let files = scan_documents(root, &IngestConfig::default()).unwrap();
        let rel: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();

        assert_eq!(
            rel,
            vec![
                "data/prices.json",
                "manual.pdf",
                "notes/deep/varieties.DOCX",
                "notes/irrigation.txt",
            ]
        );
    }

    #[test]
    fn test_custom_exclude() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "keep.txt");
        touch(tmp.path(), "drafts/skip.txt");
        let config = IngestConfig {
            exclude_globs: vec!["drafts/**".to_string()],
            ..IngestConfig::default()
        };
        let files = scan_documents(tmp.path(), &config).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep.txt"));
    }

    #[test]
    fn test_missing_root_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(scan_documents(&tmp.path().join("nope"), &IngestConfig::default()).is_err());
    }
}
