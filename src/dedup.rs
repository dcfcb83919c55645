//! Content-addressed upload deduplication.
//!
//! A file is uploaded only if its SHA-256 digest is not already recorded
//! in the upload cache *for the current index*. Entries written against an
//! older index never suppress an upload to a new one.

use chrono::Utc;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use advisory_harness_core::digest::{hash_reader, DIGEST_CHUNK_SIZE};
use advisory_harness_core::models::{UploadCacheEntry, UploadOutcome};

use crate::error::{HarnessError, HarnessResult};
use crate::index::IndexResolver;
use crate::ledger::Ledger;

/// Stream a file through SHA-256.
pub fn hash_file(path: &Path) -> HarnessResult<String> {
    let file = File::open(path)?;
    Ok(hash_reader(BufReader::new(file), DIGEST_CHUNK_SIZE)?)
}

pub struct Deduplicator {
    resolver: Arc<IndexResolver>,
    cache: Ledger<UploadCacheEntry>,
}

impl Deduplicator {
    pub fn new(resolver: Arc<IndexResolver>, cache: Ledger<UploadCacheEntry>) -> Self {
        Self { resolver, cache }
    }

    pub fn cache(&self) -> &Ledger<UploadCacheEntry> {
        &self.cache
    }

    /// Upload `path` unless identical content is already in the current
    /// index. Never fails: errors come back inside the outcome.
    pub fn upload_if_needed(&self, path: &Path) -> UploadOutcome {
        match self.try_upload(path) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "upload failed");
                UploadOutcome::failed(path, e)
            }
        }
    }

    fn try_upload(&self, path: &Path) -> HarnessResult<UploadOutcome> {
        let handle = self.resolver.ensure_index()?;
        let content_hash = hash_file(path)?;

        if let Some(entry) = self.cache.get(&content_hash) {
            if entry.satisfies(&handle.id) {
                tracing::info!(path = %path.display(), index = %handle.id, "already uploaded, skipping");
                return Ok(UploadOutcome::skipped(path));
            }
            tracing::debug!(
                path = %path.display(),
                cached_index = %entry.index_id,
                index = %handle.id,
                "cached upload belongs to another index"
            );
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        tracing::info!(file = %filename, index = %handle.id, "uploading");
        self.resolver
            .service()?
            .upload_document(&handle.id, path)
            .map_err(|e| HarnessError::TransientIo(format!("{:#}", e)))?;

        let entry = UploadCacheEntry {
            content_hash: content_hash.clone(),
            filename: filename.clone(),
            uploaded_at: Utc::now(),
            index_id: handle.id,
        };
        if !self.cache.put(content_hash, entry) {
            tracing::warn!(file = %filename, "upload succeeded but cache update failed");
        }

        tracing::info!(file = %filename, "uploaded");
        Ok(UploadOutcome::uploaded(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::IndexService;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeIndex {
        uploads: AtomicUsize,
    }

    impl IndexService for FakeIndex {
        fn create_index(&self) -> anyhow::Result<String> {
            Ok("stores/one".to_string())
        }
        fn upload_document(&self, _index_id: &str, _path: &Path) -> anyhow::Result<()> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn name(&self) -> &str {
            "fake"
        }
    }

    #[test]
    fn test_hash_file_matches_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, b"ratoon").unwrap();
        assert_eq!(
            hash_file(&path).unwrap(),
            advisory_harness_core::digest::hash_bytes(b"ratoon")
        );
    }

    #[test]
    fn test_missing_file_is_error_outcome() {
        let tmp = tempfile::tempdir().unwrap();
        let service = Arc::new(FakeIndex {
            uploads: AtomicUsize::new(0),
        });
        let resolver = Arc::new(IndexResolver::new(
            tmp.path().join("h.json"),
            Some(service.clone()),
        ));
        let dedup = Deduplicator::new(resolver, Ledger::new(tmp.path().join("c.json")));

        let outcome = dedup.upload_if_needed(&tmp.path().join("ghost.pdf"));
        assert!(!outcome.is_success());
        assert!(!outcome.uploaded && !outcome.skipped);
        assert_eq!(service.uploads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_same_content_different_name_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let service = Arc::new(FakeIndex {
            uploads: AtomicUsize::new(0),
        });
        let resolver = Arc::new(IndexResolver::new(
            tmp.path().join("h.json"),
            Some(service.clone()),
        ));
        let dedup = Deduplicator::new(resolver, Ledger::new(tmp.path().join("c.json")));

        let a = tmp.path().join("a.txt");
        let b = tmp.path().join("copy-of-a.txt");
        std::fs::write(&a, "same bytes").unwrap();
        std::fs::write(&b, "same bytes").unwrap();

        assert!(dedup.upload_if_needed(&a).uploaded);
        assert!(dedup.upload_if_needed(&b).skipped);
        assert_eq!(service.uploads.load(Ordering::SeqCst), 1);
    }
}
