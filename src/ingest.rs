//! Concurrent fan-out ingestion.
//!
//! Coordinates a directory ingest: scan → bounded worker pool →
//! deduplicated upload per file → summary. Workers send each
//! [`UploadOutcome`] back over a channel as soon as it completes; the
//! calling thread collects them and reports progress.
//!
//! A failing file never stops the others, and partial failure is reported
//! in the summary rather than as an error.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};

use advisory_harness_core::models::{IngestSummary, UploadOutcome};

use crate::config::IngestConfig;
use crate::dedup::Deduplicator;
use crate::progress::{IngestProgressEvent, IngestProgressReporter};
use crate::scan::scan_documents;

pub struct FanOutUploader {
    dedup: Arc<Deduplicator>,
    config: IngestConfig,
}

impl FanOutUploader {
    pub fn new(dedup: Arc<Deduplicator>, config: IngestConfig) -> Self {
        Self { dedup, config }
    }

    pub fn pool_size(&self) -> usize {
        self.config.pool_size()
    }

    /// Upload every whitelisted document under `root`.
    ///
    /// # Errors
    ///
    /// Only for problems before any upload starts: a missing root, an
    /// invalid glob, or a worker pool that cannot be built.
    pub fn ingest_directory(
        &self,
        root: &Path,
        progress: &dyn IngestProgressReporter,
    ) -> Result<IngestSummary> {
        progress.report(IngestProgressEvent::Discovering {
            root: root.display().to_string(),
        });

        let files = scan_documents(root, &self.config)?;
        tracing::info!(root = %root.display(), files = files.len(), "discovered documents");

        self.upload_all(&files, progress)
    }

    /// Upload an explicit list of files through the worker pool.
    pub fn upload_all(
        &self,
        files: &[PathBuf],
        progress: &dyn IngestProgressReporter,
    ) -> Result<IngestSummary> {
        if files.is_empty() {
            return Ok(IngestSummary::default());
        }

        let workers = self.pool_size().min(files.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("advisor-upload-{}", i))
            .build()
            .context("failed to build upload worker pool")?;

        let total = files.len() as u64;
        let (tx, rx) = mpsc::channel::<UploadOutcome>();
        let dedup = &self.dedup;

        let results = std::thread::scope(|s| {
            s.spawn(move || {
                pool.install(|| {
                    files.par_iter().for_each_with(tx, |tx, path| {
                        // The receiver outlives every worker; a send error
                        // would only mean the collector panicked.
                        let _ = tx.send(dedup.upload_if_needed(path));
                    });
                });
            });

            let mut results = Vec::with_capacity(files.len());
            for outcome in rx {
                results.push(outcome.clone());
                progress.report(IngestProgressEvent::Uploading {
                    n: results.len() as u64,
                    total,
                    outcome,
                });
            }
            results
        });

        let summary = IngestSummary::from_results(results);
        tracing::info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            uploaded = summary.uploaded(),
            skipped = summary.skipped(),
            workers,
            "ingest complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexResolver;
    use crate::ledger::Ledger;
    use crate::progress::NoProgress;
    use crate::remote::IndexService;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct RecordingIndex {
        uploads: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl IndexService for RecordingIndex {
        fn create_index(&self) -> anyhow::Result<String> {
            Ok("stores/fanout".to_string())
        }
        fn upload_document(&self, _index_id: &str, path: &Path) -> anyhow::Result<()> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            self.seen.lock().unwrap().push(name);
            Ok(())
        }
        fn name(&self) -> &str {
            "recording"
        }
    }

    fn uploader(state: &Path) -> (FanOutUploader, Arc<RecordingIndex>) {
        let service = Arc::new(RecordingIndex {
            uploads: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        });
        let resolver = Arc::new(IndexResolver::new(
            state.join("handle.json"),
            Some(service.clone()),
        ));
        let dedup = Arc::new(Deduplicator::new(
            resolver,
            Ledger::new(state.join("cache.json")),
        ));
        let config = IngestConfig {
            max_workers: 4,
            ..IngestConfig::default()
        };
        (FanOutUploader::new(dedup, config), service)
    }

    #[test]
    fn test_missing_root_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let (uploader, service) = uploader(tmp.path());
        assert!(uploader
            .ingest_directory(&tmp.path().join("absent"), &NoProgress)
            .is_err());
        assert_eq!(service.uploads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_tree_is_empty_summary() {
        let tmp = tempfile::tempdir().unwrap();
        let kb = tmp.path().join("kb");
        std::fs::create_dir_all(&kb).unwrap();
        std::fs::write(kb.join("photo.jpg"), "not a document").unwrap();

        let (uploader, _) = uploader(tmp.path());
        let summary = uploader.ingest_directory(&kb, &NoProgress).unwrap();
        assert_eq!(summary.attempted, 0);
        assert!(summary.results.is_empty());
    }

    #[test]
    fn test_every_file_uploaded_once_then_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let kb = tmp.path().join("kb");
        std::fs::create_dir_all(&kb).unwrap();
        for i in 0..12 {
            std::fs::write(kb.join(format!("doc{}.txt", i)), format!("body {}", i)).unwrap();
        }

        let (uploader, service) = uploader(tmp.path());
        let first = uploader.ingest_directory(&kb, &NoProgress).unwrap();
        assert_eq!(first.attempted, 12);
        assert_eq!(first.uploaded(), 12);

        let second = uploader.ingest_directory(&kb, &NoProgress).unwrap();
        assert_eq!(second.succeeded, 12);
        assert_eq!(second.skipped(), 12);
        assert_eq!(service.uploads.load(Ordering::SeqCst), 12);
        assert_eq!(uploader.dedup.cache().load().len(), 12);
    }
}
