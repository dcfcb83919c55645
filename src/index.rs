//! Remote index handle resolution.
//!
//! The handle naming the remote document index is created once per
//! deployment and persisted locally so restarts reuse it. Resolution
//! re-reads the persisted document each time, so a rotated handle (the
//! document now names a different index) is picked up without a restart.
//!
//! Persistence is best-effort. If the handle cannot be written, the one
//! created by this process is kept in memory and reused for the rest of
//! the process lifetime instead of creating another index per call.

use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use advisory_harness_core::models::RemoteIndexHandle;

use crate::error::{HarnessError, HarnessResult};
use crate::ledger::write_atomic;
use crate::remote::IndexService;

/// Read the persisted handle, if present and valid.
pub fn load_handle(path: &Path) -> Option<RemoteIndexHandle> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read persisted index handle");
            return None;
        }
    };
    match serde_json::from_str::<RemoteIndexHandle>(&content) {
        Ok(handle) if handle.is_valid() => Some(handle),
        Ok(_) => {
            tracing::warn!(path = %path.display(), "persisted index handle has no id");
            None
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "persisted index handle unparsable");
            None
        }
    }
}

/// Persist a handle. Returns whether the write landed.
pub fn save_handle(path: &Path, handle: &RemoteIndexHandle) -> bool {
    match write_atomic(path, handle) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to persist index handle (a new index will be created on restart)"
            );
            false
        }
    }
}

/// Resolves the current [`RemoteIndexHandle`], creating one if needed.
pub struct IndexResolver {
    path: PathBuf,
    service: Option<Arc<dyn IndexService>>,
    created: Mutex<Option<RemoteIndexHandle>>,
}

impl IndexResolver {
    pub fn new(path: impl Into<PathBuf>, service: Option<Arc<dyn IndexService>>) -> Self {
        Self {
            path: path.into(),
            service,
            created: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn service(&self) -> HarnessResult<&Arc<dyn IndexService>> {
        self.service
            .as_ref()
            .ok_or_else(|| HarnessError::NotConfigured("no remote index service".to_string()))
    }

    /// Return the current handle, creating and persisting one if none is
    /// stored.
    ///
    /// No liveness check is made against the remote side: a stale handle
    /// only shows up as failing uploads.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::NotConfigured`] without an index service.
    /// - [`HarnessError::TransientIo`] if index creation fails.
    pub fn ensure_index(&self) -> HarnessResult<RemoteIndexHandle> {
        let service = self.service()?;

        // Serializes creation: concurrent callers wait here rather than
        // each creating an index.
        let mut created = self.created.lock().unwrap_or_else(|p| p.into_inner());

        if let Some(handle) = load_handle(&self.path) {
            tracing::debug!(index = %handle.id, "reusing persisted index");
            return Ok(handle);
        }

        if let Some(handle) = created.as_ref() {
            tracing::debug!(index = %handle.id, "reusing in-process index");
            return Ok(handle.clone());
        }

        tracing::info!(backend = service.name(), "creating new remote index");
        let id = service
            .create_index()
            .map_err(|e| HarnessError::TransientIo(format!("index creation failed: {:#}", e)))?;
        let handle = RemoteIndexHandle::new(id, Utc::now());

        if save_handle(&self.path, &handle) {
            tracing::info!(index = %handle.id, path = %self.path.display(), "created and persisted remote index");
            *created = None;
        } else {
            *created = Some(handle.clone());
        }
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingIndex {
        creates: AtomicUsize,
    }

    impl IndexService for CountingIndex {
        fn create_index(&self) -> anyhow::Result<String> {
            let n = self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(format!("stores/{}", n))
        }
        fn upload_document(&self, _index_id: &str, _path: &Path) -> anyhow::Result<()> {
            Ok(())
        }
        fn name(&self) -> &str {
            "counting"
        }
    }

    fn counting() -> Arc<CountingIndex> {
        Arc::new(CountingIndex {
            creates: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_not_configured_without_service() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = IndexResolver::new(tmp.path().join("h.json"), None);
        assert!(resolver.ensure_index().unwrap_err().is_not_configured());
    }

    #[test]
    fn test_created_once_then_reused() {
        let tmp = tempfile::tempdir().unwrap();
        let service = counting();
        let path = tmp.path().join("h.json");

        let first = IndexResolver::new(&path, Some(service.clone())).ensure_index().unwrap();
        // A fresh resolver stands in for a process restart.
        let second = IndexResolver::new(&path, Some(service.clone())).ensure_index().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(service.creates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_corrupt_handle_is_replaced() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("h.json");
        fs::write(&path, "{\"name\": 12").unwrap();

        let service = counting();
        let handle = IndexResolver::new(&path, Some(service.clone())).ensure_index().unwrap();
        assert_eq!(handle.id, "stores/0");
        assert_eq!(load_handle(&path).unwrap().id, "stores/0");
    }

    #[test]
    fn test_unpersistable_handle_reused_in_process() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "x").unwrap();

        let service = counting();
        let resolver = IndexResolver::new(blocker.join("h.json"), Some(service.clone()));
        let a = resolver.ensure_index().unwrap();
        let b = resolver.ensure_index().unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(service.creates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_deleted_handle_forces_recreation() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("h.json");
        let service = counting();
        let resolver = IndexResolver::new(&path, Some(service.clone()));

        let first = resolver.ensure_index().unwrap();
        fs::remove_file(&path).unwrap();
        let second = resolver.ensure_index().unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(service.creates.load(Ordering::SeqCst), 2);
        assert_eq!(load_handle(&path).unwrap().id, second.id);
    }

    #[test]
    fn test_concurrent_callers_create_one_index() {
        let tmp = tempfile::tempdir().unwrap();
        let service = counting();
        let resolver = IndexResolver::new(tmp.path().join("h.json"), Some(service.clone()));

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| resolver.ensure_index().unwrap());
            }
        });
        assert_eq!(service.creates.load(Ordering::SeqCst), 1);
    }
}
