//! Persisted key → record documents.
//!
//! A ledger is one small JSON object on disk mapping string keys to
//! records. The upload cache and the cooldown map are separate ledgers.
//! There is no in-memory copy: every read goes to disk and every write
//! replaces the whole document.
//!
//! Ledger state is an optimization, never a correctness requirement, so
//! neither direction fails the caller:
//!
//! - [`load_document`] returns an empty map when the file is missing or
//!   unparsable.
//! - [`save_document`] logs and swallows write errors.
//!
//! Writes go to a sibling temp file that is renamed over the document.
//! Read-modify-write through [`Ledger::update`] is serialized per
//! `Ledger` instance; separate processes sharing a document are still
//! last-writer-wins.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Load a ledger document. Missing or corrupt documents read as empty.
pub fn load_document<V: DeserializeOwned>(path: &Path) -> BTreeMap<String, V> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ledger unreadable, treating as empty");
            return BTreeMap::new();
        }
    };

    match serde_json::from_str(&content) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ledger unparsable, treating as empty");
            BTreeMap::new()
        }
    }
}

/// Persist a ledger document. Returns whether the write landed; failures
/// are logged, never raised.
pub fn save_document<V: Serialize>(path: &Path, map: &BTreeMap<String, V>) -> bool {
    match write_atomic(path, map) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to persist ledger");
            false
        }
    }
}

/// Serialize `value` as JSON and atomically replace `path` with it.
pub(crate) fn write_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    let body = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
    write_bytes_atomic(path, &body)
}

/// Atomically replace `path` with `bytes`, creating parent directories.
pub(crate) fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}

/// A typed handle on one ledger document.
pub struct Ledger<V> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _record: PhantomData<fn() -> V>,
}

impl<V> Ledger<V>
where
    V: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> BTreeMap<String, V> {
        load_document(&self.path)
    }

    pub fn save(&self, map: &BTreeMap<String, V>) -> bool {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        save_document(&self.path, map)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.load().remove(key)
    }

    /// Re-read the document, apply `f`, and write it back, holding this
    /// ledger's lock for the whole cycle. Returns `f`'s result and whether
    /// the write landed.
    pub fn update<R>(&self, f: impl FnOnce(&mut BTreeMap<String, V>) -> R) -> (R, bool) {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut map = load_document(&self.path);
        let result = f(&mut map);
        let saved = save_document(&self.path, &map);
        (result, saved)
    }

    /// Insert or overwrite one record.
    pub fn put(&self, key: impl Into<String>, value: V) -> bool {
        let key = key.into();
        self.update(move |map| {
            map.insert(key, value);
        })
        .1
    }
}
