//! Record types shared by the ingestion pipeline and the cooldown gate.
//!
//! These are plain values: they carry no behavior beyond construction
//! helpers, and their serde shape is the on-disk format of the ledger
//! documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identity of the remote document index.
///
/// Persisted as `{"id": "...", "created_at": <unix seconds>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIndexHandle {
    pub id: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

impl RemoteIndexHandle {
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_at,
        }
    }

    /// A persisted handle is only usable if it names an index.
    pub fn is_valid(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

/// Upload-cache record, keyed by `content_hash` in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadCacheEntry {
    pub content_hash: String,
    pub filename: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub uploaded_at: DateTime<Utc>,
    pub index_id: String,
}

impl UploadCacheEntry {
    /// True when this entry proves the content already lives in `index_id`.
    pub fn satisfies(&self, index_id: &str) -> bool {
        self.index_id == index_id
    }
}

/// Cooldown record, keyed by `topic_key` in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownEntry {
    pub topic_key: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub last_fired_at: DateTime<Utc>,
}

/// Result of a single deduplicated upload attempt.
///
/// Exactly one of `uploaded`, `skipped`, or `error` describes the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    pub path: PathBuf,
    pub uploaded: bool,
    pub skipped: bool,
    pub error: Option<String>,
}

impl UploadOutcome {
    pub fn uploaded(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            uploaded: true,
            skipped: false,
            error: None,
        }
    }

    pub fn skipped(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            uploaded: false,
            skipped: true,
            error: None,
        }
    }

    pub fn failed(path: impl Into<PathBuf>, error: impl ToString) -> Self {
        Self {
            path: path.into(),
            uploaded: false,
            skipped: false,
            error: Some(error.to_string()),
        }
    }

    /// Uploaded now or already present in the current index.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate result of a directory ingest.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub results: Vec<UploadOutcome>,
}

impl IngestSummary {
    pub fn from_results(results: Vec<UploadOutcome>) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        Self {
            attempted: results.len(),
            succeeded,
            results,
        }
    }

    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }

    pub fn uploaded(&self) -> usize {
        self.results.iter().filter(|r| r.uploaded).count()
    }

    pub fn skipped(&self) -> usize {
        self.results.iter().filter(|r| r.skipped).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_handle_serializes_unix_seconds() {
        let handle = RemoteIndexHandle::new(
            "fileSearchStores/abc",
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        );
        let json = serde_json::to_value(&handle).unwrap();
        assert_eq!(json["id"], "fileSearchStores/abc");
        assert_eq!(json["created_at"], 1_700_000_000);

        let back: RemoteIndexHandle = serde_json::from_value(json).unwrap();
        assert_eq!(back, handle);
    }

    #[test]
    fn test_blank_handle_is_invalid() {
        let handle = RemoteIndexHandle::new("  ", Utc::now());
        assert!(!handle.is_valid());
    }

    #[test]
    fn test_entry_from_stale_index_does_not_satisfy() {
        let entry = UploadCacheEntry {
            content_hash: "h".into(),
            filename: "a.pdf".into(),
            uploaded_at: Utc::now(),
            index_id: "old".into(),
        };
        assert!(entry.satisfies("old"));
        assert!(!entry.satisfies("new"));
    }

    #[test]
    fn test_summary_counts() {
        let summary = IngestSummary::from_results(vec![
            UploadOutcome::uploaded("a"),
            UploadOutcome::skipped("b"),
            UploadOutcome::failed("c", "boom"),
        ]);
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.uploaded(), 1);
        assert_eq!(summary.skipped(), 1);
    }
}
