//! Ingest progress reporting.
//!
//! Reports what `advisor ingest` is doing while uploads are in flight.
//! Progress goes to **stderr** so stdout stays parseable for scripts.

use std::io::Write;

use advisory_harness_core::models::UploadOutcome;

/// A single progress event for an ingest run.
#[derive(Clone, Debug)]
pub enum IngestProgressEvent {
    /// Walking the knowledge base (no total yet).
    Discovering { root: String },
    /// `n` of `total` files have finished; `outcome` is the latest one.
    Uploading {
        n: u64,
        total: u64,
        outcome: UploadOutcome,
    },
}

/// Reports ingest progress. Implementations must tolerate being called
/// from the orchestrating thread while workers run.
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

fn outcome_label(outcome: &UploadOutcome) -> &'static str {
    if outcome.error.is_some() {
        "failed"
    } else if outcome.skipped {
        "skipped"
    } else {
        "uploaded"
    }
}

/// Human-friendly progress on stderr: "ingest  12 / 40  uploaded  manual.pdf".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Discovering { root } => {
                format!("ingest {}  discovering...\n", root)
            }
            IngestProgressEvent::Uploading { n, total, outcome } => {
                let name = outcome
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                format!(
                    "ingest  {} / {}  {:<8}  {}\n",
                    format_number(*n),
                    format_number(*total),
                    outcome_label(outcome),
                    name
                )
            }
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let obj = match &event {
            IngestProgressEvent::Discovering { root } => serde_json::json!({
                "event": "progress",
                "phase": "discovering",
                "root": root,
            }),
            IngestProgressEvent::Uploading { n, total, outcome } => serde_json::json!({
                "event": "progress",
                "phase": "uploading",
                "n": n,
                "total": total,
                "path": outcome.path.display().to_string(),
                "status": outcome_label(outcome),
                "error": outcome.error,
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
