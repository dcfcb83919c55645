//! # Advisory Harness
//!
//! The reliability core of an AI advisory back-end: it makes slow,
//! metered, failure-prone operations safe to call repeatedly and
//! concurrently.
//!
//! - **Ingestion** uploads a knowledge base into a remote document index,
//!   skipping any file whose content is already there, with a bounded pool
//!   of workers.
//! - **Cooldown gate** keeps expensive image generations for the same topic
//!   from firing more than once per window.
//! - **Structured-output parsing** pulls a record out of free-form model
//!   text (see [`advisory_harness_core::parse`]).
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌───────────────┐
//! │  scan      │──▶│ fan-out pool │──▶│ deduplicator  │──▶ IndexService
//! │ (globset)  │   │   (rayon)    │   │ hash + ledger │
//! └────────────┘   └──────────────┘   └───────────────┘
//!
//! topic ──▶ cooldown gate ──▶ GenerativeModel ──▶ PNG / SVG / record
//!            (ledger)                              (parser cascade)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! advisor index                          # resolve (or create) the remote index
//! advisor ingest                         # upload ./knowledge_base
//! advisor gate check "rice blast"        # would a generation run now?
//! echo "{'a': True}" | advisor parse     # decode model output
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`ledger`] | Persisted key → record documents |
//! | [`remote`] | Index and model contracts |
//! | [`gemini`] | Gemini REST backend |
//! | [`local_index`] | Directory-backed index |
//! | [`index`] | Remote index handle resolution |
//! | [`dedup`] | Content-addressed upload deduplication |
//! | [`scan`] | Knowledge-base discovery |
//! | [`ingest`] | Concurrent fan-out uploader |
//! | [`progress`] | Ingest progress reporting |
//! | [`gate`] | Persisted cooldown gate |
//! | [`infographic`] | Gated image and SVG generation |
//! | [`classify`] | Visual-vs-text query classification |
//! | [`reference`] | Reference image loading |
//! | [`harness`] | The wired-up context |

pub mod classify;
pub mod config;
pub mod dedup;
pub mod error;
pub mod gate;
pub mod gemini;
pub mod harness;
pub mod index;
pub mod infographic;
pub mod ingest;
pub mod ledger;
pub mod local_index;
pub mod progress;
pub mod reference;
pub mod remote;
pub mod scan;
