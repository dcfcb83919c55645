//! # Advisory Harness Core
//!
//! Pure logic for Advisory Harness: content digests, ledger record types,
//! the generation cooldown policy, visual-intent heuristics, and the
//! resilient structured-output parser.
//!
//! This crate performs no filesystem or network I/O of its own. Everything
//! here is a function of its inputs (plus any `Read` the caller hands in).

pub mod cooldown;
pub mod digest;
pub mod models;
pub mod parse;
pub mod visual;
