//! Reconciliation and run orchestration for program collections.
//!
//! This crate ties together the metadata sources, grant parsing, catalog
//! search, and artifact emission into end-to-end workflows
//! (e.g., `run_collections`, `Generator::monitor`).

pub mod monitor;
pub mod pipeline;
pub mod reconcile;
pub mod update;

#[cfg(test)]
mod testing;
