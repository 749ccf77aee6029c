//! filingsync runner: reconciliation orchestration, coverage, and outputs.
//!
//! This crate builds on `filingsync-core` to provide:
//! - Run configuration (TOML) with a content-addressed run id
//! - The reconciliation orchestrator (bounded worker pool, per-identifier
//!   failure isolation, deadlines, cancellation)
//! - The coverage report
//! - CSV/JSON output persistence and the run manifest

pub mod config;
pub mod coverage;
pub mod export;
pub mod reconcile;

pub use config::{OutputConfig, ReconcileConfig, RunId};
pub use coverage::{CoverageEntry, CoverageReport, Issue, OutcomeStatus, Stage};
pub use export::{save_outputs, RunManifest, SavedOutputs};
pub use reconcile::{
    normalize_identifiers, ReconcileOutput, ReconcileProgress, Reconciler, TracingProgress,
};
