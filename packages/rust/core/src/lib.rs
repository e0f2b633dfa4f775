//! Validation orchestration and publish-manifest reconciliation for docgraph.
//!
//! This crate ties structural validation, token validation and dry-sync into
//! the per-locale workflows run by the build (see [`orchestrator`]).

pub mod exclusion;
pub mod manifest;
pub mod orchestrator;

pub use exclusion::resolve_excluded_files;
pub use manifest::{ReconcileSummary, load_manifest, reconcile, write_manifest};
pub use orchestrator::{ValidationOrchestrator, ValidationOutcome, Workflow};
