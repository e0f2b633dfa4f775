//! Shared types, error model, diagnostics, and configuration for docgraph.
//!
//! This crate is the foundation depended on by all other docgraph crates.
//! It provides:
//! - [`DocgraphError`]: the unified error type
//! - Domain types ([`ContentNode`], [`RawHierarchy`], [`ValidationResult`], [`PublishManifest`])
//! - [`DiagnosticLog`]: the per-file error ledger
//! - Configuration ([`AppConfig`], [`DocsetConfig`], config loading)

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, DocsetConfig, ServiceConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, validate_service_config,
};
pub use diagnostics::{Diagnostic, DiagnosticLog, Severity};
pub use error::{DocgraphError, Result};
pub use types::{
    ContentNode, DEFAULT_LOCALE, HierarchyItem, NodeKind, PublishEntry, PublishManifest,
    RawHierarchy, ValidationResult, locale_eq,
};
