//! Content hierarchy validation and projection.
//!
//! This crate provides:
//! - [`structure`]: exhaustive structural validation of a content-node graph
//! - [`builder`]: projection of validated nodes into a [`RawHierarchy`](docgraph_shared::RawHierarchy)
//! - [`tokens`]: localized token checks against the fallback docset
//! - [`source`]: the [`NodeSource`] seam and its JSON implementation

pub mod builder;
pub mod source;
pub mod structure;
pub mod tokens;

pub use builder::{build_hierarchy, hierarchy_digest};
pub use source::{JsonNodeSource, NodeSource, relative_to_docset};
pub use structure::{StructuralReport, file_key, validate_structure};
pub use tokens::{DependencyManifest, TokenContext, TokenReport, validate_tokens};
