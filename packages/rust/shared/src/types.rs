//! Core domain types for docgraph content hierarchies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The canonical source-language locale every translation is validated against.
pub const DEFAULT_LOCALE: &str = "en-us";

/// Compare two locale tags the way the hierarchy service does (case-insensitive).
pub fn locale_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

// ---------------------------------------------------------------------------
// ContentNode
// ---------------------------------------------------------------------------

/// What role a node plays in the learning hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// Top-level collection of modules.
    LearningPath,
    /// A module grouping units; may be shared by several learning paths.
    Module,
    /// A single page of content. Must be referenced by a module.
    Unit,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::LearningPath => "learning-path",
            Self::Module => "module",
            Self::Unit => "unit",
        };
        f.write_str(s)
    }
}

/// One unit of the content hierarchy, as produced by the content parser.
///
/// Fields that the structural validator checks for presence are kept as
/// plain strings; an empty value counts as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentNode {
    /// Stable identifier, unique within one validation pass.
    #[serde(default)]
    pub uid: String,
    /// Node role.
    pub kind: NodeKind,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Source file path, relative to the docset root.
    #[serde(default)]
    pub source_path: String,
    /// Ordered child identifiers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    /// Locale tag of this node's content.
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Localized token fields (free-form, checked against the fallback docset).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tokens: BTreeMap<String, serde_json::Value>,
}

fn default_locale() -> String {
    DEFAULT_LOCALE.into()
}

// ---------------------------------------------------------------------------
// RawHierarchy
// ---------------------------------------------------------------------------

/// A single node in a [`RawHierarchy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyItem {
    pub uid: String,
    pub kind: NodeKind,
    pub title: String,
    pub source_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tokens: BTreeMap<String, serde_json::Value>,
}

/// Serializable projection of a validated node set.
///
/// Built fresh per validation run and never mutated afterwards; a new run
/// produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHierarchy {
    /// Output path of the docset the hierarchy was built for.
    pub output_path: String,
    /// Top-level node identifiers, in input order.
    pub roots: Vec<String>,
    /// Every node, in input order.
    pub items: Vec<HierarchyItem>,
}

// ---------------------------------------------------------------------------
// ValidationResult
// ---------------------------------------------------------------------------

/// Per-locale verdict returned by the remote hierarchy service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub locale: String,
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationResult {
    /// The optimistic result substituted when the service cannot be reached.
    pub fn fail_open(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            is_valid: true,
            message: None,
        }
    }
}

// ---------------------------------------------------------------------------
// PublishManifest
// ---------------------------------------------------------------------------

/// One published file as recorded by the build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishEntry {
    pub source_path: String,
    pub output_path: String,
    #[serde(default)]
    pub has_error: bool,
    /// Fields written by other build stages, carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The build's `.publish.json`, in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishManifest {
    #[serde(default)]
    pub files: Vec<PublishEntry>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
