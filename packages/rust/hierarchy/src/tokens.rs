//! Localized token validation for translated builds.
//!
//! A localized node may only carry tokens that also exist, with the same
//! shape, on its counterpart in the default-locale (fallback) docset. The
//! counterpart is located through the build's dependency manifest and read
//! from disk; nothing here touches the network.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use docgraph_shared::{ContentNode, DiagnosticLog, DocgraphError, Result};

use crate::source::{NodeSource, relative_to_docset};
use crate::structure::file_key;

/// Diagnostic codes recorded by the token validator.
pub mod codes {
    pub const FALLBACK_UNAVAILABLE: &str = "fallback-unavailable";
    pub const FALLBACK_UNREADABLE: &str = "fallback-unreadable";
    pub const FALLBACK_MISSING: &str = "fallback-missing";
    pub const TOKEN_MISSING: &str = "token-missing";
    pub const TOKEN_MISMATCH: &str = "token-mismatch";
}

// ---------------------------------------------------------------------------
// DependencyManifest
// ---------------------------------------------------------------------------

/// Build-produced map from localized source files to their fallback files.
///
/// Paths are relative to their docset roots. Files not listed resolve to the
/// same relative path in the fallback docset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyManifest {
    #[serde(default)]
    pub fallbacks: BTreeMap<String, String>,
}

impl DependencyManifest {
    /// Load the manifest; a missing file yields an empty manifest.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "dependency manifest not found, using identity mapping");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| DocgraphError::io(path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| DocgraphError::manifest(path, format!("invalid dependency manifest: {e}")))
    }

    /// The fallback-docset path for a localized relative path.
    pub fn fallback_for<'a>(&'a self, relative: &'a str) -> &'a str {
        self.fallbacks
            .get(relative)
            .map(String::as_str)
            .unwrap_or(relative)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Where localized nodes are checked against.
#[derive(Debug, Clone, Copy)]
pub struct TokenContext<'a> {
    pub dependencies: &'a DependencyManifest,
    /// Root of the localized docset.
    pub docset_path: &'a Path,
    /// Root of the default-locale docset, when the build has one.
    pub fallback_docset_path: Option<&'a Path>,
}

/// Outcome of [`validate_tokens`].
#[derive(Debug, Clone, Default)]
pub struct TokenReport {
    pub is_valid: bool,
    /// Source files of nodes that failed token validation.
    pub failed_files: BTreeSet<String>,
}

/// Check every localized node's tokens against its fallback counterpart.
#[instrument(skip_all, fields(node_count = nodes.len()))]
pub fn validate_tokens(
    nodes: &[ContentNode],
    ctx: TokenContext<'_>,
    source: &dyn NodeSource,
    log: &DiagnosticLog,
) -> TokenReport {
    let mut fallback_files: HashMap<String, Option<Vec<ContentNode>>> = HashMap::new();
    let mut failed_files = BTreeSet::new();

    for node in nodes.iter().filter(|n| !n.tokens.is_empty()) {
        let file = file_key(node);
        let problems = check_node(node, ctx, source, &mut fallback_files);
        if problems.is_empty() {
            continue;
        }
        for (code, message) in problems {
            log.error(file.clone(), code, message);
        }
        failed_files.insert(file);
    }

    let is_valid = failed_files.is_empty();
    info!(failed_files = failed_files.len(), is_valid, "token validation complete");

    TokenReport {
        is_valid,
        failed_files,
    }
}

fn check_node(
    node: &ContentNode,
    ctx: TokenContext<'_>,
    source: &dyn NodeSource,
    cache: &mut HashMap<String, Option<Vec<ContentNode>>>,
) -> Vec<(&'static str, String)> {
    let Some(fallback_root) = ctx.fallback_docset_path else {
        return vec![(
            codes::FALLBACK_UNAVAILABLE,
            format!(
                "`{}` has localized tokens but the build has no fallback docset",
                node.uid
            ),
        )];
    };

    let relative = relative_to_docset(ctx.docset_path, &node.source_path);
    let fallback_relative = ctx.dependencies.fallback_for(&relative).to_string();

    if !cache.contains_key(&fallback_relative) {
        match source.load_file(fallback_root, &fallback_relative) {
            Ok(loaded) => {
                cache.insert(fallback_relative.clone(), loaded);
            }
            Err(e) => {
                return vec![(
                    codes::FALLBACK_UNREADABLE,
                    format!("cannot read fallback file {fallback_relative}: {e}"),
                )];
            }
        }
    }

    let candidates = cache
        .get(&fallback_relative)
        .and_then(Option::as_ref)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let Some(fallback) = find_counterpart(node, candidates) else {
        return vec![(
            codes::FALLBACK_MISSING,
            format!(
                "no fallback for `{}` found in {fallback_relative}",
                node.uid
            ),
        )];
    };

    let mut problems = Vec::new();
    for (key, value) in &node.tokens {
        match fallback.tokens.get(key) {
            None => problems.push((
                codes::TOKEN_MISSING,
                format!("token `{key}` of `{}` does not exist in the fallback", node.uid),
            )),
            Some(expected) => {
                let mut mismatches = Vec::new();
                compare_shape(value, expected, key, &mut mismatches);
                problems.extend(
                    mismatches
                        .into_iter()
                        .map(|m| (codes::TOKEN_MISMATCH, format!("`{}`: {m}", node.uid))),
                );
            }
        }
    }
    problems
}

fn find_counterpart<'a>(node: &ContentNode, candidates: &'a [ContentNode]) -> Option<&'a ContentNode> {
    candidates
        .iter()
        .find(|c| c.uid == node.uid)
        .or(match candidates {
            [only] => Some(only),
            _ => None,
        })
}

/// Collect every place where `local` has structure `fallback` lacks.
fn compare_shape(local: &Value, fallback: &Value, path: &str, out: &mut Vec<String>) {
    match (local, fallback) {
        (Value::Object(local), Value::Object(fallback)) => {
            for (key, value) in local {
                let child = format!("{path}.{key}");
                match fallback.get(key) {
                    Some(expected) => compare_shape(value, expected, &child, out),
                    None => out.push(format!("`{child}` does not exist in the fallback")),
                }
            }
        }
        (Value::Array(local), Value::Array(fallback)) => {
            if local.len() != fallback.len() {
                out.push(format!(
                    "`{path}` has {} items, fallback has {}",
                    local.len(),
                    fallback.len()
                ));
                return;
            }
            for (i, (value, expected)) in local.iter().zip(fallback).enumerate() {
                compare_shape(value, expected, &format!("{path}[{i}]"), out);
            }
        }
        (local, fallback) if kind_of(local) == kind_of(fallback) => {}
        (local, fallback) => out.push(format!(
            "`{path}` is {} but fallback is {}",
            kind_of(local),
            kind_of(fallback)
        )),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
