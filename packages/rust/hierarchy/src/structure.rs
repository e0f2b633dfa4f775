//! Structural validation of a raw content-node graph.
//!
//! Every check runs to completion: one pass reports every broken reference,
//! missing field, duplicate identifier, nesting violation and orphan unit in
//! the docset, each keyed by the source file it was found in.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, info, instrument};

use docgraph_shared::{ContentNode, DiagnosticLog, NodeKind};

/// Diagnostic codes recorded by the structural validator.
pub mod codes {
    pub const MISSING_FIELD: &str = "missing-field";
    pub const DUPLICATE_UID: &str = "duplicate-uid";
    pub const UNRESOLVED_CHILD: &str = "unresolved-child";
    pub const INVALID_NESTING: &str = "invalid-nesting";
    pub const ORPHAN_UNIT: &str = "orphan-unit";
}

/// Outcome of [`validate_structure`].
#[derive(Debug, Clone)]
pub struct StructuralReport {
    /// `false` if any structural error was found.
    pub is_valid: bool,
    /// Addressable nodes in input order. Later duplicates and nodes without
    /// a `uid` are dropped.
    pub nodes: Vec<ContentNode>,
    /// Source files that carry at least one structural error.
    pub failed_files: BTreeSet<String>,
}

/// Validate the node set of one docset/locale build.
#[instrument(skip_all, fields(node_count = nodes.len()))]
pub fn validate_structure(nodes: &[ContentNode], log: &DiagnosticLog) -> StructuralReport {
    let mut failed_files = BTreeSet::new();
    let mut fail = |file: String, code: &str, message: String| {
        log.error(file.clone(), code, message);
        failed_files.insert(file);
    };

    // Required fields
    for node in nodes {
        for field in missing_fields(node) {
            fail(
                file_key(node),
                codes::MISSING_FIELD,
                format!("{} `{}` is missing required field `{field}`", node.kind, node.uid),
            );
        }
    }

    // Identifier uniqueness: first occurrence wins
    let mut kept: Vec<ContentNode> = Vec::with_capacity(nodes.len());
    let mut first_seen: HashMap<&str, &ContentNode> = HashMap::new();
    for node in nodes.iter().filter(|n| !n.uid.is_empty()) {
        match first_seen.get(node.uid.as_str()) {
            Some(first) => {
                let message = format!(
                    "uid `{}` is declared in both {} and {}",
                    node.uid,
                    file_key(first),
                    file_key(node)
                );
                fail(file_key(first), codes::DUPLICATE_UID, message.clone());
                fail(file_key(node), codes::DUPLICATE_UID, message);
            }
            None => {
                first_seen.insert(&node.uid, node);
                kept.push(node.clone());
            }
        }
    }

    // Child references and nesting
    let by_uid: HashMap<&str, &ContentNode> =
        kept.iter().map(|n| (n.uid.as_str(), n)).collect();
    let mut referenced: HashSet<&str> = HashSet::new();

    for node in &kept {
        for child_uid in &node.children {
            if child_uid == &node.uid {
                fail(
                    file_key(node),
                    codes::INVALID_NESTING,
                    format!("{} `{}` lists itself as a child", node.kind, node.uid),
                );
                continue;
            }

            let Some(child) = by_uid.get(child_uid.as_str()) else {
                fail(
                    file_key(node),
                    codes::UNRESOLVED_CHILD,
                    format!(
                        "{} `{}` references unknown child `{child_uid}`",
                        node.kind, node.uid
                    ),
                );
                continue;
            };

            referenced.insert(child.uid.as_str());

            if !allowed_child(node.kind, child.kind) {
                fail(
                    file_key(node),
                    codes::INVALID_NESTING,
                    format!(
                        "{} `{}` cannot contain {} `{}`",
                        node.kind, node.uid, child.kind, child.uid
                    ),
                );
            }
        }
    }

    // Orphans
    for node in kept
        .iter()
        .filter(|n| n.kind == NodeKind::Unit && !referenced.contains(n.uid.as_str()))
    {
        fail(
            file_key(node),
            codes::ORPHAN_UNIT,
            format!("unit `{}` is not referenced by any module", node.uid),
        );
    }

    let is_valid = failed_files.is_empty();
    if is_valid {
        debug!(nodes = kept.len(), "hierarchy is structurally valid");
    } else {
        info!(
            nodes = kept.len(),
            failed_files = failed_files.len(),
            "hierarchy has structural errors"
        );
    }

    StructuralReport {
        is_valid,
        nodes: kept,
        failed_files,
    }
}

/// The key diagnostics for a node are recorded under.
///
/// Falls back to the uid when the parser could not attribute the node to a file.
pub fn file_key(node: &ContentNode) -> String {
    if !node.source_path.is_empty() {
        node.source_path.clone()
    } else if !node.uid.is_empty() {
        node.uid.clone()
    } else {
        "<unknown>".to_string()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn missing_fields(node: &ContentNode) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if node.uid.trim().is_empty() {
        missing.push("uid");
    }
    if node.title.trim().is_empty() {
        missing.push("title");
    }
    if node.source_path.trim().is_empty() {
        missing.push("source_path");
    }
    missing
}

fn allowed_child(parent: NodeKind, child: NodeKind) -> bool {
    matches!(
        (parent, child),
        (NodeKind::LearningPath, NodeKind::Module) | (NodeKind::Module, NodeKind::Unit)
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
