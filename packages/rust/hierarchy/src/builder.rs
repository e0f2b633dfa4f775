//! Hierarchy builder.
//!
//! Projects a validated node list into the [`RawHierarchy`] document that is
//! sent to the hierarchy service and handed to downstream build stages.

use std::collections::HashSet;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use docgraph_shared::{ContentNode, HierarchyItem, RawHierarchy};

/// Build a hierarchy from already-validated nodes.
///
/// Item and root order follow input order, so identical input always yields
/// an identical document. Roots are the nodes no other node lists as a child.
#[instrument(skip_all, fields(node_count = nodes.len()))]
pub fn build_hierarchy(nodes: &[ContentNode], output_path: &Path) -> RawHierarchy {
    let referenced: HashSet<&str> = nodes
        .iter()
        .flat_map(|n| n.children.iter().map(String::as_str))
        .collect();

    let roots: Vec<String> = nodes
        .iter()
        .filter(|n| !referenced.contains(n.uid.as_str()))
        .map(|n| n.uid.clone())
        .collect();

    let items = nodes
        .iter()
        .map(|n| HierarchyItem {
            uid: n.uid.clone(),
            kind: n.kind,
            title: n.title.clone(),
            source_path: n.source_path.clone(),
            children: n.children.clone(),
            tokens: n.tokens.clone(),
        })
        .collect();

    let hierarchy = RawHierarchy {
        output_path: output_path.to_string_lossy().replace('\\', "/"),
        roots,
        items,
    };

    debug!(
        roots = hierarchy.roots.len(),
        items = hierarchy.items.len(),
        "hierarchy built"
    );

    hierarchy
}

/// SHA-256 of the hierarchy's canonical JSON, used to tag log lines and
/// compare builds.
pub fn hierarchy_digest(hierarchy: &RawHierarchy) -> String {
    // Maps inside tokens are BTreeMaps, so serialization order is stable.
    let json = serde_json::to_vec(hierarchy).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&json);
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
