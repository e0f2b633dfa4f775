//! Content node sources.
//!
//! Parsing markdown/YAML into [`ContentNode`]s happens upstream. This module
//! defines the seam the validators read nodes through, plus a JSON-backed
//! implementation that reads the parser's serialized output from disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use tracing::{debug, instrument};

use docgraph_shared::{ContentNode, DocgraphError, Result};

/// Supplies the nodes declared in a docset's source files.
pub trait NodeSource: Send + Sync {
    /// Load the nodes whose declared source file is `relative` under
    /// `docset_root`.
    ///
    /// Returns `Ok(None)` when no node declares that file.
    fn load_file(&self, docset_root: &Path, relative: &str) -> Result<Option<Vec<ContentNode>>>;
}

/// Reads nodes from `*.json` files, one object or an array of objects per file.
///
/// A node's declared `source_path` need not name the JSON file it was read
/// from. [`NodeSource::load_file`] therefore looks nodes up by declared
/// source path, indexing each docset root once on first use.
#[derive(Debug, Default)]
pub struct JsonNodeSource {
    indexed: Mutex<HashMap<PathBuf, Arc<DocsetIndex>>>,
}

/// Nodes of one docset keyed by docset-relative declared source path.
type DocsetIndex = HashMap<String, Vec<ContentNode>>;

#[derive(Deserialize)]
#[serde(untagged)]
enum NodeFile {
    Many(Vec<ContentNode>),
    One(ContentNode),
}

impl JsonNodeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every node under `root`, walking files in sorted path order.
    ///
    /// Hidden files and directories (leading `.`) are skipped.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub fn load_docset(&self, root: &Path) -> Result<Vec<ContentNode>> {
        let mut files = Vec::new();
        collect_json_files(root, &mut files)?;
        files.sort();

        let mut nodes = Vec::new();
        for file in &files {
            let relative = relative_path(root, file);
            nodes.extend(read_node_file(file, &relative)?);
        }

        debug!(files = files.len(), nodes = nodes.len(), "docset loaded");
        Ok(nodes)
    }

    fn index_for(&self, root: &Path) -> Result<Arc<DocsetIndex>> {
        let mut indexed = self
            .indexed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(index) = indexed.get(root) {
            return Ok(Arc::clone(index));
        }

        let mut index = DocsetIndex::new();
        if root.is_dir() {
            for node in self.load_docset(root)? {
                index
                    .entry(relative_to_docset(root, &node.source_path))
                    .or_default()
                    .push(node);
            }
        } else {
            debug!(root = %root.display(), "docset root does not exist, nothing to index");
        }

        let index = Arc::new(index);
        indexed.insert(root.to_path_buf(), Arc::clone(&index));
        Ok(index)
    }
}

impl NodeSource for JsonNodeSource {
    fn load_file(&self, docset_root: &Path, relative: &str) -> Result<Option<Vec<ContentNode>>> {
        let index = self.index_for(docset_root)?;
        Ok(index.get(&relative_to_docset(docset_root, relative)).cloned())
    }
}

/// Express `source_path` relative to `docset_root`, with forward slashes.
///
/// Paths already relative (or outside the docset) are returned normalized but
/// otherwise unchanged.
pub fn relative_to_docset(docset_root: &Path, source_path: &str) -> String {
    let path = Path::new(source_path);
    let relative = path.strip_prefix(docset_root).unwrap_or(path);
    relative.to_string_lossy().replace('\\', "/")
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_node_file(path: &Path, relative: &str) -> Result<Vec<ContentNode>> {
    let content = std::fs::read_to_string(path).map_err(|e| DocgraphError::io(path, e))?;
    let parsed: NodeFile = serde_json::from_str(&content).map_err(|e| {
        DocgraphError::content(format!("invalid node file {}: {e}", path.display()))
    })?;

    let mut nodes = match parsed {
        NodeFile::Many(nodes) => nodes,
        NodeFile::One(node) => vec![node],
    };
    for node in &mut nodes {
        if node.source_path.is_empty() {
            node.source_path = relative.to_string();
        }
    }
    Ok(nodes)
}

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| DocgraphError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| DocgraphError::io(dir, e))?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden {
            continue;
        }
        if path.is_dir() {
            collect_json_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            out.push(path);
        }
    }
    Ok(())
}

fn relative_path(root: &Path, file: &Path) -> String {
    file.strip_prefix(root)
        .unwrap_or(file)
        .to_string_lossy()
        .replace('\\', "/")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
