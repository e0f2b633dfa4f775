//! Resolution of the source files a localized build must not publish.
//!
//! A file is excluded when any node in it failed structural or token
//! validation, or when any node in it sits below an excluded node. Exclusion
//! always flows down the hierarchy, so a published node never has an
//! unpublished ancestor.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use tracing::{debug, instrument};

use docgraph_hierarchy::file_key;
use docgraph_shared::ContentNode;

/// Compute the excluded source files for `nodes`.
#[instrument(skip_all, fields(node_count = nodes.len()))]
pub fn resolve_excluded_files(
    nodes: &[ContentNode],
    structural_failures: &BTreeSet<String>,
    token_failures: &BTreeSet<String>,
) -> BTreeSet<String> {
    let mut excluded: BTreeSet<String> = structural_failures
        .union(token_failures)
        .cloned()
        .collect();

    let by_uid: HashMap<&str, &ContentNode> = nodes.iter().map(|n| (n.uid.as_str(), n)).collect();
    let mut by_file: HashMap<String, Vec<&ContentNode>> = HashMap::new();
    for node in nodes {
        by_file.entry(file_key(node)).or_default().push(node);
    }

    // Every node living in an excluded file seeds the walk.
    let mut queue: VecDeque<&ContentNode> = excluded
        .iter()
        .filter_map(|file| by_file.get(file))
        .flatten()
        .copied()
        .collect();
    let mut visited: HashSet<&str> = queue.iter().map(|&n| n.uid.as_str()).collect();

    while let Some(node) = queue.pop_front() {
        for child in node
            .children
            .iter()
            .filter_map(|uid| by_uid.get(uid.as_str()).copied())
        {
            if !visited.insert(child.uid.as_str()) {
                continue;
            }
            let file = file_key(child);
            if excluded.insert(file.clone()) {
                debug!(file = %file, parent = %node.uid, "excluded below an excluded ancestor");
                // Siblings sharing the newly excluded file go down with it.
                for &sibling in by_file.get(&file).into_iter().flatten() {
                    if visited.insert(sibling.uid.as_str()) {
                        queue.push_back(sibling);
                    }
                }
            }
            queue.push_back(child);
        }
    }

    excluded
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgraph_shared::NodeKind;

    fn node(uid: &str, kind: NodeKind, children: &[&str]) -> ContentNode {
        ContentNode {
            uid: uid.into(),
            kind,
            title: uid.into(),
            source_path: format!("{uid}.yml"),
            children: children.iter().map(|c| c.to_string()).collect(),
            locale: "de-de".into(),
            tokens: Default::default(),
        }
    }

    fn files(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| format!("{n}.yml")).collect()
    }

    fn sample() -> Vec<ContentNode> {
        vec![
            node("path", NodeKind::LearningPath, &["m1", "m2"]),
            node("m1", NodeKind::Module, &["u1", "u2"]),
            node("m2", NodeKind::Module, &["u3"]),
            node("u1", NodeKind::Unit, &[]),
            node("u2", NodeKind::Unit, &[]),
            node("u3", NodeKind::Unit, &[]),
        ]
    }

    #[test]
    fn nothing_failed_nothing_excluded() {
        let excluded = resolve_excluded_files(&sample(), &BTreeSet::new(), &BTreeSet::new());
        assert!(excluded.is_empty());
    }

    #[test]
    fn failed_module_excludes_its_units() {
        let excluded = resolve_excluded_files(&sample(), &BTreeSet::new(), &files(&["m1"]));
        assert_eq!(excluded, files(&["m1", "u1", "u2"]));
    }

    #[test]
    fn exclusion_propagates_through_every_descendant() {
        let nodes = sample();
        let excluded = resolve_excluded_files(&nodes, &files(&["path"]), &BTreeSet::new());
        assert_eq!(excluded, files(&["path", "m1", "m2", "u1", "u2", "u3"]));

        // Every descendant of an excluded node is excluded.
        for parent in nodes.iter().filter(|n| excluded.contains(&n.source_path)) {
            for child in &parent.children {
                assert!(excluded.contains(&format!("{child}.yml")));
            }
        }
    }

    #[test]
    fn failures_from_both_sources_are_merged() {
        let excluded = resolve_excluded_files(&sample(), &files(&["u3"]), &files(&["u1"]));
        assert_eq!(excluded, files(&["u1", "u3"]));
    }

    #[test]
    fn shared_file_takes_siblings_along() {
        let mut nodes = sample();
        // u2 and u3 live in the same file; u2 is excluded via m1.
        nodes[5].source_path = "u2.yml".into();
        let excluded = resolve_excluded_files(&nodes, &BTreeSet::new(), &files(&["m1"]));
        assert_eq!(excluded, files(&["m1", "u1", "u2"]));
        assert!(!excluded.contains("m2.yml"));
    }

    #[test]
    fn cycles_terminate() {
        let nodes = vec![
            node("a", NodeKind::Module, &["b"]),
            node("b", NodeKind::Module, &["a"]),
        ];
        let excluded = resolve_excluded_files(&nodes, &files(&["a"]), &BTreeSet::new());
        assert_eq!(excluded, files(&["a", "b"]));
    }

    #[test]
    fn failed_file_unknown_to_node_list_is_kept() {
        let excluded =
            resolve_excluded_files(&sample(), &BTreeSet::from(["ghost.yml".into()]), &BTreeSet::new());
        assert_eq!(excluded, BTreeSet::from(["ghost.yml".to_string()]));
    }
}
