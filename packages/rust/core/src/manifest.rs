//! Publish manifest reconciliation.
//!
//! Loads the build's publish manifest, drops excluded source files, flags
//! remaining entries with recorded errors, and writes it back in place. The
//! caller must hold the manifest exclusively for the duration of the call.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, info, instrument};

use docgraph_shared::{DocgraphError, PublishManifest, Result};

/// What [`reconcile`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Entries removed because their source file was excluded.
    pub removed: usize,
    /// Entries whose error flag went from `false` to `true`.
    pub flagged: usize,
    /// Entries left in the manifest.
    pub remaining: usize,
}

/// Reconcile the manifest at `manifest_path`.
///
/// An entry's error flag becomes `existing || has_error(source_path)`, so
/// running this twice with the same inputs changes nothing the second time.
/// I/O and parse failures are returned, never swallowed.
#[instrument(skip_all, fields(manifest = %manifest_path.display(), excluded = excluded.len()))]
pub fn reconcile(
    manifest_path: &Path,
    excluded: &BTreeSet<String>,
    has_error: impl Fn(&str) -> bool,
) -> Result<ReconcileSummary> {
    let mut manifest = load_manifest(manifest_path)?;

    let before = manifest.files.len();
    manifest
        .files
        .retain(|entry| !excluded.contains(&entry.source_path));
    let removed = before - manifest.files.len();

    let mut flagged = 0;
    for entry in &mut manifest.files {
        if !entry.has_error && has_error(&entry.source_path) {
            entry.has_error = true;
            flagged += 1;
            debug!(file = %entry.source_path, "flagged publish entry with errors");
        }
    }

    write_manifest(manifest_path, &manifest)?;

    let summary = ReconcileSummary {
        removed,
        flagged,
        remaining: manifest.files.len(),
    };
    info!(
        removed = summary.removed,
        flagged = summary.flagged,
        remaining = summary.remaining,
        "publish manifest reconciled"
    );
    Ok(summary)
}

/// Read and decode a publish manifest.
pub fn load_manifest(path: &Path) -> Result<PublishManifest> {
    let content = std::fs::read_to_string(path).map_err(|e| DocgraphError::io(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| DocgraphError::manifest(path, format!("invalid publish manifest: {e}")))
}

/// Overwrite `path` with `manifest` (temp file + rename).
pub fn write_manifest(path: &Path, manifest: &PublishManifest) -> Result<()> {
    let json = serde_json::to_string_pretty(manifest)
        .map_err(|e| DocgraphError::manifest(path, format!("JSON serialization failed: {e}")))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "manifest".into());
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, json).map_err(|e| DocgraphError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| DocgraphError::io(path, e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use docgraph_shared::PublishEntry;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dg-manifest-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn entry(source: &str, has_error: bool) -> PublishEntry {
        PublishEntry {
            source_path: source.into(),
            output_path: source.replace(".yml", ".json"),
            has_error,
            extra: Default::default(),
        }
    }

    fn write_sample(dir: &Path) -> PathBuf {
        let path = dir.join(".publish.json");
        let manifest = PublishManifest {
            files: vec![
                entry("a.yml", false),
                entry("b.yml", false),
                entry("c.yml", true),
                entry("d.yml", false),
            ],
            extra: Default::default(),
        };
        write_manifest(&path, &manifest).unwrap();
        path
    }

    fn excluded(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn removes_excluded_and_flags_errors() {
        let dir = temp_dir();
        let path = write_sample(&dir);

        let summary = reconcile(&path, &excluded(&["b.yml"]), |f| f == "d.yml").unwrap();
        assert_eq!(
            summary,
            ReconcileSummary {
                removed: 1,
                flagged: 1,
                remaining: 3
            }
        );

        let manifest = load_manifest(&path).unwrap();
        let flags: Vec<_> = manifest
            .files
            .iter()
            .map(|e| (e.source_path.as_str(), e.has_error))
            .collect();
        assert_eq!(flags, vec![("a.yml", false), ("c.yml", true), ("d.yml", true)]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn existing_error_flag_is_never_cleared() {
        let dir = temp_dir();
        let path = write_sample(&dir);

        reconcile(&path, &BTreeSet::new(), |_| false).unwrap();
        let manifest = load_manifest(&path).unwrap();
        assert!(manifest.files[2].has_error);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn reconcile_is_idempotent() {
        let dir = temp_dir();
        let path = write_sample(&dir);
        let ex = excluded(&["a.yml", "c.yml"]);

        reconcile(&path, &ex, |f| f == "b.yml").unwrap();
        let first = std::fs::read_to_string(&path).unwrap();

        let summary = reconcile(&path, &ex, |f| f == "b.yml").unwrap();
        let second = std::fs::read_to_string(&path).unwrap();

        assert_eq!(summary.removed, 0);
        assert_eq!(summary.flagged, 0);
        assert_eq!(first, second);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn unknown_fields_survive_reconciliation() {
        let dir = temp_dir();
        let path = dir.join(".publish.json");
        std::fs::write(
            &path,
            r#"{"build_id":"7","files":[{"source_path":"a.yml","output_path":"a.json","monikers":["v2"]}]}"#,
        )
        .unwrap();

        reconcile(&path, &BTreeSet::new(), |_| true).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["build_id"], "7");
        assert_eq!(json["files"][0]["monikers"][0], "v2");
        assert_eq!(json["files"][0]["has_error"], true);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_manifest_is_fatal() {
        let dir = temp_dir();
        let err = reconcile(&dir.join("absent.json"), &BTreeSet::new(), |_| false).unwrap_err();
        assert!(matches!(err, DocgraphError::Io { .. }));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn malformed_manifest_is_fatal_and_untouched() {
        let dir = temp_dir();
        let path = dir.join(".publish.json");
        std::fs::write(&path, "{\"files\": 3}").unwrap();

        let err = reconcile(&path, &BTreeSet::new(), |_| false).unwrap_err();
        assert!(matches!(err, DocgraphError::Manifest { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"files\": 3}");

        std::fs::remove_dir_all(&dir).ok();
    }
}
