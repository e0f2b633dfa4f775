//! Top-level validation workflow.
//!
//! ```text
//! Start → StructurallyValidated ─┬─ default locale → build hierarchy → dry-sync → Done
//!                                └─ other locale   → build hierarchy + token check
//!                                                    → exclude files → reconcile manifest → Done
//! ```
//!
//! The default-locale path decides whether the canonical hierarchy may be
//! published at all. The other-locale path always reconciles the publish
//! manifest so a partially invalid translation still ships its valid subset.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use docgraph_hierarchy::{
    DependencyManifest, NodeSource, StructuralReport, TokenContext, build_hierarchy,
    hierarchy_digest, relative_to_docset, validate_structure, validate_tokens,
};
use docgraph_shared::{
    ContentNode, DEFAULT_LOCALE, DiagnosticLog, DocsetConfig, RawHierarchy, Result,
    ValidationResult,
};
use docgraph_sync::{DrySyncClient, HierarchyService};

use crate::exclusion::resolve_excluded_files;
use crate::manifest::{ReconcileSummary, reconcile};

/// Which branch of the workflow a build takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    DefaultLocale,
    OtherLocale,
}

/// Result of one orchestrated validation run.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    /// The verdict the surrounding build acts on; `false` fails the build.
    pub is_valid: bool,
    pub workflow: Workflow,
    /// Absent only when a default-locale build failed structural validation.
    pub hierarchy: Option<RawHierarchy>,
    /// Verdict from the hierarchy service, when a dry-sync was made.
    pub sync_result: Option<ValidationResult>,
    /// Source files removed from publishing (other-locale builds only).
    pub excluded_files: BTreeSet<String>,
    pub reconcile: Option<ReconcileSummary>,
}

/// Sequences validation, dry-sync and manifest reconciliation for one docset.
pub struct ValidationOrchestrator<S> {
    docset: DocsetConfig,
    sync: DrySyncClient<S>,
    fallback_source: Box<dyn NodeSource>,
    log: Arc<DiagnosticLog>,
}

impl<S: HierarchyService> ValidationOrchestrator<S> {
    /// `fallback_source` reads the default-locale docset for token checks.
    pub fn new(
        docset: DocsetConfig,
        sync: DrySyncClient<S>,
        fallback_source: Box<dyn NodeSource>,
        log: Arc<DiagnosticLog>,
    ) -> Self {
        Self {
            docset,
            sync,
            fallback_source,
            log,
        }
    }

    pub fn workflow(&self) -> Workflow {
        if self.docset.is_default_locale_build() {
            Workflow::DefaultLocale
        } else {
            Workflow::OtherLocale
        }
    }

    pub fn sync_client(&self) -> &DrySyncClient<S> {
        &self.sync
    }

    /// Run the workflow over the parsed nodes of this docset.
    ///
    /// Source paths are rewritten relative to the docset root first, so
    /// diagnostics, exclusions and publish manifest entries share one key.
    /// Only manifest I/O can make this return `Err`; every validation finding
    /// is reported through the diagnostic log and the outcome.
    #[instrument(skip_all, fields(docset = %self.docset.docset_name, locale = %self.docset.locale))]
    pub async fn run(&self, nodes: &[ContentNode]) -> Result<ValidationOutcome> {
        let nodes = self.docset_relative(nodes);
        let structural = validate_structure(&nodes, &self.log);

        let outcome = match self.workflow() {
            Workflow::DefaultLocale => self.run_default_locale(structural).await,
            Workflow::OtherLocale => self.run_other_locale(structural)?,
        };

        info!(
            is_valid = outcome.is_valid,
            workflow = ?outcome.workflow,
            excluded = outcome.excluded_files.len(),
            errors = self.log.error_count(),
            "validation finished"
        );
        Ok(outcome)
    }

    fn docset_relative(&self, nodes: &[ContentNode]) -> Vec<ContentNode> {
        nodes
            .iter()
            .map(|node| ContentNode {
                source_path: relative_to_docset(&self.docset.docset_path, &node.source_path),
                ..node.clone()
            })
            .collect()
    }

    async fn run_default_locale(&self, structural: StructuralReport) -> ValidationOutcome {
        let mut outcome = ValidationOutcome {
            is_valid: false,
            workflow: Workflow::DefaultLocale,
            hierarchy: None,
            sync_result: None,
            excluded_files: BTreeSet::new(),
            reconcile: None,
        };

        if !structural.is_valid {
            info!(
                failed_files = structural.failed_files.len(),
                "structural validation failed, dry-sync skipped"
            );
            return outcome;
        }

        let hierarchy = build_hierarchy(&structural.nodes, &self.docset.output_path);

        if self.docset.skip_sync {
            info!("sync disabled for this build, hierarchy accepted without dry-sync");
            outcome.is_valid = true;
        } else {
            info!(digest = %hierarchy_digest(&hierarchy), "dry-syncing hierarchy");
            let result = self
                .sync
                .sync(
                    &self.docset.branch,
                    DEFAULT_LOCALE,
                    &self.docset.docset_name,
                    &self.docset.repo_url,
                    &hierarchy,
                )
                .await;
            if !result.is_valid {
                warn!(
                    message = result.message.as_deref().unwrap_or(""),
                    "hierarchy service rejected the hierarchy"
                );
            }
            outcome.is_valid = result.is_valid;
            outcome.sync_result = Some(result);
        }

        outcome.hierarchy = Some(hierarchy);
        outcome
    }

    fn run_other_locale(&self, structural: StructuralReport) -> Result<ValidationOutcome> {
        let dependencies = DependencyManifest::load(&self.docset.dependency_manifest_path)?;
        let ctx = TokenContext {
            dependencies: &dependencies,
            docset_path: &self.docset.docset_path,
            fallback_docset_path: self.docset.fallback_docset_path.as_deref(),
        };
        let tokens = validate_tokens(&structural.nodes, ctx, self.fallback_source.as_ref(), &self.log);

        let hierarchy = build_hierarchy(&structural.nodes, &self.docset.output_path);

        let excluded_files = resolve_excluded_files(
            &structural.nodes,
            &structural.failed_files,
            &tokens.failed_files,
        );

        let summary = reconcile(&self.docset.publish_manifest_path, &excluded_files, |file| {
            self.log.has_errors(file)
        })?;

        Ok(ValidationOutcome {
            is_valid: structural.is_valid && tokens.is_valid,
            workflow: Workflow::OtherLocale,
            hierarchy: Some(hierarchy),
            sync_result: None,
            excluded_files,
            reconcile: Some(summary),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
