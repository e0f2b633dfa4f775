//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use docgraph_core::{ValidationOrchestrator, ValidationOutcome};
use docgraph_hierarchy::{JsonNodeSource, hierarchy_digest};
use docgraph_shared::{
    AppConfig, ContentNode, DEFAULT_LOCALE, DiagnosticLog, DocsetConfig, ValidationResult,
    init_config, load_config, load_config_from,
};
use docgraph_sync::{
    DrySyncClient, DrySyncRequest, HierarchyService, HttpHierarchyService, SyncError,
};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docgraph: validate documentation hierarchies before they are published.
#[derive(Parser)]
#[command(
    name = "docgraph",
    version,
    about = "Validate learning-path hierarchies and reconcile localized publish manifests.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.docgraph/docgraph.toml.
    #[arg(long, global = true, env = "DOCGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Validate a docset and, for localized builds, reconcile its publish manifest.
    Validate(ValidateArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `docgraph validate`.
#[derive(clap::Args)]
pub(crate) struct ValidateArgs {
    /// Docset root containing the node `*.json` files.
    #[arg(long)]
    pub docset: PathBuf,

    /// Build output root.
    #[arg(short, long, default_value = "_site")]
    pub output: PathBuf,

    /// Docset name reported to the hierarchy service.
    #[arg(long)]
    pub name: String,

    /// Branch being built.
    #[arg(long, default_value = "main")]
    pub branch: String,

    /// Repository URL (any git remote form).
    #[arg(long)]
    pub repo_url: String,

    /// Locale of this build.
    #[arg(long, default_value = DEFAULT_LOCALE)]
    pub locale: String,

    /// Mark this build as a translation of the default-locale docset.
    #[arg(long)]
    pub localization_build: bool,

    /// Do not contact the hierarchy service.
    #[arg(long)]
    pub skip_sync: bool,

    /// Default-locale docset used to resolve localized tokens.
    #[arg(long)]
    pub fallback_docset: Option<PathBuf>,

    /// Dependency manifest (defaults to <output>/.dependencymap.json).
    #[arg(long)]
    pub dependency_manifest: Option<PathBuf>,

    /// Publish manifest (defaults to <output>/.publish.json).
    #[arg(long)]
    pub publish_manifest: Option<PathBuf>,

    /// Write the diagnostic ledger as JSON to this path.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Write the built hierarchy to <output>/hierarchy.json.
    #[arg(long)]
    pub emit_hierarchy: bool,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docgraph=info",
        1 => "docgraph=debug",
        _ => "docgraph=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Validate(args) => cmd_validate(args, config_path).await,
        Command::Config { action } => {
            match action {
                ConfigAction::Init => cmd_config_init()?,
                ConfigAction::Show => cmd_config_show(config_path)?,
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_validate(args: ValidateArgs, config_path: Option<&Path>) -> Result<ExitCode> {
    let config = resolve_config(config_path)?;

    let docset = docset_config(&args, &config);
    info!(
        docset = %docset.docset_name,
        locale = %docset.locale,
        path = %docset.docset_path.display(),
        "validating docset"
    );

    let nodes = JsonNodeSource::new().load_docset(&docset.docset_path)?;
    if nodes.is_empty() {
        warn!(
            path = %docset.docset_path.display(),
            "no content nodes found, validating an empty docset"
        );
    }

    let log = Arc::new(DiagnosticLog::new());
    let outcome = if contacts_service(&docset) {
        let service = HttpHierarchyService::new(&config.service)?;
        run_orchestrator(docset.clone(), service, &nodes, &log).await?
    } else {
        run_orchestrator(docset.clone(), NoSync, &nodes, &log).await?
    };

    if let Some(report) = &args.report {
        log.write_report(report)?;
        info!(path = %report.display(), "diagnostic report written");
    }
    if args.emit_hierarchy {
        emit_hierarchy(&outcome, &docset.output_path)?;
    }

    print_summary(&docset, &outcome, log.error_count());

    Ok(if outcome.is_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Only default-locale builds with sync enabled talk to the hierarchy service.
fn contacts_service(docset: &DocsetConfig) -> bool {
    docset.is_default_locale_build() && !docset.skip_sync
}

async fn run_orchestrator<S: HierarchyService>(
    docset: DocsetConfig,
    service: S,
    nodes: &[ContentNode],
    log: &Arc<DiagnosticLog>,
) -> Result<ValidationOutcome> {
    let orchestrator = ValidationOrchestrator::new(
        docset,
        DrySyncClient::new(service),
        Box::new(JsonNodeSource::new()),
        Arc::clone(log),
    );
    Ok(orchestrator.run(nodes).await?)
}

/// Stand-in service for builds that never dry-sync.
struct NoSync;

impl HierarchyService for NoSync {
    async fn dry_sync(
        &self,
        _request: &DrySyncRequest<'_>,
    ) -> std::result::Result<Vec<ValidationResult>, SyncError> {
        Err(SyncError::Transport(
            "hierarchy service is not configured for this build".into(),
        ))
    }
}

/// Merge flags and `[defaults]` into the runtime docset description.
fn docset_config(args: &ValidateArgs, config: &AppConfig) -> DocsetConfig {
    DocsetConfig {
        repo_url: args.repo_url.clone(),
        branch: args.branch.clone(),
        docset_name: args.name.clone(),
        docset_path: args.docset.clone(),
        output_path: args.output.clone(),
        locale: args.locale.clone(),
        is_localization_build: args.localization_build,
        skip_sync: args.skip_sync || config.defaults.skip_sync,
        fallback_docset_path: args.fallback_docset.clone(),
        dependency_manifest_path: args
            .dependency_manifest
            .clone()
            .unwrap_or_else(|| args.output.join(".dependencymap.json")),
        publish_manifest_path: args
            .publish_manifest
            .clone()
            .unwrap_or_else(|| args.output.join(".publish.json")),
    }
}

fn emit_hierarchy(outcome: &ValidationOutcome, output: &Path) -> Result<()> {
    let Some(hierarchy) = &outcome.hierarchy else {
        info!("no hierarchy built, nothing to emit");
        return Ok(());
    };

    std::fs::create_dir_all(output)
        .wrap_err_with(|| format!("cannot create {}", output.display()))?;
    let path = output.join("hierarchy.json");
    let json = serde_json::to_string_pretty(hierarchy)?;
    std::fs::write(&path, json).wrap_err_with(|| format!("cannot write {}", path.display()))?;

    info!(
        path = %path.display(),
        digest = %hierarchy_digest(hierarchy),
        "hierarchy written"
    );
    Ok(())
}

fn print_summary(docset: &DocsetConfig, outcome: &ValidationOutcome, errors: usize) {
    println!();
    if outcome.is_valid {
        println!("  Docset is valid.");
    } else {
        println!("  Docset failed validation.");
    }
    println!("  Name:     {}", docset.docset_name);
    println!("  Locale:   {}", docset.locale);
    println!("  Workflow: {:?}", outcome.workflow);
    println!("  Errors:   {errors}");
    if let Some(result) = &outcome.sync_result {
        println!(
            "  Dry-sync: {}{}",
            if result.is_valid { "accepted" } else { "rejected" },
            result
                .message
                .as_deref()
                .map(|m| format!(" ({m})"))
                .unwrap_or_default()
        );
    }
    if !outcome.excluded_files.is_empty() {
        println!("  Excluded: {}", outcome.excluded_files.len());
        for file in &outcome.excluded_files {
            println!("    - {file}");
        }
    }
    if let Some(summary) = outcome.reconcile {
        println!(
            "  Manifest: {} removed, {} flagged, {} remaining",
            summary.removed, summary.flagged, summary.remaining
        );
    }
    println!();
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dg-cli-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn succeeded(code: ExitCode) -> bool {
        format!("{code:?}") == format!("{:?}", ExitCode::SUCCESS)
    }

    fn validate_args(extra: &[&str]) -> ValidateArgs {
        let mut argv = vec!["validate", "--name", "learn", "--repo-url", "https://github.com/org/learn"];
        argv.extend_from_slice(extra);
        let Command::Validate(args) = parse(&argv).command else {
            panic!("expected validate");
        };
        args
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("docgraph").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn validate_defaults_derive_manifest_paths_from_output() {
        let cli = parse(&[
            "validate",
            "--docset",
            "learn",
            "--name",
            "learn",
            "--repo-url",
            "git@github.com:org/learn.git",
            "-o",
            "out",
        ]);
        let Command::Validate(args) = cli.command else {
            panic!("expected validate");
        };

        let docset = docset_config(&args, &AppConfig::default());
        assert_eq!(docset.locale, DEFAULT_LOCALE);
        assert_eq!(docset.branch, "main");
        assert!(docset.is_default_locale_build());
        assert_eq!(docset.publish_manifest_path, Path::new("out").join(".publish.json"));
        assert_eq!(
            docset.dependency_manifest_path,
            Path::new("out").join(".dependencymap.json")
        );
        assert!(!docset.skip_sync);
    }

    #[test]
    fn config_defaults_can_disable_sync() {
        let cli = parse(&[
            "validate",
            "--docset",
            "learn",
            "--name",
            "learn",
            "--repo-url",
            "https://github.com/org/learn",
            "--locale",
            "de-de",
            "--localization-build",
        ]);
        let Command::Validate(args) = cli.command else {
            panic!("expected validate");
        };

        let mut config = AppConfig::default();
        config.defaults.skip_sync = true;
        let docset = docset_config(&args, &config);
        assert!(docset.skip_sync);
        assert!(!docset.is_default_locale_build());
    }

    #[test]
    fn validate_requires_docset_name() {
        let err = Cli::try_parse_from(["docgraph", "validate", "--docset", "learn"]);
        assert!(err.is_err());
    }

    #[test]
    fn only_syncing_default_locale_builds_contact_the_service() {
        let args = validate_args(&["--docset", "docs"]);
        let mut docset = docset_config(&args, &AppConfig::default());
        assert!(contacts_service(&docset));

        docset.skip_sync = true;
        assert!(!contacts_service(&docset));

        docset.skip_sync = false;
        docset.locale = "de-de".into();
        docset.is_localization_build = true;
        assert!(!contacts_service(&docset));
    }

    #[tokio::test]
    async fn localized_build_ignores_unusable_service_settings() {
        let dir = temp_dir();
        let config_path = dir.join("docgraph.toml");
        std::fs::write(
            &config_path,
            "[service]\nendpoint = \"http://localhost:7071/api\"\nhttps_only = true\n",
        )
        .unwrap();
        std::fs::create_dir_all(dir.join("docs")).unwrap();
        std::fs::write(
            dir.join("docs/nodes.json"),
            r#"[
                {"uid":"m","kind":"module","title":"M","source_path":"m.yml","children":["u"],"locale":"de-de"},
                {"uid":"u","kind":"unit","title":"U","source_path":"u.yml","locale":"de-de"}
            ]"#,
        )
        .unwrap();
        std::fs::create_dir_all(dir.join("_site")).unwrap();
        std::fs::write(
            dir.join("_site/.publish.json"),
            r#"{"files":[{"source_path":"m.yml","output_path":"m.json"},{"source_path":"u.yml","output_path":"u.json"}]}"#,
        )
        .unwrap();

        let docs = dir.join("docs");
        let output = dir.join("_site");
        let args = validate_args(&[
            "--docset",
            docs.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--locale",
            "de-de",
            "--localization-build",
        ]);

        let code = cmd_validate(args, Some(&config_path)).await.expect("validate");
        assert!(succeeded(code));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn empty_docset_is_validated_not_rejected() {
        let dir = temp_dir();
        let config_path = dir.join("docgraph.toml");
        std::fs::write(&config_path, "").unwrap();
        std::fs::create_dir_all(dir.join("docs")).unwrap();

        let docs = dir.join("docs");
        let output = dir.join("_site");
        let args = validate_args(&[
            "--docset",
            docs.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--skip-sync",
        ]);

        let code = cmd_validate(args, Some(&config_path)).await.expect("validate");
        assert!(succeeded(code));

        std::fs::remove_dir_all(&dir).ok();
    }
}
