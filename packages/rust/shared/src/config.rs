//! Application configuration for docgraph.
//!
//! User config lives at `~/.docgraph/docgraph.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocgraphError, Result};
use crate::types::{DEFAULT_LOCALE, locale_eq};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docgraph.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docgraph";

// ---------------------------------------------------------------------------
// Config structs (matching docgraph.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote hierarchy service settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Build defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// `[service]` section.
///
/// Transport security settings live here and are handed to the service
/// client when it is constructed; nothing is configured process-wide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the hierarchy service.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds for the dry-sync call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Refuse plain-HTTP endpoints.
    #[serde(default)]
    pub https_only: bool,

    /// Minimum TLS version: "1.2" or "1.3".
    #[serde(default = "default_min_tls")]
    pub min_tls: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            https_only: false,
            min_tls: default_min_tls(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:7071/api".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_min_tls() -> String {
    "1.2".into()
}

/// `[defaults]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Skip the remote dry-sync unless the CLI asks for it.
    #[serde(default)]
    pub skip_sync: bool,
}

// ---------------------------------------------------------------------------
// Docset config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime description of the docset being validated.
#[derive(Debug, Clone)]
pub struct DocsetConfig {
    /// Repository URL as configured; normalized before it is sent anywhere.
    pub repo_url: String,
    pub branch: String,
    pub docset_name: String,
    /// Root of the docset sources.
    pub docset_path: PathBuf,
    /// Root of the build output.
    pub output_path: PathBuf,
    /// Locale of this build.
    pub locale: String,
    /// Whether this build is a translation of the default-locale docset.
    pub is_localization_build: bool,
    /// Never contact the hierarchy service.
    pub skip_sync: bool,
    /// Default-locale docset used to resolve localized tokens.
    pub fallback_docset_path: Option<PathBuf>,
    /// Dependency manifest written by the build (localized → fallback files).
    pub dependency_manifest_path: PathBuf,
    /// Publish manifest reconciled for non-default-locale builds.
    pub publish_manifest_path: PathBuf,
}

impl DocsetConfig {
    /// Whether this build validates the canonical hierarchy.
    pub fn is_default_locale_build(&self) -> bool {
        !self.is_localization_build && locale_eq(&self.locale, DEFAULT_LOCALE)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docgraph/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocgraphError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docgraph/docgraph.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
///
/// `[service]` settings are only checked when a service client is built, so
/// builds that never contact the service are not blocked by them.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocgraphError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        DocgraphError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocgraphError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocgraphError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocgraphError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject service settings the client could not honor.
pub fn validate_service_config(service: &ServiceConfig) -> Result<()> {
    if !matches!(service.min_tls.as_str(), "1.2" | "1.3") {
        return Err(DocgraphError::config(format!(
            "unsupported min_tls `{}` (expected \"1.2\" or \"1.3\")",
            service.min_tls
        )));
    }
    if service.https_only && service.endpoint.starts_with("http://") {
        return Err(DocgraphError::config(format!(
            "https_only is set but endpoint is plain HTTP: {}",
            service.endpoint
        )));
    }
    Ok(())
}
