//! Dry-sync of a candidate hierarchy against the remote hierarchy service.
//!
//! The default-locale build asks the service whether its hierarchy would be
//! accepted before anything is published. The call is **fail-open**: when the
//! service cannot be reached or answers with something unusable, the build is
//! treated as valid rather than blocked. [`DrySyncClient::try_sync`] exposes
//! the underlying error for callers that want strict behavior;
//! [`DrySyncClient::sync`] applies the fallback.

mod repo_url;
mod service;

use tracing::{info, instrument, warn};

use docgraph_shared::{RawHierarchy, ValidationResult, locale_eq};

pub use repo_url::normalize_repo_url;
pub use service::{DrySyncRequest, HierarchyService, HttpHierarchyService};

// ---------------------------------------------------------------------------
// SyncError
// ---------------------------------------------------------------------------

/// Anything that can go wrong between sending a dry-sync request and
/// selecting the result for the requested locale.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Connection, TLS or protocol failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete within the client timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The service answered with a non-success status.
    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Request or response body could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The response did not include the requested locale.
    #[error("service returned no result for locale `{0}`")]
    MissingLocale(String),
}

impl SyncError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Serialization(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// DrySyncClient
// ---------------------------------------------------------------------------

/// Sends candidate hierarchies to a [`HierarchyService`] and picks out the
/// verdict for one locale.
#[derive(Debug, Clone)]
pub struct DrySyncClient<S> {
    service: S,
}

impl<S: HierarchyService> DrySyncClient<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Access the wrapped service.
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Dry-sync `hierarchy`, returning the service verdict for `locale` or the
    /// error that prevented one. Makes exactly one attempt.
    #[instrument(skip_all, fields(branch = %branch, locale = %locale, docset = %docset_name))]
    pub async fn try_sync(
        &self,
        branch: &str,
        locale: &str,
        docset_name: &str,
        repo_url: &str,
        hierarchy: &RawHierarchy,
    ) -> Result<ValidationResult, SyncError> {
        let repo_url = normalize_repo_url(repo_url);
        let request = DrySyncRequest {
            hierarchy,
            locale,
            branch,
            docset_name,
            repo_url: &repo_url,
        };

        let results = self.service.dry_sync(&request).await?;

        results
            .into_iter()
            .find(|r| locale_eq(&r.locale, locale))
            .ok_or_else(|| SyncError::MissingLocale(locale.to_string()))
    }

    /// Dry-sync with the fail-open policy applied.
    ///
    /// Every [`SyncError`] is logged and replaced by
    /// [`ValidationResult::fail_open`] for `locale`. A service outage is
    /// therefore indistinguishable from a passing dry-sync to the caller.
    pub async fn sync(
        &self,
        branch: &str,
        locale: &str,
        docset_name: &str,
        repo_url: &str,
        hierarchy: &RawHierarchy,
    ) -> ValidationResult {
        match self
            .try_sync(branch, locale, docset_name, repo_url, hierarchy)
            .await
        {
            Ok(result) => {
                info!(
                    locale = %result.locale,
                    is_valid = result.is_valid,
                    message = result.message.as_deref().unwrap_or(""),
                    "dry-sync complete"
                );
                result
            }
            Err(e) => {
                warn!(error = %e, %locale, "dry-sync failed, treating hierarchy as valid");
                ValidationResult::fail_open(locale)
            }
        }
    }
}
