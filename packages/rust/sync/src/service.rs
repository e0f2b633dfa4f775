//! Hierarchy service accessor.
//!
//! [`HierarchyService`] is the seam the dry-sync client calls through;
//! [`HttpHierarchyService`] is the `reqwest` implementation used in builds.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, instrument};

use docgraph_shared::{
    DocgraphError, RawHierarchy, ServiceConfig, ValidationResult, validate_service_config,
};

use crate::SyncError;

/// Path of the dry-sync endpoint, relative to the configured service root.
const DRY_SYNC_PATH: &str = "hierarchies/dry-sync";

/// User-Agent string for service requests.
const USER_AGENT: &str = concat!("docgraph/", env!("CARGO_PKG_VERSION"));

/// Maximum number of response body bytes echoed into an error message.
const MAX_ERROR_BODY: usize = 512;

/// Request envelope for a dry-sync call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrySyncRequest<'a> {
    pub hierarchy: &'a RawHierarchy,
    pub locale: &'a str,
    pub branch: &'a str,
    pub docset_name: &'a str,
    /// Already normalized.
    pub repo_url: &'a str,
}

/// A remote service that can validate a candidate hierarchy without
/// persisting it.
pub trait HierarchyService: Send + Sync {
    /// Send `request` and return one result per locale the service knows.
    fn dry_sync(
        &self,
        request: &DrySyncRequest<'_>,
    ) -> impl Future<Output = Result<Vec<ValidationResult>, SyncError>> + Send;
}

/// HTTP/JSON implementation of [`HierarchyService`].
#[derive(Debug, Clone)]
pub struct HttpHierarchyService {
    client: Client,
    dry_sync_url: String,
}

impl HttpHierarchyService {
    /// Build the client from service config.
    ///
    /// TLS floor, HTTPS enforcement and timeout are applied to this client
    /// only.
    pub fn new(config: &ServiceConfig) -> docgraph_shared::Result<Self> {
        validate_service_config(config)?;
        url::Url::parse(&config.endpoint).map_err(|e| {
            DocgraphError::config(format!("invalid service endpoint {}: {e}", config.endpoint))
        })?;

        let min_tls = match config.min_tls.as_str() {
            "1.3" => reqwest::tls::Version::TLS_1_3,
            _ => reqwest::tls::Version::TLS_1_2,
        };

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .https_only(config.https_only)
            .min_tls_version(min_tls)
            .build()
            .map_err(|e| DocgraphError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            dry_sync_url: format!("{}/{DRY_SYNC_PATH}", config.endpoint.trim_end_matches('/')),
        })
    }
}

impl HierarchyService for HttpHierarchyService {
    #[instrument(skip_all, fields(url = %self.dry_sync_url, docset = request.docset_name))]
    async fn dry_sync(
        &self,
        request: &DrySyncRequest<'_>,
    ) -> Result<Vec<ValidationResult>, SyncError> {
        let body = serde_json::to_vec(request)
            .map_err(|e| SyncError::Serialization(format!("request: {e}")))?;

        let response = self
            .client
            .post(&self.dry_sync_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(SyncError::from_reqwest)?;

        let status = response.status();
        let text = response.text().await.map_err(SyncError::from_reqwest)?;

        if !status.is_success() {
            let mut body = text;
            body.truncate(floor_char_boundary(&body, MAX_ERROR_BODY));
            return Err(SyncError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let results: Vec<ValidationResult> = serde_json::from_str(&text)
            .map_err(|e| SyncError::Serialization(format!("response: {e}")))?;

        debug!(locales = results.len(), "dry-sync response received");
        Ok(results)
    }
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn hierarchy() -> RawHierarchy {
        RawHierarchy {
            output_path: "_site".into(),
            roots: vec!["mod".into()],
            items: vec![],
        }
    }

    fn request(h: &RawHierarchy) -> DrySyncRequest<'_> {
        DrySyncRequest {
            hierarchy: h,
            locale: "en-us",
            branch: "main",
            docset_name: "learn",
            repo_url: "https://github.com/org/docs",
        }
    }

    fn config(server: &MockServer) -> ServiceConfig {
        ServiceConfig {
            endpoint: format!("{}/api/", server.uri()),
            timeout_secs: 5,
            ..ServiceConfig::default()
        }
    }

    #[test]
    fn request_envelope_is_camel_case() {
        let h = hierarchy();
        let json = serde_json::to_value(request(&h)).expect("serialize");
        assert_eq!(json["docsetName"], "learn");
        assert_eq!(json["repoUrl"], "https://github.com/org/docs");
        assert_eq!(json["hierarchy"]["roots"][0], "mod");
        assert_eq!(json["hierarchy"]["outputPath"], "_site");
    }

    #[tokio::test]
    async fn dry_sync_posts_envelope_and_parses_results() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/hierarchies/dry-sync"))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(serde_json::json!({
                "locale": "en-us",
                "branch": "main",
                "repoUrl": "https://github.com/org/docs"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"locale": "de-de", "isValid": true},
                {"locale": "en-us", "isValid": false, "message": "unit removed"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let service = HttpHierarchyService::new(&config(&server)).expect("client");
        let h = hierarchy();
        let results = service.dry_sync(&request(&h)).await.expect("dry sync");

        assert_eq!(results.len(), 2);
        assert_eq!(results[1].message.as_deref(), Some("unit removed"));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let service = HttpHierarchyService::new(&config(&server)).expect("client");
        let h = hierarchy();
        let err = service.dry_sync(&request(&h)).await.unwrap_err();

        assert!(matches!(err, SyncError::Status { status: 503, .. }));
        assert!(err.to_string().contains("maintenance"));
    }

    #[tokio::test]
    async fn malformed_body_is_a_serialization_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let service = HttpHierarchyService::new(&config(&server)).expect("client");
        let h = hierarchy();
        let err = service.dry_sync(&request(&h)).await.unwrap_err();

        assert!(matches!(err, SyncError::Serialization(_)));
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let config = ServiceConfig {
            endpoint: "not a url".into(),
            ..ServiceConfig::default()
        };
        assert!(HttpHierarchyService::new(&config).is_err());
    }

    #[test]
    fn error_body_truncation_respects_char_boundaries() {
        let s = "ééé";
        assert_eq!(floor_char_boundary(s, 3), 2);
        assert_eq!(floor_char_boundary(s, 10), s.len());
    }
}
