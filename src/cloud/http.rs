//! HTTP-backed live resource inventory.

use super::{CloudApi, LiveResourceKind};
use crate::error::{Result, TfProbeError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Queries an inventory service: `GET {base}/{kind}` must answer with a
/// JSON array of names.
///
/// Failures are reported once; there is no retry.
#[derive(Debug, Clone)]
pub struct HttpInventory {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpInventory {
    /// Create a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigValue` error for an invalid URL, or an `Internal`
    /// error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url).map_err(|e| {
            crate::err!(ConfigValue {
                key: "deep_check.inventory_url".to_string(),
                message: format!("invalid URL \"{base_url}\": {e}"),
            })
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tfprobe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TfProbeError::internal(format!("Failed to create HTTP client: {e}"), file!(), line!()))?;

        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    fn endpoint(&self, kind: LiveResourceKind) -> Result<Url> {
        self.base_url.join(kind.as_str()).map_err(|e| {
            TfProbeError::cloud_api(kind, format!("invalid endpoint: {e}"), None, file!(), line!())
        })
    }
}

#[async_trait]
impl CloudApi for HttpInventory {
    async fn list_names(&self, kind: LiveResourceKind) -> Result<Vec<String>> {
        let url = self.endpoint(kind)?;
        tracing::debug!(%url, %kind, "Listing live resources");

        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            TfProbeError::cloud_api(kind, format!("request to {url} failed: {e}"), None, file!(), line!())
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TfProbeError::cloud_api(
                kind,
                format!("request to {url} failed with status {status}"),
                Some(status.as_u16()),
                file!(),
                line!(),
            ));
        }

        let names: Vec<String> = response.json().await.map_err(|e| {
            TfProbeError::cloud_api(
                kind,
                format!("invalid response from {url}: {e}"),
                Some(status.as_u16()),
                file!(),
                line!(),
            )
        })?;
        tracing::debug!(%kind, count = names.len(), "Live resources listed");
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{matchers::*, Mock, MockServer, ResponseTemplate};

    fn inventory(server: &MockServer, prefix: &str) -> HttpInventory {
        HttpInventory::new(&format!("{}{prefix}", server.uri()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_list_names() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/db_parameter_groups"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["app-server1", "app-server2"])))
            .expect(1)
            .mount(&server)
            .await;

        let client = inventory(&server, "/api").with_token(Some("secret".to_string()));
        let names = client.list_names(LiveResourceKind::DbParameterGroups).await.unwrap();
        assert_eq!(names, vec!["app-server1", "app-server2"]);
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/key_pairs"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = inventory(&server, "/").list_names(LiveResourceKind::KeyPairs).await.unwrap_err();
        match err {
            TfProbeError::CloudApi { kind, status_code, .. } => {
                assert_eq!(kind, "key_pairs");
                assert_eq!(status_code, Some(503));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/db_subnet_groups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"names": []})))
            .mount(&server)
            .await;

        let err = inventory(&server, "").list_names(LiveResourceKind::DbSubnetGroups).await.unwrap_err();
        assert!(err.is_external());
    }

    #[test]
    fn test_invalid_url() {
        let err = HttpInventory::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, TfProbeError::ConfigValue { .. }));
    }
}
