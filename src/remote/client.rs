use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, info, warn};
use url::Url;

use super::{ClientFactory, ConfigApi};
use crate::error::SyncError;
use crate::model::{ConfigTriple, Parameter};

/// HTTP client tuning.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: "CoinConf/1.0".to_string(),
        }
    }
}

/// reqwest-backed [`ConfigApi`] for a single base URL.
pub struct HttpConfigClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpConfigClient {
    /// Create a client with its own connection pool.
    pub fn new(base_url: &str, config: &ClientConfig) -> Result<Self, SyncError> {
        Self::with_client(build_client(config)?, base_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, SyncError> {
        let mut base_url = Url::parse(base_url).map_err(|e| SyncError::InvalidEndpoint {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        // Relative joins drop the last segment unless the path ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn parameter_url(&self, triple: &ConfigTriple, parameter_id: &str) -> Result<Url, SyncError> {
        self.base_url
            .join(&triple.parameter_path(parameter_id))
            .map_err(|e| SyncError::Transport(format!("Failed to build request URL: {}", e)))
    }
}

fn build_client(config: &ClientConfig) -> Result<reqwest::Client, SyncError> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.timeout)
        .connect_timeout(config.timeout)
        .build()
        .map_err(|e| SyncError::Transport(format!("Failed to build HTTP client: {}", e)))
}

/// Map a non-success status into the error taxonomy.
async fn status_error(response: reqwest::Response) -> SyncError {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return SyncError::NotFound;
    }
    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("Unknown").to_string()
    } else {
        body.trim().to_string()
    };
    SyncError::ServerError {
        code: status.as_u16(),
        message,
    }
}

#[async_trait]
impl ConfigApi for HttpConfigClient {
    async fn fetch_parameter(
        &self,
        triple: &ConfigTriple,
        parameter_id: &str,
    ) -> Result<Parameter, SyncError> {
        triple.ensure_complete()?;
        let url = self.parameter_url(triple, parameter_id)?;
        debug!("GET {}", url);

        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            let err = status_error(response).await;
            warn!("Fetching parameter {} failed: {}", parameter_id, err);
            return Err(err);
        }

        let body = response.text().await?;
        if body.trim().is_empty() || body.trim() == "null" {
            return Err(SyncError::EmptyResponseBody);
        }
        let parameter: Parameter = serde_json::from_str(&body)
            .map_err(|e| SyncError::Transport(format!("malformed payload from {}: {}", url, e)))?;
        info!("Fetched parameter {}", parameter_id);
        Ok(parameter)
    }

    async fn put_parameter(
        &self,
        triple: &ConfigTriple,
        parameter_id: &str,
        parameter: &Parameter,
    ) -> Result<(), SyncError> {
        triple.ensure_complete()?;
        let url = self.parameter_url(triple, parameter_id)?;
        debug!("PUT {}", url);

        let response = self.client.put(url).json(parameter).send().await?;
        if !response.status().is_success() {
            let err = status_error(response).await;
            warn!("Updating parameter {} failed: {}", parameter_id, err);
            return Err(err);
        }
        info!("Updated parameter {}", parameter_id);
        Ok(())
    }
}

/// Builds [`HttpConfigClient`]s that share one connection pool.
pub struct HttpClientFactory {
    client: reqwest::Client,
}

impl HttpClientFactory {
    pub fn new(config: &ClientConfig) -> Result<Self, SyncError> {
        Ok(Self {
            client: build_client(config)?,
        })
    }
}

impl ClientFactory for HttpClientFactory {
    fn connect(&self, base_url: &str) -> Result<Arc<dyn ConfigApi>, SyncError> {
        info!("Connecting to configuration service at {}", base_url);
        let client = HttpConfigClient::with_client(self.client.clone(), base_url)?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client =
            HttpConfigClient::new("https://config.example.com/api", &ClientConfig::default())
                .unwrap();
        assert_eq!(client.base_url().as_str(), "https://config.example.com/api/");
    }

    #[test]
    fn test_parameter_url_joins_under_base_path() {
        let client =
            HttpConfigClient::new("https://config.example.com/api/", &ClientConfig::default())
                .unwrap();
        let url = client
            .parameter_url(&ConfigTriple::new("space1", "cfg1", "v1"), "p1")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://config.example.com/api/spaces/space1/configurations/cfg1/v1/p1"
        );
    }

    #[test]
    fn test_rejects_unparsable_base_url() {
        assert!(matches!(
            HttpConfigClient::new("not a url", &ClientConfig::default()),
            Err(SyncError::InvalidEndpoint { .. })
        ));
    }

    #[tokio::test]
    async fn test_incomplete_triple_fails_before_network() {
        // Port 9 (discard) is never contacted: the triple check comes first.
        let client =
            HttpConfigClient::new("http://127.0.0.1:9/", &ClientConfig::default()).unwrap();
        let result = client
            .fetch_parameter(&ConfigTriple::new("space1", "", "v1"), "p1")
            .await;
        assert_eq!(result, Err(SyncError::ConfigurationNotSet));
    }
}
