//! HTTP client for the external agent overlay service.
//!
//! A `reqwest::Client` held by value, GET/decode, and status-code-to-error
//! mapping. This client is optional: an unset base URL makes every
//! operation a silent no-op rather than a construction error.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::AgentOverlayError;

/// A reserved file or path glob held by an agent against a project.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reservation {
    pub agent_id: String,
    pub project: String,
    pub pattern: String,
}

/// An active agent session reported by the overlay service.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Agent {
    pub agent_id: String,
    pub name: String,
    pub status: String,
    pub project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
    #[serde(default)]
    pub reservations: Vec<String>,
}

/// Client for the agent overlay HTTP service. Constructed once at startup;
/// `base_url: None` makes every operation return an empty result rather
/// than attempting a connection.
pub struct AgentOverlayClient {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl AgentOverlayClient {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { http, base_url }
    }

    pub fn is_available(&self) -> bool {
        self.base_url.is_some()
    }

    /// `GET {base}/api/agents`. An unconfigured client returns an empty
    /// list, not an error.
    pub async fn list_agents(&self) -> Result<Vec<Agent>, AgentOverlayError> {
        let Some(base_url) = &self.base_url else {
            return Ok(Vec::new());
        };

        let url = format!("{base_url}/api/agents");
        fetch_json(&self.http, &url).await
    }

    /// `GET {base}/api/reservations?project=<url-escaped>`. An unconfigured
    /// client returns an empty list, not an error.
    pub async fn list_reservations(
        &self,
        project: &str,
    ) -> Result<Vec<Reservation>, AgentOverlayError> {
        let Some(base_url) = &self.base_url else {
            return Ok(Vec::new());
        };

        let url = format!(
            "{base_url}/api/reservations?project={}",
            urlencoding::encode(project)
        );
        fetch_json(&self.http, &url).await
    }
}

async fn fetch_json<T: for<'de> Deserialize<'de>>(
    http: &reqwest::Client,
    url: &str,
) -> Result<T, AgentOverlayError> {
    let response = http.get(url).send().await.map_err(|source| {
        let message = source.to_string();
        error!(url, error = %message, "agent overlay unreachable");
        AgentOverlayError::Connection(message)
    })?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        error!(url, status = status.as_u16(), "agent overlay returned a non-200 status");
        return Err(AgentOverlayError::Status {
            status: status.as_u16(),
        });
    }

    let result = response
        .json::<T>()
        .await
        .map_err(|source| AgentOverlayError::Decode(source.to_string()));

    if result.is_ok() {
        debug!(url, "agent overlay request succeeded");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_client_returns_empty_agents() {
        let client = AgentOverlayClient::new(None, Duration::from_secs(5));
        assert_eq!(client.list_agents().await.unwrap(), Vec::new());
        assert!(!client.is_available());
    }

    #[tokio::test]
    async fn unconfigured_client_returns_empty_reservations() {
        let client = AgentOverlayClient::new(None, Duration::from_secs(5));
        assert_eq!(
            client.list_reservations("/w/projA").await.unwrap(),
            Vec::new()
        );
    }

    #[tokio::test]
    async fn configured_client_reports_available() {
        let client =
            AgentOverlayClient::new(Some("http://127.0.0.1:1".to_string()), Duration::from_secs(5));
        assert!(client.is_available());
    }

    #[tokio::test]
    async fn connection_failure_is_an_error_not_empty() {
        // Port 1 is reserved and will not accept connections.
        let client =
            AgentOverlayClient::new(Some("http://127.0.0.1:1".to_string()), Duration::from_millis(200));
        let err = client.list_agents().await.unwrap_err();
        assert!(matches!(err, AgentOverlayError::Connection(_)));
    }
}
