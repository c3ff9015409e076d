//! Registry Client
//!
//! HTTP wrapper around the two registry calls the bootstrap needs: a
//! readiness probe and schema submission. Every failure here is retryable
//! and comes back as a [`SubmissionError`].

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::RegistryEndpoint;
use crate::error::{Result, SubmissionError};

/// Operations the coordinator drives against a registry
#[async_trait]
pub trait Registry: Send + Sync {
    /// Succeeds once the registry answers at all, whatever the status
    async fn probe(&self) -> std::result::Result<(), SubmissionError>;

    /// Register `body` as a new version of subject `name`
    async fn submit(&self, name: &str, body: &str) -> std::result::Result<(), SubmissionError>;
}

/// Schema registry reached over HTTP
pub struct RegistryClient {
    endpoint: RegistryEndpoint,
    http: Client,
}

impl RegistryClient {
    /// Create a client whose requests each time out after `request_timeout`
    pub fn new(endpoint: RegistryEndpoint, request_timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { endpoint, http })
    }
}

#[async_trait]
impl Registry for RegistryClient {
    async fn probe(&self) -> std::result::Result<(), SubmissionError> {
        let url = self.endpoint.join(["subjects"]);
        self.http
            .get(url)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| SubmissionError::Transport(e.to_string()))
    }

    async fn submit(&self, name: &str, body: &str) -> std::result::Result<(), SubmissionError> {
        let url = self.endpoint.join(["subjects", name, "versions"]);

        // No response means no body to read: hand back the transport error
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_owned())
            .send()
            .await
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::OK {
            info!(subject = name, "schema successfully sent to the registry");
            return Ok(());
        }

        match response.text().await {
            Ok(text) => {
                warn!(
                    subject = name,
                    status = status.as_u16(),
                    body = %text,
                    "registry rejected schema"
                );
                Err(SubmissionError::Status {
                    status: status.as_u16(),
                    body: text,
                })
            }
            Err(e) => {
                warn!(
                    subject = name,
                    status = status.as_u16(),
                    error = %e,
                    "failed to read registry response"
                );
                Err(SubmissionError::UnreadableBody {
                    status: status.as_u16(),
                    reason: e.to_string(),
                })
            }
        }
    }
}
