//! [`AnalysisRequester`] that posts the answers to a remote `/api/results` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error};

use crate::{
    analysis::{AnalysisPayload, AnalysisRequest, AnalysisRequester, AnalysisResponse},
    error::AnalysisError,
};

pub const RESULTS_PATH: &str = "/api/results";

#[derive(Clone)]
pub struct HttpAnalysisRequester {
    client: Client,
    endpoint: String,
}

impl HttpAnalysisRequester {
    /// `base_url` is the service root, e.g. `http://localhost:3000`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), RESULTS_PATH),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AnalysisRequester for HttpAnalysisRequester {
    async fn request(&self, request: AnalysisRequest) -> Result<AnalysisPayload, AnalysisError> {
        debug!(endpoint = %self.endpoint, "posting analysis request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "analysis request failed");
                AnalysisError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            // failure bodies carry a generic message, keep the status
            return Err(AnalysisError::Status {
                status: status.as_u16(),
            });
        }

        let envelope: AnalysisResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Malformed(e.to_string()))?;
        envelope.into_payload()
    }
}
