use async_trait::async_trait;

use crate::submit::{SubmissionClient, SubmissionRequest, TransportError};

/// Submission client that POSTs the payload as JSON to a webhook endpoint.
/// Tracking metadata travels as headers; the body is the engine contract.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    endpoint: String,
    origin: Option<String>,
    http: reqwest::Client,
}

impl WebhookClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            origin: None,
            http: reqwest::Client::new(),
        }
    }

    /// Origin advertised in the `X-Client-Origin` header.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

#[async_trait]
impl SubmissionClient for WebhookClient {
    async fn submit(&self, request: &SubmissionRequest) -> Result<String, TransportError> {
        let mut call = self
            .http
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .header("X-Form-Tag", &request.meta.tracking.tag)
            .json(request);
        if let Some(origin) = &self.origin {
            call = call.header("X-Client-Origin", origin);
        }

        let response = call
            .send()
            .await
            .map_err(|error| TransportError::Unreachable(error.to_string()))?;
        response
            .text()
            .await
            .map_err(|error| TransportError::Unreachable(error.to_string()))
    }
}
