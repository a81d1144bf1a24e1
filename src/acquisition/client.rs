//! HTTP client for acquisition providers.
//!
//! # Responsibilities
//! - Send the configured GET/POST request with headers, params and body
//! - Enforce the provider timeout on every attempt
//! - Retry with backoff and parse the response through the configured schema

use async_trait::async_trait;
use serde_json::Value;

use crate::acquisition::{Acquire, AcquisitionError};
use crate::config::schema::{HttpMethod, ProviderConfig};
use crate::observability::metrics;
use crate::resilience::RetryPolicy;
use crate::upstream::UpstreamEndpoint;

/// Fetches replacement upstreams from HTTP providers.
#[derive(Debug, Clone)]
pub struct AcquisitionClient {
    http: reqwest::Client,
}

impl AcquisitionClient {
    /// Create a client that talks to providers directly, ignoring proxy
    /// environment variables.
    pub fn new() -> Result<Self, AcquisitionError> {
        let http = reqwest::Client::builder()
            .no_proxy()
            .user_agent(concat!("proxy-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AcquisitionError::Http(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(http))
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Send one request, without retries, and report whether a JSON
    /// document came back.
    pub async fn test_connection(&self, provider: &ProviderConfig) -> bool {
        match self.request_once(provider).await {
            Ok(_) => {
                tracing::info!(provider = %provider.id, "Provider connection test succeeded");
                true
            }
            Err(e) => {
                tracing::warn!(provider = %provider.id, error = %e, "Provider connection test failed");
                false
            }
        }
    }

    async fn request_once(&self, provider: &ProviderConfig) -> Result<Value, AcquisitionError> {
        tracing::debug!(provider = %provider.id, method = ?provider.method, endpoint = %provider.endpoint, "Sending acquisition request");

        let mut request = match provider.method {
            HttpMethod::Get => self.http.get(&provider.endpoint),
            HttpMethod::Post => {
                let request = self.http.post(&provider.endpoint);
                match &provider.body {
                    Some(body) => request.json(body),
                    None => request,
                }
            }
        };
        if !provider.params.is_empty() {
            request = request.query(&query_pairs(provider));
        }
        for (name, value) in &provider.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .timeout(provider.timeout())
            .send()
            .await
            .map_err(|e| transport_error(e, provider))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AcquisitionError::Http(format!("provider returned status {}", status)));
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                AcquisitionError::Timeout { secs: provider.timeout_secs }
            } else {
                AcquisitionError::Parse(format!("invalid JSON response: {}", e))
            }
        })
    }
}

#[async_trait]
impl Acquire for AcquisitionClient {
    async fn fetch(&self, provider: &ProviderConfig) -> Result<UpstreamEndpoint, AcquisitionError> {
        tracing::info!(provider = %provider.id, "Requesting new upstream");

        let policy = RetryPolicy::new(provider.retry_attempts, provider.backoff_base);
        let schema = provider.response_format.schema();

        let result = policy
            .run(|_| async move {
                let document = self.request_once(provider).await?;
                schema.extract(&document)
            })
            .await;

        match result {
            Ok(endpoint) => {
                metrics::record_acquisition(&provider.id, true);
                tracing::info!(provider = %provider.id, upstream = %endpoint, "Obtained new upstream");
                Ok(endpoint)
            }
            Err(exhausted) => {
                metrics::record_acquisition(&provider.id, false);
                let err = AcquisitionError::Exhausted {
                    provider: provider.id.clone(),
                    attempts: exhausted.attempts,
                    last: Box::new(exhausted.last),
                };
                tracing::error!(provider = %provider.id, error = %err, "Acquisition failed");
                Err(err)
            }
        }
    }
}

fn query_pairs(provider: &ProviderConfig) -> Vec<(&str, String)> {
    provider
        .params
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.as_str(), value)
        })
        .collect()
}

fn transport_error(e: reqwest::Error, provider: &ProviderConfig) -> AcquisitionError {
    if e.is_timeout() {
        AcquisitionError::Timeout { secs: provider.timeout_secs }
    } else {
        AcquisitionError::Http(e.to_string())
    }
}
