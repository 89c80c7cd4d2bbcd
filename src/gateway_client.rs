//! JSON-over-HTTP implementations of the capability contracts.
//!
//! Each collaborator is reached through an operator-run gateway speaking a small JSON
//! contract:
//!
//! - `POST {source}/search` with `{criteria, max_results}` returns `{candidates: [...]}`
//! - `POST {verifier}/verify` with `{email}` returns `{status, score, reason}`
//! - `POST {intel}/company` with `{name, website}` returns company facts, 404 when unknown
//!
//! Every endpoint gets its own circuit breaker.

use async_trait::async_trait;
use failsafe::futures::CircuitBreaker;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::circuit_breaker::{create_provider_circuit_breaker, ProviderBreaker};
use crate::config::GatewayEndpoint;
use crate::errors::AppError;
use crate::models::{CompanyFacts, ProviderVerdict, RawLeadCandidate, TargetingCriteria};
use crate::providers::{CompanyIntelProvider, SourceAdapter, VerificationProvider};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client, bearer token and breaker for one gateway endpoint.
#[derive(Clone)]
struct GatewayTransport {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    breaker: ProviderBreaker,
}

impl GatewayTransport {
    fn new(base_url: &str, token: Option<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create gateway client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            breaker: create_provider_circuit_breaker(),
        })
    }

    /// POST `body` to `{base_url}{path}`. `Ok(None)` means the gateway answered 404.
    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<Option<T>, AppError> {
        let url = format!("{}{}", self.base_url, path);
        let call = async {
            let mut request = self.client.post(&url).json(&body);
            if let Some(token) = &self.token {
                request = request.header("Authorization", format!("Bearer {}", token));
            }
            let response = request
                .send()
                .await
                .map_err(|e| AppError::ExternalApiError(format!("Gateway request failed: {}", e)))?;

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(AppError::ExternalApiError(format!(
                    "Gateway returned {}: {}",
                    status, error_text
                )));
            }

            response.json::<T>().await.map(Some).map_err(|e| {
                AppError::ExternalApiError(format!("Failed to parse gateway response: {}", e))
            })
        };

        match self.breaker.call(call).await {
            Ok(value) => Ok(value),
            Err(failsafe::Error::Rejected) => {
                tracing::warn!("Circuit open, rejecting call to {}", url);
                Err(AppError::ExternalApiError(format!("circuit open for {}", url)))
            }
            Err(failsafe::Error::Inner(e)) => Err(e),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    candidates: Vec<RawLeadCandidate>,
}

/// Source adapter backed by a gateway `search` endpoint.
#[derive(Clone)]
pub struct GatewaySourceAdapter {
    name: String,
    transport: GatewayTransport,
}

impl GatewaySourceAdapter {
    pub fn new(endpoint: &GatewayEndpoint, token: Option<String>) -> Result<Self, AppError> {
        Ok(Self {
            name: endpoint.name.clone(),
            transport: GatewayTransport::new(&endpoint.url, token)?,
        })
    }
}

#[async_trait]
impl SourceAdapter for GatewaySourceAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        criteria: &TargetingCriteria,
        max_results: usize,
    ) -> Result<Vec<RawLeadCandidate>, AppError> {
        tracing::info!("Searching source {} for up to {} candidates", self.name, max_results);
        let body = json!({ "criteria": criteria, "max_results": max_results });
        let response: Option<SearchResponse> = self
            .transport
            .post_json("/search", body)
            .await
            .map_err(|e| AppError::SourceUnavailable(format!("{}: {}", self.name, e)))?;

        let mut candidates = response.map(|r| r.candidates).unwrap_or_default();
        for candidate in candidates.iter_mut() {
            candidate.source = self.name.clone();
        }
        Ok(candidates)
    }
}

/// Verification provider backed by a gateway `verify` endpoint.
#[derive(Clone)]
pub struct GatewayVerificationProvider {
    name: String,
    transport: GatewayTransport,
}

impl GatewayVerificationProvider {
    pub fn new(endpoint: &GatewayEndpoint, token: Option<String>) -> Result<Self, AppError> {
        Ok(Self {
            name: endpoint.name.clone(),
            transport: GatewayTransport::new(&endpoint.url, token)?,
        })
    }
}

#[async_trait]
impl VerificationProvider for GatewayVerificationProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn verify_email(&self, address: &str) -> Result<ProviderVerdict, AppError> {
        let verdict: Option<ProviderVerdict> = self
            .transport
            .post_json("/verify", json!({ "email": address }))
            .await?;
        Ok(verdict.unwrap_or_else(|| ProviderVerdict::unknown("address not known to provider")))
    }
}

/// Company intelligence backed by a gateway `company` endpoint.
#[derive(Clone)]
pub struct GatewayCompanyIntelProvider {
    transport: GatewayTransport,
}

impl GatewayCompanyIntelProvider {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, AppError> {
        Ok(Self {
            transport: GatewayTransport::new(base_url, token)?,
        })
    }
}

#[async_trait]
impl CompanyIntelProvider for GatewayCompanyIntelProvider {
    async fn gather(
        &self,
        company_name: &str,
        website: Option<&str>,
    ) -> Result<CompanyFacts, AppError> {
        let facts: Option<CompanyFacts> = self
            .transport
            .post_json(
                "/company",
                json!({ "name": company_name, "website": website }),
            )
            .await
            .map_err(|e| AppError::EnrichmentFailure(format!("{}: {}", company_name, e)))?;
        Ok(facts.unwrap_or_default())
    }
}
