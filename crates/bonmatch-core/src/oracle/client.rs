//! HTTP client for a local generative model server (Ollama-compatible).

use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ConfigError, OracleError};
use crate::models::config::OracleConfig;
use crate::models::receipt::ReferenceItemSet;

use super::prompt::build_prompt;
use super::stream::collect_response;
use super::{NO_MATCH_SENTINEL, SemanticMatcher, interpret_answer};

/// Matching oracle backed by a streaming `generate` endpoint.
///
/// Built once per process from an immutable [`OracleConfig`]. Construction
/// fails if no bearer credential is configured, so a missing token is
/// reported before any request is made.
#[derive(Debug, Clone)]
pub struct OracleClient {
    client: Client,
    endpoint: Url,
    model: String,
    token: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

impl OracleClient {
    /// Create a client, resolving the credential from config or environment.
    pub fn new(config: &OracleConfig) -> Result<Self, ConfigError> {
        let token = config.resolve_token()?;
        Self::with_token(config, token)
    }

    /// Create a client with an explicit credential.
    pub fn with_token(config: &OracleConfig, token: impl Into<String>) -> Result<Self, ConfigError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ConfigError::MissingCredential {
                env_var: config.token_env.clone(),
            });
        }

        let url = config.endpoint();
        let endpoint = Url::parse(&url).map_err(|e| ConfigError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        let client = Client::builder()
            .user_agent(concat!("bonmatch/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            token,
        })
    }

    /// Model identifier sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one candidate to the oracle and return the aggregated, trimmed answer.
    pub async fn infer(
        &self,
        candidate: &str,
        references: &ReferenceItemSet,
    ) -> Result<String, OracleError> {
        let start = Instant::now();
        let prompt = build_prompt(candidate, references);
        let body = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
        };

        debug!(model = %self.model, candidate, "Sending request to oracle");

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let answer = collect_response(response.bytes_stream()).await?;

        debug!(
            candidate,
            answer = %answer.trim(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Oracle answered"
        );

        Ok(answer.trim().to_string())
    }

    /// Ask the oracle, absorbing any failure into the sentinel answer.
    ///
    /// Returns either the oracle's answer or exactly [`NO_MATCH_SENTINEL`].
    pub async fn ask(&self, candidate: &str, references: &ReferenceItemSet) -> String {
        match self.match_candidate(candidate, references).await {
            Ok(Some(answer)) => answer,
            Ok(None) => NO_MATCH_SENTINEL.to_string(),
            Err(e) => {
                warn!(candidate, error = %e, "Oracle call failed");
                NO_MATCH_SENTINEL.to_string()
            }
        }
    }
}

#[async_trait]
impl SemanticMatcher for OracleClient {
    fn name(&self) -> &str {
        "oracle"
    }

    async fn match_candidate(
        &self,
        candidate: &str,
        references: &ReferenceItemSet,
    ) -> Result<Option<String>, OracleError> {
        if references.is_empty() {
            debug!(candidate, "Empty reference set, skipping oracle call");
            return Ok(None);
        }

        let answer = self.infer(candidate, references).await?;
        Ok(interpret_answer(&answer))
    }
}
