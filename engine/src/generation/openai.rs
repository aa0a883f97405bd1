use super::{parse_bundle, prompts, GenerationError, GenerationRequest, Result, SiteGenerator};
use crate::config::OpenAIConfig;
use crate::secrets::{scrub, SecretString};
use async_trait::async_trait;
use sdk::types::{Bundle, GeneratedFile};
use serde_json::json;
use std::time::Duration;

pub struct OpenAIGenerator {
    config: OpenAIConfig,
    api_key: SecretString,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: OpenAIConfig, api_key: SecretString) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    async fn error_for(response: reqwest::Response) -> GenerationError {
        let status = response.status();
        let text = scrub(&response.text().await.unwrap_or_default());

        if status.as_u16() == 401 || status.as_u16() == 403 {
            GenerationError::AuthenticationFailed(text)
        } else if status.as_u16() == 429 {
            GenerationError::RateLimitExceeded
        } else {
            GenerationError::InvalidRequest(format!("{}: {}", status, text))
        }
    }

    fn network_error(e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout
        } else {
            GenerationError::NetworkError(scrub(&e.to_string()))
        }
    }

    /// Send one system + user exchange and return the reply text
    async fn chat(&self, system: &str, user: String) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url());

        let payload = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(Self::network_error)?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::ParseError(e.to_string()))?;

        let choice = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| GenerationError::ParseError("No choices in response".to_string()))?;

        choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| GenerationError::ParseError("Empty content".to_string()))
    }
}

#[async_trait]
impl SiteGenerator for OpenAIGenerator {
    async fn check_health(&self) -> Result<()> {
        let url = format!("{}/models", self.base_url());
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .send()
            .await
            .map_err(Self::network_error)?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        Ok(())
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Bundle> {
        let reply = self
            .chat(prompts::GENERATE_SYSTEM, prompts::generate_user(request))
            .await?;
        let bundle = parse_bundle(&reply)?;
        tracing::debug!(files = bundle.len(), "Generated bundle");
        Ok(bundle)
    }

    async fn modify(&self, request: &GenerationRequest, current: &[GeneratedFile]) -> Result<Bundle> {
        let reply = self
            .chat(prompts::MODIFY_SYSTEM, prompts::modify_user(request, current))
            .await?;
        let bundle = parse_bundle(&reply)?;
        tracing::debug!(files = bundle.len(), "Revised bundle");
        Ok(bundle)
    }
}
