//! Chat-completions client for an OpenAI-compatible serving endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{LlmConfig, SamplingConfig};
use crate::error::{MinerError, Result};
use crate::models::{ComplexityAnalysis, ParameterExtraction};

use super::prompts;
use super::{ClassificationService, ExtractionService, Purpose, Structured, TextGenerator};

#[derive(Serialize)]
struct ChatApiRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: [ApiMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatApiResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Blocking chat client implementing every language-model seam.
pub struct LlmClient {
    endpoint: String,
    model: String,
    token: Option<String>,
    config: LlmConfig,
    http_client: reqwest::blocking::Client,
}

impl LlmClient {
    /// Build a client from config. The bearer token is optional.
    pub fn new(config: &LlmConfig, token: Option<String>) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(MinerError::MissingConfig("llm.endpoint".to_string()));
        }
        let http_client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MinerError::Config(format!("HTTP client error: {e}")))?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            token,
            config: config.clone(),
            http_client,
        })
    }

    const fn sampling_for(&self, purpose: Purpose) -> SamplingConfig {
        match purpose {
            Purpose::UsageGuidance => self.config.usage_guidance,
            Purpose::FunctionDescription => self.config.function_description,
            Purpose::SqlCorrection => self.config.sql_correction,
        }
    }

    /// Send one system+user exchange and return the reply text.
    fn chat(&self, system_prompt: &str, user_prompt: &str, sampling: SamplingConfig) -> Result<String> {
        let body = ChatApiRequest {
            model: Some(self.model.as_str()).filter(|m| !m.is_empty()),
            messages: [
                ApiMessage {
                    role: "system",
                    content: system_prompt,
                },
                ApiMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: sampling.temperature,
            max_tokens: sampling.max_tokens,
        };

        let mut request = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .map_err(|e| MinerError::LlmUnavailable(format!("request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| MinerError::LlmUnavailable(format!("failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(MinerError::Api {
                status: status.as_u16(),
                message: crate::utils::truncate_string(&text, 500),
            });
        }

        let parsed: ChatApiResponse = serde_json::from_str(&text)
            .map_err(|e| MinerError::MalformedResponse(format!("invalid chat response: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or_else(|| MinerError::MalformedResponse("no choices in response".to_string()))?;
        debug!(chars = content.len(), "Model reply received");
        Ok(content)
    }

    fn structured<T: serde::de::DeserializeOwned>(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        sampling: SamplingConfig,
    ) -> Structured<T> {
        match self.chat(system_prompt, user_prompt, sampling) {
            Ok(reply) => Structured::from_reply(&reply),
            Err(MinerError::MalformedResponse(raw)) => Structured::Malformed(raw),
            Err(err) => {
                warn!(error = %err, "Structured model call failed");
                Structured::Unavailable(err.to_string())
            }
        }
    }
}

impl ClassificationService for LlmClient {
    fn classify_structured(&self, system_prompt: &str, sql: &str) -> Structured<ComplexityAnalysis> {
        self.structured(
            system_prompt,
            &prompts::classification_message(sql),
            self.config.classification,
        )
    }
}

impl ExtractionService for LlmClient {
    fn extract_structured(
        &self,
        system_prompt: &str,
        sql: &str,
        question: &str,
    ) -> Structured<ParameterExtraction> {
        self.structured(
            system_prompt,
            &prompts::extraction_message(sql, question),
            self.config.extraction,
        )
    }
}

impl TextGenerator for LlmClient {
    fn generate(&self, purpose: Purpose, system_prompt: &str, user_prompt: &str) -> Result<String> {
        debug!(purpose = purpose.as_str(), "Generating text");
        self.chat(system_prompt, user_prompt, self.sampling_for(purpose))
            .map(|reply| reply.trim().to_string())
    }
}
