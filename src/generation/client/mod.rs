
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::GenerationConfig;
use crate::generation::CompletionClient;
use crate::{QagenError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// Completion client for an OpenAI-compatible chat completions API.
///
/// The API key is read from the environment variable named in the
/// configuration at construction time; requests without a key are sent
/// unauthenticated (local inference servers accept that).
#[derive(Debug, Clone)]
pub struct ChatClient {
    api_url: Url,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl ChatClient {
    #[inline]
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_url = Url::parse(&config.api_url)
            .map_err(|e| QagenError::Config(format!("invalid generation API URL: {e}")))?;

        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            debug!(
                "Environment variable {} is not set, sending unauthenticated requests",
                config.api_key_env
            );
        }

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            api_url,
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            agent,
        })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.api_url.as_str().trim_end_matches('/')
        )
    }
}

impl CompletionClient for ChatClient {
    #[inline]
    fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            temperature: self.temperature,
        };

        let request_json = serde_json::to_string(&request)
            .map_err(|e| QagenError::Generation(format!("failed to serialize request: {e}")))?;

        let url = self.completions_url();
        debug!("Requesting completion from {} ({})", url, self.model);

        let mut builder = self
            .agent
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", &format!("Bearer {key}"));
        }

        let response_text = builder
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| QagenError::Generation(format!("completion request failed: {e}")))?;

        let response: ChatResponse = serde_json::from_str(&response_text).map_err(|e| {
            QagenError::Generation(format!("failed to parse completion response: {e}"))
        })?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| QagenError::Generation("completion response had no choices".to_string()))
    }
}
