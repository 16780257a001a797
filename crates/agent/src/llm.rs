//! Model client abstraction plus the HTTP implementation for the three
//! supported providers. Everything above this module talks to `LlmClient`
//! only; tests script replies without any network.

use anyhow::{anyhow, Context, Result};
use askdb_core::config::{LlmConfig, LlmProvider};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One stateless completion: a system instruction plus a user message.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Role of one turn in the chat history a caller threads through the API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    Human,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn human(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Human, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

pub struct HttpLlmClient {
    http: reqwest::Client,
    provider: LlmProvider,
    base_url: Option<String>,
    model: String,
    api_key: Option<SecretString>,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .context("building llm http client")?;

        Ok(Self {
            http,
            provider: config.provider,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn base_or(&self, default: &str) -> String {
        self.base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| default.to_string())
    }

    fn endpoint(&self) -> String {
        match self.provider {
            LlmProvider::OpenAi => {
                format!("{}/chat/completions", self.base_or("https://api.openai.com/v1"))
            }
            LlmProvider::Ollama => {
                format!("{}/v1/chat/completions", self.base_or("http://localhost:11434"))
            }
            LlmProvider::Anthropic => {
                format!("{}/v1/messages", self.base_or("https://api.anthropic.com"))
            }
        }
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .ok_or_else(|| anyhow!("llm api key is not configured"))
    }

    async fn complete_openai_style(&self, system: &str, user: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "temperature": 0.0,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let mut request = self.http.post(self.endpoint()).json(&body);
        if matches!(self.provider, LlmProvider::OpenAi) {
            request = request.bearer_auth(self.api_key()?);
        }

        let response: Value = request
            .send()
            .await
            .context("llm request failed")?
            .error_for_status()
            .context("llm returned an error status")?
            .json()
            .await
            .context("llm reply was not JSON")?;

        response["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("llm reply carried no message content"))
    }

    async fn complete_anthropic(&self, system: &str, user: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "max_tokens": 2048,
            "system": system,
            "messages": [{"role": "user", "content": user}],
        });

        let response: Value = self
            .http
            .post(self.endpoint())
            .header("x-api-key", self.api_key()?)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .context("llm request failed")?
            .error_for_status()
            .context("llm returned an error status")?
            .json()
            .await
            .context("llm reply was not JSON")?;

        response["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("llm reply carried no text content"))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        match self.provider {
            LlmProvider::OpenAi | LlmProvider::Ollama => {
                self.complete_openai_style(system, user).await
            }
            LlmProvider::Anthropic => self.complete_anthropic(system, user).await,
        }
    }
}
