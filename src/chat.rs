//! Chat completion collaborator

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::session::Message;
use crate::{Error, Result};

/// `OpenAI` chat completions endpoint
const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Produces an assistant reply for a message history
///
/// Every failure (authentication, rate limit, network, malformed response)
/// surfaces as `Error::Chat`. Implementations do not retry.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Request a reply for `messages` using `model`, capped at `max_tokens`
    async fn complete(&self, messages: &[Message], model: &str, max_tokens: u32) -> Result<String>;
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<&'a str>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// `OpenAI` chat completions client
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: SecretString,
    url: String,
    reasoning_effort: Option<String>,
}

impl OpenAiChat {
    /// Create a client for the public `OpenAI` endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(api_key: SecretString) -> Result<Self> {
        Self::with_url(api_key, CHAT_URL)
    }

    /// Create a client for an OpenAI-compatible endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn with_url(api_key: SecretString, url: impl Into<String>) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for chat".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            url: url.into(),
            reasoning_effort: None,
        })
    }

    /// Send `reasoning_effort` with every request (`None` omits the field)
    #[must_use]
    pub fn with_reasoning_effort(mut self, effort: Option<String>) -> Self {
        self.reasoning_effort = effort;
        self
    }
}

/// Pull the first non-blank reply out of a completion response
fn reply_text(response: ChatCompletionResponse) -> Result<String> {
    let reply = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| Error::Chat("response contained no message".to_string()))?;

    if reply.trim().is_empty() {
        return Err(Error::Chat("empty reply".to_string()));
    }
    Ok(reply)
}

#[async_trait]
impl ChatClient for OpenAiChat {
    async fn complete(&self, messages: &[Message], model: &str, max_tokens: u32) -> Result<String> {
        tracing::debug!(model, messages = messages.len(), "requesting chat completion");

        let request = ChatCompletionRequest {
            model,
            messages,
            max_completion_tokens: max_tokens,
            reasoning_effort: self.reasoning_effort.as_deref(),
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "chat request failed");
                Error::Chat(format!("request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat API error");
            return Err(Error::Chat(format!("API error {status}: {body}")));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Chat(format!("failed to parse response: {e}")))?;

        let reply = reply_text(result)?;

        tracing::debug!(reply_len = reply.len(), "chat completion received");
        Ok(reply)
    }
}
