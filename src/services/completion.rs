use anyhow::{Result, anyhow};
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::CompletionConfig;
use crate::models::node::Role;

/// Wire role for the generation service. The service accepts one role the
/// node model never stores: `developer` instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Developer,
}

impl From<Role> for MessageRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => MessageRole::User,
            Role::Assistant => MessageRole::Assistant,
        }
    }
}

/// One role-tagged message in a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

/// An ordered message path plus the model to run it against.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

/// Stream chunks emitted during responses. `Text` carries an incremental
/// delta; consumers accumulate the full text themselves.
#[derive(Debug, Clone)]
pub enum StreamChunk {
    Text(String),
    Done,
    Error(String),
}

/// Type alias for response streams
pub type ResponseStream = BoxStream<'static, Result<StreamChunk>>;

/// Seam to the external generation service.
///
/// Precondition failures (missing credential) are reported through the outer
/// `Result` before any network activity begins; transport and provider
/// failures during streaming surface as `StreamChunk::Error` items.
pub trait CompletionClient: Send + Sync + 'static {
    fn stream_completion(&self, request: CompletionRequest) -> Result<ResponseStream>;
}

/// HTTP client for OpenAI-style `chat/completions` SSE streaming.
pub struct HttpCompletionClient {
    config: CompletionConfig,
    http: reqwest::Client,
}

impl HttpCompletionClient {
    pub fn new(config: CompletionConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

/// Extract the text delta from one SSE `data:` payload, if it carries one.
fn delta_from_event(data: &str) -> Option<String> {
    let event: serde_json::Value = match serde_json::from_str(data) {
        Ok(event) => event,
        Err(error) => {
            warn!(error = %error, "Skipping malformed stream event");
            return None;
        }
    };

    event["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|delta| !delta.is_empty())
        .map(str::to_string)
}

impl CompletionClient for HttpCompletionClient {
    fn stream_completion(&self, request: CompletionRequest) -> Result<ResponseStream> {
        let api_key = self
            .config
            .api_key
            .clone()
            .ok_or_else(|| anyhow!("API key not configured for completion provider"))?;

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "stream": true,
        });
        let http = self.http.clone();

        let stream = async_stream::stream! {
            let response = match http.post(&url).bearer_auth(&api_key).json(&body).send().await {
                Ok(response) => response,
                Err(error) => {
                    yield Ok(StreamChunk::Error(error.to_string()));
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                yield Ok(StreamChunk::Error(format!(
                    "completion request failed with {status}: {detail}"
                )));
                return;
            }

            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = bytes.next().await {
                let part = match chunk {
                    Ok(part) => part,
                    Err(error) => {
                        yield Ok(StreamChunk::Error(error.to_string()));
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&part));
                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim_end_matches('\r').to_string();
                    buffer.drain(..=newline);

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    if data == "[DONE]" {
                        yield Ok(StreamChunk::Done);
                        return;
                    }
                    if let Some(delta) = delta_from_event(data) {
                        yield Ok(StreamChunk::Text(delta));
                    }
                }
            }

            yield Ok(StreamChunk::Done);
        };

        Ok(Box::pin(stream))
    }
}
