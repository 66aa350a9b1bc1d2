//! The `OpenAIClient` struct implements `ClientWrapper` for OpenAI compatible Chat Completions
//! endpoints (OpenAI itself, Ollama, vLLM, LM Studio, ...) with native tool calling.
//!
//! # Key Features
//!
//! - **Forced tool choice**: `ToolChoice::Function(name)` is sent as
//!   `{"type":"function","function":{"name":...}}` so the model cannot answer in free text.
//! - **Automatic Usage Capture**: stores the latest `TokenUsage` internally; read it with
//!   `get_last_usage()`.
//! - **Pooled connections**: the HTTP client comes from [`get_http_client`].
//!
//! # Example
//!
//! ```rust,no_run
//! use npcbrain::clients::openai::OpenAIClient;
//! use npcbrain::client_wrapper::{ClientWrapper, Message, Role, ToolChoice};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let client = OpenAIClient::new("sk-...", "gpt-4o", "https://api.openai.com/v1")?;
//!     let reply = client
//!         .send_message(
//!             &[Message::new(Role::User, "Hello!")],
//!             &[],
//!             ToolChoice::Auto,
//!         )
//!         .await?;
//!     println!("{}", reply.content);
//!     Ok(())
//! }
//! ```

use std::error::Error;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::npcbrain::client_wrapper::{
    ClientWrapper, Message, Role, TokenUsage, ToolCall, ToolChoice, ToolDefinition,
};
use crate::npcbrain::clients::http_pool::get_http_client;

/// Client wrapper for OpenAI compatible Chat Completions APIs.
pub struct OpenAIClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    /// Full URL of the `/chat/completions` endpoint.
    endpoint: String,
    /// Storage for the token usage returned by the most recent request.
    token_usage: Mutex<Option<TokenUsage>>,
}

impl OpenAIClient {
    /// Construct a client for `model` at `base_url` (e.g. `https://api.openai.com/v1` or
    /// `http://localhost:11434/v1`).
    pub fn new(api_key: &str, model: &str, base_url: &str) -> Result<Self, reqwest::Error> {
        let base_url = base_url.trim_end_matches('/');
        Ok(OpenAIClient {
            http: get_http_client(base_url)?,
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: format!("{}/chat/completions", base_url),
            token_usage: Mutex::new(None),
        })
    }

    fn build_request<'a>(
        &'a self,
        messages: &'a [Message],
        tools: &'a [ToolDefinition],
        tool_choice: &'a ToolChoice,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            tools: tools
                .iter()
                .map(|t| ChatTool {
                    kind: "function",
                    function: ChatFunction {
                        name: &t.name,
                        description: &t.description,
                        parameters: &t.parameters,
                    },
                })
                .collect(),
            tool_choice: if tools.is_empty() {
                None
            } else {
                Some(match tool_choice {
                    ToolChoice::Auto => serde_json::json!("auto"),
                    ToolChoice::Function(name) => serde_json::json!({
                        "type": "function",
                        "function": { "name": name }
                    }),
                })
            },
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ChatTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ChatFunction<'a>,
}

#[derive(Serialize)]
struct ChatFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChatToolCall>,
}

#[derive(Deserialize)]
struct ChatToolCall {
    #[serde(default)]
    id: String,
    function: ChatToolCallFunction,
}

#[derive(Deserialize)]
struct ChatToolCallFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

#[async_trait]
impl ClientWrapper for OpenAIClient {
    async fn send_message(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        tool_choice: ToolChoice,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        let request = self.build_request(messages, tools, &tool_choice);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!(
                "OpenAIClient::send_message(...): API error {}: {}",
                status,
                body
            );
            return Err(format!("chat completion failed with status {}", status).into());
        }

        let parsed: ChatResponse = response.json().await?;

        if let Some(usage) = parsed.usage {
            if let Ok(mut slot) = self.token_usage.lock() {
                *slot = Some(TokenUsage {
                    input_tokens: usage.prompt_tokens,
                    output_tokens: usage.completion_tokens,
                    total_tokens: usage.total_tokens,
                });
            }
        }

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or("chat completion returned no choices")?;

        Ok(Message {
            role: Role::Assistant,
            content: Arc::from(choice.message.content.unwrap_or_default()),
            tool_calls: choice
                .message
                .tool_calls
                .into_iter()
                .map(|call| ToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments: call.function.arguments,
                })
                .collect(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.token_usage)
    }
}
