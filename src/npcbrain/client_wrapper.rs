//! A ClientWrapper is a wrapper around a chat-completion service that supports native tool calls.
//! It does not keep track of the conversation, for that we use a
//! [`ConversationLog`](crate::npcbrain::conversation::ConversationLog) owned by the
//! [`NpcBrain`](crate::npcbrain::brain::NpcBrain), which hands the full log to the client
//! on every decision.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::{Arc, Mutex};

/// Who authored a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    // the NPC persona, pinned at the start of every request
    System,
    // a message sent by a player, rendered with its game context
    User,
    // a previous decision, stored as the raw tool arguments
    Assistant,
}

impl Role {
    /// Wire name used by OpenAI compatible chat APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// How many tokens were spent on prompt vs. completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

/// A structured function invocation returned by the model instead of free text.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
    /// Provider assigned identifier of the call.
    pub id: String,
    /// Name of the function the model chose.
    pub name: String,
    /// JSON encoded arguments, exactly as the model produced them.
    pub arguments: String,
}

/// One conversation turn sent to, or received from, the model.
///
/// The content is an `Arc<str>` so a turn can be shared between the log and an outgoing
/// request without copying, and can never be mutated once appended.
#[derive(Clone, Debug)]
pub struct Message {
    pub role: Role,
    /// Text of the turn. Empty for an assistant reply that only carries tool calls.
    pub content: Arc<str>,
    /// Native tool calls attached to an assistant response. Empty for stored turns.
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    /// Build a plain text turn.
    pub fn new(role: Role, content: impl Into<Arc<str>>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// A function the model may call, in the shape chat-completion APIs expect.
#[derive(Clone, Debug)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the function arguments.
    pub parameters: serde_json::Value,
}

/// How the model is allowed to answer a request that carries tools.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolChoice {
    /// The model may answer with text or call any tool.
    Auto,
    /// The model must call the named function and may not answer with free text.
    Function(String),
}

/// Trait defining the interface to interact with chat-completion services.
#[async_trait]
pub trait ClientWrapper: Send + Sync {
    /// Send the conversation to the LLM and get one assistant message back.
    /// - `messages`: the ordered turns, system prompt first.
    /// - `tools`: functions the model may call.
    /// - `tool_choice`: whether a structured call is mandatory.
    async fn send_message(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        tool_choice: ToolChoice,
    ) -> Result<Message, Box<dyn Error + Send + Sync>>;

    /// Identifier of the model requests are sent to.
    fn model_name(&self) -> &str;

    /// Hook to retrieve usage from the *last* send_message() call.
    /// Default impl reads `usage_slot()` so wrappers without accounting return None.
    fn get_last_usage(&self) -> Option<TokenUsage> {
        self.usage_slot()
            .and_then(|slot| slot.lock().ok().and_then(|u| u.clone()))
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        // Implementations supporting TokenUsage tracking override this method.
        None
    }
}
