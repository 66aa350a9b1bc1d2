//! The decision engine.
//!
//! [`NpcBrain`] turns one rendered prompt into exactly one [`ActionDecision`]. It owns the
//! NPC's [`ConversationLog`], sends the whole log to the model together with the
//! `perform_action` tool, and forces the model to call that tool.
//!
//! Nothing escapes [`NpcBrain::decide`]: transport errors, HTTP failures, timeouts, answers
//! without a tool call and invalid arguments all become [`ActionDecision::fallback`]. There is
//! no retry; a failed decision is answered straight away so the game server is never kept
//! waiting.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use npcbrain::{BrainConfig, DecisionEngine, GameContext, NpcBrain};
//! use npcbrain::clients::openai::OpenAIClient;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = BrainConfig::default();
//! let client = OpenAIClient::new(&config.llm_api_key, &config.llm_model, &config.llm_base_url)?;
//! let mut brain = NpcBrain::new(Arc::new(client), &config)?;
//!
//! let decision = brain.think("Gael", "follow me", &GameContext::default()).await;
//! println!("{} -> {}", decision.action_type, decision.speech);
//! # Ok(())
//! # }
//! ```

use crate::npcbrain::action::{
    encode_request, perform_action_tool, validate_arguments, ActionDecision, CodecError,
    PERFORM_ACTION,
};
use crate::npcbrain::client_wrapper::{ClientWrapper, ToolChoice, ToolDefinition};
use crate::npcbrain::config::{BrainConfig, ConfigError};
use crate::npcbrain::conversation::ConversationLog;
use crate::npcbrain::game_context::GameContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why a decision could not be produced. Never leaves the brain.
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("model call failed: {0}")]
    Client(String),
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("model answered without calling perform_action")]
    MissingToolCall,
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// The single interface both transport bridges consume.
///
/// `think` takes `&mut self`: whoever owns the engine can only have one decision in flight.
/// `Sync` lets a bridge hold `&self` across awaits while it reports events.
#[async_trait]
pub trait DecisionEngine: Send + Sync {
    /// Decide how the NPC reacts to `message` from `user`. Always returns a decision.
    async fn think(&mut self, user: &str, message: &str, context: &GameContext)
        -> ActionDecision;
}

/// LLM-backed decision engine for one NPC.
pub struct NpcBrain {
    client: Arc<dyn ClientWrapper>,
    log: ConversationLog,
    tool: ToolDefinition,
    timeout: Duration,
}

impl NpcBrain {
    /// Creates a brain whose log starts with the configured system prompt.
    pub fn new(client: Arc<dyn ClientWrapper>, config: &BrainConfig) -> Result<Self, ConfigError> {
        let log = ConversationLog::new(
            config.system_prompt.as_str(),
            config.history_max_turns,
            config.history_keep_turns,
        )?;
        Ok(Self::with_log(client, log, config.decision_timeout))
    }

    /// Creates a brain around an existing log.
    pub fn with_log(client: Arc<dyn ClientWrapper>, log: ConversationLog, timeout: Duration) -> Self {
        NpcBrain {
            client,
            log,
            tool: perform_action_tool(),
            timeout,
        }
    }

    /// Appends `prompt` as a user turn and asks the model for a decision.
    ///
    /// On success the raw tool arguments are appended as the assistant turn. On any failure
    /// the user turn stays in the log, no assistant turn is added, and the fallback decision
    /// is returned.
    pub async fn decide(&mut self, prompt: &str) -> ActionDecision {
        self.log.append_user(prompt);

        match self.try_decide().await {
            Ok((decision, raw_arguments)) => {
                log::info!(
                    "Brain Decision: {} -> {}",
                    decision.action_type,
                    decision.speech
                );
                self.log.append_assistant(raw_arguments);
                decision
            }
            Err(e) => {
                log::error!("LLM Error: {}", e);
                ActionDecision::fallback()
            }
        }
    }

    async fn try_decide(&self) -> Result<(ActionDecision, String), DecisionError> {
        let call = self.client.send_message(
            self.log.turns(),
            std::slice::from_ref(&self.tool),
            ToolChoice::Function(PERFORM_ACTION.to_string()),
        );

        let response = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| DecisionError::Timeout(self.timeout))?
            .map_err(|e| DecisionError::Client(e.to_string()))?;

        if let Some(usage) = self.client.get_last_usage() {
            log::debug!(
                "NpcBrain::try_decide(): {} tokens ({} in, {} out) on {}",
                usage.total_tokens,
                usage.input_tokens,
                usage.output_tokens,
                self.client.model_name()
            );
        }

        let call = response
            .tool_calls
            .into_iter()
            .find(|call| call.name == PERFORM_ACTION)
            .ok_or(DecisionError::MissingToolCall)?;

        let decision = validate_arguments(&call.arguments)?;
        Ok((decision, call.arguments))
    }

    /// The conversation so far.
    pub fn log(&self) -> &ConversationLog {
        &self.log
    }
}

#[async_trait]
impl DecisionEngine for NpcBrain {
    async fn think(
        &mut self,
        user: &str,
        message: &str,
        context: &GameContext,
    ) -> ActionDecision {
        let prompt = encode_request(user, message, context);
        self.decide(&prompt).await
    }
}
