//! # npcbrain
//!
//! npcbrain connects a game server's live event stream to a Large Language Model that decides
//! what a non-player character does next. Each chat event becomes one structured action
//! (`IDLE`, `FOLLOW`, `ATTACK`, `GOTO`, `INTERACT`, `MINE`, `FIND`), a target and a line of
//! speech, which is sent back to the server.
//!
//! The crate is layered, leaves first:
//!
//! * **Decision codec** ([`action`]): the action vocabulary, the `perform_action` tool schema,
//!   prompt rendering and validation of the model's answer.
//! * **Conversation state** ([`ConversationLog`]): a bounded turn log with the system prompt
//!   pinned at index 0 and keep-newest trimming.
//! * **Decision engine** ([`NpcBrain`]): one forced tool call per decision, with a fixed
//!   `IDLE` fallback whenever anything goes wrong. Both transports consume it through the
//!   [`DecisionEngine`] trait.
//! * **Transports** ([`bridges`]): a reconnecting duplex WebSocket bridge and a strict
//!   lock-step request/reply bridge.
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use npcbrain::bridges::duplex::DuplexBridge;
//! use npcbrain::bridges::websocket::WebSocketConnector;
//! use npcbrain::clients::openai::OpenAIClient;
//! use npcbrain::{BrainConfig, NpcBrain};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     npcbrain::init_logger();
//!
//!     let config = BrainConfig::from_env()?;
//!     let client = OpenAIClient::new(&config.llm_api_key, &config.llm_model, &config.llm_base_url)?;
//!     let brain = NpcBrain::new(Arc::new(client), &config)?;
//!
//!     let connector = WebSocketConnector::new(config.server_uri());
//!     let mut bridge = DuplexBridge::from_config(connector, brain, &config);
//!     bridge.run().await;
//!     Ok(())
//! }
//! ```

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// Verbosity follows `RUST_LOG`; when it is unset the NPC's decisions and connection
/// changes (`info`) are shown.
///
/// ```rust
/// npcbrain::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .init();
    });
}

// Import the top-level `npcbrain` module.
pub mod npcbrain;

// Re-exporting key items for easier external access.
pub use npcbrain::action;
pub use npcbrain::action::{ActionDecision, ActionType, CodecError};
pub use npcbrain::brain::{DecisionEngine, DecisionError, NpcBrain};
pub use npcbrain::bridges;
pub use npcbrain::client_wrapper;
pub use npcbrain::client_wrapper::{ClientWrapper, Message, Role, TokenUsage};
pub use npcbrain::clients;
pub use npcbrain::config::{BrainConfig, ConfigError};
pub use npcbrain::conversation::ConversationLog;
pub use npcbrain::event;
pub use npcbrain::game_context::GameContext;
pub use npcbrain::tool_schema;
