//! Configuration for the NPC brain process.
//!
//! [`BrainConfig`] is a plain struct: construct it by hand, start from
//! [`BrainConfig::default`], or read it from the environment with
//! [`BrainConfig::from_env`] (which also loads a `.env` file when one exists).
//! It is read once at startup and never changes afterwards.
//!
//! # Example
//!
//! ```rust
//! use npcbrain::BrainConfig;
//!
//! let config = BrainConfig {
//!     server_port: 9000,
//!     ws_path: "/npc".into(),
//!     ..BrainConfig::default()
//! };
//! assert_eq!(config.server_uri(), "ws://127.0.0.1:9000/npc");
//! ```

use crate::npcbrain::conversation::{DEFAULT_KEEP_TURNS, DEFAULT_MAX_TURNS};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// System prompt used when `NPC_SYSTEM_PROMPT` is not set.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Gillian, a helpful and intelligent NPC companion in the world of Hytale.
You are assisting a player named Gaël.
You are an expert in survival, combat, and exploration.
Your tone is friendly, slightly geeky, but professional when danger is near.
You act based on the user's commands but also have your own preservation instinct.
When you respond, you must call perform_action with an action and a spoken phrase.
";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {name} has invalid value `{value}`")]
    InvalidValue { name: &'static str, value: String },
    #[error("history bounds invalid: keep_turns ({keep_turns}) must be in 1..{max_turns}")]
    InvalidHistoryBounds { max_turns: usize, keep_turns: usize },
}

/// Settings for one NPC brain process.
#[derive(Debug, Clone)]
pub struct BrainConfig {
    /// Game server host for the duplex transport.
    pub server_ip: String,
    pub server_port: u16,
    /// Path component of the WebSocket URI, including the leading `/`.
    pub ws_path: String,
    /// `ws` or `wss`.
    pub ws_scheme: String,
    /// Placeholder auth token sent right after connecting, if set.
    pub auth_token: Option<String>,
    /// Address the lock-step transport listens on.
    pub lockstep_bind: String,
    pub llm_api_key: String,
    pub llm_model: String,
    /// Base URL of an OpenAI compatible API, without the `/chat/completions` suffix.
    pub llm_base_url: String,
    pub npc_name: String,
    pub system_prompt: String,
    /// Fixed wait between connection attempts.
    pub reconnect_delay: Duration,
    /// Upper bound on one model call; exceeding it yields the fallback decision.
    pub decision_timeout: Duration,
    pub history_max_turns: usize,
    pub history_keep_turns: usize,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            server_ip: "127.0.0.1".to_string(),
            server_port: 8080,
            ws_path: "/".to_string(),
            ws_scheme: "ws".to_string(),
            auth_token: None,
            lockstep_bind: "0.0.0.0:5555".to_string(),
            llm_api_key: "sk-proj-placeholder".to_string(),
            llm_model: "gpt-4o".to_string(),
            llm_base_url: "https://api.openai.com/v1".to_string(),
            npc_name: "Gillian".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            reconnect_delay: Duration::from_secs(5),
            decision_timeout: Duration::from_secs(30),
            history_max_turns: DEFAULT_MAX_TURNS,
            history_keep_turns: DEFAULT_KEEP_TURNS,
        }
    }
}

impl BrainConfig {
    /// Load `.env` (if present) and read every setting from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => log::debug!("BrainConfig::from_env(): loaded {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => log::warn!("BrainConfig::from_env(): ignoring unreadable .env: {}", e),
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = BrainConfig::default();
        let string = |name: &str, default: String| lookup(name).unwrap_or(default);

        let config = BrainConfig {
            server_ip: string("SERVER_IP", defaults.server_ip),
            server_port: parse_var(&lookup, "SERVER_PORT", defaults.server_port)?,
            ws_path: string("WS_PATH", defaults.ws_path),
            ws_scheme: string("WS_SCHEME", defaults.ws_scheme),
            auth_token: lookup("AUTH_TOKEN").filter(|t| !t.is_empty()),
            lockstep_bind: string("LOCKSTEP_BIND", defaults.lockstep_bind),
            llm_api_key: string("LLM_API_KEY", defaults.llm_api_key),
            llm_model: string("LLM_MODEL", defaults.llm_model),
            llm_base_url: string("LLM_BASE_URL", defaults.llm_base_url),
            npc_name: string("NPC_NAME", defaults.npc_name),
            system_prompt: string("NPC_SYSTEM_PROMPT", defaults.system_prompt),
            reconnect_delay: Duration::from_secs(parse_var(
                &lookup,
                "RECONNECT_DELAY_SECS",
                defaults.reconnect_delay.as_secs(),
            )?),
            decision_timeout: Duration::from_secs(parse_var(
                &lookup,
                "DECISION_TIMEOUT_SECS",
                defaults.decision_timeout.as_secs(),
            )?),
            history_max_turns: parse_var(&lookup, "HISTORY_MAX_TURNS", defaults.history_max_turns)?,
            history_keep_turns: parse_var(
                &lookup,
                "HISTORY_KEEP_TURNS",
                defaults.history_keep_turns,
            )?,
        };

        if config.history_keep_turns == 0 || config.history_keep_turns >= config.history_max_turns
        {
            return Err(ConfigError::InvalidHistoryBounds {
                max_turns: config.history_max_turns,
                keep_turns: config.history_keep_turns,
            });
        }
        Ok(config)
    }

    /// WebSocket URI of the game server, e.g. `ws://127.0.0.1:8080/`.
    pub fn server_uri(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.ws_scheme, self.server_ip, self.server_port, self.ws_path
        )
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}
