//! The action contract between the NPC brain and the game server.
//!
//! This module owns the action vocabulary ([`ActionType`]), the `perform_action` tool the
//! model is forced to call, the rendering of an inbound chat into a prompt line, and the
//! validation of whatever the model sends back.
//!
//! ```rust
//! use npcbrain::action::{encode_request, validate, ActionType};
//! use npcbrain::GameContext;
//!
//! let prompt = encode_request("Gael", "follow me", &GameContext::default());
//! assert!(prompt.starts_with("[Gael]: follow me"));
//!
//! let decision = validate(&serde_json::json!({
//!     "action_type": "FOLLOW",
//!     "target": "Gael",
//!     "speech": "Right behind you."
//! }))
//! .unwrap();
//! assert_eq!(decision.action_type, ActionType::Follow);
//! ```

use crate::npcbrain::client_wrapper::ToolDefinition;
use crate::npcbrain::game_context::GameContext;
use crate::npcbrain::tool_schema::{Argument, FunctionSchema};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name of the single tool the model must call.
pub const PERFORM_ACTION: &str = "perform_action";

/// Speech used whenever no valid decision could be produced.
pub const FALLBACK_SPEECH: &str = "I... I'm having a headache. (System Error)";

/// Physical actions the game server knows how to execute.
///
/// The vocabulary only ever grows. Consumers that meet a value they do not know read it as
/// [`ActionType::Idle`] (see [`ActionType::lenient`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Idle,
    Follow,
    Attack,
    Goto,
    Interact,
    Mine,
    Find,
}

impl ActionType {
    /// Every action, in vocabulary order.
    pub const ALL: [ActionType; 7] = [
        ActionType::Idle,
        ActionType::Follow,
        ActionType::Attack,
        ActionType::Goto,
        ActionType::Interact,
        ActionType::Mine,
        ActionType::Find,
    ];

    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Idle => "IDLE",
            ActionType::Follow => "FOLLOW",
            ActionType::Attack => "ATTACK",
            ActionType::Goto => "GOTO",
            ActionType::Interact => "INTERACT",
            ActionType::Mine => "MINE",
            ActionType::Find => "FIND",
        }
    }

    /// Consuming-side reading: anything outside the vocabulary becomes `IDLE`.
    pub fn lenient(value: &str) -> Self {
        value.parse().unwrap_or(ActionType::Idle)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        ActionType::ALL
            .into_iter()
            .find(|action| action.as_str() == normalized)
            .ok_or_else(|| CodecError::UnknownAction(s.to_string()))
    }
}

/// Normalized output of one decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDecision {
    pub action_type: ActionType,
    /// Entity name or `"x,y,z"` coordinates.
    pub target: Option<String>,
    pub speech: String,
}

impl ActionDecision {
    /// The decision sent back whenever the model could not produce a valid one.
    pub fn fallback() -> Self {
        Self {
            action_type: ActionType::Idle,
            target: None,
            speech: FALLBACK_SPEECH.to_string(),
        }
    }
}

/// Reasons a model answer is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("tool arguments are not valid JSON: {0}")]
    InvalidJson(String),
    #[error("tool arguments must be a JSON object")]
    NotAnObject,
    #[error("missing or non-string field `{0}`")]
    MissingField(&'static str),
    #[error("unknown action type `{0}`")]
    UnknownAction(String),
}

/// Render one chat event as a single prompt line.
///
/// Format: `[user]: message [System Context]: Health: 80% | Location: x,y,z | Time: Day`,
/// with ` | Nearby: a, b` appended when the server reported nearby entities.
pub fn encode_request(user: &str, message: &str, context: &GameContext) -> String {
    let message = message.replace(['\r', '\n'], " ");
    let mut line = format!(
        "[{}]: {} [System Context]: Health: {}% | Location: {} | Time: {}",
        user,
        message,
        context.health_label(),
        context.pos,
        context.time
    );

    let nearby = context.nearby_labels();
    if !nearby.is_empty() {
        line.push_str(" | Nearby: ");
        line.push_str(&nearby.join(", "));
    }
    line
}

/// Validate the arguments of a `perform_action` call.
pub fn validate(raw: &serde_json::Value) -> Result<ActionDecision, CodecError> {
    let object = raw.as_object().ok_or(CodecError::NotAnObject)?;

    let action_type = object
        .get("action_type")
        .and_then(|v| v.as_str())
        .ok_or(CodecError::MissingField("action_type"))?
        .parse::<ActionType>()?;

    let speech = object
        .get("speech")
        .and_then(|v| v.as_str())
        .ok_or(CodecError::MissingField("speech"))?
        .to_string();

    let target = object
        .get("target")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    Ok(ActionDecision {
        action_type,
        target,
        speech,
    })
}

/// Parse the raw JSON argument string of a tool call, then [`validate`] it.
pub fn validate_arguments(arguments: &str) -> Result<ActionDecision, CodecError> {
    let raw: serde_json::Value =
        serde_json::from_str(arguments).map_err(|e| CodecError::InvalidJson(e.to_string()))?;
    validate(&raw)
}

/// The `perform_action` tool offered to (and forced upon) the model.
pub fn perform_action_tool() -> ToolDefinition {
    FunctionSchema::new(PERFORM_ACTION, "Decide on an action and speech for the NPC")
        .with_argument(
            Argument::choice("action_type", ActionType::ALL.iter().map(|a| a.as_str()))
                .describe("The physical action to perform.")
                .mandatory(),
        )
        .with_argument(Argument::text("target").describe(
            "The target entity name or coordinates (e.g., 'Zombie', '100,64,100').",
        ))
        .with_argument(
            Argument::text("speech")
                .describe("What the NPC says in chat.")
                .mandatory(),
        )
        .to_definition()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_accepts_full_vocabulary() {
        for name in ["IDLE", "FOLLOW", "ATTACK", "GOTO", "INTERACT", "MINE", "FIND"] {
            let decision = validate(&json!({"action_type": name, "speech": "ok"})).unwrap();
            assert_eq!(decision.action_type.as_str(), name);
            assert_eq!(decision.target, None);
        }
    }

    #[test]
    fn test_validate_rejects_unknown_action() {
        let err = validate(&json!({"action_type": "DANCE", "speech": "la la"})).unwrap_err();
        assert_eq!(err, CodecError::UnknownAction("DANCE".into()));

        let err = validate(&json!({"action_type": "MOVE", "speech": "going"})).unwrap_err();
        assert!(matches!(err, CodecError::UnknownAction(_)));
    }

    #[test]
    fn test_validate_requires_speech_and_action() {
        assert_eq!(
            validate(&json!({"action_type": "IDLE"})).unwrap_err(),
            CodecError::MissingField("speech")
        );
        assert_eq!(
            validate(&json!({"speech": "hi"})).unwrap_err(),
            CodecError::MissingField("action_type")
        );
        assert_eq!(
            validate(&json!({"action_type": 3, "speech": "hi"})).unwrap_err(),
            CodecError::MissingField("action_type")
        );
        assert_eq!(validate(&json!(["IDLE"])).unwrap_err(), CodecError::NotAnObject);
    }

    #[test]
    fn test_validate_normalizes() {
        let decision = validate(&json!({
            "action_type": " attack ",
            "target": "  ",
            "speech": "Charge!"
        }))
        .unwrap();
        assert_eq!(decision.action_type, ActionType::Attack);
        assert_eq!(decision.target, None);

        let decision =
            validate(&json!({"action_type": "GOTO", "target": null, "speech": ""})).unwrap();
        assert_eq!(decision.target, None);
        assert_eq!(decision.speech, "");
    }

    #[test]
    fn test_validate_arguments_rejects_bad_json() {
        assert!(matches!(
            validate_arguments("{not json"),
            Err(CodecError::InvalidJson(_))
        ));
        let decision =
            validate_arguments(r#"{"action_type":"MINE","target":"10,64,3","speech":"Digging"}"#)
                .unwrap();
        assert_eq!(decision.target.as_deref(), Some("10,64,3"));
    }

    #[test]
    fn test_lenient_defaults_to_idle() {
        assert_eq!(ActionType::lenient("FIND"), ActionType::Find);
        assert_eq!(ActionType::lenient("TELEPORT"), ActionType::Idle);
    }

    #[test]
    fn test_encode_request_renders_context() {
        let ctx = GameContext {
            health: 80.0,
            pos: "10,5,10".into(),
            time: "Night".into(),
            nearby_entities: Some(vec![json!("Zombie"), json!("Skeleton")]),
        };
        assert_eq!(
            encode_request("Gael", "attack the zombie", &ctx),
            "[Gael]: attack the zombie [System Context]: Health: 80% | Location: 10,5,10 | Time: Night | Nearby: Zombie, Skeleton"
        );
    }

    #[test]
    fn test_encode_request_is_single_line() {
        let line = encode_request("Gael", "first\nsecond", &GameContext::default());
        assert!(!line.contains('\n'));
        assert!(line.ends_with("Health: 100% | Location: 0,0,0 | Time: Day"));
    }

    #[test]
    fn test_perform_action_schema() {
        let tool = perform_action_tool();
        assert_eq!(tool.name, PERFORM_ACTION);
        assert_eq!(
            tool.parameters["properties"]["action_type"]["enum"],
            json!(["IDLE", "FOLLOW", "ATTACK", "GOTO", "INTERACT", "MINE", "FIND"])
        );
        assert_eq!(tool.parameters["required"], json!(["action_type", "speech"]));
    }

    #[test]
    fn test_fallback_is_idle() {
        let fallback = ActionDecision::fallback();
        assert_eq!(fallback.action_type, ActionType::Idle);
        assert!(fallback.target.is_none());
        assert!(!fallback.speech.is_empty());
    }
}
