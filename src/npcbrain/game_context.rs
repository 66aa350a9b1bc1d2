//! Telemetry snapshot the game server attaches to a chat event.
//!
//! A [`GameContext`] is never stored; it is rendered into the user turn by
//! [`encode_request`](crate::npcbrain::action::encode_request) and dropped.
//!
//! Deserialization never fails on a field: a missing, `null` or mistyped value falls back to
//! its default, so one bad field cannot cost the player an answer.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

fn default_health() -> f64 {
    100.0
}

fn default_pos() -> String {
    "0,0,0".to_string()
}

fn default_time() -> String {
    "Day".to_string()
}

fn lenient_health<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .unwrap_or_else(default_health))
}

fn lenient_pos<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(pos) => pos,
        // [x, y, z]
        Value::Array(coords) if !coords.is_empty() && coords.iter().all(Value::is_number) => coords
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(","),
        _ => default_pos(),
    })
}

fn lenient_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(time) => time,
        _ => default_time(),
    })
}

fn lenient_entities<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<Value>>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(entities) => Some(entities),
        _ => None,
    })
}

/// Game state around the NPC at the time an event was emitted.
///
/// Every field has a default so a partial (or missing) `context` object still produces a
/// complete snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameContext {
    /// Health percentage, 0 to 100.
    #[serde(default = "default_health", deserialize_with = "lenient_health")]
    pub health: f64,
    /// Free-form position, usually `"x,y,z"`.
    #[serde(default = "default_pos", deserialize_with = "lenient_pos")]
    pub pos: String,
    /// Time-of-day label.
    #[serde(default = "default_time", deserialize_with = "lenient_time")]
    pub time: String,
    /// Entities the server reports near the NPC. Usually names, but any JSON value is kept.
    #[serde(default, deserialize_with = "lenient_entities")]
    pub nearby_entities: Option<Vec<Value>>,
}

impl Default for GameContext {
    fn default() -> Self {
        Self {
            health: default_health(),
            pos: default_pos(),
            time: default_time(),
            nearby_entities: None,
        }
    }
}

impl GameContext {
    /// Health clamped to 0..=100 and printed without a trailing `.0` for whole numbers.
    pub fn health_label(&self) -> String {
        let health = if self.health.is_finite() {
            self.health.clamp(0.0, 100.0)
        } else {
            default_health()
        };
        if health.fract() == 0.0 {
            format!("{}", health as i64)
        } else {
            format!("{:.1}", health)
        }
    }

    /// Nearby entities as display strings; empty when none were reported.
    pub fn nearby_labels(&self) -> Vec<String> {
        self.nearby_entities
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|entity| match entity {
                Value::String(name) => name.clone(),
                other => other.to_string(),
            })
            .collect()
    }
}

impl GameContext {
    /// Reads an optional `context` field. Anything that is not a JSON object counts as absent.
    pub fn deserialize_optional<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<GameContext>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            value @ Value::Object(_) => GameContext::deserialize(value).ok(),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_context_fills_defaults() {
        let ctx: GameContext = serde_json::from_str(r#"{"health": 80}"#).unwrap();
        assert_eq!(ctx.health, 80.0);
        assert_eq!(ctx.pos, "0,0,0");
        assert_eq!(ctx.time, "Day");
        assert!(ctx.nearby_entities.is_none());
    }

    #[test]
    fn test_health_label() {
        let mut ctx = GameContext::default();
        assert_eq!(ctx.health_label(), "100");
        ctx.health = 42.5;
        assert_eq!(ctx.health_label(), "42.5");
        ctx.health = 180.0;
        assert_eq!(ctx.health_label(), "100");
        ctx.health = -3.0;
        assert_eq!(ctx.health_label(), "0");
    }

    #[test]
    fn test_nearby_labels_accept_objects() {
        let ctx: GameContext = serde_json::from_str(
            r#"{"nearby_entities": ["Zombie", {"name": "Kweebec"}]}"#,
        )
        .unwrap();
        assert_eq!(
            ctx.nearby_labels(),
            vec!["Zombie".to_string(), r#"{"name":"Kweebec"}"#.to_string()]
        );
    }

    #[test]
    fn test_null_and_mistyped_fields_fall_back() {
        let ctx: GameContext = serde_json::from_str(
            r#"{"health": null, "pos": 12, "time": false, "nearby_entities": "Zombie"}"#,
        )
        .unwrap();
        assert_eq!(ctx, GameContext::default());

        let ctx: GameContext =
            serde_json::from_str(r#"{"health": "75", "pos": [10, 64, -3]}"#).unwrap();
        assert_eq!(ctx.health, 75.0);
        assert_eq!(ctx.pos, "10,64,-3");
    }

    #[test]
    fn test_optional_context_ignores_non_objects() {
        #[derive(Deserialize)]
        struct Event {
            #[serde(default, deserialize_with = "GameContext::deserialize_optional")]
            context: Option<GameContext>,
        }

        let event: Event = serde_json::from_str(r#"{"context": "broken"}"#).unwrap();
        assert!(event.context.is_none());
        let event: Event = serde_json::from_str(r#"{"context": null}"#).unwrap();
        assert!(event.context.is_none());
        let event: Event = serde_json::from_str(r#"{}"#).unwrap();
        assert!(event.context.is_none());
        let event: Event = serde_json::from_str(r#"{"context": {"health": null}}"#).unwrap();
        assert_eq!(event.context, Some(GameContext::default()));
    }
}
