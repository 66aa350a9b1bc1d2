//! Duplex transport bridge.
//!
//! Keeps one persistent connection to the game server, reads JSON events one at a time,
//! feeds `chat` events to the decision engine and writes the resulting `npc_command` back
//! on the same connection.
//!
//! # Connection lifecycle
//!
//! ```text
//! Disconnected ──► Connecting ──► Connected
//!      ▲               │              │
//!      └── wait ◄──────┴── error ◄────┘
//!
//! any state ── stop() ──► Stopped
//! ```
//!
//! A refused connection and a connection that dies later are treated the same way: log,
//! wait the fixed reconnect delay, try again, forever, until stopped.
//!
//! # Wire format
//!
//! Inbound: `{"type":"chat","sender":..,"message":..,"context":{..}}` or `{"type":"tick"}`.
//! Outbound: `{"type":"npc_command","command":"ATTACK","target":"Zombie"|null,"chat":".."}`.

use crate::npcbrain::action::ActionType;
use crate::npcbrain::bridges::{stop_channel, StopHandle, StopSignal};
use crate::npcbrain::brain::DecisionEngine;
use crate::npcbrain::config::BrainConfig;
use crate::npcbrain::event::{BridgeEvent, EventHandler};
use crate::npcbrain::game_context::GameContext;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Connection-level faults. All of them lead to a reconnect, none is fatal.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("failed to encode outbound event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("connection closed by peer")]
    Closed,
    #[error("{0}")]
    Other(String),
}

/// One open, bidirectional text connection to the game server.
#[async_trait]
pub trait DuplexConnection: Send {
    /// Next text message, or `None` once the peer closed the connection.
    async fn recv_text(&mut self) -> Result<Option<String>, BridgeError>;

    async fn send_text(&mut self, text: String) -> Result<(), BridgeError>;

    async fn close(&mut self) -> Result<(), BridgeError> {
        Ok(())
    }
}

/// Opens [`DuplexConnection`]s to a fixed endpoint.
#[async_trait]
pub trait DuplexConnector: Send + Sync {
    type Connection: DuplexConnection;

    async fn connect(&self) -> Result<Self::Connection, BridgeError>;

    /// Human readable endpoint, used in logs and events.
    fn endpoint(&self) -> String;
}

/// Where the bridge is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Disconnected,
    Connecting,
    Connected,
    Stopped,
}

fn unknown_sender() -> String {
    "Unknown".to_string()
}

/// `null` reads as absent; numbers and other scalars are kept as their JSON text.
fn text_or<'de, D>(deserializer: D, default: fn() -> String) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => default(),
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    })
}

fn lenient_sender<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    text_or(deserializer, unknown_sender)
}

fn lenient_message<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    text_or(deserializer, String::new)
}

/// Events the game server sends.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    Chat {
        #[serde(default = "unknown_sender", deserialize_with = "lenient_sender")]
        sender: String,
        #[serde(default, deserialize_with = "lenient_message")]
        message: String,
        #[serde(default, deserialize_with = "GameContext::deserialize_optional")]
        context: Option<GameContext>,
    },
    /// Periodic update. Accepted, currently produces no action.
    Tick,
    #[serde(other)]
    Unknown,
}

/// Events the bridge sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    NpcCommand {
        command: ActionType,
        target: Option<String>,
        chat: String,
    },
    /// Placeholder handshake, sent once per connection when a token is configured.
    Auth { token: String },
}

/// Persistent-connection bridge for one NPC.
pub struct DuplexBridge<C: DuplexConnector, D: DecisionEngine> {
    connector: C,
    engine: D,
    npc_name: String,
    reconnect_delay: Duration,
    auth_token: Option<String>,
    state: BridgeState,
    connection_attempts: u64,
    stop_handle: StopHandle,
    stop: StopSignal,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl<C: DuplexConnector, D: DecisionEngine> DuplexBridge<C, D> {
    /// Create a bridge with the default 5 second reconnect delay and no auth token.
    pub fn new(connector: C, engine: D, npc_name: impl Into<String>) -> Self {
        let (stop_handle, stop) = stop_channel();
        DuplexBridge {
            connector,
            engine,
            npc_name: npc_name.into(),
            reconnect_delay: Duration::from_secs(5),
            auth_token: None,
            state: BridgeState::Disconnected,
            connection_attempts: 0,
            stop_handle,
            stop,
            event_handler: None,
        }
    }

    /// Create a bridge with NPC name, reconnect delay and auth token taken from `config`.
    pub fn from_config(connector: C, engine: D, config: &BrainConfig) -> Self {
        let mut bridge = Self::new(connector, engine, config.npc_name.clone())
            .with_reconnect_delay(config.reconnect_delay);
        bridge.auth_token = config.auth_token.clone();
        bridge
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Handle that stops [`run`](Self::run) from any task.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Connection attempts made so far, successful or not.
    pub fn connection_attempts(&self) -> u64 {
        self.connection_attempts
    }

    pub fn engine(&self) -> &D {
        &self.engine
    }

    async fn emit(&self, event: BridgeEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_bridge_event(&event).await;
        }
    }

    /// Connect, serve and reconnect until stopped.
    pub async fn run(&mut self) {
        let endpoint = self.connector.endpoint();
        log::info!("Starting NPC brain bridge for {}...", self.npc_name);

        while !self.stop.is_stopped() {
            self.state = BridgeState::Connecting;
            self.connection_attempts += 1;
            log::info!("Connecting to {}...", endpoint);
            self.emit(BridgeEvent::ConnectAttempt {
                attempt: self.connection_attempts,
                uri: endpoint.clone(),
            })
            .await;

            let connected = tokio::select! {
                biased;
                _ = self.stop.stopped() => break,
                result = self.connector.connect() => result,
            };

            let reason = match connected {
                Ok(mut connection) => {
                    self.state = BridgeState::Connected;
                    log::info!("Connected to game server at {}", endpoint);
                    self.emit(BridgeEvent::Connected {
                        uri: endpoint.clone(),
                    })
                    .await;

                    let outcome = self.serve(&mut connection).await;
                    if let Err(e) = connection.close().await {
                        log::debug!("DuplexBridge::run(): close failed: {}", e);
                    }
                    match outcome {
                        Ok(()) => break,
                        Err(e) => {
                            log::error!(
                                "Connection lost: {}. Retrying in {}s...",
                                e,
                                self.reconnect_delay.as_secs_f32()
                            );
                            e.to_string()
                        }
                    }
                }
                Err(e) => {
                    log::error!(
                        "Connection to {} failed: {}. Is the game server running? Retrying in {}s...",
                        endpoint,
                        e,
                        self.reconnect_delay.as_secs_f32()
                    );
                    e.to_string()
                }
            };

            self.state = BridgeState::Disconnected;
            self.emit(BridgeEvent::Disconnected { reason }).await;

            tokio::select! {
                biased;
                _ = self.stop.stopped() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        self.state = BridgeState::Stopped;
        log::info!("NPC brain bridge stopped");
        self.emit(BridgeEvent::Stopped).await;
    }

    /// Read loop for one connection. `Ok(())` means a stop was requested.
    async fn serve(&mut self, connection: &mut C::Connection) -> Result<(), BridgeError> {
        if let Some(token) = self.auth_token.clone() {
            let auth = serde_json::to_string(&OutboundEvent::Auth { token })?;
            connection.send_text(auth).await?;
        }

        loop {
            let received = tokio::select! {
                biased;
                _ = self.stop.stopped() => return Ok(()),
                received = connection.recv_text() => received?,
            };

            match received {
                Some(text) => self.handle_message(connection, &text).await?,
                None => return Err(BridgeError::Closed),
            }
        }
    }

    /// Handle one inbound payload to completion.
    ///
    /// Malformed payloads are logged and dropped; only a failed send is returned as an error.
    pub async fn handle_message(
        &mut self,
        connection: &mut C::Connection,
        text: &str,
    ) -> Result<(), BridgeError> {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                log::error!("Received invalid JSON: {}", e);
                self.emit(BridgeEvent::PayloadDropped {
                    reason: format!("invalid JSON: {}", e),
                })
                .await;
                return Ok(());
            }
        };

        let event: InboundEvent = match serde_json::from_value(value) {
            Ok(event) => event,
            Err(e) => {
                log::error!("Received malformed event: {}", e);
                self.emit(BridgeEvent::PayloadDropped {
                    reason: format!("malformed event: {}", e),
                })
                .await;
                return Ok(());
            }
        };

        match event {
            InboundEvent::Chat {
                sender,
                message,
                context,
            } => {
                if sender == self.npc_name {
                    log::debug!("Ignoring chat from self ({})", sender);
                    self.emit(BridgeEvent::SelfMessageIgnored { sender }).await;
                    return Ok(());
                }

                log::info!("[CHAT] {}: {}", sender, message);
                let context = context.unwrap_or_default();
                let decision = self.engine.think(&sender, &message, &context).await;

                let command = OutboundEvent::NpcCommand {
                    command: decision.action_type,
                    target: decision.target.clone(),
                    chat: decision.speech.clone(),
                };
                let payload = serde_json::to_string(&command)?;
                connection.send_text(payload.clone()).await?;
                log::info!("[ACTION] Sent: {}", payload);

                self.emit(BridgeEvent::ChatHandled {
                    sender,
                    message,
                    decision,
                })
                .await;
                self.emit(BridgeEvent::CommandSent { payload }).await;
            }
            InboundEvent::Tick => {}
            InboundEvent::Unknown => {
                log::debug!("Dropping event with unknown type: {}", text);
                self.emit(BridgeEvent::PayloadDropped {
                    reason: "unknown event type".to_string(),
                })
                .await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_chat_with_defaults() {
        let event: InboundEvent = serde_json::from_str(r#"{"type":"chat"}"#).unwrap();
        assert_eq!(
            event,
            InboundEvent::Chat {
                sender: "Unknown".into(),
                message: String::new(),
                context: None,
            }
        );
    }

    #[test]
    fn test_parse_chat_with_context() {
        let event: InboundEvent = serde_json::from_str(
            r#"{"type":"chat","sender":"Gael","message":"hi","context":{"health":80,"pos":"10,5,10"}}"#,
        )
        .unwrap();
        match event {
            InboundEvent::Chat { context, .. } => {
                let context = context.unwrap();
                assert_eq!(context.health, 80.0);
                assert_eq!(context.pos, "10,5,10");
                assert_eq!(context.time, "Day");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_parse_chat_with_null_fields() {
        let event: InboundEvent = serde_json::from_str(
            r#"{"type":"chat","sender":null,"message":42,"context":{"health":null,"pos":"1,2,3"}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            InboundEvent::Chat {
                sender: "Unknown".into(),
                message: "42".into(),
                context: Some(GameContext {
                    pos: "1,2,3".into(),
                    ..GameContext::default()
                }),
            }
        );
    }

    #[test]
    fn test_parse_tick_and_unknown() {
        let tick: InboundEvent = serde_json::from_str(r#"{"type":"tick","t":12}"#).unwrap();
        assert_eq!(tick, InboundEvent::Tick);
        let other: InboundEvent = serde_json::from_str(r#"{"type":"weather"}"#).unwrap();
        assert_eq!(other, InboundEvent::Unknown);
        assert!(serde_json::from_str::<InboundEvent>(r#"{"sender":"x"}"#).is_err());
    }

    #[test]
    fn test_npc_command_serialization() {
        let command = OutboundEvent::NpcCommand {
            command: ActionType::Goto,
            target: None,
            chat: "Heading out".into(),
        };
        assert_eq!(
            serde_json::to_value(&command).unwrap(),
            json!({"type": "npc_command", "command": "GOTO", "target": null, "chat": "Heading out"})
        );
    }
}
