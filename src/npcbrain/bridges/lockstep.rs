//! Lock-step transport bridge.
//!
//! A strict request/reply responder: receive one request, send exactly one reply, repeat.
//! It never speaks first and never leaves a request unanswered, because a missing reply
//! would leave the peer waiting forever.
//!
//! # Wire format
//!
//! - Request: `sender|message` or `sender|message|extra` (extra is ignored).
//! - Reply: `action_type|target|speech`, with an empty target when there is none.
//! - Anything with fewer than two fields is a heartbeat and gets [`HEARTBEAT_REPLY`].
//!
//! If the reply cannot be sent, one attempt is made to send [`ERROR_REPLY`] instead. If that
//! fails too the bridge logs it and goes back to waiting; the peer may then be out of step.

use crate::npcbrain::action::ActionDecision;
use crate::npcbrain::bridges::{stop_channel, StopHandle, StopSignal};
use crate::npcbrain::brain::DecisionEngine;
use crate::npcbrain::event::{BridgeEvent, EventHandler};
use crate::npcbrain::game_context::GameContext;
use async_trait::async_trait;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Reply to a heartbeat: the normal three-field shape with an idle action and no speech.
pub const HEARTBEAT_REPLY: &str = "IDLE||";

/// Reply used when the real answer could not be produced or sent.
pub const ERROR_REPLY: &str = "IDLE||Internal error";

const FIELD_DELIMITER: char = '|';

/// Pause after a failed receive so a broken socket cannot spin the loop.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum LockstepError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("out of turn: {0}")]
    OutOfTurn(&'static str),
    #[error("no peer connected")]
    NoPeer,
}

/// A request/reply socket that enforces strict turn-taking.
///
/// Implementations must reject `send_reply` when no request is pending and `recv_request`
/// while a request is still waiting for its reply.
#[async_trait]
pub trait ReplySocket: Send + Sync {
    /// Wait for the next request payload.
    async fn recv_request(&mut self) -> Result<String, LockstepError>;

    /// Answer the pending request.
    async fn send_reply(&mut self, reply: &str) -> Result<(), LockstepError>;
}

/// A parsed lock-step request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockstepRequest {
    Chat { sender: String, message: String },
    Heartbeat,
}

/// Split a raw request into its fields. Fewer than two fields is a heartbeat.
pub fn parse_request(raw: &str) -> LockstepRequest {
    let raw = raw.trim_end_matches(['\r', '\n']);
    let mut fields = raw.splitn(3, FIELD_DELIMITER);
    match (fields.next(), fields.next()) {
        (Some(sender), Some(message)) => LockstepRequest::Chat {
            sender: sender.trim().to_string(),
            message: message.trim().to_string(),
        },
        _ => LockstepRequest::Heartbeat,
    }
}

fn sanitize_field(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            FIELD_DELIMITER => '/',
            '\r' | '\n' => ' ',
            other => other,
        })
        .collect()
}

/// Render a decision as `action_type|target|speech`.
pub fn encode_reply(decision: &ActionDecision) -> String {
    format!(
        "{}{}{}{}{}",
        decision.action_type,
        FIELD_DELIMITER,
        sanitize_field(decision.target.as_deref().unwrap_or("")),
        FIELD_DELIMITER,
        sanitize_field(&decision.speech)
    )
}

/// Request/reply bridge for one NPC.
pub struct LockstepBridge<S: ReplySocket, D: DecisionEngine> {
    socket: S,
    engine: D,
    stop_handle: StopHandle,
    stop: StopSignal,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl<S: ReplySocket, D: DecisionEngine> LockstepBridge<S, D> {
    pub fn new(socket: S, engine: D) -> Self {
        let (stop_handle, stop) = stop_channel();
        LockstepBridge {
            socket,
            engine,
            stop_handle,
            stop,
            event_handler: None,
        }
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    pub fn engine(&self) -> &D {
        &self.engine
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }

    async fn emit(&self, event: BridgeEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_bridge_event(&event).await;
        }
    }

    /// Compute the reply for one raw request. Runs the decision to completion.
    pub async fn answer(&mut self, raw: &str) -> String {
        match parse_request(raw) {
            LockstepRequest::Heartbeat => {
                log::debug!("Heartbeat received: {:?}", raw);
                self.emit(BridgeEvent::HeartbeatAnswered).await;
                HEARTBEAT_REPLY.to_string()
            }
            LockstepRequest::Chat { sender, message } => {
                log::info!("[CHAT] {}: {}", sender, message);
                let decision = self
                    .engine
                    .think(&sender, &message, &GameContext::default())
                    .await;
                let reply = encode_reply(&decision);
                self.emit(BridgeEvent::ChatHandled {
                    sender,
                    message,
                    decision,
                })
                .await;
                reply
            }
        }
    }

    /// Serve requests until stopped.
    pub async fn run(&mut self) {
        log::info!("Lock-step bridge waiting for requests");

        loop {
            let received = tokio::select! {
                biased;
                _ = self.stop.stopped() => break,
                received = self.socket.recv_request() => received,
            };

            let request = match received {
                Ok(request) => request,
                Err(e) => {
                    log::error!("Failed to receive request: {}", e);
                    let stopped = tokio::select! {
                        biased;
                        _ = self.stop.stopped() => true,
                        _ = tokio::time::sleep(RECV_ERROR_BACKOFF) => false,
                    };
                    if stopped {
                        break;
                    }
                    continue;
                }
            };

            let reply = match AssertUnwindSafe(self.answer(&request)).catch_unwind().await {
                Ok(reply) => reply,
                Err(_) => {
                    log::error!("Composing the reply to {:?} panicked", request);
                    ERROR_REPLY.to_string()
                }
            };

            self.reply(reply).await;
        }

        log::info!("Lock-step bridge stopped");
        self.emit(BridgeEvent::Stopped).await;
    }

    async fn reply(&mut self, reply: String) {
        match self.socket.send_reply(&reply).await {
            Ok(()) => {
                log::info!("[ACTION] Sent: {}", reply);
                self.emit(BridgeEvent::ReplySent { reply }).await;
            }
            Err(e) => {
                log::error!("Failed to send reply {:?}: {}", reply, e);
                match self.socket.send_reply(ERROR_REPLY).await {
                    Ok(()) => {
                        self.emit(BridgeEvent::ReplySent {
                            reply: ERROR_REPLY.to_string(),
                        })
                        .await;
                    }
                    Err(e) => {
                        log::error!(
                            "Failed to send error reply: {}. The peer may now be out of step.",
                            e
                        );
                        self.emit(BridgeEvent::ReplyFailed {
                            reason: e.to_string(),
                        })
                        .await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npcbrain::action::ActionType;

    #[test]
    fn test_parse_two_and_three_fields() {
        assert_eq!(
            parse_request("Gael|Hello there"),
            LockstepRequest::Chat {
                sender: "Gael".into(),
                message: "Hello there".into()
            }
        );
        assert_eq!(
            parse_request("Gael|Hello|extra|more\n"),
            LockstepRequest::Chat {
                sender: "Gael".into(),
                message: "Hello".into()
            }
        );
        assert_eq!(
            parse_request(" Gael |  hi there \r\n"),
            LockstepRequest::Chat {
                sender: "Gael".into(),
                message: "hi there".into()
            }
        );
    }

    #[test]
    fn test_parse_heartbeat() {
        assert_eq!(parse_request("ping"), LockstepRequest::Heartbeat);
        assert_eq!(parse_request(""), LockstepRequest::Heartbeat);
    }

    #[test]
    fn test_encode_reply() {
        let decision = ActionDecision {
            action_type: ActionType::Attack,
            target: Some("Zombie".into()),
            speech: "On it!".into(),
        };
        assert_eq!(encode_reply(&decision), "ATTACK|Zombie|On it!");

        let decision = ActionDecision {
            action_type: ActionType::Idle,
            target: None,
            speech: "a|b\nc".into(),
        };
        assert_eq!(encode_reply(&decision), "IDLE||a/b c");
    }
}
