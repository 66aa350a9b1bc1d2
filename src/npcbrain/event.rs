//! Bridge event system.
//!
//! Provides a callback-based observability layer for the transport bridges. Implement
//! [`EventHandler`] to be notified about connection attempts, handled chats, sent commands
//! and lock-step replies. The single method has a default no-op implementation, so handlers
//! only match on what they care about.
//!
//! # Example
//!
//! ```rust,no_run
//! use npcbrain::event::{BridgeEvent, EventHandler};
//! use async_trait::async_trait;
//!
//! struct ConnectionLogger;
//!
//! #[async_trait]
//! impl EventHandler for ConnectionLogger {
//!     async fn on_bridge_event(&self, event: &BridgeEvent) {
//!         if let BridgeEvent::ConnectAttempt { attempt, uri } = event {
//!             println!("attempt {} to {}", attempt, uri);
//!         }
//!     }
//! }
//! ```

use crate::npcbrain::action::ActionDecision;
use async_trait::async_trait;

/// Events emitted by the duplex and lock-step bridges.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    // ── Duplex connection lifecycle ──────────────────────────────────────

    /// Fired before every connection attempt. `attempt` counts from 1 and never resets.
    ConnectAttempt { attempt: u64, uri: String },
    /// The connection is open and the read loop is about to start.
    Connected { uri: String },
    /// The connection was lost or could not be opened. A reconnect follows unless stopped.
    Disconnected { reason: String },

    // ── Event handling ───────────────────────────────────────────────────

    /// A chat from the NPC itself was dropped without consulting the brain.
    SelfMessageIgnored { sender: String },
    /// A chat was turned into a decision.
    ChatHandled {
        sender: String,
        message: String,
        decision: ActionDecision,
    },
    /// An `npc_command` was written to the connection.
    CommandSent { payload: String },
    /// An inbound payload could not be used and was dropped.
    PayloadDropped { reason: String },

    // ── Lock-step ────────────────────────────────────────────────────────

    /// A request with fewer than two fields was answered with the heartbeat reply.
    HeartbeatAnswered,
    /// A reply (decision, heartbeat or generic error) went out for the pending request.
    ReplySent { reply: String },
    /// Neither the reply nor the generic error reply could be sent.
    ReplyFailed { reason: String },

    /// The bridge loop ended after a stop request.
    Stopped,
}

/// Receives [`BridgeEvent`]s. Shared as `Arc<dyn EventHandler>`.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_bridge_event(&self, _event: &BridgeEvent) {}
}
