//! Transport bridges between the game server and a [`DecisionEngine`](crate::DecisionEngine).
//!
//! Two independent transports consume the same engine interface:
//!
//! - [`duplex::DuplexBridge`]: a persistent two-way connection (WebSocket in production via
//!   [`websocket::WebSocketConnector`]) carrying JSON events, reconnecting with a fixed
//!   delay whenever the connection fails.
//! - [`lockstep::LockstepBridge`]: a request/reply responder (TCP lines in production via
//!   [`tcp::TcpReplySocket`]) that answers every pipe-delimited request with exactly one reply.
//!
//! Both own their engine by value and handle one event at a time, so the conversation log
//! never sees overlapping decisions. Both stop through a [`StopHandle`].

pub mod duplex;
pub mod lockstep;
pub mod tcp;
pub mod websocket;

use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable trigger that ends a bridge loop.
///
/// Stopping interrupts connection attempts, reconnect waits and reads. A decision that is
/// already running is allowed to finish and its answer is still sent.
#[derive(Clone, Debug)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Receiving side of a [`StopHandle`], owned by the bridge loop.
#[derive(Debug)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once stop has been requested.
    pub async fn stopped(&mut self) {
        if self.rx.wait_for(|stopped| *stopped).await.is_err() {
            // Every handle is gone, nobody can ask us to stop any more.
            std::future::pending::<()>().await;
        }
    }
}

/// A connected stop handle / signal pair.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx: Arc::new(tx) }, StopSignal { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stop_wakes_waiter() {
        let (handle, mut signal) = stop_channel();
        assert!(!signal.is_stopped());

        let waiter = tokio::spawn(async move {
            signal.stopped().await;
            signal.is_stopped()
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.clone().stop();

        assert!(waiter.await.unwrap());
        assert!(handle.is_stopped());
    }

    #[tokio::test]
    async fn test_stop_before_wait_resolves_immediately() {
        let (handle, mut signal) = stop_channel();
        handle.stop();
        tokio::time::timeout(Duration::from_secs(1), signal.stopped())
            .await
            .unwrap();
    }
}
