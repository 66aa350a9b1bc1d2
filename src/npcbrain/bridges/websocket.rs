//! WebSocket connector for the duplex bridge, using tokio-tungstenite.

use crate::npcbrain::bridges::duplex::{BridgeError, DuplexConnection, DuplexConnector};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Opens `ws://` or `wss://` connections to the game server.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    uri: String,
}

impl WebSocketConnector {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

#[async_trait]
impl DuplexConnector for WebSocketConnector {
    type Connection = WebSocketConnection;

    async fn connect(&self) -> Result<Self::Connection, BridgeError> {
        let (stream, _response) = connect_async(self.uri.as_str()).await?;
        Ok(WebSocketConnection { stream })
    }

    fn endpoint(&self) -> String {
        self.uri.clone()
    }
}

/// One open WebSocket to the game server.
pub struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl DuplexConnection for WebSocketConnection {
    async fn recv_text(&mut self) -> Result<Option<String>, BridgeError> {
        while let Some(frame) = self.stream.next().await {
            match frame? {
                Message::Text(text) => return Ok(Some(text)),
                Message::Close(_) => {
                    log::info!("Game server closed the connection");
                    return Ok(None);
                }
                // Pings are answered by tungstenite itself; binary frames are not part of the protocol.
                _ => {}
            }
        }
        Ok(None)
    }

    async fn send_text(&mut self, text: String) -> Result<(), BridgeError> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BridgeError> {
        self.stream.close(None).await?;
        Ok(())
    }
}
