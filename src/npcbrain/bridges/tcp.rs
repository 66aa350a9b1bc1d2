//! Line-framed TCP reply socket for the lock-step bridge.
//!
//! Requests and replies are UTF-8 lines terminated by `\n`; invalid bytes in a request are
//! decoded as U+FFFD. One peer is served at a time; when it disconnects the next connection
//! is accepted. A request whose peer vanished before the reply was written is dropped
//! together with the peer.

use crate::npcbrain::bridges::lockstep::{LockstepError, ReplySocket};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, ToSocketAddrs};

struct Peer {
    addr: SocketAddr,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// Listening socket that serves one request/reply peer at a time.
pub struct TcpReplySocket {
    listener: TcpListener,
    peer: Option<Peer>,
    pending: bool,
}

impl TcpReplySocket {
    /// Bind the listening address, e.g. `0.0.0.0:5555`.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, LockstepError> {
        let listener = TcpListener::bind(addr).await?;
        log::info!("Lock-step socket listening on {}", listener.local_addr()?);
        Ok(TcpReplySocket {
            listener,
            peer: None,
            pending: false,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, LockstepError> {
        Ok(self.listener.local_addr()?)
    }

    /// Whether a request is waiting for its reply.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    fn drop_peer(&mut self) {
        if let Some(peer) = self.peer.take() {
            log::info!("Peer {} disconnected", peer.addr);
        }
        self.pending = false;
    }
}

#[async_trait]
impl ReplySocket for TcpReplySocket {
    async fn recv_request(&mut self) -> Result<String, LockstepError> {
        if self.pending {
            return Err(LockstepError::OutOfTurn(
                "the previous request has not been answered",
            ));
        }

        loop {
            if self.peer.is_none() {
                let (stream, addr) = self.listener.accept().await?;
                log::info!("Peer {} connected", addr);
                let (read_half, writer) = stream.into_split();
                self.peer = Some(Peer {
                    addr,
                    reader: BufReader::new(read_half),
                    writer,
                });
            }
            let peer = match self.peer.as_mut() {
                Some(peer) => peer,
                None => continue,
            };

            // Lossy decode keeps the peer, and the request is still answered.
            let mut line = Vec::new();
            match peer.reader.read_until(b'\n', &mut line).await {
                Ok(0) => self.drop_peer(),
                Ok(_) => {
                    self.pending = true;
                    let line = String::from_utf8_lossy(&line);
                    return Ok(line.trim_end_matches(['\r', '\n']).to_string());
                }
                Err(e) => {
                    log::warn!("Read from peer {} failed: {}", peer.addr, e);
                    self.drop_peer();
                }
            }
        }
    }

    async fn send_reply(&mut self, reply: &str) -> Result<(), LockstepError> {
        if !self.pending {
            return Err(LockstepError::OutOfTurn("there is no request to answer"));
        }
        let peer = self.peer.as_mut().ok_or(LockstepError::NoPeer)?;

        let mut frame = String::with_capacity(reply.len() + 1);
        frame.push_str(reply);
        frame.push('\n');

        let written = async {
            peer.writer.write_all(frame.as_bytes()).await?;
            peer.writer.flush().await
        }
        .await;

        match written {
            Ok(()) => {
                self.pending = false;
                Ok(())
            }
            Err(e) => {
                self.drop_peer();
                Err(e.into())
            }
        }
    }
}
