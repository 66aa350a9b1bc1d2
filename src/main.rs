//! `npcbrain [duplex|lockstep]`
//!
//! Runs one NPC brain against the game server. `duplex` (default) connects to the server's
//! WebSocket; `lockstep` listens for pipe-delimited requests on `LOCKSTEP_BIND`.
//! Settings come from the environment and an optional `.env` file, see [`BrainConfig`].

use std::error::Error;
use std::sync::Arc;

use npcbrain::bridges::duplex::DuplexBridge;
use npcbrain::bridges::lockstep::LockstepBridge;
use npcbrain::bridges::tcp::TcpReplySocket;
use npcbrain::bridges::websocket::WebSocketConnector;
use npcbrain::bridges::StopHandle;
use npcbrain::clients::openai::OpenAIClient;
use npcbrain::{BrainConfig, NpcBrain};

fn stop_on_ctrl_c(stop: StopHandle) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::warn!("Shutting down...");
                stop.stop();
            }
            Err(e) => log::error!("Unable to listen for Ctrl-C: {}", e),
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    npcbrain::init_logger();

    let mode = std::env::args().nth(1).unwrap_or_else(|| "duplex".to_string());
    let config = BrainConfig::from_env()?;

    let client = OpenAIClient::new(&config.llm_api_key, &config.llm_model, &config.llm_base_url)?;
    let brain = NpcBrain::new(Arc::new(client), &config)?;
    log::info!(
        "Starting NPC brain for {} on model {}",
        config.npc_name,
        config.llm_model
    );

    match mode.as_str() {
        "duplex" => {
            let connector = WebSocketConnector::new(config.server_uri());
            let mut bridge = DuplexBridge::from_config(connector, brain, &config);
            stop_on_ctrl_c(bridge.stop_handle());
            bridge.run().await;
        }
        "lockstep" => {
            let socket = TcpReplySocket::bind(config.lockstep_bind.as_str()).await?;
            let mut bridge = LockstepBridge::new(socket, brain);
            stop_on_ctrl_c(bridge.stop_handle());
            bridge.run().await;
        }
        other => {
            return Err(format!("unknown mode `{}`, expected `duplex` or `lockstep`", other).into());
        }
    }

    Ok(())
}
