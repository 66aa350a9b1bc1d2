// src/npcbrain/mod.rs

pub mod action;
pub mod brain;
pub mod bridges;
pub mod client_wrapper;
pub mod clients;
pub mod config;
pub mod conversation;
pub mod event;
pub mod game_context;
pub mod tool_schema;

// Export the decision engine at the module root so it reads as npcbrain::NpcBrain
// instead of npcbrain::brain::NpcBrain.
pub use brain::{DecisionEngine, NpcBrain};
pub use conversation::ConversationLog;
