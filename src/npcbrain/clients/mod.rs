//! Provider specific [`ClientWrapper`](crate::client_wrapper::ClientWrapper) implementations.
//!
//! Every OpenAI compatible endpoint (hosted or local) goes through [`openai::OpenAIClient`].

pub mod http_pool;
pub mod openai;
