//! # Backend API
//!
//! Wire types and the HTTP client for the chat backend. The backend itself is
//! an external service; this module only knows its contract.

pub mod backend;
pub mod client;
pub mod error;
pub mod types;

pub use backend::ChatBackend;
pub use client::ApiClient;
pub use error::ApiError;
pub use types::{ChatRequest, Conversation, Message, Role};
