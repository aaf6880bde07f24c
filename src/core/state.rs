//! # Application State
//!
//! Core business state for Locally. This module contains domain logic only -
//! no TUI-specific types. Presentation state lives in the `tui` module.
//!
//! ```text
//! App
//! ├── session: Session                  // transcript + active conversation + cycle
//! ├── conversations: ConversationList   // cached sidebar listing
//! ├── conversations_loading: bool       // listing fetch in flight
//! ├── health: HealthStatus              // last check result
//! ├── status_message: String            // status bar text
//! └── new_conversation_title: String    // title bar text before the server names the conversation
//! ```
//!
//! State changes only happen through `update(state, action)` in action.rs.
//! This keeps things predictable, so no surprise mutations.

use crate::core::config::ResolvedConfig;
use crate::core::conversations::ConversationList;
use crate::core::health::HealthStatus;
use crate::core::session::Session;

pub struct App {
    pub session: Session,
    pub conversations: ConversationList,
    pub conversations_loading: bool,
    pub health: HealthStatus,
    pub status_message: String,
    /// Shown in the title bar while no listed conversation is active. The
    /// server names conversations itself on the first send.
    pub new_conversation_title: String,
}

impl App {
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self {
            session: Session::new(config.error_message.clone()),
            conversations: ConversationList::new(),
            conversations_loading: true,
            health: HealthStatus::default(),
            status_message: String::from("Welcome to Locally!"),
            new_conversation_title: config.new_conversation_title.clone(),
        }
    }

    /// Title of the active conversation, if it is in the cached listing.
    pub fn active_title(&self) -> Option<&str> {
        let id = self.session.active_conversation()?;
        self.conversations.get(id).map(|c| c.title.as_str())
    }
}
