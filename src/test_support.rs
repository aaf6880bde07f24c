//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

use crate::api::{ApiError, ChatBackend, ChatRequest};
use crate::core::config::ResolvedConfig;
use crate::core::state::App;
use crate::stream::StreamEvent;

/// A backend that replays a fixed list of events, then optionally fails.
pub struct ScriptedBackend {
    events: Vec<StreamEvent>,
    error: Option<ApiError>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(events: Vec<StreamEvent>) -> Self {
        Self {
            events,
            error: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(events: Vec<StreamEvent>, error: ApiError) -> Self {
        Self {
            events,
            error: Some(error),
            calls: AtomicUsize::new(0),
        }
    }

    /// How many times `stream_chat` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream_chat(
        &self,
        _request: ChatRequest,
        sender: Sender<StreamEvent>,
    ) -> Result<(), ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for event in &self.events {
            sender
                .send(event.clone())
                .await
                .map_err(|_| ApiError::ChannelClosed)?;
        }
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

/// Creates a test App with default configuration.
pub fn test_app() -> App {
    App::from_config(&ResolvedConfig::default())
}
