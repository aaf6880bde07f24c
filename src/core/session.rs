//! # Conversation Session Controller
//!
//! Owns one conversation view: its transcript, which server-side conversation
//! it belongs to, and the request cycle currently in flight.
//!
//! Every cycle gets a fresh [`CycleId`]. Events are applied only if they carry
//! the current id, so a stream that outlives its cycle (the user switched
//! conversations, or cancelled) cannot write into someone else's transcript.
//!
//! There are two ways to drive a cycle:
//! - [`Session::submit`] runs the whole cycle inline against a [`ChatBackend`].
//! - The TUI calls [`Session::begin`], spawns the stream itself, and feeds the
//!   results back through [`Session::apply`], [`Session::fail`] and
//!   [`Session::close`] as actions arrive.

use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::api::{ApiError, ChatBackend, ChatRequest, Message};
use crate::core::transcript::Transcript;
use crate::stream::StreamEvent;

pub const DEFAULT_ERROR_MESSAGE: &str = "Error connecting to the server.";

/// Capacity of the event channel between the transport task and the fold.
pub const EVENT_BUFFER: usize = 100;

/// Identifies one request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CycleId(u64);

/// Result of a completed (or failed) request cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    /// Conversation the transcript belongs to after the cycle.
    pub conversation_id: Option<String>,
    /// Conversation the cycle started with (`None` = "create new").
    pub started_with: Option<String>,
    /// Why the cycle failed, if it did. Already shown to the user.
    pub error: Option<ApiError>,
}

impl CycleOutcome {
    /// True when the server assigned a different conversation; cached
    /// listings should be refreshed.
    pub fn conversation_changed(&self) -> bool {
        self.conversation_id.is_some() && self.conversation_id != self.started_with
    }
}

pub struct Session {
    transcript: Transcript,
    active_conversation: Option<String>,
    current_cycle: Option<CycleId>,
    started_with: Option<String>,
    cycle_error: Option<ApiError>,
    /// Conversation whose stored messages have been requested but not shown.
    history_pending: Option<String>,
    next_cycle: u64,
    error_message: String,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_MESSAGE)
    }
}

impl Session {
    /// `error_message` is the fixed text shown when a cycle fails.
    pub fn new(error_message: impl Into<String>) -> Self {
        Self {
            transcript: Transcript::new(),
            active_conversation: None,
            current_cycle: None,
            started_with: None,
            cycle_error: None,
            history_pending: None,
            next_cycle: 1,
            error_message: error_message.into(),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }

    pub fn active_conversation(&self) -> Option<&str> {
        self.active_conversation.as_deref()
    }

    /// Waiting for the first byte of a reply.
    pub fn is_loading(&self) -> bool {
        self.transcript.is_loading()
    }

    /// A cycle is in flight. Submitting is disabled until it ends.
    pub fn in_flight(&self) -> bool {
        self.current_cycle.is_some()
    }

    pub fn current_cycle(&self) -> Option<CycleId> {
        self.current_cycle
    }

    /// Summary of the most recent cycle. Only meaningful once it has ended.
    pub fn last_outcome(&self) -> CycleOutcome {
        CycleOutcome {
            conversation_id: self.active_conversation.clone(),
            started_with: self.started_with.clone(),
            error: self.cycle_error.clone(),
        }
    }

    fn is_current(&self, cycle: CycleId) -> bool {
        if self.current_cycle == Some(cycle) {
            return true;
        }
        debug!(
            "Discarding update for stale cycle {:?} (current {:?})",
            cycle, self.current_cycle
        );
        false
    }

    /// Starts a cycle for `prompt`.
    ///
    /// Returns `None` without touching anything if the prompt is blank or a
    /// cycle is already in flight. Otherwise the user message is appended and
    /// the request to send is returned.
    pub fn begin(&mut self, prompt: &str) -> Option<(CycleId, ChatRequest)> {
        if prompt.trim().is_empty() {
            debug!("Ignoring blank prompt");
            return None;
        }
        if let Some(cycle) = self.current_cycle {
            debug!("Ignoring submit while cycle {:?} is in flight", cycle);
            return None;
        }

        let cycle = CycleId(self.next_cycle);
        self.next_cycle += 1;
        self.current_cycle = Some(cycle);
        self.started_with = self.active_conversation.clone();
        self.cycle_error = None;
        self.transcript.begin(prompt);

        info!(
            "Cycle {:?} started (conversation={:?}, prompt_len={})",
            cycle,
            self.active_conversation,
            prompt.len()
        );

        let request = ChatRequest {
            message: prompt.to_string(),
            conversation_id: self.active_conversation.clone(),
        };
        Some((cycle, request))
    }

    /// Applies one stream event of `cycle`. Returns true if state changed.
    pub fn apply(&mut self, cycle: CycleId, event: StreamEvent) -> bool {
        if !self.is_current(cycle) {
            return false;
        }

        match event {
            StreamEvent::ConversationAssigned(id) => {
                if self.active_conversation.as_deref() == Some(id.as_str()) {
                    return false;
                }
                info!("Conversation assigned by server: {}", id);
                self.active_conversation = Some(id);
                true
            }
            StreamEvent::ServerError(msg) => {
                self.fail(cycle, &ApiError::Protocol(format!("server reported: {msg}")))
            }
            StreamEvent::Done => {
                self.transcript.apply(&StreamEvent::Done);
                self.current_cycle = None;
                true
            }
            delta @ StreamEvent::ContentDelta(_) => self.transcript.apply(&delta),
        }
    }

    /// Ends `cycle` with the fixed error message.
    ///
    /// Transport and protocol failures look the same to the user; the kind is
    /// only logged.
    pub fn fail(&mut self, cycle: CycleId, error: &ApiError) -> bool {
        if !self.is_current(cycle) {
            return false;
        }
        warn!("Cycle {:?} failed ({}): {}", cycle, error.kind(), error);
        self.transcript.fail(&self.error_message);
        self.cycle_error = Some(error.clone());
        self.current_cycle = None;
        true
    }

    /// Ends `cycle` because the stream closed (with or without `Done`).
    pub fn close(&mut self, cycle: CycleId) -> bool {
        if !self.is_current(cycle) {
            return false;
        }
        debug!("Cycle {:?} closed by end of data", cycle);
        self.transcript.finish();
        self.current_cycle = None;
        true
    }

    /// Abandons the in-flight cycle, if any. Late events for it are dropped.
    pub fn cancel(&mut self) -> Option<CycleId> {
        let cycle = self.current_cycle.take()?;
        info!("Cycle {:?} cancelled", cycle);
        self.transcript.finish();
        Some(cycle)
    }

    /// Clears the view; the next submit creates a new conversation.
    pub fn start_new_conversation(&mut self) {
        self.cancel();
        self.history_pending = None;
        self.active_conversation = None;
        self.transcript.clear();
    }

    /// Shows `messages` as the transcript of conversation `id`.
    pub fn load_conversation(&mut self, id: impl Into<String>, messages: Vec<Message>) {
        self.cancel();
        self.history_pending = None;
        self.active_conversation = Some(id.into());
        self.transcript.replace(messages);
    }

    /// Switches to conversation `id` with an empty view while its stored
    /// messages are fetched. The user may chat before they arrive.
    pub fn open_conversation(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.load_conversation(id.clone(), Vec::new());
        self.history_pending = Some(id);
    }

    /// Delivers the stored messages requested by [`open_conversation`].
    ///
    /// They go in front of anything sent since, and an in-flight reply keeps
    /// streaming. Returns false (and drops them) if the view has moved on or
    /// they were already delivered.
    ///
    /// [`open_conversation`]: Self::open_conversation
    pub fn receive_history(&mut self, id: &str, messages: Vec<Message>) -> bool {
        if self.history_pending.as_deref() != Some(id)
            || self.active_conversation.as_deref() != Some(id)
        {
            return false;
        }
        self.history_pending = None;
        self.transcript.prepend(messages);
        true
    }

    /// Shows a transcript that belongs to no server-side conversation
    /// (the legacy flat history).
    pub fn load_detached(&mut self, messages: Vec<Message>) {
        self.cancel();
        self.history_pending = None;
        self.active_conversation = None;
        self.transcript.replace(messages);
    }

    /// Called after conversation `id` was deleted. Clears the view if it was
    /// the active one. Returns true if it was.
    pub fn forget_conversation(&mut self, id: &str) -> bool {
        if self.active_conversation.as_deref() != Some(id) {
            return false;
        }
        self.start_new_conversation();
        true
    }

    /// Runs one full cycle inline: sends `prompt` through `backend` and folds
    /// every event into the transcript as it arrives.
    ///
    /// Returns `None` if the prompt was blank or a cycle was already in flight
    /// (nothing was sent). Failures never escape: they end up as the error
    /// message in the transcript and in [`CycleOutcome::error`].
    pub async fn submit(
        &mut self,
        backend: &dyn ChatBackend,
        prompt: &str,
    ) -> Option<CycleOutcome> {
        let (cycle, request) = self.begin(prompt)?;

        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let stream = backend.stream_chat(request, tx);
        let fold = async {
            while let Some(event) = rx.recv().await {
                self.apply(cycle, event);
            }
        };
        let (result, ()) = tokio::join!(stream, fold);

        match result {
            Ok(()) => {
                self.close(cycle);
            }
            Err(e) => {
                self.fail(cycle, &e);
            }
        }

        Some(self.last_outcome())
    }
}
