//! # Transcript Accumulator
//!
//! Folds stream events into the visible message list of one conversation.
//!
//! ```text
//!          begin(prompt)            first ContentDelta
//!   Idle ───────────────▶ Awaiting ───────────────────▶ Streaming
//!    ▲                       │                              │
//!    │     fail / finish     │        Done / end of data    │
//!    └───────────────────────┴──────────────────────────────┘
//! ```
//!
//! The assistant placeholder is appended lazily, on the first delta, which is
//! also the moment `is_loading` drops to false. `is_loading` therefore means
//! "waiting for the first byte", not "stream still open".

use log::{debug, warn};

use crate::api::{Message, Role};
use crate::stream::StreamEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    /// Prompt sent, nothing received yet.
    Awaiting,
    /// The last message is the open assistant reply.
    Streaming,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    messages: Vec<Message>,
    phase: Phase,
    is_loading: bool,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// True while a request cycle is in flight (awaiting or streaming).
    pub fn in_cycle(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// Appends the user message and starts waiting for a reply.
    pub fn begin(&mut self, prompt: &str) {
        if self.in_cycle() {
            warn!("begin() during an open cycle, finishing the previous one");
            self.finish();
        }
        self.messages.push(Message::user(prompt));
        self.phase = Phase::Awaiting;
        self.is_loading = true;
    }

    /// Applies one stream event. Returns true if the transcript changed.
    ///
    /// `ConversationAssigned` never touches the transcript; the session
    /// handles it. `ServerError` is not handled here either: the session turns
    /// it into [`fail`](Self::fail).
    pub fn apply(&mut self, event: &StreamEvent) -> bool {
        match event {
            StreamEvent::ContentDelta(text) => self.append_delta(text),
            StreamEvent::Done => self.finish(),
            StreamEvent::ConversationAssigned(_) | StreamEvent::ServerError(_) => false,
        }
    }

    fn append_delta(&mut self, text: &str) -> bool {
        match self.phase {
            Phase::Idle => {
                debug!("Dropping delta outside of a cycle (len={})", text.len());
                false
            }
            Phase::Awaiting => {
                self.messages.push(Message::assistant(text));
                self.phase = Phase::Streaming;
                self.is_loading = false;
                true
            }
            Phase::Streaming => {
                if let Some(last) = self.messages.last_mut()
                    && last.role == Role::Assistant
                {
                    last.content.push_str(text);
                    return true;
                }
                // The open reply must be last; anything else is a bug upstream
                warn!("Streaming phase without an open assistant message");
                self.messages.push(Message::assistant(text));
                true
            }
        }
    }

    /// Closes the cycle on `Done` or end of data. Idempotent.
    pub fn finish(&mut self) -> bool {
        let changed = self.in_cycle() || self.is_loading;
        self.phase = Phase::Idle;
        self.is_loading = false;
        changed
    }

    /// Ends the cycle with a synthetic assistant message carrying `error_text`.
    pub fn fail(&mut self, error_text: &str) {
        self.messages.push(Message::assistant(error_text));
        self.phase = Phase::Idle;
        self.is_loading = false;
    }

    /// Replaces the whole transcript (switching conversations). Hidden roles
    /// are dropped.
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages
            .into_iter()
            .filter(|m| m.role != Role::System)
            .collect();
        self.phase = Phase::Idle;
        self.is_loading = false;
    }

    pub fn clear(&mut self) {
        self.replace(Vec::new());
    }

    /// Inserts earlier `history` in front of what is already shown. The
    /// open cycle, if any, is left as is.
    pub fn prepend(&mut self, history: Vec<Message>) {
        let mut messages: Vec<Message> = history
            .into_iter()
            .filter(|m| m.role != Role::System)
            .collect();
        messages.append(&mut self.messages);
        self.messages = messages;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(s: &str) -> StreamEvent {
        StreamEvent::ContentDelta(s.to_string())
    }

    #[test]
    fn test_begin_appends_user_and_sets_loading() {
        let mut t = Transcript::new();
        t.begin("Hello");
        assert_eq!(t.messages().len(), 1);
        assert_eq!(t.messages()[0].role, Role::User);
        assert_eq!(t.messages()[0].content, "Hello");
        assert_eq!(t.phase(), Phase::Awaiting);
        assert!(t.is_loading());
    }

    #[test]
    fn test_first_delta_opens_reply_and_clears_loading() {
        let mut t = Transcript::new();
        t.begin("Hello");
        assert!(t.apply(&delta("Hi")));
        assert_eq!(t.phase(), Phase::Streaming);
        assert!(!t.is_loading());
        assert_eq!(t.messages().last().unwrap().role, Role::Assistant);
        assert_eq!(t.messages().last().unwrap().content, "Hi");
    }

    #[test]
    fn test_deltas_concatenate_in_arrival_order() {
        let parts = ["The", " quick", " brown", "", " fox", " 🦀"];
        let mut t = Transcript::new();
        t.begin("go");
        for p in parts {
            t.apply(&delta(p));
        }
        t.apply(&StreamEvent::Done);
        assert_eq!(t.messages().len(), 2);
        assert_eq!(t.messages()[1].content, parts.concat());
    }

    #[test]
    fn test_done_twice_is_idempotent() {
        let mut t = Transcript::new();
        t.begin("Hello");
        t.apply(&delta("Hi"));
        assert!(t.apply(&StreamEvent::Done));
        let snapshot = t.clone();
        assert!(!t.apply(&StreamEvent::Done));
        assert_eq!(t, snapshot);
    }

    #[test]
    fn test_delta_after_done_is_ignored() {
        let mut t = Transcript::new();
        t.begin("Hello");
        t.apply(&delta("Hi"));
        t.apply(&StreamEvent::Done);
        assert!(!t.apply(&delta(" late")));
        assert_eq!(t.messages()[1].content, "Hi");
    }

    #[test]
    fn test_done_without_deltas_clears_loading() {
        let mut t = Transcript::new();
        t.begin("Hello");
        t.apply(&StreamEvent::Done);
        assert!(!t.is_loading());
        assert_eq!(t.phase(), Phase::Idle);
        assert_eq!(t.messages().len(), 1);
    }

    #[test]
    fn test_conversation_assigned_does_not_touch_transcript() {
        let mut t = Transcript::new();
        t.begin("Hello");
        let before = t.clone();
        assert!(!t.apply(&StreamEvent::ConversationAssigned("c1".into())));
        assert_eq!(t, before);
    }

    #[test]
    fn test_fail_appends_error_message() {
        let mut t = Transcript::new();
        t.begin("Hello");
        t.apply(&delta("partial"));
        t.fail("Error connecting to the server.");
        assert_eq!(t.messages().len(), 3);
        assert_eq!(t.messages()[1].content, "partial");
        assert_eq!(t.messages()[2].role, Role::Assistant);
        assert_eq!(t.messages()[2].content, "Error connecting to the server.");
        assert!(!t.is_loading());
        assert_eq!(t.phase(), Phase::Idle);
    }

    #[test]
    fn test_replace_drops_system_messages() {
        let mut t = Transcript::new();
        t.begin("pending");
        t.replace(vec![
            Message {
                role: Role::System,
                content: "prompt".into(),
                timestamp: chrono::Utc::now(),
            },
            Message::user("a"),
            Message::assistant("b"),
        ]);
        assert_eq!(t.messages().len(), 2);
        assert!(!t.is_loading());
        assert!(!t.in_cycle());
    }
}
