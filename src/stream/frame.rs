//! Event frame parser for the `/api/chat` stream.
//!
//! The backend writes one JSON object per `data: ` line:
//!
//! ```text
//! data: {"conversation_id":"c42","content":"Hi"}
//! data: {"content":" there"}
//! data: {"done":true}
//! ```
//!
//! Text arrives in arbitrary pieces, so unterminated trailing text is carried
//! over until its newline shows up.

use std::collections::VecDeque;

use log::{debug, warn};
use serde::Deserialize;

use crate::api::ApiError;

const DATA_PREFIX: &str = "data: ";

/// One event decoded from the chat stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The server created (or confirmed) the conversation this reply belongs to.
    ConversationAssigned(String),
    /// Incremental assistant text.
    ContentDelta(String),
    /// The server reported a failure inside the stream (`{"error": "..."}`).
    ServerError(String),
    /// The reply is complete.
    Done,
}

/// Recognized fields of a frame payload. Unknown fields are ignored.
#[derive(Deserialize, Debug, Default)]
struct FramePayload {
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    done: bool,
}

/// Converts an empty string to None, non-empty to Some.
fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

/// Classifies one complete line.
///
/// Returns `Ok(vec![])` for lines that are not `data: ` frames. A single frame
/// may expand into several events, emitted in the order conversation id,
/// content, error, done.
pub fn parse_line(line: &str) -> Result<Vec<StreamEvent>, ApiError> {
    let line = line.strip_suffix('\r').unwrap_or(line);

    let Some(data) = line.strip_prefix(DATA_PREFIX) else {
        if !line.is_empty() {
            debug!("Ignoring non-data line: {}", line);
        }
        return Ok(Vec::new());
    };

    let payload: FramePayload = serde_json::from_str(data).map_err(|e| {
        warn!("Malformed frame payload: {} ({})", data, e);
        ApiError::Protocol(format!("malformed frame: {e}"))
    })?;

    let mut events = Vec::with_capacity(2);
    if let Some(id) = non_empty(payload.conversation_id) {
        events.push(StreamEvent::ConversationAssigned(id));
    }
    if let Some(text) = non_empty(payload.content) {
        events.push(StreamEvent::ContentDelta(text));
    }
    if let Some(msg) = non_empty(payload.error) {
        events.push(StreamEvent::ServerError(msg));
    }
    if payload.done {
        events.push(StreamEvent::Done);
    }
    Ok(events)
}

/// Incremental frame parser.
///
/// Feed decoded text with [`push`](Self::push), then drain events with
/// [`next_event`](Self::next_event). Lines are only parsed when pulled, so a
/// caller that stops after `Done` never pays for the rest of the buffer.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: String,
    ready: VecDeque<StreamEvent>,
    finished: bool,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends decoded text to the carry-over buffer.
    pub fn push(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// Marks end of data: leftover unterminated text is parsed as a last line.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Bytes of unterminated text waiting for a newline.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Next event in arrival order, or `None` when more text is needed.
    pub fn next_event(&mut self) -> Option<Result<StreamEvent, ApiError>> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(Ok(event));
            }

            let line = match self.buffer.find('\n') {
                Some(pos) => {
                    let line = self.buffer[..pos].to_string();
                    self.buffer.drain(..pos + 1);
                    line
                }
                None if self.finished && !self.buffer.is_empty() => {
                    debug!("Parsing unterminated trailing line at end of data");
                    std::mem::take(&mut self.buffer)
                }
                None => return None,
            };

            match parse_line(&line) {
                Ok(events) => self.ready.extend(events),
                Err(e) => return Some(Err(e)),
            }
        }
    }

    /// Pushes `text` and drains every event that became available.
    ///
    /// Stops at the first protocol error, returning the events before it
    /// alongside the error.
    pub fn feed(&mut self, text: &str) -> (Vec<StreamEvent>, Option<ApiError>) {
        self.push(text);
        let mut events = Vec::new();
        while let Some(next) = self.next_event() {
            match next {
                Ok(event) => events.push(event),
                Err(e) => return (events, Some(e)),
            }
        }
        (events, None)
    }
}
