//! # Chat Stream Decoding
//!
//! Turns the raw body of `POST /api/chat` into [`StreamEvent`] values.
//!
//! ```text
//! bytes ──▶ TextReader (UTF-8, split-safe) ──▶ FrameParser (lines, JSON) ──▶ StreamEvent
//! ```
//!
//! Neither half knows about HTTP or UI state.

pub mod frame;
pub mod reader;

pub use frame::{FrameParser, StreamEvent};
pub use reader::{TextReader, Utf8Decoder};
