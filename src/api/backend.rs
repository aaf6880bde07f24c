use std::fmt::Display;

use async_trait::async_trait;
use futures::Stream;
use log::{debug, info, warn};
use tokio::sync::mpsc::Sender;

use super::error::ApiError;
use super::types::ChatRequest;
use crate::stream::{FrameParser, StreamEvent, TextReader};

/// Something that can answer a prompt with a stream of events.
///
/// The HTTP client is the real implementation; tests script their own.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Returns the name of the backend (for logs).
    fn name(&self) -> &str;

    /// Sends the prompt and forwards every decoded event to `sender`, in order.
    ///
    /// Returns `Ok(())` once `Done` has been forwarded or the server closed the
    /// stream. Transport and protocol failures are returned as errors after
    /// any events that preceded them have been forwarded.
    async fn stream_chat(
        &self,
        request: ChatRequest,
        sender: Sender<StreamEvent>,
    ) -> Result<(), ApiError>;
}

/// Reads `reader` to completion, parsing frames and forwarding events.
///
/// Stops reading as soon as `Done` has been forwarded.
pub async fn pump_events<S, B, E>(
    reader: &mut TextReader<S>,
    sender: &Sender<StreamEvent>,
) -> Result<(), ApiError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut parser = FrameParser::new();
    let mut event_count = 0usize;
    let mut content_len = 0usize;

    loop {
        let at_end = match reader.next_text().await {
            Some(text) => {
                parser.push(&text?);
                false
            }
            None => {
                parser.finish();
                true
            }
        };

        while let Some(next) = parser.next_event() {
            let event = next?;
            event_count += 1;
            if let StreamEvent::ContentDelta(text) = &event {
                content_len += text.len();
                debug!(
                    "Forwarding content delta (len={}, total={})",
                    text.len(),
                    content_len
                );
            }

            let is_done = event == StreamEvent::Done;
            if sender.send(event).await.is_err() {
                warn!("Event send failed: receiver dropped");
                return Err(ApiError::ChannelClosed);
            }
            if is_done {
                info!(
                    "Stream complete: {} events, {} content bytes",
                    event_count, content_len
                );
                return Ok(());
            }
        }

        if at_end {
            info!(
                "Stream ended without done: {} events, {} content bytes",
                event_count, content_len
            );
            return Ok(());
        }
    }
}
