//! Transport reader: bytes in, text out.
//!
//! HTTP bodies arrive in arbitrary chunks. A multi-byte UTF-8 character can be
//! split across two chunks, so the decoder keeps the incomplete tail around
//! until the next chunk completes it.

use std::fmt::Display;

use futures::{Stream, StreamExt};
use log::{debug, warn};

use crate::api::ApiError;

/// Incremental UTF-8 decoder.
///
/// Invalid sequences are replaced with U+FFFD instead of failing the stream.
/// Incomplete trailing sequences are held back until more bytes arrive.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes as much of `pending + input` as possible.
    pub fn decode(&mut self, input: &[u8]) -> String {
        self.pending.extend_from_slice(input);

        let mut out = String::with_capacity(self.pending.len());
        let mut start = 0;
        while start < self.pending.len() {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    start = self.pending.len();
                }
                Err(e) => {
                    let valid_end = start + e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[start..valid_end]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + bad;
                        }
                        // Incomplete sequence at the end: wait for more bytes
                        None => {
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..start);
        out
    }

    /// Number of bytes held back waiting for completion.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Flushes whatever is left. A dangling partial sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        warn!(
            "Stream ended inside a UTF-8 sequence ({} bytes)",
            self.pending.len()
        );
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }
}

/// Wraps a byte stream and yields decoded text chunks.
///
/// Each call to [`next_text`](Self::next_text) resumes where the previous one
/// stopped. Chunks already returned are not replayed.
pub struct TextReader<S> {
    inner: S,
    decoder: Utf8Decoder,
    finished: bool,
}

impl<S, B, E> TextReader<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            decoder: Utf8Decoder::new(),
            finished: false,
        }
    }

    /// Next chunk of decoded text, `None` at end of data.
    ///
    /// Transport failures are returned once as `ApiError::Transport`; the
    /// reader is finished afterwards.
    pub async fn next_text(&mut self) -> Option<Result<String, ApiError>> {
        if self.finished {
            return None;
        }

        loop {
            match self.inner.next().await {
                Some(Ok(chunk)) => {
                    let bytes = chunk.as_ref();
                    debug!("Raw chunk received: {} bytes", bytes.len());
                    let text = self.decoder.decode(bytes);
                    if !text.is_empty() {
                        return Some(Ok(text));
                    }
                }
                Some(Err(e)) => {
                    self.finished = true;
                    warn!("Transport failure while reading stream: {}", e);
                    return Some(Err(ApiError::Transport(e.to_string())));
                }
                None => {
                    self.finished = true;
                    let tail = self.decoder.finish();
                    return (!tail.is_empty()).then_some(Ok(tail));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: Vec<&[u8]>) -> impl Stream<Item = Result<Vec<u8>, String>> + Unpin {
        stream::iter(parts.into_iter().map(|p| Ok(p.to_vec())).collect::<Vec<_>>())
    }

    #[test]
    fn test_decoder_passes_ascii_through() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"hello"), "hello");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_decoder_holds_split_multibyte_char() {
        // "é" is 0xC3 0xA9
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"caf\xC3"), "caf");
        assert_eq!(decoder.pending_len(), 1);
        assert_eq!(decoder.decode(b"\xA9!"), "é!");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_decoder_four_byte_char_split_three_ways() {
        // "🦀" is F0 9F A6 80
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"\xF0"), "");
        assert_eq!(decoder.decode(b"\x9F\xA6"), "");
        assert_eq!(decoder.decode(b"\x80"), "🦀");
    }

    #[test]
    fn test_decoder_replaces_invalid_bytes() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"a\xFFb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_decoder_finish_flushes_dangling_bytes() {
        let mut decoder = Utf8Decoder::new();
        decoder.decode(b"x\xE2\x82");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_reader_yields_chunks_in_order() {
        let mut reader = TextReader::new(chunks(vec![b"data: ".as_slice(), b"{}\n".as_slice()]));
        tokio_test::block_on(async {
            assert_eq!(reader.next_text().await, Some(Ok("data: ".to_string())));
            assert_eq!(reader.next_text().await, Some(Ok("{}\n".to_string())));
            assert_eq!(reader.next_text().await, None);
            // Not replayable
            assert_eq!(reader.next_text().await, None);
        });
    }

    #[tokio::test]
    async fn test_reader_skips_chunks_that_decode_to_nothing() {
        let mut reader = TextReader::new(chunks(vec![b"\xC3".as_slice(), b"\xA9".as_slice()]));
        assert_eq!(reader.next_text().await, Some(Ok("é".to_string())));
        assert_eq!(reader.next_text().await, None);
    }

    #[tokio::test]
    async fn test_reader_propagates_transport_error() {
        let parts: Vec<Result<Vec<u8>, String>> =
            vec![Ok(b"partial".to_vec()), Err("connection reset".to_string())];
        let mut reader = TextReader::new(stream::iter(parts));

        assert_eq!(reader.next_text().await, Some(Ok("partial".to_string())));
        match reader.next_text().await {
            Some(Err(ApiError::Transport(msg))) => assert!(msg.contains("connection reset")),
            other => panic!("Expected transport error, got {:?}", other),
        }
        assert_eq!(reader.next_text().await, None);
    }
}
