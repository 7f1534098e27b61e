//! Line framing for the chat service's event stream.
//!
//! The service writes one `data: <json>` line per event. Bytes arrive in
//! arbitrary chunks, so both lines and multi-byte UTF-8 sequences can be
//! split across chunk boundaries.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tracing::debug;

/// Prefix marking a line that carries an event payload.
pub const DATA_PREFIX: &str = "data: ";

/// Stateful UTF-8 decoder.
///
/// An incomplete sequence at the end of a chunk is held back and completed by
/// the next chunk. Bytes that can never form valid UTF-8 become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk, returning all text that is complete so far.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        out.push_str(text);
                    }
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = after.get(bad..).unwrap_or_default();
                        }
                        None => {
                            // Truncated sequence: wait for the rest of it.
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Bytes of an incomplete sequence still waiting for more input.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Accumulates decoded text and hands out complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    utf8: Utf8Decoder,
    partial: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw chunk and return every line it completed, without the
    /// trailing newline. The unterminated tail stays buffered.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.utf8.decode(chunk);
        let Some(newline) = text.rfind('\n') else {
            self.partial.push_str(&text);
            return Vec::new();
        };
        // Only the new text can hold a newline; the buffered tail has none.
        let end = self.partial.len() + newline;
        self.partial.push_str(&text);
        let tail = self.partial.split_off(end + 1);
        let complete = std::mem::replace(&mut self.partial, tail);
        complete.lines().map(str::to_owned).collect()
    }

    /// Text received after the last newline.
    pub fn residual(&self) -> &str {
        &self.partial
    }
}

/// Extract the payload of a data line.
///
/// Returns `None` for blank lines, comments, keep-alives and any other line
/// without the data prefix. A returned payload is never empty.
pub fn data_payload(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    line.strip_prefix(DATA_PREFIX)
}

/// Stream adapter yielding the payload of every data line in a byte stream.
///
/// The inner stream is only polled once every payload from the previous chunk
/// has been taken, so at most one chunk is in flight.
pub struct SseStream<S> {
    inner: S,
    lines: LineBuffer,
    pending: VecDeque<String>,
    finished: bool,
}

impl<S> SseStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            lines: LineBuffer::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    fn queue_chunk(&mut self, bytes: &[u8]) {
        for line in self.lines.push(bytes) {
            if let Some(payload) = data_payload(&line) {
                self.pending.push_back(payload.to_string());
            }
        }
    }
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<String, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        if let Some(payload) = this.pending.pop_front() {
            return Poll::Ready(Some(Ok(payload)));
        }
        if this.finished {
            return Poll::Ready(None);
        }

        loop {
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.queue_chunk(&bytes);
                    if let Some(payload) = this.pending.pop_front() {
                        return Poll::Ready(Some(Ok(payload)));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    let residual = this.lines.residual();
                    if !residual.is_empty() {
                        debug!(
                            bytes = residual.len(),
                            "discarding unterminated line at end of stream"
                        );
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn bytes_stream(
        chunks: Vec<Vec<u8>>,
    ) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Unpin {
        futures::stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
    }

    async fn payloads(chunks: &[&str]) -> Vec<String> {
        let chunks = chunks.iter().map(|c| c.as_bytes().to_vec()).collect();
        SseStream::new(bytes_stream(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await
    }

    #[test]
    fn utf8_split_multibyte() {
        // "é" is 0xC3 0xA9, "杭" is 0xE6 0x9D 0xAD
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"caf\xC3"), "caf");
        assert_eq!(decoder.pending_len(), 1);
        assert_eq!(decoder.decode(b"\xA9 \xE6"), "é ");
        assert_eq!(decoder.decode(b"\x9D"), "");
        assert_eq!(decoder.decode(b"\xAD!"), "杭!");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn utf8_invalid_byte_replaced() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"a\xFFb"), "a\u{FFFD}b");
    }

    #[test]
    fn line_buffer_keeps_tail() {
        let mut lines = LineBuffer::new();
        assert!(lines.push(b"data: one").is_empty());
        assert_eq!(lines.push(b"\ndata: tw"), vec!["data: one"]);
        assert_eq!(lines.residual(), "data: tw");
        assert_eq!(lines.push(b"o\r\n\n"), vec!["data: two", ""]);
        assert_eq!(lines.residual(), "");
    }

    #[test]
    fn long_line_in_small_chunks() {
        let line = format!("data: {}", "x".repeat(4096));
        let mut lines = LineBuffer::new();
        for chunk in line.as_bytes().chunks(7) {
            assert!(lines.push(chunk).is_empty());
        }
        assert_eq!(lines.residual().len(), line.len());
        assert_eq!(lines.push(b"\ndata: n"), vec![line]);
        assert_eq!(lines.residual(), "data: n");
    }

    #[test]
    fn payload_extraction() {
        assert_eq!(data_payload("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(data_payload("  data: x  \r"), Some("x"));
        assert_eq!(data_payload(""), None);
        assert_eq!(data_payload("   "), None);
        assert_eq!(data_payload(": keep-alive"), None);
        assert_eq!(data_payload("event: message"), None);
        assert_eq!(data_payload("data:{\"a\":1}"), None);
    }

    #[test]
    fn bare_data_prefix_has_no_payload() {
        // Trimming removes the prefix's trailing space, so the line no longer
        // matches and is ignored like any other non-data line.
        assert_eq!(data_payload("data: "), None);
    }

    #[tokio::test]
    async fn parse_single_line() {
        assert_eq!(payloads(&["data: hello\n"]).await, vec!["hello"]);
    }

    #[tokio::test]
    async fn parse_multiple_lines_one_chunk() {
        assert_eq!(
            payloads(&["data: one\ndata: two\n\ndata: three\n"]).await,
            vec!["one", "two", "three"]
        );
    }

    #[tokio::test]
    async fn parse_chunked_line() {
        assert_eq!(
            payloads(&["data: hel", "lo wor", "ld\n"]).await,
            vec!["hello world"]
        );
    }

    #[tokio::test]
    async fn parse_with_crlf() {
        assert_eq!(payloads(&["data: hello\r\n\r\n"]).await, vec!["hello"]);
    }

    #[tokio::test]
    async fn ignore_comments_and_fields() {
        assert_eq!(
            payloads(&[": ping\nevent: message\nid: 7\ndata: actual\n"]).await,
            vec!["actual"]
        );
    }

    #[tokio::test]
    async fn unterminated_tail_is_dropped() {
        assert_eq!(
            payloads(&["data: kept\ndata: never finished"]).await,
            vec!["kept"]
        );
    }

    #[tokio::test]
    async fn multibyte_split_across_chunks() {
        let line = "data: 杭州\n".as_bytes();
        // Byte 8 falls inside the three-byte encoding of 杭.
        let chunks = vec![line[..8].to_vec(), line[8..].to_vec()];
        let got: Vec<String> = SseStream::new(bytes_stream(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(got, vec!["杭州"]);
    }

    #[tokio::test]
    async fn error_ends_stream() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"data: a\n")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"data: b\n")),
        ];
        let mut sse = SseStream::new(futures::stream::iter(chunks));

        assert_eq!(sse.next().await.unwrap().unwrap(), "a");
        assert!(sse.next().await.unwrap().is_err());
        assert!(sse.next().await.is_none());
    }
}
