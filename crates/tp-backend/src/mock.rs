//! Mock byte sources for testing.
//!
//! Produces the same kind of byte stream the chat service sends, so handlers
//! and front ends can be exercised through [`crate::ingest`] without HTTP.

use std::time::Duration;

use async_stream::stream;
use bytes::Bytes;
use futures::Stream;
use thiserror::Error;
use tokio::time::sleep;
use tp_protocol::StreamEvent;

use crate::sse::DATA_PREFIX;

/// Transport failure injected by a mock source.
#[derive(Debug, Error)]
pub enum MockTransportError {
    #[error("{0}")]
    Injected(String),
    #[error("failed to encode mock event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One step of a mock stream.
#[derive(Debug, Clone)]
pub enum MockChunk {
    /// A well-formed `data:` line for this event.
    Event(StreamEvent),
    /// A raw line, newline appended.
    Line(String),
    /// Raw bytes, sent as-is.
    Raw(Vec<u8>),
    /// Delay before the next step.
    Delay { ms: u64 },
    /// Fail the transport. Nothing after this is sent.
    Fail { message: String },
}

/// Configuration for a mock byte stream.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    pub chunks: Vec<MockChunk>,
    /// Re-split every step's bytes into pieces of at most this many bytes.
    pub split_every: Option<usize>,
}

impl MockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunks(mut self, chunks: Vec<MockChunk>) -> Self {
        self.chunks = chunks;
        self
    }

    pub fn with_events(self, events: Vec<StreamEvent>) -> Self {
        self.with_chunks(events.into_iter().map(MockChunk::Event).collect())
    }

    pub fn split_every(mut self, bytes: usize) -> Self {
        self.split_every = Some(bytes.max(1));
        self
    }
}

/// Render an event as the service would put it on the wire.
pub fn event_line(event: &StreamEvent) -> Result<String, serde_json::Error> {
    Ok(format!("{DATA_PREFIX}{}\n", event.encode()?))
}

/// Create a byte stream from mock config.
pub fn mock_byte_stream(
    config: MockConfig,
) -> impl Stream<Item = Result<Bytes, MockTransportError>> {
    stream! {
        for chunk in config.chunks {
            let bytes = match chunk {
                MockChunk::Event(event) => match event_line(&event) {
                    Ok(line) => line.into_bytes(),
                    Err(e) => {
                        yield Err(MockTransportError::Encode(e));
                        return;
                    }
                },
                MockChunk::Line(line) => format!("{line}\n").into_bytes(),
                MockChunk::Raw(bytes) => bytes,
                MockChunk::Delay { ms } => {
                    sleep(Duration::from_millis(ms)).await;
                    continue;
                }
                MockChunk::Fail { message } => {
                    yield Err(MockTransportError::Injected(message));
                    return;
                }
            };

            let size = config.split_every.unwrap_or(bytes.len()).max(1);
            for piece in bytes.chunks(size) {
                yield Ok(Bytes::copy_from_slice(piece));
            }
        }
    }
}

/// Built-in test fixtures for common scenarios.
pub mod fixtures {
    use super::*;

    /// Tool lookup, its result, then the itinerary as tokens. No final event.
    pub fn itinerary_scenario() -> MockConfig {
        MockConfig::new().with_events(vec![
            StreamEvent::tool_call("Searching"),
            StreamEvent::tool_result("Found 3 results"),
            StreamEvent::token("Day 1: "),
            StreamEvent::token("Visit the museum."),
        ])
    }

    /// Tokens followed by an authoritative final answer.
    pub fn tokens_then_final(tokens: &[&str], final_answer: &str) -> MockConfig {
        let mut events: Vec<StreamEvent> = tokens.iter().map(|t| StreamEvent::token(*t)).collect();
        events.push(StreamEvent::final_answer(final_answer));
        MockConfig::new().with_events(events)
    }

    /// Some tokens, then the connection drops.
    pub fn transport_failure_mid_stream(text_before: &str, message: &str) -> MockConfig {
        MockConfig::new().with_chunks(vec![
            MockChunk::Event(StreamEvent::token(text_before)),
            MockChunk::Fail {
                message: message.to_string(),
            },
        ])
    }

    /// Keep-alive comments and a malformed frame around real events.
    pub fn noisy_stream() -> MockConfig {
        MockConfig::new().with_chunks(vec![
            MockChunk::Line(": keep-alive".to_string()),
            MockChunk::Event(StreamEvent::token("Day 1")),
            MockChunk::Line(String::new()),
            MockChunk::Line("data: {not valid json".to_string()),
            MockChunk::Line(": keep-alive".to_string()),
            MockChunk::Event(StreamEvent::token(" done")),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{ingest, Transcript};
    use futures::StreamExt;

    #[tokio::test]
    async fn mock_stream_emits_lines() {
        let config = MockConfig::new().with_events(vec![StreamEvent::token("Hello")]);
        let chunks: Vec<_> = mock_byte_stream(config).collect().await;

        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].as_ref().unwrap().to_vec(),
            b"data: {\"type\":\"token\",\"content\":\"Hello\"}\n".to_vec()
        );
    }

    #[tokio::test]
    async fn mock_stream_splits_bytes() {
        let config = MockConfig::new()
            .with_chunks(vec![MockChunk::Line("data: abcdef".to_string())])
            .split_every(4);
        let chunks: Vec<_> = mock_byte_stream(config)
            .map(|c| c.unwrap().to_vec())
            .collect()
            .await;

        assert_eq!(
            chunks,
            vec![b"data".to_vec(), b": ab".to_vec(), b"cdef".to_vec(), b"\n".to_vec()]
        );
    }

    #[tokio::test]
    async fn mock_stream_fail_stops() {
        let config = fixtures::transport_failure_mid_stream("x", "connection reset");
        let chunks: Vec<_> = mock_byte_stream(config).collect().await;

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].is_ok());
        assert_eq!(
            chunks[1].as_ref().unwrap_err().to_string(),
            "connection reset"
        );
    }

    #[tokio::test]
    async fn fixture_scenario_ingests() {
        let mut transcript = Transcript::new();
        ingest(
            mock_byte_stream(fixtures::itinerary_scenario().split_every(3)),
            &mut transcript,
        )
        .await;

        assert_eq!(
            transcript.final_text(),
            Some("\nSearching\nFound 3 results\n\nDay 1: Visit the museum.")
        );
    }

    #[tokio::test]
    async fn fixture_tokens_then_final() {
        let mut transcript = Transcript::new();
        ingest(
            mock_byte_stream(fixtures::tokens_then_final(
                &["Hello ", "world"],
                "Complete answer.",
            )),
            &mut transcript,
        )
        .await;

        assert_eq!(transcript.events.len(), 3);
        assert_eq!(transcript.final_text(), Some("Complete answer."));
    }

    #[tokio::test]
    async fn fixture_noisy_stream() {
        let mut transcript = Transcript::new();
        ingest(mock_byte_stream(fixtures::noisy_stream()), &mut transcript).await;

        assert_eq!(transcript.events.len(), 2);
        assert_eq!(transcript.dropped.len(), 1);
        assert_eq!(transcript.final_text(), Some("Day 1 done"));
    }

    #[tokio::test]
    async fn fixture_transport_failure() {
        let mut transcript = Transcript::new();
        ingest(
            mock_byte_stream(fixtures::transport_failure_mid_stream("Day", "reset")),
            &mut transcript,
        )
        .await;

        assert_eq!(transcript.events, vec![StreamEvent::token("Day")]);
        assert!(transcript.final_text().is_none());
        assert_eq!(
            transcript.error().unwrap().to_string(),
            "stream interrupted: reset"
        );
    }

    #[tokio::test]
    async fn delay_does_not_emit() {
        let config = MockConfig::new().with_chunks(vec![
            MockChunk::Delay { ms: 50 },
            MockChunk::Event(StreamEvent::token("late")),
        ]);
        let chunks: Vec<_> = mock_byte_stream(config).collect().await;
        assert_eq!(chunks.len(), 1);
    }
}
