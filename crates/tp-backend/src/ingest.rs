//! Stream ingestion: bytes in, ordered events and one aggregated answer out.
//!
//! [`ingest`] drives a byte source to completion on the calling task. Every
//! decoded event reaches [`StreamHandler::on_event`] in arrival order, and
//! afterwards exactly one of [`StreamHandler::on_complete`] or
//! [`StreamHandler::on_error`] fires.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use thiserror::Error;
use tp_protocol::{EventKind, StreamEvent};
use tracing::{error, info, warn};

use crate::sse::SseStream;

/// Prefix that makes inline error events stand out in the aggregated text.
pub const ERROR_MARKER: &str = "❌ Error: ";

/// Failure of the underlying connection. Fatal to an ingestion.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("stream interrupted: {0}")]
    Interrupted(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Why a data frame was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// The payload is not a valid event; carries the decoder's message.
    Malformed(String),
}

/// A data frame that could not be turned into an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedFrame {
    pub payload: String,
    pub reason: DropReason,
}

/// Receives the results of one ingestion.
pub trait StreamHandler {
    fn on_event(&mut self, event: &StreamEvent);

    /// Called once when the source closes cleanly.
    fn on_complete(&mut self, final_text: String);

    /// Called once when the source fails. No `on_complete` follows.
    fn on_error(&mut self, error: TransportError);

    /// Diagnostic hook for frames that were skipped.
    fn on_dropped_frame(&mut self, _frame: &DroppedFrame) {}
}

impl<H: StreamHandler + ?Sized> StreamHandler for &mut H {
    fn on_event(&mut self, event: &StreamEvent) {
        (**self).on_event(event);
    }

    fn on_complete(&mut self, final_text: String) {
        (**self).on_complete(final_text);
    }

    fn on_error(&mut self, error: TransportError) {
        (**self).on_error(error);
    }

    fn on_dropped_frame(&mut self, frame: &DroppedFrame) {
        (**self).on_dropped_frame(frame);
    }
}

/// The aggregated answer text, folded from events in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalText {
    text: String,
}

impl FinalText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the text.
    pub fn apply(&mut self, event: &StreamEvent) {
        let content = event.content.as_str();
        match event.kind {
            EventKind::ToolCall => {
                self.text.push('\n');
                self.text.push_str(content);
                self.text.push('\n');
            }
            EventKind::ToolResult => {
                self.text.push_str(content);
                self.text.push_str("\n\n");
            }
            EventKind::Token => self.text.push_str(content),
            EventKind::Final => {
                self.text.clear();
                self.text.push_str(content);
            }
            EventKind::Error => {
                self.text.push_str(ERROR_MARKER);
                self.text.push_str(content);
                self.text.push('\n');
            }
        }
    }

    /// Fold a whole sequence, starting from empty.
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a StreamEvent>) -> Self {
        let mut text = Self::new();
        for event in events {
            text.apply(event);
        }
        text
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl From<String> for FinalText {
    fn from(text: String) -> Self {
        Self { text }
    }
}

type EventFn<'a> = Box<dyn FnMut(&StreamEvent) + Send + 'a>;
type CompleteFn<'a> = Box<dyn FnOnce(String) + Send + 'a>;
type ErrorFn<'a> = Box<dyn FnOnce(TransportError) + Send + 'a>;

/// A [`StreamHandler`] assembled from closures.
///
/// ```
/// use tp_backend::Callbacks;
///
/// let mut answer = String::new();
/// let callbacks = Callbacks::new()
///     .with_event(|event| println!("{:?}", event.kind))
///     .with_complete(|text| answer = text)
///     .with_error(|e| eprintln!("failed: {e}"));
/// # drop(callbacks);
/// ```
#[derive(Default)]
pub struct Callbacks<'a> {
    on_event: Option<EventFn<'a>>,
    on_complete: Option<CompleteFn<'a>>,
    on_error: Option<ErrorFn<'a>>,
}

impl<'a> Callbacks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event(mut self, f: impl FnMut(&StreamEvent) + Send + 'a) -> Self {
        self.on_event = Some(Box::new(f));
        self
    }

    pub fn with_complete(mut self, f: impl FnOnce(String) + Send + 'a) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub fn with_error(mut self, f: impl FnOnce(TransportError) + Send + 'a) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

impl StreamHandler for Callbacks<'_> {
    fn on_event(&mut self, event: &StreamEvent) {
        if let Some(f) = self.on_event.as_mut() {
            f(event);
        }
    }

    fn on_complete(&mut self, final_text: String) {
        self.on_error = None;
        if let Some(f) = self.on_complete.take() {
            f(final_text);
        }
    }

    fn on_error(&mut self, error: TransportError) {
        self.on_complete = None;
        if let Some(f) = self.on_error.take() {
            f(error);
        }
    }
}

/// A handler that records everything, for callers that want the whole
/// result at once.
#[derive(Debug, Default)]
pub struct Transcript {
    pub events: Vec<StreamEvent>,
    pub dropped: Vec<DroppedFrame>,
    pub outcome: Option<Result<String, TransportError>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// The aggregated text, if the stream completed.
    pub fn final_text(&self) -> Option<&str> {
        match &self.outcome {
            Some(Ok(text)) => Some(text),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TransportError> {
        match &self.outcome {
            Some(Err(e)) => Some(e),
            _ => None,
        }
    }
}

impl StreamHandler for Transcript {
    fn on_event(&mut self, event: &StreamEvent) {
        self.events.push(event.clone());
    }

    fn on_complete(&mut self, final_text: String) {
        self.outcome = Some(Ok(final_text));
    }

    fn on_error(&mut self, error: TransportError) {
        self.outcome = Some(Err(error));
    }

    fn on_dropped_frame(&mut self, frame: &DroppedFrame) {
        self.dropped.push(frame.clone());
    }
}

fn decode_frame(payload: &str) -> Result<StreamEvent, DroppedFrame> {
    StreamEvent::decode(payload).map_err(|e| {
        warn!(error = %e, payload, "dropping malformed frame");
        DroppedFrame {
            payload: payload.to_string(),
            reason: DropReason::Malformed(e.to_string()),
        }
    })
}

/// Consume `source` until it closes or fails, reporting to `handler`.
///
/// The source is owned for the whole ingestion and released before the
/// terminal callback runs. Dropping the returned future also releases it,
/// which is how callers cancel or impose a deadline.
pub async fn ingest<S, E, H>(source: S, mut handler: H)
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::error::Error + Send + Sync + 'static,
    H: StreamHandler,
{
    let mut frames = SseStream::new(Box::pin(source));
    let mut text = FinalText::new();
    let mut delivered: usize = 0;
    let mut dropped: usize = 0;

    while let Some(next) = frames.next().await {
        let payload = match next {
            Ok(payload) => payload,
            Err(e) => {
                drop(frames);
                error!(events = delivered, error = %e, "stream interrupted");
                handler.on_error(TransportError::Interrupted(Box::new(e)));
                return;
            }
        };

        match decode_frame(&payload) {
            Ok(event) => {
                handler.on_event(&event);
                text.apply(&event);
                delivered += 1;
            }
            Err(frame) => {
                dropped += 1;
                handler.on_dropped_frame(&frame);
            }
        }
    }

    drop(frames);
    info!(events = delivered, dropped, "stream complete");
    handler.on_complete(text.into_string());
}
