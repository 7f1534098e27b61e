//! View state for an itinerary being generated.

use tp_backend::{FinalText, StreamHandler, TransportError};
use tp_protocol::{EventKind, StreamEvent};

/// Shown in place of the itinerary when generation fails.
pub const RETRY_MESSAGE: &str =
    "Sorry, something went wrong while generating the itinerary. Please try again.";

/// Current view status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewStatus {
    /// Request sent, no answer text yet.
    Loading,
    /// Tokens are arriving.
    Streaming,
    /// An answer or inline error arrived; waiting for the stream to close.
    Received,
    Done,
    Failed,
}

/// The itinerary as the user sees it while it is generated.
#[derive(Debug)]
pub struct ItineraryView {
    pub text: FinalText,
    pub status: ViewStatus,
}

impl Default for ItineraryView {
    fn default() -> Self {
        Self::new()
    }
}

impl ItineraryView {
    pub fn new() -> Self {
        Self {
            text: FinalText::new(),
            status: ViewStatus::Loading,
        }
    }

    pub fn text(&self) -> &str {
        self.text.as_str()
    }

    pub fn is_loading(&self) -> bool {
        self.status == ViewStatus::Loading
    }

    pub fn is_streaming(&self) -> bool {
        self.status == ViewStatus::Streaming
    }

    /// Whether a terminal callback or deadline has settled the view.
    pub fn is_finished(&self) -> bool {
        matches!(self.status, ViewStatus::Done | ViewStatus::Failed)
    }

    /// The caller gave up waiting.
    pub fn on_deadline(&mut self) {
        self.fail();
    }

    fn fail(&mut self) {
        self.text = FinalText::from(RETRY_MESSAGE.to_string());
        self.status = ViewStatus::Failed;
    }
}

impl StreamHandler for ItineraryView {
    fn on_event(&mut self, event: &StreamEvent) {
        if self.is_finished() {
            return;
        }
        self.text.apply(event);
        match event.kind {
            EventKind::ToolCall | EventKind::ToolResult => {}
            EventKind::Token => self.status = ViewStatus::Streaming,
            EventKind::Final => self.status = ViewStatus::Received,
            EventKind::Error => {
                if self.status == ViewStatus::Streaming {
                    self.status = ViewStatus::Received;
                }
            }
        }
    }

    fn on_complete(&mut self, final_text: String) {
        if self.is_finished() {
            return;
        }
        if !final_text.is_empty() {
            self.text = FinalText::from(final_text);
        }
        self.status = ViewStatus::Done;
    }

    fn on_error(&mut self, _error: TransportError) {
        if self.is_finished() {
            return;
        }
        self.fail();
    }
}
