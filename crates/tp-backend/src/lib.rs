//! tp-backend: Streaming chat client for the travel planner.
//!
//! Turns the chat service's line-delimited event stream into typed
//! [`StreamEvent`](tp_protocol::StreamEvent)s delivered to a
//! [`StreamHandler`], plus one aggregated answer per request.

pub mod chat;
pub mod ingest;
pub mod mock;
pub mod session;
pub mod sse;

pub use chat::{ChatClient, ChatError};
pub use ingest::{
    ingest, Callbacks, DropReason, DroppedFrame, FinalText, StreamHandler, Transcript,
    TransportError, ERROR_MARKER,
};
pub use mock::{MockChunk, MockConfig};
pub use session::{
    generate_session_id, new_session_id, Clock, RandomSource, SystemClock, UuidRandom,
};
