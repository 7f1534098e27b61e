//! tp-protocol: Shared types for the travel planner.
//!
//! Wire types exchanged with the chat service, the decoded stream events,
//! and the itinerary form data the prompts are built from.

pub mod chat;
pub mod event;
pub mod plan;

pub use chat::{ChatRequest, ChatResponse, SessionId};
pub use event::{EventKind, EventMetadata, StreamEvent};
pub use plan::{ItineraryPlan, Preferences, TravelMode, TripDuration};
