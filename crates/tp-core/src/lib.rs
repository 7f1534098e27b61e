//! tp-core: Application logic for the travel planner client.
//!
//! Configuration, logging, itinerary prompts, the view state machine and
//! the batch runner behind the `travelplan` binary. Exposed as a library
//! for testing.

pub mod batch;
pub mod config;
pub mod display;
pub mod itinerary;
pub mod logging;
