//! Turning an itinerary form into a chat prompt.

use std::fmt::Write as _;
use std::io;
use std::path::Path;

use thiserror::Error;
use tp_protocol::{ItineraryPlan, TripDuration};

#[derive(Debug, Error)]
pub enum PlanFileError {
    #[error("failed to read plan file: {0}")]
    Io(#[from] io::Error),
    #[error("invalid plan file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load an itinerary form saved as JSON.
pub fn load_plan(path: &Path) -> Result<ItineraryPlan, PlanFileError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

const NOT_SPECIFIED: &str = "not specified";
const NO_PREFERENCE: &str = "no particular preference";

const LODGING_SECTION: &str = "Where to stay";

const REQUESTED_SECTIONS: [&str; 6] = [
    "A detailed schedule, broken down by day",
    "Recommended sights and activities",
    "Transport advice",
    LODGING_SECTION,
    "Food recommendations",
    "Practical notes and tips",
];

/// Lodging is requested unless the trip is known to fit in one day.
fn wants_lodging(duration: Option<TripDuration>) -> bool {
    match duration {
        None | Some(TripDuration::Custom) => true,
        Some(d) => d.is_multi_day(),
    }
}

/// Build the prompt that asks the service for a full itinerary.
pub fn build_itinerary_prompt(plan: &ItineraryPlan) -> String {
    let mode = plan.travel_mode.map_or(NOT_SPECIFIED, |m| m.label());
    let duration = plan.duration.map_or(NOT_SPECIFIED, |d| d.label());
    let labels = plan.preferences.labels();
    let preferences = if labels.is_empty() {
        NO_PREFERENCE.to_string()
    } else {
        labels.join(", ")
    };

    let mut prompt = String::from("Please plan a detailed travel itinerary for me:\n");
    let _ = writeln!(prompt, "Origin: {}", plan.start_point.trim());
    let _ = writeln!(prompt, "Destination: {}", plan.end_point.trim());
    let _ = writeln!(prompt, "Travel date: {}", plan.travel_date.trim());
    let _ = writeln!(prompt, "Travel mode: {mode}");
    let _ = writeln!(prompt, "Expected duration: {duration}");
    if let Some(waypoints) = plan.waypoints.as_deref().map(str::trim) {
        if !waypoints.is_empty() {
            let _ = writeln!(prompt, "Stops along the way: {waypoints}");
        }
    }
    let _ = writeln!(prompt, "Preferences: {preferences}");

    prompt.push_str("\nPlease include:\n");
    let lodging = wants_lodging(plan.duration);
    let sections = REQUESTED_SECTIONS
        .iter()
        .filter(|s| lodging || **s != LODGING_SECTION);
    for (i, section) in sections.enumerate() {
        let _ = writeln!(prompt, "{}. {section}", i + 1);
    }
    prompt.push_str("\nOrganise the answer in a clear, easy-to-read format.");
    prompt
}
