//! Itinerary form data collected before a plan is requested.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// How the traveller gets around.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    Driving,
    Walking,
    Transit,
    Cycling,
}

impl TravelMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Driving => "Driving",
            Self::Walking => "Walking",
            Self::Transit => "Public transit",
            Self::Cycling => "Cycling",
        }
    }
}

/// Expected trip length.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TripDuration {
    HalfDay,
    OneDay,
    TwoDays,
    ThreeDays,
    Week,
    Custom,
}

impl TripDuration {
    pub fn label(self) -> &'static str {
        match self {
            Self::HalfDay => "Half a day",
            Self::OneDay => "One day",
            Self::TwoDays => "Two days",
            Self::ThreeDays => "Three days",
            Self::Week => "One week",
            Self::Custom => "Custom",
        }
    }

    /// Whether the trip needs somewhere to sleep.
    pub fn is_multi_day(self) -> bool {
        matches!(self, Self::TwoDays | Self::ThreeDays | Self::Week)
    }
}

/// Parse a unit variant from its wire name, e.g. `"half-day"`.
fn from_wire_name<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, serde_json::Error> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
}

impl FromStr for TravelMode {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        from_wire_name(s)
    }
}

impl FromStr for TripDuration {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        from_wire_name(s)
    }
}

/// Kinds of experiences the traveller asked for.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Preferences {
    pub historical: bool,
    pub natural: bool,
    pub food: bool,
    pub shopping: bool,
}

impl Preferences {
    pub fn labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if self.historical {
            labels.push("historical and cultural sites");
        }
        if self.natural {
            labels.push("natural scenery");
        }
        if self.food {
            labels.push("local food");
        }
        if self.shopping {
            labels.push("shopping and entertainment");
        }
        labels
    }
}

/// The itinerary form, in the shape the front end submits it.
///
/// Unselected mode and duration arrive as empty strings and decode to `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryPlan {
    pub start_point: String,
    pub end_point: String,
    pub travel_date: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub travel_mode: Option<TravelMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waypoints: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub duration: Option<TripDuration>,
    #[serde(default)]
    pub preferences: Preferences,
}

fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) if s.is_empty() => Ok(None),
        Some(other) => T::deserialize(other)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
