//! Mapping from reported weather to a cloud state, plus display helpers.
//!
//! Fetching observations is the host's job; this module only interprets them.

use serde::{Deserialize, Serialize};

use crate::params::CloudState;

/// m/s to miles per hour
pub const MPS_TO_MPH: f64 = 2.23694;

const COMPASS_POINTS: [&str; 16] = [
    "North",
    "North North East",
    "North East",
    "East North East",
    "East",
    "East South East",
    "South East",
    "South South East",
    "South",
    "South South West",
    "South West",
    "West South West",
    "West",
    "West North West",
    "North West",
    "North North West",
];

/// One weather report as the host receives it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherObservation {
    /// Free-text conditions, most significant first (e.g. "light rain")
    pub descriptions: Vec<String>,

    /// Air temperature (Kelvin)
    pub temperature_k: f64,

    /// Wind speed (m/s)
    pub wind_speed_mps: f64,

    /// Wind bearing (degrees, 0 = north)
    pub wind_degrees: f32,

    /// Cloud coverage (percent, 0..=100)
    pub cloud_percent: u32,
}

impl Default for WeatherObservation {
    /// Mild clear day, used when nothing has been received yet
    fn default() -> Self {
        Self {
            descriptions: vec!["clear".to_string()],
            temperature_k: 283.15,
            wind_speed_mps: 5.0,
            wind_degrees: 0.0,
            cloud_percent: 0,
        }
    }
}

impl WeatherObservation {
    /// Cloud state from the first description and the coverage
    pub fn cloud_state(&self) -> CloudState {
        let description = self.descriptions.first().map(String::as_str).unwrap_or("");
        classify(description, self.cloud_percent)
    }

    pub fn temperature_f(&self) -> f64 {
        kelvin_to_fahrenheit(self.temperature_k)
    }

    pub fn wind_mph(&self) -> f64 {
        wind_mph(self.wind_speed_mps)
    }

    pub fn wind_compass(&self) -> &'static str {
        compass_point(self.wind_degrees)
    }
}

/// Keywords win over coverage; coverage below 11 % without a keyword is
/// treated as overcast.
///
/// Keywords match case-sensitively against the lowercase descriptions
/// weather services report.
pub fn classify(description: &str, cloud_percent: u32) -> CloudState {
    if description.contains("clear") {
        return CloudState::Clear;
    }
    if description.contains("thunderstorm") {
        return CloudState::Thunderstorm;
    }
    if description.contains("rain") {
        if description.contains("light") || description.contains("drizzle") {
            return CloudState::LightRain;
        }
        return CloudState::Shower;
    }

    match cloud_percent {
        11..=49 => CloudState::Scattered,
        50..=83 => CloudState::Broken,
        _ => CloudState::Overcast,
    }
}

/// Name of the 16-point compass sector containing `degrees`
pub fn compass_point(degrees: f32) -> &'static str {
    let sector = 360.0 / COMPASS_POINTS.len() as f32;
    let shifted = (degrees + sector / 2.0).rem_euclid(360.0).floor();
    let index = (shifted / sector) as usize % COMPASS_POINTS.len();
    COMPASS_POINTS[index]
}

/// m/s to mph, rounded to two decimals
pub fn wind_mph(mps: f64) -> f64 {
    (mps * MPS_TO_MPH * 100.0).round() / 100.0
}

pub fn kelvin_to_fahrenheit(kelvin: f64) -> f64 {
    (kelvin - 273.15) * 9.0 / 5.0 + 32.0
}
