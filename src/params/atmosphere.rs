//! Named cloud states and the scalar presets blended between them.

use serde::{Deserialize, Serialize};

/// Cloud state names, produced by the weather classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CloudState {
    Clear,
    Scattered,
    Broken,
    Overcast,
    LightRain,
    Shower,
    Thunderstorm,
}

impl CloudState {
    pub const ALL: [CloudState; 7] = [
        CloudState::Clear,
        CloudState::Scattered,
        CloudState::Broken,
        CloudState::Overcast,
        CloudState::LightRain,
        CloudState::Shower,
        CloudState::Thunderstorm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CloudState::Clear => "clear",
            CloudState::Scattered => "scattered",
            CloudState::Broken => "broken",
            CloudState::Overcast => "overcast",
            CloudState::LightRain => "light-rain",
            CloudState::Shower => "shower",
            CloudState::Thunderstorm => "thunderstorm",
        }
    }

    /// Parse a state name (case-insensitive, `_` and `-` interchangeable)
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|state| state.name() == normalized || state.name().replace('-', "") == normalized)
    }
}

/// Blendable scalar rendering parameters.
///
/// These are the values the renderer reads each frame; presets hold target
/// values and the interpolator owns the current blend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtmosphereValues {
    /// World-space scale of the shape noise
    pub cloud_scale: f32,

    /// Added to sampled density before the multiplier
    pub density_offset: f32,

    pub density_multiplier: f32,

    /// Minimum transmittance towards the sun (0..1)
    pub darkness_threshold: f32,

    /// Beer-Lambert coefficient along the view ray
    pub absorption_through_cloud: f32,

    /// Phase function floor (0..1)
    pub base_brightness: f32,

    /// Sky material exposure
    pub exposure: f32,

    /// Phase function blend (0..1)
    pub phase_factor: f32,
}

impl Default for AtmosphereValues {
    fn default() -> Self {
        Self {
            cloud_scale: 0.6,
            density_offset: -4.0,
            density_multiplier: 1.0,
            darkness_threshold: 0.2,
            absorption_through_cloud: 0.85,
            base_brightness: 0.8,
            exposure: 1.3,
            phase_factor: 0.5,
        }
    }
}

impl AtmosphereValues {
    pub const FIELD_COUNT: usize = 8;

    pub fn to_array(&self) -> [f32; Self::FIELD_COUNT] {
        [
            self.cloud_scale,
            self.density_offset,
            self.density_multiplier,
            self.darkness_threshold,
            self.absorption_through_cloud,
            self.base_brightness,
            self.exposure,
            self.phase_factor,
        ]
    }

    pub fn from_array(values: [f32; Self::FIELD_COUNT]) -> Self {
        Self {
            cloud_scale: values[0],
            density_offset: values[1],
            density_multiplier: values[2],
            darkness_threshold: values[3],
            absorption_through_cloud: values[4],
            base_brightness: values[5],
            exposure: values[6],
            phase_factor: values[7],
        }
    }

    /// Component-wise linear interpolation, `t` in [0, 1]
    pub fn lerp(&self, target: &Self, t: f32) -> Self {
        let from = self.to_array();
        let to = target.to_array();
        let mut out = [0.0; Self::FIELD_COUNT];
        for i in 0..Self::FIELD_COUNT {
            out[i] = from[i] + (to[i] - from[i]) * t;
        }
        Self::from_array(out)
    }
}

/// Author-defined target values for one cloud state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtmospherePreset {
    pub state: CloudState,
    #[serde(flatten)]
    pub values: AtmosphereValues,
}

impl AtmospherePreset {
    /// Built-in preset for a state
    pub fn builtin(state: CloudState) -> Self {
        let base = AtmosphereValues::default();
        let values = match state {
            CloudState::Clear => AtmosphereValues {
                density_offset: -6.5,
                density_multiplier: 0.4,
                exposure: 1.6,
                ..base
            },
            CloudState::Scattered => AtmosphereValues {
                density_offset: -4.5,
                density_multiplier: 0.8,
                exposure: 1.4,
                ..base
            },
            CloudState::Broken => AtmosphereValues {
                density_offset: -3.0,
                density_multiplier: 1.1,
                ..base
            },
            CloudState::Overcast => AtmosphereValues {
                cloud_scale: 0.45,
                density_offset: -1.0,
                density_multiplier: 1.5,
                darkness_threshold: 0.12,
                base_brightness: 0.6,
                exposure: 1.0,
                ..base
            },
            CloudState::LightRain => AtmosphereValues {
                cloud_scale: 0.45,
                density_offset: -0.5,
                density_multiplier: 1.8,
                darkness_threshold: 0.08,
                absorption_through_cloud: 1.1,
                base_brightness: 0.5,
                exposure: 0.9,
                phase_factor: 0.4,
            },
            CloudState::Shower => AtmosphereValues {
                cloud_scale: 0.4,
                density_offset: 0.0,
                density_multiplier: 2.2,
                darkness_threshold: 0.05,
                absorption_through_cloud: 1.3,
                base_brightness: 0.4,
                exposure: 0.8,
                phase_factor: 0.35,
            },
            CloudState::Thunderstorm => AtmosphereValues {
                cloud_scale: 0.35,
                density_offset: 0.5,
                density_multiplier: 3.0,
                darkness_threshold: 0.02,
                absorption_through_cloud: 1.6,
                base_brightness: 0.25,
                exposure: 0.6,
                phase_factor: 0.3,
            },
        };
        Self { state, values }
    }
}

/// Blend timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionSettings {
    /// Duration of a preset crossfade (seconds)
    pub change_time_s: f32,
}

impl Default for TransitionSettings {
    fn default() -> Self {
        Self { change_time_s: 5.0 }
    }
}
