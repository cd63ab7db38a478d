//! Parameter definitions with units and documented semantics.
//!
//! Authoring values live here with:
//! - Units (world units, seconds, cells per axis)
//! - Documented ranges and clamping rules
//! - serde support so a whole setup can be loaded from TOML

mod atmosphere;
mod config;
mod noise;
mod render;
mod volume;

// Re-export all types
pub use atmosphere::{AtmospherePreset, AtmosphereValues, CloudState, TransitionSettings};
pub use config::CloudConfig;
pub use noise::{
    Channel, FractalNoiseConfig, NoiseLayerConfig, MAX_CELL_DIVISIONS, MAX_OCTAVES, MIN_OCTAVES,
};
pub use render::CloudRenderSettings;
pub use volume::{
    VolumeSettings, WeatherMapSettings, SHAPE_ASSET_NAME, SHAPE_RESOLUTION,
    WEATHER_MAP_RESOLUTION,
};
