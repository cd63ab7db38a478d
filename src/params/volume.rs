//! Field resolutions and asset naming.

use serde::{Deserialize, Serialize};

use super::FractalNoiseConfig;

/// Shape volume resolution of the reference configuration (voxels per axis)
pub const SHAPE_RESOLUTION: u32 = 132;

/// Weather map resolution of the reference configuration (texels per side)
pub const WEATHER_MAP_RESOLUTION: u32 = 512;

/// Persisted name of the shape volume
pub const SHAPE_ASSET_NAME: &str = "Shape Texture";

/// Volumetric (shape) field settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeSettings {
    /// Voxels per axis (cubic)
    pub resolution: u32,

    /// Asset name loaded when the field is (re)created and written by `save`
    pub asset_name: String,

    /// Try the stored asset before synthesising
    pub load_on_create: bool,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            resolution: SHAPE_RESOLUTION,
            asset_name: SHAPE_ASSET_NAME.to_string(),
            load_on_create: true,
        }
    }
}

/// Weather map settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherMapSettings {
    /// Texels per side (square)
    pub resolution: u32,

    pub noise: FractalNoiseConfig,
}

impl Default for WeatherMapSettings {
    fn default() -> Self {
        Self {
            resolution: WEATHER_MAP_RESOLUTION,
            noise: FractalNoiseConfig::default(),
        }
    }
}
