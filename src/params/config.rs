//! Top-level configuration file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{
    AtmospherePreset, CloudRenderSettings, NoiseLayerConfig, TransitionSettings, VolumeSettings,
    WeatherMapSettings,
};
use crate::error::{Error, Result};

/// Everything the host needs to build a cloud system, loadable from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub volume: VolumeSettings,

    /// One layer per targeted shape channel
    pub layers: Vec<NoiseLayerConfig>,

    pub weather_map: WeatherMapSettings,

    pub render: CloudRenderSettings,

    pub transition: TransitionSettings,

    /// Preset overrides; states without an entry use the built-in values
    pub presets: Vec<AtmospherePreset>,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            volume: VolumeSettings::default(),
            layers: NoiseLayerConfig::reference_layers(),
            weather_map: WeatherMapSettings::default(),
            render: CloudRenderSettings::default(),
            transition: TransitionSettings::default(),
            presets: Vec::new(),
        }
    }
}

impl CloudConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: CloudConfig =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate().map_err(Error::Config)?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Reject values that cannot be clamped into something meaningful.
    ///
    /// Out-of-range divisions, tile factors and octave counts are clamped at
    /// use and are not errors here.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.volume.resolution == 0 {
            return Err("volume resolution must be > 0".to_string());
        }
        if self.weather_map.resolution == 0 {
            return Err("weather map resolution must be > 0".to_string());
        }
        let change_time = self.transition.change_time_s;
        if change_time.is_nan() || change_time < 0.0 {
            return Err(format!(
                "transition time must be >= 0, got {}",
                self.transition.change_time_s
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Channel, CloudState};

    #[test]
    fn test_default_config_is_valid() {
        let config = CloudConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.volume.resolution, 132);
        assert_eq!(config.weather_map.resolution, 512);
        assert_eq!(config.layers.len(), 3);
    }

    #[test]
    fn test_parse_partial_config() {
        let config = CloudConfig::from_toml_str(
            r#"
            [volume]
            resolution = 32

            [[layers]]
            channel = "A"
            seed = 99

            [weather_map.noise]
            seed = 5
            octave_count = 3
            domain_offset = [1.5, -2.0]

            [[presets]]
            state = "Overcast"
            density_multiplier = 4.0
            "#,
        )
        .unwrap();

        assert_eq!(config.volume.resolution, 32);
        assert_eq!(config.volume.asset_name, "Shape Texture");
        assert_eq!(config.layers.len(), 1);
        assert_eq!(config.layers[0].channel, Channel::A);
        assert_eq!(config.weather_map.noise.octave_count, 3);
        assert_eq!(config.weather_map.noise.domain_offset.x, 1.5);
        assert_eq!(config.presets[0].state, CloudState::Overcast);
        assert_eq!(config.presets[0].values.density_multiplier, 4.0);
    }

    #[test]
    fn test_zero_resolution_rejected() {
        let result = CloudConfig::from_toml_str("[volume]\nresolution = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
