//! Host-facing cloud system: owns the generated fields and the preset blend,
//! and hands everything the renderer needs to it once per frame.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

use crate::assets::AssetStore;
use crate::atmosphere::{AtmosphereStateInterpolator, PresetLibrary};
use crate::compute::ComputeDevice;
use crate::error::{Error, Result};
use crate::field::{PlanarField, VolumetricField};
use crate::params::{AtmosphereValues, CloudConfig, CloudState};
use crate::weather::WeatherObservation;
use crate::weather_map::WeatherMapSynthesizer;
use crate::worley::VolumetricNoiseSynthesizer;

/// Per-frame renderer parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudRenderParams {
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub shape_offset: Vec3,
    pub shape_noise_weights: Vec4,
    /// (forward scattering, back scattering, base brightness, phase factor)
    pub phase_params: Vec4,
    pub cloud_scale: f32,
    pub density_offset: f32,
    pub density_multiplier: f32,
    pub light_steps: u32,
    pub light_absorption_towards_sun: f32,
    pub light_absorption_through_cloud: f32,
    pub darkness_threshold: f32,
    pub ray_offset_strength: f32,
    pub speed: f32,
    pub fall_off_distance: f32,
    pub fog_distance_threshold: f32,
    pub sky_color_a: Vec4,
    pub sky_color_b: Vec4,
    pub exposure: f32,
    /// Seconds since `initialize`
    pub time: f32,
}

/// Uniform block layout of [`CloudRenderParams`] (std140-compatible)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CloudUniforms {
    pub bounds_min: [f32; 4],
    pub bounds_max: [f32; 4],
    pub shape_offset: [f32; 4],
    pub shape_noise_weights: [f32; 4],
    pub phase_params: [f32; 4],
    pub sky_color_a: [f32; 4],
    pub sky_color_b: [f32; 4],
    pub cloud_scale: f32,
    pub density_offset: f32,
    pub density_multiplier: f32,
    pub darkness_threshold: f32,
    pub light_absorption_towards_sun: f32,
    pub light_absorption_through_cloud: f32,
    pub ray_offset_strength: f32,
    pub speed: f32,
    pub fall_off_distance: f32,
    pub fog_distance_threshold: f32,
    pub exposure: f32,
    pub light_steps: u32,
    pub time: f32,
    pub _padding: [f32; 3],
}

impl CloudRenderParams {
    pub fn to_uniforms(&self) -> CloudUniforms {
        CloudUniforms {
            bounds_min: self.bounds_min.extend(0.0).to_array(),
            bounds_max: self.bounds_max.extend(0.0).to_array(),
            shape_offset: self.shape_offset.extend(0.0).to_array(),
            shape_noise_weights: self.shape_noise_weights.to_array(),
            phase_params: self.phase_params.to_array(),
            sky_color_a: self.sky_color_a.to_array(),
            sky_color_b: self.sky_color_b.to_array(),
            cloud_scale: self.cloud_scale,
            density_offset: self.density_offset,
            density_multiplier: self.density_multiplier,
            darkness_threshold: self.darkness_threshold,
            light_absorption_towards_sun: self.light_absorption_towards_sun,
            light_absorption_through_cloud: self.light_absorption_through_cloud,
            ray_offset_strength: self.ray_offset_strength,
            speed: self.speed,
            fall_off_distance: self.fall_off_distance,
            fog_distance_threshold: self.fog_distance_threshold,
            exposure: self.exposure,
            light_steps: self.light_steps,
            time: self.time,
            _padding: [0.0; 3],
        }
    }
}

/// What the renderer reads for one frame
pub struct FrameOutputs<'a> {
    pub volume: &'a VolumetricField,
    pub weather_map: &'a PlanarField,
    pub params: CloudRenderParams,
}

pub struct CloudSystem {
    config: CloudConfig,
    device: Arc<dyn ComputeDevice>,
    shape: VolumetricNoiseSynthesizer,
    weather_map: WeatherMapSynthesizer,
    presets: PresetLibrary,
    interpolator: AtmosphereStateInterpolator,
    time: f32,
}

impl CloudSystem {
    /// `assets` is optional: without it the shape volume is always synthesised
    pub fn new(
        device: Arc<dyn ComputeDevice>,
        config: CloudConfig,
        assets: Option<Arc<AssetStore>>,
    ) -> Result<Self> {
        config.validate().map_err(Error::Config)?;

        let mut shape = VolumetricNoiseSynthesizer::new(device.clone(), config.volume.clone());
        if let Some(assets) = assets {
            shape = shape.with_assets(assets);
        }
        let weather_map = WeatherMapSynthesizer::from_settings(device.clone(), &config.weather_map);

        let mut presets = PresetLibrary::with_overrides(&config.presets);
        let initial = presets.visualize(CloudState::Clear);
        let interpolator =
            AtmosphereStateInterpolator::new(initial, config.transition.change_time_s);

        Ok(Self {
            config,
            device,
            shape,
            weather_map,
            presets,
            interpolator,
            time: 0.0,
        })
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    pub fn device(&self) -> &Arc<dyn ComputeDevice> {
        &self.device
    }

    pub fn presets(&self) -> &PresetLibrary {
        &self.presets
    }

    pub fn atmosphere(&self) -> AtmosphereValues {
        self.interpolator.current()
    }

    /// Generate both fields (or reuse cached ones)
    pub fn initialize(&mut self) -> Result<()> {
        self.time = 0.0;
        self.shape.synthesize(&self.config.layers)?;
        self.weather_map.synthesize(
            &self.config.weather_map.noise,
            self.config.render.container_position,
            self.config.render.height_offset,
        )?;
        log::info!("cloud system initialized on {}", self.device.label());
        Ok(())
    }

    /// Start blending towards the preset of `state`
    pub fn request_transition(&mut self, state: CloudState) {
        log::info!("cloud state -> {}", state.name());
        let target = self.presets.visualize(state);
        self.interpolator.request_transition(target);
    }

    /// Classify an observation and blend towards the resulting state
    pub fn apply_observation(&mut self, observation: &WeatherObservation) -> CloudState {
        let state = observation.cloud_state();
        self.request_transition(state);
        state
    }

    /// Force the weather map to regenerate on the next frame
    pub fn invalidate_weather_map(&mut self) {
        self.weather_map.invalidate();
    }

    /// Advance the blend and hand out this frame's fields and parameters.
    ///
    /// Fields are only regenerated when their inputs changed.
    pub fn render_frame(&mut self, dt: f32) -> Result<FrameOutputs<'_>> {
        self.time += dt.max(0.0);
        let atmosphere = self.interpolator.tick(dt);
        let params = self.render_params(atmosphere);

        let volume = self.shape.synthesize(&self.config.layers)?;
        let weather_map = self.weather_map.synthesize(
            &self.config.weather_map.noise,
            self.config.render.container_position,
            self.config.render.height_offset,
        )?;

        Ok(FrameOutputs {
            volume,
            weather_map,
            params,
        })
    }

    fn render_params(&self, atmosphere: AtmosphereValues) -> CloudRenderParams {
        let render = &self.config.render;
        let (bounds_min, bounds_max) = render.bounds();

        CloudRenderParams {
            bounds_min,
            bounds_max,
            shape_offset: render.shape_offset,
            shape_noise_weights: render.shape_noise_weights,
            phase_params: Vec4::new(
                render.forward_scattering,
                render.back_scattering,
                atmosphere.base_brightness,
                atmosphere.phase_factor,
            ),
            cloud_scale: atmosphere.cloud_scale,
            density_offset: atmosphere.density_offset,
            density_multiplier: atmosphere.density_multiplier,
            light_steps: render.light_steps,
            light_absorption_towards_sun: render.light_absorption_towards_sun,
            light_absorption_through_cloud: atmosphere.absorption_through_cloud,
            darkness_threshold: atmosphere.darkness_threshold,
            ray_offset_strength: render.ray_offset_strength,
            speed: render.speed,
            fall_off_distance: render.fall_off_distance,
            fog_distance_threshold: render.fog_distance_threshold,
            sky_color_a: render.sky_color_a,
            sky_color_b: render.sky_color_b,
            exposure: atmosphere.exposure,
            time: self.time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::CpuDevice;
    use crate::params::{AtmospherePreset, NoiseLayerConfig};

    fn small_config() -> CloudConfig {
        let mut config = CloudConfig::default();
        config.volume.resolution = 6;
        config.volume.load_on_create = false;
        config.weather_map.resolution = 8;
        config.layers = NoiseLayerConfig::reference_layers()
            .into_iter()
            .map(|layer| NoiseLayerConfig {
                cell_divisions: [2, 3, 4],
                ..layer
            })
            .collect();
        config.transition.change_time_s = 1.0;
        config
    }

    #[test]
    fn test_frames_reuse_generated_fields() {
        let device = Arc::new(CpuDevice::new());
        let mut system = CloudSystem::new(device.clone(), small_config(), None).unwrap();
        system.initialize().unwrap();
        let dispatches = device.stats().dispatches();
        assert_eq!(dispatches, 3 * 2 + 1);

        let frame = system.render_frame(0.016).unwrap();
        assert_eq!(frame.volume.resolution(), 6);
        assert_eq!(frame.weather_map.resolution(), 8);
        assert_eq!(device.stats().dispatches(), dispatches);
    }

    #[test]
    fn test_transition_blends_over_frames() {
        let device = Arc::new(CpuDevice::new());
        let mut system = CloudSystem::new(device, small_config(), None).unwrap();
        system.initialize().unwrap();

        let clear = AtmospherePreset::builtin(CloudState::Clear).values;
        let storm = AtmospherePreset::builtin(CloudState::Thunderstorm).values;
        assert_eq!(system.atmosphere(), clear);

        system.request_transition(CloudState::Thunderstorm);
        let mid = system.render_frame(0.5).unwrap().params;
        assert!(mid.density_multiplier > clear.density_multiplier);
        assert!(mid.density_multiplier < storm.density_multiplier);

        let end = system.render_frame(0.6).unwrap().params;
        assert_eq!(end.density_multiplier, storm.density_multiplier);
        assert_eq!(system.presets().last_visualized(), Some(CloudState::Thunderstorm));
    }

    #[test]
    fn test_observation_drives_state() {
        let device = Arc::new(CpuDevice::new());
        let mut system = CloudSystem::new(device, small_config(), None).unwrap();
        let observation = WeatherObservation {
            descriptions: vec!["scattered clouds".to_string()],
            cloud_percent: 60,
            ..Default::default()
        };
        assert_eq!(system.apply_observation(&observation), CloudState::Broken);
    }

    #[test]
    fn test_render_params_use_container_bounds() {
        let device = Arc::new(CpuDevice::new());
        let mut system = CloudSystem::new(device, small_config(), None).unwrap();
        let params = system.render_frame(0.0).unwrap().params;

        let (min, max) = system.config().render.bounds();
        assert_eq!(params.bounds_min, min);
        assert_eq!(params.bounds_max, max);

        let uniforms = params.to_uniforms();
        assert_eq!(std::mem::size_of::<CloudUniforms>() % 16, 0);
        assert_eq!(uniforms.bounds_max[..3], max.to_array());
        assert_eq!(uniforms.light_steps, params.light_steps);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = small_config();
        config.volume.resolution = 0;
        let result = CloudSystem::new(Arc::new(CpuDevice::new()), config, None);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
