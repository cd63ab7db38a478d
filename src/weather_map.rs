//! 2D fractal weather (coverage) map.

use std::sync::Arc;

use glam::{Vec2, Vec3, Vec4};
use rand::Rng;

use crate::compute::{ComputeDevice, WeatherMapJob, WeatherMapParams};
use crate::error::Result;
use crate::field::PlanarField;
use crate::params::{FractalNoiseConfig, WeatherMapSettings};
use crate::sampler::point_rng;

/// Half-extent of the random per-octave offsets
const OFFSET_RANGE: f32 = 1000.0;

/// Seeded per-octave 4D offsets: `(u·2 − 1)·1000 + origin`.
///
/// The origin has no w component, so w stays in [-1000, 1000).
pub fn octave_offsets(seed: u32, octaves: u32, origin: Vec3) -> Vec<Vec4> {
    let mut rng = point_rng(seed);
    let origin = origin.extend(0.0);
    (0..octaves)
        .map(|_| {
            let u = Vec4::new(rng.gen(), rng.gen(), rng.gen(), rng.gen());
            (u * 2.0 - Vec4::ONE) * OFFSET_RANGE + origin
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
struct MapKey {
    config: FractalNoiseConfig,
    domain_origin: Vec3,
    extra_offset: Vec2,
}

pub struct WeatherMapSynthesizer {
    device: Arc<dyn ComputeDevice>,
    resolution: u32,
    map: Option<PlanarField>,
    generated_for: Option<MapKey>,
}

impl WeatherMapSynthesizer {
    pub fn new(device: Arc<dyn ComputeDevice>, resolution: u32) -> Self {
        Self {
            device,
            resolution,
            map: None,
            generated_for: None,
        }
    }

    pub fn from_settings(device: Arc<dyn ComputeDevice>, settings: &WeatherMapSettings) -> Self {
        Self::new(device, settings.resolution)
    }

    pub fn map(&self) -> Option<&PlanarField> {
        self.map.as_ref().filter(|_| self.generated_for.is_some())
    }

    /// Force regeneration on the next `synthesize`
    pub fn invalidate(&mut self) {
        self.generated_for = None;
    }

    /// Generate the map, or return the cached one if the inputs are unchanged.
    ///
    /// `domain_origin` is the container position; `extra_vertical_offset` is
    /// the renderer's height offset added to the configured domain offset.
    pub fn synthesize(
        &mut self,
        config: &FractalNoiseConfig,
        domain_origin: Vec3,
        extra_vertical_offset: Vec2,
    ) -> Result<&PlanarField> {
        let key = MapKey {
            config: config.clone(),
            domain_origin,
            extra_offset: extra_vertical_offset,
        };
        let resolution = self.resolution;
        let cached = self.generated_for.as_ref() == Some(&key)
            && self.map.as_ref().is_some_and(|m| m.resolution() == resolution);

        if !cached {
            self.generated_for = None;
            if config.octave_count != config.clamped_octaves() {
                log::warn!(
                    "octave count {} clamped to {}",
                    config.octave_count,
                    config.clamped_octaves()
                );
            }

            let octaves = config.clamped_octaves();
            let stats = self.device.stats();
            let offsets = stats.transient(
                "octave_offsets",
                octave_offsets(config.seed, octaves, domain_origin),
            );
            let job = WeatherMapJob {
                params: WeatherMapParams::new(
                    config,
                    resolution,
                    config.domain_offset + extra_vertical_offset,
                ),
                offsets: &offsets,
            };

            let map = match self.map.take() {
                Some(map) if map.resolution() == resolution => map,
                _ => PlanarField::new(resolution),
            };
            let map = self.map.insert(map);
            self.device.dispatch_weather_map(map, &job)?;

            self.generated_for = Some(key);
            log::info!(
                "generated {}² weather map ({} octaves) on {}",
                resolution,
                octaves,
                self.device.label()
            );
        }

        Ok(self.map.get_or_insert_with(|| PlanarField::new(resolution)))
    }
}
