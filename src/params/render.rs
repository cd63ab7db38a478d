//! Static cloud rendering configuration handed to the external renderer.

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Renderer parameters that are not part of a blendable preset
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudRenderSettings {
    /// Cloud container centre (world units)
    pub container_position: Vec3,

    /// Cloud container extents (world units)
    pub container_scale: Vec3,

    /// Offset applied to shape noise sampling
    pub shape_offset: Vec3,

    /// Per-channel weights of the shape volume
    pub shape_noise_weights: Vec4,

    /// Vertical domain shift forwarded to the weather map
    pub height_offset: Vec2,

    /// Blue-noise ray start jitter strength
    pub ray_offset_strength: f32,

    /// Absorption along light rays towards the sun (0..1)
    pub light_absorption_towards_sun: f32,

    /// Light march steps per sample
    pub light_steps: u32,

    /// Forward scattering lobe (0..1)
    pub forward_scattering: f32,

    /// Back scattering lobe (0..1)
    pub back_scattering: f32,

    /// Distance fog threshold (0..0.01)
    pub fog_distance_threshold: f32,

    pub sky_color_a: Vec4,
    pub sky_color_b: Vec4,

    /// Cloud drift speed (world units per second)
    pub speed: f32,

    /// Edge falloff distance inside the container (world units)
    pub fall_off_distance: f32,
}

impl Default for CloudRenderSettings {
    fn default() -> Self {
        Self {
            container_position: Vec3::new(0.0, 120.0, 0.0),
            container_scale: Vec3::new(800.0, 60.0, 800.0),
            shape_offset: Vec3::ZERO,
            shape_noise_weights: Vec4::new(1.0, 0.5, 0.25, 0.0),
            height_offset: Vec2::ZERO,
            ray_offset_strength: 10.0,
            light_absorption_towards_sun: 0.35,
            light_steps: 8,
            forward_scattering: 0.8,
            back_scattering: 0.3,
            fog_distance_threshold: 0.0001,
            sky_color_a: Vec4::new(0.55, 0.7, 0.95, 1.0),
            sky_color_b: Vec4::new(0.2, 0.35, 0.7, 1.0),
            speed: 1.0,
            fall_off_distance: 50.0,
        }
    }
}

impl CloudRenderSettings {
    /// World-space bounds of the cloud container
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let half = self.container_scale / 2.0;
        (
            self.container_position - half,
            self.container_position + half,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_from_container() {
        let settings = CloudRenderSettings {
            container_position: Vec3::new(10.0, 100.0, -10.0),
            container_scale: Vec3::new(20.0, 40.0, 60.0),
            ..Default::default()
        };
        let (min, max) = settings.bounds();
        assert_eq!(min, Vec3::new(0.0, 80.0, -40.0));
        assert_eq!(max, Vec3::new(20.0, 120.0, 20.0));
    }
}
