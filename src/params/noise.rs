//! Noise layer configuration for the volumetric and planar fields.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Editor range for cell divisions per axis
pub const MAX_CELL_DIVISIONS: u32 = 50;

/// Valid octave range for the weather map fractal sum
pub const MIN_OCTAVES: u32 = 1;
pub const MAX_OCTAVES: u32 = 6;

/// Output channel of the 4-channel volumetric field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    R,
    G,
    B,
    A,
}

impl Channel {
    /// Component index inside an RGBA voxel
    pub fn index(self) -> usize {
        match self {
            Channel::R => 0,
            Channel::G => 1,
            Channel::B => 2,
            Channel::A => 3,
        }
    }
}

/// One cellular noise layer, written into a single channel of the shape volume.
///
/// Three Worley scales (coarse → fine) are summed with `persistence` as the
/// falloff weight between scales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseLayerConfig {
    /// Target channel
    pub channel: Channel,

    /// Seed for the feature point stream (shared by all three scales)
    pub seed: u32,

    /// Cells per axis for scales A, B and C (each clamped to 1..=50)
    pub cell_divisions: [u32; 3],

    /// Weight falloff between successive scales (dimensionless)
    pub persistence: f32,

    /// Domain repetitions per axis (≥ 1)
    pub tile_factor: u32,

    /// Output `1 - value` so cell centres are bright
    pub invert: bool,
}

impl Default for NoiseLayerConfig {
    fn default() -> Self {
        Self {
            channel: Channel::R,
            seed: 0,
            cell_divisions: [5, 10, 15],
            persistence: 0.5,
            tile_factor: 1,
            invert: true,
        }
    }
}

impl NoiseLayerConfig {
    pub fn new(channel: Channel, seed: u32) -> Self {
        Self {
            channel,
            seed,
            ..Default::default()
        }
    }

    /// Cell divisions clamped to the authoring range
    pub fn clamped_divisions(&self) -> [u32; 3] {
        self.cell_divisions
            .map(|count| count.clamp(1, MAX_CELL_DIVISIONS))
    }

    /// Tile factor floored at 1
    pub fn clamped_tile(&self) -> u32 {
        self.tile_factor.max(1)
    }

    /// Reference layer set: shape in R, coarse detail in G, fine detail in B
    pub fn reference_layers() -> Vec<NoiseLayerConfig> {
        vec![
            NoiseLayerConfig {
                channel: Channel::R,
                seed: 0,
                cell_divisions: [2, 5, 9],
                persistence: 0.5,
                ..Default::default()
            },
            NoiseLayerConfig {
                channel: Channel::G,
                seed: 1,
                cell_divisions: [5, 10, 15],
                persistence: 0.5,
                ..Default::default()
            },
            NoiseLayerConfig {
                channel: Channel::B,
                seed: 2,
                cell_divisions: [8, 16, 24],
                persistence: 0.6,
                ..Default::default()
            },
        ]
    }
}

/// Fractal (octave) noise settings for the 2D weather map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FractalNoiseConfig {
    /// Seed for the per-octave offsets
    pub seed: u32,

    /// Number of octaves summed (clamped to 1..=6)
    pub octave_count: u32,

    /// Frequency of the first octave (cycles across the map)
    pub base_scale: f32,

    /// Frequency multiplier per octave
    pub lacunarity: f32,

    /// Amplitude multiplier per octave
    pub persistence: f32,

    /// Constant domain shift applied to every octave
    pub domain_offset: Vec2,
}

impl Default for FractalNoiseConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            octave_count: 4,
            base_scale: 1.0,
            lacunarity: 2.0,
            persistence: 0.5,
            domain_offset: Vec2::ZERO,
        }
    }
}

impl FractalNoiseConfig {
    /// Octave count clamped to the valid range
    pub fn clamped_octaves(&self) -> u32 {
        self.octave_count.clamp(MIN_OCTAVES, MAX_OCTAVES)
    }
}
