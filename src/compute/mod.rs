//! Compute dispatch seam.
//!
//! Every heavy pass is an element-parallel kernel: each voxel or texel is
//! computed independently. The only shared state inside a pass is the global
//! min/max reduction of the cellular noise raw pass, which uses atomic
//! min/max and is therefore order independent.
//!
//! Two devices implement the seam:
//! - [`CpuDevice`]: rayon parallel iterators (default, used by tests)
//! - [`GpuDevice`]: wgpu compute shaders with staging-buffer readback

mod cpu;
mod gpu;
pub mod kernels;

use std::ops::Deref;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

use crate::error::Result;
use crate::field::{PlanarField, VolumetricField, Voxel};
use crate::params::{FractalNoiseConfig, NoiseLayerConfig};

pub use cpu::CpuDevice;
pub use gpu::GpuDevice;

/// Threads per axis of a volume workgroup (4³ = 64 invocations)
pub const VOLUME_WORKGROUP_SIZE: u32 = 4;

/// Threads per axis of a 2D workgroup (16² = 256 invocations)
pub const PLANE_WORKGROUP_SIZE: u32 = 16;

/// Workgroups needed to cover `resolution` elements along one axis
pub fn workgroup_count(resolution: u32, group_size: u32) -> u32 {
    resolution.div_ceil(group_size)
}

/// A backend able to run the noise and slicing kernels.
///
/// All calls block until the work has completed. Implementations must not
/// start phase 2 of [`dispatch_worley`](Self::dispatch_worley) before every
/// phase 1 invocation has finished and its min/max contribution is visible.
pub trait ComputeDevice: Send + Sync {
    /// Human-readable backend name
    fn label(&self) -> &str;

    /// Dispatch/readback instrumentation
    fn stats(&self) -> &DispatchStats;

    /// Raw cellular pass + normalisation pass for one layer.
    ///
    /// Writes only `job.params.channel`; returns the raw bounds from phase 1.
    fn dispatch_worley(&self, field: &mut VolumetricField, job: &WorleyJob<'_>)
        -> Result<RawBounds>;

    /// Single fractal pass over every texel
    fn dispatch_weather_map(&self, map: &mut PlanarField, job: &WeatherMapJob<'_>) -> Result<()>;

    /// One slice dispatch and one synchronous readback per depth layer
    fn extract_slices(&self, field: &VolumetricField) -> Result<Vec<Vec<Voxel>>>;

    /// Copy a whole volume into a target of identical resolution
    fn copy_volume(&self, source: &VolumetricField, target: &mut VolumetricField) -> Result<()>;
}

#[derive(Debug, Default)]
struct Counters {
    dispatches: AtomicU64,
    readbacks: AtomicU64,
    transient_created: AtomicU64,
    transient_live: AtomicUsize,
}

/// Shared counters for dispatches, readbacks and transient buffer lifetimes
#[derive(Debug, Clone, Default)]
pub struct DispatchStats(Arc<Counters>);

impl DispatchStats {
    pub fn dispatches(&self) -> u64 {
        self.0.dispatches.load(Ordering::Relaxed)
    }

    pub fn readbacks(&self) -> u64 {
        self.0.readbacks.load(Ordering::Relaxed)
    }

    /// Transient buffers allocated so far
    pub fn transient_created(&self) -> u64 {
        self.0.transient_created.load(Ordering::Relaxed)
    }

    /// Transient buffers not yet released
    pub fn transient_live(&self) -> usize {
        self.0.transient_live.load(Ordering::Relaxed)
    }

    pub(crate) fn record_dispatch(&self) {
        self.0.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_readback(&self) {
        self.0.readbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Wrap per-call data so its release is tracked
    pub fn transient<T>(&self, label: &'static str, data: Vec<T>) -> TransientBuffer<T> {
        self.0.transient_created.fetch_add(1, Ordering::Relaxed);
        self.0.transient_live.fetch_add(1, Ordering::Relaxed);
        log::trace!("transient buffer '{}' acquired ({} elements)", label, data.len());
        TransientBuffer {
            label,
            data,
            stats: self.clone(),
        }
    }
}

/// Per-call buffer released when dropped, on every exit path
pub struct TransientBuffer<T> {
    label: &'static str,
    data: Vec<T>,
    stats: DispatchStats,
}

impl<T> Deref for TransientBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T> Drop for TransientBuffer<T> {
    fn drop(&mut self) {
        self.stats.0.transient_live.fetch_sub(1, Ordering::Relaxed);
        log::trace!("transient buffer '{}' released", self.label);
    }
}

/// Order-preserving map from `f32` to `u32`, so unsigned atomic min/max
/// orders floats correctly (negatives included).
#[inline]
pub fn sortable_bits(value: f32) -> u32 {
    let bits = value.to_bits();
    if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000
    }
}

/// Inverse of [`sortable_bits`]
#[inline]
pub fn from_sortable_bits(sortable: u32) -> f32 {
    if sortable & 0x8000_0000 != 0 {
        f32::from_bits(sortable & 0x7fff_ffff)
    } else {
        f32::from_bits(!sortable)
    }
}

/// Global raw-value bounds accumulated across a whole volume
pub struct MinMaxAccumulator {
    words: TransientBuffer<AtomicU32>,
}

impl MinMaxAccumulator {
    /// Initial words: min = u32::MAX, max = 0
    pub const INITIAL: [u32; 2] = [u32::MAX, 0];

    pub fn new(stats: &DispatchStats) -> Self {
        let words = Self::INITIAL.iter().map(|&w| AtomicU32::new(w)).collect();
        Self {
            words: stats.transient("min_max", words),
        }
    }

    /// Fold one raw value into the bounds
    #[inline]
    pub fn record(&self, value: f32) {
        let bits = sortable_bits(value);
        self.words[0].fetch_min(bits, Ordering::Relaxed);
        self.words[1].fetch_max(bits, Ordering::Relaxed);
    }

    /// Merge sortable words reduced elsewhere (GPU readback)
    pub fn merge_words(&self, words: [u32; 2]) {
        self.words[0].fetch_min(words[0], Ordering::AcqRel);
        self.words[1].fetch_max(words[1], Ordering::AcqRel);
    }

    /// Current raw words, for upload
    pub fn words(&self) -> [u32; 2] {
        [
            self.words[0].load(Ordering::Acquire),
            self.words[1].load(Ordering::Acquire),
        ]
    }

    pub fn bounds(&self) -> RawBounds {
        let [lo, hi] = self.words();
        RawBounds {
            min: from_sortable_bits(lo),
            max: from_sortable_bits(hi),
        }
    }
}

/// Raw bounds of one layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawBounds {
    pub min: f32,
    pub max: f32,
}

impl RawBounds {
    /// min == max: the layer is constant and carries no information
    pub fn is_degenerate(&self) -> bool {
        !(self.max > self.min)
    }

    /// Remap a raw value from [min, max] to [0, 1]; degenerate bounds map to 0
    #[inline]
    pub fn normalize(&self, value: f32) -> f32 {
        if self.is_degenerate() {
            0.0
        } else {
            (value - self.min) / (self.max - self.min)
        }
    }
}

/// Uniform block of the cellular noise kernels
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct WorleyParams {
    pub resolution: u32,
    pub cell_counts: [u32; 3],
    pub persistence: f32,
    pub tile: u32,
    pub invert: u32,
    pub channel: u32,
}

impl WorleyParams {
    /// Clamped kernel parameters for one layer
    pub fn from_layer(layer: &NoiseLayerConfig, resolution: u32) -> Self {
        Self {
            resolution,
            cell_counts: layer.clamped_divisions(),
            persistence: layer.persistence,
            tile: layer.clamped_tile(),
            invert: layer.invert as u32,
            channel: layer.channel.index() as u32,
        }
    }
}

/// Inputs of one cellular noise layer dispatch
pub struct WorleyJob<'a> {
    pub params: WorleyParams,
    /// Feature points for scales A, B, C
    pub points: [&'a [Vec3]; 3],
    pub bounds: &'a MinMaxAccumulator,
}

/// Uniform block of the weather map kernel.
///
/// The seed only reaches the kernel through the per-octave offsets.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct WeatherMapParams {
    pub octave_count: u32,
    pub scale: f32,
    pub lacunarity: f32,
    pub persistence: f32,
    pub resolution: u32,
    pub _padding: u32,
    /// Constant domain shift (config offset + external height offset)
    pub offset: [f32; 2],
}

impl WeatherMapParams {
    pub fn new(config: &FractalNoiseConfig, resolution: u32, offset: glam::Vec2) -> Self {
        Self {
            octave_count: config.clamped_octaves(),
            scale: config.base_scale,
            lacunarity: config.lacunarity,
            persistence: config.persistence,
            resolution,
            _padding: 0,
            offset: offset.to_array(),
        }
    }
}

/// Inputs of the weather map dispatch
pub struct WeatherMapJob<'a> {
    pub params: WeatherMapParams,
    /// One 4D random offset per octave
    pub offsets: &'a [Vec4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sortable_bits_preserve_order() {
        let values = [-1000.5, -1.0, -0.25, -0.0, 0.0, 1e-8, 0.5, 1.0, 42.0];
        for pair in values.windows(2) {
            assert!(sortable_bits(pair[0]) <= sortable_bits(pair[1]), "{:?}", pair);
        }
        for v in values {
            assert_eq!(from_sortable_bits(sortable_bits(v)), v);
        }
    }

    #[test]
    fn test_accumulator_tracks_bounds() {
        let stats = DispatchStats::default();
        let acc = MinMaxAccumulator::new(&stats);
        assert_eq!(acc.words(), MinMaxAccumulator::INITIAL);

        for v in [0.3, -0.2, 0.9, 0.1] {
            acc.record(v);
        }
        assert_eq!(acc.bounds(), RawBounds { min: -0.2, max: 0.9 });
    }

    #[test]
    fn test_transient_buffers_release_on_drop() {
        let stats = DispatchStats::default();
        {
            let _points = stats.transient("points", vec![Vec3::ZERO; 8]);
            let _acc = MinMaxAccumulator::new(&stats);
            assert_eq!(stats.transient_live(), 2);
        }
        assert_eq!(stats.transient_live(), 0);
        assert_eq!(stats.transient_created(), 2);
    }

    #[test]
    fn test_degenerate_bounds_normalize_to_zero() {
        let flat = RawBounds { min: 0.4, max: 0.4 };
        assert!(flat.is_degenerate());
        assert_eq!(flat.normalize(0.4), 0.0);

        let bounds = RawBounds { min: 0.2, max: 0.6 };
        assert_eq!(bounds.normalize(0.2), 0.0);
        assert_eq!(bounds.normalize(0.6), 1.0);
    }

    #[test]
    fn test_workgroup_count_rounds_up() {
        assert_eq!(workgroup_count(132, VOLUME_WORKGROUP_SIZE), 33);
        assert_eq!(workgroup_count(512, PLANE_WORKGROUP_SIZE), 32);
        assert_eq!(workgroup_count(17, PLANE_WORKGROUP_SIZE), 2);
    }
}
