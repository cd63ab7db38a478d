//! Volume <-> slice stack conversion.
//!
//! A volume of resolution R becomes R images of R×R 16-bit RGBA pixels.
//! Slice z holds voxel (x, y, z) at pixel (x, y).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{ImageBuffer, Rgba};

use crate::compute::ComputeDevice;
use crate::error::{Error, Result};
use crate::field::VolumetricField;

/// One 16-bit RGBA depth slice
pub type Slice = ImageBuffer<Rgba<u16>, Vec<u16>>;

const UNORM_MAX: f32 = u16::MAX as f32;

/// Map [0, 1] to a 16-bit unorm, clamping out-of-range values
#[inline]
pub fn quantize(value: f32) -> u16 {
    (value.clamp(0.0, 1.0) * UNORM_MAX).round() as u16
}

#[inline]
pub fn unquantize(value: u16) -> f32 {
    value as f32 / UNORM_MAX
}

/// Depth-ordered stack of slices
#[derive(Debug, Clone, PartialEq)]
pub struct SliceStack {
    resolution: u32,
    slices: Vec<Slice>,
}

impl SliceStack {
    /// Build from slices; every slice must be R×R and there must be R of them
    pub fn from_slices(slices: Vec<Slice>) -> Result<Self> {
        let resolution = slices.len() as u32;
        if let Some(bad) = slices
            .iter()
            .find(|s| s.width() != resolution || s.height() != resolution)
        {
            return Err(Error::ResolutionMismatch {
                expected: resolution,
                found: bad.width().max(bad.height()),
            });
        }
        Ok(Self { resolution, slices })
    }

    /// Rebuild from a flat depth-major RGBA u16 payload.
    ///
    /// `None` if the payload length does not match `resolution`, including
    /// resolutions whose size does not fit in memory.
    pub(crate) fn from_payload(resolution: u32, payload: Vec<u16>) -> Option<Self> {
        let per_slice = (resolution as usize).checked_pow(2)?.checked_mul(4)?;
        if per_slice.checked_mul(resolution as usize)? != payload.len() {
            return None;
        }
        let slices = payload
            .chunks(per_slice.max(1))
            .map(|chunk| ImageBuffer::from_raw(resolution, resolution, chunk.to_vec()))
            .collect::<Option<Vec<_>>>()?;
        Some(Self { resolution, slices })
    }

    /// Flat depth-major payload: slice, then row, then pixel, then channel
    pub(crate) fn payload(&self) -> impl Iterator<Item = u16> + '_ {
        self.slices.iter().flat_map(|s| s.as_raw().iter().copied())
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn slice(&self, z: u32) -> Option<&Slice> {
        self.slices.get(z as usize)
    }

    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    /// Write every slice as `slice_NNN.png` into `dir`
    pub fn export_png(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let mut written = Vec::with_capacity(self.slices.len());
        for (z, slice) in self.slices.iter().enumerate() {
            let path = dir.join(format!("slice_{:03}.png", z));
            slice.save(&path)?;
            written.push(path);
        }
        log::info!("exported {} slices to {}", written.len(), dir.display());
        Ok(written)
    }
}

/// Encodes fields through a compute device, decodes on the CPU
pub struct VolumeSliceCodec {
    device: Arc<dyn ComputeDevice>,
}

impl VolumeSliceCodec {
    pub fn new(device: Arc<dyn ComputeDevice>) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &Arc<dyn ComputeDevice> {
        &self.device
    }

    /// One slice dispatch and readback per depth layer
    pub fn encode(&self, field: &VolumetricField) -> Result<SliceStack> {
        let resolution = field.resolution();
        let layers = self.device.extract_slices(field)?;

        let slices = layers
            .iter()
            .map(|layer| {
                let raw: Vec<u16> = layer
                    .iter()
                    .flat_map(|voxel| voxel.iter().map(|&c| quantize(c)))
                    .collect();
                ImageBuffer::from_raw(resolution, resolution, raw)
                    .ok_or_else(|| Error::Device("slice readback has wrong size".to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!("encoded {}³ field into {} slices", resolution, slices.len());
        Ok(SliceStack { resolution, slices })
    }

    /// Reassemble a new field from a stack
    pub fn decode(stack: &SliceStack) -> VolumetricField {
        let mut field = VolumetricField::new(stack.resolution);
        for (z, slice) in stack.slices.iter().enumerate() {
            for (x, y, pixel) in slice.enumerate_pixels() {
                let voxel = pixel.0.map(unquantize);
                field.set(x, y, z as u32, voxel);
            }
        }
        field
    }
}
