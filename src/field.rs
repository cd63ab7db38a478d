//! CPU-visible field storage shared by the synthesizers, the codec and the renderer.

use glam::UVec3;
use image::{ImageBuffer, Luma};

use crate::params::Channel;

/// One RGBA voxel
pub type Voxel = [f32; 4];

/// Cubic 4-channel 3D field.
///
/// Voxels are stored x-fastest: index = `x + R·(y + R·z)`.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumetricField {
    resolution: u32,
    voxels: Vec<Voxel>,
}

impl VolumetricField {
    /// Zero-initialised field
    pub fn new(resolution: u32) -> Self {
        let count = (resolution as usize).pow(3);
        Self {
            resolution,
            voxels: vec![[0.0; 4]; count],
        }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// Flattened index of voxel (x, y, z)
    #[inline]
    pub fn index(&self, x: u32, y: u32, z: u32) -> usize {
        voxel_index(self.resolution, x, y, z)
    }

    /// Inverse of [`index`](Self::index)
    #[inline]
    pub fn coords(&self, index: usize) -> UVec3 {
        voxel_coords(self.resolution, index)
    }

    pub fn get(&self, x: u32, y: u32, z: u32) -> Voxel {
        self.voxels[self.index(x, y, z)]
    }

    pub fn set(&mut self, x: u32, y: u32, z: u32, voxel: Voxel) {
        let index = self.index(x, y, z);
        self.voxels[index] = voxel;
    }

    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    pub fn voxels_mut(&mut self) -> &mut [Voxel] {
        &mut self.voxels
    }

    /// Raw bytes for GPU upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.voxels)
    }

    /// Observed (min, max) of one channel over the whole volume
    pub fn channel_range(&self, channel: Channel) -> (f32, f32) {
        let c = channel.index();
        self.voxels
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), voxel| {
                (lo.min(voxel[c]), hi.max(voxel[c]))
            })
    }
}

#[inline]
pub fn voxel_index(resolution: u32, x: u32, y: u32, z: u32) -> usize {
    let r = resolution as usize;
    x as usize + r * (y as usize + r * z as usize)
}

#[inline]
pub fn voxel_coords(resolution: u32, index: usize) -> UVec3 {
    let r = resolution as usize;
    UVec3::new(
        (index % r) as u32,
        ((index / r) % r) as u32,
        (index / (r * r)) as u32,
    )
}

/// Square single-channel 2D field (the weather map)
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarField {
    resolution: u32,
    texels: Vec<f32>,
}

impl PlanarField {
    pub fn new(resolution: u32) -> Self {
        Self {
            resolution,
            texels: vec![0.0; (resolution as usize).pow(2)],
        }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Row-major: index = `x + R·y`
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.texels[x as usize + self.resolution as usize * y as usize]
    }

    pub fn texels(&self) -> &[f32] {
        &self.texels
    }

    pub fn texels_mut(&mut self) -> &mut [f32] {
        &mut self.texels
    }

    /// 16-bit grayscale preview stretched to the observed value range
    pub fn to_preview_image(&self) -> ImageBuffer<Luma<u16>, Vec<u16>> {
        let (lo, hi) = self
            .texels
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let span = if hi > lo { hi - lo } else { 1.0 };

        ImageBuffer::from_fn(self.resolution, self.resolution, |x, y| {
            let t = ((self.get(x, y) - lo) / span).clamp(0.0, 1.0);
            Luma([(t * u16::MAX as f32).round() as u16])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_layout_is_x_fastest() {
        let field = VolumetricField::new(4);
        assert_eq!(field.index(1, 0, 0), 1);
        assert_eq!(field.index(0, 1, 0), 4);
        assert_eq!(field.index(0, 0, 1), 16);
        assert_eq!(field.index(3, 3, 3), 63);
    }

    #[test]
    fn test_coords_invert_index() {
        let field = VolumetricField::new(5);
        for index in [0, 1, 7, 24, 25, 124] {
            let c = field.coords(index);
            assert_eq!(field.index(c.x, c.y, c.z), index);
        }
    }

    #[test]
    fn test_channel_range() {
        let mut field = VolumetricField::new(2);
        field.set(0, 0, 0, [0.25, 0.0, 0.0, 0.0]);
        field.set(1, 1, 1, [0.75, 0.0, 0.0, 0.0]);
        assert_eq!(field.channel_range(Channel::R), (0.0, 0.75));
        assert_eq!(field.channel_range(Channel::G), (0.0, 0.0));
    }

    #[test]
    fn test_preview_image_stretches_range() {
        let mut map = PlanarField::new(2);
        map.texels_mut().copy_from_slice(&[-1.0, 0.0, 0.0, 1.0]);
        let img = map.to_preview_image();
        assert_eq!(img.get_pixel(0, 0)[0], 0);
        assert_eq!(img.get_pixel(1, 1)[0], u16::MAX);
    }
}
