//! CPU compute device: each dispatch is a rayon parallel iterator.
//!
//! A parallel iterator returns only once every element has run, which gives
//! the same barrier semantics as ending a GPU compute pass.

use rayon::prelude::*;

use super::{kernels, ComputeDevice, DispatchStats, RawBounds, WeatherMapJob, WorleyJob};
use crate::error::{Error, Result};
use crate::field::{voxel_coords, PlanarField, VolumetricField, Voxel};

pub struct CpuDevice {
    stats: DispatchStats,
}

impl CpuDevice {
    pub fn new() -> Self {
        Self {
            stats: DispatchStats::default(),
        }
    }
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeDevice for CpuDevice {
    fn label(&self) -> &str {
        "cpu"
    }

    fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    fn dispatch_worley(
        &self,
        field: &mut VolumetricField,
        job: &WorleyJob<'_>,
    ) -> Result<RawBounds> {
        let resolution = field.resolution();
        if job.params.resolution != resolution {
            return Err(Error::ResolutionMismatch {
                expected: resolution,
                found: job.params.resolution,
            });
        }
        let channel = job.params.channel as usize;

        // Phase 1: raw values + global min/max
        field
            .voxels_mut()
            .par_iter_mut()
            .enumerate()
            .for_each(|(index, voxel)| {
                let coords = voxel_coords(resolution, index);
                let value = kernels::worley_value(&job.params, job.points, coords);
                voxel[channel] = value;
                job.bounds.record(value);
            });
        self.stats.record_dispatch();

        let bounds = job.bounds.bounds();

        // Phase 2: remap to [0, 1]
        field.voxels_mut().par_iter_mut().for_each(|voxel| {
            voxel[channel] = bounds.normalize(voxel[channel]);
        });
        self.stats.record_dispatch();

        Ok(bounds)
    }

    fn dispatch_weather_map(&self, map: &mut PlanarField, job: &WeatherMapJob<'_>) -> Result<()> {
        let resolution = map.resolution();
        if job.params.resolution != resolution {
            return Err(Error::ResolutionMismatch {
                expected: resolution,
                found: job.params.resolution,
            });
        }
        let row = resolution as usize;

        map.texels_mut()
            .par_iter_mut()
            .enumerate()
            .for_each(|(index, texel)| {
                let x = (index % row) as u32;
                let y = (index / row) as u32;
                *texel = kernels::fractal_value(&job.params, job.offsets, x, y);
            });
        self.stats.record_dispatch();

        Ok(())
    }

    fn extract_slices(&self, field: &VolumetricField) -> Result<Vec<Vec<Voxel>>> {
        let layer_len = (field.resolution() as usize).pow(2);
        let mut slices = Vec::with_capacity(field.resolution() as usize);

        for layer in field.voxels().chunks(layer_len.max(1)) {
            let mut slice = vec![[0.0; 4]; layer_len];
            slice
                .par_iter_mut()
                .zip(layer.par_iter())
                .for_each(|(pixel, voxel)| *pixel = *voxel);
            self.stats.record_dispatch();
            self.stats.record_readback();
            slices.push(slice);
        }

        Ok(slices)
    }

    fn copy_volume(&self, source: &VolumetricField, target: &mut VolumetricField) -> Result<()> {
        if source.resolution() != target.resolution() {
            return Err(Error::ResolutionMismatch {
                expected: target.resolution(),
                found: source.resolution(),
            });
        }

        target
            .voxels_mut()
            .par_iter_mut()
            .zip(source.voxels().par_iter())
            .for_each(|(dst, src)| *dst = *src);
        self.stats.record_dispatch();

        Ok(())
    }
}
