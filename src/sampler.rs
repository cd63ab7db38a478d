//! Seeded feature point sets for cellular noise.
//!
//! Each cell of an n³ grid gets one jittered point. The same seed always
//! yields the same sequence: the generator is a fixed-algorithm PCG stream,
//! with no external entropy.

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// Deterministic point stream
pub type PointRng = Pcg64Mcg;

/// Create the point stream for a seed
pub fn point_rng(seed: u32) -> PointRng {
    Pcg64Mcg::seed_from_u64(seed as u64)
}

/// Generate `cells_per_axis³` feature points from a fresh stream seeded with `seed`
pub fn generate_points(seed: u32, cells_per_axis: u32) -> Vec<Vec3> {
    let mut rng = point_rng(seed);
    generate_points_from(&mut rng, cells_per_axis)
}

/// Generate feature points, continuing an existing stream.
///
/// Cells are visited x outer, y middle, z inner; each visit draws jitter for
/// x, y, z in that order. The point for cell (x, y, z) lands at index
/// `x + n·(y + n·z)` and lies inside that cell.
pub fn generate_points_from<R: Rng>(rng: &mut R, cells_per_axis: u32) -> Vec<Vec3> {
    let n = cells_per_axis.max(1);
    let cell_size = 1.0 / n as f32;
    let mut points = vec![Vec3::ZERO; (n as usize).pow(3)];

    for x in 0..n {
        for y in 0..n {
            for z in 0..n {
                let jitter = Vec3::new(rng.gen::<f32>(), rng.gen::<f32>(), rng.gen::<f32>());
                let corner = Vec3::new(x as f32, y as f32, z as f32) * cell_size;

                let index = (x + n * (y + n * z)) as usize;
                points[index] = corner + jitter * cell_size;
            }
        }
    }

    points
}

/// Three scales (coarse → fine) drawn from one stream seeded once
pub fn generate_layer_points(seed: u32, divisions: [u32; 3]) -> [Vec<Vec3>; 3] {
    let mut rng = point_rng(seed);
    divisions.map(|cells| generate_points_from(&mut rng, cells))
}
