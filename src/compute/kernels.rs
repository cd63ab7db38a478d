//! Per-element kernel math for the CPU device.
//!
//! The WGSL kernels next to this file implement the same formulas in `f32`,
//! so both devices produce the same fields up to float rounding.

use glam::{IVec3, UVec3, Vec2, Vec3, Vec3Swizzles, Vec4, Vec4Swizzles};

use super::{WeatherMapParams, WorleyParams};

/// Distance from `sample` (in [0,1)³) to the nearest feature point of an
/// n³ grid, with the grid wrapped on every face so the volume tiles.
pub fn worley_distance(points: &[Vec3], cells: u32, sample: Vec3) -> f32 {
    let n = cells.max(1) as i32;
    let cell = (sample * n as f32)
        .floor()
        .as_ivec3()
        .clamp(IVec3::ZERO, IVec3::splat(n - 1));

    let mut min_sqr_dst = 1.0_f32;
    for dz in -1..=1 {
        for dy in -1..=1 {
            for dx in -1..=1 {
                let adjacent = cell + IVec3::new(dx, dy, dz);
                let wrapped = IVec3::new(
                    adjacent.x.rem_euclid(n),
                    adjacent.y.rem_euclid(n),
                    adjacent.z.rem_euclid(n),
                );
                let index = (wrapped.x + n * (wrapped.y + n * wrapped.z)) as usize;

                // Move the wrapped point back next to the sample
                let shift = (adjacent - wrapped).as_vec3() / n as f32;
                let offset = sample - (points[index] + shift);
                min_sqr_dst = min_sqr_dst.min(offset.length_squared());
            }
        }
    }

    min_sqr_dst.sqrt()
}

/// Raw (unnormalised) three-scale cellular value of one voxel
pub fn worley_value(params: &WorleyParams, points: [&[Vec3]; 3], voxel: UVec3) -> f32 {
    let position = voxel.as_vec3() / params.resolution as f32;
    let tiled = position * params.tile as f32;
    let sample = tiled - tiled.floor();

    let [a, b, c] = params.cell_counts;
    let layer_a = worley_distance(points[0], a, sample);
    let layer_b = worley_distance(points[1], b, sample);
    let layer_c = worley_distance(points[2], c, sample);

    let p = params.persistence;
    let value = (layer_a + layer_b * p + layer_c * p * p) / (1.0 + p + p * p);

    if params.invert != 0 {
        1.0 - value
    } else {
        value
    }
}

#[inline]
fn mod289(x: Vec4) -> Vec4 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

#[inline]
fn permute(x: Vec4) -> Vec4 {
    mod289((x * 34.0 + 10.0) * x)
}

#[inline]
fn taylor_inv_sqrt(r: Vec4) -> Vec4 {
    1.792_842_9 - 0.853_734_7 * r
}

/// 3D simplex noise after Ashima Arts / Stefan Gustavson, roughly in [-1, 1].
///
/// Unseeded: the lattice hash is a fixed permutation polynomial mod 289,
/// identical to `weather_map.wgsl`.
pub fn simplex3(v: Vec3) -> f32 {
    // Skew onto the simplex lattice and find the first corner
    let i = (v + v.dot(Vec3::splat(1.0 / 3.0))).floor();
    let x0 = v - i + i.dot(Vec3::splat(1.0 / 6.0));

    // Other corners
    let g = Vec3::select(x0.cmpge(x0.yzx()), Vec3::ONE, Vec3::ZERO);
    let l = Vec3::ONE - g;
    let i1 = g.min(l.zxy());
    let i2 = g.max(l.zxy());

    let x1 = x0 - i1 + 1.0 / 6.0;
    let x2 = x0 - i2 + 1.0 / 3.0;
    let x3 = x0 - 0.5;

    let i = i - (i * (1.0 / 289.0)).floor() * 289.0;
    let p = permute(i.z + Vec4::new(0.0, i1.z, i2.z, 1.0));
    let p = permute(p + i.y + Vec4::new(0.0, i1.y, i2.y, 1.0));
    let p = permute(p + i.x + Vec4::new(0.0, i1.x, i2.x, 1.0));

    // Gradients: 7x7 points over a square, mapped onto an octahedron
    let n_ = 0.142_857_14_f32;
    let ns = n_ * Vec3::new(2.0, 0.5, 1.0) - Vec3::new(0.0, 1.0, 0.0);

    let j = p - 49.0 * (p * ns.z * ns.z).floor();
    let x_ = (j * ns.z).floor();
    let y_ = (j - 7.0 * x_).floor();

    let x = x_ * ns.x + ns.y;
    let y = y_ * ns.x + ns.y;
    let h = Vec4::ONE - x.abs() - y.abs();

    let b0 = Vec4::new(x.x, x.y, y.x, y.y);
    let b1 = Vec4::new(x.z, x.w, y.z, y.w);
    let s0 = b0.floor() * 2.0 + 1.0;
    let s1 = b1.floor() * 2.0 + 1.0;
    let sh = Vec4::select(h.cmple(Vec4::ZERO), Vec4::NEG_ONE, Vec4::ZERO);

    let a0 = b0.xzyw() + s0.xzyw() * sh.xxyy();
    let a1 = b1.xzyw() + s1.xzyw() * sh.zzww();

    let gradients = [
        Vec3::new(a0.x, a0.y, h.x),
        Vec3::new(a0.z, a0.w, h.y),
        Vec3::new(a1.x, a1.y, h.z),
        Vec3::new(a1.z, a1.w, h.w),
    ];
    let norm = taylor_inv_sqrt(Vec4::from_array(gradients.map(|g| g.dot(g))));
    let corners = [x0, x1, x2, x3];

    let m = (0.6 - Vec4::from_array(corners.map(|c| c.dot(c)))).max(Vec4::ZERO);
    let m = m * m;
    let contributions = Vec4::new(
        (gradients[0] * norm.x).dot(x0),
        (gradients[1] * norm.y).dot(x1),
        (gradients[2] * norm.z).dot(x2),
        (gradients[3] * norm.w).dot(x3),
    );
    42.0 * (m * m).dot(contributions)
}

/// Fractal octave sum of one weather map texel
pub fn fractal_value(params: &WeatherMapParams, offsets: &[Vec4], x: u32, y: u32) -> f32 {
    let uv = Vec2::new(x as f32, y as f32) / params.resolution as f32;
    let shift = Vec2::from_array(params.offset);

    let mut frequency = params.scale;
    let mut amplitude = 1.0;
    let mut sum = 0.0;

    for octave in offsets.iter().take(params.octave_count as usize) {
        let p = uv * frequency + octave.truncate().truncate() + shift;
        sum += simplex3(p.extend(octave.z)) * amplitude;

        amplitude *= params.persistence;
        frequency *= params.lacunarity;
    }

    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::generate_points;

    #[test]
    fn test_distance_zero_at_feature_point() {
        let points = generate_points(3, 4);
        for &p in points.iter().take(8) {
            assert!(worley_distance(&points, 4, p) < 1e-6);
        }
    }

    #[test]
    fn test_distance_wraps_across_faces() {
        // A single point near the max corner is also near the min corner
        let points = vec![Vec3::splat(0.95)];
        let near_origin = worley_distance(&points, 1, Vec3::splat(0.01));
        assert!(near_origin < 0.11, "{}", near_origin);
    }

    #[test]
    fn test_distance_bounded_by_one() {
        let points = generate_points(11, 2);
        for i in 0..10 {
            let s = Vec3::splat(i as f32 / 10.0);
            let d = worley_distance(&points, 2, s);
            assert!((0.0..=1.0).contains(&d));
        }
    }

    #[test]
    fn test_invert_mirrors_value() {
        let points = [
            generate_points(1, 2),
            generate_points(2, 3),
            generate_points(3, 4),
        ];
        let slices = [&points[0][..], &points[1][..], &points[2][..]];
        let mut params = WorleyParams {
            resolution: 8,
            cell_counts: [2, 3, 4],
            persistence: 0.5,
            tile: 1,
            invert: 0,
            channel: 0,
        };
        let voxel = UVec3::new(3, 5, 1);
        let plain = worley_value(&params, slices, voxel);
        params.invert = 1;
        let inverted = worley_value(&params, slices, voxel);
        assert!((plain + inverted - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tiling_repeats_domain() {
        let points = [
            generate_points(5, 2),
            generate_points(6, 2),
            generate_points(7, 2),
        ];
        let slices = [&points[0][..], &points[1][..], &points[2][..]];
        let params = WorleyParams {
            resolution: 8,
            cell_counts: [2, 2, 2],
            persistence: 0.5,
            tile: 2,
            invert: 0,
            channel: 0,
        };
        // With two tiles across 8 voxels, voxel x and x + 4 sample the same point
        let a = worley_value(&params, slices, UVec3::new(1, 2, 3));
        let b = worley_value(&params, slices, UVec3::new(5, 2, 3));
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn test_simplex_known_values() {
        let cases = [
            (Vec3::new(0.5, 0.25, 0.125), 0.136_263),
            (Vec3::new(2.0, 3.0, 4.0), 0.207_093),
            (Vec3::new(0.1, 0.2, 0.3), -0.471_993),
            (Vec3::new(-2.2, 1.1, 0.45), -0.088_457),
        ];
        for (v, expected) in cases {
            let value = simplex3(v);
            assert!((value - expected).abs() < 1e-4, "{} -> {}", v, value);
        }
    }

    #[test]
    fn test_simplex_is_bounded_and_varies() {
        let samples: Vec<f32> = (0..500)
            .map(|i| {
                let t = i as f32 * 0.173;
                simplex3(Vec3::new(t, t * 0.61 - 3.0, 1.7 - t * 0.29))
            })
            .collect();
        assert!(samples.iter().all(|v| v.abs() <= 1.0));
        assert!(samples.iter().any(|&v| v > 0.2));
        assert!(samples.iter().any(|&v| v < -0.2));
    }

    #[test]
    fn test_fractal_octave_count_limits_offsets() {
        let offsets = [Vec4::new(10.0, 20.0, 30.0, 40.0), Vec4::new(-5.0, 7.0, 1.0, 2.0)];
        let mut params = WeatherMapParams {
            octave_count: 1,
            scale: 1.0,
            lacunarity: 2.0,
            persistence: 0.5,
            resolution: 16,
            _padding: 0,
            offset: [0.0, 0.0],
        };
        let one = fractal_value(&params, &offsets, 3, 4);
        let expected = simplex3(Vec3::new(3.0 / 16.0 + 10.0, 4.0 / 16.0 + 20.0, 30.0));
        assert!((one - expected).abs() < 1e-6);

        params.octave_count = 2;
        let two = fractal_value(&params, &offsets, 3, 4);
        let second = simplex3(Vec3::new(3.0 / 16.0 * 2.0 - 5.0, 4.0 / 16.0 * 2.0 + 7.0, 1.0));
        assert!((two - (expected + second * 0.5)).abs() < 1e-5);
    }
}
