//! Dual-contouring vertex placement
//!
//! Minimizes the sum of squared point-to-plane distances over the edge
//! crossings collected for one voxel: seed at the centroid of the crossing
//! points, then run ten fixed relaxation steps of
//! `c += 0.5 * n * (n . (p - c))` per plane. The 0.5 step and the fixed
//! iteration count are part of the mesh contract; changing either moves
//! every vertex.
//!
//! The SSE3 path is picked up at runtime and must agree with the portable
//! fallback to 1e-4 over the at-most-12 planes a voxel can collect.

use glam::Vec3;

const RELAXATION_ROUNDS: usize = 10;
const STEP: f32 = 0.5;

/// Position minimizing the quadratic plane error of `(points, normals)`.
pub fn minimize(points: &[Vec3], normals: &[Vec3]) -> Vec3 {
    debug_assert!(!points.is_empty());
    debug_assert_eq!(points.len(), normals.len());

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("sse3") {
            // Safety: sse3 support was just verified.
            return unsafe { minimize_sse3(points, normals) };
        }
    }

    minimize_scalar(points, normals)
}

pub fn minimize_scalar(points: &[Vec3], normals: &[Vec3]) -> Vec3 {
    let mut c = Vec3::ZERO;
    for p in points {
        c += *p;
    }
    c /= points.len() as f32;

    for _ in 0..RELAXATION_ROUNDS {
        for (p, n) in points.iter().zip(normals) {
            let d = n.dot(*p - c);
            c += *n * (d * STEP);
        }
    }
    c
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse3")]
unsafe fn minimize_sse3(points: &[Vec3], normals: &[Vec3]) -> Vec3 {
    use std::arch::x86_64::*;

    // Pad into 16-byte lanes; the w component stays zero so the horizontal
    // adds produce plain 3-component dot products.
    let mut p4 = [[0.0f32; 4]; 12];
    let mut n4 = [[0.0f32; 4]; 12];
    let count = points.len().min(12);
    for i in 0..count {
        p4[i][..3].copy_from_slice(&points[i].to_array());
        n4[i][..3].copy_from_slice(&normals[i].to_array());
    }

    let mut c = _mm_setzero_ps();
    for lane in p4.iter().take(count) {
        c = _mm_add_ps(c, _mm_loadu_ps(lane.as_ptr()));
    }
    c = _mm_mul_ps(c, _mm_set1_ps(1.0 / count as f32));

    let step = _mm_set1_ps(STEP);
    for _ in 0..RELAXATION_ROUNDS {
        for i in 0..count {
            let p = _mm_loadu_ps(p4[i].as_ptr());
            let n = _mm_loadu_ps(n4[i].as_ptr());
            let diff = _mm_sub_ps(p, c);

            let mut d = _mm_mul_ps(diff, n);
            d = _mm_hadd_ps(d, d);
            d = _mm_hadd_ps(d, d);

            c = _mm_add_ps(c, _mm_mul_ps(_mm_mul_ps(step, n), d));
        }
    }

    let mut out = [0.0f32; 4];
    _mm_storeu_ps(out.as_mut_ptr(), c);
    Vec3::new(out[0], out[1], out[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planes_from(points: &[Vec3], normals: &[Vec3]) -> (Vec<Vec3>, Vec<Vec3>) {
        (
            points.to_vec(),
            normals.iter().map(|n| n.normalize()).collect(),
        )
    }

    #[test]
    fn single_plane_lands_on_the_plane() {
        let (p, n) = planes_from(&[Vec3::new(0.5, 0.5, 0.25)], &[Vec3::Z]);
        let c = minimize_scalar(&p, &n);
        assert!((c.z - 0.25).abs() < 1e-4);
    }

    #[test]
    fn axis_planes_converge_to_their_corner() {
        let points = [
            Vec3::new(0.3, 0.5, 0.5),
            Vec3::new(0.5, 0.7, 0.5),
            Vec3::new(0.5, 0.5, 0.6),
        ];
        let normals = [Vec3::X, Vec3::Y, Vec3::Z];
        let c = minimize_scalar(&points, &normals);
        assert!((c.x - 0.3).abs() < 1e-3);
        assert!((c.y - 0.7).abs() < 1e-3);
        assert!((c.z - 0.6).abs() < 1e-3);
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn simd_matches_scalar() {
        if !is_x86_feature_detected!("sse3") {
            return;
        }
        // A full 12-plane buffer with mixed directions.
        let mut points = Vec::new();
        let mut normals = Vec::new();
        for i in 0..12 {
            let f = i as f32;
            points.push(Vec3::new(
                0.5 + (f * 0.37).sin() * 0.5,
                0.5 + (f * 0.61).cos() * 0.5,
                0.5 + (f * 0.13).sin() * 0.5,
            ));
            normals.push(
                Vec3::new((f * 0.7).cos(), (f * 0.3).sin(), 1.0 - f * 0.1).normalize(),
            );
        }
        let scalar = minimize_scalar(&points, &normals);
        let simd = unsafe { minimize_sse3(&points, &normals) };
        assert!(
            (scalar - simd).length() < 1e-4,
            "scalar {scalar:?} vs simd {simd:?}"
        );
    }
}
