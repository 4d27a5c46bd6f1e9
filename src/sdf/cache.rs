//! Per-chunk SDF sample cache
//!
//! Extraction evaluates the field at tens of thousands of points per chunk.
//! Each job owns one of these: a halo-extended grid filled once from the
//! field snapshot at job start, after which integer lookups are array reads
//! and fractional lookups are trilinear blends of the 8 surrounding
//! samples. The `uncached_sdf` feature routes every lookup straight to the
//! field for debugging; results are identical up to interpolation error.

use std::sync::Arc;

use glam::{IVec3, Vec3};

use crate::constants::core::CHUNK_SIZE_I32;
use crate::constants::sdf::{CACHE_DIM, DERIVATIVE_EPSILON, SDF_HALO};
use crate::sdf::field::SdfField;
use crate::world::chunk::ChunkPos;

pub struct SdfCache {
    field: Arc<SdfField>,
    offset_i: IVec3,
    offset_f: Vec3,
    values: Vec<f32>,
}

impl SdfCache {
    pub fn new(field: Arc<SdfField>) -> Self {
        Self {
            field,
            offset_i: IVec3::ZERO,
            offset_f: Vec3::ZERO,
            values: vec![0.0; CACHE_DIM * CACHE_DIM * CACHE_DIM],
        }
    }

    /// Fill the cache for one chunk from a field snapshot.
    pub fn generate(&mut self, chunk: ChunkPos, field: Arc<SdfField>) {
        self.field = field;

        let chunk_origin = IVec3::new(chunk.x, chunk.y, chunk.z) * CHUNK_SIZE_I32;
        self.offset_i = IVec3::splat(SDF_HALO) - chunk_origin;
        self.offset_f = self.offset_i.as_vec3();

        #[cfg(not(feature = "uncached_sdf"))]
        {
            let base = chunk_origin - IVec3::splat(SDF_HALO);
            let dim = CACHE_DIM as i32;
            for z in 0..dim {
                for y in 0..dim {
                    for x in 0..dim {
                        let index = (x + dim * (y + dim * z)) as usize;
                        let pos = (base + IVec3::new(x, y, z)).as_vec3();
                        self.values[index] = self.field.value(pos);
                    }
                }
            }
        }
    }

    fn stored(&self, local: IVec3) -> f32 {
        debug_assert!(
            local.min_element() >= 0 && local.max_element() < CACHE_DIM as i32,
            "cache lookup out of range: {local:?}"
        );
        let dim = CACHE_DIM as i32;
        self.values[(local.x + dim * (local.y + dim * local.z)) as usize]
    }

    /// Field value at an integer world position.
    pub fn value_at_voxel(&self, pos: IVec3) -> f32 {
        #[cfg(feature = "uncached_sdf")]
        {
            return self.field.value(pos.as_vec3());
        }
        #[cfg(not(feature = "uncached_sdf"))]
        {
            self.stored(pos + self.offset_i)
        }
    }

    /// Field value at a world position, trilinearly blended.
    pub fn value(&self, pos: Vec3) -> f32 {
        #[cfg(feature = "uncached_sdf")]
        {
            return self.field.value(pos);
        }
        #[cfg(not(feature = "uncached_sdf"))]
        {
            let p = pos + self.offset_f;
            let base = p.floor();
            let frac = p - base;
            let base = base.as_ivec3();

            let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
            let c = |dx, dy, dz| self.stored(base + IVec3::new(dx, dy, dz));

            let x0 = lerp(c(0, 0, 0), c(1, 0, 0), frac.x);
            let x1 = lerp(c(0, 1, 0), c(1, 1, 0), frac.x);
            let x2 = lerp(c(0, 0, 1), c(1, 0, 1), frac.x);
            let x3 = lerp(c(0, 1, 1), c(1, 1, 1), frac.x);
            let y0 = lerp(x0, x1, frac.y);
            let y1 = lerp(x2, x3, frac.y);
            lerp(y0, y1, frac.z)
        }
    }

    /// Gradient estimate from cached samples, same two-sided rule as
    /// [`SdfField::derivative`].
    pub fn derivative(&self, p: Vec3) -> Vec3 {
        let center = self.value(p);

        let mut forward = Vec3::ZERO;
        let mut backward = Vec3::ZERO;
        for i in 0..3 {
            let mut probe = p;
            probe[i] += DERIVATIVE_EPSILON;
            forward[i] = self.value(probe);
            probe[i] = p[i] - DERIVATIVE_EPSILON;
            backward[i] = self.value(probe);
        }
        let forward = (forward - Vec3::splat(center)).normalize_or_zero();
        let backward = (Vec3::splat(center) - backward).normalize_or_zero();

        (forward + backward).normalize_or_zero()
    }

    /// Materials are not interpolated; forward to the field.
    pub fn material(&self, pos: Vec3) -> u8 {
        self.field.material(pos)
    }
}
