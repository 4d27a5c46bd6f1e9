//! Axis-aligned bounding boxes
//!
//! Shared by SDF shape footprints, chunk bounds and the sphere queries.

use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Tight bounds of a sphere.
    pub fn from_sphere(center: Vec3, radius: f32) -> Self {
        Self::from_center_half_extents(center, Vec3::splat(radius))
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Grow the box by `amount` on every side.
    pub fn expanded(&self, amount: f32) -> Self {
        Self {
            min: self.min - Vec3::splat(amount),
            max: self.max + Vec3::splat(amount),
        }
    }

    /// Smallest box containing both operands.
    pub fn union(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Slab test of a ray against the box. Returns the entry and exit
    /// parameters; the entry is never behind the origin. Axes the ray runs
    /// parallel to are skipped, matching the voxel-walk usage where the
    /// origin is already known to pass through the box slab.
    pub fn ray_slab(&self, origin: Vec3, dir: Vec3) -> (f32, f32) {
        let mut t_min = 0.0_f32;
        let mut t_max = f32::MAX;
        for i in 0..3 {
            if dir[i].abs() < 1e-3 {
                continue;
            }
            let ood = 1.0 / dir[i];
            let mut t1 = (self.min[i] - origin[i]) * ood;
            let mut t2 = (self.max[i] - origin[i]) * ood;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
        }
        (t_min, t_max)
    }

    /// Point where a ray enters the box.
    pub fn ray_entry(&self, origin: Vec3, dir: Vec3) -> Vec3 {
        origin + dir * self.ray_slab(origin, dir).0
    }

    /// Point where a ray leaves the box.
    pub fn ray_exit(&self, origin: Vec3, dir: Vec3) -> Vec3 {
        origin + dir * self.ray_slab(origin, dir).1
    }
}
