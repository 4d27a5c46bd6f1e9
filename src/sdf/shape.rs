//! SDF primitive shapes
//!
//! Primitives are a tagged enum rather than trait objects so the field can
//! evaluate a shape list without dynamic dispatch. Every shape carries a
//! decomposed local-to-world transform (center, rotation, half extents), a
//! material tag and the blend operator that folds it into the accumulated
//! field.

use std::sync::Arc;

use glam::{Mat3, Mat4, Quat, Vec3};

use crate::physics::Aabb;

/// How a shape combines with the field accumulated so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlendOp {
    /// min(acc, d)
    Union,
    /// max(acc, -d): carve the shape out of the accumulated solid.
    Subtraction,
    /// max(acc, d)
    Intersection,
    /// Polynomial smooth min with blend radius `k`.
    SmoothUnion { k: f32 },
}

impl BlendOp {
    pub fn apply(self, acc: f32, d: f32) -> f32 {
        match self {
            BlendOp::Union => acc.min(d),
            BlendOp::Subtraction => acc.max(-d),
            BlendOp::Intersection => acc.max(d),
            BlendOp::SmoothUnion { k } => {
                let h = (k - (acc - d).abs()).max(0.0) / k;
                acc.min(d) - h * h * k * 0.25
            }
        }
    }

    /// Whether the shape's contribution won the blend, used to pick the
    /// dominant material at a point.
    pub fn dominates(self, acc: f32, d: f32) -> bool {
        match self {
            BlendOp::Union | BlendOp::SmoothUnion { .. } => d < acc,
            BlendOp::Subtraction => -d > acc,
            BlendOp::Intersection => d > acc,
        }
    }
}

/// Caller-supplied sampled height grid for the HeightMap primitive. Values
/// are normalized to [0, 1] and stretched over the shape's box footprint.
/// Image decoding is the caller's concern.
#[derive(Debug, Clone)]
pub struct HeightField {
    samples: Arc<Vec<f32>>,
    width: usize,
    depth: usize,
}

impl HeightField {
    pub fn new(width: usize, depth: usize, samples: Vec<f32>) -> Self {
        debug_assert_eq!(samples.len(), width * depth);
        Self {
            samples: Arc::new(samples),
            width,
            depth,
        }
    }

    /// Bilinear sample at normalized coordinates, clamped to the grid edge.
    pub fn sample(&self, u: f32, v: f32) -> f32 {
        let fx = (u.clamp(0.0, 1.0) * (self.width - 1) as f32).max(0.0);
        let fy = (v.clamp(0.0, 1.0) * (self.depth - 1) as f32).max(0.0);
        let x0 = (fx as usize).min(self.width - 1);
        let y0 = (fy as usize).min(self.depth - 1);
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.depth - 1);
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;

        let s = |x: usize, y: usize| self.samples[x + y * self.width];
        let a = s(x0, y0) + (s(x1, y0) - s(x0, y0)) * tx;
        let b = s(x0, y1) + (s(x1, y1) - s(x0, y1)) * tx;
        a + (b - a) * ty
    }
}

#[derive(Debug, Clone)]
pub enum ShapeKind {
    Box,
    Sphere,
    /// Capped cylinder along the local z axis; radius from the x half
    /// extent, half height from z.
    Cylinder,
    /// Terrain surface below a sampled height grid, bounded by the box.
    HeightMap(HeightField),
    /// Nested shapes folded in this shape's local frame, moved as one.
    Composite(Vec<Shape>),
}

#[derive(Debug, Clone)]
pub struct Shape {
    pub kind: ShapeKind,
    pub center: Vec3,
    pub rotation: Quat,
    pub half_extents: Vec3,
    pub material: u8,
    pub op: BlendOp,
}

impl Shape {
    pub fn cuboid(center: Vec3, half_extents: Vec3, material: u8, op: BlendOp) -> Self {
        Self {
            kind: ShapeKind::Box,
            center,
            rotation: Quat::IDENTITY,
            half_extents,
            material,
            op,
        }
    }

    pub fn sphere(center: Vec3, radius: f32, material: u8, op: BlendOp) -> Self {
        Self {
            kind: ShapeKind::Sphere,
            center,
            rotation: Quat::IDENTITY,
            half_extents: Vec3::splat(radius),
            material,
            op,
        }
    }

    pub fn cylinder(center: Vec3, radius: f32, half_height: f32, material: u8, op: BlendOp) -> Self {
        Self {
            kind: ShapeKind::Cylinder,
            center,
            rotation: Quat::IDENTITY,
            half_extents: Vec3::new(radius, radius, half_height),
            material,
            op,
        }
    }

    pub fn height_map(
        center: Vec3,
        half_extents: Vec3,
        field: HeightField,
        material: u8,
        op: BlendOp,
    ) -> Self {
        Self {
            kind: ShapeKind::HeightMap(field),
            center,
            rotation: Quat::IDENTITY,
            half_extents,
            material,
            op,
        }
    }

    pub fn composite(center: Vec3, children: Vec<Shape>, material: u8, op: BlendOp) -> Self {
        Self {
            kind: ShapeKind::Composite(children),
            center,
            rotation: Quat::IDENTITY,
            half_extents: Vec3::ONE,
            material,
            op,
        }
    }

    /// Replace the shape's placement from a full transform. The transform's
    /// scale becomes the half extents (a unit gizmo cube maps onto the
    /// shape's bounds), matching how editor gizmos drive shapes.
    pub fn set_transform(&mut self, transform: Mat4) {
        let (scale, rotation, translation) = transform.to_scale_rotation_translation();
        self.center = translation;
        self.rotation = rotation;
        if !matches!(self.kind, ShapeKind::Composite(_)) {
            self.half_extents = (scale * 0.5).abs();
        }
    }

    fn radius(&self) -> f32 {
        self.half_extents.min_element()
    }

    /// Signed distance from `p` to the shape surface, negative inside.
    pub fn distance(&self, p: Vec3) -> f32 {
        let local = self.rotation.conjugate() * (p - self.center);
        match &self.kind {
            ShapeKind::Box => {
                let q = local.abs() - self.half_extents;
                q.max(Vec3::ZERO).length() + q.max_element().min(0.0)
            }
            ShapeKind::Sphere => local.length() - self.radius(),
            ShapeKind::Cylinder => {
                let radial = local.truncate().length() - self.half_extents.x;
                let axial = local.z.abs() - self.half_extents.z;
                radial.max(axial)
            }
            ShapeKind::HeightMap(field) => {
                let q = local.abs() - self.half_extents;
                let box_d = q.max(Vec3::ZERO).length() + q.max_element().min(0.0);
                let u = (local.x + self.half_extents.x) / (2.0 * self.half_extents.x);
                let v = (local.y + self.half_extents.y) / (2.0 * self.half_extents.y);
                let height = -self.half_extents.z
                    + field.sample(u, v) * 2.0 * self.half_extents.z;
                box_d.max(local.z - height)
            }
            ShapeKind::Composite(children) => {
                let mut acc = f32::MAX;
                for child in children {
                    acc = child.op.apply(acc, child.distance(local));
                }
                acc
            }
        }
    }

    /// Material tag at `p`. Composites report the dominant child.
    pub fn material_at(&self, p: Vec3) -> u8 {
        match &self.kind {
            ShapeKind::Composite(children) => {
                let local = self.rotation.conjugate() * (p - self.center);
                let mut acc = f32::MAX;
                let mut material = self.material;
                for child in children {
                    let d = child.distance(local);
                    if child.op.dominates(acc, d) {
                        material = child.material_at(local);
                    }
                    acc = child.op.apply(acc, d);
                }
                material
            }
            _ => self.material,
        }
    }

    fn local_aabb(&self) -> Aabb {
        match &self.kind {
            ShapeKind::Composite(children) => {
                let mut bounds: Option<Aabb> = None;
                for child in children {
                    let child_bounds = child.aabb();
                    bounds = Some(match bounds {
                        Some(b) => b.union(&child_bounds),
                        None => child_bounds,
                    });
                }
                bounds.unwrap_or(Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ZERO))
            }
            _ => Aabb::from_center_half_extents(Vec3::ZERO, self.half_extents),
        }
    }

    /// World-space bounds, conservative under rotation.
    pub fn aabb(&self) -> Aabb {
        let local = self.local_aabb();
        let h = local.half_extents();
        let r = Mat3::from_quat(self.rotation);
        let world_half = r.x_axis.abs() * h.x + r.y_axis.abs() * h.y + r.z_axis.abs() * h.z;
        Aabb::from_center_half_extents(self.center + self.rotation * local.center(), world_half)
    }
}
