//! SDF composition and edit staging
//!
//! [`SdfField`] is an immutable snapshot of the registered shape list;
//! extraction jobs and queries evaluate it through a shared `Arc`.
//! [`SdfStore`] owns the live shape records plus a write-only pending edit
//! list, and swaps in a fresh snapshot when the scheduler commits during
//! worker idle. Previous AABBs are kept alongside each record so dirty
//! propagation can cover both the old and new footprint of a moved shape.

use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::constants::sdf::DERIVATIVE_EPSILON;
use crate::physics::Aabb;
use crate::sdf::shape::{BlendOp, Shape};

/// Handle to a registered shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeId(u32);

/// Partial update applied to a shape at commit time.
#[derive(Debug, Clone, Default)]
pub struct ShapeEdit {
    pub transform: Option<Mat4>,
    pub material: Option<u8>,
    pub op: Option<BlendOp>,
}

/// Built-in field used while no shapes are registered: a ground plane with
/// a small sphere carved out at the origin, enough surface to exercise the
/// extractor in tests.
const DEFAULT_GROUND_HEIGHT: f32 = 6.35;
const DEFAULT_DIMPLE_CENTER: Vec3 = Vec3::new(0.0, 0.0, 7.35);
const DEFAULT_DIMPLE_RADIUS: f32 = 2.0;

/// Immutable shape-list snapshot. Negative inside, positive outside.
#[derive(Debug, Default)]
pub struct SdfField {
    shapes: Vec<Shape>,
}

impl SdfField {
    fn new(shapes: Vec<Shape>) -> Self {
        Self { shapes }
    }

    /// Scalar distance at `p`. Shapes fold in registration order through
    /// their blend operators; the accumulator starts fully-outside.
    pub fn value(&self, p: Vec3) -> f32 {
        let v = if self.shapes.is_empty() {
            let plane = p.z - DEFAULT_GROUND_HEIGHT;
            let dimple = (p - DEFAULT_DIMPLE_CENTER).length() - DEFAULT_DIMPLE_RADIUS;
            plane.max(-dimple)
        } else {
            let mut acc = f32::MAX;
            for shape in &self.shapes {
                acc = shape.op.apply(acc, shape.distance(p));
            }
            acc
        };
        debug_assert!(!v.is_nan(), "SDF produced NaN at {p:?}");
        v
    }

    /// Outward gradient estimate at `p`. Two one-sided central differences
    /// are formed with a 0.2 voxel step, each safe-normalized, and their
    /// normalized sum returned; averaging the sides reduces bias right at
    /// the surface.
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
        debug_assert!(forward != Vec3::ZERO && backward != Vec3::ZERO);

        (forward + backward).normalize_or_zero()
    }

    /// Material tag of the shape whose contribution dominated the blend at
    /// `p`; 0 where no shape won (or for the default field).
    pub fn material(&self, p: Vec3) -> u8 {
        let mut acc = f32::MAX;
        let mut material = 0;
        for shape in &self.shapes {
            let d = shape.distance(p);
            if shape.op.dominates(acc, d) {
                material = shape.material_at(p);
            }
            acc = shape.op.apply(acc, d);
        }
        material
    }
}

struct ShapeRecord {
    id: ShapeId,
    shape: Shape,
    prev_aabb: Aabb,
    dirty: bool,
    removed: bool,
}

enum PendingEdit {
    Add(ShapeId, Shape),
    Update(ShapeId, ShapeEdit),
    Remove(ShapeId),
}

/// Live shape records plus staged edits and the committed snapshot.
pub struct SdfStore {
    records: Vec<ShapeRecord>,
    pending: Vec<PendingEdit>,
    committed: Arc<SdfField>,
    next_id: u32,
}

impl Default for SdfStore {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            pending: Vec::new(),
            committed: Arc::new(SdfField::default()),
            next_id: 0,
        }
    }
}

impl SdfStore {
    /// Stage a new shape. The returned handle is valid immediately; the
    /// shape enters the field at the next commit.
    pub fn add_shape(&mut self, shape: Shape) -> ShapeId {
        let id = ShapeId(self.next_id);
        self.next_id += 1;
        self.pending.push(PendingEdit::Add(id, shape));
        id
    }

    /// Stage a partial update.
    pub fn update_shape(&mut self, id: ShapeId, edit: ShapeEdit) {
        self.pending.push(PendingEdit::Update(id, edit));
    }

    /// Stage a removal; the shape's footprint is re-dirtied at the commit
    /// after which it stops contributing.
    pub fn remove_shape(&mut self, id: ShapeId) {
        self.pending.push(PendingEdit::Remove(id));
    }

    /// World bounds of a shape: the committed state for live shapes, the
    /// staged state for shapes that are still pending.
    pub fn shape_aabb(&self, id: ShapeId) -> Option<Aabb> {
        if let Some(record) = self.records.iter().find(|r| r.id == id && !r.removed) {
            return Some(record.shape.aabb());
        }
        self.pending.iter().rev().find_map(|edit| match edit {
            PendingEdit::Add(add_id, shape) if *add_id == id => Some(shape.aabb()),
            _ => None,
        })
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// The snapshot jobs and queries should read.
    pub fn committed(&self) -> Arc<SdfField> {
        Arc::clone(&self.committed)
    }

    /// Apply staged edits and swap in a fresh snapshot. Only safe to call
    /// while no job is reading the field, which the scheduler guarantees by
    /// committing during worker idle.
    pub fn commit_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        for edit in self.pending.drain(..) {
            match edit {
                PendingEdit::Add(id, shape) => {
                    let prev_aabb = shape.aabb();
                    self.records.push(ShapeRecord {
                        id,
                        shape,
                        prev_aabb,
                        dirty: true,
                        removed: false,
                    });
                }
                PendingEdit::Update(id, change) => {
                    if let Some(record) =
                        self.records.iter_mut().find(|r| r.id == id && !r.removed)
                    {
                        if let Some(transform) = change.transform {
                            record.shape.set_transform(transform);
                        }
                        if let Some(material) = change.material {
                            record.shape.material = material;
                        }
                        if let Some(op) = change.op {
                            record.shape.op = op;
                        }
                        record.dirty = true;
                    }
                }
                PendingEdit::Remove(id) => {
                    if let Some(record) =
                        self.records.iter_mut().find(|r| r.id == id && !r.removed)
                    {
                        record.removed = true;
                        record.dirty = true;
                    }
                }
            }
        }

        let shapes = self
            .records
            .iter()
            .filter(|r| !r.removed)
            .map(|r| r.shape.clone())
            .collect();
        self.committed = Arc::new(SdfField::new(shapes));
    }

    /// Visit the previous and current footprint of every dirty shape, then
    /// clear the dirty flags, advance previous AABBs and drop removed
    /// records. Called once per frame by the scheduler's dirty phase.
    pub fn drain_dirty(&mut self, mut visit: impl FnMut(&Aabb)) {
        for record in &mut self.records {
            if !record.dirty {
                continue;
            }
            let current = record.shape.aabb();
            visit(&record.prev_aabb);
            visit(&current);
            record.dirty = false;
            record.prev_aabb = current;
        }
        self.records.retain(|r| !r.removed);
    }
}
