//! Voxel-grid ray queries
//!
//! A single DDA walker backs the three ray entry points: the boolean
//! occlusion walk, the fast raycast that reconstructs the hit from the
//! voxel's dual-contouring vertex plane, and the precise raycast that
//! treats surface voxels as candidates and refines against the SDF.
//!
//! The world is unbounded; the walk terminates on the ray's own extent.

use glam::{IVec3, Vec3};

use crate::physics::Aabb;
use crate::world::chunk::{BlockType, VoxelPos};
use crate::world::terrain::Terrain;

/// Outcome of a ray query. On a miss `distance`, `posf` and `normal` are
/// all positive infinity.
#[derive(Debug, Clone, Copy)]
pub struct RaycastResult {
    pub hit: bool,
    pub block: BlockType,
    pub distance: f32,
    pub posi: IVec3,
    pub posf: Vec3,
    pub normal: Vec3,
    pub touched_unloaded: bool,
}

impl RaycastResult {
    fn miss() -> Self {
        Self {
            hit: false,
            block: BlockType::Exterior,
            distance: f32::INFINITY,
            posi: IVec3::ZERO,
            posf: Vec3::INFINITY,
            normal: Vec3::INFINITY,
            touched_unloaded: false,
        }
    }
}

/// Integer-grid traversal along a ray: step whichever axis crosses its
/// next grid plane first, stop at the voxel just past the ray's end.
pub(crate) struct VoxelWalk {
    pos: IVec3,
    t_max: Vec3,
    t_delta: Vec3,
    step: IVec3,
    out: IVec3,
}

impl VoxelWalk {
    /// None for rays too short to walk anywhere.
    pub fn new(start: Vec3, ray: Vec3) -> Option<Self> {
        if ray.length_squared() < 0.001 {
            return None;
        }
        let dir = ray.normalize_or_zero();
        let pos = start.floor().as_ivec3();

        let mut t_max = Vec3::ZERO;
        let mut t_delta = Vec3::ZERO;
        let mut step = IVec3::ZERO;
        let mut out = IVec3::ZERO;
        for i in 0..3 {
            let crossing;
            if dir[i] > 0.0 {
                step[i] = 1;
                out[i] = (start[i] + ray[i]).ceil() as i32;
                crossing = (pos[i] + 1) as f32;
            } else {
                step[i] = -1;
                out[i] = (start[i] + ray[i]).floor() as i32 - 1;
                crossing = pos[i] as f32;
            }
            if dir[i] != 0.0 {
                let inv = 1.0 / dir[i];
                t_max[i] = (crossing - start[i]) * inv;
                t_delta[i] = step[i] as f32 * inv;
            } else {
                t_max[i] = 1_000_000.0;
            }
        }

        Some(Self {
            pos,
            t_max,
            t_delta,
            step,
            out,
        })
    }

    pub fn pos(&self) -> IVec3 {
        self.pos
    }

    /// Move to the next voxel; false once the ray extent is exhausted.
    pub fn advance(&mut self) -> bool {
        let axis = if self.t_max.x < self.t_max.y {
            if self.t_max.x < self.t_max.z {
                0
            } else {
                2
            }
        } else if self.t_max.y < self.t_max.z {
            1
        } else {
            2
        };

        self.pos[axis] += self.step[axis];
        if self.pos[axis] == self.out[axis] {
            return false;
        }
        self.t_max[axis] += self.t_delta[axis];
        true
    }
}

const REFINE_STEPS: u32 = 10;

impl Terrain {
    /// Walk colliding voxels along a ray, forced to take at least
    /// `min_steps` steps before a collision counts. Used for cheap
    /// occlusion probes.
    pub fn voxel_raycast(&self, start: Vec3, ray: Vec3, min_steps: i32) -> bool {
        let Some(mut walk) = VoxelWalk::new(start, ray) else {
            return false;
        };

        let mut steps = 0;
        loop {
            let p = walk.pos();
            if self.get_collision(VoxelPos::new(p.x, p.y, p.z)) && steps >= min_steps {
                return true;
            }
            steps += 1;
            if !walk.advance() {
                return false;
            }
        }
    }

    /// Stop at the first surface voxel and reconstruct the hit from the
    /// plane of that voxel's vertex. Cheap, and accurate to within the
    /// voxel's local curvature.
    pub fn raycast_fast(
        &self,
        start: Vec3,
        ray: Vec3,
        allow_source_collision: bool,
    ) -> RaycastResult {
        let mut result = RaycastResult::miss();
        let Some(mut walk) = VoxelWalk::new(start, ray) else {
            return result;
        };

        let mut allow = allow_source_collision;
        loop {
            let p = walk.pos();
            result.block = self.get_voxel(VoxelPos::new(p.x, p.y, p.z));
            if result.block == BlockType::Surface && allow {
                break;
            }
            if result.block == BlockType::Unloaded {
                result.touched_unloaded = true;
            }
            allow = true;
            if !walk.advance() {
                return result;
            }
        }

        let posi = walk.pos();
        result.posi = posi;

        let Some(vertex) = self.vertex_at(VoxelPos::new(posi.x, posi.y, posi.z)) else {
            // A surface voxel always carries a vertex; be graceful anyway.
            debug_assert!(false, "surface voxel without vertex at {posi:?}");
            return result;
        };

        let p = Vec3::from_array(vertex.position);
        let n = Vec3::from_array(vertex.normal).normalize_or_zero();
        let r = ray.normalize_or_zero();
        let t = n.dot(p - start) / n.dot(r);

        result.hit = true;
        result.distance = t;
        result.posf = start + r * t;
        result.normal = n;
        result
    }

    /// Surface voxels are only candidates here: the SDF is sampled where
    /// the ray enters and leaves the voxel, and a sign change is refined
    /// by midpoint search. The normal comes from the field derivative at
    /// the refined point.
    pub fn raycast(&self, start: Vec3, ray: Vec3) -> RaycastResult {
        let mut result = RaycastResult::miss();
        let Some(mut walk) = VoxelWalk::new(start, ray) else {
            return result;
        };

        let field = self.field();
        let dir = ray.normalize_or_zero();
        loop {
            let posi = walk.pos();
            result.block = self.get_voxel(VoxelPos::new(posi.x, posi.y, posi.z));

            if result.block == BlockType::Surface {
                let voxel = Aabb::new(posi.as_vec3(), posi.as_vec3() + Vec3::ONE);
                let near = voxel.ray_entry(start, dir);
                let far = voxel.ray_exit(start, dir);
                let near_value = field.value(near);
                let far_value = field.value(far);

                if near_value * far_value <= 0.0 {
                    let (mut outside, mut inside) = if near_value > far_value {
                        (near, far)
                    } else {
                        (far, near)
                    };

                    let mut p = (outside + inside) * 0.5;
                    for _ in 0..REFINE_STEPS {
                        p = (outside + inside) * 0.5;
                        if field.value(p) < 0.0 {
                            inside = p;
                        } else {
                            outside = p;
                        }
                    }

                    debug_assert!(
                        self.vertex_at(VoxelPos::new(posi.x, posi.y, posi.z)).is_some()
                    );

                    result.hit = true;
                    result.posi = posi;
                    result.distance = (p - start).length();
                    result.posf = p;
                    result.normal = field.derivative(p);
                    return result;
                }
            } else if result.block == BlockType::Unloaded {
                result.touched_unloaded = true;
            }

            if !walk.advance() {
                return result;
            }
        }
    }
}
