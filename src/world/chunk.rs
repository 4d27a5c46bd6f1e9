//! Chunk and voxel coordinates, voxel classification and per-chunk grids

use std::hash::{Hash, Hasher};

use bytemuck::Zeroable;
use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::constants::core::{CHUNK_SIZE, CHUNK_SIZE_F32, CHUNK_SIZE_I32};
use crate::constants::mesh::INVALID_VERTEX_INDEX;
use crate::physics::Aabb;

/// Position of a chunk in the world (chunk coordinates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// World position of the chunk's minimum corner.
    pub fn to_world_pos(&self) -> Vec3 {
        Vec3::new(
            (self.x * CHUNK_SIZE_I32) as f32,
            (self.y * CHUNK_SIZE_I32) as f32,
            (self.z * CHUNK_SIZE_I32) as f32,
        )
    }

    /// World bounds of the chunk.
    pub fn aabb(&self) -> Aabb {
        let min = self.to_world_pos();
        Aabb::new(min, min + Vec3::splat(CHUNK_SIZE_F32))
    }

    /// Pair the three signed components into one well-distributed integer.
    /// This is the Cantor-style rank the chunk maps are hashed by: each
    /// component is zig-zag folded onto the naturals, then the triple is
    /// ranked by its maximum shell.
    pub fn pairing_index(&self) -> u64 {
        fn fold(n: i32) -> u64 {
            if n >= 0 {
                2 * n as u64
            } else {
                (-2 * n as i64 - 1) as u64
            }
        }
        let x = fold(self.x);
        let y = fold(self.y);
        let z = fold(self.z);

        let max = x.max(y).max(z);
        let mut hash = max
            .wrapping_mul(max)
            .wrapping_mul(max)
            .wrapping_add(2u64.wrapping_mul(max).wrapping_mul(z))
            .wrapping_add(z);
        if max == z {
            let xy = x.max(y);
            hash = hash.wrapping_add(xy.wrapping_mul(xy));
        }
        if y >= x {
            hash = hash.wrapping_add(x + y);
        } else {
            hash = hash.wrapping_add(y);
        }
        hash
    }
}

impl Hash for ChunkPos {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.pairing_index());
    }
}

/// Position of a voxel in the world (world coordinates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoxelPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl VoxelPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn from_world_pos(pos: Vec3) -> Self {
        Self {
            x: pos.x.floor() as i32,
            y: pos.y.floor() as i32,
            z: pos.z.floor() as i32,
        }
    }

    /// The chunk this voxel belongs to.
    pub fn to_chunk_pos(&self) -> ChunkPos {
        ChunkPos::new(
            self.x.div_euclid(CHUNK_SIZE_I32),
            self.y.div_euclid(CHUNK_SIZE_I32),
            self.z.div_euclid(CHUNK_SIZE_I32),
        )
    }

    /// Position within the owning chunk.
    pub fn to_local_pos(&self) -> (usize, usize, usize) {
        (
            self.x.rem_euclid(CHUNK_SIZE_I32) as usize,
            self.y.rem_euclid(CHUNK_SIZE_I32) as usize,
            self.z.rem_euclid(CHUNK_SIZE_I32) as usize,
        )
    }

    pub fn as_ivec3(&self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }
}

/// What a voxel turned out to be after extraction.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockType {
    Exterior = 0,
    Interior = 1,
    Surface = 2,
    Unloaded = 3,
}

impl BlockType {
    pub const COUNT: usize = 4;
}

// Exterior is the all-zero pattern, so zeroed grids start fully outside.
unsafe impl Zeroable for BlockType {}

/// Per-voxel grids owned by a generated chunk: classification, light and
/// the index of the dual-contouring vertex each surface voxel produced.
/// Boxed because the three grids together run to a couple hundred KiB.
#[repr(C)]
#[derive(Zeroable)]
pub struct ChunkVoxelData {
    pub classification: [[[BlockType; CHUNK_SIZE]; CHUNK_SIZE]; CHUNK_SIZE],
    pub light: [[[f32; CHUNK_SIZE]; CHUNK_SIZE]; CHUNK_SIZE],
    pub vertex_index: [[[u16; CHUNK_SIZE]; CHUNK_SIZE]; CHUNK_SIZE],
}

impl ChunkVoxelData {
    pub fn new_boxed() -> Box<Self> {
        let mut data: Box<Self> = bytemuck::zeroed_box();
        data.vertex_index = [[[INVALID_VERTEX_INDEX; CHUNK_SIZE]; CHUNK_SIZE]; CHUNK_SIZE];
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairing_index_is_unique_over_a_small_volume() {
        let mut seen = std::collections::HashMap::new();
        for z in -9..9 {
            for y in -9..9 {
                for x in -9..9 {
                    let pos = ChunkPos::new(x, y, z);
                    if let Some(other) = seen.insert(pos.pairing_index(), pos) {
                        panic!("collision between {pos:?} and {other:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn voxel_to_chunk_handles_negative_coordinates() {
        let v = VoxelPos::new(-1, 0, 33);
        assert_eq!(v.to_chunk_pos(), ChunkPos::new(-1, 0, 1));
        assert_eq!(v.to_local_pos(), (31, 0, 1));
    }

    #[test]
    fn fresh_grids_are_exterior_with_no_vertices() {
        let data = ChunkVoxelData::new_boxed();
        assert_eq!(data.classification[0][0][0], BlockType::Exterior);
        assert_eq!(data.classification[31][31][31], BlockType::Exterior);
        assert_eq!(data.vertex_index[5][6][7], INVALID_VERTEX_INDEX);
    }
}
