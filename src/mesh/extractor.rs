//! Dual-contouring chunk extraction
//!
//! Walks every voxel of a chunk plus a one-voxel halo and tests the three
//! edges leaving the voxel's (1,1,1) corner for sign changes against the
//! cached SDF. Each crossing edge becomes a quad joining the vertices of
//! the four voxels sharing it; each voxel that collected crossings gets a
//! single vertex placed by the quadratic error minimizer. Because only
//! three of a cube's twelve edges are tested per voxel, a voxel gathers the
//! rest of its edge data from the seven neighboring cells of the scratch
//! edge table.

use glam::{IVec3, Vec3};

use crate::constants::core::CHUNK_SIZE_I32;
use crate::constants::mesh::{
    EDGE_TABLE_DIM, INVALID_VERTEX_INDEX, MAX_CHUNK_INDICES, MAX_CHUNK_VERTS,
};
use crate::constants::sdf::{EDGE_SEARCH_EPSILON, EDGE_SEARCH_STEPS, ZERO_NUDGE};
use crate::mesh::qef;
use crate::mesh::vertex::{TerrainIndex, TerrainVertex};
use crate::sdf::SdfCache;
use crate::world::chunk::{BlockType, ChunkPos, ChunkVoxelData};

const EDGE_TOP_FRONT: u8 = 1 << 0;
const EDGE_TOP_RIGHT: u8 = 1 << 1;
const EDGE_SIDE_FRONTRIGHT: u8 = 1 << 2;
const EDGE_MASKS: [u8; 3] = [EDGE_TOP_FRONT, EDGE_TOP_RIGHT, EDGE_SIDE_FRONTRIGHT];

/// Endpoint corner offsets of the three tested edges. All three meet at
/// corner (1,1,1); each runs along a single axis.
const EDGE_CORNERS: [[[i32; 3]; 2]; 3] = [
    // TOP_FRONT: along x
    [[0, 1, 1], [1, 1, 1]],
    // TOP_RIGHT: along y
    [[1, 0, 1], [1, 1, 1]],
    // SIDE_FRONTRIGHT: along z
    [[1, 1, 0], [1, 1, 1]],
];

/// The four voxels sharing each tested edge, as offsets from the testing
/// voxel. Quads are emitted between their vertices.
const QUAD_VOXEL_OFFSETS: [[[i32; 3]; 4]; 3] = [
    [[0, 0, 0], [0, 1, 0], [0, 0, 1], [0, 1, 1]],
    [[0, 0, 0], [1, 0, 0], [0, 0, 1], [1, 0, 1]],
    [[0, 0, 0], [0, 1, 0], [1, 0, 0], [1, 1, 0]],
];

/// Crossings recorded for one cell of the scratch edge table.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeCrossings {
    pub bits: u8,
    /// Voxel-local crossing points, one per tested edge.
    pub positions: [Vec3; 3],
    /// Field gradients at the crossing points.
    pub normals: [Vec3; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractResult {
    /// No surface, or the mesh overflowed its buffers.
    Empty,
    /// The chunk is entirely inside the field.
    Interior,
    Mesh {
        vertex_count: usize,
        index_count: usize,
    },
}

fn edge_cell(x: i32, y: i32, z: i32) -> usize {
    debug_assert!(x >= 0 && y >= 0 && z >= 0);
    let dim = EDGE_TABLE_DIM as i32;
    debug_assert!(x < dim && y < dim && z < dim);
    (x + dim * (y + dim * z)) as usize
}

/// Extract one chunk's mesh and voxel classification.
///
/// `edges` is the caller-owned scratch table of `EDGE_TABLE_LEN` cells;
/// `grids` must be freshly initialized. On a `Mesh` result the vertex and
/// index buffers hold the produced geometry.
pub fn extract_chunk(
    pos: ChunkPos,
    cache: &SdfCache,
    edges: &mut [EdgeCrossings],
    grids: &mut ChunkVoxelData,
    vertices: &mut Vec<TerrainVertex>,
    indices: &mut Vec<TerrainIndex>,
) -> ExtractResult {
    let chunk_offset = IVec3::new(pos.x, pos.y, pos.z) * CHUNK_SIZE_I32;
    let chunk_offset_f = chunk_offset.as_vec3();

    edges.fill(EdgeCrossings::default());
    vertices.clear();
    indices.clear();

    // Phase 1: find edge crossings and emit quads. Vertices are placed at
    // voxel centers here and moved to their minimized position afterwards.
    for z in -1..=CHUNK_SIZE_I32 {
        for y in -1..=CHUNK_SIZE_I32 {
            for x in -1..=CHUNK_SIZE_I32 {
                let voxel = IVec3::new(x, y, z);

                let mut corner_values = [[0.0f32; 2]; 3];
                for e in 0..3 {
                    for j in 0..2 {
                        let corner = IVec3::from_array(EDGE_CORNERS[e][j]);
                        let mut v = cache.value_at_voxel(chunk_offset + voxel + corner);
                        if v == 0.0 {
                            // A value of exactly zero would let two voxels
                            // both claim the same surface point.
                            v = ZERO_NUDGE;
                        }
                        corner_values[e][j] = v;
                    }
                }

                let mut edge_bits = 0u8;
                for e in 0..3 {
                    if corner_values[e][0] * corner_values[e][1] <= 0.0 {
                        edge_bits |= EDGE_MASKS[e];
                    }
                }

                let in_chunk = x >= 0
                    && y >= 0
                    && z >= 0
                    && x < CHUNK_SIZE_I32
                    && y < CHUNK_SIZE_I32
                    && z < CHUNK_SIZE_I32;

                if edge_bits == 0 {
                    if in_chunk {
                        let (ux, uy, uz) = (x as usize, y as usize, z as usize);
                        if grids.vertex_index[ux][uy][uz] != INVALID_VERTEX_INDEX {
                            // A neighbor's quad already marked this voxel
                            // as surface.
                            continue;
                        }
                        let center = chunk_offset_f + voxel.as_vec3() + Vec3::splat(0.5);
                        grids.classification[ux][uy][uz] = if cache.value(center) > 0.0 {
                            BlockType::Exterior
                        } else {
                            BlockType::Interior
                        };
                    }
                    continue;
                }

                let cell = edge_cell(x + 1, y + 1, z + 1);
                edges[cell].bits = edge_bits;

                for e in 0..3 {
                    if edge_bits & EDGE_MASKS[e] == 0 {
                        continue;
                    }

                    if vertices.len() + 4 > MAX_CHUNK_VERTS
                        || indices.len() + 6 > MAX_CHUNK_INDICES
                    {
                        return ExtractResult::Empty;
                    }

                    // Midpoint search between the inside and outside
                    // endpoint for the surface crossing, in voxel-local
                    // coordinates.
                    let c0 = IVec3::from_array(EDGE_CORNERS[e][0]).as_vec3();
                    let c1 = IVec3::from_array(EDGE_CORNERS[e][1]).as_vec3();
                    let (mut inside, mut outside) = if corner_values[e][0] < corner_values[e][1] {
                        (c0, c1)
                    } else {
                        (c1, c0)
                    };

                    let base = chunk_offset_f + voxel.as_vec3();
                    let mut crossing = (inside + outside) * 0.5;
                    for _ in 0..EDGE_SEARCH_STEPS {
                        crossing = (inside + outside) * 0.5;
                        let v = cache.value(base + crossing);
                        if v.abs() < EDGE_SEARCH_EPSILON {
                            break;
                        }
                        if v < 0.0 {
                            inside = crossing;
                        } else {
                            outside = crossing;
                        }
                    }
                    debug_assert!(crossing.min_element() >= 0.0 && crossing.max_element() <= 1.0);

                    edges[cell].positions[e] = crossing;
                    edges[cell].normals[e] = cache.derivative(base + crossing);

                    if !in_chunk {
                        // Halo voxels only contribute edge data; their
                        // geometry belongs to a neighboring chunk.
                        continue;
                    }

                    let mut quad = [0 as TerrainIndex; 4];
                    for (j, offset) in QUAD_VOXEL_OFFSETS[e].iter().enumerate() {
                        let o = voxel + IVec3::from_array(*offset);
                        // Quad corners may sit one voxel past the high edge
                        // of the chunk.
                        if o.min_element() < 0 || o.max_element() > CHUNK_SIZE_I32 {
                            continue;
                        }

                        let owned = o.max_element() < CHUNK_SIZE_I32;
                        let known = owned
                            && grids.vertex_index[o.x as usize][o.y as usize][o.z as usize]
                                != INVALID_VERTEX_INDEX;

                        if !known {
                            let index = vertices.len() as TerrainIndex;
                            vertices.push(TerrainVertex {
                                position: [
                                    o.x as f32 + 0.5,
                                    o.y as f32 + 0.5,
                                    o.z as f32 + 0.5,
                                ],
                                normal: [0.0; 3],
                                info: [0; 4],
                                materials: [0; 4],
                            });
                            quad[j] = index;
                            if owned {
                                grids.vertex_index[o.x as usize][o.y as usize][o.z as usize] =
                                    index;
                                grids.classification[o.x as usize][o.y as usize][o.z as usize] =
                                    BlockType::Surface;
                            }
                        } else {
                            let index =
                                grids.vertex_index[o.x as usize][o.y as usize][o.z as usize];
                            debug_assert!((index as usize) < vertices.len());
                            debug_assert_eq!(
                                grids.classification[o.x as usize][o.y as usize][o.z as usize],
                                BlockType::Surface
                            );
                            quad[j] = index;
                        }
                    }

                    // Winding follows the sign at the shared (1,1,1)
                    // corner so faces point out of the solid.
                    let shared = corner_values[2][1];
                    let flip = if e == 0 { shared > 0.0 } else { shared < 0.0 };
                    if flip {
                        indices.extend_from_slice(&[
                            quad[0], quad[1], quad[2], quad[1], quad[3], quad[2],
                        ]);
                    } else {
                        indices.extend_from_slice(&[
                            quad[0], quad[2], quad[1], quad[1], quad[2], quad[3],
                        ]);
                    }
                }
            }
        }
    }

    if indices.is_empty() {
        // With no crossings anywhere the classification pass visited every
        // voxel, so one sample tells solid from air.
        return if grids.classification[0][0][0] == BlockType::Interior {
            ExtractResult::Interior
        } else {
            ExtractResult::Empty
        };
    }

    // Phase 2: per produced vertex, gather the twelve possible edge
    // crossings of its voxel from the seven table cells that share them,
    // then minimize.
    let edges: &[EdgeCrossings] = edges;
    for vertex in vertices.iter_mut() {
        let vx = vertex.position[0].floor() as i32;
        let vy = vertex.position[1].floor() as i32;
        let vz = vertex.position[2].floor() as i32;
        debug_assert!(vx >= 0 && vy >= 0 && vz >= 0);
        debug_assert!(vx <= CHUNK_SIZE_I32 && vy <= CHUNK_SIZE_I32 && vz <= CHUNK_SIZE_I32);

        let mut points = [Vec3::ZERO; 12];
        let mut normals = [Vec3::ZERO; 12];
        let mut count = 0usize;

        let mut gather = |cell: usize, edge: usize, adjust: Vec3| {
            let te = &edges[cell];
            if te.bits & EDGE_MASKS[edge] != 0 {
                points[count] = te.positions[edge] + adjust;
                normals[count] = te.normals[edge];
                count += 1;
            }
        };

        // Own cell: the three tested edges.
        let own = edge_cell(vx + 1, vy + 1, vz + 1);
        gather(own, 0, Vec3::ZERO);
        gather(own, 1, Vec3::ZERO);
        gather(own, 2, Vec3::ZERO);
        // -x neighbor: its y- and z-aligned edges lie on this voxel's x=0
        // face; shift their crossings back into local space.
        let cell = edge_cell(vx, vy + 1, vz + 1);
        gather(cell, 1, Vec3::new(-1.0, 0.0, 0.0));
        gather(cell, 2, Vec3::new(-1.0, 0.0, 0.0));
        // -y neighbor.
        let cell = edge_cell(vx + 1, vy, vz + 1);
        gather(cell, 0, Vec3::new(0.0, -1.0, 0.0));
        gather(cell, 2, Vec3::new(0.0, -1.0, 0.0));
        // -x -y neighbor.
        let cell = edge_cell(vx, vy, vz + 1);
        gather(cell, 2, Vec3::new(-1.0, -1.0, 0.0));
        // -x -z neighbor.
        let cell = edge_cell(vx, vy + 1, vz);
        gather(cell, 1, Vec3::new(-1.0, 0.0, -1.0));
        // -y -z neighbor.
        let cell = edge_cell(vx + 1, vy, vz);
        gather(cell, 0, Vec3::new(0.0, -1.0, -1.0));
        // -z neighbor.
        let cell = edge_cell(vx + 1, vy + 1, vz);
        gather(cell, 0, Vec3::new(0.0, 0.0, -1.0));
        gather(cell, 1, Vec3::new(0.0, 0.0, -1.0));

        debug_assert!(count > 0, "vertex voxel collected no crossings");
        #[cfg(debug_assertions)]
        for i in 0..count {
            debug_assert!(points[i].min_element() >= 0.0 && points[i].max_element() <= 1.0);
            debug_assert!(!normals[i].is_nan());
        }

        let mut normal = Vec3::ZERO;
        for n in normals.iter().take(count) {
            normal += *n;
        }
        let normal = normal.normalize_or_zero();

        // The minimized position may land outside the voxel that emitted
        // it; that is correct when every corner shares a sign yet edges
        // still cross, and clamping here would tear seams into the mesh.
        let local = qef::minimize(&points[..count], &normals[..count]);
        debug_assert!(!local.is_nan());
        let world = chunk_offset_f + Vec3::new(vx as f32, vy as f32, vz as f32) + local;

        vertex.position = world.to_array();
        vertex.normal = normal.to_array();
        vertex.info = [0, 1, 255, 0];

        let material = cache.material(world);
        for (channel, weight) in vertex.materials.iter_mut().enumerate() {
            *weight = if material as usize == channel { 255 } else { 0 };
        }
    }

    debug_assert!(vertices.len() <= MAX_CHUNK_VERTS);
    debug_assert!(indices.len() <= MAX_CHUNK_INDICES);
    ExtractResult::Mesh {
        vertex_count: vertices.len(),
        index_count: indices.len(),
    }
}
