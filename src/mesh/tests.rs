use std::sync::Arc;

use glam::Vec3;

use crate::constants::core::CHUNK_SIZE;
use crate::constants::mesh::{EDGE_TABLE_LEN, INVALID_VERTEX_INDEX, MAX_CHUNK_VERTS};
use crate::mesh::extractor::{extract_chunk, EdgeCrossings, ExtractResult};
use crate::mesh::vertex::{TerrainIndex, TerrainVertex};
use crate::sdf::{BlendOp, SdfCache, SdfField, SdfStore, Shape};
use crate::world::chunk::{BlockType, ChunkPos, ChunkVoxelData};

fn run_extraction(
    field: &Arc<SdfField>,
    pos: ChunkPos,
) -> (
    ExtractResult,
    Box<ChunkVoxelData>,
    Vec<TerrainVertex>,
    Vec<TerrainIndex>,
) {
    let mut cache = SdfCache::new(Arc::clone(field));
    cache.generate(pos, Arc::clone(field));

    let mut edges = vec![EdgeCrossings::default(); EDGE_TABLE_LEN];
    let mut grids = ChunkVoxelData::new_boxed();
    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    let result = extract_chunk(pos, &cache, &mut edges, &mut grids, &mut vertices, &mut indices);
    (result, grids, vertices, indices)
}

/// The built-in field: ground plane at z = 6.35. Chunk (1,1,0) is far
/// enough from the origin dimple to be perfectly flat.
fn plane_field() -> Arc<SdfField> {
    SdfStore::default().committed()
}

fn sphere_field() -> Arc<SdfField> {
    let mut store = SdfStore::default();
    store.add_shape(Shape::sphere(
        Vec3::new(16.0, 16.0, 16.0),
        8.0,
        1,
        BlendOp::Union,
    ));
    store.commit_pending();
    store.committed()
}

#[test]
fn flat_plane_chunk_meshes_at_ground_height() {
    let field = plane_field();
    let (result, _grids, vertices, indices) = run_extraction(&field, ChunkPos::new(1, 1, 0));

    let ExtractResult::Mesh {
        vertex_count,
        index_count,
    } = result
    else {
        panic!("expected a mesh, got {result:?}");
    };
    assert!(vertex_count > 0 && vertex_count < MAX_CHUNK_VERTS);
    assert_eq!(vertex_count, vertices.len());
    assert_eq!(index_count, indices.len());

    for v in &vertices {
        // The extractor converged onto the isosurface...
        assert!(
            field.value(Vec3::from_array(v.position)).abs() <= 1e-2,
            "vertex off surface: {:?}",
            v.position
        );
        // ...which for a plane means normals straight up.
        assert!(v.normal[2] > 0.9, "normal not up: {:?}", v.normal);
    }
}

#[test]
fn triangles_use_three_distinct_vertices() {
    let field = plane_field();
    let (_, _, _, indices) = run_extraction(&field, ChunkPos::new(1, 1, 0));
    for tri in indices.chunks_exact(3) {
        assert!(tri[0] != tri[1] && tri[1] != tri[2] && tri[0] != tri[2]);
    }
}

#[test]
fn materials_are_one_hot() {
    let field = sphere_field();
    let (_, _, vertices, _) = run_extraction(&field, ChunkPos::new(0, 0, 0));
    assert!(!vertices.is_empty());
    for v in &vertices {
        let hot = v.materials.iter().filter(|&&m| m == 255).count();
        let cold = v.materials.iter().filter(|&&m| m == 0).count();
        assert_eq!(hot, 1);
        assert_eq!(cold, 3);
    }
}

#[test]
fn classification_matches_the_field() {
    let field = plane_field();
    let (_, grids, vertices, _) = run_extraction(&field, ChunkPos::new(1, 1, 0));

    // Below ground: solid, no vertex.
    assert_eq!(grids.classification[5][5][0], BlockType::Interior);
    assert_eq!(grids.vertex_index[5][5][0], INVALID_VERTEX_INDEX);
    // Above ground: air, no vertex.
    assert_eq!(grids.classification[5][5][20], BlockType::Exterior);
    assert_eq!(grids.vertex_index[5][5][20], INVALID_VERTEX_INDEX);
    // The ground plane passes through z=6.
    assert_eq!(grids.classification[5][5][6], BlockType::Surface);
    let index = grids.vertex_index[5][5][6];
    assert!((index as usize) < vertices.len());
}

#[test]
fn every_surface_voxel_has_a_valid_vertex_index() {
    let field = sphere_field();
    let (_, grids, vertices, _) = run_extraction(&field, ChunkPos::new(0, 0, 0));

    for x in 0..CHUNK_SIZE {
        for y in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                let index = grids.vertex_index[x][y][z];
                match grids.classification[x][y][z] {
                    BlockType::Surface => {
                        assert!((index as usize) < vertices.len());
                    }
                    _ => assert_eq!(index, INVALID_VERTEX_INDEX),
                }
            }
        }
    }
}

#[test]
fn all_air_chunk_reports_empty() {
    let field = plane_field();
    let (result, _, vertices, indices) = run_extraction(&field, ChunkPos::new(1, 1, 2));
    assert_eq!(result, ExtractResult::Empty);
    assert!(vertices.is_empty());
    assert!(indices.is_empty());
}

#[test]
fn all_solid_chunk_reports_interior() {
    let field = plane_field();
    let (result, _, _, _) = run_extraction(&field, ChunkPos::new(1, 1, -2));
    assert_eq!(result, ExtractResult::Interior);
}

#[test]
fn sphere_mesh_hugs_the_sphere_with_outward_normals() {
    let field = sphere_field();
    let (result, _, vertices, _) = run_extraction(&field, ChunkPos::new(0, 0, 0));
    assert!(matches!(result, ExtractResult::Mesh { .. }));

    let center = Vec3::new(16.0, 16.0, 16.0);
    for v in &vertices {
        let p = Vec3::from_array(v.position);
        assert!(
            ((p - center).length() - 8.0).abs() < 0.1,
            "vertex off the sphere: {p:?}"
        );
        // Normals point away from the center.
        let n = Vec3::from_array(v.normal);
        assert!(n.dot((p - center).normalize()) > 0.7);
    }

    let top = vertices
        .iter()
        .max_by(|a, b| a.position[2].total_cmp(&b.position[2]))
        .expect("sphere produced vertices");
    assert!(top.normal[2] > 0.7);
}

#[test]
fn vertex_is_reused_across_the_quads_that_share_it() {
    let field = plane_field();
    let (_, _, vertices, indices) = run_extraction(&field, ChunkPos::new(1, 1, 0));

    // A flat interior sheet references most vertices from multiple quads.
    let mut refs = vec![0u32; vertices.len()];
    for &i in &indices {
        refs[i as usize] += 1;
    }
    let shared = refs.iter().filter(|&&r| r >= 2).count();
    assert!(shared * 2 > vertices.len());
}
