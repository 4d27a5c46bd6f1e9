use glam::Vec3;

use crate::constants::lighting::{SKY_BRIGHTNESS, SKY_LIGHT_FACTOR};
use crate::sdf::{BlendOp, Shape};
use crate::world::chunk::{BlockType, ChunkPos, VoxelPos};
use crate::world::store::{ChunkStore, VertexCount};
use crate::world::terrain::{Terrain, TerrainConfig};

fn headless_config() -> TerrainConfig {
    TerrainConfig {
        worker_threads: 0,
        render_enabled: false,
        chunk_pool_capacity: 256,
        view_chunk_budget: 256,
    }
}

/// Ground slab with its top face at z = 6, wide and deep enough that the
/// chunks under the viewer are fully inside it.
fn ground_box() -> Shape {
    Shape::cuboid(
        Vec3::new(0.0, 0.0, -40.0),
        Vec3::new(48.0, 48.0, 46.0),
        0,
        BlendOp::Union,
    )
}

/// Run updates until the scheduler goes quiet (inline pools do one job
/// per frame, so convergence takes one update per chunk plus a few).
fn drain(terrain: &mut Terrain, center: Vec3, radius: f32) {
    let mut last = u64::MAX;
    let mut stable = 0;
    for _ in 0..2000 {
        terrain.update(center, radius);
        if terrain.pending_job_count() == 0 && terrain.regen_count() == last {
            stable += 1;
            if stable >= 3 {
                return;
            }
        } else {
            stable = 0;
        }
        last = terrain.regen_count();
    }
    panic!("terrain never quiesced");
}

// ---------------------------------------------------------------
// Chunk store
// ---------------------------------------------------------------

#[test]
fn pool_exhaustion_and_slot_reuse() {
    let mut store = ChunkStore::new(2);
    let a = store.allocate(ChunkPos::new(0, 0, 0)).expect("slot");
    let _b = store.allocate(ChunkPos::new(1, 0, 0)).expect("slot");
    assert!(store.allocate(ChunkPos::new(2, 0, 0)).is_none());
    assert_eq!(store.live_count(), 2);

    store.free(a);
    assert_eq!(store.live_count(), 1);
    assert!(store.allocate(ChunkPos::new(2, 0, 0)).is_some());
}

#[test]
fn freeing_a_replaced_chunk_leaves_the_map_alone() {
    let mut store = ChunkStore::new(4);
    let pos = ChunkPos::new(3, -2, 1);

    let old = store.allocate(pos).expect("slot");
    store.bind_pos(pos, old);
    assert_eq!(store.get(pos), Some(old));

    // A refresh publishes a new record for the same coordinate.
    let new = store.allocate(pos).expect("slot");
    store.bind_pos(pos, new);

    // Freeing the old record must not disturb the new binding.
    store.free(old);
    assert_eq!(store.get(pos), Some(new));

    store.free(new);
    assert_eq!(store.get(pos), None);
}

#[test]
fn vertex_count_sentinels() {
    let mut store = ChunkStore::new(1);
    let pos = ChunkPos::new(5, 5, 5);

    assert_eq!(store.vertex_count(pos), VertexCount::Empty);
    store.set_vertex_count(pos, VertexCount::Dirty);
    assert_eq!(store.vertex_count(pos), VertexCount::Dirty);
    store.set_vertex_count(pos, VertexCount::Count(42));
    assert_eq!(store.vertex_count(pos).mesh_count(), Some(42));
    // Empty is stored by removal.
    store.set_vertex_count(pos, VertexCount::Empty);
    assert_eq!(store.vertex_count(pos), VertexCount::Empty);

    assert!(VertexCount::Dirty.has_content());
    assert!(VertexCount::Interior.has_content());
    assert!(!VertexCount::Empty.has_content());
}

#[test]
fn generated_list_append_and_unlink() {
    let mut store = ChunkStore::new(4);
    let a = store.allocate(ChunkPos::new(0, 0, 0)).expect("slot");
    let b = store.allocate(ChunkPos::new(1, 0, 0)).expect("slot");
    let c = store.allocate(ChunkPos::new(2, 0, 0)).expect("slot");

    store.generated_append(a);
    store.generated_append(b);
    store.generated_append(c);
    assert_eq!(store.generated_iter().collect::<Vec<_>>(), vec![a, b, c]);

    // Free the middle element; links heal around it.
    store.free(b);
    assert_eq!(store.generated_iter().collect::<Vec<_>>(), vec![a, c]);

    store.free(a);
    store.free(c);
    assert_eq!(store.generated_iter().count(), 0);
}

// ---------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------

#[test]
fn ground_box_generates_surface_interior_and_empty() {
    let mut terrain = Terrain::new(headless_config()).expect("terrain");
    terrain.add_shape(ground_box());
    drain(&mut terrain, Vec3::new(0.0, 0.0, 8.0), 120.0);

    // The chunk holding the ground surface has a real mesh.
    assert!(
        terrain.vertex_count(ChunkPos::new(0, 0, 0)).mesh_count().unwrap_or(0) > 0,
        "surface chunk should hold a mesh"
    );
    // Deep inside the slab: solid, no mesh.
    assert_eq!(
        terrain.vertex_count(ChunkPos::new(0, 0, -2)),
        VertexCount::Interior
    );
    // Above the slab, outside every shape footprint: never even visited.
    assert_eq!(
        terrain.vertex_count(ChunkPos::new(0, 0, 1)),
        VertexCount::Empty
    );

    // Voxel classification through the public query.
    assert_eq!(terrain.get_voxel(VoxelPos::new(5, 5, 3)), BlockType::Interior);
    assert_eq!(terrain.get_voxel(VoxelPos::new(5, 5, 5)), BlockType::Surface);
    assert_eq!(terrain.get_voxel(VoxelPos::new(5, 5, 20)), BlockType::Exterior);
    // Far away resolves to exterior without any chunk.
    assert_eq!(
        terrain.get_voxel(VoxelPos::new(5, 5, 500)),
        BlockType::Exterior
    );

    assert!(terrain.get_collision(VoxelPos::new(5, 5, 3)));
    assert!(!terrain.get_collision(VoxelPos::new(5, 5, 20)));
}

#[test]
fn lighting_is_the_flat_sky_term() {
    let mut terrain = Terrain::new(headless_config()).expect("terrain");
    terrain.add_shape(ground_box());
    drain(&mut terrain, Vec3::new(0.0, 0.0, 8.0), 120.0);

    let lit = terrain.get_light(VoxelPos::new(5, 5, 5));
    assert!((lit - SKY_BRIGHTNESS * SKY_LIGHT_FACTOR).abs() < 1e-6);
    // Unloaded space reads as open sky.
    assert_eq!(terrain.get_light(VoxelPos::new(5, 5, 500)), SKY_BRIGHTNESS);
}

#[test]
fn repeated_updates_without_edits_are_idempotent() {
    let mut terrain = Terrain::new(headless_config()).expect("terrain");
    terrain.add_shape(ground_box());
    let center = Vec3::new(0.0, 0.0, 8.0);
    drain(&mut terrain, center, 120.0);

    let regen = terrain.regen_count();
    let mut generated = terrain.generated_positions();
    generated.sort_by_key(|p| (p.x, p.y, p.z));

    terrain.update(center, 120.0);
    terrain.update(center, 120.0);

    assert_eq!(terrain.regen_count(), regen, "no chunk should regenerate");
    let mut generated_after = terrain.generated_positions();
    generated_after.sort_by_key(|p| (p.x, p.y, p.z));
    assert_eq!(generated, generated_after);
}

#[test]
fn edits_redirty_exactly_the_overlapped_chunks() {
    let mut terrain = Terrain::new(headless_config()).expect("terrain");
    terrain.add_shape(ground_box());
    let center = Vec3::new(0.0, 0.0, 8.0);
    drain(&mut terrain, center, 120.0);
    let before = terrain.regen_count();

    // Carve a sphere near the origin corner. Its halo-expanded AABB spans
    // two chunks per axis.
    terrain.add_shape(Shape::sphere(
        Vec3::new(5.0, 5.0, 5.0),
        3.5,
        0,
        BlendOp::Subtraction,
    ));
    drain(&mut terrain, center, 120.0);

    assert_eq!(
        terrain.regen_count() - before,
        8,
        "exactly the 8 chunks touching the carve region regenerate"
    );
    // The carved voxel is air now.
    assert_eq!(terrain.get_voxel(VoxelPos::new(5, 5, 5)), BlockType::Exterior);
}

#[test]
fn full_pool_steals_the_lowest_priority_chunk() {
    let config = TerrainConfig {
        chunk_pool_capacity: 8,
        ..headless_config()
    };
    let mut terrain = Terrain::new(config).expect("terrain");
    terrain.add_shape(ground_box());

    let center = Vec3::new(8.0, 8.0, 6.0);
    drain(&mut terrain, center, 120.0);

    assert_eq!(terrain.generated_chunk_count(), 8);
    let generated = terrain.generated_positions();
    assert!(
        generated.contains(&ChunkPos::new(0, 0, 0)),
        "nearest surface chunk must survive stealing: {generated:?}"
    );

    // Move the viewer two chunks east; the set re-centers without ever
    // exceeding the pool.
    let moved = Vec3::new(72.0, 8.0, 6.0);
    drain(&mut terrain, moved, 120.0);
    assert!(terrain.generated_chunk_count() <= 8);
    let generated = terrain.generated_positions();
    assert!(
        generated.contains(&ChunkPos::new(1, 0, 0)),
        "chunks near the new viewer win slots: {generated:?}"
    );
}
