// Terra Engine constants - single source of truth
//
// Compile-time tunables for chunking, extraction and the SDF cache.
// Everything that has to agree between the extractor, the chunk store and
// the queries lives here.

/// Core chunking constants
pub mod core {
    /// Chunk edge length in voxels. A voxel at integer (x,y,z) belongs to
    /// chunk floor((x,y,z)/CHUNK_SIZE).
    pub const CHUNK_SIZE: usize = 32;
    pub const CHUNK_SIZE_I32: i32 = CHUNK_SIZE as i32;
    pub const CHUNK_SIZE_F32: f32 = CHUNK_SIZE as f32;
    pub const VOXELS_PER_CHUNK: usize = CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE;
}

/// Mesh extraction constants
pub mod mesh {
    /// Upper bound on vertices per chunk. Must fit the u16 index type with
    /// room for the vertex-count sentinels.
    pub const MAX_CHUNK_VERTS: usize = 10_000;
    /// Upper bound on indices per chunk.
    pub const MAX_CHUNK_INDICES: usize = MAX_CHUNK_VERTS * 4;
    /// Sentinel for "this voxel has no vertex".
    pub const INVALID_VERTEX_INDEX: u16 = u16::MAX;
    /// Scratch edge table edge length: one voxel of slack on each side of
    /// the chunk so halo voxels can record their crossings.
    pub const EDGE_TABLE_DIM: usize = super::core::CHUNK_SIZE + 2;
    pub const EDGE_TABLE_LEN: usize = EDGE_TABLE_DIM * EDGE_TABLE_DIM * EDGE_TABLE_DIM;

    const _: () = assert!(
        MAX_CHUNK_VERTS < INVALID_VERTEX_INDEX as usize,
        "vertex count must fit the u16 index type"
    );
}

/// SDF sampling constants
pub mod sdf {
    /// Halo of extra samples around each chunk's cache. The outermost edge
    /// crossings sit at local coordinate CHUNK_SIZE+1, the derivative
    /// probes 0.2 voxels past them, and trilinear lookups read one more
    /// integer sample up, so anything below 3 reads out of range.
    pub const SDF_HALO: i32 = 3;
    /// Cache grid edge length, halo included.
    pub const CACHE_DIM: usize = super::core::CHUNK_SIZE + 2 * SDF_HALO as usize;
    /// Midpoint-search iteration cap when locating an edge crossing.
    pub const EDGE_SEARCH_STEPS: u32 = 16;
    /// Convergence threshold for edge crossings.
    pub const EDGE_SEARCH_EPSILON: f32 = 1e-3;
    /// Exact field zeros are nudged to this value so a point on the surface
    /// cannot produce two coincident vertices.
    pub const ZERO_NUDGE: f32 = 1e-4;
    /// Step used by the central-difference derivative, in voxels.
    pub const DERIVATIVE_EPSILON: f32 = 0.2;
}

/// Lighting constants
pub mod lighting {
    /// Brightness of unoccluded sky.
    pub const SKY_BRIGHTNESS: f32 = 1.0;
    /// Flat attenuation applied to every voxel in lieu of occlusion casts.
    pub const SKY_LIGHT_FACTOR: f32 = 0.7125 * 0.85;
}

/// Chunk record bookkeeping constants
pub mod chunk {
    /// Check word stamped into every live chunk record; trips
    /// use-after-free in debug builds.
    pub const CHUNK_CHECK_WORD: u32 = 0xCDCD_CDCD;
}
