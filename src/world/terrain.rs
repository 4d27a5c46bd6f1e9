//! Terrain engine core
//!
//! Owns the chunk store, the SDF shape store and the job slots, and runs
//! the per-frame scheduler: propagate dirty edits, enumerate the view
//! window, sort by priority, collect finished jobs, commit pending SDF
//! edits while the pool is idle, then dispatch new jobs (stealing the
//! lowest-priority generated chunk when the pool is full).
//!
//! Everything here runs on the owner thread. Workers only ever see an
//! `Arc<SdfField>` snapshot and their own job scratch.

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::constants::core::CHUNK_SIZE_F32;
use crate::constants::lighting::{SKY_BRIGHTNESS, SKY_LIGHT_FACTOR};
use crate::constants::mesh::INVALID_VERTEX_INDEX;
use crate::constants::sdf::SDF_HALO;
use crate::error::TerrainResult;
use crate::mesh::{ExtractResult, TerrainIndex, TerrainVertex};
use crate::physics::Aabb;
use crate::renderer::{index_bytes, vertex_bytes, ChunkRenderer};
use crate::sdf::{SdfField, SdfStore, Shape, ShapeEdit, ShapeId};
use crate::thread_pool::{InlinePool, RayonPool, WorkerPool};
use crate::world::chunk::{BlockType, ChunkPos, ChunkVoxelData, VoxelPos};
use crate::world::job::TerrainJob;
use crate::world::store::{ChunkHandle, ChunkStore, VertexCount};

/// Runtime configuration. Compile-time tunables live in `constants`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainConfig {
    /// Background extraction threads; 0 runs one job inline per frame.
    pub worker_threads: u32,
    /// When false the renderer upload/draw path is skipped entirely.
    pub render_enabled: bool,
    /// Fixed chunk pool size; exceeding it triggers slot stealing.
    pub chunk_pool_capacity: usize,
    /// Most chunks handed to the renderer in one draw call.
    pub view_chunk_budget: usize,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            render_enabled: true,
            chunk_pool_capacity: 1024,
            view_chunk_budget: 512,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ChunkSort {
    pos: ChunkPos,
    chunk: Option<ChunkHandle>,
    score: f32,
}

pub struct Terrain {
    config: TerrainConfig,
    pub(crate) store: ChunkStore,
    sdf: SdfStore,
    jobs: Vec<TerrainJob>,
    pool: Arc<dyn WorkerPool>,
    /// Scratch for phase B; keyed by coordinate so duplicates overwrite.
    sort_map: HashMap<ChunkPos, ChunkSort>,
    /// Phase C output, kept until the next update for rendering and
    /// stealing decisions.
    sorted: Vec<ChunkSort>,
    collision: [bool; BlockType::COUNT],
    center: Vec3,
    radius: f32,
    regen_count: u64,
    pending_uploads: Vec<ChunkPos>,
    pending_removes: Vec<ChunkPos>,
}

impl Terrain {
    /// Build the engine with its own worker pool sized from the config.
    pub fn new(config: TerrainConfig) -> TerrainResult<Self> {
        let pool: Arc<dyn WorkerPool> = if config.worker_threads > 0 {
            Arc::new(RayonPool::new(config.worker_threads as usize)?)
        } else {
            Arc::new(InlinePool)
        };
        Self::with_pool(config, pool)
    }

    /// Build the engine around a borrowed worker pool collaborator.
    pub fn with_pool(config: TerrainConfig, pool: Arc<dyn WorkerPool>) -> TerrainResult<Self> {
        if config.chunk_pool_capacity == 0 {
            return Err(crate::error::TerrainError::InvalidConfig(
                "chunk_pool_capacity must be nonzero".into(),
            ));
        }

        let sdf = SdfStore::default();
        let job_count = pool.worker_count().max(1);
        let jobs = (0..job_count)
            .map(|_| TerrainJob::new(sdf.committed()))
            .collect();

        let mut collision = [true; BlockType::COUNT];
        collision[BlockType::Exterior as usize] = false;
        collision[BlockType::Unloaded as usize] = false;

        Ok(Self {
            store: ChunkStore::new(config.chunk_pool_capacity),
            sdf,
            jobs,
            pool,
            sort_map: HashMap::new(),
            sorted: Vec::new(),
            collision,
            center: Vec3::ZERO,
            radius: 0.0,
            regen_count: 0,
            pending_uploads: Vec::new(),
            pending_removes: Vec::new(),
            config,
        })
    }

    // ---------------------------------------------------------------
    // SDF shape API (staged; applied when the worker pool drains)
    // ---------------------------------------------------------------

    pub fn add_shape(&mut self, shape: Shape) -> ShapeId {
        self.sdf.add_shape(shape)
    }

    pub fn update_shape(&mut self, id: ShapeId, edit: ShapeEdit) {
        self.sdf.update_shape(id, edit);
    }

    pub fn set_shape_transform(&mut self, id: ShapeId, transform: Mat4) {
        self.sdf.update_shape(
            id,
            ShapeEdit {
                transform: Some(transform),
                ..Default::default()
            },
        );
    }

    pub fn remove_shape(&mut self, id: ShapeId) {
        self.sdf.remove_shape(id);
    }

    pub fn shape_aabb(&self, id: ShapeId) -> Option<Aabb> {
        self.sdf.shape_aabb(id)
    }

    /// The field snapshot queries should evaluate.
    pub fn field(&self) -> Arc<SdfField> {
        self.sdf.committed()
    }

    // ---------------------------------------------------------------
    // World queries
    // ---------------------------------------------------------------

    pub fn vertex_count(&self, pos: ChunkPos) -> VertexCount {
        self.store.vertex_count(pos)
    }

    pub fn get_voxel(&self, pos: VoxelPos) -> BlockType {
        let chunk_pos = pos.to_chunk_pos();
        match self.store.vertex_count(chunk_pos) {
            VertexCount::Empty => BlockType::Exterior,
            VertexCount::Dirty => BlockType::Unloaded,
            VertexCount::Interior => BlockType::Interior,
            VertexCount::Count(_) => {
                let data = self
                    .store
                    .get(chunk_pos)
                    .and_then(|h| self.store.record(h))
                    .and_then(|r| r.data.as_deref());
                match data {
                    Some(data) => {
                        let (x, y, z) = pos.to_local_pos();
                        data.classification[x][y][z]
                    }
                    None => BlockType::Unloaded,
                }
            }
        }
    }

    pub fn get_voxel_at(&self, pos: Vec3) -> BlockType {
        self.get_voxel(VoxelPos::from_world_pos(pos))
    }

    /// Per-block-type collision, configurable via [`Terrain::set_collision`].
    pub fn get_collision(&self, pos: VoxelPos) -> bool {
        self.collision[self.get_voxel(pos) as usize]
    }

    pub fn get_collision_at(&self, pos: Vec3) -> bool {
        self.collision[self.get_voxel_at(pos) as usize]
    }

    pub fn set_collision(&mut self, block: BlockType, collides: bool) {
        self.collision[block as usize] = collides;
    }

    /// Stored light value; unloaded regions read as open sky.
    pub fn get_light(&self, pos: VoxelPos) -> f32 {
        let data = self
            .store
            .get(pos.to_chunk_pos())
            .and_then(|h| self.store.record(h))
            .and_then(|r| r.data.as_deref());
        match data {
            Some(data) => {
                let (x, y, z) = pos.to_local_pos();
                data.light[x][y][z]
            }
            None => SKY_BRIGHTNESS,
        }
    }

    /// The dual-contouring vertex a surface voxel produced, if any.
    pub(crate) fn vertex_at(&self, pos: VoxelPos) -> Option<&TerrainVertex> {
        let chunk_pos = pos.to_chunk_pos();
        self.store.vertex_count(chunk_pos).mesh_count()?;

        let record = self.store.get(chunk_pos).and_then(|h| self.store.record(h))?;
        let data = record.data.as_deref()?;
        let (x, y, z) = pos.to_local_pos();
        let index = data.vertex_index[x][y][z];
        if index == INVALID_VERTEX_INDEX {
            return None;
        }
        record.vertices.get(index as usize)
    }

    // ---------------------------------------------------------------
    // Observability
    // ---------------------------------------------------------------

    /// Number of finished extraction jobs collected so far.
    pub fn regen_count(&self) -> u64 {
        self.regen_count
    }

    pub fn pending_job_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.has_job()).count()
    }

    pub fn generated_chunk_count(&self) -> usize {
        self.store.generated_iter().count()
    }

    pub fn generated_positions(&self) -> Vec<ChunkPos> {
        self.store
            .generated_iter()
            .filter_map(|h| self.store.record(h))
            .map(|r| r.pos)
            .collect()
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn viewer_center(&self) -> Vec3 {
        self.center
    }

    pub fn view_radius(&self) -> f32 {
        self.radius
    }

    // ---------------------------------------------------------------
    // Scheduling
    // ---------------------------------------------------------------

    /// Distance-based priority, squared for chunks with no non-empty
    /// neighbor so the frontier of the known surface wins ties. Finds
    /// surface chunks much sooner during bulk loads.
    fn chunk_score(&self, pos: ChunkPos) -> f32 {
        let center_distance = (self.center - pos.aabb().center()).length();

        let neighbors = [
            pos.offset(1, 0, 0),
            pos.offset(0, 1, 0),
            pos.offset(0, 0, 1),
            pos.offset(-1, 0, 0),
            pos.offset(0, -1, 0),
            pos.offset(0, 0, -1),
        ];
        let has_neighbor = neighbors
            .iter()
            .any(|n| self.store.vertex_count(*n).has_content());

        if has_neighbor {
            center_distance
        } else {
            center_distance * center_distance
        }
    }

    /// Mark every chunk intersecting `aabb` (grown by the cache halo, so
    /// boundary samples are refreshed too) as needing regeneration.
    fn mark_dirty_region(&mut self, aabb: &Aabb) {
        let aabb = aabb.expanded(SDF_HALO as f32);
        let min = (aabb.min / CHUNK_SIZE_F32).floor().as_ivec3();
        let max = (aabb.max / CHUNK_SIZE_F32).ceil().as_ivec3();
        log::trace!("dirty region {:?}..{:?} (chunks {min}..{max})", aabb.min, aabb.max);

        for z in min.z..max.z {
            for y in min.y..max.y {
                for x in min.x..max.x {
                    let pos = ChunkPos::new(x, y, z);
                    match self.store.get(pos) {
                        Some(handle) => {
                            if let Some(record) = self.store.record_mut(handle) {
                                record.geo_dirty = true;
                            }
                        }
                        None => {
                            self.store.set_vertex_count(pos, VertexCount::Dirty);
                        }
                    }
                }
            }
        }
    }

    /// One frame of scheduling around the viewer.
    pub fn update(&mut self, center: Vec3, radius: f32) {
        self.center = center;
        self.radius = radius;

        // Phase A: propagate shape edits into chunk dirty state.
        let mut dirty_regions: Vec<Aabb> = Vec::new();
        self.sdf.drain_dirty(|aabb| dirty_regions.push(*aabb));
        for aabb in &dirty_regions {
            self.mark_dirty_region(aabb);
        }

        // Phase B: enumerate candidate chunks in the view sphere.
        self.sort_map.clear();
        let view_chunk_radius = (radius / CHUNK_SIZE_F32) as i32;
        let view_diam = view_chunk_radius * 2;
        let view_chunk = (center / CHUNK_SIZE_F32).round().as_ivec3();
        for k in 0..view_diam {
            for j in 0..view_diam {
                for i in 0..view_diam {
                    let pos = ChunkPos::new(
                        i - view_chunk_radius + view_chunk.x,
                        j - view_chunk_radius + view_chunk.y,
                        k - view_chunk_radius + view_chunk.z,
                    );
                    if (center - pos.aabb().center()).length() >= radius {
                        continue;
                    }

                    let count = self.store.vertex_count(pos);
                    if matches!(count, VertexCount::Empty | VertexCount::Interior) {
                        continue;
                    }

                    let chunk = self.store.get(pos);
                    debug_assert!(
                        chunk.is_none() || count.mesh_count().is_some(),
                        "published chunk without a real vertex count at {pos:?}"
                    );

                    let sort = ChunkSort {
                        pos,
                        chunk,
                        score: self.chunk_score(pos),
                    };
                    self.sort_map.insert(pos, sort);
                }
            }
        }
        // Generated chunks stay tracked regardless of distance so the ones
        // that drifted out of the window can be evicted.
        let generated: Vec<ChunkHandle> = self.store.generated_iter().collect();
        for handle in generated {
            let Some(pos) = self.store.record(handle).map(|r| r.pos) else {
                continue;
            };
            let sort = ChunkSort {
                pos,
                chunk: Some(handle),
                score: self.chunk_score(pos),
            };
            self.sort_map.insert(pos, sort);
        }

        // Phase C: sort ascending; lowest score is dispatched first.
        self.sorted.clear();
        self.sorted.extend(self.sort_map.values().copied());
        self.sorted.sort_by(|a, b| a.score.total_cmp(&b.score));

        // Phase D: publish finished jobs. Done after sorting so workers
        // overlap with the enumeration above.
        for job_index in 0..self.jobs.len() {
            if self.jobs[job_index].is_pending_finish() {
                self.finish_job(job_index);
            }
        }

        // Phase E: commit SDF edits only while nothing is reading the
        // field; with edits pending and workers busy, starting more jobs
        // would only produce stale chunks.
        let workers = self.pool.worker_count();
        if workers == 0 || self.pool.idle_count() == workers {
            self.sdf.commit_pending();
        } else if self.sdf.has_pending() {
            return;
        }

        // Phase F: dispatch.
        self.dispatch_jobs();
    }

    fn finish_job(&mut self, job_index: usize) {
        let pos = self.jobs[job_index].pos();
        let Some(new_handle) = self.jobs[job_index].chunk() else {
            debug_assert!(false, "pending job without a chunk");
            self.jobs[job_index].finish();
            return;
        };

        enum Outcome {
            Sentinel(VertexCount),
            Mesh {
                grids: Box<ChunkVoxelData>,
                vertices: Vec<TerrainVertex>,
                indices: Vec<TerrainIndex>,
            },
        }

        let render_enabled = self.config.render_enabled;
        let outcome = self.jobs[job_index].with_scratch(|scratch| {
            let Some(mut output) = scratch.output.take() else {
                debug_assert!(false, "finished job without output");
                return Outcome::Sentinel(VertexCount::Empty);
            };
            match output.result {
                ExtractResult::Empty => Outcome::Sentinel(VertexCount::Empty),
                ExtractResult::Interior => Outcome::Sentinel(VertexCount::Interior),
                ExtractResult::Mesh {
                    vertex_count,
                    index_count,
                } => Outcome::Mesh {
                    grids: output
                        .grids
                        .take()
                        .unwrap_or_else(ChunkVoxelData::new_boxed),
                    vertices: scratch.vertices[..vertex_count].to_vec(),
                    indices: if render_enabled {
                        scratch.indices[..index_count].to_vec()
                    } else {
                        Vec::new()
                    },
                },
            }
        });

        log::trace!("finish chunk job at {pos:?}");
        self.regen_count += 1;
        let old_handle = self.store.get(pos);

        match outcome {
            Outcome::Mesh {
                mut grids,
                vertices,
                indices,
            } => {
                // Lighting is a flat sky term for now; fill it while the
                // grids are exclusively ours.
                let light = SKY_BRIGHTNESS * SKY_LIGHT_FACTOR;
                for plane in grids.light.iter_mut() {
                    for row in plane.iter_mut() {
                        row.fill(light);
                    }
                }

                // An edit may have landed while the job ran; carry the old
                // chunk's dirty flag so the refresh is not lost.
                let carry_dirty = old_handle
                    .and_then(|h| self.store.record(h))
                    .map(|r| r.geo_dirty)
                    .unwrap_or(false);

                let vertex_count = vertices.len();
                if let Some(record) = self.store.record_mut(new_handle) {
                    record.data = Some(grids);
                    record.vertices = vertices;
                    record.indices = indices;
                    record.geo_dirty = carry_dirty;
                    record.light_dirty = false;
                }

                if let Some(old) = old_handle {
                    for entry in self.sorted.iter_mut() {
                        if entry.chunk == Some(old) {
                            entry.chunk = Some(new_handle);
                        }
                    }
                    self.store.free(old);
                }

                self.store
                    .set_vertex_count(pos, VertexCount::Count(vertex_count as u16));
                self.store.bind_pos(pos, new_handle);
                self.store.generated_append(new_handle);
                if render_enabled {
                    self.pending_uploads.push(pos);
                }
            }
            Outcome::Sentinel(sentinel) => {
                self.store.free(new_handle);
                if let Some(old) = old_handle {
                    for entry in self.sorted.iter_mut() {
                        if entry.chunk == Some(old) {
                            entry.chunk = None;
                        }
                    }
                    self.store.free(old);
                    if render_enabled {
                        self.pending_removes.push(pos);
                    }
                }
                self.store.set_vertex_count(pos, sentinel);
                self.store.unbind_pos(pos);
            }
        }

        self.jobs[job_index].finish();
    }

    fn dispatch_jobs(&mut self) {
        let workers = self.pool.worker_count();

        let mut i = 0;
        while i < self.sorted.len() {
            let entry = self.sorted[i];
            let pos = entry.pos;

            let index_chunk = self.store.get(pos);
            let chunk = match entry.chunk {
                Some(handle) => {
                    debug_assert_eq!(index_chunk, Some(handle));
                    debug_assert!(self.store.vertex_count(pos) != VertexCount::Dirty);
                    Some(handle)
                }
                // Pick up chunks that finished generating after sorting.
                None => index_chunk,
            };

            let geo_dirty = chunk
                .and_then(|h| self.store.record(h))
                .map(|r| r.geo_dirty)
                .unwrap_or(false);
            if chunk.is_some() && !geo_dirty {
                i += 1;
                continue;
            }

            if workers > 0 && self.pool.idle_count() == 0 {
                break;
            }
            let Some(job_index) = self.jobs.iter().position(|j| !j.has_job()) else {
                break;
            };
            if self.jobs.iter().any(|j| j.has_chunk(pos)) {
                // Already queued.
                i += 1;
                continue;
            }

            let mut chunk_dirty = false;
            if let Some(handle) = chunk {
                if let Some(record) = self.store.record_mut(handle) {
                    if record.geo_dirty {
                        // Cleared before dispatch, not at completion, so
                        // edits landing mid-job dirty the chunk again.
                        record.geo_dirty = false;
                        chunk_dirty = true;
                    }
                }
            }

            // Even dirty refreshes generate into a fresh record; the old
            // one keeps rendering until the swap.
            let mut new_chunk = self.store.allocate(pos);
            if new_chunk.is_none() {
                new_chunk = self.steal_slot(entry.score, pos, chunk_dirty);
            }
            let Some(new_chunk) = new_chunk else {
                // Every slot is held by a higher-priority chunk.
                log::debug!("chunk loading reached equilibrium");
                break;
            };

            log::trace!("start chunk job at {pos:?}");
            let task = self.jobs[job_index].start(pos, new_chunk, self.sdf.committed());
            if workers > 0 {
                self.pool.push(Box::new(task));
            } else {
                task();
                break;
            }

            i += 1;
        }
    }

    /// Free the lowest-priority generated chunk so `pos` can allocate.
    /// Only the first generated entry from the back is considered; dirty
    /// refreshes always win, otherwise the victim must score worse.
    fn steal_slot(
        &mut self,
        score: f32,
        pos: ChunkPos,
        chunk_dirty: bool,
    ) -> Option<ChunkHandle> {
        while let Some(last) = self.sorted.last().copied() {
            match last.chunk {
                Some(victim) => {
                    if chunk_dirty || last.score > score {
                        if self.config.render_enabled {
                            self.pending_removes.push(last.pos);
                        }
                        self.store.free(victim);
                        self.sorted.pop();
                        return self.store.allocate(pos);
                    }
                    return None;
                }
                None => {
                    self.sorted.pop();
                }
            }
        }
        None
    }

    /// Hand pending uploads and the visible subset to the renderer.
    pub fn render(&mut self, renderer: &mut dyn ChunkRenderer, view_projection: Mat4) {
        if !self.config.render_enabled {
            return;
        }

        for pos in self.pending_removes.drain(..) {
            renderer.remove_chunk(pos);
        }

        let uploads = std::mem::take(&mut self.pending_uploads);
        for pos in uploads {
            // Re-validate: the chunk may have been stolen since publish.
            if let Some(record) = self.store.get(pos).and_then(|h| self.store.record(h)) {
                renderer.upload_chunk(
                    pos,
                    vertex_bytes(&record.vertices),
                    index_bytes(&record.indices),
                );
            }
        }

        let mut visible = Vec::with_capacity(self.config.view_chunk_budget.min(self.sorted.len()));
        for entry in &self.sorted {
            if visible.len() >= self.config.view_chunk_budget {
                break;
            }
            if let Some(handle) = entry.chunk {
                debug_assert!(self
                    .store
                    .record(handle)
                    .is_some_and(|r| !r.vertices.is_empty()));
                visible.push(entry.pos);
            }
        }
        renderer.draw_chunks(view_projection, &visible);
    }
}
