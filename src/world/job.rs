//! Extraction job slots
//!
//! One slot per worker. A slot owns its SDF cache, scratch edge table and
//! output buffers behind a mutex the worker holds for the duration of a
//! run; the owner thread polls the atomic running flag and only touches
//! the scratch once the worker has let go. Slots are reused across jobs so
//! the big scratch allocations happen once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::constants::mesh::{EDGE_TABLE_LEN, MAX_CHUNK_INDICES, MAX_CHUNK_VERTS};
use crate::mesh::extractor::extract_chunk;
use crate::mesh::{EdgeCrossings, ExtractResult, TerrainIndex, TerrainVertex};
use crate::sdf::{SdfCache, SdfField};
use crate::world::chunk::{ChunkPos, ChunkVoxelData};
use crate::world::store::ChunkHandle;

pub struct JobOutput {
    pub result: ExtractResult,
    pub grids: Option<Box<ChunkVoxelData>>,
}

pub struct JobScratch {
    cache: SdfCache,
    edges: Vec<EdgeCrossings>,
    pub vertices: Vec<TerrainVertex>,
    pub indices: Vec<TerrainIndex>,
    pub output: Option<JobOutput>,
}

impl JobScratch {
    fn new(field: Arc<SdfField>) -> Self {
        Self {
            cache: SdfCache::new(field),
            edges: vec![EdgeCrossings::default(); EDGE_TABLE_LEN],
            vertices: Vec::with_capacity(MAX_CHUNK_VERTS),
            indices: Vec::with_capacity(MAX_CHUNK_INDICES),
            output: None,
        }
    }

    fn run(&mut self, pos: ChunkPos, field: &Arc<SdfField>) {
        self.cache.generate(pos, Arc::clone(field));
        let mut grids = ChunkVoxelData::new_boxed();
        let result = extract_chunk(
            pos,
            &self.cache,
            &mut self.edges,
            &mut grids,
            &mut self.vertices,
            &mut self.indices,
        );
        self.output = Some(JobOutput {
            result,
            grids: Some(grids),
        });
    }
}

struct JobShared {
    running: AtomicBool,
    scratch: Mutex<JobScratch>,
}

pub struct TerrainJob {
    has_job: bool,
    pos: ChunkPos,
    chunk: Option<ChunkHandle>,
    shared: Arc<JobShared>,
}

impl TerrainJob {
    pub fn new(field: Arc<SdfField>) -> Self {
        Self {
            has_job: false,
            pos: ChunkPos::new(0, 0, 0),
            chunk: None,
            shared: Arc::new(JobShared {
                running: AtomicBool::new(false),
                scratch: Mutex::new(JobScratch::new(field)),
            }),
        }
    }

    pub fn has_job(&self) -> bool {
        self.has_job
    }

    /// Whether this slot is working on (or holding results for) `pos`.
    pub fn has_chunk(&self, pos: ChunkPos) -> bool {
        self.has_job && self.pos == pos
    }

    pub fn chunk(&self) -> Option<ChunkHandle> {
        self.chunk
    }

    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    /// The worker is done and the owner has not yet collected the result.
    pub fn is_pending_finish(&self) -> bool {
        self.has_job && !self.shared.running.load(Ordering::Acquire)
    }

    /// Claim the slot for a chunk and build the task to hand to the worker
    /// pool (or run inline when the pool has no threads).
    pub fn start(
        &mut self,
        pos: ChunkPos,
        chunk: ChunkHandle,
        field: Arc<SdfField>,
    ) -> impl FnOnce() + Send + 'static {
        debug_assert!(!self.has_job, "previous job not finished");

        self.has_job = true;
        self.pos = pos;
        self.chunk = Some(chunk);
        self.shared.running.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        move || {
            {
                let mut scratch = shared.scratch.lock();
                scratch.run(pos, &field);
            }
            shared.running.store(false, Ordering::Release);
        }
    }

    /// Owner-side access to the scratch after the worker finished.
    pub fn with_scratch<R>(&self, f: impl FnOnce(&mut JobScratch) -> R) -> R {
        debug_assert!(!self.shared.running.load(Ordering::Acquire));
        f(&mut self.shared.scratch.lock())
    }

    /// Release the slot for reuse.
    pub fn finish(&mut self) {
        debug_assert!(self.has_job);
        debug_assert!(!self.shared.running.load(Ordering::Acquire));
        self.has_job = false;
        self.chunk = None;
    }
}
