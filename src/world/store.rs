//! Chunk store
//!
//! A fixed-capacity arena of chunk records addressed by stable handles,
//! plus the sparse coordinate map and the vertex-count map with its three
//! sentinel states. Generated chunks are threaded onto an intrusive
//! doubly-linked list so eviction can walk exactly the chunks that own
//! meshes.

use std::collections::HashMap;

use crate::constants::chunk::CHUNK_CHECK_WORD;
use crate::constants::mesh::MAX_CHUNK_VERTS;
use crate::mesh::{TerrainIndex, TerrainVertex};
use crate::world::chunk::{ChunkPos, ChunkVoxelData};

/// Stable handle into the chunk arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkHandle(u32);

/// Entry of the vertex-count map. The sentinels are distinct from every
/// real count so one lookup answers "does this chunk need work".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexCount {
    /// Entirely outside the surface; stored by removing the map entry.
    Empty,
    /// Entirely inside the surface.
    Interior,
    /// Known to need generation, no current mesh.
    Dirty,
    /// Has a mesh with this many vertices.
    Count(u16),
}

impl VertexCount {
    /// Anything but fully-outside. Neighbor checks use this to bias the
    /// priority score toward the known surface.
    pub fn has_content(self) -> bool {
        !matches!(self, VertexCount::Empty)
    }

    pub fn mesh_count(self) -> Option<u16> {
        match self {
            VertexCount::Count(n) => Some(n),
            _ => None,
        }
    }
}

pub struct ChunkRecord {
    pub pos: ChunkPos,
    check: u32,
    /// Needs regeneration because an SDF edit overlapped it. Starts false:
    /// a fresh record has no extraction behind it and the scheduler sets
    /// the flag explicitly when edits land.
    pub geo_dirty: bool,
    pub light_dirty: bool,
    /// Voxel grids, present once the chunk has been generated.
    pub data: Option<Box<ChunkVoxelData>>,
    pub vertices: Vec<TerrainVertex>,
    /// Kept only when rendering is enabled; uploads happen from here.
    pub indices: Vec<TerrainIndex>,
    in_generated: bool,
    gen_prev: Option<ChunkHandle>,
    gen_next: Option<ChunkHandle>,
}

pub struct ChunkStore {
    slots: Vec<Option<ChunkRecord>>,
    free_slots: Vec<u32>,
    by_pos: HashMap<ChunkPos, ChunkHandle>,
    vertex_counts: HashMap<ChunkPos, VertexCount>,
    gen_head: Option<ChunkHandle>,
    gen_tail: Option<ChunkHandle>,
    live: usize,
}

impl ChunkStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            free_slots: (0..capacity as u32).rev().collect(),
            by_pos: HashMap::new(),
            vertex_counts: HashMap::new(),
            gen_head: None,
            gen_tail: None,
            live: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Take a record from the pool. Returns None when the pool is full;
    /// the coordinate map is not touched until the chunk is published.
    pub fn allocate(&mut self, pos: ChunkPos) -> Option<ChunkHandle> {
        let slot = self.free_slots.pop()?;
        debug_assert!(self.slots[slot as usize].is_none());
        self.slots[slot as usize] = Some(ChunkRecord {
            pos,
            check: CHUNK_CHECK_WORD,
            geo_dirty: false,
            light_dirty: true,
            data: None,
            vertices: Vec::new(),
            indices: Vec::new(),
            in_generated: false,
            gen_prev: None,
            gen_next: None,
        });
        self.live += 1;
        Some(ChunkHandle(slot))
    }

    /// Release a record: drops its mesh memory, unlinks it from the
    /// generated list and clears the coordinate map entry if it still
    /// points here. The vertex-count map is left alone so the world
    /// remembers what this coordinate held.
    pub fn free(&mut self, handle: ChunkHandle) {
        self.generated_unlink(handle);

        let record = match self.slots[handle.0 as usize].take() {
            Some(record) => record,
            None => {
                debug_assert!(false, "freeing a dead chunk handle");
                return;
            }
        };
        debug_assert_eq!(record.check, CHUNK_CHECK_WORD);

        if self.by_pos.get(&record.pos) == Some(&handle) {
            self.by_pos.remove(&record.pos);
        }

        self.free_slots.push(handle.0);
        self.live -= 1;
    }

    pub fn get(&self, pos: ChunkPos) -> Option<ChunkHandle> {
        let handle = *self.by_pos.get(&pos)?;
        debug_assert!(self.record(handle).is_some());
        Some(handle)
    }

    pub fn record(&self, handle: ChunkHandle) -> Option<&ChunkRecord> {
        let record = self.slots.get(handle.0 as usize)?.as_ref()?;
        debug_assert_eq!(record.check, CHUNK_CHECK_WORD);
        Some(record)
    }

    pub fn record_mut(&mut self, handle: ChunkHandle) -> Option<&mut ChunkRecord> {
        let record = self.slots.get_mut(handle.0 as usize)?.as_mut()?;
        debug_assert_eq!(record.check, CHUNK_CHECK_WORD);
        Some(record)
    }

    /// Point the coordinate map at a published chunk.
    pub fn bind_pos(&mut self, pos: ChunkPos, handle: ChunkHandle) {
        self.by_pos.insert(pos, handle);
    }

    /// Clear the coordinate map entry regardless of which handle owns it.
    pub fn unbind_pos(&mut self, pos: ChunkPos) {
        self.by_pos.remove(&pos);
    }

    pub fn vertex_count(&self, pos: ChunkPos) -> VertexCount {
        self.vertex_counts
            .get(&pos)
            .copied()
            .unwrap_or(VertexCount::Empty)
    }

    pub fn set_vertex_count(&mut self, pos: ChunkPos, count: VertexCount) {
        match count {
            VertexCount::Empty => {
                self.vertex_counts.remove(&pos);
            }
            VertexCount::Count(n) => {
                debug_assert!(n > 0 && (n as usize) < MAX_CHUNK_VERTS);
                self.vertex_counts.insert(pos, count);
            }
            _ => {
                self.vertex_counts.insert(pos, count);
            }
        }
    }

    pub fn generated_append(&mut self, handle: ChunkHandle) {
        let tail = self.gen_tail;
        {
            let record = match self.record_mut(handle) {
                Some(record) => record,
                None => return,
            };
            debug_assert!(!record.in_generated);
            record.in_generated = true;
            record.gen_prev = tail;
            record.gen_next = None;
        }
        match tail {
            Some(tail_handle) => {
                if let Some(tail_record) = self.record_mut(tail_handle) {
                    tail_record.gen_next = Some(handle);
                }
            }
            None => self.gen_head = Some(handle),
        }
        self.gen_tail = Some(handle);
    }

    fn generated_unlink(&mut self, handle: ChunkHandle) {
        let (prev, next, linked) = match self.record(handle) {
            Some(record) => (record.gen_prev, record.gen_next, record.in_generated),
            None => return,
        };
        if !linked {
            return;
        }

        match prev {
            Some(prev_handle) => {
                if let Some(prev_record) = self.record_mut(prev_handle) {
                    prev_record.gen_next = next;
                }
            }
            None => self.gen_head = next,
        }
        match next {
            Some(next_handle) => {
                if let Some(next_record) = self.record_mut(next_handle) {
                    next_record.gen_prev = prev;
                }
            }
            None => self.gen_tail = prev,
        }
        if let Some(record) = self.record_mut(handle) {
            record.in_generated = false;
            record.gen_prev = None;
            record.gen_next = None;
        }
    }

    pub fn generated_iter(&self) -> GeneratedIter<'_> {
        GeneratedIter {
            store: self,
            next: self.gen_head,
        }
    }
}

pub struct GeneratedIter<'a> {
    store: &'a ChunkStore,
    next: Option<ChunkHandle>,
}

impl Iterator for GeneratedIter<'_> {
    type Item = ChunkHandle;

    fn next(&mut self) -> Option<ChunkHandle> {
        let handle = self.next?;
        self.next = self.store.record(handle).and_then(|r| r.gen_next);
        Some(handle)
    }
}
