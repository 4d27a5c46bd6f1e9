//! Renderer collaborator contract
//!
//! The engine never talks to a GPU. It hands finished chunk meshes to an
//! implementation of [`ChunkRenderer`] as packed bytes keyed by chunk
//! coordinate and asks it once per frame to draw the visible subset.

use glam::Mat4;

use crate::mesh::{TerrainIndex, TerrainVertex};
use crate::world::chunk::ChunkPos;

pub trait ChunkRenderer {
    /// A chunk's mesh is ready (or replaced). `vertex_bytes` is a packed
    /// `[TerrainVertex]` slice, `index_bytes` packed `u16` indices.
    fn upload_chunk(&mut self, pos: ChunkPos, vertex_bytes: &[u8], index_bytes: &[u8]);

    /// A chunk was freed or became empty; release its buffers.
    fn remove_chunk(&mut self, pos: ChunkPos);

    /// Draw the given chunks, highest priority first.
    fn draw_chunks(&mut self, view_projection: Mat4, visible: &[ChunkPos]);
}

/// Wire view of a vertex buffer.
pub fn vertex_bytes(vertices: &[TerrainVertex]) -> &[u8] {
    bytemuck::cast_slice(vertices)
}

/// Wire view of an index buffer.
pub fn index_bytes(indices: &[TerrainIndex]) -> &[u8] {
    bytemuck::cast_slice(indices)
}

/// Renderer that discards everything, for headless runs and tests.
pub struct NullRenderer;

impl ChunkRenderer for NullRenderer {
    fn upload_chunk(&mut self, _pos: ChunkPos, _vertex_bytes: &[u8], _index_bytes: &[u8]) {}
    fn remove_chunk(&mut self, _pos: ChunkPos) {}
    fn draw_chunks(&mut self, _view_projection: Mat4, _visible: &[ChunkPos]) {}
}
