//! World state: chunks, the chunk store, extraction jobs and the
//! per-frame scheduler.

pub mod chunk;
pub mod job;
pub mod store;
pub mod terrain;

pub use chunk::{BlockType, ChunkPos, ChunkVoxelData, VoxelPos};
pub use store::{ChunkHandle, ChunkStore, VertexCount};
pub use terrain::{Terrain, TerrainConfig};

#[cfg(test)]
mod tests;
