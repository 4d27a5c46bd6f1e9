//! Terrain vertex layout
//!
//! This struct is the wire format: chunks upload their vertex buffers to
//! the renderer as the raw bytes of a `[TerrainVertex]` slice, so the
//! layout is `repr(C)` and bytemuck-castable.

use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    /// World-space position.
    pub position: [f32; 3],
    /// Smoothed surface normal (average of the voxel's edge gradients).
    pub normal: [f32; 3],
    /// Packed per-vertex info bytes (lighting channel and flags).
    pub info: [u8; 4],
    /// One-hot material weights, 0 or 255 per channel; hardware
    /// interpolation across a triangle blends materials naturally.
    pub materials: [u8; 4],
}

/// Index type of the chunk meshes.
pub type TerrainIndex = u16;

const _: () = assert!(std::mem::size_of::<TerrainVertex>() == 32);
