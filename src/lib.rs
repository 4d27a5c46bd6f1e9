//! Terra Engine: a streaming voxel terrain core.
//!
//! The engine materializes an implicit surface, defined by a signed
//! distance field composed of editable primitive shapes, into one triangle
//! mesh per 32-voxel chunk around a moving viewer. A per-frame scheduler
//! dirties chunks overlapped by shape edits, prioritizes the view window,
//! runs dual-contouring extraction on a worker pool and publishes results
//! to the chunk store and a renderer collaborator. The same store answers
//! voxel, ray and sphere queries.
//!
//! ```no_run
//! use glam::Vec3;
//! use terra_engine::{BlendOp, Shape, Terrain, TerrainConfig};
//!
//! let mut terrain = Terrain::new(TerrainConfig::default())?;
//! let ground = Shape::cuboid(
//!     Vec3::new(0.0, 0.0, -50.0),
//!     Vec3::new(200.0, 200.0, 56.0),
//!     0,
//!     BlendOp::Union,
//! );
//! terrain.add_shape(ground);
//! terrain.update(Vec3::ZERO, 100.0);
//! # Ok::<(), terra_engine::TerrainError>(())
//! ```

pub mod constants;
pub mod error;
pub mod mesh;
pub mod physics;
pub mod renderer;
pub mod sdf;
pub mod thread_pool;
pub mod world;

pub use error::{TerrainError, TerrainResult};
pub use mesh::{TerrainIndex, TerrainVertex};
pub use physics::{Aabb, RaycastResult, Sphere, SphereSweepHit};
pub use renderer::{ChunkRenderer, NullRenderer};
pub use sdf::{BlendOp, HeightField, SdfField, Shape, ShapeEdit, ShapeId, ShapeKind};
pub use thread_pool::{InlinePool, RayonPool, WorkerPool};
pub use world::{BlockType, ChunkPos, Terrain, TerrainConfig, VertexCount, VoxelPos};
