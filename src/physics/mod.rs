//! Spatial queries against the terrain: AABBs, voxel-grid raycasts and
//! sphere collision.

pub mod aabb;
pub mod raycast;
pub mod sphere;

pub use aabb::Aabb;
pub use raycast::RaycastResult;
pub use sphere::{Sphere, SphereSweepHit};
