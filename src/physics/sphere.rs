//! Sphere collision against the generated surface
//!
//! Both queries work off the dual-contouring vertices (one per surface
//! voxel) rather than triangles: the sweep finds the earliest vertex the
//! moving sphere grazes, the push-out accumulates the normals of the
//! vertices already inside a resting sphere and projects it back out.

use glam::Vec3;

use crate::physics::Aabb;
use crate::world::chunk::VoxelPos;
use crate::world::terrain::Terrain;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SphereSweepHit {
    /// Travel distance before contact.
    pub distance: f32,
    pub normal: Vec3,
    /// The surface vertex that was struck.
    pub position: Vec3,
}

fn segment_point_distance(a: Vec3, b: Vec3, p: Vec3) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return (p - a).length();
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).length()
}

/// Entry distance of a ray from `origin` along normalized `dir` into a
/// sphere, None when it passes by.
fn ray_sphere_entry(center: Vec3, radius: f32, origin: Vec3, dir: Vec3) -> Option<f32> {
    let to_origin = origin - center;
    let b = to_origin.dot(dir);
    let c = to_origin.length_squared() - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let t = -b - disc.sqrt();
    if t < 0.0 {
        // Origin already inside.
        return Some(0.0);
    }
    Some(t)
}

impl Terrain {
    /// Earliest contact of a sphere moving along `ray`, if any.
    pub fn sweep_sphere(&self, sphere: Sphere, ray: Vec3) -> Option<SphereSweepHit> {
        let end = sphere.center + ray;
        let bounds = Aabb::from_sphere(sphere.center, sphere.radius)
            .union(&Aabb::from_sphere(end, sphere.radius));
        let min = bounds.min.floor().as_ivec3();
        let max = bounds.max.ceil().as_ivec3();

        let dir = ray.normalize_or_zero();
        let mut best: Option<SphereSweepHit> = None;
        let mut t_min = ray.length();

        for z in min.z..max.z {
            for y in min.y..max.y {
                for x in min.x..max.x {
                    let Some(vertex) = self.vertex_at(VoxelPos::new(x, y, z)) else {
                        continue;
                    };
                    let position = Vec3::from_array(vertex.position);

                    if segment_point_distance(sphere.center, end, position) > sphere.radius {
                        continue;
                    }
                    // Ignore vertices behind the direction of travel.
                    if ray.dot(position - sphere.center) <= 0.0 {
                        continue;
                    }

                    // Contact time is the entry of the reversed ray, cast
                    // from the vertex back into the sphere.
                    if let Some(t) = ray_sphere_entry(sphere.center, sphere.radius, position, -dir)
                    {
                        if t <= t_min {
                            t_min = t;
                            best = Some(SphereSweepHit {
                                distance: t,
                                normal: Vec3::from_array(vertex.normal).normalize_or_zero(),
                                position,
                            });
                        }
                    }
                }
            }
        }

        best
    }

    /// Offset that moves a resting sphere out of the surface, None when
    /// the sphere contains no surface vertices. The direction is the sum
    /// of the contained vertices' normals; the length is the largest
    /// projection of any vertex's surface displacement onto it.
    pub fn push_out_sphere(&self, sphere: Sphere) -> Option<Vec3> {
        let bounds = Aabb::from_sphere(sphere.center, sphere.radius);
        let min = bounds.min.floor().as_ivec3();
        let max = bounds.max.ceil().as_ivec3();

        let mut push_dir = Vec3::ZERO;
        for z in min.z..max.z {
            for y in min.y..max.y {
                for x in min.x..max.x {
                    let Some(vertex) = self.vertex_at(VoxelPos::new(x, y, z)) else {
                        continue;
                    };
                    let to_vert = Vec3::from_array(vertex.position) - sphere.center;
                    if to_vert.length_squared() > sphere.radius * sphere.radius {
                        continue;
                    }
                    push_dir += Vec3::from_array(vertex.normal).normalize_or_zero();
                }
            }
        }
        if push_dir == Vec3::ZERO {
            return None;
        }
        let push_dir = push_dir.normalize_or_zero();

        let mut push_length = 0.0_f32;
        for z in min.z..max.z {
            for y in min.y..max.y {
                for x in min.x..max.x {
                    let Some(vertex) = self.vertex_at(VoxelPos::new(x, y, z)) else {
                        continue;
                    };
                    let to_vert = Vec3::from_array(vertex.position) - sphere.center;
                    let c = to_vert.length_squared() - sphere.radius * sphere.radius;
                    if c > 0.0 {
                        continue;
                    }

                    let normal = Vec3::from_array(vertex.normal).normalize_or_zero();
                    let b = to_vert.dot(normal);
                    // Displacement from the sphere surface to the vertex
                    // along its normal; project onto the push direction.
                    let surface_to_vert = normal * (b + (b * b - c).sqrt());
                    push_length = push_length.max(push_dir.dot(surface_to_vert));
                }
            }
        }

        Some(push_dir * push_length)
    }
}
