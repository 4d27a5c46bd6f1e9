// Query-layer integration: fast vs SDF-refined raycast agreement over
// random rays, sphere sweeps onto the ground, and sphere push-out.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use terra_engine::{BlendOp, Shape, Sphere, Terrain, TerrainConfig};

fn headless_config() -> TerrainConfig {
    TerrainConfig {
        worker_threads: 0,
        render_enabled: false,
        chunk_pool_capacity: 256,
        view_chunk_budget: 256,
    }
}

fn ground_box() -> Shape {
    Shape::cuboid(
        Vec3::new(0.0, 0.0, -40.0),
        Vec3::new(48.0, 48.0, 46.0),
        0,
        BlendOp::Union,
    )
}

fn drain(terrain: &mut Terrain, center: Vec3, radius: f32) {
    let mut last = u64::MAX;
    let mut stable = 0;
    for _ in 0..2000 {
        terrain.update(center, radius);
        if terrain.pending_job_count() == 0 && terrain.regen_count() == last {
            stable += 1;
            if stable >= 3 {
                return;
            }
        } else {
            stable = 0;
        }
        last = terrain.regen_count();
    }
    panic!("terrain never quiesced");
}

fn carved_ground() -> Terrain {
    let mut terrain = Terrain::new(headless_config()).expect("terrain");
    terrain.add_shape(ground_box());
    terrain.add_shape(Shape::sphere(
        Vec3::new(5.0, 5.0, 5.0),
        3.5,
        0,
        BlendOp::Subtraction,
    ));
    drain(&mut terrain, Vec3::new(0.0, 0.0, 8.0), 120.0);
    terrain
}

#[test]
fn fast_and_precise_raycasts_agree_on_flat_ground() {
    let terrain = carved_ground();
    let mut rng = StdRng::seed_from_u64(0x7e44a1);

    let mut tested = 0;
    while tested < 100 {
        // Aim at the flat part of the slab, away from the carve bowl.
        let target = Vec3::new(rng.gen_range(14.0..30.0), rng.gen_range(14.0..30.0), 6.0);
        let start = target + Vec3::new(rng.gen_range(-4.0..4.0), rng.gen_range(-4.0..4.0), 20.0);
        let ray = (target - start).normalize() * 40.0;

        let fast = terrain.raycast_fast(start, ray, true);
        let precise = terrain.raycast(start, ray);
        if !fast.hit || !precise.hit {
            continue;
        }
        tested += 1;

        assert!(
            (fast.distance - precise.distance).abs() < 0.1,
            "fast {} vs precise {}",
            fast.distance,
            precise.distance
        );
        assert!(
            fast.normal.dot(precise.normal) > 0.95,
            "fast {:?} vs precise {:?}",
            fast.normal,
            precise.normal
        );
    }
}

#[test]
fn sweep_sphere_lands_on_the_ground() {
    let terrain = carved_ground();

    // Drop a half-unit sphere straight down over flat ground.
    let sphere = Sphere::new(Vec3::new(20.5, 20.5, 10.0), 0.5);
    let hit = terrain
        .sweep_sphere(sphere, Vec3::new(0.0, 0.0, -8.0))
        .expect("sphere lands on the slab");

    // Ground vertices sit at z = 6; contact comes half a radius early.
    assert!((hit.distance - 3.5).abs() < 0.2, "distance {}", hit.distance);
    assert!(hit.normal.z > 0.9);
    assert!((hit.position.z - 6.0).abs() < 0.2);

    // A sweep through open air finds nothing.
    assert!(terrain
        .sweep_sphere(Sphere::new(Vec3::new(20.5, 20.5, 30.0), 0.5), Vec3::new(8.0, 0.0, 0.0))
        .is_none());
}

#[test]
fn push_out_sphere_resolves_ground_penetration() {
    let terrain = carved_ground();

    // Straddling the flat floor: vertices at z = 6 are inside the sphere.
    let sphere = Sphere::new(Vec3::new(20.5, 20.5, 6.3), 0.5);
    let offset = terrain
        .push_out_sphere(sphere)
        .expect("sphere overlaps the surface");
    assert!(offset.z > 0.0, "push must be upward: {offset:?}");

    // After applying the offset no surface vertex remains inside.
    let resolved = Sphere::new(sphere.center + offset, sphere.radius);
    match terrain.push_out_sphere(resolved) {
        None => {}
        Some(residual) => assert!(
            residual.length() < 1e-3,
            "residual penetration: {residual:?}"
        ),
    }

    // A sphere hovering above the ground needs no correction.
    assert!(terrain
        .push_out_sphere(Sphere::new(Vec3::new(20.5, 20.5, 8.0), 0.5))
        .is_none());
}

#[test]
fn voxel_raycast_sees_the_slab_as_occluder() {
    let terrain = carved_ground();

    // Downward probe hits the ground.
    assert!(terrain.voxel_raycast(Vec3::new(20.5, 20.5, 12.0), Vec3::new(0.0, 0.0, -10.0), 0));
    // Horizontal probe above the ground stays clear.
    assert!(!terrain.voxel_raycast(Vec3::new(20.5, 20.5, 12.0), Vec3::new(10.0, 0.0, 0.0), 0));
}
