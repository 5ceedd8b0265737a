use crate::config::SlimeConfig;
use crate::mesh::MeshBounds;
use crate::scene::{MeshInstance, NodeId, SceneGraph, Transform3D};
use glam::{Vec3, Vec4};
use rand::Rng;

pub const SLIME_MESH_KEY: &str = "slime";
const SLIME_COLOR: Vec4 = Vec4::new(0.36, 0.78, 0.22, 0.9);

/// Kinematic state of one slime blob. Render handles live in a parallel map
/// on the field, never on the particle itself.
#[derive(Clone, Copy, Debug)]
pub struct SlimeParticle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub radius: f32,
}

/// Bounded pool of falling slime. Particles recycle in place: once a blob
/// drops past the floor its position is resampled at the ceiling while the
/// velocity sampled at spawn time is kept.
pub struct SlimeField {
    params: SlimeConfig,
    mesh_bounds: MeshBounds,
    particles: Vec<SlimeParticle>,
    nodes: Vec<NodeId>,
}

impl SlimeField {
    pub fn new(params: SlimeConfig, mesh_bounds: MeshBounds) -> Self {
        Self { params, mesh_bounds, particles: Vec::new(), nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[SlimeParticle] {
        &self.particles
    }

    pub fn params(&self) -> &SlimeConfig {
        &self.params
    }

    /// (Re)populate the pool. Any previous pool is fully cleared first so no
    /// scene nodes leak across generations.
    pub fn spawn_pool(&mut self, scene: &mut SceneGraph) {
        self.clear(scene);
        let mut rng = rand::thread_rng();
        self.particles.reserve(self.params.count);
        self.nodes.reserve(self.params.count);
        for _ in 0..self.params.count {
            let position = self.sample_spawn_point(&mut rng);
            let velocity = Vec3::new(
                rng.gen_range(-self.params.drift_max..=self.params.drift_max),
                -rng.gen_range(self.params.fall_speed_min..=self.params.fall_speed_max),
                rng.gen_range(-self.params.drift_max..=self.params.drift_max),
            );
            let radius = rng.gen_range(self.params.radius_min..=self.params.radius_max);
            let node = scene.spawn(
                "slime",
                Transform3D { translation: position, scale: Vec3::splat(radius), ..Transform3D::default() },
                None,
            );
            scene.set_mesh(
                node,
                MeshInstance {
                    key: SLIME_MESH_KEY.to_string(),
                    bounds: self.mesh_bounds,
                    color: SLIME_COLOR,
                    transparent: true,
                },
            );
            self.particles.push(SlimeParticle { position, velocity, radius });
            self.nodes.push(node);
        }
    }

    /// One simulation step: integrate, recycle below the floor, push the new
    /// positions into the scene nodes.
    pub fn advance(&mut self, scene: &mut SceneGraph, dt: f32) {
        let mut rng = rand::thread_rng();
        let params = self.params.clone();
        for (particle, &node) in self.particles.iter_mut().zip(self.nodes.iter()) {
            particle.position += particle.velocity * dt;
            if particle.position.y < params.floor_y {
                particle.position = Vec3::new(
                    (rng.gen::<f32>() - 0.5) * params.spawn_extent_x,
                    params.ceiling_y,
                    (rng.gen::<f32>() - 0.5) * params.spawn_extent_z,
                );
            }
            scene.set_translation(node, particle.position);
        }
    }

    /// Remove every particle and its scene node in one step; the pool is
    /// never rendered half-cleared.
    pub fn clear(&mut self, scene: &mut SceneGraph) {
        for node in self.nodes.drain(..) {
            scene.despawn(node);
        }
        self.particles.clear();
    }

    fn sample_spawn_point(&self, rng: &mut impl Rng) -> Vec3 {
        Vec3::new(
            (rng.gen::<f32>() - 0.5) * self.params.spawn_extent_x,
            self.params.ceiling_y,
            (rng.gen::<f32>() - 0.5) * self.params.spawn_extent_z,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;

    fn make_field() -> (SlimeField, SceneGraph) {
        let mesh = Mesh::uv_sphere(1.0, 8, 6);
        (SlimeField::new(SlimeConfig::default(), mesh.bounds), SceneGraph::new())
    }

    #[test]
    fn spawn_pool_fills_to_the_configured_count() {
        let (mut field, mut scene) = make_field();
        field.spawn_pool(&mut scene);
        assert_eq!(field.len(), 200);
        for particle in field.particles() {
            assert!((particle.position.y - 5.0).abs() < f32::EPSILON);
            assert!(particle.position.x.abs() <= 10.0);
            assert!(particle.position.z.abs() <= 10.0);
            assert!(particle.velocity.y < 0.0);
            assert!(particle.radius >= 0.05 && particle.radius <= 0.15);
        }
    }

    #[test]
    fn respawn_replaces_the_previous_pool_without_leaking_nodes() {
        let (mut field, mut scene) = make_field();
        field.spawn_pool(&mut scene);
        field.spawn_pool(&mut scene);
        assert_eq!(field.len(), 200);
        assert_eq!(scene.draw_list().len(), 200);
    }

    #[test]
    fn advance_only_ever_lowers_or_recycles() {
        let (mut field, mut scene) = make_field();
        field.spawn_pool(&mut scene);
        let mut previous: Vec<f32> = field.particles().iter().map(|p| p.position.y).collect();
        for _ in 0..600 {
            field.advance(&mut scene, 1.0 / 60.0);
            for (particle, prev) in field.particles().iter().zip(previous.iter()) {
                let y = particle.position.y;
                let recycled = (y - field.params().ceiling_y).abs() < f32::EPSILON;
                assert!(y < *prev || recycled, "y rose without a recycle: {prev} -> {y}");
            }
            previous = field.particles().iter().map(|p| p.position.y).collect();
        }
    }

    #[test]
    fn one_step_after_spawn_everything_is_below_the_ceiling() {
        let (mut field, mut scene) = make_field();
        field.spawn_pool(&mut scene);
        field.advance(&mut scene, 1.0 / 60.0);
        assert_eq!(field.len(), 200);
        for particle in field.particles() {
            assert!(particle.position.y < field.params().ceiling_y);
        }
    }

    #[test]
    fn clear_empties_pool_and_scene() {
        let (mut field, mut scene) = make_field();
        field.spawn_pool(&mut scene);
        field.clear(&mut scene);
        assert!(field.is_empty());
        assert!(scene.draw_list().is_empty());
    }
}
