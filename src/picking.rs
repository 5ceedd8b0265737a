use crate::camera3d::Camera3D;
use crate::props::PropName;
use crate::scene::{NodeId, SceneGraph};
use glam::{Mat4, Vec2, Vec3};
use winit::dpi::PhysicalSize;

/// Result of a pick: the nearest qualifying mesh node and the prop that owns
/// it. Recomputed every frame, never cached.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PickHit {
    pub prop: PropName,
    pub root: NodeId,
    pub node: NodeId,
    pub distance: f32,
}

pub fn ray_sphere_intersection(origin: Vec3, dir: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let oc = origin - center;
    let b = oc.dot(dir);
    let c = oc.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt_d = discriminant.sqrt();
    let mut t = -b - sqrt_d;
    if t < 0.0 {
        t = -b + sqrt_d;
    }
    if t < 0.0 {
        return None;
    }
    Some(t)
}

pub fn ray_aabb_intersection(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> Option<(f32, Vec3)> {
    let mut t_min: f32 = 0.0;
    let mut t_max: f32 = f32::INFINITY;
    let origin_arr = origin.to_array();
    let dir_arr = dir.to_array();
    let min_arr = min.to_array();
    let max_arr = max.to_array();
    for i in 0..3 {
        let o = origin_arr[i];
        let d = dir_arr[i];
        let min_axis = min_arr[i];
        let max_axis = max_arr[i];
        if d.abs() < 1e-6 {
            if o < min_axis || o > max_axis {
                return None;
            }
        } else {
            let inv_d = 1.0 / d;
            let mut t1 = (min_axis - o) * inv_d;
            let mut t2 = (max_axis - o) * inv_d;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return None;
            }
        }
    }
    if t_max < 0.0 {
        return None;
    }
    let t_hit = if t_min >= 0.0 { t_min } else { t_max };
    Some((t_hit, origin + dir * t_hit))
}

pub fn intersect_ray_plane(origin: Vec3, dir: Vec3, plane_origin: Vec3, normal: Vec3) -> Option<Vec3> {
    let denom = dir.dot(normal);
    if denom.abs() < 1e-6 {
        return None;
    }
    let t = (plane_origin - origin).dot(normal) / denom;
    if t < 0.0 {
        return None;
    }
    Some(origin + dir * t)
}

pub fn matrix_is_finite(mat: &Mat4) -> bool {
    mat.to_cols_array().iter().all(|v| v.is_finite())
}

/// Ray against a node's bounds in its world frame. Falls back to a bounding
/// sphere when the world matrix cannot be inverted cleanly.
fn ray_hit_node(origin: Vec3, dir: Vec3, world: &Mat4, scene: &SceneGraph, node: NodeId) -> Option<f32> {
    let bounds = &scene.mesh(node)?.bounds;
    let inv = world.inverse();
    if matrix_is_finite(&inv) {
        let origin_local = inv.transform_point3(origin);
        let dir_local = inv.transform_vector3(dir);
        if dir_local.length_squared() > f32::EPSILON {
            let dir_local = dir_local.normalize();
            if let Some((t_local, hit_local)) = ray_aabb_intersection(origin_local, dir_local, bounds.min, bounds.max) {
                if t_local >= 0.0 {
                    let hit_world = world.transform_point3(hit_local);
                    return Some((hit_world - origin).length());
                }
            }
            return None;
        }
    }
    let center = world.transform_point3(bounds.center);
    let scale = world.to_scale_rotation_translation().0;
    let radius = bounds.radius * scale.x.abs().max(scale.y.abs()).max(scale.z.abs()).max(0.0001);
    ray_sphere_intersection(origin, dir, center, radius)
}

/// Front-most visible pick. Every mesh node of every candidate subtree is
/// intersected, hits are sorted nearest-first, and the walk accepts the
/// first hit whose own node and whose candidate root are both visible.
pub fn resolve(
    ndc: Vec2,
    camera: &Camera3D,
    viewport: PhysicalSize<u32>,
    scene: &SceneGraph,
    candidates: &[(PropName, NodeId)],
) -> Option<PickHit> {
    if candidates.is_empty() {
        return None;
    }
    let (origin, dir) = camera.ndc_ray(ndc, viewport)?;
    let mut hits: Vec<PickHit> = Vec::new();
    for &(prop, root) in candidates {
        for node in scene.mesh_nodes(root) {
            let world = scene.world_transform(node);
            if let Some(distance) = ray_hit_node(origin, dir, &world, scene, node) {
                hits.push(PickHit { prop, root, node, distance });
            }
        }
    }
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits.into_iter().find(|hit| scene.visible_in_hierarchy(hit.node) && scene.visible(hit.root))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_hits_sphere_head_on() {
        let t = ray_sphere_intersection(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z, Vec3::ZERO, 1.0);
        assert!((t.expect("hit") - 4.0).abs() < 1e-5);
    }

    #[test]
    fn ray_from_inside_a_sphere_still_hits() {
        let t = ray_sphere_intersection(Vec3::ZERO, Vec3::X, Vec3::ZERO, 2.0);
        assert!((t.expect("hit") - 2.0).abs() < 1e-5);
    }

    #[test]
    fn aabb_slab_test_rejects_misses() {
        let hit = ray_aabb_intersection(Vec3::new(5.0, 5.0, 5.0), Vec3::X, -Vec3::ONE, Vec3::ONE);
        assert!(hit.is_none());
    }

    #[test]
    fn plane_behind_the_ray_is_rejected() {
        let hit = intersect_ray_plane(Vec3::new(0.0, 0.0, 5.0), Vec3::Z, Vec3::ZERO, Vec3::Z);
        assert!(hit.is_none());
    }
}
