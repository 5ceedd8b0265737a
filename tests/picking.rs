use glam::{Vec2, Vec3, Vec4};
use hallowglobe::camera3d::Camera3D;
use hallowglobe::mesh::Mesh;
use hallowglobe::picking;
use hallowglobe::props::{PropName, PropRegistry};
use hallowglobe::scene::{MeshInstance, NodeId, SceneGraph, Transform3D};
use winit::dpi::PhysicalSize;

const VIEWPORT: PhysicalSize<u32> = PhysicalSize::new(1280, 720);

fn camera() -> Camera3D {
    Camera3D::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, 50.0_f32.to_radians(), 0.1, 100.0)
}

fn spawn_prop(scene: &mut SceneGraph, translation: Vec3) -> NodeId {
    let root = scene.spawn("prop", Transform3D::from_translation(translation), None);
    let mesh = Mesh::uv_sphere(1.0, 12, 8);
    scene.set_mesh(
        root,
        MeshInstance { key: "test".into(), bounds: mesh.bounds, color: Vec4::ONE, transparent: false },
    );
    root
}

#[test]
fn nearest_visible_candidate_wins() {
    let mut scene = SceneGraph::new();
    let near = spawn_prop(&mut scene, Vec3::new(0.0, 0.0, 5.0));
    let far = spawn_prop(&mut scene, Vec3::new(0.0, 0.0, -5.0));
    scene.update_world_transforms();

    let candidates = vec![(PropName::Coffin, far), (PropName::Pumpkin, near)];
    let hit = picking::resolve(Vec2::ZERO, &camera(), VIEWPORT, &scene, &candidates).expect("hit");
    assert_eq!(hit.prop, PropName::Pumpkin);
    assert!(hit.distance < 6.0);
}

#[test]
fn hidden_mesh_yields_the_candidate_behind_it() {
    let mut scene = SceneGraph::new();
    let near = spawn_prop(&mut scene, Vec3::new(0.0, 0.0, 5.0));
    let far = spawn_prop(&mut scene, Vec3::new(0.0, 0.0, -5.0));
    scene.set_visible(near, false);
    scene.update_world_transforms();

    // the near prop still sits in the candidate list; the visibility walk
    // must skip it and accept the far one
    let candidates = vec![(PropName::Coffin, far), (PropName::Pumpkin, near)];
    let hit = picking::resolve(Vec2::ZERO, &camera(), VIEWPORT, &scene, &candidates).expect("hit");
    assert_eq!(hit.prop, PropName::Coffin);
}

#[test]
fn no_candidates_resolves_to_no_pick() {
    let scene = SceneGraph::new();
    assert!(picking::resolve(Vec2::ZERO, &camera(), VIEWPORT, &scene, &[]).is_none());
}

#[test]
fn ray_off_to_the_side_misses() {
    let mut scene = SceneGraph::new();
    let prop = spawn_prop(&mut scene, Vec3::ZERO);
    scene.update_world_transforms();
    let candidates = vec![(PropName::Pumpkin, prop)];
    let hit = picking::resolve(Vec2::new(0.95, 0.95), &camera(), VIEWPORT, &scene, &candidates);
    assert!(hit.is_none());
}

#[test]
fn child_meshes_of_a_prop_hierarchy_are_pickable() {
    let mut scene = SceneGraph::new();
    let root = scene.spawn("prop", Transform3D::default(), None);
    let child =
        scene.spawn("part", Transform3D::from_translation(Vec3::new(0.0, 0.0, 2.0)), Some(root));
    let mesh = Mesh::uv_sphere(0.5, 12, 8);
    scene.set_mesh(
        child,
        MeshInstance { key: "part".into(), bounds: mesh.bounds, color: Vec4::ONE, transparent: false },
    );
    scene.update_world_transforms();

    let candidates = vec![(PropName::WitchHat, root)];
    let hit = picking::resolve(Vec2::ZERO, &camera(), VIEWPORT, &scene, &candidates).expect("hit");
    assert_eq!(hit.node, child);
    assert_eq!(hit.root, root);
}

#[test]
fn scaled_and_rotated_props_still_intersect() {
    let mut scene = SceneGraph::new();
    let root = scene.spawn(
        "prop",
        Transform3D {
            translation: Vec3::new(0.0, 0.0, 2.0),
            rotation: glam::Quat::from_rotation_y(0.7),
            scale: Vec3::new(0.4, 1.2, 0.4),
        },
        None,
    );
    let mesh = Mesh::uv_sphere(1.0, 12, 8);
    scene.set_mesh(
        root,
        MeshInstance { key: "test".into(), bounds: mesh.bounds, color: Vec4::ONE, transparent: false },
    );
    scene.update_world_transforms();
    let candidates = vec![(PropName::Caldron, root)];
    assert!(picking::resolve(Vec2::ZERO, &camera(), VIEWPORT, &scene, &candidates).is_some());
}

#[test]
fn picking_never_returns_a_prop_hidden_by_the_registry() {
    let mut scene = SceneGraph::new();
    let root = spawn_prop(&mut scene, Vec3::ZERO);
    let mut registry = PropRegistry::new();
    registry.register(PropName::Pumpkin, root, &mut scene);
    scene.update_world_transforms();

    // hidden: the candidate set is empty, so any pointer coordinate misses
    for ndc in [Vec2::ZERO, Vec2::new(0.2, -0.3), Vec2::new(-0.8, 0.8)] {
        let hit = picking::resolve(
            ndc,
            &camera(),
            VIEWPORT,
            &scene,
            &registry.visible_interactive_roots(),
        );
        assert!(hit.is_none(), "hidden prop was picked at {ndc:?}");
    }

    registry.toggle(PropName::Pumpkin, &mut scene);
    let hit = picking::resolve(
        Vec2::ZERO,
        &camera(),
        VIEWPORT,
        &scene,
        &registry.visible_interactive_roots(),
    );
    assert!(hit.is_some());
}
