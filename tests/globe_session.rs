use glam::{Vec2, Vec3, Vec4};
use hallowglobe::assets::{PropAsset, PropAssetNode};
use hallowglobe::config::AppConfig;
use hallowglobe::gizmo::{GizmoMode, SelectionState};
use hallowglobe::mesh::Mesh;
use hallowglobe::mesh_registry::MeshRegistry;
use hallowglobe::props::PropName;
use hallowglobe::scene::Transform3D;
use hallowglobe::session::{FrameInput, GlobeSession, SessionCommand};
use winit::dpi::PhysicalSize;

const VIEWPORT: PhysicalSize<u32> = PhysicalSize::new(1280, 720);

/// A single-node prop with a generous sphere mesh so pointer rays aimed at
/// its center reliably intersect. `offset` is in the prop's local frame
/// (scaled by the placement factor on install).
fn test_asset(name: PropName, offset: Vec3) -> PropAsset {
    PropAsset {
        name,
        nodes: vec![PropAssetNode {
            name: "body".to_string(),
            parent: None,
            transform: Transform3D::from_translation(offset),
            mesh: Some(Mesh::uv_sphere(1.5, 12, 8)),
            color: Vec4::ONE,
            transparent: false,
        }],
    }
}

fn world_center(name: PropName, offset: Vec3) -> Vec3 {
    let (translation, scale) = name.placement();
    translation + offset * scale
}

struct Harness {
    session: GlobeSession,
    registry: MeshRegistry,
}

impl Harness {
    fn new() -> Self {
        let registry = MeshRegistry::new();
        let session = GlobeSession::new(&AppConfig::default(), &registry);
        Self { session, registry }
    }

    fn install(&mut self, name: PropName, offset: Vec3) {
        self.session.install_prop(&test_asset(name, offset), &mut self.registry);
    }

    fn ndc_of(&self, world: Vec3) -> (Vec2, Vec2) {
        let px = self.session.camera().project_point(world, VIEWPORT).expect("point on screen");
        let ndc = Vec2::new(
            2.0 * px.x / VIEWPORT.width as f32 - 1.0,
            1.0 - 2.0 * px.y / VIEWPORT.height as f32,
        );
        (ndc, px)
    }

    fn tick_pointer(&mut self, world: Vec3, clicked: bool, left_held: bool) {
        let (ndc, px) = self.ndc_of(world);
        self.session.tick(&FrameInput {
            dt: 1.0 / 60.0,
            viewport: VIEWPORT,
            pointer_ndc: Some(ndc),
            cursor_px: Some(px),
            clicked,
            left_held,
            orbit_delta: Vec2::ZERO,
        });
    }

    fn tick_empty_space(&mut self, clicked: bool) {
        self.session.tick(&FrameInput {
            dt: 1.0 / 60.0,
            viewport: VIEWPORT,
            pointer_ndc: Some(Vec2::new(0.0, 0.97)),
            cursor_px: Some(Vec2::new(VIEWPORT.width as f32 * 0.5, 10.0)),
            clicked,
            left_held: clicked,
            orbit_delta: Vec2::ZERO,
        });
    }
}

#[test]
fn pumpkin_round_trip_toggle_pick_toggle() {
    let mut harness = Harness::new();
    harness.install(PropName::Pumpkin, Vec3::ZERO);
    let center = world_center(PropName::Pumpkin, Vec3::ZERO);

    // hidden by default: the pointer sits right on the mesh, still no pick
    harness.tick_pointer(center, false, false);
    assert!(harness.session.pick().is_none());

    harness.session.apply(SessionCommand::ToggleProp(PropName::Pumpkin));
    harness.tick_pointer(center, false, false);
    let hit = harness.session.pick().expect("visible pumpkin under the pointer");
    assert_eq!(hit.prop, PropName::Pumpkin);

    harness.session.apply(SessionCommand::ToggleProp(PropName::Pumpkin));
    harness.tick_pointer(center, false, false);
    assert!(harness.session.pick().is_none());
}

#[test]
fn click_prop_then_empty_space_ends_detached() {
    let mut harness = Harness::new();
    harness.install(PropName::Coffin, Vec3::ZERO);
    harness.session.apply(SessionCommand::ToggleProp(PropName::Coffin));
    let center = world_center(PropName::Coffin, Vec3::ZERO);

    harness.tick_pointer(center, true, true);
    assert!(matches!(
        harness.session.selection(),
        SelectionState::Attached { prop: PropName::Coffin, .. }
    ));

    harness.tick_pointer(center, false, false);
    harness.tick_empty_space(true);
    assert_eq!(harness.session.selection(), SelectionState::Detached);
}

#[test]
fn click_prop_a_then_prop_b_rebinds_to_b() {
    let mut harness = Harness::new();
    // offsets sit on the screen-horizontal axis for this camera
    harness.install(PropName::Coffin, Vec3::new(0.0, 0.0, 5.0));
    harness.install(PropName::Pumpkin, Vec3::new(0.0, 0.0, -5.0));
    harness.session.apply(SessionCommand::ToggleProp(PropName::Coffin));
    harness.session.apply(SessionCommand::ToggleProp(PropName::Pumpkin));

    harness.tick_pointer(world_center(PropName::Coffin, Vec3::new(0.0, 0.0, 5.0)), true, true);
    assert!(matches!(
        harness.session.selection(),
        SelectionState::Attached { prop: PropName::Coffin, .. }
    ));
    harness.tick_pointer(world_center(PropName::Coffin, Vec3::new(0.0, 0.0, 5.0)), false, false);

    harness.tick_pointer(world_center(PropName::Pumpkin, Vec3::new(0.0, 0.0, -5.0)), true, true);
    assert!(matches!(
        harness.session.selection(),
        SelectionState::Attached { prop: PropName::Pumpkin, .. }
    ));
}

#[test]
fn gizmo_drag_locks_out_the_orbit_camera() {
    let mut harness = Harness::new();
    harness.install(PropName::Caldron, Vec3::ZERO);
    harness.session.apply(SessionCommand::ToggleProp(PropName::Caldron));
    let center = world_center(PropName::Caldron, Vec3::ZERO);

    // attach, then press on the gizmo to start a drag
    harness.tick_pointer(center, true, true);
    harness.tick_pointer(center, false, false);
    harness.tick_pointer(center, true, true);
    assert!(harness.session.gizmo_dragging());

    // orbit input during the drag must be discarded
    let locked_position = harness.session.camera().position;
    let (ndc, px) = harness.ndc_of(center);
    harness.session.tick(&FrameInput {
        dt: 1.0 / 60.0,
        viewport: VIEWPORT,
        pointer_ndc: Some(ndc),
        cursor_px: Some(px),
        clicked: false,
        left_held: true,
        orbit_delta: Vec2::new(0.4, 0.0),
    });
    assert!((harness.session.camera().position - locked_position).length() < 1e-4);

    // release, then the same orbit input moves the camera again
    harness.tick_pointer(center, false, false);
    assert!(!harness.session.gizmo_dragging());
    harness.session.tick(&FrameInput {
        dt: 1.0 / 60.0,
        viewport: VIEWPORT,
        pointer_ndc: Some(ndc),
        cursor_px: Some(px),
        clicked: false,
        left_held: true,
        orbit_delta: Vec2::new(0.4, 0.0),
    });
    assert!((harness.session.camera().position - locked_position).length() > 0.1);
}

#[test]
fn rotate_mode_after_keypress_shows_only_the_vertical_axis() {
    let mut harness = Harness::new();
    harness.install(PropName::WitchHat, Vec3::ZERO);
    harness.session.apply(SessionCommand::ToggleProp(PropName::WitchHat));
    harness.session.apply(SessionCommand::SetGizmoMode(GizmoMode::Rotate));

    harness.tick_pointer(world_center(PropName::WitchHat, Vec3::ZERO), true, true);
    assert!(matches!(harness.session.selection(), SelectionState::Attached { .. }));
    let axes = harness.session.gizmo_axes();
    assert!(axes.y);
    assert!(!axes.x && !axes.z);
}

#[test]
fn slime_commands_generate_and_reset_the_pool() {
    let mut harness = Harness::new();
    assert_eq!(harness.session.slime_count(), 0);
    harness.session.apply(SessionCommand::GenerateSlime);
    assert_eq!(harness.session.slime_count(), 200);
    harness.tick_empty_space(false);
    assert_eq!(harness.session.slime_count(), 200);
    harness.session.apply(SessionCommand::ResetSlime);
    assert_eq!(harness.session.slime_count(), 0);
}

#[test]
fn toggling_an_unloaded_prop_is_harmless() {
    let mut harness = Harness::new();
    harness.session.apply(SessionCommand::ToggleProp(PropName::Coffin));
    assert!(!harness.session.prop_visible(PropName::Coffin));
    harness.tick_empty_space(false);

    // the asset arrives later and the next toggle works
    harness.install(PropName::Coffin, Vec3::ZERO);
    harness.session.apply(SessionCommand::ToggleProp(PropName::Coffin));
    assert!(harness.session.prop_visible(PropName::Coffin));
}
