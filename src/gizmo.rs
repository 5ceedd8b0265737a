use crate::camera3d::Camera3D;
use crate::picking::{intersect_ray_plane, PickHit};
use crate::props::{PropName, PropRegistry};
use crate::scene::{NodeId, SceneGraph};
use glam::{Quat, Vec2, Vec3};
use winit::dpi::PhysicalSize;

/// Screen-space radius around the attached prop's projected center within
/// which a press grabs the gizmo instead of re-picking.
pub(crate) const GIZMO_GRAB_RADIUS_PX: f32 = 48.0;
pub(crate) const SCALE_MIN_RATIO: f32 = 0.05;
pub(crate) const SCALE_MAX_RATIO: f32 = 20.0;
const MIN_SCALE: f32 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GizmoMode {
    #[default]
    Translate,
    Rotate,
    Scale,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisMask {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl GizmoMode {
    pub fn label(self) -> &'static str {
        match self {
            GizmoMode::Translate => "Translate",
            GizmoMode::Rotate => "Rotate",
            GizmoMode::Scale => "Scale",
        }
    }

    /// Handles shown per mode. Rotation is constrained to the vertical axis;
    /// translate and scale expose all three.
    pub fn axis_mask(self) -> AxisMask {
        match self {
            GizmoMode::Translate | GizmoMode::Scale => AxisMask { x: true, y: true, z: true },
            GizmoMode::Rotate => AxisMask { x: false, y: true, z: false },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SelectionState {
    Detached,
    Attached { prop: PropName, root: NodeId },
}

#[derive(Clone, Copy, Debug)]
enum GizmoInteraction {
    Translate { plane_origin: Vec3, plane_normal: Vec3, offset: Vec3 },
    Rotate { start_rotation: Quat, start_vector: Vec3 },
    Scale { start_scale: Vec3, start_distance: f32, plane_normal: Vec3 },
}

/// Binds the manipulation gizmo to at most one prop at a time and owns the
/// camera input lock: exactly one of {orbit camera, gizmo} consumes a given
/// pointer drag.
pub struct TransformGizmo {
    mode: GizmoMode,
    state: SelectionState,
    interaction: Option<GizmoInteraction>,
}

impl Default for TransformGizmo {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformGizmo {
    pub fn new() -> Self {
        Self { mode: GizmoMode::default(), state: SelectionState::Detached, interaction: None }
    }

    pub fn mode(&self) -> GizmoMode {
        self.mode
    }

    /// Mode persists across attach/detach cycles; it only changes the handles
    /// the next interaction uses.
    pub fn set_mode(&mut self, mode: GizmoMode) {
        self.mode = mode;
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn attached_root(&self) -> Option<NodeId> {
        match self.state {
            SelectionState::Attached { root, .. } => Some(root),
            SelectionState::Detached => None,
        }
    }

    /// True while a drag is in progress; the orbit camera must stand down.
    pub fn dragging(&self) -> bool {
        self.interaction.is_some()
    }

    /// Click transition. A hit on a visible prop attaches (re-clicking the
    /// current target is a no-op); a miss detaches, even when the user only
    /// meant to re-aim the camera.
    pub fn handle_click(&mut self, pick: Option<&PickHit>, props: &PropRegistry) {
        match pick {
            Some(hit) => {
                if !props.is_visible(hit.prop) {
                    return;
                }
                if let SelectionState::Attached { prop, .. } = self.state {
                    if prop == hit.prop {
                        return;
                    }
                }
                self.state = SelectionState::Attached { prop: hit.prop, root: hit.root };
                self.interaction = None;
            }
            None => {
                self.state = SelectionState::Detached;
                self.interaction = None;
            }
        }
    }

    /// True when a press at `cursor_px` lands on the gizmo of the attached
    /// prop rather than in empty space.
    pub fn press_grabs_gizmo(
        &self,
        cursor_px: Vec2,
        camera: &Camera3D,
        viewport: PhysicalSize<u32>,
        scene: &SceneGraph,
    ) -> bool {
        let Some(root) = self.attached_root() else {
            return false;
        };
        let center = scene.world_transform(root).w_axis.truncate();
        match camera.project_point(center, viewport) {
            Some(center_px) => cursor_px.distance(center_px) <= GIZMO_GRAB_RADIUS_PX,
            None => false,
        }
    }

    /// Start a drag for the current mode. Sets the camera input lock until
    /// `end_drag`.
    pub fn begin_drag(&mut self, ray: (Vec3, Vec3), camera: &Camera3D, scene: &SceneGraph) -> bool {
        let Some(root) = self.attached_root() else {
            return false;
        };
        let (ray_origin, ray_dir) = ray;
        let center = scene.world_transform(root).w_axis.truncate();
        let interaction = match self.mode {
            GizmoMode::Translate => {
                let plane_normal = camera.forward();
                if plane_normal.length_squared() <= f32::EPSILON {
                    return false;
                }
                let hit = match intersect_ray_plane(ray_origin, ray_dir, center, plane_normal) {
                    Some(hit) => hit,
                    None => return false,
                };
                GizmoInteraction::Translate { plane_origin: center, plane_normal, offset: center - hit }
            }
            GizmoMode::Rotate => {
                let hit = match intersect_ray_plane(ray_origin, ray_dir, center, Vec3::Y) {
                    Some(hit) => hit,
                    None => return false,
                };
                let start_vector = hit - center;
                if start_vector.length_squared() <= f32::EPSILON {
                    return false;
                }
                GizmoInteraction::Rotate { start_rotation: scene.local_transform(root).rotation, start_vector }
            }
            GizmoMode::Scale => {
                let plane_normal = camera.forward();
                let hit = match intersect_ray_plane(ray_origin, ray_dir, center, plane_normal) {
                    Some(hit) => hit,
                    None => return false,
                };
                let start_distance = (hit - center).length();
                if start_distance <= f32::EPSILON {
                    return false;
                }
                GizmoInteraction::Scale {
                    start_scale: scene.local_transform(root).scale,
                    start_distance,
                    plane_normal,
                }
            }
        };
        self.interaction = Some(interaction);
        true
    }

    /// Continue an active drag with a fresh pointer ray, writing the result
    /// into the attached prop's transform.
    pub fn update_drag(&mut self, ray: (Vec3, Vec3), scene: &mut SceneGraph) {
        let Some(root) = self.attached_root() else {
            self.interaction = None;
            return;
        };
        let (ray_origin, ray_dir) = ray;
        let Some(interaction) = self.interaction else {
            return;
        };
        match interaction {
            GizmoInteraction::Translate { plane_origin, plane_normal, offset } => {
                if let Some(hit) = intersect_ray_plane(ray_origin, ray_dir, plane_origin, plane_normal) {
                    scene.set_translation(root, hit + offset);
                }
            }
            GizmoInteraction::Rotate { start_rotation, start_vector } => {
                let center = scene.world_transform(root).w_axis.truncate();
                if let Some(hit) = intersect_ray_plane(ray_origin, ray_dir, center, Vec3::Y) {
                    let start = start_vector.normalize_or_zero();
                    let current = (hit - center).normalize_or_zero();
                    if start.length_squared() > f32::EPSILON && current.length_squared() > f32::EPSILON {
                        let dot = start.dot(current).clamp(-1.0, 1.0);
                        let sin = start.cross(current).dot(Vec3::Y);
                        let delta = sin.atan2(dot);
                        scene.set_rotation(root, Quat::from_rotation_y(delta) * start_rotation);
                    }
                }
            }
            GizmoInteraction::Scale { start_scale, start_distance, plane_normal } => {
                let center = scene.world_transform(root).w_axis.truncate();
                if let Some(hit) = intersect_ray_plane(ray_origin, ray_dir, center, plane_normal) {
                    let distance = (hit - center).length();
                    if distance > f32::EPSILON && start_distance > f32::EPSILON {
                        let ratio = (distance / start_distance).clamp(SCALE_MIN_RATIO, SCALE_MAX_RATIO);
                        let scaled = (start_scale * ratio).max(Vec3::splat(MIN_SCALE));
                        scene.set_scale(root, scaled);
                    }
                }
            }
        }
    }

    /// Release the drag and the camera input lock.
    pub fn end_drag(&mut self) {
        self.interaction = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Transform3D;

    fn setup() -> (SceneGraph, PropRegistry, NodeId, NodeId) {
        let mut scene = SceneGraph::new();
        let coffin = scene.spawn("coffin", Transform3D::default(), None);
        let pumpkin = scene.spawn("pumpkin", Transform3D::default(), None);
        let mut props = PropRegistry::new();
        props.register(PropName::Coffin, coffin, &mut scene);
        props.register(PropName::Pumpkin, pumpkin, &mut scene);
        props.toggle(PropName::Coffin, &mut scene);
        props.toggle(PropName::Pumpkin, &mut scene);
        (scene, props, coffin, pumpkin)
    }

    fn hit(prop: PropName, root: NodeId) -> PickHit {
        PickHit { prop, root, node: root, distance: 1.0 }
    }

    #[test]
    fn click_on_prop_then_empty_space_detaches() {
        let (_scene, props, coffin, _pumpkin) = setup();
        let mut gizmo = TransformGizmo::new();
        gizmo.handle_click(Some(&hit(PropName::Coffin, coffin)), &props);
        assert!(matches!(gizmo.state(), SelectionState::Attached { prop: PropName::Coffin, .. }));
        gizmo.handle_click(None, &props);
        assert_eq!(gizmo.state(), SelectionState::Detached);
    }

    #[test]
    fn click_on_second_prop_rebinds() {
        let (_scene, props, coffin, pumpkin) = setup();
        let mut gizmo = TransformGizmo::new();
        gizmo.handle_click(Some(&hit(PropName::Coffin, coffin)), &props);
        gizmo.handle_click(Some(&hit(PropName::Pumpkin, pumpkin)), &props);
        assert!(matches!(gizmo.state(), SelectionState::Attached { prop: PropName::Pumpkin, .. }));
    }

    #[test]
    fn invisible_target_is_rejected() {
        let (mut scene, mut props, coffin, _pumpkin) = setup();
        props.toggle(PropName::Coffin, &mut scene); // hide again
        let mut gizmo = TransformGizmo::new();
        gizmo.handle_click(Some(&hit(PropName::Coffin, coffin)), &props);
        assert_eq!(gizmo.state(), SelectionState::Detached);
    }

    #[test]
    fn mode_persists_across_attach_cycles() {
        let (_scene, props, coffin, _pumpkin) = setup();
        let mut gizmo = TransformGizmo::new();
        gizmo.set_mode(GizmoMode::Rotate);
        gizmo.handle_click(Some(&hit(PropName::Coffin, coffin)), &props);
        gizmo.handle_click(None, &props);
        assert_eq!(gizmo.mode(), GizmoMode::Rotate);
    }

    #[test]
    fn rotate_mode_exposes_only_the_vertical_axis() {
        assert_eq!(GizmoMode::Rotate.axis_mask(), AxisMask { x: false, y: true, z: false });
        assert_eq!(GizmoMode::Translate.axis_mask(), AxisMask { x: true, y: true, z: true });
        assert_eq!(GizmoMode::Scale.axis_mask(), AxisMask { x: true, y: true, z: true });
    }

    #[test]
    fn drag_sets_and_releases_the_camera_lock() {
        let (mut scene, props, coffin, _pumpkin) = setup();
        scene.update_world_transforms();
        let mut gizmo = TransformGizmo::new();
        gizmo.handle_click(Some(&hit(PropName::Coffin, coffin)), &props);
        let camera = Camera3D::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 0.9, 0.1, 100.0);
        let ray = (camera.position, Vec3::NEG_Z);
        assert!(gizmo.begin_drag(ray, &camera, &scene));
        assert!(gizmo.dragging());
        gizmo.end_drag();
        assert!(!gizmo.dragging());
    }

    #[test]
    fn translate_drag_follows_the_pointer_plane() {
        let (mut scene, props, coffin, _pumpkin) = setup();
        scene.update_world_transforms();
        let mut gizmo = TransformGizmo::new();
        gizmo.handle_click(Some(&hit(PropName::Coffin, coffin)), &props);
        let camera = Camera3D::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 0.9, 0.1, 100.0);
        assert!(gizmo.begin_drag((camera.position, Vec3::NEG_Z), &camera, &scene));
        let sideways = (Vec3::new(1.0, 0.0, -5.0)).normalize();
        gizmo.update_drag((camera.position, sideways), &mut scene);
        let moved = scene.local_transform(coffin).translation;
        assert!(moved.x > 0.5, "drag should move the prop sideways, got {moved:?}");
        assert!((moved.z).abs() < 1e-4);
    }
}
