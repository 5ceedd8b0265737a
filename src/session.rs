use crate::assets::PropAsset;
use crate::camera3d::{Camera3D, OrbitCamera};
use crate::config::AppConfig;
use crate::gizmo::{AxisMask, GizmoMode, SelectionState, TransformGizmo};
use crate::mesh_registry::{
    MeshRegistry, GLOBE_MESH_KEY, PLATFORM_BOTTOM_MESH_KEY, PLATFORM_TOP_MESH_KEY,
};
use crate::picking::{self, PickHit};
use crate::props::{PropName, PropRegistry};
use crate::scene::{DrawCommand, MeshInstance, NodeId, SceneGraph, Transform3D};
use crate::slime::SlimeField;
use glam::{Vec2, Vec3, Vec4};
use winit::dpi::PhysicalSize;

const CAMERA_NEAR: f32 = 0.1;
const CAMERA_FAR: f32 = 100.0;

const GLOBE_COLOR: Vec4 = Vec4::new(0.37, 0.17, 0.70, 0.3);
const STONE_COLOR: Vec4 = Vec4::new(0.5, 0.5, 0.5, 1.0);

/// Everything the frame scheduler needs from the outside world for one tick.
/// Input events were applied to these fields between frames; the tick itself
/// never blocks.
#[derive(Clone, Copy, Debug)]
pub struct FrameInput {
    pub dt: f32,
    pub viewport: PhysicalSize<u32>,
    /// Pointer position in normalized device coordinates, y up.
    pub pointer_ndc: Option<Vec2>,
    /// Pointer position in physical pixels, for gizmo grab tests.
    pub cursor_px: Option<Vec2>,
    /// Left button went down since the last tick.
    pub clicked: bool,
    pub left_held: bool,
    /// Accumulated pointer-drag rotation for the orbit camera, radians.
    pub orbit_delta: Vec2,
}

pub struct FrameOutput {
    pub camera: Camera3D,
    pub draws: Vec<DrawCommand>,
}

/// Commands forwarded verbatim from the control panel and key bindings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    ToggleProp(PropName),
    SetGizmoMode(GizmoMode),
    GenerateSlime,
    ResetSlime,
}

/// The scene session: owns the scene graph, prop registry, slime field,
/// orbit camera and gizmo, and sequences their reads and writes once per
/// frame. Constructed once; nothing in here is a global.
pub struct GlobeSession {
    scene: SceneGraph,
    props: PropRegistry,
    slime: SlimeField,
    orbit: OrbitCamera,
    gizmo: TransformGizmo,
    pick: Option<PickHit>,
    fov_y_radians: f32,
}

impl GlobeSession {
    pub fn new(config: &AppConfig, registry: &MeshRegistry) -> Self {
        let mut scene = SceneGraph::new();
        spawn_stage(&mut scene, registry);
        scene.update_world_transforms();
        let slime_bounds =
            registry.bounds(crate::slime::SLIME_MESH_KEY).unwrap_or_else(|| {
                crate::mesh::MeshBounds::from_min_max(-Vec3::ONE, Vec3::ONE)
            });
        Self {
            scene,
            props: PropRegistry::new(),
            slime: SlimeField::new(config.slime.clone(), slime_bounds),
            orbit: OrbitCamera::from_config(&config.camera),
            gizmo: TransformGizmo::new(),
            pick: None,
            fov_y_radians: config.camera.fov_y_degrees.to_radians(),
        }
    }

    pub fn camera(&self) -> Camera3D {
        self.orbit.to_camera(self.fov_y_radians, CAMERA_NEAR, CAMERA_FAR)
    }

    pub fn pick(&self) -> Option<PickHit> {
        self.pick
    }

    pub fn selection(&self) -> SelectionState {
        self.gizmo.state()
    }

    pub fn gizmo_mode(&self) -> GizmoMode {
        self.gizmo.mode()
    }

    pub fn gizmo_axes(&self) -> AxisMask {
        self.gizmo.mode().axis_mask()
    }

    pub fn gizmo_dragging(&self) -> bool {
        self.gizmo.dragging()
    }

    pub fn prop_registered(&self, name: PropName) -> bool {
        self.props.is_registered(name)
    }

    pub fn prop_visible(&self, name: PropName) -> bool {
        self.props.is_visible(name)
    }

    pub fn slime_count(&self) -> usize {
        self.slime.len()
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    /// Apply a completed asset load: mesh data goes into the registry, the
    /// node hierarchy into the scene, and the prop registers with its
    /// configured placement. Runs between frames, never mid-tick.
    pub fn install_prop(&mut self, asset: &PropAsset, registry: &mut MeshRegistry) {
        if self.props.is_registered(asset.name) {
            eprintln!("[assets] duplicate load for '{}' ignored", asset.name.label());
            return;
        }
        let (translation, scale) = asset.name.placement();
        let root = self.scene.spawn(
            asset.name.label().to_ascii_lowercase(),
            Transform3D { translation, scale: Vec3::splat(scale), ..Transform3D::default() },
            None,
        );
        let mut node_ids: Vec<NodeId> = Vec::with_capacity(asset.nodes.len());
        for (index, node) in asset.nodes.iter().enumerate() {
            let parent = match node.parent {
                Some(parent_index) => node_ids[parent_index],
                None => root,
            };
            let id = self.scene.spawn(node.name.clone(), node.transform, Some(parent));
            if let Some(mesh) = &node.mesh {
                let key = format!("prop::{}::{index}", asset.name.label().to_ascii_lowercase());
                self.scene.set_mesh(
                    id,
                    MeshInstance {
                        key: key.clone(),
                        bounds: mesh.bounds,
                        color: node.color,
                        transparent: node.transparent,
                    },
                );
                registry.insert(key, mesh.clone());
            }
            node_ids.push(id);
        }
        self.props.register(asset.name, root, &mut self.scene);
        self.scene.update_world_transforms();
    }

    pub fn apply(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::ToggleProp(name) => {
                self.props.toggle(name, &mut self.scene);
            }
            SessionCommand::SetGizmoMode(mode) => self.gizmo.set_mode(mode),
            SessionCommand::GenerateSlime => self.slime.spawn_pool(&mut self.scene),
            SessionCommand::ResetSlime => self.slime.clear(&mut self.scene),
        }
    }

    /// One frame: picking first, then selection/gizmo, then camera damping,
    /// then the slime step, then the draw list. A click between two frames
    /// always sees picking results consistent with this frame's visibility.
    pub fn tick(&mut self, input: &FrameInput) -> FrameOutput {
        let camera = self.camera();

        // 1. picking, from the latest pointer position and current visibility
        let candidates = self.props.visible_interactive_roots();
        self.pick = input.pointer_ndc.and_then(|ndc| {
            picking::resolve(ndc, &camera, input.viewport, &self.scene, &candidates)
        });

        // 2. selection and gizmo
        let ray = input
            .pointer_ndc
            .and_then(|ndc| camera.ndc_ray(ndc, input.viewport));
        if input.clicked {
            let on_gizmo = input.cursor_px.map_or(false, |px| {
                self.gizmo.press_grabs_gizmo(px, &camera, input.viewport, &self.scene)
            });
            if on_gizmo {
                if let Some(ray) = ray {
                    self.gizmo.begin_drag(ray, &camera, &self.scene);
                }
            } else {
                self.gizmo.handle_click(self.pick.as_ref(), &self.props);
            }
        }
        if self.gizmo.dragging() {
            if input.left_held {
                if let Some(ray) = ray {
                    self.gizmo.update_drag(ray, &mut self.scene);
                }
            } else {
                self.gizmo.end_drag();
            }
        }

        // 3. orbit camera damping; the gizmo drag owns the pointer while active
        self.orbit.enabled = !self.gizmo.dragging();
        self.orbit.orbit(input.orbit_delta);
        self.orbit.update();

        // 4. slime step
        self.slime.advance(&mut self.scene, input.dt);

        // 5. world transforms + draw list with the post-damping camera
        self.scene.update_world_transforms();
        FrameOutput { camera: self.camera(), draws: self.scene.draw_list() }
    }
}

fn spawn_stage(scene: &mut SceneGraph, registry: &MeshRegistry) {
    let stage = [
        (PLATFORM_TOP_MESH_KEY, Vec3::new(0.0, 0.0, 0.0), STONE_COLOR, false),
        (PLATFORM_BOTTOM_MESH_KEY, Vec3::new(0.0, -0.25, 0.0), STONE_COLOR, false),
        (GLOBE_MESH_KEY, Vec3::new(0.0, 1.2, 0.0), GLOBE_COLOR, true),
    ];
    for (key, translation, color, transparent) in stage {
        let node = scene.spawn(key, Transform3D::from_translation(translation), None);
        if let Some(bounds) = registry.bounds(key) {
            scene.set_mesh(node, MeshInstance { key: key.to_string(), bounds, color, transparent });
        }
    }
}
