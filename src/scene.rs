use crate::mesh::MeshBounds;
use glam::{Mat4, Quat, Vec3, Vec4};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform3D {
    fn default() -> Self {
        Self { translation: Vec3::ZERO, rotation: Quat::IDENTITY, scale: Vec3::ONE }
    }
}

impl Transform3D {
    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, ..Self::default() }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// A mesh attached to a scene node: registry key for drawing, bounds for
/// picking, flat color + transparency for the forward pass.
#[derive(Clone, Debug)]
pub struct MeshInstance {
    pub key: String,
    pub bounds: MeshBounds,
    pub color: Vec4,
    pub transparent: bool,
}

struct SceneNode {
    name: String,
    local: Transform3D,
    world: Mat4,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    visible: bool,
    mesh: Option<MeshInstance>,
    alive: bool,
}

#[derive(Clone, Debug)]
pub struct DrawCommand {
    pub mesh_key: String,
    pub model: Mat4,
    pub color: Vec4,
    pub transparent: bool,
}

/// Index-arena scene graph. Slots are recycled through a free list; the only
/// despawns in a session are slime particles, whose ids are owned by the
/// slime field and dropped together with the node.
#[derive(Default)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
    roots: Vec<NodeId>,
    free: Vec<u32>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, name: impl Into<String>, local: Transform3D, parent: Option<NodeId>) -> NodeId {
        let node = SceneNode {
            name: name.into(),
            local,
            world: local.matrix(),
            parent,
            children: Vec::new(),
            visible: true,
            mesh: None,
            alive: true,
        };
        let id = if let Some(slot) = self.free.pop() {
            self.nodes[slot as usize] = node;
            NodeId(slot)
        } else {
            self.nodes.push(node);
            NodeId(self.nodes.len() as u32 - 1)
        };
        match parent {
            Some(parent_id) => self.nodes[parent_id.0 as usize].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    pub fn despawn(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.0 as usize].children);
        for child in children {
            self.despawn(child);
        }
        let parent = self.nodes[id.0 as usize].parent;
        match parent {
            Some(parent_id) => self.nodes[parent_id.0 as usize].children.retain(|&c| c != id),
            None => self.roots.retain(|&r| r != id),
        }
        let node = &mut self.nodes[id.0 as usize];
        node.alive = false;
        node.mesh = None;
        self.free.push(id.0);
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.get(id.0 as usize).map_or(false, |node| node.alive)
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0 as usize].name
    }

    pub fn set_mesh(&mut self, id: NodeId, mesh: MeshInstance) {
        self.nodes[id.0 as usize].mesh = Some(mesh);
    }

    pub fn mesh(&self, id: NodeId) -> Option<&MeshInstance> {
        self.nodes[id.0 as usize].mesh.as_ref()
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        self.nodes[id.0 as usize].visible = visible;
    }

    pub fn visible(&self, id: NodeId) -> bool {
        self.nodes[id.0 as usize].visible
    }

    /// Visible only if the node and every ancestor up to its root are visible.
    pub fn visible_in_hierarchy(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &self.nodes[node_id.0 as usize];
            if !node.alive || !node.visible {
                return false;
            }
            current = node.parent;
        }
        true
    }

    pub fn local_transform(&self, id: NodeId) -> Transform3D {
        self.nodes[id.0 as usize].local
    }

    pub fn set_local_transform(&mut self, id: NodeId, local: Transform3D) {
        self.nodes[id.0 as usize].local = local;
    }

    pub fn set_translation(&mut self, id: NodeId, translation: Vec3) {
        self.nodes[id.0 as usize].local.translation = translation;
    }

    pub fn set_rotation(&mut self, id: NodeId, rotation: Quat) {
        self.nodes[id.0 as usize].local.rotation = rotation;
    }

    pub fn set_scale(&mut self, id: NodeId, scale: Vec3) {
        self.nodes[id.0 as usize].local.scale = scale;
    }

    pub fn world_transform(&self, id: NodeId) -> Mat4 {
        self.nodes[id.0 as usize].world
    }

    /// Recompute world matrices root-down. Called once per frame after all
    /// mutations for the tick have been applied.
    pub fn update_world_transforms(&mut self) {
        let roots: Vec<NodeId> = self.roots.clone();
        for root in roots {
            self.propagate(root, Mat4::IDENTITY);
        }
    }

    fn propagate(&mut self, id: NodeId, parent_world: Mat4) {
        let world = parent_world * self.nodes[id.0 as usize].local.matrix();
        self.nodes[id.0 as usize].world = world;
        let children = self.nodes[id.0 as usize].children.clone();
        for child in children {
            self.propagate(child, world);
        }
    }

    /// All mesh-bearing nodes in the subtree under `root`, the root included.
    pub fn mesh_nodes(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0 as usize];
            if !node.alive {
                continue;
            }
            if node.mesh.is_some() {
                out.push(id);
            }
            stack.extend(node.children.iter().copied());
        }
        out
    }

    /// Draw list for the frame: every mesh node whose full ancestor chain is
    /// visible, with its current world matrix.
    pub fn draw_list(&self) -> Vec<DrawCommand> {
        let mut draws = Vec::new();
        let mut stack: Vec<(NodeId, bool)> = self.roots.iter().map(|&r| (r, true)).collect();
        while let Some((id, ancestors_visible)) = stack.pop() {
            let node = &self.nodes[id.0 as usize];
            if !node.alive {
                continue;
            }
            let visible = ancestors_visible && node.visible;
            if visible {
                if let Some(mesh) = &node.mesh {
                    draws.push(DrawCommand {
                        mesh_key: mesh.key.clone(),
                        model: node.world,
                        color: mesh.color,
                        transparent: mesh.transparent,
                    });
                }
            }
            stack.extend(node.children.iter().map(|&c| (c, visible)));
        }
        draws
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;

    fn test_mesh_instance() -> MeshInstance {
        MeshInstance {
            key: "globe".to_string(),
            bounds: Mesh::uv_sphere(1.0, 8, 6).bounds,
            color: Vec4::ONE,
            transparent: false,
        }
    }

    #[test]
    fn child_world_transform_composes_with_parent() {
        let mut scene = SceneGraph::new();
        let parent = scene.spawn("parent", Transform3D::from_translation(Vec3::new(1.0, 0.0, 0.0)), None);
        let child =
            scene.spawn("child", Transform3D::from_translation(Vec3::new(0.0, 2.0, 0.0)), Some(parent));
        scene.update_world_transforms();
        let world = scene.world_transform(child);
        assert!((world.w_axis.truncate() - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn hidden_parent_hides_subtree_from_draws_and_hierarchy() {
        let mut scene = SceneGraph::new();
        let parent = scene.spawn("parent", Transform3D::default(), None);
        let child = scene.spawn("child", Transform3D::default(), Some(parent));
        scene.set_mesh(child, test_mesh_instance());
        scene.update_world_transforms();
        assert_eq!(scene.draw_list().len(), 1);

        scene.set_visible(parent, false);
        assert!(!scene.visible_in_hierarchy(child));
        assert!(scene.draw_list().is_empty());
    }

    #[test]
    fn despawn_recycles_slots_and_detaches_children() {
        let mut scene = SceneGraph::new();
        let root = scene.spawn("root", Transform3D::default(), None);
        let child = scene.spawn("child", Transform3D::default(), Some(root));
        scene.despawn(root);
        assert!(!scene.contains(root));
        assert!(!scene.contains(child));
        let replacement = scene.spawn("replacement", Transform3D::default(), None);
        assert!(scene.contains(replacement));
        assert!(scene.draw_list().is_empty());
    }
}
