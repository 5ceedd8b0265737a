use crate::scene::{NodeId, SceneGraph};
use glam::Vec3;
use std::collections::HashMap;

/// The fixed set of globe props. The set never grows at runtime; each entry
/// is backed by one glTF asset loaded asynchronously.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropName {
    Coffin,
    Caldron,
    Pumpkin,
    WitchHat,
    Tree,
}

impl PropName {
    pub const ALL: [PropName; 5] =
        [PropName::Coffin, PropName::Caldron, PropName::Pumpkin, PropName::WitchHat, PropName::Tree];

    pub fn label(self) -> &'static str {
        match self {
            PropName::Coffin => "Coffin",
            PropName::Caldron => "Caldron",
            PropName::Pumpkin => "Pumpkin",
            PropName::WitchHat => "Witch hat",
            PropName::Tree => "Tree",
        }
    }

    /// Asset file under `assets/models/`. The caldron ships as `kessel.glb`.
    pub fn asset_file(self) -> &'static str {
        match self {
            PropName::Coffin => "coffin.glb",
            PropName::Caldron => "kessel.glb",
            PropName::Pumpkin => "pumpkin.glb",
            PropName::WitchHat => "witch_hat.glb",
            PropName::Tree => "tree.glb",
        }
    }

    /// The tree is scenery: always shown, never a picking target.
    pub fn pickable(self) -> bool {
        !matches!(self, PropName::Tree)
    }

    pub fn initially_visible(self) -> bool {
        matches!(self, PropName::Tree)
    }

    pub fn placement(self) -> (Vec3, f32) {
        match self {
            PropName::Coffin => (Vec3::new(0.0, 0.4, 0.0), 0.3),
            PropName::Tree => (Vec3::new(-0.2, 0.25, 0.0), 0.6),
            _ => (Vec3::new(0.0, 0.25, 0.0), 0.3),
        }
    }
}

struct PropEntry {
    root: NodeId,
    visible: bool,
}

/// Owns the visibility flag of every registered prop. Toggles arrive from the
/// panel or key bindings between frames; the picking pass only reads.
#[derive(Default)]
pub struct PropRegistry {
    entries: HashMap<PropName, PropEntry>,
}

impl PropRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent per name; called once per finished asset load. The scene
    /// node's visibility is driven from here on out.
    pub fn register(&mut self, name: PropName, root: NodeId, scene: &mut SceneGraph) {
        if self.entries.contains_key(&name) {
            eprintln!("[props] duplicate register for '{}' ignored", name.label());
            return;
        }
        let visible = name.initially_visible();
        scene.set_visible(root, visible);
        self.entries.insert(name, PropEntry { root, visible });
    }

    /// Flips visibility. A toggle for a prop whose asset has not arrived yet
    /// is reported and dropped; the next toggle retries implicitly.
    pub fn toggle(&mut self, name: PropName, scene: &mut SceneGraph) -> bool {
        match self.entries.get_mut(&name) {
            Some(entry) => {
                entry.visible = !entry.visible;
                scene.set_visible(entry.root, entry.visible);
                true
            }
            None => {
                eprintln!("[props] toggle '{}' ignored: asset still loading", name.label());
                false
            }
        }
    }

    pub fn is_registered(&self, name: PropName) -> bool {
        self.entries.contains_key(&name)
    }

    pub fn is_visible(&self, name: PropName) -> bool {
        self.entries.get(&name).map_or(false, |entry| entry.visible)
    }

    pub fn root(&self, name: PropName) -> Option<NodeId> {
        self.entries.get(&name).map(|entry| entry.root)
    }

    /// Candidate set for picking: visible, pickable props only.
    pub fn visible_interactive_roots(&self) -> Vec<(PropName, NodeId)> {
        PropName::ALL
            .iter()
            .filter(|name| name.pickable())
            .filter_map(|&name| {
                let entry = self.entries.get(&name)?;
                entry.visible.then_some((name, entry.root))
            })
            .collect()
    }
}
