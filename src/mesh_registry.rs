use std::collections::HashMap;

use anyhow::{anyhow, Result};

use crate::mesh::{Mesh, MeshBounds};
use crate::renderer::{GpuMesh, Renderer};
use crate::slime::SLIME_MESH_KEY;

pub const GLOBE_MESH_KEY: &str = "globe";
pub const PLATFORM_TOP_MESH_KEY: &str = "platform_top";
pub const PLATFORM_BOTTOM_MESH_KEY: &str = "platform_bottom";

/// Named mesh store. CPU meshes are available immediately (picking bounds,
/// tests); GPU buffers are uploaded lazily on first draw.
#[derive(Default)]
pub struct MeshRegistry {
    entries: HashMap<String, MeshEntry>,
}

struct MeshEntry {
    mesh: Mesh,
    gpu: Option<GpuMesh>,
}

impl MeshRegistry {
    /// Registry preloaded with the procedural stage geometry: the glass
    /// globe, the two stone platforms and the unit slime sphere.
    pub fn new() -> Self {
        let mut registry = MeshRegistry { entries: HashMap::new() };
        registry.insert(GLOBE_MESH_KEY, Mesh::uv_sphere(2.0, 64, 32));
        registry.insert(PLATFORM_TOP_MESH_KEY, Mesh::cylinder(2.0, 0.5, 32));
        registry.insert(PLATFORM_BOTTOM_MESH_KEY, Mesh::cylinder(2.1, 0.25, 32));
        registry.insert(SLIME_MESH_KEY, Mesh::uv_sphere(1.0, 16, 12));
        registry
    }

    pub fn insert(&mut self, key: impl Into<String>, mesh: Mesh) {
        self.entries.insert(key.into(), MeshEntry { mesh, gpu: None });
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn bounds(&self, key: &str) -> Option<MeshBounds> {
        self.entries.get(key).map(|entry| entry.mesh.bounds)
    }

    pub fn ensure_gpu<'a>(&'a mut self, key: &str, renderer: &Renderer) -> Result<&'a GpuMesh> {
        let entry =
            self.entries.get_mut(key).ok_or_else(|| anyhow!("Mesh '{key}' not registered in registry"))?;
        if entry.gpu.is_none() {
            let gpu = renderer.create_gpu_mesh(&entry.mesh)?;
            entry.gpu = Some(gpu);
        }
        entry.gpu.as_ref().ok_or_else(|| anyhow!("GPU mesh '{key}' missing after upload"))
    }

    pub fn gpu_mesh(&self, key: &str) -> Option<&GpuMesh> {
        self.entries.get(key).and_then(|entry| entry.gpu.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_meshes_are_preloaded() {
        let registry = MeshRegistry::new();
        for key in [GLOBE_MESH_KEY, PLATFORM_TOP_MESH_KEY, PLATFORM_BOTTOM_MESH_KEY, SLIME_MESH_KEY] {
            assert!(registry.has(key), "missing procedural mesh '{key}'");
        }
        let globe = registry.bounds(GLOBE_MESH_KEY).expect("globe bounds");
        assert!((globe.radius - 2.0 * 3.0_f32.sqrt()).abs() < 0.2);
    }
}
