use crate::mesh::{Mesh, MeshVertex};
use crate::props::PropName;
use crate::scene::Transform3D;
use anyhow::{anyhow, Context, Result};
use glam::{Quat, Vec2, Vec3, Vec4};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;

/// One node of a loaded prop hierarchy. Parents always precede children in
/// the node list, so installation is a single forward pass.
#[derive(Debug)]
pub struct PropAssetNode {
    pub name: String,
    pub parent: Option<usize>,
    pub transform: Transform3D,
    pub mesh: Option<Mesh>,
    pub color: Vec4,
    pub transparent: bool,
}

#[derive(Debug)]
pub struct PropAsset {
    pub name: PropName,
    pub nodes: Vec<PropAssetNode>,
}

pub enum AssetMessage {
    Loaded(PropAsset),
    Failed { name: PropName, error: String },
}

/// Kick off one background load per prop. Completions arrive on the returned
/// channel in arbitrary order and are drained between frames; a failed load
/// means the prop simply never registers.
pub fn spawn_prop_loads(models_dir: impl Into<PathBuf>) -> Receiver<AssetMessage> {
    let models_dir = models_dir.into();
    let (tx, rx) = channel();
    for name in PropName::ALL {
        let path = models_dir.join(name.asset_file());
        let tx: Sender<AssetMessage> = tx.clone();
        thread::spawn(move || {
            let message = match load_prop(name, &path) {
                Ok(asset) => AssetMessage::Loaded(asset),
                Err(err) => AssetMessage::Failed { name, error: format!("{err:#}") },
            };
            let _ = tx.send(message);
        });
    }
    rx
}

pub fn load_prop(name: PropName, path: &Path) -> Result<PropAsset> {
    let (document, buffers, _images) =
        gltf::import(path).with_context(|| format!("Failed to import glTF from {}", path.display()))?;
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| anyhow!("No scene in {}", path.display()))?;

    let mut nodes = Vec::new();
    for node in scene.nodes() {
        collect_node(&node, None, &buffers, &mut nodes)?;
    }
    if !nodes.iter().any(|node| node.mesh.is_some()) {
        return Err(anyhow!("No triangle meshes in {}", path.display()));
    }
    Ok(PropAsset { name, nodes })
}

fn collect_node(
    node: &gltf::Node,
    parent: Option<usize>,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<PropAssetNode>,
) -> Result<()> {
    let (translation, rotation, scale) = node.transform().decomposed();
    let transform = Transform3D {
        translation: Vec3::from_array(translation),
        rotation: Quat::from_array(rotation),
        scale: Vec3::from_array(scale),
    };
    let mut color = Vec4::ONE;
    let mut transparent = false;
    let mesh = match node.mesh() {
        Some(mesh) => {
            if let Some(primitive) = mesh.primitives().next() {
                let factor = primitive.material().pbr_metallic_roughness().base_color_factor();
                color = Vec4::from_array(factor);
                transparent = factor[3] < 1.0;
            }
            Some(read_mesh(&mesh, buffers)?)
        }
        None => None,
    };
    let index = out.len();
    out.push(PropAssetNode {
        name: node.name().unwrap_or("node").to_string(),
        parent,
        transform,
        mesh,
        color,
        transparent,
    });
    for child in node.children() {
        collect_node(&child, Some(index), buffers, out)?;
    }
    Ok(())
}

fn read_mesh(mesh: &gltf::Mesh, buffers: &[gltf::buffer::Data]) -> Result<Mesh> {
    let mut vertices: Vec<MeshVertex> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();
    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            continue;
        }
        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
        let positions: Vec<Vec3> = reader
            .read_positions()
            .map(|it| it.map(Vec3::from_array).collect())
            .unwrap_or_default();
        if positions.is_empty() {
            continue;
        }
        let local_indices: Vec<u32> = reader
            .read_indices()
            .map(|read| read.into_u32().collect())
            .unwrap_or_else(|| (0..positions.len() as u32).collect());
        let mut normals: Vec<Vec3> = reader
            .read_normals()
            .map(|it| it.map(Vec3::from_array).collect())
            .unwrap_or_default();
        if normals.len() != positions.len() || normals.iter().all(|n| n.length_squared() == 0.0) {
            normals = compute_normals(&positions, &local_indices);
        }
        let mut tex_coords: Vec<Vec2> = reader
            .read_tex_coords(0)
            .map(|coords| coords.into_f32().map(Vec2::from_array).collect())
            .unwrap_or_default();
        if tex_coords.len() != positions.len() {
            tex_coords.resize(positions.len(), Vec2::ZERO);
        }

        let base_vertex = vertices.len() as u32;
        vertices.extend(positions.iter().enumerate().map(|(i, pos)| {
            let normal = normals.get(i).copied().unwrap_or(Vec3::Y).normalize_or_zero();
            MeshVertex::new(*pos, normal, tex_coords[i])
        }));
        indices.extend(local_indices.iter().map(|idx| idx + base_vertex));
    }
    if vertices.is_empty() {
        return Err(anyhow!("Mesh '{}' contains no triangle primitives", mesh.name().unwrap_or("unnamed")));
    }
    Ok(Mesh::new(vertices, indices))
}

fn compute_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    for normal in &mut normals {
        *normal = normal.normalize_or_zero();
        if normal.length_squared() == 0.0 {
            *normal = Vec3::Y;
        }
    }
    normals
}
