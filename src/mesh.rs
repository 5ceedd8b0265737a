use glam::{Vec2, Vec3};
use std::f32::consts::{PI, TAU};

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self { position: position.to_array(), normal: normal.to_array(), uv: uv.to_array() }
    }

    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 24,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

#[derive(Clone, Debug)]
pub struct Mesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub bounds: MeshBounds,
}

#[derive(Clone, Copy, Debug)]
pub struct MeshBounds {
    pub min: Vec3,
    pub max: Vec3,
    pub center: Vec3,
    pub radius: f32,
}

impl Mesh {
    pub fn new(vertices: Vec<MeshVertex>, indices: Vec<u32>) -> Self {
        let bounds = MeshBounds::from_vertices(&vertices);
        Self { vertices, indices, bounds }
    }

    /// Latitude/longitude sphere centered on the origin.
    pub fn uv_sphere(radius: f32, sectors: u32, stacks: u32) -> Self {
        let sectors = sectors.max(3);
        let stacks = stacks.max(2);
        let mut vertices = Vec::with_capacity(((sectors + 1) * (stacks + 1)) as usize);
        for stack in 0..=stacks {
            let phi = PI * stack as f32 / stacks as f32;
            let y = phi.cos();
            let ring = phi.sin();
            for sector in 0..=sectors {
                let theta = TAU * sector as f32 / sectors as f32;
                let normal = Vec3::new(ring * theta.cos(), y, ring * theta.sin());
                let uv = Vec2::new(sector as f32 / sectors as f32, stack as f32 / stacks as f32);
                vertices.push(MeshVertex::new(normal * radius, normal, uv));
            }
        }
        let mut indices = Vec::with_capacity((sectors * stacks * 6) as usize);
        for stack in 0..stacks {
            for sector in 0..sectors {
                let k1 = stack * (sectors + 1) + sector;
                let k2 = k1 + sectors + 1;
                if stack != 0 {
                    indices.extend_from_slice(&[k1, k2, k1 + 1]);
                }
                if stack != stacks - 1 {
                    indices.extend_from_slice(&[k1 + 1, k2, k2 + 1]);
                }
            }
        }
        Self::new(vertices, indices)
    }

    /// Capped cylinder centered on the origin, axis along +Y.
    pub fn cylinder(radius: f32, height: f32, segments: u32) -> Self {
        let segments = segments.max(3);
        let half = height * 0.5;
        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        // side wall
        for segment in 0..=segments {
            let theta = TAU * segment as f32 / segments as f32;
            let normal = Vec3::new(theta.cos(), 0.0, theta.sin());
            let u = segment as f32 / segments as f32;
            vertices.push(MeshVertex::new(normal * radius + Vec3::Y * half, normal, Vec2::new(u, 0.0)));
            vertices.push(MeshVertex::new(normal * radius - Vec3::Y * half, normal, Vec2::new(u, 1.0)));
        }
        for segment in 0..segments {
            let base = segment * 2;
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);
        }

        // caps
        for (cap_y, cap_normal) in [(half, Vec3::Y), (-half, Vec3::NEG_Y)] {
            let center_index = vertices.len() as u32;
            vertices.push(MeshVertex::new(Vec3::Y * cap_y, cap_normal, Vec2::splat(0.5)));
            for segment in 0..=segments {
                let theta = TAU * segment as f32 / segments as f32;
                let rim = Vec3::new(theta.cos() * radius, cap_y, theta.sin() * radius);
                let uv = Vec2::new(0.5 + theta.cos() * 0.5, 0.5 + theta.sin() * 0.5);
                vertices.push(MeshVertex::new(rim, cap_normal, uv));
            }
            for segment in 0..segments {
                let rim = center_index + 1 + segment;
                if cap_y > 0.0 {
                    indices.extend_from_slice(&[center_index, rim + 1, rim]);
                } else {
                    indices.extend_from_slice(&[center_index, rim, rim + 1]);
                }
            }
        }
        Self::new(vertices, indices)
    }
}

impl MeshBounds {
    pub fn from_vertices(vertices: &[MeshVertex]) -> Self {
        if vertices.is_empty() {
            return MeshBounds { min: Vec3::ZERO, max: Vec3::ZERO, center: Vec3::ZERO, radius: 0.0 };
        }
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for vertex in vertices {
            let position = Vec3::from_array(vertex.position);
            min = min.min(position);
            max = max.max(position);
        }
        Self::from_min_max(min, max)
    }

    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        let center = (min + max) * 0.5;
        let radius = (max - center).length();
        MeshBounds { min, max, center, radius }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_vertices_sit_on_the_radius() {
        let mesh = Mesh::uv_sphere(2.0, 16, 12);
        for vertex in &mesh.vertices {
            let distance = Vec3::from_array(vertex.position).length();
            assert!((distance - 2.0).abs() < 1e-4, "vertex off the sphere surface: {distance}");
        }
        assert!((mesh.bounds.radius - mesh.bounds.max.length()).abs() < 1e-3);
    }

    #[test]
    fn cylinder_bounds_match_dimensions() {
        let mesh = Mesh::cylinder(2.1, 0.25, 32);
        assert!((mesh.bounds.max.y - 0.125).abs() < 1e-5);
        assert!((mesh.bounds.min.y + 0.125).abs() < 1e-5);
        assert!((mesh.bounds.max.x - 2.1).abs() < 1e-3);
    }

    #[test]
    fn sphere_index_buffer_stays_in_range() {
        let mesh = Mesh::uv_sphere(1.0, 8, 6);
        let count = mesh.vertices.len() as u32;
        assert!(mesh.indices.iter().all(|&i| i < count));
        assert_eq!(mesh.indices.len() % 3, 0);
    }
}
