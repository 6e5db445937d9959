//! Mesh representation for 3D models
//!
//! Geometry is kept CPU-side as plain vertex/index vectors and uploaded once
//! through [`crate::render::renderable::RenderObject`]. Every vertex attribute is
//! a `vec4` so the layout matches the shaders without any std140 padding rules.
//!
//! Procedural generators cover everything the game draws: spheres and cubes for the
//! moving entities and quads for extruded maze walls.

use ash::vk;

use crate::foundation::math::{Vec3, Vec4};

/// Vertex data structure with position, color, texture coordinate and normal
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Position in model space, w = 1
    pub position: [f32; 4],

    /// Vertex color, RGBA
    pub color: [f32; 4],

    /// Texture coordinates in xy, zw unused
    pub tex_coord: [f32; 4],

    /// Normal vector, w = 0
    pub normal: [f32; 4],
}

// Safe to implement Pod and Zeroable for Vertex since it only contains f32 arrays
unsafe impl bytemuck::Pod for Vertex {}
unsafe impl bytemuck::Zeroable for Vertex {}

impl Vertex {
    /// Create a new vertex
    pub fn new(position: Vec3, color: Vec4, tex_coord: [f32; 2], normal: Vec3) -> Self {
        Self {
            position: [position.x, position.y, position.z, 1.0],
            color: color.into(),
            tex_coord: [tex_coord[0], tex_coord[1], 0.0, 1.0],
            normal: [normal.x, normal.y, normal.z, 0.0],
        }
    }

    /// Position without the homogeneous coordinate
    pub fn position3(&self) -> Vec3 {
        Vec3::new(self.position[0], self.position[1], self.position[2])
    }

    /// Vertex input binding for a tightly packed vertex buffer at binding 0
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(std::mem::size_of::<Self>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()
    }

    /// Attribute descriptions for locations 0..4 (position, color, tex_coord, normal)
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 4] {
        let attribute = |location: u32| {
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(location)
                .format(vk::Format::R32G32B32A32_SFLOAT)
                .offset(location * 16)
                .build()
        };
        [attribute(0), attribute(1), attribute(2), attribute(3)]
    }
}

/// Minimum and maximum model-space coordinates in the maze plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarExtents {
    /// Lowest X
    pub min_x: f32,
    /// Highest X
    pub max_x: f32,
    /// Lowest Z
    pub min_z: f32,
    /// Highest Z
    pub max_z: f32,
}

/// 3D mesh containing vertices and indices for rendering
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Vertex data
    pub vertices: Vec<Vertex>,

    /// Index data for triangles
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a new mesh
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Number of indices to draw
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Appends a quad with a shared normal and triangulates it as (0,1,2) (0,2,3)
    pub fn push_quad(&mut self, corners: [Vec3; 4], color: Vec4, normal: Vec3) {
        const QUAD_TEX_COORDS: [[f32; 2]; 4] = [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]];

        let base = self.vertices.len() as u32;
        for (corner, tex_coord) in corners.iter().zip(QUAD_TEX_COORDS) {
            self.vertices.push(Vertex::new(*corner, color, tex_coord, normal));
        }
        self.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Axis-aligned cube of edge `size` centered at the origin
    ///
    /// With `inward_normals` the normals point into the cube, for meshes that
    /// carry a light inside them.
    pub fn cube(size: f32, color: Vec4, inward_normals: bool) -> Self {
        let h = size * 0.5;
        let sign = if inward_normals { -1.0 } else { 1.0 };
        let faces: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::x(), Vec3::y(), Vec3::z()),
            (-Vec3::x(), Vec3::y(), -Vec3::z()),
            (Vec3::y(), Vec3::z(), Vec3::x()),
            (-Vec3::y(), Vec3::z(), -Vec3::x()),
            (Vec3::z(), Vec3::x(), Vec3::y()),
            (-Vec3::z(), Vec3::x(), -Vec3::y()),
        ];

        let mut mesh = Self::default();
        for (normal, u, v) in faces {
            let center = normal * h;
            let corners = [
                center - u * h - v * h,
                center - u * h + v * h,
                center + u * h + v * h,
                center + u * h - v * h,
            ];
            mesh.push_quad(corners, color, normal * sign);
        }
        mesh
    }

    /// UV sphere centered at the origin
    pub fn sphere(radius: f32, rings: u32, sectors: u32, color: Vec4) -> Self {
        let rings = rings.max(2);
        let sectors = sectors.max(3);
        let mut vertices = Vec::with_capacity(((rings + 1) * (sectors + 1)) as usize);
        let mut indices = Vec::with_capacity((rings * sectors * 6) as usize);

        for ring in 0..=rings {
            let v = ring as f32 / rings as f32;
            let phi = v * std::f32::consts::PI;
            for sector in 0..=sectors {
                let u = sector as f32 / sectors as f32;
                let theta = u * std::f32::consts::TAU;
                let normal = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
                vertices.push(Vertex::new(normal * radius, color, [u, v], normal));
            }
        }

        let stride = sectors + 1;
        for ring in 0..rings {
            for sector in 0..sectors {
                let a = ring * stride + sector;
                let b = a + stride;
                indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
            }
        }

        Self::new(vertices, indices)
    }

    /// Min/max X and Z over all vertices, or `None` for an empty mesh
    pub fn planar_extents(&self) -> Option<PlanarExtents> {
        let first = self.vertices.first()?;
        let start = PlanarExtents {
            min_x: first.position[0],
            max_x: first.position[0],
            min_z: first.position[2],
            max_z: first.position[2],
        };
        Some(self.vertices.iter().fold(start, |acc, vertex| PlanarExtents {
            min_x: acc.min_x.min(vertex.position[0]),
            max_x: acc.max_x.max(vertex.position[0]),
            min_z: acc.min_z.min(vertex.position[2]),
            max_z: acc.max_z.max(vertex.position[2]),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_vertex_layout_is_four_vec4s() {
        assert_eq!(std::mem::size_of::<Vertex>(), 64);
        let attributes = Vertex::attribute_descriptions();
        assert_eq!(attributes[3].offset, 48);
        assert_eq!(Vertex::binding_description().stride, 64);
    }

    #[test]
    fn test_push_quad_winding() {
        let mut mesh = Mesh::default();
        let corners = [Vec3::zeros(), Vec3::z(), Vec3::new(1.0, 0.0, 1.0), Vec3::x()];
        mesh.push_quad(corners, Vec4::new(0.0, 0.0, 1.0, 1.0), Vec3::y());
        mesh.push_quad(corners, Vec4::new(0.0, 0.0, 1.0, 1.0), Vec3::y());
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7]);
        assert_eq!(mesh.vertices[2].tex_coord[..2], [1.0, 1.0]);
    }

    #[test]
    fn test_sphere_extents_match_radius() {
        let mesh = Mesh::sphere(15.0, 12, 16, Vec4::new(1.0, 1.0, 0.0, 1.0));
        let extents = mesh.planar_extents().unwrap();
        assert_relative_eq!(extents.min_x, -15.0, epsilon = 1e-3);
        assert_relative_eq!(extents.max_x, 15.0, epsilon = 1e-3);
        assert_relative_eq!(extents.min_z, -15.0, epsilon = 0.5);
        assert_relative_eq!(extents.max_z, 15.0, epsilon = 0.5);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn test_cube_extents_and_normals() {
        let mesh = Mesh::cube(20.0, Vec4::new(1.0, 0.0, 0.0, 1.0), true);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        let extents = mesh.planar_extents().unwrap();
        assert_relative_eq!(extents.min_x, -10.0);
        assert_relative_eq!(extents.max_z, 10.0);

        // Inward normals point back toward the center
        for vertex in &mesh.vertices {
            let normal = Vec3::new(vertex.normal[0], vertex.normal[1], vertex.normal[2]);
            assert!(vertex.position3().dot(&normal) < 0.0);
        }
    }

    #[test]
    fn test_empty_mesh_has_no_extents() {
        assert!(Mesh::default().planar_extents().is_none());
    }
}
