//! CPU-side vertex and index data for the scene's meshes.

use std::collections::BTreeMap;
use std::f32::consts::PI;

use bevy_math::Vec3;
use bytemuck::Pod;
use bytemuck::Zeroable;

use crate::backend::DrawArgs;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub tex_c: [f32; 2],
}

impl Vertex {
    pub const fn new(pos: [f32; 3], normal: [f32; 3], tex_c: [f32; 2]) -> Self {
        Self { pos, normal, tex_c }
    }
}

/// Range of a geometry's index buffer drawn by one render item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmeshGeometry {
    pub index_count: u32,
    pub start_index_location: u32,
    pub base_vertex_location: i32,
}

impl SubmeshGeometry {
    pub fn draw_args(&self) -> DrawArgs {
        DrawArgs {
            index_count: self.index_count,
            start_index_location: self.start_index_location,
            base_vertex_location: self.base_vertex_location,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Geometry {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub submeshes: BTreeMap<String, SubmeshGeometry>,
}

impl Geometry {
    /// Geometry with a single submesh spanning every index.
    pub fn single(name: impl Into<String>, submesh: &str, vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        let whole = SubmeshGeometry {
            index_count: indices.len() as u32,
            start_index_location: 0,
            base_vertex_location: 0,
        };
        Self {
            name: name.into(),
            vertices,
            indices,
            submeshes: BTreeMap::from([(submesh.to_owned(), whole)]),
        }
    }

    pub fn submesh(&self, name: &str) -> Option<&SubmeshGeometry> {
        self.submeshes.get(name)
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// True when every index of every submesh lands on a vertex.
    pub fn is_well_formed(&self) -> bool {
        self.submeshes.values().all(|submesh| {
            let start = submesh.start_index_location as usize;
            let Some(range) = self.indices.get(start..start + submesh.index_count as usize) else {
                return false;
            };
            range.iter().all(|&index| {
                let vertex = index as i64 + submesh.base_vertex_location as i64;
                vertex >= 0 && (vertex as usize) < self.vertices.len()
            })
        })
    }
}

/// UV sphere centered at the origin: one vertex per pole plus `stacks - 1`
/// rings of `slices + 1` vertices (the seam is duplicated for texturing).
pub fn create_sphere(radius: f32, slices: u32, stacks: u32) -> (Vec<Vertex>, Vec<u32>) {
    let slices = slices.max(3);
    let stacks = stacks.max(2);

    let mut vertices = Vec::with_capacity(2 + ((stacks - 1) * (slices + 1)) as usize);
    vertices.push(Vertex::new([0.0, radius, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0]));

    let phi_step = PI / stacks as f32;
    let theta_step = 2.0 * PI / slices as f32;
    for i in 1..stacks {
        let phi = i as f32 * phi_step;
        for j in 0..=slices {
            let theta = j as f32 * theta_step;
            let pos = Vec3::new(
                radius * phi.sin() * theta.cos(),
                radius * phi.cos(),
                radius * phi.sin() * theta.sin(),
            );
            vertices.push(Vertex::new(
                pos.to_array(),
                pos.normalize().to_array(),
                [theta / (2.0 * PI), phi / PI],
            ));
        }
    }
    vertices.push(Vertex::new([0.0, -radius, 0.0], [0.0, -1.0, 0.0], [0.0, 1.0]));

    let mut indices = Vec::with_capacity((6 * slices * (stacks - 1)) as usize);
    for i in 1..=slices {
        indices.extend_from_slice(&[0, i + 1, i]);
    }

    let base = 1;
    let ring = slices + 1;
    for i in 0..stacks - 2 {
        for j in 0..slices {
            indices.extend_from_slice(&[
                base + i * ring + j,
                base + i * ring + j + 1,
                base + (i + 1) * ring + j,
                base + (i + 1) * ring + j,
                base + i * ring + j + 1,
                base + (i + 1) * ring + j + 1,
            ]);
        }
    }

    let south = vertices.len() as u32 - 1;
    let base = south - ring;
    for i in 0..slices {
        indices.extend_from_slice(&[south, base + i, base + i + 1]);
    }

    (vertices, indices)
}

/// Floor, a wall with a gap, and the mirror filling that gap.
pub fn room() -> Geometry {
    const UP: [f32; 3] = [0.0, 1.0, 0.0];
    const BACK: [f32; 3] = [0.0, 0.0, -1.0];

    let vertices = vec![
        // floor, texture tiled 4x
        Vertex::new([-3.5, 0.0, -10.0], UP, [0.0, 4.0]),
        Vertex::new([-3.5, 0.0, 0.0], UP, [0.0, 0.0]),
        Vertex::new([7.5, 0.0, 0.0], UP, [4.0, 0.0]),
        Vertex::new([7.5, 0.0, -10.0], UP, [4.0, 4.0]),
        // wall left of the mirror
        Vertex::new([-3.5, 0.0, 0.0], BACK, [0.0, 2.0]),
        Vertex::new([-3.5, 4.0, 0.0], BACK, [0.0, 0.0]),
        Vertex::new([-2.5, 4.0, 0.0], BACK, [0.5, 0.0]),
        Vertex::new([-2.5, 0.0, 0.0], BACK, [0.5, 2.0]),
        // wall right of the mirror
        Vertex::new([2.5, 0.0, 0.0], BACK, [0.0, 2.0]),
        Vertex::new([2.5, 4.0, 0.0], BACK, [0.0, 0.0]),
        Vertex::new([7.5, 4.0, 0.0], BACK, [2.0, 0.0]),
        Vertex::new([7.5, 0.0, 0.0], BACK, [2.0, 2.0]),
        // wall above the mirror
        Vertex::new([-3.5, 4.0, 0.0], BACK, [0.0, 1.0]),
        Vertex::new([-3.5, 6.0, 0.0], BACK, [0.0, 0.0]),
        Vertex::new([7.5, 6.0, 0.0], BACK, [6.0, 0.0]),
        Vertex::new([7.5, 4.0, 0.0], BACK, [6.0, 1.0]),
        // mirror
        Vertex::new([-2.5, 0.0, 0.0], BACK, [0.0, 1.0]),
        Vertex::new([-2.5, 4.0, 0.0], BACK, [0.0, 0.0]),
        Vertex::new([2.5, 4.0, 0.0], BACK, [1.0, 0.0]),
        Vertex::new([2.5, 0.0, 0.0], BACK, [1.0, 1.0]),
    ];

    #[rustfmt::skip]
    let indices = vec![
        0, 1, 2, 0, 2, 3,
        4, 5, 6, 4, 6, 7,
        8, 9, 10, 8, 10, 11,
        12, 13, 14, 12, 14, 15,
        16, 17, 18, 16, 18, 19,
    ];

    let submesh = |index_count, start_index_location| SubmeshGeometry {
        index_count,
        start_index_location,
        base_vertex_location: 0,
    };

    Geometry {
        name: "roomGeo".to_owned(),
        vertices,
        indices,
        submeshes: BTreeMap::from([
            ("floor".to_owned(), submesh(6, 0)),
            ("wall".to_owned(), submesh(18, 6)),
            ("mirror".to_owned(), submesh(6, 24)),
        ]),
    }
}

/// Flat-accumulated vertex normals for an indexed triangle list.
pub fn compute_normals(vertices: &mut [Vertex], indices: &[u32]) {
    let mut sums = vec![Vec3::ZERO; vertices.len()];
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        if a >= vertices.len() || b >= vertices.len() || c >= vertices.len() {
            continue;
        }
        let p0 = Vec3::from_array(vertices[a].pos);
        let p1 = Vec3::from_array(vertices[b].pos);
        let p2 = Vec3::from_array(vertices[c].pos);
        let face = (p1 - p0).cross(p2 - p0);
        sums[a] += face;
        sums[b] += face;
        sums[c] += face;
    }
    for (vertex, sum) in vertices.iter_mut().zip(sums) {
        vertex.normal = sum.normalize_or_zero().to_array();
    }
}
