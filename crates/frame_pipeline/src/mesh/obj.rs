//! Wavefront OBJ with MTL materials, parsed by `tobj`.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use bevy_math::Vec3;
use tracing::warn;

use crate::geometry::compute_normals;
use crate::geometry::Geometry;
use crate::geometry::SubmeshGeometry;
use crate::geometry::Vertex;
use crate::mesh::MeshError;

#[derive(Clone, Debug, PartialEq)]
pub struct ObjMaterial {
    pub name: String,
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    pub shininess: f32,
    pub dissolve: f32,
    pub diffuse_texture: Option<String>,
}

impl From<&tobj::Material> for ObjMaterial {
    fn from(material: &tobj::Material) -> Self {
        Self {
            name: material.name.clone(),
            diffuse: material.diffuse.unwrap_or([1.0; 3]),
            specular: material.specular.unwrap_or([0.0; 3]),
            shininess: material.shininess.unwrap_or(0.0),
            dissolve: material.dissolve.unwrap_or(1.0),
            diffuse_texture: material.diffuse_texture.clone(),
        }
    }
}

/// One `o`/`g` group of the file with its own material.
#[derive(Clone, Debug)]
pub struct ObjPart {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material: Option<ObjMaterial>,
}

#[derive(Clone, Debug)]
pub struct ObjModel {
    pub parts: Vec<ObjPart>,
    pub min: Vec3,
    pub max: Vec3,
}

impl ObjModel {
    /// Submesh name for each part: the group name, or `part{i}` when it is
    /// empty or already taken.
    pub fn part_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::with_capacity(self.parts.len());
        for (i, part) in self.parts.iter().enumerate() {
            let key = if part.name.is_empty() || part.name == "mesh" || keys.contains(&part.name) {
                format!("part{i}")
            } else {
                part.name.clone()
            };
            keys.push(key);
        }
        keys
    }

    /// Concatenate every part into one vertex/index buffer pair. Each part
    /// gets a submesh of its own, named by [`part_keys`](Self::part_keys), and
    /// `"mesh"` spans all of them.
    pub fn into_geometry(self, name: impl Into<String>) -> Geometry {
        let keys = self.part_keys();
        let mut geometry = Geometry {
            name: name.into(),
            vertices: Vec::new(),
            indices: Vec::new(),
            submeshes: BTreeMap::new(),
        };
        for (key, part) in keys.into_iter().zip(self.parts) {
            let base_vertex = geometry.vertices.len() as u32;
            let submesh = SubmeshGeometry {
                index_count: part.indices.len() as u32,
                start_index_location: geometry.indices.len() as u32,
                base_vertex_location: 0,
            };
            geometry.submeshes.insert(key, submesh);
            geometry.vertices.extend(part.vertices);
            geometry
                .indices
                .extend(part.indices.iter().map(|index| index + base_vertex));
        }
        geometry.submeshes.insert(
            "mesh".to_owned(),
            SubmeshGeometry {
                index_count: geometry.indices.len() as u32,
                start_index_location: 0,
                base_vertex_location: 0,
            },
        );
        geometry
    }
}

pub fn load_obj(path: &Path) -> Result<ObjModel, MeshError> {
    let (models, materials) = tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS)?;
    let materials = materials.unwrap_or_else(|error| {
        warn!(path = %path.display(), %error, "material library not loaded");
        Vec::new()
    });
    convert(models, &materials)
}

/// Parse OBJ text, resolving any `mtllib` against `mtl` when given.
pub fn load_obj_from_reader(mut obj: impl BufRead, mtl: Option<&str>) -> Result<ObjModel, MeshError> {
    let (models, materials) = tobj::load_obj_buf(&mut obj, &tobj::GPU_LOAD_OPTIONS, |_| match mtl {
        Some(text) => {
            let mut bytes = text.as_bytes();
            tobj::load_mtl_buf(&mut bytes)
        }
        None => Err(tobj::LoadError::OpenFileFailed),
    })?;
    convert(models, &materials.unwrap_or_default())
}

fn convert(models: Vec<tobj::Model>, materials: &[tobj::Material]) -> Result<ObjModel, MeshError> {
    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    let mut parts = Vec::with_capacity(models.len());

    for model in models {
        let mesh = model.mesh;
        let vertex_count = mesh.positions.len() / 3;
        let has_normals = mesh.normals.len() == mesh.positions.len();
        let has_tex_c = mesh.texcoords.len() / 2 == vertex_count;

        let mut vertices = Vec::with_capacity(vertex_count);
        for i in 0..vertex_count {
            let pos = [
                mesh.positions[3 * i],
                mesh.positions[3 * i + 1],
                mesh.positions[3 * i + 2],
            ];
            min = min.min(Vec3::from_array(pos));
            max = max.max(Vec3::from_array(pos));
            let normal = if has_normals {
                [mesh.normals[3 * i], mesh.normals[3 * i + 1], mesh.normals[3 * i + 2]]
            } else {
                [0.0; 3]
            };
            // OBJ puts v = 0 at the bottom; textures are sampled top-down.
            let tex_c = if has_tex_c {
                [mesh.texcoords[2 * i], 1.0 - mesh.texcoords[2 * i + 1]]
            } else {
                [0.0; 2]
            };
            vertices.push(Vertex::new(pos, normal, tex_c));
        }
        if !has_normals {
            compute_normals(&mut vertices, &mesh.indices);
        }

        parts.push(ObjPart {
            name: model.name,
            vertices,
            indices: mesh.indices,
            material: mesh
                .material_id
                .and_then(|id| materials.get(id))
                .map(ObjMaterial::from),
        });
    }

    if parts.iter().all(|part| part.indices.is_empty()) {
        return Err(MeshError::Empty);
    }
    Ok(ObjModel { parts, min, max })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUBE_FACE: &str = "\
mtllib cube.mtl
o front
v -1 -1 1
v 1 -1 1
v 1 1 1
v -1 1 1
vt 0 0
vt 1 0
vt 1 1
vt 0 1
usemtl red
f 1/1 2/2 3/3 4/4
o top
v -1 1 1
v 1 1 1
v 1 1 -1
f 5 6 7
";

    const MTL: &str = "\
newmtl red
Kd 0.8 0.1 0.1
Ks 0.5 0.5 0.5
Ns 32
d 1.0
map_Kd red.png
";

    #[test]
    fn parts_keep_their_materials_and_bounds() {
        let model = load_obj_from_reader(CUBE_FACE.as_bytes(), Some(MTL)).unwrap();
        assert_eq!(model.parts.len(), 2);
        let front = &model.parts[0];
        assert_eq!(front.indices.len(), 6);
        let material = front.material.as_ref().unwrap();
        assert_eq!(material.diffuse, [0.8, 0.1, 0.1]);
        assert_eq!(material.diffuse_texture.as_deref(), Some("red.png"));
        assert_eq!(model.min, Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(model.max, Vec3::ONE);
    }

    #[test]
    fn missing_material_library_still_loads_geometry() {
        let model = load_obj_from_reader(CUBE_FACE.as_bytes(), None).unwrap();
        assert!(model.parts[0].material.is_none());
    }

    #[test]
    fn geometry_draws_every_part_from_the_whole_submesh() {
        let geometry = load_obj_from_reader(CUBE_FACE.as_bytes(), None)
            .unwrap()
            .into_geometry("cube");
        assert!(geometry.is_well_formed());
        let whole = geometry.submesh("mesh").unwrap();
        assert_eq!(whole.index_count, 9);
        let top = geometry.submesh("top").unwrap();
        assert_eq!(top.start_index_location, 6);
        assert!(geometry.indices[6..].iter().all(|&i| i >= 4));
    }

    #[test]
    fn repeated_group_names_get_their_own_submesh() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\no leaf\nf 1 2 3\no leaf\nf 3 2 1\n";
        let model = load_obj_from_reader(text.as_bytes(), None).unwrap();
        assert_eq!(model.part_keys(), ["leaf", "part1"]);
        let geometry = model.into_geometry("tree");
        assert_eq!(geometry.submesh("part1").unwrap().start_index_location, 3);
    }
}
