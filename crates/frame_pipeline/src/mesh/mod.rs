//! Mesh files loaded into [`Geometry`].

pub mod obj;
pub mod ply;

use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::geometry::Geometry;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("failed to read mesh: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("failed to load OBJ: {0}")]
    Obj(#[from] tobj::LoadError),

    #[error("{0} has no mesh loader (expected .obj or .ply)")]
    UnsupportedFormat(PathBuf),

    #[error("mesh contains no triangles")]
    Empty,
}

impl MeshError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        MeshError::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Default diffuse albedo for parts whose file names no color.
pub const DEFAULT_DIFFUSE: [f32; 3] = [0.8; 3];

/// One drawable piece of a loaded mesh and the material its file asked for.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshPart {
    /// Submesh of [`LoadedMesh::geometry`] this part draws.
    pub submesh: String,
    pub diffuse: [f32; 3],
    /// `map_Kd`, resolved against the mesh file's directory.
    pub diffuse_texture: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct LoadedMesh {
    pub geometry: Geometry,
    pub parts: Vec<MeshPart>,
}

/// Pick a loader by extension.
pub fn load_mesh(path: &Path) -> Result<LoadedMesh, MeshError> {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase);
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("mesh")
        .to_owned();

    let mesh = match extension.as_deref() {
        Some("obj") => {
            let model = obj::load_obj(path)?;
            let parts = obj_parts(&model, path.parent().unwrap_or(Path::new("")));
            LoadedMesh {
                geometry: model.into_geometry(name),
                parts,
            }
        }
        Some("ply") => {
            let file = std::fs::File::open(path)?;
            let ply = ply::read_ply(std::io::BufReader::new(file))?;
            LoadedMesh {
                geometry: ply.into_geometry(name),
                parts: vec![MeshPart {
                    submesh: "mesh".to_owned(),
                    diffuse: DEFAULT_DIFFUSE,
                    diffuse_texture: None,
                }],
            }
        }
        _ => return Err(MeshError::UnsupportedFormat(path.to_path_buf())),
    };

    if mesh.geometry.indices.is_empty() {
        return Err(MeshError::Empty);
    }
    info!(
        path = %path.display(),
        vertices = mesh.geometry.vertices.len(),
        indices = mesh.geometry.indices.len(),
        parts = mesh.parts.len(),
        "loaded mesh"
    );
    Ok(mesh)
}

/// Non-empty OBJ parts with their material, texture paths relative to `dir`.
pub fn obj_parts(model: &obj::ObjModel, dir: &Path) -> Vec<MeshPart> {
    model
        .part_keys()
        .into_iter()
        .zip(&model.parts)
        .filter(|(_, part)| !part.indices.is_empty())
        .map(|(submesh, part)| {
            let material = part.material.as_ref();
            MeshPart {
                submesh,
                diffuse: material.map_or(DEFAULT_DIFFUSE, |material| material.diffuse),
                diffuse_texture: material
                    .and_then(|material| material.diffuse_texture.as_deref())
                    .filter(|texture| !texture.is_empty())
                    .map(|texture| dir.join(texture)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obj_parts_carry_their_own_material_and_texture() {
        let text = "\
mtllib parts.mtl
v 0 0 0
v 1 0 0
v 0 1 0
o bare
f 3 2 1
o painted
usemtl red
f 1 2 3
";
        let mtl = "newmtl red\nKd 0.9 0.1 0.1\nmap_Kd textures/red.png\n";
        let model = obj::load_obj_from_reader(text.as_bytes(), Some(mtl)).unwrap();
        let parts = obj_parts(&model, Path::new("assets"));

        assert_eq!(
            parts,
            vec![
                MeshPart {
                    submesh: "bare".to_owned(),
                    diffuse: DEFAULT_DIFFUSE,
                    diffuse_texture: None,
                },
                MeshPart {
                    submesh: "painted".to_owned(),
                    diffuse: [0.9, 0.1, 0.1],
                    diffuse_texture: Some(Path::new("assets").join("textures/red.png")),
                },
            ]
        );
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        let error = load_mesh(Path::new("teapot.fbx")).unwrap_err();
        assert!(matches!(error, MeshError::UnsupportedFormat(_)));
    }

    #[test]
    fn missing_files_surface_io_errors() {
        let error = load_mesh(Path::new("definitely/not/here.ply")).unwrap_err();
        assert!(matches!(error, MeshError::Io(_)));
    }
}
