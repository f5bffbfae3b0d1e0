//! ASCII PLY reader.
//!
//! Supports one `vertex` element (`x y z`, optionally `nx ny nz` and `u v` or
//! `s t`) and one `face` element of vertex-index lists. Polygons are
//! fan-triangulated. Binary encodings are rejected.

use std::io::BufRead;

use crate::geometry::compute_normals;
use crate::geometry::Geometry;
use crate::geometry::Vertex;
use crate::mesh::MeshError;

#[derive(Clone, Debug, Default)]
pub struct PlyMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl PlyMesh {
    pub fn into_geometry(self, name: impl Into<String>) -> Geometry {
        Geometry::single(name, "mesh", self.vertices, self.indices)
    }
}

#[derive(Default)]
struct Header {
    vertex_count: usize,
    face_count: usize,
    vertex_properties: Vec<String>,
}

impl Header {
    fn column(&self, names: &[&str]) -> Option<usize> {
        self.vertex_properties
            .iter()
            .position(|property| names.contains(&property.as_str()))
    }
}

enum Element {
    None,
    Vertex,
    Face,
    Other,
}

pub fn read_ply(reader: impl BufRead) -> Result<PlyMesh, MeshError> {
    let mut lines = reader.lines().enumerate().map(|(i, line)| (i + 1, line));
    let header = read_header(&mut lines)?;

    let x = header.column(&["x"]).ok_or_else(|| MeshError::parse(0, "vertex has no x property"))?;
    let y = header.column(&["y"]).ok_or_else(|| MeshError::parse(0, "vertex has no y property"))?;
    let z = header.column(&["z"]).ok_or_else(|| MeshError::parse(0, "vertex has no z property"))?;
    let normal = match (
        header.column(&["nx"]),
        header.column(&["ny"]),
        header.column(&["nz"]),
    ) {
        (Some(nx), Some(ny), Some(nz)) => Some([nx, ny, nz]),
        _ => None,
    };
    let tex_c = match (header.column(&["u", "s"]), header.column(&["v", "t"])) {
        (Some(u), Some(v)) => Some([u, v]),
        _ => None,
    };

    let mut mesh = PlyMesh {
        vertices: Vec::with_capacity(header.vertex_count),
        indices: Vec::with_capacity(header.face_count * 3),
    };

    while mesh.vertices.len() < header.vertex_count {
        let (number, line) = next_data_line(&mut lines, "vertex")?;
        let values = line
            .split_whitespace()
            .map(|token| {
                token
                    .parse::<f32>()
                    .map_err(|_| MeshError::parse(number, format!("invalid number {token:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let get = |column: usize| {
            values.get(column).copied().ok_or_else(|| {
                MeshError::parse(number, format!("expected {} values", header.vertex_properties.len()))
            })
        };
        let mut vertex = Vertex::new([get(x)?, get(y)?, get(z)?], [0.0; 3], [0.0; 2]);
        if let Some([nx, ny, nz]) = normal {
            vertex.normal = [get(nx)?, get(ny)?, get(nz)?];
        }
        if let Some([u, v]) = tex_c {
            vertex.tex_c = [get(u)?, get(v)?];
        }
        mesh.vertices.push(vertex);
    }

    for _ in 0..header.face_count {
        let (number, line) = next_data_line(&mut lines, "face")?;
        let values = line
            .split_whitespace()
            .map(|token| {
                token
                    .parse::<u32>()
                    .map_err(|_| MeshError::parse(number, format!("invalid index {token:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let Some((&count, polygon)) = values.split_first() else {
            return Err(MeshError::parse(number, "empty face"));
        };
        if polygon.len() != count as usize {
            return Err(MeshError::parse(
                number,
                format!("face declares {count} indices but lists {}", polygon.len()),
            ));
        }
        if let Some(&index) = polygon.iter().find(|&&i| i as usize >= mesh.vertices.len()) {
            return Err(MeshError::parse(
                number,
                format!("index {index} is past the {} vertices", mesh.vertices.len()),
            ));
        }
        for pair in polygon.windows(2).skip(1) {
            mesh.indices.extend_from_slice(&[polygon[0], pair[0], pair[1]]);
        }
    }

    if normal.is_none() {
        compute_normals(&mut mesh.vertices, &mesh.indices);
    }
    Ok(mesh)
}

fn read_header(
    lines: &mut impl Iterator<Item = (usize, std::io::Result<String>)>,
) -> Result<Header, MeshError> {
    let mut header = Header::default();
    let mut element = Element::None;
    let mut seen_magic = false;

    for (number, line) in lines.by_ref() {
        let line = line?;
        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };
        match keyword {
            "ply" => seen_magic = true,
            _ if !seen_magic => return Err(MeshError::parse(number, "missing ply magic")),
            "format" => {
                if tokens.next() != Some("ascii") {
                    return Err(MeshError::parse(number, "only ascii PLY is supported"));
                }
            }
            "comment" | "obj_info" => {}
            "element" => {
                let kind = tokens.next();
                let count = tokens
                    .next()
                    .and_then(|count| count.parse::<usize>().ok())
                    .ok_or_else(|| MeshError::parse(number, "element without a count"))?;
                element = match kind {
                    Some("vertex") => {
                        header.vertex_count = count;
                        Element::Vertex
                    }
                    Some("face") => {
                        header.face_count = count;
                        Element::Face
                    }
                    _ if count == 0 => Element::Other,
                    _ => {
                        return Err(MeshError::parse(
                            number,
                            format!("unsupported element {:?}", kind.unwrap_or_default()),
                        ))
                    }
                };
            }
            "property" => {
                if let Element::Vertex = element {
                    let name = tokens.last().unwrap_or_default().to_owned();
                    header.vertex_properties.push(name);
                }
            }
            "end_header" => return Ok(header),
            other => {
                return Err(MeshError::parse(number, format!("unexpected header keyword {other:?}")))
            }
        }
    }
    Err(MeshError::parse(0, "file ended before end_header"))
}

fn next_data_line(
    lines: &mut impl Iterator<Item = (usize, std::io::Result<String>)>,
    what: &str,
) -> Result<(usize, String), MeshError> {
    for (number, line) in lines.by_ref() {
        let line = line?;
        if !line.trim().is_empty() {
            return Ok((number, line));
        }
    }
    Err(MeshError::parse(0, format!("file ended before every {what} was read")))
}
