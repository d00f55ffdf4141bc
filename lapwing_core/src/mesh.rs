use glam::{Vec2, Vec3};
use hashbrown::HashMap;

use crate::asset::{vertex_attrib, Mesh, Vertex};

/// One triangle corner, indexing into the attribute arrays of a [`RawMesh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Corner {
    pub position: u32,
    pub normal: Option<u32>,
    pub tex_coord: Option<u32>,
}

/// Mesh as produced by an OBJ-style decoder: separate attribute pools and a
/// triangle list of corners (three consecutive corners per triangle).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub corners: Vec<Corner>,
}

/// A corner referenced an attribute that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    #[error("corner {corner} references {attribute} {index}, only {available} defined")]
    AttributeOutOfRange {
        corner: usize,
        attribute: &'static str,
        index: u32,
        available: usize,
    },
    #[error("corner count {0} is not a multiple of 3")]
    IncompleteTriangle(usize),
    #[error("mesh has more than u32::MAX unique vertices")]
    TooManyVertices,
}

/// Bit pattern of the attributes that identify a vertex.
///
/// Tangents are excluded: they are derived after deduplication.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct VertexKey([u32; 8]);

impl VertexKey {
    fn new(v: &Vertex) -> Self {
        // fold -0.0 into 0.0 so they dedup like the float comparison would
        let bits = |f: f32| if f == 0.0 { 0 } else { f.to_bits() };
        Self([
            bits(v.position.x),
            bits(v.position.y),
            bits(v.position.z),
            bits(v.normal.x),
            bits(v.normal.y),
            bits(v.normal.z),
            bits(v.tex_coord.x),
            bits(v.tex_coord.y),
        ])
    }
}

fn lookup<T: Copy>(
    pool: &[T],
    index: u32,
    corner: usize,
    attribute: &'static str,
) -> Result<T, MeshError> {
    pool.get(index as usize)
        .copied()
        .ok_or(MeshError::AttributeOutOfRange {
            corner,
            attribute,
            index,
            available: pool.len(),
        })
}

/// Build the indexed mesh stored in model payloads.
///
/// Corners with equal position, normal and texture coordinate share one
/// vertex. Texture V is flipped (`v' = 1 - v`) from OBJ's bottom-left origin.
/// A missing normal or texture coordinate reads as zero.
///
/// Each triangle then assigns its tangent to all three of its vertices; a
/// vertex shared by several triangles keeps the tangent of the last one.
pub fn build_mesh(raw: &RawMesh) -> Result<Mesh, MeshError> {
    if raw.corners.len() % 3 != 0 {
        return Err(MeshError::IncompleteTriangle(raw.corners.len()));
    }

    let mut vertices: Vec<Vertex> = Vec::new();
    let mut indices = Vec::with_capacity(raw.corners.len());
    let mut unique: HashMap<VertexKey, u32> = HashMap::new();

    for (i, corner) in raw.corners.iter().enumerate() {
        let position = lookup(&raw.positions, corner.position, i, "position")?;
        let normal = match corner.normal {
            Some(n) => lookup(&raw.normals, n, i, "normal")?,
            None => [0.0; 3],
        };
        let tex_coord = match corner.tex_coord {
            Some(t) => lookup(&raw.tex_coords, t, i, "tex_coord")?,
            None => [0.0; 2],
        };

        let vertex = Vertex {
            position: Vec3::from_array(position),
            normal: Vec3::from_array(normal),
            tangent: Vec3::ZERO,
            tex_coord: Vec2::new(tex_coord[0], 1.0 - tex_coord[1]),
        };

        let index = match unique.get(&VertexKey::new(&vertex)) {
            Some(&index) => index,
            None => {
                let index = u32::try_from(vertices.len()).map_err(|_| MeshError::TooManyVertices)?;
                unique.insert(VertexKey::new(&vertex), index);
                vertices.push(vertex);
                index
            }
        };
        indices.push(index);
    }

    for tri in indices.chunks_exact(3) {
        let [i0, i1, i2] = [tri[0], tri[1], tri[2]].map(|i| i as usize);
        let tangent = triangle_tangent(&vertices[i0], &vertices[i1], &vertices[i2]);
        for i in [i0, i1, i2] {
            vertices[i].tangent = tangent;
        }
    }

    Ok(Mesh {
        vertices,
        indices,
        vertex_attributes: vertex_attrib::ALL,
    })
}

/// `(Δuv2.y·e1 − Δuv1.y·e2) / (Δuv1.x·Δuv2.y − Δuv2.x·Δuv1.y)`, unnormalized.
///
/// Degenerate UV mappings (zero determinant) yield a zero tangent.
pub fn triangle_tangent(v0: &Vertex, v1: &Vertex, v2: &Vertex) -> Vec3 {
    let e1 = v1.position - v0.position;
    let e2 = v2.position - v0.position;
    let duv1 = v1.tex_coord - v0.tex_coord;
    let duv2 = v2.tex_coord - v0.tex_coord;

    let det = duv1.x * duv2.y - duv2.x * duv1.y;
    if det == 0.0 {
        return Vec3::ZERO;
    }
    (duv2.y * e1 - duv1.y * e2) / det
}
