//! Wavefront OBJ mesh parsing

use anyhow::{bail, Context, Result};
use lapwing_core::{Corner, MeshDecoder, RawMesh};

/// Mesh decoder for Wavefront OBJ text.
pub struct ObjDecoder;

impl MeshDecoder for ObjDecoder {
    fn name(&self) -> &'static str {
        "obj"
    }

    fn decode_mesh(&self, text: &str) -> Result<RawMesh> {
        let mesh = parse_obj(text)?;
        tracing::debug!(
            positions = mesh.positions.len(),
            normals = mesh.normals.len(),
            tex_coords = mesh.tex_coords.len(),
            triangles = mesh.corners.len() / 3,
            "parsed OBJ"
        );
        Ok(mesh)
    }
}

/// Parse OBJ text into attribute pools and a triangle corner list.
///
/// Understands `v`, `vt`, `vn` and `f`; every other statement (`o`, `g`, `s`,
/// `usemtl`, `mtllib`, ...) is ignored. Polygons are fan-triangulated, which
/// assumes they are convex.
pub fn parse_obj(text: &str) -> Result<RawMesh> {
    let mut mesh = RawMesh::default();

    for (line_no, line) in text.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };
        let args: Vec<&str> = parts.collect();

        match keyword {
            "v" => mesh.positions.push(parse_components(&args, 3, line_no, keyword)?),
            "vn" => mesh.normals.push(parse_components(&args, 3, line_no, keyword)?),
            // v is optional and defaults to 0, w is dropped
            "vt" => mesh.tex_coords.push(parse_components(&args, 1, line_no, keyword)?),
            "f" => {
                let face = args
                    .iter()
                    .map(|s| parse_corner(s, &mesh, line_no))
                    .collect::<Result<Vec<_>>>()?;
                if face.len() < 3 {
                    bail!("line {line_no}: face has {} corners, need at least 3", face.len());
                }
                // Triangulate (fan triangulation for convex polygons)
                for i in 1..face.len() - 1 {
                    mesh.corners.extend([face[0], face[i], face[i + 1]]);
                }
            }
            _ => {}
        }
    }

    if mesh.corners.is_empty() {
        bail!("OBJ contains no faces");
    }
    Ok(mesh)
}

fn parse_components<const N: usize>(
    args: &[&str],
    required: usize,
    line_no: usize,
    keyword: &str,
) -> Result<[f32; N]> {
    if args.len() < required {
        bail!(
            "line {line_no}: `{keyword}` needs at least {required} components, got {}",
            args.len()
        );
    }
    let mut out = [0.0f32; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = arg
            .parse()
            .with_context(|| format!("line {line_no}: invalid number {arg:?} in `{keyword}`"))?;
    }
    Ok(out)
}

/// Parse OBJ corner reference: "v", "v/vt", "v/vt/vn", or "v//vn"
fn parse_corner(s: &str, mesh: &RawMesh, line_no: usize) -> Result<Corner> {
    let mut parts = s.split('/');
    let position = match parts.next() {
        Some(p) if !p.is_empty() => resolve_index(p, mesh.positions.len(), "position", line_no)?,
        _ => bail!("line {line_no}: corner {s:?} has no position index"),
    };
    let tex_coord = parts
        .next()
        .filter(|t| !t.is_empty())
        .map(|t| resolve_index(t, mesh.tex_coords.len(), "texture coordinate", line_no))
        .transpose()?;
    let normal = parts
        .next()
        .filter(|n| !n.is_empty())
        .map(|n| resolve_index(n, mesh.normals.len(), "normal", line_no))
        .transpose()?;

    Ok(Corner {
        position,
        normal,
        tex_coord,
    })
}

/// OBJ indices are 1-based; negative ones count back from the latest element.
fn resolve_index(raw: &str, defined: usize, what: &str, line_no: usize) -> Result<u32> {
    let index: i64 = raw
        .parse()
        .with_context(|| format!("line {line_no}: invalid {what} index {raw:?}"))?;
    let resolved = match index {
        0 => bail!("line {line_no}: {what} index 0 is not valid in OBJ"),
        i if i > 0 => i - 1,
        i => defined as i64 + i,
    };
    if resolved < 0 || resolved >= defined as i64 {
        bail!("line {line_no}: {what} index {index} out of range, {defined} defined so far");
    }
    u32::try_from(resolved).with_context(|| format!("line {line_no}: {what} index too large"))
}
