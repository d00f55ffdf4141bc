//! In-memory asset types and their payload byte layouts.
//!
//! ```text
//! Image:      width:i32 height:i32 bit_depth:i32 | width*height*bit_depth bytes
//! Model:      vertex_count:u64 index_count:u64 attributes:u8
//!             | vertex_count × (position:3f32 normal:3f32 tangent:3f32 tex_coord:2f32)
//!             | index_count × u32
//! VoxelModel: width:u32 height:u32 depth:u32 voxel_count:u32
//!             | voxel_count × (pos:[u8;3] color:u32)
//!             | 256 × u32 palette
//! ```
//!
//! All fields little-endian, no padding.

use glam::{Vec2, Vec3};

use crate::cursor::{ByteCursor, UnexpectedEof};
use crate::format::AssetKind;

pub const TEXTURE_METADATA_SIZE: usize = 12;
pub const MODEL_METADATA_SIZE: usize = 17;
pub const VOXEL_MODEL_METADATA_SIZE: usize = 16;
pub const VERTEX_SIZE: usize = 44;
pub const INDEX_SIZE: usize = 4;
pub const VOXEL_SIZE: usize = 7;
pub const PALETTE_LEN: usize = 256;
pub const PALETTE_SIZE: usize = PALETTE_LEN * 4;

/// Bits of [`ModelMetadata::vertex_attributes`].
pub mod vertex_attrib {
    pub const POSITION: u8 = 1;
    pub const NORMAL: u8 = 2;
    pub const TANGENT: u8 = 4;
    pub const TEX_COORD: u8 = 8;
    pub const ALL: u8 = POSITION | NORMAL | TANGENT | TEX_COORD;
}

/// A payload could not be encoded or does not match its schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("payload truncated: {0}")]
    Truncated(#[from] UnexpectedEof),
    #[error("payload has {actual} bytes after its metadata, schema needs {expected}")]
    LengthMismatch { expected: u64, actual: u64 },
    #[error("invalid texture dimensions {width}x{height}x{bit_depth}")]
    InvalidTextureDimensions { width: i32, height: i32, bit_depth: i32 },
    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: u64 },
    #[error("{what} count {count} does not fit the payload schema")]
    TooLarge { what: &'static str, count: usize },
}

// ── Image ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureMetadata {
    pub width: i32,
    pub height: i32,
    /// Channels per pixel, one byte each.
    pub bit_depth: i32,
}

impl TextureMetadata {
    /// `width * height * bit_depth`, or `None` when negative or overflowing.
    pub fn pixel_len(&self) -> Option<usize> {
        let w = usize::try_from(self.width).ok()?;
        let h = usize::try_from(self.height).ok()?;
        let c = usize::try_from(self.bit_depth).ok()?;
        w.checked_mul(h)?.checked_mul(c)
    }

    fn invalid(&self) -> PayloadError {
        PayloadError::InvalidTextureDimensions {
            width: self.width,
            height: self.height,
            bit_depth: self.bit_depth,
        }
    }
}

/// Decoded pixels, row-major, `bit_depth` interleaved channels per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    pub metadata: TextureMetadata,
    pub pixels: Vec<u8>,
}

// ── Model ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelMetadata {
    pub vertex_count: u64,
    pub index_count: u64,
    pub vertex_attributes: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub tex_coord: Vec2,
}

/// Indexed triangle list.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub vertex_attributes: u8,
}

impl Mesh {
    pub fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            vertex_count: self.vertices.len() as u64,
            index_count: self.indices.len() as u64,
            vertex_attributes: self.vertex_attributes,
        }
    }
}

// ── Voxel model ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoxelModelMetadata {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub voxel_count: u32,
}

/// One populated cell with its resolved palette color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Voxel {
    pub pos: [u8; 3],
    pub color: u32,
}

/// Sparse voxel list plus the 256-color palette it was resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoxelModel {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub voxels: Vec<Voxel>,
    pub palette: [u32; PALETTE_LEN],
}

impl VoxelModel {
    pub fn metadata(&self) -> VoxelModelMetadata {
        VoxelModelMetadata {
            width: self.width,
            height: self.height,
            depth: self.depth,
            voxel_count: self.voxels.len() as u32,
        }
    }

    /// Scatter the voxels into a dense `width * height * depth` grid.
    ///
    /// Cell `(x, y, z)` lives at `z*width*height + y*width + x`. Empty cells are
    /// `0` (alpha 0). Voxels outside the grid are dropped. Returns `None` when
    /// the grid size overflows or cannot be allocated.
    pub fn to_grid(&self) -> Option<Vec<u32>> {
        let (w, h, d) = (self.width as usize, self.height as usize, self.depth as usize);
        let len = w.checked_mul(h)?.checked_mul(d)?;
        let mut grid = Vec::new();
        grid.try_reserve_exact(len).ok()?;
        grid.resize(len, 0u32);
        for voxel in &self.voxels {
            let [x, y, z] = voxel.pos.map(usize::from);
            if x < w && y < h && z < d {
                grid[z * w * h + y * w + x] = voxel.color;
            }
        }
        Some(grid)
    }
}

// ── Payloads ───────────────────────────────────────────────────────────────

/// A decoded asset of any supported kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Asset {
    Texture(Texture),
    Model(Mesh),
    VoxelModel(VoxelModel),
}

impl Asset {
    pub fn kind(&self) -> AssetKind {
        match self {
            Asset::Texture(_) => AssetKind::Image,
            Asset::Model(_) => AssetKind::Model,
            Asset::VoxelModel(_) => AssetKind::VoxelModel,
        }
    }

    /// Serialize to the payload layout of [`Asset::kind`].
    pub fn encode_payload(&self) -> Result<Vec<u8>, PayloadError> {
        match self {
            Asset::Texture(t) => encode_texture(t),
            Asset::Model(m) => Ok(encode_mesh(m)),
            Asset::VoxelModel(v) => encode_voxel_model(v),
        }
    }

    /// Parse a whole payload. Every byte must be accounted for by the schema.
    pub fn decode_payload(kind: AssetKind, payload: &[u8]) -> Result<Asset, PayloadError> {
        match kind {
            AssetKind::Image => Texture::from_payload(payload).map(Asset::Texture),
            AssetKind::Model => Mesh::from_payload(payload).map(Asset::Model),
            AssetKind::VoxelModel => VoxelModel::from_payload(payload).map(Asset::VoxelModel),
        }
    }
}

impl Texture {
    pub fn from_payload(payload: &[u8]) -> Result<Self, PayloadError> {
        decode_texture(&mut ByteCursor::new(payload))
    }
}

impl Mesh {
    pub fn from_payload(payload: &[u8]) -> Result<Self, PayloadError> {
        decode_mesh(&mut ByteCursor::new(payload))
    }
}

impl VoxelModel {
    pub fn from_payload(payload: &[u8]) -> Result<Self, PayloadError> {
        decode_voxel_model(&mut ByteCursor::new(payload))
    }
}

/// Size of the metadata header that starts a payload of `kind`.
pub const fn metadata_size(kind: AssetKind) -> usize {
    match kind {
        AssetKind::Image => TEXTURE_METADATA_SIZE,
        AssetKind::Model => MODEL_METADATA_SIZE,
        AssetKind::VoxelModel => VOXEL_MODEL_METADATA_SIZE,
    }
}

fn expect_remaining(c: &ByteCursor<'_>, expected: Option<usize>) -> Result<(), PayloadError> {
    let actual = c.remaining();
    match expected {
        Some(expected) if expected == actual => Ok(()),
        expected => Err(PayloadError::LengthMismatch {
            expected: expected.map_or(u64::MAX, |e| e as u64),
            actual: actual as u64,
        }),
    }
}

fn encode_texture(t: &Texture) -> Result<Vec<u8>, PayloadError> {
    let len = t.metadata.pixel_len().ok_or_else(|| t.metadata.invalid())?;
    if len != t.pixels.len() {
        return Err(PayloadError::LengthMismatch {
            expected: len as u64,
            actual: t.pixels.len() as u64,
        });
    }
    let mut out = Vec::with_capacity(TEXTURE_METADATA_SIZE + len);
    out.extend_from_slice(&t.metadata.width.to_le_bytes());
    out.extend_from_slice(&t.metadata.height.to_le_bytes());
    out.extend_from_slice(&t.metadata.bit_depth.to_le_bytes());
    out.extend_from_slice(&t.pixels);
    Ok(out)
}

fn decode_texture(c: &mut ByteCursor<'_>) -> Result<Texture, PayloadError> {
    let metadata = TextureMetadata {
        width: c.read_i32()?,
        height: c.read_i32()?,
        bit_depth: c.read_i32()?,
    };
    let len = metadata.pixel_len().ok_or_else(|| metadata.invalid())?;
    expect_remaining(c, Some(len))?;
    Ok(Texture {
        metadata,
        pixels: c.read_bytes(len)?.to_vec(),
    })
}

fn encode_mesh(m: &Mesh) -> Vec<u8> {
    let meta = m.metadata();
    let mut out = Vec::with_capacity(
        MODEL_METADATA_SIZE + m.vertices.len() * VERTEX_SIZE + m.indices.len() * INDEX_SIZE,
    );
    out.extend_from_slice(&meta.vertex_count.to_le_bytes());
    out.extend_from_slice(&meta.index_count.to_le_bytes());
    out.push(meta.vertex_attributes);
    for v in &m.vertices {
        let floats = v
            .position
            .to_array()
            .into_iter()
            .chain(v.normal.to_array())
            .chain(v.tangent.to_array())
            .chain(v.tex_coord.to_array());
        for f in floats {
            out.extend_from_slice(&f.to_le_bytes());
        }
    }
    for i in &m.indices {
        out.extend_from_slice(&i.to_le_bytes());
    }
    out
}

fn read_vec3(c: &mut ByteCursor<'_>) -> Result<Vec3, UnexpectedEof> {
    Ok(Vec3::new(c.read_f32()?, c.read_f32()?, c.read_f32()?))
}

fn decode_mesh(c: &mut ByteCursor<'_>) -> Result<Mesh, PayloadError> {
    let meta = ModelMetadata {
        vertex_count: c.read_u64()?,
        index_count: c.read_u64()?,
        vertex_attributes: c.read_u8()?,
    };
    // check the declared counts against the bytes present before allocating
    let data_len = usize::try_from(meta.vertex_count)
        .ok()
        .and_then(|v| v.checked_mul(VERTEX_SIZE))
        .zip(
            usize::try_from(meta.index_count)
                .ok()
                .and_then(|i| i.checked_mul(INDEX_SIZE)),
        )
        .and_then(|(v, i)| v.checked_add(i));
    expect_remaining(c, data_len)?;

    let mut vertices = Vec::with_capacity(meta.vertex_count as usize);
    for _ in 0..meta.vertex_count {
        vertices.push(Vertex {
            position: read_vec3(c)?,
            normal: read_vec3(c)?,
            tangent: read_vec3(c)?,
            tex_coord: Vec2::new(c.read_f32()?, c.read_f32()?),
        });
    }
    let mut indices = Vec::with_capacity(meta.index_count as usize);
    for _ in 0..meta.index_count {
        let index = c.read_u32()?;
        if index as u64 >= meta.vertex_count {
            return Err(PayloadError::IndexOutOfRange {
                index,
                vertex_count: meta.vertex_count,
            });
        }
        indices.push(index);
    }
    Ok(Mesh {
        vertices,
        indices,
        vertex_attributes: meta.vertex_attributes,
    })
}

fn encode_voxel_model(v: &VoxelModel) -> Result<Vec<u8>, PayloadError> {
    let count = u32::try_from(v.voxels.len()).map_err(|_| PayloadError::TooLarge {
        what: "voxel",
        count: v.voxels.len(),
    })?;
    let mut out =
        Vec::with_capacity(VOXEL_MODEL_METADATA_SIZE + v.voxels.len() * VOXEL_SIZE + PALETTE_SIZE);
    for field in [v.width, v.height, v.depth, count] {
        out.extend_from_slice(&field.to_le_bytes());
    }
    for voxel in &v.voxels {
        out.extend_from_slice(&voxel.pos);
        out.extend_from_slice(&voxel.color.to_le_bytes());
    }
    for color in &v.palette {
        out.extend_from_slice(&color.to_le_bytes());
    }
    Ok(out)
}

fn decode_voxel_model(c: &mut ByteCursor<'_>) -> Result<VoxelModel, PayloadError> {
    let meta = VoxelModelMetadata {
        width: c.read_u32()?,
        height: c.read_u32()?,
        depth: c.read_u32()?,
        voxel_count: c.read_u32()?,
    };
    let data_len = (meta.voxel_count as usize)
        .checked_mul(VOXEL_SIZE)
        .and_then(|v| v.checked_add(PALETTE_SIZE));
    expect_remaining(c, data_len)?;

    let mut voxels = Vec::with_capacity(meta.voxel_count as usize);
    for _ in 0..meta.voxel_count {
        voxels.push(Voxel {
            pos: c.read_array()?,
            color: c.read_u32()?,
        });
    }
    let mut palette = [0u32; PALETTE_LEN];
    for slot in palette.iter_mut() {
        *slot = c.read_u32()?;
    }
    Ok(VoxelModel {
        width: meta.width,
        height: meta.height,
        depth: meta.depth,
        voxels,
        palette,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_mesh() -> Mesh {
        let v = |x: f32| Vertex {
            position: Vec3::new(x, 0.0, 0.0),
            normal: Vec3::Z,
            tangent: Vec3::X,
            tex_coord: Vec2::new(x, 1.0),
        };
        Mesh {
            vertices: vec![v(0.0), v(1.0), v(2.0)],
            indices: vec![0, 1, 2],
            vertex_attributes: vertex_attrib::ALL,
        }
    }

    #[test]
    fn texture_payload_is_metadata_then_pixels() {
        let texture = Texture {
            metadata: TextureMetadata { width: 2, height: 1, bit_depth: 3 },
            pixels: vec![1, 2, 3, 4, 5, 6],
        };
        let bytes = Asset::Texture(texture.clone()).encode_payload().unwrap();
        assert_eq!(bytes.len(), TEXTURE_METADATA_SIZE + 6);
        assert_eq!(&bytes[0..4], &2i32.to_le_bytes());
        assert_eq!(&bytes[12..], &[1, 2, 3, 4, 5, 6]);
        assert_eq!(
            Asset::decode_payload(AssetKind::Image, &bytes).unwrap(),
            Asset::Texture(texture)
        );
    }

    #[test]
    fn texture_with_wrong_pixel_count_does_not_encode() {
        let texture = Texture {
            metadata: TextureMetadata { width: 2, height: 2, bit_depth: 4 },
            pixels: vec![0; 15],
        };
        assert_eq!(
            Asset::Texture(texture).encode_payload(),
            Err(PayloadError::LengthMismatch { expected: 16, actual: 15 })
        );
    }

    #[test]
    fn negative_texture_dimensions_are_rejected() {
        let mut bytes = Vec::new();
        for field in [-1i32, 2, 4] {
            bytes.extend_from_slice(&field.to_le_bytes());
        }
        assert!(matches!(
            Asset::decode_payload(AssetKind::Image, &bytes),
            Err(PayloadError::InvalidTextureDimensions { .. })
        ));
    }

    #[test]
    fn mesh_payload_size_follows_counts() {
        let mesh = sample_mesh();
        let bytes = Asset::Model(mesh.clone()).encode_payload().unwrap();
        assert_eq!(bytes.len(), MODEL_METADATA_SIZE + 3 * VERTEX_SIZE + 3 * INDEX_SIZE);
        assert_eq!(bytes[16], vertex_attrib::ALL);
        assert_eq!(
            Asset::decode_payload(AssetKind::Model, &bytes).unwrap(),
            Asset::Model(mesh)
        );
    }

    #[test]
    fn mesh_with_dangling_index_is_rejected() {
        let mut mesh = sample_mesh();
        mesh.indices[2] = 3;
        let bytes = Asset::Model(mesh).encode_payload().unwrap();
        assert_eq!(
            Asset::decode_payload(AssetKind::Model, &bytes),
            Err(PayloadError::IndexOutOfRange { index: 3, vertex_count: 3 })
        );
    }

    #[test]
    fn mesh_with_inflated_counts_fails_before_allocating() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.push(vertex_attrib::ALL);
        assert!(matches!(
            Asset::decode_payload(AssetKind::Model, &bytes),
            Err(PayloadError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn voxel_payload_trailing_bytes_are_rejected() {
        let mut palette = [0u32; PALETTE_LEN];
        palette[1] = 0xFF00_00FF;
        let model = VoxelModel {
            width: 2,
            height: 2,
            depth: 2,
            voxels: vec![Voxel { pos: [1, 0, 1], color: 0xFF00_00FF }],
            palette,
        };
        let mut bytes = Asset::VoxelModel(model.clone()).encode_payload().unwrap();
        assert_eq!(bytes.len(), VOXEL_MODEL_METADATA_SIZE + VOXEL_SIZE + PALETTE_SIZE);
        assert_eq!(
            Asset::decode_payload(AssetKind::VoxelModel, &bytes).unwrap(),
            Asset::VoxelModel(model)
        );

        bytes.push(0);
        assert!(matches!(
            Asset::decode_payload(AssetKind::VoxelModel, &bytes),
            Err(PayloadError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn dense_grid_places_voxels_by_xyz() {
        let model = VoxelModel {
            width: 3,
            height: 2,
            depth: 2,
            voxels: vec![
                Voxel { pos: [0, 0, 0], color: 1 },
                Voxel { pos: [2, 1, 1], color: 2 },
                Voxel { pos: [9, 0, 0], color: 3 },
            ],
            palette: [0; PALETTE_LEN],
        };
        let grid = model.to_grid().unwrap();
        assert_eq!(grid.len(), 12);
        assert_eq!(grid[0], 1);
        assert_eq!(grid[6 + 3 + 2], 2);
        assert_eq!(grid.iter().filter(|&&c| c != 0).count(), 2);
    }

    #[test]
    fn oversized_grid_is_refused() {
        let model = VoxelModel {
            width: u32::MAX,
            height: u32::MAX,
            depth: u32::MAX,
            voxels: vec![Voxel { pos: [0, 0, 0], color: 1 }],
            palette: [0; PALETTE_LEN],
        };
        assert_eq!(model.to_grid(), None);
    }
}
