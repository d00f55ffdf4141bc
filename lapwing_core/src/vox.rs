//! MagicaVoxel `.vox` parser.
//!
//! ```text
//! "VOX " version:u32
//! MAIN (content 0)
//! ├── PACK            optional, skipped
//! ├── SIZE            x:u32 y:u32 z:u32
//! ├── XYZI            n:u32, n × (x:u8 y:u8 z:u8 color_index:u8)
//! ├── ...             any chunks, skipped
//! └── RGBA            256 × u32
//! ```
//!
//! Each chunk is `id:[u8;4] content_size:u32 children_size:u32` followed by
//! its content and children. Only the first model of a file is read.
//!
//! # Palette indexing
//!
//! A voxel's `color_index` selects `palette[color_index]`, where the palette is
//! the RGBA chunk rotated by one slot: `palette[i] = rgba[i - 1]` for `i` in
//! `1..=255`, and `palette[0] = rgba[255]`. Index 0 is never emitted by
//! MagicaVoxel, so slot 0 carries the otherwise unreachable last chunk entry.

use tracing::debug;

use crate::asset::{Voxel, VoxelModel, PALETTE_LEN, PALETTE_SIZE};
use crate::cursor::{ByteCursor, UnexpectedEof};

pub const VOX_MAGIC: [u8; 4] = *b"VOX ";

const MAIN: [u8; 4] = *b"MAIN";
const PACK: [u8; 4] = *b"PACK";
const SIZE: [u8; 4] = *b"SIZE";
const XYZI: [u8; 4] = *b"XYZI";
const RGBA: [u8; 4] = *b"RGBA";

const SIZE_CONTENT_LEN: u32 = 12;

/// Largest extent along any axis. Voxel coordinates are single bytes.
pub const MAX_DIMENSION: u32 = 256;

/// Why a `.vox` buffer was rejected. Parsing stops at the first problem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoxParseError {
    #[error("not a VOX file (magic {found:?})")]
    BadMagic { found: [u8; 4] },
    #[error("MAIN chunk missing or malformed")]
    MalformedMain,
    #[error("SIZE chunk missing or malformed")]
    MissingSize,
    #[error("XYZI chunk missing")]
    MissingVoxels,
    #[error("model size {width}x{height}x{depth} is outside 1..={MAX_DIMENSION} per axis")]
    InvalidDimensions { width: u32, height: u32, depth: u32 },
    #[error("XYZI chunk has {content_size} bytes of content for {count} voxels")]
    MalformedVoxels { count: u32, content_size: u32 },
    #[error("no RGBA chunk before end of input")]
    MissingPalette,
    #[error("RGBA chunk has {size} bytes, expected {PALETTE_SIZE}")]
    MalformedPalette { size: u32 },
    #[error("voxel at {pos:?} lies outside the {width}x{height}x{depth} model")]
    VoxelOutOfBounds {
        pos: [u8; 3],
        width: u32,
        height: u32,
        depth: u32,
    },
    #[error(transparent)]
    UnexpectedEof(#[from] UnexpectedEof),
}

struct ChunkHeader {
    id: [u8; 4],
    content_size: u32,
}

impl ChunkHeader {
    fn read(c: &mut ByteCursor<'_>) -> Result<Self, UnexpectedEof> {
        let id = c.read_array()?;
        let content_size = c.read_u32()?;
        let _children_size = c.read_u32()?;
        Ok(Self { id, content_size })
    }

    fn skip_content(&self, c: &mut ByteCursor<'_>) -> Result<(), UnexpectedEof> {
        c.skip(self.content_size as usize)
    }
}

/// Parse a complete `.vox` file image.
pub fn parse(bytes: &[u8]) -> Result<VoxelModel, VoxParseError> {
    let mut c = ByteCursor::new(bytes);

    let found = c.read_array()?;
    if found != VOX_MAGIC {
        return Err(VoxParseError::BadMagic { found });
    }
    let _version = c.read_u32()?;

    let main = ChunkHeader::read(&mut c)?;
    if main.id != MAIN || main.content_size != 0 {
        return Err(VoxParseError::MalformedMain);
    }

    let mut next = ChunkHeader::read(&mut c)?;
    if next.id == PACK {
        next.skip_content(&mut c)?;
        next = ChunkHeader::read(&mut c)?;
    }

    if next.id != SIZE || next.content_size != SIZE_CONTENT_LEN {
        return Err(VoxParseError::MissingSize);
    }
    let width = c.read_u32()?;
    let height = c.read_u32()?;
    let depth = c.read_u32()?;
    if [width, height, depth]
        .iter()
        .any(|&d| d == 0 || d > MAX_DIMENSION)
    {
        return Err(VoxParseError::InvalidDimensions {
            width,
            height,
            depth,
        });
    }

    let next = ChunkHeader::read(&mut c)?;
    if next.id != XYZI {
        return Err(VoxParseError::MissingVoxels);
    }
    let count = c.read_u32()?;
    let expected = u64::from(count) * 4 + 4;
    if u64::from(next.content_size) != expected {
        return Err(VoxParseError::MalformedVoxels {
            count,
            content_size: next.content_size,
        });
    }
    let count = count as usize;
    // packed x, y, z, color_index
    let mut raw = Vec::with_capacity(count.min(c.remaining() / 4));
    for _ in 0..count {
        raw.push(c.read_array::<4>()?);
    }

    let rgba = loop {
        if c.is_empty() {
            return Err(VoxParseError::MissingPalette);
        }
        let chunk = ChunkHeader::read(&mut c)?;
        if chunk.id == RGBA {
            break chunk;
        }
        chunk.skip_content(&mut c)?;
    };
    if rgba.content_size as usize != PALETTE_SIZE {
        return Err(VoxParseError::MalformedPalette {
            size: rgba.content_size,
        });
    }
    let mut palette = [0u32; PALETTE_LEN];
    for i in 0..PALETTE_LEN {
        palette[(i + 1) % PALETTE_LEN] = c.read_u32()?;
    }

    let mut voxels = Vec::with_capacity(raw.len());
    for [x, y, z, color_index] in raw {
        if x as u32 >= width || y as u32 >= height || z as u32 >= depth {
            return Err(VoxParseError::VoxelOutOfBounds {
                pos: [x, y, z],
                width,
                height,
                depth,
            });
        }
        voxels.push(Voxel {
            pos: [x, y, z],
            color: palette[color_index as usize],
        });
    }

    debug!(width, height, depth, voxels = voxels.len(), "parsed vox model");

    Ok(VoxelModel {
        width,
        height,
        depth,
        voxels,
        palette,
    })
}


#[cfg(test)]
mod tests {
    use super::fixture::*;
    use super::*;

    const RED: u32 = 0xFF00_00FF;

    fn sample() -> Vec<u8> {
        vox_file(
            [4, 4, 4],
            &[[0, 0, 0, 1], [1, 2, 3, 1], [3, 3, 3, 5]],
            &rgba_with(RED),
        )
    }

    #[test]
    fn parses_dimensions_voxels_and_palette() {
        let model = parse(&sample()).unwrap();
        assert_eq!((model.width, model.height, model.depth), (4, 4, 4));
        assert_eq!(model.voxels.len(), 3);
        assert_eq!(model.voxels[0], Voxel { pos: [0, 0, 0], color: RED });
        assert_eq!(model.voxels[1], Voxel { pos: [1, 2, 3], color: RED });
        // color index 5 -> rgba[4]
        assert_eq!(model.voxels[2].color, 0xFF00_0004);
    }

    #[test]
    fn palette_is_rotated_by_one_slot() {
        let rgba = rgba_with(RED);
        let model = parse(&sample()).unwrap();
        assert_eq!(model.palette[1], RED);
        for i in 1..256 {
            assert_eq!(model.palette[i], rgba[i - 1]);
        }
        assert_eq!(model.palette[0], rgba[255]);
    }

    #[test]
    fn dense_grid_uses_zyx_layout() {
        let model = parse(&sample()).unwrap();
        let grid = model.to_grid().unwrap();
        assert_eq!(grid.len(), 64);
        assert_eq!(grid[0], RED);
        assert_eq!(grid[3 * 16 + 2 * 4 + 1], RED);
        assert_eq!(grid[63], 0xFF00_0004);
        assert_eq!(grid.iter().filter(|&&c| c == 0).count(), 61);
    }

    #[test]
    fn pack_and_unknown_chunks_are_skipped() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"VOX ");
        bytes.extend_from_slice(&150u32.to_le_bytes());
        bytes.extend_from_slice(&chunk(b"MAIN", &[]));
        bytes.extend_from_slice(&chunk(b"PACK", &1u32.to_le_bytes()));
        bytes.extend_from_slice(&chunk(b"SIZE", &[2, 0, 0, 0, 2, 0, 0, 0, 2, 0, 0, 0]));
        bytes.extend_from_slice(&chunk(b"XYZI", &[1, 0, 0, 0, 1, 1, 1, 7]));
        bytes.extend_from_slice(&chunk(b"nTRN", &[0u8; 28]));
        bytes.extend_from_slice(&chunk(b"LAYR", &[0u8; 9]));
        bytes.extend_from_slice(&chunk(b"RGBA", &rgba_with(RED).map(u32::to_le_bytes).concat()));
        bytes.extend_from_slice(&chunk(b"MATL", &[0u8; 4]));

        let model = parse(&bytes).unwrap();
        assert_eq!(model.voxels, vec![Voxel { pos: [1, 1, 1], color: 0xFF00_0006 }]);
    }

    #[test]
    fn bad_magic() {
        let mut bytes = sample();
        bytes[..4].copy_from_slice(b"RIFF");
        assert_eq!(parse(&bytes), Err(VoxParseError::BadMagic { found: *b"RIFF" }));
    }

    #[test]
    fn main_with_content_is_malformed() {
        let mut bytes = sample();
        // MAIN content_size lives right after magic, version and the MAIN id
        bytes[12..16].copy_from_slice(&4u32.to_le_bytes());
        assert_eq!(parse(&bytes), Err(VoxParseError::MalformedMain));

        let mut bytes = sample();
        bytes[8..12].copy_from_slice(b"MAIM");
        assert_eq!(parse(&bytes), Err(VoxParseError::MalformedMain));
    }

    #[test]
    fn size_chunk_with_wrong_length_is_rejected() {
        let mut bytes = sample();
        bytes[24..28].copy_from_slice(&16u32.to_le_bytes());
        assert_eq!(parse(&bytes), Err(VoxParseError::MissingSize));
    }

    #[test]
    fn missing_xyzi() {
        let mut bytes = sample();
        // XYZI id follows the 12-byte SIZE header and its 12 bytes of content
        bytes[44..48].copy_from_slice(b"XYZW");
        assert_eq!(parse(&bytes), Err(VoxParseError::MissingVoxels));
    }

    #[test]
    fn wrong_palette_size() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"VOX ");
        bytes.extend_from_slice(&150u32.to_le_bytes());
        bytes.extend_from_slice(&chunk(b"MAIN", &[]));
        bytes.extend_from_slice(&chunk(b"SIZE", &[1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0]));
        bytes.extend_from_slice(&chunk(b"XYZI", &0u32.to_le_bytes()));
        bytes.extend_from_slice(&chunk(b"RGBA", &[0u8; 1020]));
        assert_eq!(parse(&bytes), Err(VoxParseError::MalformedPalette { size: 1020 }));
    }

    #[test]
    fn voxel_outside_grid_is_rejected() {
        let bytes = vox_file([2, 2, 2], &[[2, 0, 0, 1]], &rgba_with(RED));
        assert!(matches!(parse(&bytes), Err(VoxParseError::VoxelOutOfBounds { .. })));
    }

    #[test]
    fn truncation_never_panics() {
        let bytes = sample();
        for len in 0..bytes.len() {
            let err = parse(&bytes[..len]).unwrap_err();
            assert!(
                matches!(
                    err,
                    VoxParseError::UnexpectedEof(_) | VoxParseError::MissingPalette
                ),
                "truncated at {len}: {err:?}"
            );
        }
    }

    #[test]
    fn truncation_at_chunk_boundary_before_palette() {
        let bytes = sample();
        // magic + version + MAIN + SIZE + XYZI(4 + 3*4)
        let before_rgba = 8 + 12 + 24 + 12 + 16;
        assert_eq!(parse(&bytes[..before_rgba]), Err(VoxParseError::MissingPalette));
        assert!(matches!(
            parse(&bytes[..before_rgba + 12]),
            Err(VoxParseError::UnexpectedEof(_))
        ));
    }

    #[test]
    fn huge_voxel_count_fails_cleanly() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"VOX ");
        bytes.extend_from_slice(&150u32.to_le_bytes());
        bytes.extend_from_slice(&chunk(b"MAIN", &[]));
        bytes.extend_from_slice(&chunk(b"SIZE", &[1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0]));
        bytes.extend_from_slice(&chunk(b"XYZI", &u32::MAX.to_le_bytes()));
        assert_eq!(
            parse(&bytes),
            Err(VoxParseError::MalformedVoxels { count: u32::MAX, content_size: 4 })
        );
    }

    #[test]
    fn voxel_count_must_match_xyzi_content() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"VOX ");
        bytes.extend_from_slice(&150u32.to_le_bytes());
        bytes.extend_from_slice(&chunk(b"MAIN", &[]));
        bytes.extend_from_slice(&chunk(b"SIZE", &[2, 0, 0, 0, 2, 0, 0, 0, 2, 0, 0, 0]));
        // declares two voxels but carries none
        bytes.extend_from_slice(&chunk(b"XYZI", &2u32.to_le_bytes()));
        bytes.extend_from_slice(&chunk(b"RGBA", &rgba_with(RED).map(u32::to_le_bytes).concat()));
        assert_eq!(
            parse(&bytes),
            Err(VoxParseError::MalformedVoxels { count: 2, content_size: 4 })
        );
    }

    #[test]
    fn out_of_range_dimensions_are_rejected() {
        for size in [[u32::MAX; 3], [0, 4, 4], [4, 257, 4]] {
            let bytes = vox_file(size, &[[0, 0, 0, 1]], &rgba_with(RED));
            assert_eq!(
                parse(&bytes),
                Err(VoxParseError::InvalidDimensions {
                    width: size[0],
                    height: size[1],
                    depth: size[2],
                }),
                "{size:?}"
            );
        }
        let largest = vox_file([256, 256, 256], &[[255, 255, 255, 1]], &rgba_with(RED));
        assert_eq!(parse(&largest).unwrap().voxels[0].pos, [255, 255, 255]);
    }
}
