use std::fmt;
use std::path::Path;

use crate::hash::HashParams;

/// Fixed size of the archive header in bytes.
///   prime:u32 + start_chars:u32 + end_chars:u32 + asset_count:u64
///   = 4 + 4 + 4 + 8 = 20
pub const HEADER_SIZE: u64 = 20;

/// Size of each table-of-contents entry in bytes.
///   hash:u64 + offset:u64 + size:u64 + type:u32
///   = 8 + 8 + 8 + 4 = 28
pub const ENTRY_SIZE: u64 = 28;

// ── Asset kinds ────────────────────────────────────────────────────────────

/// Payload schema selector stored in every ToC entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Image,
    Model,
    VoxelModel,
}

/// Source extensions recognised as images (lowercase, without the dot).
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "bmp", "hdr", "psd", "tga", "gif", "pic", "pgm", "ppm",
];
pub const MODEL_EXTENSIONS: &[&str] = &["obj"];
pub const VOXEL_MODEL_EXTENSIONS: &[&str] = &["vox"];

impl AssetKind {
    /// On-disk type tag.
    pub const fn tag(self) -> u32 {
        match self {
            AssetKind::Image => 0,
            AssetKind::Model => 1,
            AssetKind::VoxelModel => 2,
        }
    }

    pub const fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(AssetKind::Image),
            1 => Some(AssetKind::Model),
            2 => Some(AssetKind::VoxelModel),
            _ => None,
        }
    }

    /// Classify a source file by its extension, case-insensitively.
    ///
    /// Returns `None` for anything the packer cannot decode.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        let ext = ext.as_str();
        if IMAGE_EXTENSIONS.contains(&ext) {
            Some(AssetKind::Image)
        } else if MODEL_EXTENSIONS.contains(&ext) {
            Some(AssetKind::Model)
        } else if VOXEL_MODEL_EXTENSIONS.contains(&ext) {
            Some(AssetKind::VoxelModel)
        } else {
            None
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Model => "model",
            AssetKind::VoxelModel => "voxel model",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Header ─────────────────────────────────────────────────────────────────

/// Decoded representation of the 20-byte archive header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub params: HashParams,
    pub asset_count: u64,
}

impl Header {
    /// Serialize to exactly `HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        buf[0..4].copy_from_slice(&self.params.prime.to_le_bytes());
        buf[4..8].copy_from_slice(&self.params.start_chars.to_le_bytes());
        buf[8..12].copy_from_slice(&self.params.end_chars.to_le_bytes());
        buf[12..20].copy_from_slice(&self.asset_count.to_le_bytes());
        buf
    }

    /// Deserialize from `HEADER_SIZE` bytes. No validation beyond the layout.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE as usize]) -> Self {
        let u32_at = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
        let mut count = [0u8; 8];
        count.copy_from_slice(&buf[12..20]);
        Self {
            params: HashParams::new(u32_at(0), u32_at(4), u32_at(8)),
            asset_count: u64::from_le_bytes(count),
        }
    }

    /// First byte after the table of contents.
    pub fn toc_end(&self) -> Option<u64> {
        self.asset_count
            .checked_mul(ENTRY_SIZE)
            .and_then(|toc| toc.checked_add(HEADER_SIZE))
    }
}

// ── Table-of-contents entry ────────────────────────────────────────────────

/// One entry in the table of contents: where a payload lives and what it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    /// Name hash under the archive's [`HashParams`].
    pub hash: u64,
    /// Byte offset of the payload from the start of the file.
    pub offset: u64,
    /// Payload length in bytes, metadata header included.
    pub size: u64,
    pub kind: AssetKind,
}

impl Entry {
    /// Serialize to exactly `ENTRY_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE as usize] {
        let mut buf = [0u8; ENTRY_SIZE as usize];
        buf[0..8].copy_from_slice(&self.hash.to_le_bytes());
        buf[8..16].copy_from_slice(&self.offset.to_le_bytes());
        buf[16..24].copy_from_slice(&self.size.to_le_bytes());
        buf[24..28].copy_from_slice(&self.kind.tag().to_le_bytes());
        buf
    }

    /// Deserialize from `ENTRY_SIZE` bytes.
    ///
    /// Fails with the raw tag when the type is unknown.
    pub fn from_bytes(buf: &[u8; ENTRY_SIZE as usize]) -> Result<Self, u32> {
        let u64_at = |at: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&buf[at..at + 8]);
            u64::from_le_bytes(b)
        };
        let tag = u32::from_le_bytes([buf[24], buf[25], buf[26], buf[27]]);
        Ok(Self {
            hash: u64_at(0),
            offset: u64_at(8),
            size: u64_at(16),
            kind: AssetKind::from_tag(tag).ok_or(tag)?,
        })
    }

    /// One past the last payload byte, or `None` on overflow.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_little_endian_and_packed() {
        let header = Header {
            params: HashParams::new(0x0102_0304, 5, 6),
            asset_count: 7,
        };
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], &[4, 3, 2, 1]);
        assert_eq!(&bytes[4..8], &5u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &6u32.to_le_bytes());
        assert_eq!(&bytes[12..20], &7u64.to_le_bytes());
        assert_eq!(Header::from_bytes(&bytes), header);
        assert_eq!(header.toc_end(), Some(HEADER_SIZE + 7 * ENTRY_SIZE));
    }

    #[test]
    fn entry_with_unknown_tag_is_rejected() {
        let entry = Entry {
            hash: 42,
            offset: 100,
            size: 12,
            kind: AssetKind::VoxelModel,
        };
        let mut bytes = entry.to_bytes();
        assert_eq!(Entry::from_bytes(&bytes), Ok(entry));

        bytes[24..28].copy_from_slice(&9u32.to_le_bytes());
        assert_eq!(Entry::from_bytes(&bytes), Err(9));
    }

    #[test]
    fn kind_from_extension() {
        assert_eq!(AssetKind::from_path(Path::new("a/b.PNG")), Some(AssetKind::Image));
        assert_eq!(AssetKind::from_path(Path::new("hero.jpeg")), Some(AssetKind::Image));
        assert_eq!(AssetKind::from_path(Path::new("sponza.obj")), Some(AssetKind::Model));
        assert_eq!(AssetKind::from_path(Path::new("map.vox")), Some(AssetKind::VoxelModel));
        assert_eq!(AssetKind::from_path(Path::new("song.wav")), None);
        assert_eq!(AssetKind::from_path(Path::new("Makefile")), None);
    }
}
