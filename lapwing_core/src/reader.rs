use std::fs::File;
use std::io;
use std::path::Path;

use hashbrown::HashMap;
use tracing::{debug, info};

use crate::asset::{Asset, Mesh, PayloadError, Texture, VoxelModel};
use crate::format::{AssetKind, Entry, Header, ENTRY_SIZE, HEADER_SIZE};
use crate::hash::HashError;
use crate::pio::read_exact_at;

/// Why an archive could not be opened.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("cannot read archive: {0}")]
    Io(#[from] io::Error),
    #[error("archive is {actual} bytes, header and table of contents need {expected}")]
    Truncated { expected: u64, actual: u64 },
    #[error("archive header is invalid (was the build finished?)")]
    InvalidHeader,
    #[error("table of contents entry {index} has unknown type tag {tag}")]
    UnknownAssetType { index: u64, tag: u32 },
    #[error("table of contents entry {index} ({offset}+{size}) lies outside the payload region")]
    EntryOutOfBounds { index: u64, offset: u64, size: u64 },
    #[error("table of contents lists hash {hash:#018x} twice")]
    DuplicateHash { hash: u64 },
    #[error("payload at {offset} overlaps the payload at {previous_offset}")]
    OverlappingEntries { previous_offset: u64, offset: u64 },
}

/// Why a single asset could not be loaded. The reader stays usable.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("invalid asset name: {0}")]
    InvalidName(#[from] HashError),
    #[error("asset {name:?} not found")]
    AssetNotFound { name: String },
    #[error("asset {name:?} is a {found}, not a {expected}")]
    TypeMismatch {
        name: String,
        expected: AssetKind,
        found: AssetKind,
    },
    #[error("reading asset {name:?} failed")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("asset {name:?} has a corrupt payload")]
    CorruptPayload {
        name: String,
        #[source]
        source: PayloadError,
    },
}

/// Random-access reader for asset archives.
///
/// # Open sequence
/// 1. Read the 20-byte header (hash parameters, asset count).
/// 2. Read `asset_count` ToC entries into a map keyed by name hash.
///
/// The map is the only index: lookups hash the requested name with the
/// archive's stored parameters and never scan the file.
///
/// # Access pattern
/// [`get`](Reader::get) reads exactly one payload with a positioned read.
/// There is no shared cursor, so `&Reader` may be used from many threads at once.
pub struct Reader {
    file: File,
    header: Header,
    toc: HashMap<u64, Entry>,
}

impl Reader {
    /// Open an archive and load its table of contents.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OpenError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();

        // ── Read and validate header ────────────────────────────────────────
        if file_len < HEADER_SIZE {
            return Err(OpenError::Truncated {
                expected: HEADER_SIZE,
                actual: file_len,
            });
        }
        let mut header_buf = [0u8; HEADER_SIZE as usize];
        read_exact_at(&file, &mut header_buf, 0)?;
        let header = Header::from_bytes(&header_buf);

        if header.params.prime == 0 {
            return Err(OpenError::InvalidHeader);
        }
        let toc_end = header.toc_end().ok_or(OpenError::InvalidHeader)?;
        if toc_end > file_len {
            return Err(OpenError::Truncated {
                expected: toc_end,
                actual: file_len,
            });
        }

        // ── Load table of contents ──────────────────────────────────────────
        let mut toc_buf = vec![0u8; (toc_end - HEADER_SIZE) as usize];
        read_exact_at(&file, &mut toc_buf, HEADER_SIZE)?;

        let mut toc = HashMap::with_capacity(header.asset_count as usize);
        let mut entry_buf = [0u8; ENTRY_SIZE as usize];
        for (index, chunk) in toc_buf.chunks_exact(ENTRY_SIZE as usize).enumerate() {
            let index = index as u64;
            entry_buf.copy_from_slice(chunk);
            let entry = Entry::from_bytes(&entry_buf)
                .map_err(|tag| OpenError::UnknownAssetType { index, tag })?;

            let in_bounds = entry.offset >= toc_end && entry.end().is_some_and(|end| end <= file_len);
            if !in_bounds {
                return Err(OpenError::EntryOutOfBounds {
                    index,
                    offset: entry.offset,
                    size: entry.size,
                });
            }
            if toc.insert(entry.hash, entry).is_some() {
                return Err(OpenError::DuplicateHash { hash: entry.hash });
            }
        }

        let mut by_offset: Vec<Entry> = toc.values().copied().collect();
        by_offset.sort_by_key(|e| e.offset);
        for pair in by_offset.windows(2) {
            if pair[0].end().is_some_and(|end| end > pair[1].offset) {
                return Err(OpenError::OverlappingEntries {
                    previous_offset: pair[0].offset,
                    offset: pair[1].offset,
                });
            }
        }

        info!(
            path = %path.display(),
            assets = header.asset_count,
            prime = header.params.prime,
            "opened archive"
        );

        Ok(Self { file, header, toc })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Number of assets in the archive.
    #[inline]
    pub fn len(&self) -> usize {
        self.toc.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.toc.is_empty()
    }

    /// ToC entries ordered by payload offset (for inspection).
    pub fn entries(&self) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self.toc.values().copied().collect();
        entries.sort_by_key(|e| e.offset);
        entries
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_ok()
    }

    /// Resolve `name` to its ToC entry without reading the payload.
    pub fn entry(&self, name: &str) -> Result<&Entry, LookupError> {
        let hash = self.header.params.hash(name)?;
        self.toc.get(&hash).ok_or_else(|| LookupError::AssetNotFound {
            name: name.to_string(),
        })
    }

    /// Read the raw payload bytes (metadata header included) of `entry`.
    pub fn read_payload(&self, entry: &Entry) -> io::Result<Vec<u8>> {
        let mut payload = vec![0u8; entry.size as usize];
        read_exact_at(&self.file, &mut payload, entry.offset)?;
        Ok(payload)
    }

    /// Load the asset called `name`, which must be of kind `expected`.
    pub fn get(&self, name: &str, expected: AssetKind) -> Result<Asset, LookupError> {
        let payload = self.payload_of(name, expected)?;
        Asset::decode_payload(expected, &payload).map_err(|source| corrupt(name, source))
    }

    pub fn load_texture(&self, name: &str) -> Result<Texture, LookupError> {
        let payload = self.payload_of(name, AssetKind::Image)?;
        Texture::from_payload(&payload).map_err(|source| corrupt(name, source))
    }

    pub fn load_model(&self, name: &str) -> Result<Mesh, LookupError> {
        let payload = self.payload_of(name, AssetKind::Model)?;
        Mesh::from_payload(&payload).map_err(|source| corrupt(name, source))
    }

    pub fn load_voxel_model(&self, name: &str) -> Result<VoxelModel, LookupError> {
        let payload = self.payload_of(name, AssetKind::VoxelModel)?;
        VoxelModel::from_payload(&payload).map_err(|source| corrupt(name, source))
    }

    fn payload_of(&self, name: &str, expected: AssetKind) -> Result<Vec<u8>, LookupError> {
        let entry = *self.entry(name)?;
        if entry.kind != expected {
            return Err(LookupError::TypeMismatch {
                name: name.to_string(),
                expected,
                found: entry.kind,
            });
        }
        debug!(asset = name, kind = %entry.kind, offset = entry.offset, size = entry.size, "loading asset");
        self.read_payload(&entry).map_err(|source| LookupError::Io {
            name: name.to_string(),
            source,
        })
    }
}

fn corrupt(name: &str, source: PayloadError) -> LookupError {
    LookupError::CorruptPayload {
        name: name.to_string(),
        source,
    }
}
