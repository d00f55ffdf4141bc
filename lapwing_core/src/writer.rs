use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use hashbrown::HashMap;
use tracing::{debug, info, warn};

use crate::asset::{Asset, PayloadError};
use crate::decode::Decoders;
use crate::format::{AssetKind, Entry, Header, ENTRY_SIZE, HEADER_SIZE};
use crate::hash::{HashError, HashParams};
use crate::mesh::build_mesh;
use crate::pio::write_all_at;
use crate::vox;

/// Why an archive build failed. Every variant is fatal to the build.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("archive I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("unsupported asset type: {}", path.display())]
    UnsupportedAssetType { path: PathBuf },
    #[error("failed to decode asset {}", path.display())]
    AssetDecodeFailed {
        path: PathBuf,
        #[source]
        cause: anyhow::Error,
    },
    #[error("asset {name:?} hashes to {hash:#018x}, already used by {existing:?}")]
    HashCollision {
        name: String,
        existing: String,
        hash: u64,
    },
    #[error("invalid asset name: {0}")]
    InvalidName(#[from] HashError),
    #[error("hash prime must be non-zero")]
    InvalidHashParams,
    #[error("archive was created for {capacity} assets")]
    TooManyAssets { capacity: usize },
    #[error("asset {name:?} cannot be encoded")]
    Payload {
        name: String,
        #[source]
        source: PayloadError,
    },
    #[error("archive build aborted by an earlier error")]
    Aborted,
}

/// Positional writer for asset archives.
///
/// # Write contract
/// [`create`](Writer::create) reserves room for the header and `capacity` ToC
/// entries. Each [`write_asset`](Writer::write_asset) decodes one source file
/// and writes its payload at the next free offset. [`finish`](Writer::finish)
/// then writes the header and the ToC into the reserved space.
///
/// # Format layout written
/// ```text
/// [HEADER: 20 bytes]                       ← written last by finish()
/// [TOC: 28 bytes × capacity]               ← written last by finish()
/// [PAYLOAD 0] [PAYLOAD 1] ... [PAYLOAD N-1]
/// ```
///
/// Any failed write poisons the writer: later calls return
/// [`WriteError::Aborted`] and the header stays zeroed, which readers reject.
pub struct Writer {
    file: File,
    params: HashParams,
    decoders: Decoders,
    capacity: usize,
    entries: Vec<Entry>,
    /// Name owning each hash, for collision reports.
    names: HashMap<u64, String>,
    /// Where the next payload goes.
    current_offset: u64,
    poisoned: bool,
}

impl Writer {
    /// Create (or truncate) the archive at `path` with room for `capacity` assets.
    pub fn create(
        path: impl AsRef<Path>,
        capacity: usize,
        params: HashParams,
        decoders: Decoders,
    ) -> Result<Self, WriteError> {
        if params.prime == 0 {
            return Err(WriteError::InvalidHashParams);
        }
        let payload_start = u64::try_from(capacity)
            .ok()
            .and_then(|n| n.checked_mul(ENTRY_SIZE))
            .and_then(|toc| toc.checked_add(HEADER_SIZE))
            .ok_or(WriteError::TooManyAssets { capacity })?;

        let file = File::create(path)?;
        // zero-filled header and ToC until finish()
        file.set_len(payload_start)?;

        Ok(Self {
            file,
            params,
            decoders,
            capacity,
            entries: Vec::new(),
            names: HashMap::new(),
            current_offset: payload_start,
            poisoned: false,
        })
    }

    pub fn params(&self) -> HashParams {
        self.params
    }

    /// Entries written so far, in payload order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Decode the file at `source` and store it under `name`.
    ///
    /// The asset kind comes from the file extension.
    pub fn write_asset(
        &mut self,
        name: &str,
        source: impl AsRef<Path>,
    ) -> Result<Entry, WriteError> {
        let source = source.as_ref();
        self.guarded(|w| {
            let asset = w.decode_source(source)?;
            w.store(name, &asset)
        })
    }

    /// Store an already decoded asset under `name`.
    pub fn add_asset(&mut self, name: &str, asset: &Asset) -> Result<Entry, WriteError> {
        self.guarded(|w| w.store(name, asset))
    }

    fn guarded<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, WriteError>,
    ) -> Result<T, WriteError> {
        if self.poisoned {
            return Err(WriteError::Aborted);
        }
        let result = op(self);
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }

    fn decode_source(&self, path: &Path) -> Result<Asset, WriteError> {
        let kind = AssetKind::from_path(path).ok_or_else(|| WriteError::UnsupportedAssetType {
            path: path.to_path_buf(),
        })?;

        let decoded = fs::read(path)
            .with_context(|| format!("reading {}", path.display()))
            .and_then(|bytes| self.decode_bytes(kind, &bytes));

        decoded.map_err(|cause| WriteError::AssetDecodeFailed {
            path: path.to_path_buf(),
            cause,
        })
    }

    fn decode_bytes(&self, kind: AssetKind, bytes: &[u8]) -> anyhow::Result<Asset> {
        match kind {
            AssetKind::Image => {
                let decoder = self.decoders.image.name();
                debug!(decoder, bytes = bytes.len(), "decoding image");
                let texture = self
                    .decoders
                    .image
                    .decode_image(bytes)
                    .with_context(|| format!("{decoder} decoder"))?;
                Ok(Asset::Texture(texture))
            }
            AssetKind::Model => {
                let decoder = self.decoders.mesh.name();
                debug!(decoder, bytes = bytes.len(), "decoding mesh");
                let text = std::str::from_utf8(bytes).context("mesh source is not UTF-8")?;
                let raw = self
                    .decoders
                    .mesh
                    .decode_mesh(text)
                    .with_context(|| format!("{decoder} decoder"))?;
                Ok(Asset::Model(build_mesh(&raw)?))
            }
            AssetKind::VoxelModel => Ok(Asset::VoxelModel(vox::parse(bytes)?)),
        }
    }

    fn store(&mut self, name: &str, asset: &Asset) -> Result<Entry, WriteError> {
        if self.entries.len() == self.capacity {
            return Err(WriteError::TooManyAssets {
                capacity: self.capacity,
            });
        }

        let hash = self.params.hash(name)?;
        if let Some(existing) = self.names.get(&hash) {
            return Err(WriteError::HashCollision {
                name: name.to_string(),
                existing: existing.clone(),
                hash,
            });
        }

        let payload = asset.encode_payload().map_err(|source| WriteError::Payload {
            name: name.to_string(),
            source,
        })?;
        write_all_at(&self.file, &payload, self.current_offset)?;

        let entry = Entry {
            hash,
            offset: self.current_offset,
            size: payload.len() as u64,
            kind: asset.kind(),
        };
        self.current_offset += entry.size;
        self.entries.push(entry);
        self.names.insert(hash, name.to_string());

        debug!(
            asset = name,
            kind = %entry.kind,
            offset = entry.offset,
            size = entry.size,
            "wrote asset"
        );
        Ok(entry)
    }

    /// Write the header and table of contents, sealing the archive.
    pub fn finish(self) -> Result<Header, WriteError> {
        if self.poisoned {
            return Err(WriteError::Aborted);
        }

        let header = Header {
            params: self.params,
            asset_count: self.entries.len() as u64,
        };
        write_all_at(&self.file, &header.to_bytes(), 0)?;

        let mut toc = Vec::with_capacity(self.entries.len() * ENTRY_SIZE as usize);
        for entry in &self.entries {
            toc.extend_from_slice(&entry.to_bytes());
        }
        write_all_at(&self.file, &toc, HEADER_SIZE)?;
        self.file.sync_data()?;

        info!(
            assets = header.asset_count,
            bytes = self.current_offset,
            prime = self.params.prime,
            "archive finished"
        );
        Ok(header)
    }
}

/// Build a complete archive at `output` from `(name, source path)` pairs.
///
/// On failure the partially written file is removed before the error is
/// returned.
pub fn pack_archive<N, P>(
    output: impl AsRef<Path>,
    assets: &[(N, P)],
    params: HashParams,
    decoders: Decoders,
) -> Result<Header, WriteError>
where
    N: AsRef<str>,
    P: AsRef<Path>,
{
    let output = output.as_ref();
    let result = Writer::create(output, assets.len(), params, decoders).and_then(|mut writer| {
        for (name, source) in assets {
            writer.write_asset(name.as_ref(), source)?;
        }
        writer.finish()
    });

    if let Err(err) = &result {
        warn!(output = %output.display(), error = %err, "archive build failed, removing output");
        if let Err(rm) = fs::remove_file(output) {
            if rm.kind() != io::ErrorKind::NotFound {
                warn!(output = %output.display(), error = %rm, "could not remove partial archive");
            }
        }
    }
    result
}
