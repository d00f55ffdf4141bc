//! Pack manifest parsing
//!
//! A manifest lists the assets of one archive:
//!
//! ```toml
//! output = "assets.lwa"
//!
//! [hash]              # optional, searched automatically when absent
//! prime = 31
//!
//! [[assets]]
//! name = "map.vox"
//! path = "models/map.vox"
//! ```
//!
//! Relative paths are resolved against the manifest's directory.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use hashbrown::HashSet;
use lapwing_core::HashParams;
use serde::Deserialize;

const DEFAULT_OUTPUT: &str = "assets.lwa";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default)]
    pub hash: Option<HashSection>,
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
}

fn default_output() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT)
}

/// Explicit hash parameters. Missing fields take the library defaults.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HashSection {
    #[serde(default = "default_prime")]
    pub prime: u32,
    #[serde(default = "default_start_chars")]
    pub start_chars: u32,
    #[serde(default = "default_end_chars")]
    pub end_chars: u32,
}

fn default_prime() -> u32 {
    HashParams::default().prime
}

fn default_start_chars() -> u32 {
    HashParams::default().start_chars
}

fn default_end_chars() -> u32 {
    HashParams::default().end_chars
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetEntry {
    pub name: String,
    pub path: PathBuf,
}

impl Manifest {
    /// Load a manifest from disk and resolve its paths.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let mut manifest = Self::parse(&content)
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))?;
        let base = path.parent().unwrap_or(Path::new(""));
        manifest.resolve_paths(base);
        Ok(manifest)
    }

    /// Parse manifest text. Paths are left as written.
    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(content)?;
        Ok(manifest)
    }

    fn resolve_paths(&mut self, base: &Path) {
        self.output = base.join(&self.output);
        for asset in &mut self.assets {
            asset.path = base.join(&asset.path);
        }
    }

    /// Reject empty and duplicate asset names.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.assets.len());
        for (i, asset) in self.assets.iter().enumerate() {
            if asset.name.is_empty() {
                bail!("asset #{} ({}) has an empty name", i + 1, asset.path.display());
            }
            if !seen.insert(asset.name.as_str()) {
                bail!("asset name {:?} is listed more than once", asset.name);
            }
        }
        if let Some(hash) = &self.hash {
            if hash.prime == 0 {
                bail!("[hash] prime must be non-zero");
            }
        }
        Ok(())
    }

    /// The hash parameters to pack with: the `[hash]` section if present,
    /// otherwise the first collision-free set found for the listed names.
    pub fn hash_params(&self) -> Result<HashParams> {
        if let Some(hash) = &self.hash {
            return Ok(HashParams::new(hash.prime, hash.start_chars, hash.end_chars));
        }
        let names: Vec<&str> = self.assets.iter().map(|a| a.name.as_str()).collect();
        HashParams::find_collision_free(&names, HashParams::default())?
            .context("no collision-free hash parameters found for the asset names")
    }

    /// `(name, path)` pairs in manifest order.
    pub fn asset_list(&self) -> Vec<(&str, &Path)> {
        self.assets
            .iter()
            .map(|a| (a.name.as_str(), a.path.as_path()))
            .collect()
    }
}
