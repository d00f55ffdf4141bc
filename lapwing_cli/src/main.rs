use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use xxhash_rust::xxh3::xxh3_64;

use lapwing_core::asset::metadata_size;
use lapwing_core::{pack_archive, Asset, HashParams, Reader};
use lapwing_decoders::default_decoders;

mod manifest;

use manifest::Manifest;

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "lapwing",
    about = "Pack game assets into Lapwing archives and load them back by name",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an archive from a TOML manifest
    Pack {
        /// Manifest listing the assets to pack
        #[arg(default_value = "assets.toml")]
        manifest: PathBuf,
        /// Destination archive (overrides the manifest's `output`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print header metadata and table of contents statistics
    Inspect {
        /// Archive to inspect
        file: PathBuf,
        /// Print per-entry details with a payload digest
        #[arg(long)]
        entries: bool,
    },
    /// Write the raw data section of one asset to a file
    ///
    /// Only the requested payload is read from disk.
    Extract {
        /// Archive to read
        file: PathBuf,
        /// Asset name as given when packing
        name: String,
        /// Destination file (default: `<last name component>.raw`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the hash of an asset name
    Hash {
        name: String,
        #[arg(long, default_value_t = HashParams::default().prime)]
        prime: u32,
        #[arg(long, default_value_t = HashParams::default().start_chars)]
        start_chars: u32,
        #[arg(long, default_value_t = HashParams::default().end_chars)]
        end_chars: u32,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn describe(asset: &Asset) -> String {
    match asset {
        Asset::Texture(t) => format!(
            "{}x{}, {} channel(s)",
            t.metadata.width, t.metadata.height, t.metadata.bit_depth
        ),
        Asset::Model(m) => format!(
            "{} vertices, {} indices",
            m.vertices.len(),
            m.indices.len()
        ),
        Asset::VoxelModel(v) => format!(
            "{}x{}x{} grid, {} voxels",
            v.width,
            v.height,
            v.depth,
            v.voxels.len()
        ),
    }
}

fn default_extract_path(name: &str) -> PathBuf {
    let stem = name
        .rsplit(['/', '\\'])
        .find(|part| !part.is_empty())
        .unwrap_or("asset");
    PathBuf::from(format!("{stem}.raw"))
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_pack(manifest_path: &Path, output: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let manifest = Manifest::load(manifest_path)?;
    manifest.validate()?;

    let params = manifest.hash_params()?;
    info!(
        manifest = %manifest_path.display(),
        assets = manifest.assets.len(),
        prime = params.prime,
        start_chars = params.start_chars,
        end_chars = params.end_chars,
        explicit = manifest.hash.is_some(),
        "resolved hash parameters"
    );
    let output = output.unwrap_or_else(|| manifest.output.clone());
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }

    let t0 = Instant::now();
    let header = pack_archive(&output, &manifest.asset_list(), params, default_decoders())
        .with_context(|| format!("packing {}", output.display()))?;
    let elapsed = t0.elapsed();
    let size = fs::metadata(&output)?.len();

    eprintln!("  output      : {}", output.display());
    eprintln!("  assets      : {}", header.asset_count);
    eprintln!(
        "  hash        : prime={} start_chars={} end_chars={}",
        params.prime, params.start_chars, params.end_chars
    );
    eprintln!("  size        : {}", human_bytes(size));
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(output)
}

fn run_inspect(file: &Path, show_entries: bool) -> anyhow::Result<()> {
    let reader =
        Reader::open(file).with_context(|| format!("opening archive {}", file.display()))?;
    let header = reader.header();
    let file_size = fs::metadata(file)?.len();
    let entries = reader.entries();
    let payload_bytes: u64 = entries.iter().map(|e| e.size).sum();

    println!("=== Lapwing archive: {} ===", file.display());
    println!();
    println!("  hash prime     : {}", header.params.prime);
    println!("  start chars    : {}", header.params.start_chars);
    println!("  end chars      : {}", header.params.end_chars);
    println!("  assets         : {}", reader.len());
    println!("  payload bytes  : {}", human_bytes(payload_bytes));
    println!("  file on disk   : {}", human_bytes(file_size));

    if show_entries {
        println!();
        println!(
            "  {:>18}  {:<11}  {:>12}  {:>12}  {:>16}",
            "hash", "type", "offset", "size", "xxh3"
        );
        println!("  {}", "-".repeat(77));
        for e in &entries {
            let payload = reader
                .read_payload(e)
                .with_context(|| format!("reading payload at offset {}", e.offset))?;
            println!(
                "  {:#018x}  {:<11}  {:>12}  {:>12}  {:016x}",
                e.hash,
                e.kind.name(),
                e.offset,
                human_bytes(e.size),
                xxh3_64(&payload)
            );
        }
    }

    Ok(())
}

fn run_extract(file: &Path, name: &str, output: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let reader =
        Reader::open(file).with_context(|| format!("opening archive {}", file.display()))?;
    let entry = *reader.entry(name)?;

    let asset = reader.get(name, entry.kind)?;
    let payload = reader
        .read_payload(&entry)
        .with_context(|| format!("reading asset {name:?}"))?;
    let data = payload
        .get(metadata_size(entry.kind)..)
        .context("payload is shorter than its metadata")?;

    let output = output.unwrap_or_else(|| default_extract_path(name));
    fs::write(&output, data).with_context(|| format!("writing {}", output.display()))?;
    info!(asset = name, kind = %entry.kind, output = %output.display(), "extracted asset");

    eprintln!("  asset       : {name} ({})", entry.kind);
    eprintln!("  contents    : {}", describe(&asset));
    eprintln!("  data        : {}", human_bytes(data.len() as u64));
    eprintln!("  written to  : {}", output.display());
    Ok(output)
}

fn run_hash(name: &str, params: HashParams) -> anyhow::Result<()> {
    let hash = params.hash(name)?;
    println!("{hash:#018x}  {hash}");
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Pack { manifest, output } => run_pack(&manifest, output).map(drop),
        Commands::Inspect { file, entries } => run_inspect(&file, entries),
        Commands::Extract { file, name, output } => {
            run_extract(&file, &name, output).map(drop)
        }
        Commands::Hash {
            name,
            prime,
            start_chars,
            end_chars,
        } => run_hash(&name, HashParams::new(prime, start_chars, end_chars)),
    }
}
