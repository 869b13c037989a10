use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use hopperstore_anvil::CompressionScheme;
use hopperstore_benchmark::BenchmarkMetrics;
use hopperstore_storage::config::{DEFAULT_COMPRESSION_LEVEL, DEFAULT_MAX_OPEN_REGIONS};
use hopperstore_storage::{ChunkStore, StoreConfig};

#[derive(Parser)]
#[command(name = "hopperstore", about = "Inspect and edit Anvil region directories")]
pub struct Args {
    /// Directory holding r.X.Z.mca files
    #[arg(short, long, env = "HOPPERSTORE_DIR", default_value = "region")]
    pub dir: PathBuf,

    /// Maximum number of region files kept open
    #[arg(long, env = "HOPPERSTORE_CACHE_SIZE", default_value_t = DEFAULT_MAX_OPEN_REGIONS)]
    pub cache_size: usize,

    /// Compression level for new records (0-9)
    #[arg(long, env = "HOPPERSTORE_COMPRESSION_LEVEL", default_value_t = DEFAULT_COMPRESSION_LEVEL)]
    pub compression_level: u32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show sector usage of one region file
    Info {
        #[arg(allow_negative_numbers = true)]
        region_x: i32,
        #[arg(allow_negative_numbers = true)]
        region_z: i32,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Write a chunk's raw payload to stdout or a file
    Get {
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        z: i32,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Store a raw payload from a file ("-" for stdin)
    Put {
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        z: i32,
        input: PathBuf,
        /// Compress with gzip instead of zlib
        #[arg(long)]
        gzip: bool,
    },
    /// Remove a chunk
    Delete {
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        z: i32,
    },
    /// Save and reload synthetic chunks, then print a report
    Bench {
        #[arg(short, long, default_value_t = 1024)]
        count: i32,
        /// Uncompressed payload size in bytes
        #[arg(short, long, default_value_t = 16 * 1024)]
        size: usize,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = StoreConfig::new(&args.dir)
        .with_max_open_regions(args.cache_size)
        .with_compression_level(args.compression_level);

    match args.command {
        Command::Info { region_x, region_z, json } => {
            let store = ChunkStore::open(config)?;
            let stats = store
                .region_stats(region_x, region_z)
                .with_context(|| format!("Failed to open region ({region_x}, {region_z})"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                let path = store.config().region_path(hopperstore_anvil::RegionPos::new(region_x, region_z));
                println!("Region {}", path.display());
                println!("  chunks:  {}", stats.used_slots);
                println!("  sectors: {} used / {} free / {} total", stats.used_sectors, stats.free_sectors, stats.total_sectors);
                println!("  size:    {} bytes", stats.file_bytes);
            }
            store.close()?;
        }
        Command::Get { x, z, out } => {
            let store = ChunkStore::open(config)?;
            let data = store
                .load_chunk(x, z)
                .with_context(|| format!("Failed to read chunk ({x}, {z})"))?
                .with_context(|| format!("Chunk ({x}, {z}) not found"))?;
            match out {
                Some(path) => std::fs::write(&path, &data)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => std::io::stdout().write_all(&data)?,
            }
        }
        Command::Put { x, z, input, gzip } => {
            let data = if input.as_os_str() == "-" {
                let mut buf = Vec::new();
                std::io::stdin().read_to_end(&mut buf)?;
                buf
            } else {
                std::fs::read(&input).with_context(|| format!("Failed to read {}", input.display()))?
            };
            let scheme = if gzip { CompressionScheme::Gzip } else { CompressionScheme::Zlib };
            let store = ChunkStore::open(config)?;
            store
                .save_chunk_with(x, z, &data, scheme)
                .with_context(|| format!("Failed to save chunk ({x}, {z})"))?;
            log::info!("Saved {} bytes to chunk ({x}, {z})", data.len());
            store.close()?;
        }
        Command::Delete { x, z } => {
            let store = ChunkStore::open(config)?;
            if store.delete_chunk(x, z)? {
                println!("Deleted chunk ({x}, {z})");
            } else {
                println!("Chunk ({x}, {z}) not present");
            }
            store.close()?;
        }
        Command::Bench { count, size } => run_bench(config, count, size)?,
    }

    Ok(())
}

fn run_bench(config: StoreConfig, count: i32, size: usize) -> Result<()> {
    let metrics = Arc::new(BenchmarkMetrics::new(config.summary()));
    let store = ChunkStore::with_metrics(config, Arc::clone(&metrics))?;

    // Lay chunks out in a square so several regions are touched
    let side = (count as f64).sqrt().ceil().max(1.0) as i32;
    let coords: Vec<(i32, i32)> = (0..count).map(|i| (i % side, i / side)).collect();

    println!("Saving {count} chunks of {size} bytes...");
    for &(x, z) in &coords {
        store.save_chunk(x, z, &synthetic_chunk(x, z, size))?;
    }

    println!("Loading {count} chunks...");
    for &(x, z) in &coords {
        let data = store.load_chunk(x, z)?.with_context(|| format!("Chunk ({x}, {z}) vanished"))?;
        anyhow::ensure!(data == synthetic_chunk(x, z, size), "Chunk ({x}, {z}) read back differently");
    }

    store.close()?;
    print!("{}", metrics.generate_report());
    Ok(())
}

/// Semi-compressible payload: repeated palette text with the coordinates mixed in.
fn synthetic_chunk(x: i32, z: i32, size: usize) -> Vec<u8> {
    let text = format!("{{xPos:{x},zPos:{z},palette:[minecraft:stone,minecraft:dirt,minecraft:grass_block]}}");
    text.bytes().cycle().take(size).collect()
}
