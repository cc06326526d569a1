//! CornKV CLI
//!
//! Command-line interface operating directly on a store directory.

use std::process;

use clap::{Parser, Subcommand};
use cornkv::pool::BufferPool;
use cornkv::recovery::Recovery;
use cornkv::segment::{self, Segment};
use cornkv::{Config, CornError, Engine, SyncStrategy};
use tracing_subscriber::{fmt, EnvFilter};

/// CornKV CLI
#[derive(Parser, Debug)]
#[command(name = "cornkv")]
#[command(about = "CLI for the CornKV key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./cornkv_data")]
    data_dir: String,

    /// Segment size limit in MB before rotation
    #[arg(short = 's', long, default_value = "64")]
    segment_mb: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,

        /// Seconds until the key expires (0 = never)
        #[arg(long, default_value = "0")]
        ttl: u32,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List all keys
    List,

    /// Compact sealed segments
    Merge,

    /// Show segment and key counts
    Stats,

    /// Check every segment for corruption without opening the store
    Verify,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cornkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> cornkv::Result<()> {
    let command = match args.command {
        Commands::Verify => return verify(&args.data_dir),
        command => command,
    };

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .sync_strategy(SyncStrategy::EveryWrite)
        .max_segment_size(segment_bytes(args.segment_mb)?)
        .build();
    let engine = Engine::open(config)?;

    match command {
        Commands::Get { key } => match engine.get(key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Put { key, value, ttl } => {
            engine.put_with_ttl(key.as_bytes(), value.as_bytes(), ttl)?;
            println!("OK");
        }
        Commands::Del { key } => {
            engine.delete(key.as_bytes())?;
            println!("OK");
        }
        Commands::List => {
            let mut keys = engine.list();
            keys.sort();
            for key in keys {
                println!("{}", String::from_utf8_lossy(&key));
            }
        }
        Commands::Merge => {
            engine.rotate()?;
            let stats = engine.merge()?;
            println!(
                "merged {} segments: kept {}/{} records, {} -> {} bytes",
                stats.input_segments,
                stats.records_kept,
                stats.records_scanned,
                stats.bytes_before,
                stats.bytes_after
            );
        }
        Commands::Stats => {
            println!("keys:            {}", engine.len());
            println!("active segment:  {}", engine.active_segment_id());
            println!("sealed segments: {:?}", engine.sealed_segment_ids());
        }
        // Runs without opening the engine, see above
        Commands::Verify => {}
    }

    engine.close()
}

fn segment_bytes(mb: u64) -> cornkv::Result<u64> {
    mb.checked_mul(1024 * 1024)
        .ok_or_else(|| CornError::Config(format!("segment size of {} MB is too large", mb)))
}

fn verify(data_dir: &str) -> cornkv::Result<()> {
    let dir = std::path::Path::new(data_dir);
    let pool = BufferPool::new(4, 4096);

    for id in segment::discover(dir)? {
        let segment = Segment::open(segment::data_path(dir, id), id)?;
        let result = Recovery::verify(&segment, &pool)?;
        let status = if result.mid_segment_corruption {
            "CORRUPT"
        } else if result.was_truncated {
            "TORN TAIL"
        } else {
            "ok"
        };
        println!(
            "{:010}: {} records, {} tombstones, {}/{} bytes valid [{}]",
            id,
            result.records_applied,
            result.tombstones_applied,
            result.valid_len,
            segment.len(),
            status
        );
        segment.close()?;
    }
    Ok(())
}
