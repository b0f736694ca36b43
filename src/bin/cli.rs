//! objpool CLI
//!
//! Inspect and maintain a pool directory without running a load test.

use std::path::PathBuf;
use std::process;

use clap::{Args as ClapArgs, Parser, Subcommand};
use objpool::{ObjectIdentifier, ObjectPool, PoolConfig, RecordMode, SegmentStore};
use tracing_subscriber::{fmt, EnvFilter};

/// objpool CLI
#[derive(Parser, Debug)]
#[command(name = "objpool-cli")]
#[command(about = "Inspect and maintain object pool segment files")]
#[command(version)]
struct Args {
    #[command(flatten)]
    pool: PoolArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ClapArgs, Debug)]
struct PoolArgs {
    /// Pool directory
    #[arg(short, long, default_value = "./objpool_data")]
    dir: PathBuf,

    /// Segment filename prefix
    #[arg(short, long, default_value = "objects")]
    prefix: String,

    /// Maximum records per segment file
    #[arg(short, long, default_value = "1000000")]
    max_per_file: usize,

    /// Records carry a declared object size (26-byte records)
    #[arg(long)]
    sized: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Count saved records per segment file
    Count,

    /// Print every saved identifier as hex
    Dump,

    /// Add random identifiers to the pool
    Seed {
        /// How many identifiers to add
        #[arg(short, long)]
        count: usize,

        /// Declared size for each identifier (sized mode only)
        #[arg(short, long, default_value = "0")]
        size: u64,
    },

    /// Remove identifiers from the pool
    Drain {
        /// How many identifiers to remove
        #[arg(short, long)]
        count: usize,
    },
}

impl PoolArgs {
    fn config(&self) -> PoolConfig {
        PoolConfig::builder()
            .pool_dir(&self.dir)
            .file_prefix(&self.prefix)
            .max_per_file(self.max_per_file)
            .record_mode(self.record_mode())
            .build()
    }

    fn record_mode(&self) -> RecordMode {
        if self.sized {
            RecordMode::Sized
        } else {
            RecordMode::IdOnly
        }
    }
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(objpool::DEFAULT_LOG_FILTER));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(args: &Args) -> objpool::Result<()> {
    let config = args.pool.config();
    config.validate()?;

    match &args.command {
        Commands::Count => {
            let store = SegmentStore::open(&config)?;
            let mut total = 0;
            for index in store.discover()? {
                let count = store.record_count(index)?;
                println!("{}\t{}", store.path(index).display(), count);
                total += count;
            }
            println!("total\t{}", total);
        }

        Commands::Dump => {
            let store = SegmentStore::open(&config)?;
            for index in store.discover()? {
                for id in store.load(index)? {
                    match id.size() {
                        Some(size) => println!("{}\t{}", id, size),
                        None => println!("{}", id),
                    }
                }
            }
        }

        Commands::Seed { count, size } => {
            let pool = ObjectPool::open(config)?;
            for _ in 0..*count {
                let id = match pool.config().record_mode {
                    RecordMode::Sized => ObjectIdentifier::random().with_size(*size),
                    RecordMode::IdOnly => ObjectIdentifier::random(),
                };
                pool.write_complete(id)?;
            }
            pool.shutdown()?;
            println!("seeded {}, saved {}", count, pool.saved_count()?);
        }

        Commands::Drain { count } => {
            let pool = ObjectPool::open(config)?;
            let mut drained = 0;
            while drained < *count {
                match pool.get_for_delete() {
                    Ok(_) => drained += 1,
                    Err(objpool::PoolError::EmptyPool) => break,
                    Err(e) => return Err(e),
                }
            }
            pool.shutdown()?;
            println!("drained {}, saved {}", drained, pool.saved_count()?);
        }
    }

    Ok(())
}
