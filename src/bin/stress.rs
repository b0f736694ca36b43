//! objpool Stress Binary
//!
//! Hammers a pool with a weighted write/read/delete mix from many threads,
//! standing in for the request pipeline of a real load test.

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use objpool::{ObjectIdentifier, ObjectPool, PoolConfig, PoolError, RecordMode};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::{fmt, EnvFilter};

/// objpool stress test
#[derive(Parser, Debug)]
#[command(name = "objpool-stress")]
#[command(about = "Concurrent write/read/delete workload against an object pool")]
#[command(version)]
struct Args {
    /// Pool directory
    #[arg(short, long, default_value = "./objpool_data")]
    dir: PathBuf,

    /// Segment filename prefix
    #[arg(short, long, default_value = "objects")]
    prefix: String,

    /// Maximum records per segment file
    #[arg(short, long, default_value = "100000")]
    max_per_file: usize,

    /// Worker threads
    #[arg(short, long, default_value = "8")]
    workers: usize,

    /// Run time in seconds
    #[arg(short = 't', long, default_value = "10")]
    seconds: u64,

    /// Seconds between background flushes
    #[arg(long, default_value = "2")]
    persist_secs: u64,

    /// Relative weight of writes
    #[arg(long, default_value = "50")]
    write_weight: u8,

    /// Relative weight of reads
    #[arg(long, default_value = "30")]
    read_weight: u8,

    /// Relative weight of deletes
    #[arg(long, default_value = "20")]
    delete_weight: u8,

    /// Track a declared size per object
    #[arg(long)]
    sized: bool,
}

/// Operation counts shared by all workers
#[derive(Default)]
struct Totals {
    writes: AtomicU64,
    reads: AtomicU64,
    deletes: AtomicU64,
    empty: AtomicU64,
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

    tracing::info!("objpool stress v{}", objpool::VERSION);
    tracing::info!("Pool directory: {}", args.dir.display());
    tracing::info!("Workers: {}, duration: {}s", args.workers, args.seconds);

    if let Err(e) = run(&args) {
        tracing::error!("Stress run failed: {}", e);
        process::exit(1);
    }
}

fn run(args: &Args) -> objpool::Result<()> {
    let mode = if args.sized {
        RecordMode::Sized
    } else {
        RecordMode::IdOnly
    };

    let config = PoolConfig::builder()
        .pool_dir(&args.dir)
        .file_prefix(&args.prefix)
        .max_per_file(args.max_per_file)
        .record_mode(mode)
        .persist_interval(Duration::from_secs(args.persist_secs.max(1)))
        .build();

    let weights = [args.write_weight, args.read_weight, args.delete_weight];
    let actions = WeightedIndex::new(weights)
        .map_err(|e| PoolError::Config(format!("Invalid action weights: {}", e)))?;

    let pool = Arc::new(ObjectPool::open(config)?);
    tracing::info!(saved = pool.saved_count()?, "Pool ready");

    let stop = Arc::new(AtomicBool::new(false));
    let totals = Arc::new(Totals::default());
    let started = Instant::now();

    let mut handles = Vec::with_capacity(args.workers);
    for worker in 0..args.workers {
        let pool = Arc::clone(&pool);
        let stop = Arc::clone(&stop);
        let totals = Arc::clone(&totals);
        let actions = actions.clone();

        let handle = thread::Builder::new()
            .name(format!("stress-{}", worker))
            .spawn(move || work(&pool, &actions, mode, &stop, &totals))?;
        handles.push(handle);
    }

    thread::sleep(Duration::from_secs(args.seconds));
    stop.store(true, Ordering::Relaxed);

    for handle in handles {
        match handle.join() {
            Ok(Err(e)) => tracing::error!("Worker failed: {}", e),
            Err(_) => tracing::error!("Worker panicked"),
            Ok(Ok(())) => {}
        }
    }

    let elapsed = started.elapsed();
    pool.shutdown()?;

    let ops = totals.writes.load(Ordering::Relaxed)
        + totals.reads.load(Ordering::Relaxed)
        + totals.deletes.load(Ordering::Relaxed);

    tracing::info!(
        writes = totals.writes.load(Ordering::Relaxed),
        reads = totals.reads.load(Ordering::Relaxed),
        deletes = totals.deletes.load(Ordering::Relaxed),
        empty = totals.empty.load(Ordering::Relaxed),
        ops_per_sec = (ops as f64 / elapsed.as_secs_f64()) as u64,
        saved = pool.saved_count()?,
        "Stress run complete"
    );
    Ok(())
}

fn work(
    pool: &ObjectPool,
    actions: &WeightedIndex<u8>,
    mode: RecordMode,
    stop: &AtomicBool,
    totals: &Totals,
) -> objpool::Result<()> {
    let mut rng = StdRng::from_entropy();

    while !stop.load(Ordering::Relaxed) {
        let outcome = match actions.sample(&mut rng) {
            0 => {
                let id = match mode {
                    RecordMode::Sized => {
                        ObjectIdentifier::random().with_size(rng.gen_range(1..=1 << 20))
                    }
                    RecordMode::IdOnly => ObjectIdentifier::random(),
                };
                pool.write_complete(id).map(|()| &totals.writes)
            }
            1 => pool.acquire_for_read().and_then(|id| {
                // The remote GET would happen here
                pool.release_from_read(&id)?;
                Ok(&totals.reads)
            }),
            _ => pool.get_for_delete().map(|_| &totals.deletes),
        };

        match outcome {
            Ok(counter) => {
                counter.fetch_add(1, Ordering::Relaxed);
            }
            Err(PoolError::EmptyPool) => {
                totals.empty.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(())
}
