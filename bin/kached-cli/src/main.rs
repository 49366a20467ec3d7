//! kached CLI - command line access to a local kached store
//!
//! Each invocation opens the store, runs one command and closes it again,
//! so the cache tier only lives for the duration of the command. `bench`
//! runs a whole workload inside one invocation to show the cache at work.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kached::{Config, Kached, ResultCode, Value};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "kached")]
#[command(about = "Cache-fronted durable key-value store")]
#[command(version)]
struct Args {
    /// Configuration file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory; overrides the store path from the config file
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a value through both tiers
    Set {
        key: String,
        /// Value: null, true/false, a number, or any other text
        #[arg(allow_hyphen_values = true)]
        value: Value,
        /// Cache cost (defaults to the configured default cost)
        #[arg(long)]
        cost: Option<i64>,
    },
    /// Read a value through the cache
    Get { key: String },
    /// Remove a key from both tiers
    Delete { key: String },
    /// Write to the durable tier only
    DbSet {
        key: String,
        #[arg(allow_hyphen_values = true)]
        value: Value,
    },
    /// Read from the durable tier only
    DbGet { key: String },
    /// Run a random read/write workload and report cache statistics
    Bench {
        /// Number of operations
        #[arg(long, default_value = "10000")]
        ops: usize,
        /// Number of distinct keys
        #[arg(long, default_value = "1000")]
        keys: u64,
        /// Percentage of operations that are writes
        #[arg(long, default_value = "20")]
        write_pct: u32,
        #[arg(long, default_value = "1")]
        seed: u64,
    },
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            Config::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(dir) = &args.data_dir {
        config.store = kached::StoreConfig::new(dir);
    }
    Ok(config)
}

fn bench(
    kached: &Kached<String, Value>,
    ops: usize,
    keys: u64,
    write_pct: u32,
    seed: u64,
) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut missing = 0usize;
    let mut degraded = 0usize;

    let start = Instant::now();
    for _ in 0..ops {
        let key = format!("bench-{}", rng.gen_range(0..keys.max(1)));
        if rng.gen_range(0..100) < write_pct {
            let value = Value::from(rng.r#gen::<u64>());
            match kached.set(key, value) {
                Ok(()) => {}
                Err(e) if e.matches(ResultCode::CacheWriteFailed) => degraded += 1,
                Err(e) => return Err(e.into()),
            }
        } else {
            match kached.get(&key) {
                Ok(_) => {}
                Err(e) if e.matches(ResultCode::NotFoundInEither) => missing += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
    let elapsed = start.elapsed();
    kached.wait();

    let stats = kached.cache_stats();
    println!("Operations:   {ops} in {elapsed:?}");
    println!("Missing keys: {missing}");
    println!("Uncached:     {degraded}");
    println!("Cache hits:   {} ({:.1}%)", stats.hits, stats.hit_ratio * 100.0);
    println!("Cache misses: {}", stats.misses);
    println!("Admissions:   {}", stats.admissions);
    println!("Rejections:   {}", stats.rejections);
    println!("Evictions:    {}", stats.evictions);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(&args)?;
    info!("Using store at {:?}", config.store.path);
    let kached: Kached<String, Value> = Kached::open(config)?;

    let result = match args.command {
        Commands::Set { key, value, cost } => {
            let cost = cost.unwrap_or_else(|| kached.default_cost());
            match kached.set_with_cost(key, value, cost) {
                Err(e) if e.matches(ResultCode::CacheWriteFailed) => {
                    // Stored durably; only the cache refused it
                    eprintln!("warning: {e}");
                    Ok(())
                }
                other => other.map_err(Into::into),
            }
        }
        Commands::Get { key } => kached.get(&key).map(|v| println!("{v}")).map_err(Into::into),
        Commands::Delete { key } => kached.delete(&key).map_err(Into::into),
        Commands::DbSet { key, value } => kached.db_set(key, value).map_err(Into::into),
        Commands::DbGet { key } => kached
            .db_get(&key)
            .map(|v| println!("{v}"))
            .map_err(Into::into),
        Commands::Bench {
            ops,
            keys,
            write_pct,
            seed,
        } => bench(&kached, ops, keys, write_pct, seed),
    };

    kached.close()?;
    result
}
