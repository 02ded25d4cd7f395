// stashkit - Pluggable TTL key-value cache
// Author: kelexine (https://github.com/kelexine)

use anyhow::{Context, Result};
use clap::Parser;
use stashkit::cli::{Args, Command};
use stashkit::config::AppConfig;
use stashkit::utils::logging;
use stashkit::{metrics, CacheManager, CacheValue};
use std::process::ExitCode;
use tracing::info;

fn main() -> Result<ExitCode> {
    // Parse CLI arguments
    let args = Args::parse();

    // Phase 1: Load configuration
    let mut config = match &args.config {
        Some(path) => AppConfig::load_file(path)?,
        None => AppConfig::load()?,
    };
    args.apply(&mut config.cache);

    // Phase 2: Initialize logging
    logging::init(&config.logging)?;
    info!("Starting stashkit v{}", env!("CARGO_PKG_VERSION"));

    if !args.command.needs_driver() {
        print!("{}", config.to_toml()?);
        return Ok(ExitCode::SUCCESS);
    }

    // Phase 3: Resolve the driver up front so construction errors surface here
    let manager = CacheManager::new(config.cache.clone());
    let driver = manager
        .driver(None)
        .with_context(|| format!("Failed to initialize '{}' cache driver", config.cache.driver))?;
    info!("Using {} driver", driver.name());

    // Phase 4: Run the command
    let ok = match args.command {
        Command::Get { key } => match driver.get(&key) {
            Some(value) => {
                println!("{}", serde_json::to_string_pretty(&value.to_json())?);
                true
            }
            None => false,
        },
        Command::Set { key, value, ttl } => driver.set(&key, parse_value(&value), ttl),
        Command::Has { key } => driver.has(&key),
        Command::Delete { key } => driver.delete(&key),
        Command::Clear => driver.clear(),
        Command::Incr { key, by } => {
            println!("{}", driver.increment(&key, by));
            true
        }
        Command::Decr { key, by } => {
            println!("{}", driver.decrement(&key, by));
            true
        }
        Command::CleanExpired => {
            println!("{}", driver.clean_expired());
            true
        }
        Command::Metrics => {
            print!("{}", metrics::gather_metrics());
            true
        }
        Command::Config => unreachable!("handled before the driver is built"),
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// JSON if it parses, otherwise the raw text as a string.
fn parse_value(raw: &str) -> CacheValue {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(CacheValue::from)
        .unwrap_or_else(|_| CacheValue::from(raw))
}
