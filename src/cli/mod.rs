// CLI module for stashkit
// Author: kelexine (https://github.com/kelexine)

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CacheConfig;

/// stashkit - inspect and maintain a TTL key-value cache
#[derive(Parser, Debug)]
#[command(name = "stashkit", version, about, long_about = None)]
pub struct Args {
    /// Config file (default: ~/.stashkit/config.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Driver override: array, memory, file, session or redis
    #[arg(long, global = true, env = "STASHKIT_DRIVER")]
    pub driver: Option<String>,

    /// Key prefix override
    #[arg(long, global = true)]
    pub prefix: Option<String>,

    /// Cache root override for the file driver
    #[arg(long, global = true)]
    pub path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a value as JSON (exit code 1 on miss)
    Get { key: String },
    /// Store a JSON value
    Set {
        key: String,
        /// JSON payload; plain text is stored as a string
        value: String,
        /// Seconds to live
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Exit code 0 if the key is present
    Has { key: String },
    /// Delete a key
    Delete { key: String },
    /// Remove every key under the prefix
    Clear,
    /// Increment a counter
    Incr {
        key: String,
        #[arg(default_value_t = 1, allow_negative_numbers = true)]
        by: i64,
    },
    /// Decrement a counter
    Decr {
        key: String,
        #[arg(default_value_t = 1, allow_negative_numbers = true)]
        by: i64,
    },
    /// Delete expired entries
    CleanExpired,
    /// Print the effective configuration as TOML
    Config,
    /// Print Prometheus metrics collected during this run
    Metrics,
}

impl Command {
    /// Whether the command talks to a cache driver. `Config` only reports
    /// settings and must work even when the driver cannot be built.
    pub fn needs_driver(&self) -> bool {
        !matches!(self, Command::Config)
    }
}

impl Args {
    /// Apply flag overrides on top of a loaded cache config.
    pub fn apply(&self, config: &mut CacheConfig) {
        if let Some(driver) = &self.driver {
            config.driver = driver.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.prefix = prefix.clone();
        }
        if let Some(path) = &self.path {
            config.path = path.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply() {
        let args = Args::parse_from([
            "stashkit", "--driver", "array", "--prefix", "app:", "incr", "hits", "-3",
        ]);
        let mut config = CacheConfig::default();
        args.apply(&mut config);

        assert_eq!(config.driver, "array");
        assert_eq!(config.prefix, "app:");
        assert!(matches!(args.command, Command::Incr { ref key, by: -3 } if key == "hits"));
    }

    #[test]
    fn test_config_runs_without_driver() {
        let args = Args::parse_from(["stashkit", "--driver", "nope", "config"]);
        assert!(!args.command.needs_driver());

        let args = Args::parse_from(["stashkit", "get", "k"]);
        assert!(args.command.needs_driver());
    }

    #[test]
    fn test_set_with_ttl() {
        let args = Args::parse_from(["stashkit", "set", "user:1", "{\"name\":\"Alice\"}", "--ttl", "600"]);
        match args.command {
            Command::Set { key, ttl, .. } => {
                assert_eq!(key, "user:1");
                assert_eq!(ttl, Some(600));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
