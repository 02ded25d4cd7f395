// Configuration module
// Author: kelexine (https://github.com/kelexine)

mod models;

pub use models::*;

use crate::error::{CacheError, Result};
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest)
    /// 2. Config file
    /// 3. Defaults (lowest)
    ///
    /// CLI flags are applied on top by the binary.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(&Self::default_config_path()), false)
    }

    /// Same as [`AppConfig::load`] but reads an explicit file, which must exist.
    pub fn load_file(path: &Path) -> Result<Self> {
        Self::load_from(path, true)
    }

    fn load_from(path: &Path, required: bool) -> Result<Self> {
        let config = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&Self::default())?)
            // Load from config file if it exists
            .add_source(File::from(path).required(required))
            // Override with environment variables (e.g. STASHKIT_CACHE__DRIVER=redis)
            .add_source(
                Environment::with_prefix("STASHKIT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| CacheError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| CacheError::Config(e.to_string()))
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CacheError::Config(e.to_string()))
    }

    fn default_config_path() -> String {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".stashkit")
            .join("config.toml")
            .to_string_lossy()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_file_overrides_defaults() {
        let mut temp = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            temp,
            "[cache]\ndriver = \"array\"\nprefix = \"app:\"\nttl = 600\n\n[logging]\nlevel = \"debug\"\n"
        )
        .unwrap();

        let config = AppConfig::load_file(temp.path()).unwrap();

        assert_eq!(config.cache.driver, "array");
        assert_eq!(config.cache.prefix, "app:");
        assert_eq!(config.cache.ttl, Some(600));
        assert_eq!(config.cache.port, 6379);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_required_file_fails() {
        let result = AppConfig::load_file(Path::new("/nonexistent/stashkit.toml"));
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[test]
    fn test_to_toml_contains_sections() {
        let rendered = AppConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[cache]"));
        assert!(rendered.contains("[logging]"));
    }
}
