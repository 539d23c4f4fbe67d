//! Configuration loader
//!
//! Loads aspect configuration from YAML.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use super::types::AspectConfig;

/// Environment variable overriding the configuration file path
pub const CONFIG_ENV: &str = "ASPECT_CONFIG";

/// Default path, relative to the working directory or the crate root
pub const DEFAULT_CONFIG_PATH: &str = "config/aspects.yaml";

pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create loader from ASPECT_CONFIG env var or the default path
    ///
    /// Path resolution order:
    /// 1. ASPECT_CONFIG environment variable (explicit override)
    /// 2. Relative `config/aspects.yaml` (running from the workspace root)
    /// 3. Runtime CARGO_MANIFEST_DIR/config/aspects.yaml (`cargo run`)
    /// 4. Compile-time crate root/config/aspects.yaml (test binaries)
    ///
    /// Falls back to the relative default path, so `load()` reports it.
    pub fn from_env() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::new(path);
        }

        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            return Self::new(DEFAULT_CONFIG_PATH);
        }

        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            let candidate = Path::new(&manifest_dir).join(DEFAULT_CONFIG_PATH);
            if candidate.exists() {
                return Self::new(candidate);
            }
        }

        // Compile-time crate root (test binaries run elsewhere)
        let compiled = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH);
        if compiled.exists() {
            return Self::new(compiled);
        }

        // Last resort - let load() fail with a clear error
        Self::new(DEFAULT_CONFIG_PATH)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the configuration file
    pub fn load(&self) -> Result<AspectConfig> {
        info!("Loading aspect configuration from {}", self.path.display());

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        let config = Self::parse_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;

        info!(
            "Loaded {} named pointcuts and {} aspects ({} advice)",
            config.pointcuts.len(),
            config.aspects.len(),
            config.advice_count()
        );

        Ok(config)
    }

    /// Parse configuration from a YAML string
    pub fn parse_str(content: &str) -> Result<AspectConfig> {
        let config: AspectConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }
}
