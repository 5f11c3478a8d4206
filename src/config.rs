use anyhow::Context;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub version: u32,
    pub storage: StorageConfig,
    pub database: Database,
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        toml::from_str(&contents).with_context(|| "Failed to parse config TOML")
    }
}

/// Where objects live. Each bucket is a directory under `root`.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub raw_bucket: Option<String>,
    pub transformed_bucket: Option<String>,
}

impl StorageConfig {
    pub fn raw_bucket(&self) -> Option<&str> {
        self.raw_bucket.as_deref()
    }

    /// Transformed objects go next to the raw ones unless a separate bucket is set.
    pub fn transformed_bucket(&self) -> Option<&str> {
        self.transformed_bucket.as_deref().or(self.raw_bucket())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Database {
    pub in_memory: bool,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoadConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    1000
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TransformConfig {
    /// log a progress line every this many rows, 0 disables it
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

fn default_progress_every() -> usize {
    50_000
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            progress_every: default_progress_every(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}
