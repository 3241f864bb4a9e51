use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub download: DownloadConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DownloadConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    #[serde(default = "default_temp_prefix")]
    pub temp_prefix: String,
    #[serde(default = "default_enforce_allowed")]
    pub enforce_allowed_extensions: bool,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size(),
            chunk_size_bytes: default_chunk_size(),
            timeout_secs: default_timeout_secs(),
            temp_dir: default_temp_dir(),
            temp_prefix: default_temp_prefix(),
            enforce_allowed_extensions: default_enforce_allowed(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

fn default_max_file_size() -> u64 {
    20 * 1024 * 1024
}
fn default_chunk_size() -> usize {
    1024 * 1024
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_temp_dir() -> PathBuf {
    std::env::temp_dir()
}
fn default_temp_prefix() -> String {
    "fetch2md-".to_string()
}
fn default_enforce_allowed() -> bool {
    true
}
fn default_allowed_extensions() -> Vec<String> {
    crate::extract::SUPPORTED_EXTENSIONS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl DownloadConfig {
    /// Whether `extension` (lower-case, no dot) passes the allow-list gate.
    pub fn is_extension_allowed(&self, extension: &str) -> bool {
        !self.enforce_allowed_extensions || self.allowed_extensions.iter().any(|e| e == extension)
    }
}

/// Environment variables that override file settings, read once at startup.
pub const ENV_BIND: &str = "FETCH2MD_BIND";
pub const ENV_MAX_FILE_SIZE: &str = "FETCH2MD_MAX_FILE_SIZE_BYTES";
pub const ENV_CHUNK_SIZE: &str = "FETCH2MD_CHUNK_SIZE_BYTES";
pub const ENV_TIMEOUT_SECS: &str = "FETCH2MD_TIMEOUT_SECS";
pub const ENV_TEMP_DIR: &str = "FETCH2MD_TEMP_DIR";

/// Loads the configuration file (if any), applies process environment
/// overrides and validates the result.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => parse_config_file(path)?,
        None => Config::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

fn parse_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&content).with_context(|| "Failed to parse config file")
}

/// Applies overrides from `lookup` (the process environment in production).
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(bind) = lookup(ENV_BIND) {
        config.server.bind = bind;
    }
    if let Some(v) = lookup(ENV_MAX_FILE_SIZE) {
        config.download.max_file_size_bytes = parse_env(ENV_MAX_FILE_SIZE, &v)?;
    }
    if let Some(v) = lookup(ENV_CHUNK_SIZE) {
        config.download.chunk_size_bytes = parse_env(ENV_CHUNK_SIZE, &v)?;
    }
    if let Some(v) = lookup(ENV_TIMEOUT_SECS) {
        config.download.timeout_secs = parse_env(ENV_TIMEOUT_SECS, &v)?;
    }
    if let Some(dir) = lookup(ENV_TEMP_DIR) {
        config.download.temp_dir = PathBuf::from(dir);
    }
    Ok(())
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("{} must be a positive integer, got '{}'", key, value))
}

pub fn validate(config: &Config) -> Result<()> {
    let dl = &config.download;

    if dl.max_file_size_bytes == 0 {
        bail!("download.max_file_size_bytes must be > 0");
    }
    if dl.chunk_size_bytes == 0 {
        bail!("download.chunk_size_bytes must be > 0");
    }
    if dl.chunk_size_bytes as u64 > dl.max_file_size_bytes {
        bail!("download.chunk_size_bytes must not exceed download.max_file_size_bytes");
    }
    if dl.timeout_secs == 0 {
        bail!("download.timeout_secs must be > 0");
    }
    if dl.temp_prefix.is_empty() || dl.temp_prefix.contains(['/', '\\']) {
        bail!("download.temp_prefix must be non-empty and must not contain path separators");
    }
    for ext in &dl.allowed_extensions {
        if ext.is_empty() || ext.contains('.') || ext.chars().any(|c| c.is_ascii_uppercase()) {
            bail!(
                "download.allowed_extensions entry '{}' must be lower-case without a leading dot",
                ext
            );
        }
    }
    if config.server.bind.trim().is_empty() {
        bail!("server.bind must not be empty");
    }

    Ok(())
}
