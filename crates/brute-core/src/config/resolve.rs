use std::path::{Path, PathBuf};

use tracing::info;

use super::defaults::{parse_human_size, DEFAULT_CHUNK_QUEUE, DEFAULT_CHUNK_SIZE};
use super::types::Config;
use crate::error::{BruteError, Result};
use crate::transform;

const CONFIG_FILE_NAME: &str = "backup.yaml";

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn home_dir() -> Option<PathBuf> {
    env_path("HOME")
}

fn user_config_dir() -> Option<PathBuf> {
    env_path("XDG_CONFIG_HOME").or_else(|| home_dir().map(|h| h.join(".config")))
}

/// Config file lookup order, first existing wins:
/// `./backup.yaml`, `/etc/backup.yaml`, `$HOME/backup.yaml`, then the
/// user config dir.
pub fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from(CONFIG_FILE_NAME),
        PathBuf::from("/etc").join(CONFIG_FILE_NAME),
    ];
    if let Some(home) = home_dir() {
        paths.push(home.join(CONFIG_FILE_NAME));
    }
    if let Some(config_dir) = user_config_dir() {
        paths.push(config_dir.join(CONFIG_FILE_NAME));
    }
    paths
}

/// Resolve the config file path: an explicit `--config` wins, otherwise
/// the first existing file from the default search order.
pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }
    default_search_paths().into_iter().find(|p| p.is_file())
}

pub fn load(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| BruteError::Config(format!("cannot read {}: {e}", path.display())))?;
    serde_yaml::from_str(&raw)
        .map_err(|e| BruteError::Config(format!("cannot parse {}: {e}", path.display())))
}

/// Rewrite the config file in place (truncate + write).
pub fn save(path: &Path, config: &Config) -> Result<()> {
    let raw = serde_yaml::to_string(config)
        .map_err(|e| BruteError::Config(format!("cannot serialize config: {e}")))?;
    std::fs::write(path, raw)
        .map_err(|e| BruteError::Config(format!("cannot write {}: {e}", path.display())))?;
    Ok(())
}

/// Generate and persist an X25519 keypair when the config has none.
///
/// The rewritten file is the user's only copy of the identity; they are
/// responsible for backing it up off-site. Returns whether a pair was
/// generated.
pub fn ensure_keypair(config: &mut Config, path: &Path) -> Result<bool> {
    if !config.age.private.trim().is_empty() && !config.age.public.trim().is_empty() {
        return Ok(false);
    }

    let (private, public) = transform::generate_keypair();
    config.age.private = private;
    config.age.public = public;
    save(path, config)?;
    info!(path = %path.display(), "generated new age keypair and updated config");
    Ok(true)
}

/// Runtime knobs resolved from the raw document.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Pre-transform chunk size in bytes.
    pub chunk_size: usize,
    /// Bounded queue depth between pipeline stages.
    pub chunk_queue: usize,
    /// Compress/encrypt (and decrypt/decompress) worker count.
    pub workers: usize,
    /// Upload/download worker count.
    pub parallel: usize,
    pub dryrun: bool,
}

impl Config {
    /// Resolve pipeline settings. `memory.chunkSize` wins over the older
    /// `ram.chunkSize` spelling; the remaining memory knobs are hints that
    /// size the bounded queues.
    pub fn settings(&self) -> Result<Settings> {
        let chunk_size = match self
            .memory
            .chunk_size
            .as_deref()
            .or(self.ram.chunk_size.as_deref())
        {
            Some(raw) => parse_human_size(raw)?,
            None => DEFAULT_CHUNK_SIZE,
        };
        if chunk_size == 0 {
            return Err(BruteError::Config("chunkSize must be greater than zero".into()));
        }
        let chunk_size = usize::try_from(chunk_size)
            .map_err(|_| BruteError::Config("chunkSize exceeds addressable memory".into()))?;

        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Ok(Settings {
            chunk_size,
            chunk_queue: self.memory.chunk_count.unwrap_or(DEFAULT_CHUNK_QUEUE).max(1),
            workers,
            parallel: self.s3.parallel.unwrap_or(workers).max(1),
            dryrun: self.dryrun,
        })
    }

    /// Validate that every S3 key a network operation needs is present.
    pub fn validate_s3(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("s3.access", &self.s3.access),
            ("s3.secret", &self.s3.secret),
            ("s3.region", &self.s3.region),
            ("s3.endpoint", &self.s3.endpoint),
            ("s3.bucket", &self.s3.bucket),
        ]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(key, _)| *key)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(BruteError::Config(format!(
                "missing required config keys: {}",
                missing.join(", ")
            )))
        }
    }
}
