pub mod memory;
pub mod s3;

pub use memory::MemoryStore;
pub use s3::S3Store;

use crate::config::Config;
use crate::error::Result;

/// One listed object: key plus ciphertext size as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
}

/// Abstract S3-style key/value storage.
///
/// Implementations perform single attempts; retry policy belongs to the
/// pipeline workers so unbounded-retry semantics live in one place.
pub trait ObjectStore: Send + Sync {
    /// Write an object, overwriting any existing one.
    fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Read an object into `buf`. Returns `Ok(false)` (with `buf` cleared)
    /// when the key does not exist.
    fn get(&self, key: &str, buf: &mut Vec<u8>) -> Result<bool>;

    /// List all objects under a prefix, with sizes.
    fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;

    /// Delete an object. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<()>;
}

/// Build the S3 backend from the validated configuration. A bare endpoint
/// host gets an `https://` scheme, matching the original always-TLS client.
pub fn store_from_config(config: &Config) -> Result<S3Store> {
    config.validate_s3()?;
    let endpoint = if config.s3.endpoint.contains("://") {
        config.s3.endpoint.clone()
    } else {
        format!("https://{}", config.s3.endpoint)
    };
    S3Store::new(
        &endpoint,
        &config.s3.region,
        &config.s3.bucket,
        &config.s3.access,
        &config.s3.secret,
    )
}

/// Object key for one chunk of an archive: `{timestamp}/{index}`.
pub fn chunk_key(timestamp: &str, index: u64) -> String {
    format!("{timestamp}/{index}")
}

/// Split an object key into its archive timestamp and chunk index.
/// Returns `None` for keys that do not follow the archive layout.
pub fn parse_chunk_key(key: &str) -> Option<(&str, u64)> {
    let (timestamp, index) = key.split_once('/')?;
    let index = index.parse().ok()?;
    Some((timestamp, index))
}

/// The archive identifier embedded in a key: everything before the first
/// `/`. Returns `None` for keys without one.
pub fn archive_prefix(key: &str) -> Option<&str> {
    key.split_once('/').map(|(prefix, _)| prefix)
}
