use serde::{Deserialize, Serialize};

/// The YAML configuration document.
///
/// The whole document is `Serialize` because key bootstrap rewrites the
/// file in place after generating a keypair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub s3: S3Config,
    pub age: AgeConfig,
    pub memory: MemoryConfig,
    pub ram: RamConfig,
    #[serde(rename = "includeDirs")]
    pub include_dirs: Vec<String>,
    #[serde(rename = "excludePatterns")]
    pub exclude_patterns: Vec<String>,
    pub dryrun: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub access: String,
    pub secret: String,
    pub region: String,
    pub endpoint: String,
    pub bucket: String,
    /// Upload/download worker count. Defaults to the CPU count.
    pub parallel: Option<usize>,
}

/// Recipient keypair. Both fields empty means "generate on first run".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgeConfig {
    pub private: String,
    pub public: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Human-readable chunk size, e.g. "64MB".
    #[serde(rename = "chunkSize")]
    pub chunk_size: Option<String>,
    /// Depth of the bounded chunk queues between pipeline stages.
    #[serde(rename = "chunkCount")]
    pub chunk_count: Option<usize>,
    /// Memory-budget hint for uploads; not independently enforced.
    pub upload: Option<String>,
}

/// Older spelling of the memory section, kept for existing config files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RamConfig {
    #[serde(rename = "chunkSize")]
    pub chunk_size: Option<String>,
    /// Memory-budget hint; not independently enforced.
    pub max: Option<String>,
}
