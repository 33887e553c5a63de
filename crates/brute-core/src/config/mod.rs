mod defaults;
mod resolve;
mod types;

pub use defaults::{parse_human_size, DEFAULT_CHUNK_QUEUE, DEFAULT_CHUNK_SIZE};
pub use resolve::{
    default_search_paths, ensure_keypair, load, resolve_config_path, save, Settings,
};
pub use types::{AgeConfig, Config, MemoryConfig, RamConfig, S3Config};
