use thiserror::Error;

pub type Result<T> = std::result::Result<T, BruteError>;

#[derive(Debug, Error)]
pub enum BruteError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object store error: {0}")]
    Storage(String),

    #[error("tar stream error: {0}")]
    TarStream(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("decryption failed: wrong identity or corrupted chunk")]
    DecryptionFailed,

    #[error("archive is missing chunk {0}")]
    MissingChunk(u64),

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("{0}")]
    Other(String),
}
