pub mod cache;
pub mod chunker;
pub mod commands;
pub mod config;
pub mod error;
pub mod pipe;
pub mod pool;
pub mod reorder;
pub mod storage;
pub mod tarstream;
pub mod transform;
pub mod walk;

pub use error::{BruteError, Result};
