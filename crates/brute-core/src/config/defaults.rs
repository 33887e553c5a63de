use crate::error::{BruteError, Result};

/// 64 MiB unless the config says otherwise.
pub const DEFAULT_CHUNK_SIZE: u64 = 64 * 1024 * 1024;

/// Depth of the bounded chunk queues between pipeline stages.
pub const DEFAULT_CHUNK_QUEUE: usize = 4;

/// Parse a human-readable size string like "64MB", "512K", or "1.5G" into
/// bytes. Suffixes use 1024 multiples; a bare number is bytes.
pub fn parse_human_size(raw: &str) -> Result<u64> {
    let input = raw.trim();
    if input.is_empty() {
        return Err(BruteError::Config("size must not be empty".into()));
    }

    let upper = input.to_ascii_uppercase();
    let (num_str, multiplier) = if let Some(p) = upper.strip_suffix("KB").or(upper.strip_suffix("K")) {
        (p, 1024u64)
    } else if let Some(p) = upper.strip_suffix("MB").or(upper.strip_suffix("M")) {
        (p, 1024 * 1024)
    } else if let Some(p) = upper.strip_suffix("GB").or(upper.strip_suffix("G")) {
        (p, 1024 * 1024 * 1024)
    } else if let Some(p) = upper.strip_suffix("TB").or(upper.strip_suffix("T")) {
        (p, 1024 * 1024 * 1024 * 1024)
    } else if let Some(p) = upper.strip_suffix("B") {
        (p, 1)
    } else {
        (upper.as_str(), 1)
    };

    let value: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| BruteError::Config(format!("invalid size: '{raw}'")))?;
    if value < 0.0 {
        return Err(BruteError::Config(format!("size must not be negative: '{raw}'")));
    }
    Ok((value * multiplier as f64) as u64)
}
