use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use tracing::warn;

use super::{archive_stamps, ArchiveStamp};
use crate::cache::SizeCache;
use crate::error::Result;
use crate::storage::ObjectStore;

#[derive(Debug)]
pub struct ArchiveListing {
    pub stamp: ArchiveStamp,
    /// Total ciphertext bytes across the archive's objects.
    pub size: u64,
}

/// List archives ascending with their total sizes.
///
/// Sizes come from the on-disk cache where possible. The cache is
/// reconciled by set difference against the live listing: entries for
/// vanished archives are dropped, archives the cache has not seen are
/// listed and summed (one thread per archive), and the cache is rewritten
/// at the end. Cache trouble never fails the listing.
pub fn run(store: &dyn ObjectStore, cache_path: &Path) -> Result<Vec<ArchiveListing>> {
    let stamps = archive_stamps(store)?;
    let mut cache = SizeCache::load(cache_path);

    let live: HashSet<&str> = stamps.iter().map(|s| s.raw.as_str()).collect();
    let stale: Vec<String> = cache
        .timestamps()
        .filter(|t| !live.contains(t))
        .map(String::from)
        .collect();
    for timestamp in &stale {
        cache.remove(timestamp);
    }

    let missing: Vec<&ArchiveStamp> = stamps
        .iter()
        .filter(|s| cache.get(&s.raw).is_none())
        .collect();

    let summed: Mutex<Vec<(String, u64)>> = Mutex::new(Vec::new());
    std::thread::scope(|scope| {
        for stamp in &missing {
            let summed = &summed;
            scope.spawn(move || {
                match store.list(&format!("{}/", stamp.raw)) {
                    Ok(objects) => {
                        let total: u64 = objects.iter().map(|o| o.size).sum();
                        summed.lock().unwrap().push((stamp.raw.clone(), total));
                    }
                    Err(e) => warn!(archive = %stamp.raw, error = %e, "failed to size archive"),
                }
            });
        }
    });
    for (raw, total) in summed.into_inner().unwrap() {
        cache.insert(raw, total);
    }

    if let Err(e) = cache.store(cache_path) {
        warn!(path = %cache_path.display(), error = %e, "failed to write archive size cache");
    }

    Ok(stamps
        .into_iter()
        .map(|stamp| {
            let size = cache.get(&stamp.raw).unwrap_or(0);
            ArchiveListing { stamp, size }
        })
        .collect())
}
