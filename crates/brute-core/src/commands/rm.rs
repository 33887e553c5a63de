use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{info, warn};

use super::ArchiveStamp;
use crate::error::{BruteError, Result};
use crate::storage::ObjectStore;

/// Parse a comma-separated list of 1-based ordinals as shown by `ls`.
/// Duplicates collapse; anything out of range is an error.
pub fn parse_selection(input: &str, available: usize) -> Result<Vec<usize>> {
    let mut picks = Vec::new();
    for token in input.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let ordinal: usize = token
            .parse()
            .map_err(|_| BruteError::Config(format!("invalid selection '{token}'")))?;
        if ordinal == 0 || ordinal > available {
            return Err(BruteError::Config(format!(
                "selection {ordinal} is out of range (1-{available})"
            )));
        }
        if !picks.contains(&(ordinal - 1)) {
            picks.push(ordinal - 1);
        }
    }
    Ok(picks)
}

#[derive(Debug)]
pub struct RemoveReport {
    pub objects_deleted: u64,
    pub objects_failed: u64,
}

/// Delete every object under each selected archive, one thread per
/// archive. Individual delete failures are logged and counted; they never
/// stop the other deletions.
pub fn run(
    store: &dyn ObjectStore,
    stamps: &[ArchiveStamp],
    selection: &[usize],
) -> Result<RemoveReport> {
    let deleted = AtomicU64::new(0);
    let failed = AtomicU64::new(0);

    std::thread::scope(|s| {
        for &idx in selection {
            let Some(stamp) = stamps.get(idx) else {
                continue;
            };
            let deleted = &deleted;
            let failed = &failed;
            s.spawn(move || {
                let objects = match store.list(&format!("{}/", stamp.raw)) {
                    Ok(objects) => objects,
                    Err(e) => {
                        warn!(archive = %stamp.raw, error = %e, "failed to list archive for deletion");
                        failed.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                };
                for obj in objects {
                    match store.delete(&obj.key) {
                        Ok(()) => {
                            deleted.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            warn!(key = %obj.key, error = %e, "failed to delete object");
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                info!(archive = %stamp.raw, "archive deleted");
            });
        }
    });

    Ok(RemoveReport {
        objects_deleted: deleted.load(Ordering::Relaxed),
        objects_failed: failed.load(Ordering::Relaxed),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::archive_stamps;
    use crate::storage::MemoryStore;

    #[test]
    fn selection_parsing() {
        assert_eq!(parse_selection("1", 3).unwrap(), vec![0]);
        assert_eq!(parse_selection("1, 3", 3).unwrap(), vec![0, 2]);
        assert_eq!(parse_selection("2,2,2", 3).unwrap(), vec![1]);
        assert_eq!(parse_selection("", 3).unwrap(), Vec::<usize>::new());
        assert!(parse_selection("0", 3).is_err());
        assert!(parse_selection("4", 3).is_err());
        assert!(parse_selection("two", 3).is_err());
    }

    #[test]
    fn deletes_only_selected_archives() {
        let store = MemoryStore::new();
        store.put("2024-01-01T00:00:00Z/0", b"a").unwrap();
        store.put("2024-01-01T00:00:00Z/1", b"a").unwrap();
        store.put("2024-02-01T00:00:00Z/0", b"b").unwrap();
        store.put("2024-03-01T00:00:00Z/0", b"c").unwrap();

        let stamps = archive_stamps(&store).unwrap();
        // Ordinals 1 and 3 as typed by the user.
        let selection = parse_selection("1,3", stamps.len()).unwrap();
        let report = run(&store, &stamps, &selection).unwrap();

        assert_eq!(report.objects_deleted, 3);
        assert_eq!(report.objects_failed, 0);

        let remaining = store.list("").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].key, "2024-02-01T00:00:00Z/0");
    }
}
