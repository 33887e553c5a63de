pub mod backup;
pub mod ls;
pub mod restore;
pub mod rm;
pub mod size;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::{BruteError, Result};
use crate::storage::{self, ObjectStore};

/// One archive as discovered in the bucket. The raw prefix string is kept
/// alongside the parsed time because listing and deletion must use the
/// exact key prefix, not a reformatted one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveStamp {
    pub raw: String,
    pub time: DateTime<Utc>,
}

/// Distinct archives in the bucket, sorted ascending by time. Keys that
/// do not look like `{rfc3339}/{index}` are logged and ignored.
pub fn archive_stamps(store: &dyn ObjectStore) -> Result<Vec<ArchiveStamp>> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut stamps = Vec::new();

    for obj in store.list("")? {
        let Some(prefix) = storage::archive_prefix(&obj.key) else {
            warn!(key = %obj.key, "ignoring object outside any archive");
            continue;
        };
        if !seen.insert(prefix.to_string()) {
            continue;
        }
        match DateTime::parse_from_rfc3339(prefix) {
            Ok(time) => stamps.push(ArchiveStamp {
                raw: prefix.to_string(),
                time: time.with_timezone(&Utc),
            }),
            Err(e) => {
                warn!(key = %obj.key, error = %e, "ignoring key with unparseable archive timestamp");
            }
        }
    }

    stamps.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.raw.cmp(&b.raw)));
    Ok(stamps)
}

/// Fail-fast coordination for a pipeline run: the first fatal error wins
/// and every stage checks the flag at its next suspension point.
pub(crate) struct FailFast {
    cancelled: AtomicBool,
    first_error: Mutex<Option<BruteError>>,
}

impl FailFast {
    pub(crate) fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            first_error: Mutex::new(None),
        }
    }

    pub(crate) fn record(&self, error: BruteError) {
        self.cancelled.store(true, Ordering::Release);
        let mut slot = self.first_error.lock().unwrap();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub(crate) fn cancelled_flag(&self) -> &AtomicBool {
        &self.cancelled
    }

    pub(crate) fn into_result(self) -> Result<()> {
        match self.first_error.into_inner().unwrap() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
