use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use crossbeam_channel::bounded;
use tracing::{debug, info, warn};

use super::FailFast;
use crate::chunker::{self, Chunk};
use crate::config::{Config, Settings};
use crate::error::Result;
use crate::pipe;
use crate::pool::BufferPool;
use crate::storage::{chunk_key, ObjectStore};
use crate::tarstream;
use crate::transform;
use crate::walk::{self, ExcludeMatcher};

/// Capacity of the byte pipe between the tar builder and the chunker.
pub(crate) const TAR_PIPE_CAPACITY: usize = 1024 * 1024;

/// How long a failed transfer waits before the next attempt. Object-store
/// outages routinely last tens of seconds; a flat wait outlasts them
/// without the machinery of exponential backoff.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct BackupReport {
    /// RFC3339 timestamp identifying the new archive.
    pub archive: String,
    pub files: u64,
    pub chunks: u64,
    pub uploaded_bytes: u64,
}

/// Run a backup: walk → tar → chunk → compress+encrypt → upload.
///
/// The stages are connected by bounded channels and one bounded byte pipe,
/// so in-flight memory stays near `chunk_size × (workers + queue depth)`
/// regardless of input size. The archive timestamp is captured once here
/// and shared by every uploader.
pub fn run(
    store: &dyn ObjectStore,
    config: &Config,
    settings: &Settings,
    retry_backoff: Duration,
) -> Result<BackupReport> {
    let recipient = transform::parse_recipient(&config.age.public)?;
    let matcher = ExcludeMatcher::new(&config.exclude_patterns)?;
    let archive = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

    info!(archive = %archive, dryrun = settings.dryrun, "starting backup");

    let pool = BufferPool::new();
    let guard = FailFast::new();
    let files = AtomicU64::new(0);
    let chunks = AtomicU64::new(0);
    let uploaded = AtomicU64::new(0);

    std::thread::scope(|s| {
        let (entry_tx, entry_rx) = bounded(settings.workers * 2);
        let (pipe_writer, pipe_reader) = pipe::pipe(TAR_PIPE_CAPACITY);
        let (chunk_tx, chunk_rx) = bounded::<Chunk>(settings.chunk_queue);
        let (sealed_tx, sealed_rx) = bounded::<Chunk>(settings.chunk_queue);

        let guard = &guard;
        let pool = &pool;

        // Walker: one producer over all include roots, in configured order.
        let include_dirs = &config.include_dirs;
        let matcher = &matcher;
        s.spawn(move || {
            for root in include_dirs {
                if guard.is_cancelled() {
                    break;
                }
                walk::walk_root(root, matcher, &mut |entry| {
                    !guard.is_cancelled() && entry_tx.send(entry).is_ok()
                });
            }
            // entry_tx drops here: the tar builder sees end of input.
        });

        // Tar builder: sole writer of the pipe; dropping the writer on any
        // exit path is what delivers EOF to the chunker.
        let files = &files;
        s.spawn(move || match tarstream::build_tar(entry_rx, pipe_writer) {
            Ok(n) => files.store(n, Ordering::Relaxed),
            Err(e) => guard.record(e),
        });

        // Chunker: assigns the contiguous index sequence.
        let chunks = &chunks;
        let chunk_size = settings.chunk_size;
        s.spawn(move || {
            match chunker::run_chunker(pipe_reader, chunk_size, pool, &chunk_tx, guard.cancelled_flag())
            {
                Ok(n) => chunks.store(n, Ordering::Relaxed),
                Err(e) => guard.record(e),
            }
            // chunk_tx drops here, closing the transform input.
        });

        // Transform pool: compress-then-encrypt, indices pass through.
        let recipient = &recipient;
        for _ in 0..settings.workers {
            let rx = chunk_rx.clone();
            let tx = sealed_tx.clone();
            s.spawn(move || {
                for chunk in rx {
                    if guard.is_cancelled() {
                        return;
                    }
                    let mut sealed = pool.get();
                    match transform::seal_chunk(recipient, &chunk.payload, &mut sealed) {
                        Ok(()) => {
                            pool.put(chunk.payload);
                            let out = Chunk {
                                index: chunk.index,
                                payload: sealed,
                            };
                            if tx.send(out).is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            guard.record(e);
                            return;
                        }
                    }
                }
            });
        }
        drop(chunk_rx);
        drop(sealed_tx);

        // Upload pool: deterministic keys make the unbounded retry
        // idempotent; a re-put overwrites with identical content.
        let archive = &archive;
        let uploaded = &uploaded;
        let dryrun = settings.dryrun;
        for _ in 0..settings.parallel {
            let rx = sealed_rx.clone();
            s.spawn(move || {
                for chunk in rx {
                    let key = chunk_key(archive, chunk.index);
                    if dryrun {
                        info!(key = %key, bytes = chunk.payload.len(), "dry run, skipping upload");
                        pool.put(chunk.payload);
                        continue;
                    }
                    loop {
                        if guard.is_cancelled() {
                            return;
                        }
                        match store.put(&key, &chunk.payload) {
                            Ok(()) => {
                                debug!(key = %key, bytes = chunk.payload.len(), "uploaded chunk");
                                uploaded.fetch_add(chunk.payload.len() as u64, Ordering::Relaxed);
                                break;
                            }
                            Err(e) => {
                                warn!(key = %key, error = %e, "upload failed, backing off");
                                std::thread::sleep(retry_backoff);
                            }
                        }
                    }
                    pool.put(chunk.payload);
                }
            });
        }
        drop(sealed_rx);
    });

    guard.into_result()?;

    let report = BackupReport {
        archive,
        files: files.load(Ordering::Relaxed),
        chunks: chunks.load(Ordering::Relaxed),
        uploaded_bytes: uploaded.load(Ordering::Relaxed),
    };
    info!(
        archive = %report.archive,
        files = report.files,
        chunks = report.chunks,
        uploaded_bytes = report.uploaded_bytes,
        "backup complete"
    );
    Ok(report)
}
