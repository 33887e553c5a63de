use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::bounded;
use tracing::{debug, info, warn};

use super::{archive_stamps, FailFast};
use crate::chunker::Chunk;
use crate::config::{Config, Settings};
use crate::error::{BruteError, Result};
use crate::pipe;
use crate::pool::BufferPool;
use crate::reorder;
use crate::storage::{parse_chunk_key, ObjectStore};
use crate::tarstream;
use crate::transform;

use super::backup::TAR_PIPE_CAPACITY;

#[derive(Debug)]
pub struct RestoreReport {
    pub archive: String,
    pub chunks: u64,
    pub files: u64,
    pub bytes: u64,
}

/// Restore the most recent archive under `dest`.
///
/// Downloads and decrypts chunks in parallel, reassembles them in strict
/// index order, and extracts the resulting tar stream. Restore is
/// whole-archive; the first missing or unopenable chunk aborts the run.
pub fn run(
    store: &dyn ObjectStore,
    config: &Config,
    settings: &Settings,
    retry_backoff: Duration,
    dest: &Path,
) -> Result<RestoreReport> {
    let identity = transform::parse_identity(&config.age.private)?;

    let stamps = archive_stamps(store)?;
    let Some(stamp) = stamps.last() else {
        return Err(BruteError::Other("no archives found in bucket".into()));
    };
    info!(archive = %stamp.raw, dest = %dest.display(), "restoring most recent archive");

    let mut keys: Vec<(String, u64)> = Vec::new();
    for obj in store.list(&format!("{}/", stamp.raw))? {
        match parse_chunk_key(&obj.key) {
            Some((_, index)) => keys.push((obj.key, index)),
            None => warn!(key = %obj.key, "ignoring unrecognized object in archive"),
        }
    }
    let chunk_count = keys.len() as u64;

    let pool = BufferPool::new();
    let guard = FailFast::new();
    let stats_slot = Mutex::new(tarstream::ExtractStats::default());

    std::thread::scope(|s| {
        let (key_tx, key_rx) = bounded::<(String, u64)>(settings.parallel * 2);
        let (sealed_tx, sealed_rx) = bounded::<Chunk>(settings.chunk_queue);
        let (plain_tx, plain_rx) = bounded::<Chunk>(settings.chunk_queue);
        let (pipe_writer, pipe_reader) = pipe::pipe(TAR_PIPE_CAPACITY);

        let guard = &guard;
        let pool = &pool;

        // Key feeder.
        s.spawn(move || {
            for item in keys {
                if guard.is_cancelled() || key_tx.send(item).is_err() {
                    return;
                }
            }
        });

        // Download pool: a listed key that turns out to be gone is an
        // archive gap, not a transport blip, so it is not retried.
        for _ in 0..settings.parallel {
            let rx = key_rx.clone();
            let tx = sealed_tx.clone();
            s.spawn(move || {
                for (key, index) in rx {
                    let mut buf = pool.get();
                    loop {
                        if guard.is_cancelled() {
                            return;
                        }
                        match store.get(&key, &mut buf) {
                            Ok(true) => break,
                            Ok(false) => {
                                guard.record(BruteError::MissingChunk(index));
                                return;
                            }
                            Err(e) => {
                                warn!(key = %key, error = %e, "download failed, backing off");
                                std::thread::sleep(retry_backoff);
                            }
                        }
                    }
                    debug!(key = %key, bytes = buf.len(), "downloaded chunk");
                    let chunk = Chunk {
                        index,
                        payload: buf,
                    };
                    if tx.send(chunk).is_err() {
                        return;
                    }
                }
            });
        }
        drop(key_rx);
        drop(sealed_tx);

        // Decrypt/decompress pool.
        let identity = &identity;
        for _ in 0..settings.workers {
            let rx = sealed_rx.clone();
            let tx = plain_tx.clone();
            s.spawn(move || {
                for chunk in rx {
                    if guard.is_cancelled() {
                        return;
                    }
                    let mut plain = pool.get();
                    match transform::open_chunk(identity, &chunk.payload, &mut plain) {
                        Ok(()) => {
                            pool.put(chunk.payload);
                            let out = Chunk {
                                index: chunk.index,
                                payload: plain,
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
        drop(sealed_rx);
        drop(plain_tx);

        // Reorderer: the sole writer of the tar pipe.
        s.spawn(move || {
            if let Err(e) = reorder::run_reorder(plain_rx, pipe_writer, pool) {
                guard.record(e);
            }
        });

        // Extractor runs on the orchestrating thread.
        match tarstream::extract_tar(pipe_reader, dest) {
            Ok(stats) => *stats_slot.lock().unwrap() = stats,
            Err(e) => guard.record(e),
        }
    });

    guard.into_result()?;

    let stats = stats_slot.into_inner().unwrap();
    let report = RestoreReport {
        archive: stamp.raw.clone(),
        chunks: chunk_count,
        files: stats.files,
        bytes: stats.bytes,
    };
    info!(
        archive = %report.archive,
        files = report.files,
        bytes = report.bytes,
        "restore complete"
    );
    Ok(report)
}
