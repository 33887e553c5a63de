use std::collections::HashMap;
use std::io::Write;

use crossbeam_channel::Receiver;

use crate::chunker::Chunk;
use crate::error::{BruteError, Result};
use crate::pool::BufferPool;

/// Reassemble chunks arriving in arbitrary order into an in-order byte
/// stream.
///
/// Holds out-of-order arrivals in a map keyed by index and flushes every
/// consecutive run starting at the `next` cursor. Memory is bounded only
/// by how late a chunk can arrive, which in practice is capped by the
/// download pool size feeding this stage.
///
/// If the input closes while chunks are still parked, the archive has a
/// gap at the cursor and the restore cannot proceed.
///
/// Returns the number of chunks written.
pub fn run_reorder<W: Write>(rx: Receiver<Chunk>, mut out: W, pool: &BufferPool) -> Result<u64> {
    let mut pending: HashMap<u64, Vec<u8>> = HashMap::new();
    let mut next = 0u64;

    for chunk in rx {
        pending.insert(chunk.index, chunk.payload);
        while let Some(buf) = pending.remove(&next) {
            out.write_all(&buf)?;
            pool.put(buf);
            next += 1;
        }
    }

    if !pending.is_empty() {
        return Err(BruteError::MissingChunk(next));
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: u64, byte: u8, len: usize) -> Chunk {
        Chunk {
            index,
            payload: vec![byte; len],
        }
    }

    fn reorder(chunks: Vec<Chunk>) -> Result<Vec<u8>> {
        let pool = BufferPool::new();
        let (tx, rx) = crossbeam_channel::unbounded();
        for c in chunks {
            tx.send(c).unwrap();
        }
        drop(tx);
        let mut out = Vec::new();
        run_reorder(rx, &mut out, &pool)?;
        Ok(out)
    }

    #[test]
    fn in_order_passthrough() {
        let out = reorder(vec![chunk(0, b'a', 2), chunk(1, b'b', 2)]).unwrap();
        assert_eq!(out, b"aabb");
    }

    #[test]
    fn reversed_arrival() {
        let out = reorder(vec![chunk(2, b'c', 1), chunk(1, b'b', 1), chunk(0, b'a', 1)]).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn all_permutations_of_four() {
        // Exhaustive over 4! arrival orders.
        let orders: Vec<Vec<u64>> = {
            let mut all = Vec::new();
            let idx = [0u64, 1, 2, 3];
            for a in idx {
                for b in idx {
                    for c in idx {
                        for d in idx {
                            let p = vec![a, b, c, d];
                            let mut seen = p.clone();
                            seen.sort_unstable();
                            if seen == [0, 1, 2, 3] {
                                all.push(p);
                            }
                        }
                    }
                }
            }
            all
        };
        assert_eq!(orders.len(), 24);

        for order in orders {
            let chunks: Vec<Chunk> = order
                .iter()
                .map(|&i| chunk(i, b'a' + i as u8, 3))
                .collect();
            let out = reorder(chunks).unwrap();
            assert_eq!(out, b"aaabbbcccddd", "failed for arrival order {order:?}");
        }
    }

    #[test]
    fn gap_is_fatal() {
        let err = reorder(vec![chunk(0, b'a', 1), chunk(2, b'c', 1)]).unwrap_err();
        match err {
            BruteError::MissingChunk(1) => {}
            other => panic!("expected MissingChunk(1), got {other}"),
        }
    }

    #[test]
    fn missing_first_chunk_is_fatal() {
        let err = reorder(vec![chunk(1, b'b', 1)]).unwrap_err();
        match err {
            BruteError::MissingChunk(0) => {}
            other => panic!("expected MissingChunk(0), got {other}"),
        }
    }

    #[test]
    fn empty_input_is_empty_stream() {
        assert_eq!(reorder(Vec::new()).unwrap(), Vec::<u8>::new());
    }
}
