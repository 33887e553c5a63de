use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Sender;

use crate::error::Result;
use crate::pool::BufferPool;

/// One unit of the tar byte stream. Indices are assigned by the chunker,
/// survive every transform unchanged, and are the sole ordering authority
/// downstream.
pub struct Chunk {
    pub index: u64,
    pub payload: Vec<u8>,
}

/// Cut `input` into `chunk_size`-byte chunks and send them on `tx`.
///
/// Every chunk except possibly the last is exactly `chunk_size` bytes; an
/// input whose length divides evenly produces a final full chunk and no
/// empty trailer, and an empty input produces no chunks at all. The caller
/// closes the channel by dropping `tx` after this returns.
///
/// Returns the number of chunks emitted.
pub fn run_chunker<R: Read>(
    mut input: R,
    chunk_size: usize,
    pool: &BufferPool,
    tx: &Sender<Chunk>,
    cancelled: &AtomicBool,
) -> Result<u64> {
    let mut index = 0u64;
    loop {
        if cancelled.load(Ordering::Acquire) {
            return Ok(index);
        }

        let mut buf = pool.get();
        buf.resize(chunk_size, 0);

        let mut filled = 0;
        let read_err = loop {
            if filled == chunk_size {
                break None;
            }
            match input.read(&mut buf[filled..]) {
                Ok(0) => break None,
                Ok(n) => filled += n,
                Err(e) => break Some(e),
            }
        };
        buf.truncate(filled);

        if filled == 0 {
            pool.put(buf);
            return match read_err {
                Some(e) => Err(e.into()),
                None => Ok(index),
            };
        }

        let full = filled == chunk_size;
        if tx.send(Chunk {
            index,
            payload: buf,
        })
        .is_err()
        {
            // Consumer gone; the run is tearing down.
            return Ok(index);
        }
        index += 1;

        if let Some(e) = read_err {
            return Err(e.into());
        }
        if !full {
            return Ok(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn chunk_lengths(data: &[u8], chunk_size: usize) -> Vec<(u64, usize)> {
        let pool = BufferPool::new();
        let cancelled = AtomicBool::new(false);
        let (tx, rx) = crossbeam_channel::unbounded();
        let n = run_chunker(Cursor::new(data), chunk_size, &pool, &tx, &cancelled).unwrap();
        drop(tx);
        let chunks: Vec<(u64, usize)> = rx.iter().map(|c| (c.index, c.payload.len())).collect();
        assert_eq!(n as usize, chunks.len());
        chunks
    }

    #[test]
    fn empty_input_emits_nothing() {
        assert!(chunk_lengths(&[], 16).is_empty());
    }

    #[test]
    fn short_input_is_single_chunk() {
        assert_eq!(chunk_lengths(&[7u8; 5], 16), vec![(0, 5)]);
    }

    #[test]
    fn exact_multiple_has_no_empty_trailer() {
        assert_eq!(chunk_lengths(&[7u8; 32], 16), vec![(0, 16), (1, 16)]);
    }

    #[test]
    fn remainder_becomes_short_final_chunk() {
        assert_eq!(chunk_lengths(&[7u8; 37], 16), vec![(0, 16), (1, 16), (2, 5)]);
    }

    #[test]
    fn indices_are_contiguous_from_zero() {
        let chunks = chunk_lengths(&[0u8; 1000], 7);
        for (expected, (index, _)) in chunks.iter().enumerate() {
            assert_eq!(*index, expected as u64);
        }
        assert_eq!(chunks.len(), 143); // ceil(1000 / 7)
    }

    #[test]
    fn payload_bytes_survive_in_order() {
        let data: Vec<u8> = (0..=255u8).cycle().take(700).collect();
        let pool = BufferPool::new();
        let cancelled = AtomicBool::new(false);
        let (tx, rx) = crossbeam_channel::unbounded();
        run_chunker(Cursor::new(&data), 64, &pool, &tx, &cancelled).unwrap();
        drop(tx);

        let mut reassembled = Vec::new();
        for chunk in rx {
            reassembled.extend_from_slice(&chunk.payload);
        }
        assert_eq!(reassembled, data);
    }
}
