use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Condvar, Mutex};

/// Create a bounded in-memory byte pipe.
///
/// The tar stream is produced by one thread and chunked by another; the
/// pipe connects them while capping the bytes buffered in between, so a
/// stalled consumer applies backpressure to the producer.
///
/// Dropping the writer signals EOF to the reader once the buffer drains.
/// Dropping the reader makes further writes fail with `BrokenPipe`.
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    assert!(capacity > 0, "pipe capacity must be non-zero");
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            buf: VecDeque::with_capacity(capacity),
            capacity,
            write_closed: false,
            read_closed: false,
        }),
        readable: Condvar::new(),
        writable: Condvar::new(),
    });
    (
        PipeWriter {
            shared: Arc::clone(&shared),
        },
        PipeReader { shared },
    )
}

struct State {
    buf: VecDeque<u8>,
    capacity: usize,
    write_closed: bool,
    read_closed: bool,
}

struct Shared {
    state: Mutex<State>,
    readable: Condvar,
    writable: Condvar,
}

pub struct PipeWriter {
    shared: Arc<Shared>,
}

pub struct PipeReader {
    shared: Arc<Shared>,
}

impl Write for PipeWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        let mut st = self.shared.state.lock().unwrap();
        loop {
            if st.read_closed {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "pipe reader was dropped",
                ));
            }
            let free = st.capacity - st.buf.len();
            if free > 0 {
                let n = free.min(data.len());
                st.buf.extend(&data[..n]);
                self.shared.readable.notify_one();
                return Ok(n);
            }
            st = self.shared.writable.wait(st).unwrap();
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        let mut st = self.shared.state.lock().unwrap();
        st.write_closed = true;
        self.shared.readable.notify_all();
    }
}

impl Read for PipeReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        let mut st = self.shared.state.lock().unwrap();
        loop {
            if !st.buf.is_empty() {
                let n = out.len().min(st.buf.len());
                for (i, byte) in st.buf.drain(..n).enumerate() {
                    out[i] = byte;
                }
                self.shared.writable.notify_one();
                return Ok(n);
            }
            if st.write_closed {
                return Ok(0);
            }
            st = self.shared.readable.wait(st).unwrap();
        }
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        let mut st = self.shared.state.lock().unwrap();
        st.read_closed = true;
        self.shared.writable.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn roundtrip_across_threads() {
        let (mut w, mut r) = pipe(8);
        let payload: Vec<u8> = (0..1000u32).flat_map(|i| i.to_le_bytes()).collect();
        let expected = payload.clone();

        let writer = std::thread::spawn(move || {
            w.write_all(&payload).unwrap();
            // Drop closes the pipe.
        });

        let mut got = Vec::new();
        r.read_to_end(&mut got).unwrap();
        writer.join().unwrap();
        assert_eq!(got, expected);
    }

    #[test]
    fn eof_after_writer_drop() {
        let (w, mut r) = pipe(16);
        drop(w);
        let mut buf = [0u8; 4];
        assert_eq!(r.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn drained_before_eof() {
        let (mut w, mut r) = pipe(16);
        w.write_all(b"tail").unwrap();
        drop(w);
        let mut got = Vec::new();
        r.read_to_end(&mut got).unwrap();
        assert_eq!(got, b"tail");
    }

    #[test]
    fn write_fails_after_reader_drop() {
        let (mut w, r) = pipe(4);
        drop(r);
        let err = w.write_all(b"data").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn backpressure_bounds_buffer() {
        let (mut w, mut r) = pipe(4);
        // Writer fills beyond capacity; only the reader draining lets it finish.
        let writer = std::thread::spawn(move || {
            w.write_all(&[0xAB; 64]).unwrap();
        });
        let mut got = Vec::new();
        r.read_to_end(&mut got).unwrap();
        writer.join().unwrap();
        assert_eq!(got.len(), 64);
    }
}
