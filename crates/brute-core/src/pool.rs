use std::sync::Mutex;

/// Reusable byte buffers for the chunk pipeline.
///
/// Multi-megabyte buffers churn through every stage of a backup run; the
/// pool keeps them alive across chunks instead of handing them back to the
/// allocator. A checked-out buffer is owned by exactly one stage at a time,
/// and whichever stage reads it last returns it.
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
        }
    }

    /// Check out a cleared buffer. Capacity is whatever its last use grew
    /// it to; length is always zero.
    pub fn get(&self) -> Vec<u8> {
        let mut buffers = self.buffers.lock().unwrap();
        buffers.pop().unwrap_or_default()
    }

    /// Return a buffer for reuse. The contents are discarded.
    pub fn put(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut buffers = self.buffers.lock().unwrap();
        buffers.push(buf);
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn get_returns_empty_buffer() {
        let pool = BufferPool::new();
        let mut buf = pool.get();
        assert!(buf.is_empty());
        buf.extend_from_slice(b"some chunk data");
        pool.put(buf);

        let reused = pool.get();
        assert!(reused.is_empty(), "returned buffer must be cleared");
        assert!(reused.capacity() >= 15, "capacity should survive reuse");
    }

    #[test]
    fn put_clears_contents() {
        let pool = BufferPool::new();
        pool.put(vec![1, 2, 3]);
        assert!(pool.get().is_empty());
    }

    #[test]
    fn concurrent_checkout() {
        let pool = Arc::new(BufferPool::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            handles.push(std::thread::spawn(move || {
                for i in 0..200u32 {
                    let mut buf = pool.get();
                    assert!(buf.is_empty());
                    buf.extend_from_slice(&i.to_le_bytes());
                    pool.put(buf);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
    }
}
