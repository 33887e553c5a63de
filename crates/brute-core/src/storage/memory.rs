use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::Result;
use crate::storage::{ObjectInfo, ObjectStore};

/// In-memory object store. Thread-safe via Mutex; used by the test suites
/// and by dry-run experiments.
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite an object's bytes directly (corruption injection in tests).
    pub fn tamper(&self, key: &str, data: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), data);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for MemoryStore {
    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let mut objects = self.objects.lock().unwrap();
        objects.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn get(&self, key: &str, buf: &mut Vec<u8>) -> Result<bool> {
        let objects = self.objects.lock().unwrap();
        match objects.get(key) {
            Some(data) => {
                buf.clear();
                buf.extend_from_slice(data);
                Ok(true)
            }
            None => {
                buf.clear();
                Ok(false)
            }
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, data)| ObjectInfo {
                key: key.clone(),
                size: data.len() as u64,
            })
            .collect())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut objects = self.objects.lock().unwrap();
        objects.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_roundtrip() {
        let store = MemoryStore::new();
        store.put("a/0", b"chunk").unwrap();

        let mut buf = Vec::new();
        assert!(store.get("a/0", &mut buf).unwrap());
        assert_eq!(buf, b"chunk");
        assert!(!store.get("a/1", &mut buf).unwrap());
        assert!(buf.is_empty());
    }

    #[test]
    fn list_filters_by_prefix_and_reports_sizes() {
        let store = MemoryStore::new();
        store.put("t1/0", b"abc").unwrap();
        store.put("t1/1", b"defgh").unwrap();
        store.put("t2/0", b"x").unwrap();

        let listed = store.list("t1/").unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].size, 3);
        assert_eq!(listed[1].size, 5);

        assert_eq!(store.list("").unwrap().len(), 3);
    }

    #[test]
    fn delete_is_idempotent() {
        let store = MemoryStore::new();
        store.put("t/0", b"x").unwrap();
        store.delete("t/0").unwrap();
        store.delete("t/0").unwrap();
        assert!(store.is_empty());
    }
}
