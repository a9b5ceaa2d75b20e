//! Storage backends for the versioned store
//!
//! A backend only maps keys to records. Version assignment and locking live
//! in [`VersionedStore`](super::VersionedStore), which owns its backend.

use crate::common::Result;
use crate::store::Record;
use std::collections::HashMap;

#[cfg(feature = "sled-backend")]
use crate::common::Error;
#[cfg(feature = "sled-backend")]
use std::path::Path;

/// Trait for key-to-record storage backends
pub trait StorageBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Record>>;

    fn put(&mut self, key: &str, record: Record) -> Result<()>;

    /// Highest version held for any key, 0 when empty
    fn max_version(&self) -> Result<u64>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// In-memory backend (default)
#[derive(Debug, Default)]
pub struct MemoryBackend {
    map: HashMap<String, Record>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Record>> {
        Ok(self.map.get(key).cloned())
    }

    fn put(&mut self, key: &str, record: Record) -> Result<()> {
        self.map.insert(key.to_string(), record);
        Ok(())
    }

    fn max_version(&self) -> Result<u64> {
        Ok(self.map.values().map(|r| r.version).max().unwrap_or(0))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.map.len())
    }
}

/// Sled store
#[cfg(feature = "sled-backend")]
pub struct SledBackend {
    db: sled::Db,
}

#[cfg(feature = "sled-backend")]
impl SledBackend {
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path).map_err(|e| Error::Storage(e.to_string()))?;
        Ok(Self { db })
    }

    fn decode(bytes: &[u8]) -> Result<Record> {
        bincode::deserialize(bytes).map_err(|e| Error::Storage(format!("corrupted record: {}", e)))
    }
}

#[cfg(feature = "sled-backend")]
impl StorageBackend for SledBackend {
    fn get(&self, key: &str) -> Result<Option<Record>> {
        match self.db.get(key).map_err(|e| Error::Storage(e.to_string()))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&mut self, key: &str, record: Record) -> Result<()> {
        let bytes = bincode::serialize(&record).map_err(|e| Error::Storage(e.to_string()))?;
        self.db
            .insert(key, bytes)
            .map_err(|e| Error::Storage(e.to_string()))?;
        Ok(())
    }

    fn max_version(&self) -> Result<u64> {
        let mut max = 0;
        for entry in self.db.iter() {
            let (_, bytes) = entry.map_err(|e| Error::Storage(e.to_string()))?;
            max = max.max(Self::decode(&bytes)?.version);
        }
        Ok(max)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.db.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: &str, version: u64) -> Record {
        Record {
            value: value.to_string(),
            version,
        }
    }

    #[test]
    fn test_memory_backend() {
        let mut backend = MemoryBackend::new();
        assert!(backend.is_empty().unwrap());
        assert_eq!(backend.max_version().unwrap(), 0);

        backend.put("a", record("1", 3)).unwrap();
        backend.put("b", record("2", 7)).unwrap();
        backend.put("a", record("3", 5)).unwrap();

        assert_eq!(backend.get("a").unwrap(), Some(record("3", 5)));
        assert_eq!(backend.get("missing").unwrap(), None);
        assert_eq!(backend.len().unwrap(), 2);
        assert_eq!(backend.max_version().unwrap(), 7);
    }

    #[cfg(feature = "sled-backend")]
    #[test]
    fn test_sled_backend_reopen() {
        let dir = tempfile::TempDir::new().unwrap();

        {
            let mut backend = SledBackend::open(dir.path()).unwrap();
            backend.put("k", record("v", 9)).unwrap();
            backend.put("other", record("w", 4)).unwrap();
            backend.db.flush().unwrap();
        }

        let backend = SledBackend::open(dir.path()).unwrap();
        assert_eq!(backend.get("k").unwrap(), Some(record("v", 9)));
        assert_eq!(backend.max_version().unwrap(), 9);
        assert_eq!(backend.len().unwrap(), 2);
    }
}
