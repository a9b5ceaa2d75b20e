//! Per-node versioned storage
//!
//! Each node owns exactly one [`VersionedStore`]. It maps keys to the latest
//! [`Record`] it accepted and hands out fresh versions for locally
//! coordinated writes. Other nodes only reach it through the replication
//! endpoint, which applies writes with an explicit version.

pub mod backend;

pub use backend::{MemoryBackend, StorageBackend};

#[cfg(feature = "sled-backend")]
pub use backend::SledBackend;

use crate::common::{validate_key, BackendKind, Error, Result, StorageConfig};
use serde::{Deserialize, Serialize};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A value stored under a version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub value: String,
    pub version: u64,
}

struct StoreState {
    /// Never decreases, always >= every stored version
    counter: u64,
    backend: Box<dyn StorageBackend>,
}

/// Key to (value, version) map guarded by a single reader/writer lock
pub struct VersionedStore {
    state: RwLock<StoreState>,
}

impl VersionedStore {
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(StoreState {
                counter: 0,
                backend: Box::new(MemoryBackend::new()),
            }),
        }
    }

    /// Wrap an existing backend, seeding the counter from what it already holds
    pub fn with_backend(backend: Box<dyn StorageBackend>) -> Result<Self> {
        let counter = backend.max_version()?;
        Ok(Self {
            state: RwLock::new(StoreState { counter, backend }),
        })
    }

    /// Open the backend named in the storage configuration
    pub fn open(config: &StorageConfig) -> Result<Self> {
        match config.backend {
            BackendKind::Memory => Ok(Self::in_memory()),
            #[cfg(feature = "sled-backend")]
            BackendKind::Sled => {
                let path = config.path.as_deref().ok_or_else(|| {
                    Error::InvalidConfig("storage.path is required for the sled backend".into())
                })?;
                Self::with_backend(Box::new(SledBackend::open(path)?))
            }
            #[cfg(not(feature = "sled-backend"))]
            BackendKind::Sled => Err(Error::InvalidConfig(
                "sled backend requested but quorumkv was built without the sled-backend feature"
                    .into(),
            )),
        }
    }

    /// Store `value` under `key`.
    ///
    /// Without `explicit_version` this is a coordinator write: the next
    /// version is assigned from the counter. With it, this is a replicated
    /// write: the given version is stored as-is and the counter only moves
    /// forward. Returns the stored version.
    pub fn put(&self, key: &str, value: &str, explicit_version: Option<u64>) -> Result<u64> {
        validate_key(key)?;
        if explicit_version == Some(0) {
            return Err(Error::InvalidVersion(0));
        }

        let mut state = self.write_state()?;
        let version = match explicit_version {
            None => state
                .counter
                .checked_add(1)
                .ok_or_else(|| Error::Internal("version space exhausted".into()))?,
            Some(v) => v,
        };

        state.backend.put(
            key,
            Record {
                value: value.to_string(),
                version,
            },
        )?;
        state.counter = state.counter.max(version);

        Ok(version)
    }

    /// Latest record for `key`, if any
    pub fn get(&self, key: &str) -> Result<Option<Record>> {
        self.read_state()?.backend.get(key)
    }

    /// Current value of the version counter
    pub fn current_version(&self) -> Result<u64> {
        Ok(self.read_state()?.counter)
    }

    pub fn len(&self) -> Result<usize> {
        self.read_state()?.backend.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| Error::Internal("store lock poisoned".into()))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| Error::Internal("store lock poisoned".into()))
    }
}

impl Default for VersionedStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for VersionedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counter = self.current_version().ok();
        f.debug_struct("VersionedStore")
            .field("counter", &counter)
            .finish_non_exhaustive()
    }
}
