//! Per-user key/value storage with optimistic versioning.

use std::collections::{HashMap, HashSet};

use arcade_core::messages::{StorageKey, StorageKeyVersion, StorageObject, StorageWriteItem};
use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Version value meaning "the record must not exist yet".
pub const VERSION_NONE: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
    #[error("{bucket}/{collection}/{record} appears more than once in one write")]
    DuplicateKey {
        bucket: String,
        collection: String,
        record: String,
    },
    #[error("version check failed for {bucket}/{collection}/{record}")]
    VersionMismatch {
        bucket: String,
        collection: String,
        record: String,
    },
}

/// Backend holding storage records.
///
/// Writes and removes apply to the whole batch or not at all.
pub trait StorageEngine: Send + Sync {
    /// Fetch records; missing ones are left out. Keys without an owner
    /// default to `caller`.
    fn fetch(&self, caller: &str, keys: &[StorageKey]) -> Result<Vec<StorageObject>, StorageError>;

    /// Write records owned by `caller`.
    fn write(
        &self,
        caller: &str,
        items: &[StorageWriteItem],
    ) -> Result<Vec<StorageKeyVersion>, StorageError>;

    /// Remove records owned by `caller`.
    fn remove(&self, caller: &str, keys: &[StorageKey]) -> Result<(), StorageError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct RecordKey {
    bucket: String,
    collection: String,
    record: String,
    user_id: String,
}

impl RecordKey {
    fn new(
        bucket: &str,
        collection: &str,
        record: &str,
        user_id: &str,
    ) -> Result<Self, StorageError> {
        let fields = [
            ("bucket", bucket),
            ("collection", collection),
            ("record", record),
        ];
        for (field, value) in fields {
            if value.is_empty() {
                return Err(StorageError::InvalidKey(format!("{field} must not be empty")));
            }
        }
        Ok(Self {
            bucket: bucket.to_owned(),
            collection: collection.to_owned(),
            record: record.to_owned(),
            user_id: user_id.to_owned(),
        })
    }

    fn duplicate(&self) -> StorageError {
        StorageError::DuplicateKey {
            bucket: self.bucket.clone(),
            collection: self.collection.clone(),
            record: self.record.clone(),
        }
    }

    fn mismatch(&self) -> StorageError {
        StorageError::VersionMismatch {
            bucket: self.bucket.clone(),
            collection: self.collection.clone(),
            record: self.record.clone(),
        }
    }
}

#[derive(Clone, Debug)]
struct StoredValue {
    value: Value,
    version: String,
}

/// Hex SHA-256 of the value's JSON encoding.
pub fn version_of(value: &Value) -> String {
    format!("{:x}", Sha256::digest(value.to_string().as_bytes()))
}

/// Storage kept in process memory.
#[derive(Default)]
pub struct MemoryStorage {
    records: Mutex<HashMap<RecordKey, StoredValue>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn check_version(
    key: &RecordKey,
    expected: Option<&str>,
    current: Option<&StoredValue>,
) -> Result<(), StorageError> {
    match (expected, current) {
        (None, _) => Ok(()),
        (Some(VERSION_NONE), None) => Ok(()),
        (Some(VERSION_NONE), Some(_)) => Err(key.mismatch()),
        (Some(v), Some(stored)) if stored.version == v => Ok(()),
        (Some(_), _) => Err(key.mismatch()),
    }
}

impl StorageEngine for MemoryStorage {
    fn fetch(&self, caller: &str, keys: &[StorageKey]) -> Result<Vec<StorageObject>, StorageError> {
        let lookups = keys
            .iter()
            .map(|k| {
                let owner = k.user_id.as_deref().unwrap_or(caller);
                RecordKey::new(&k.bucket, &k.collection, &k.record, owner)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let records = self.records.lock();
        Ok(lookups
            .into_iter()
            .filter_map(|key| {
                let stored = records.get(&key)?;
                Some(StorageObject {
                    value: stored.value.clone(),
                    version: stored.version.clone(),
                    bucket: key.bucket,
                    collection: key.collection,
                    record: key.record,
                    user_id: key.user_id,
                })
            })
            .collect())
    }

    fn write(
        &self,
        caller: &str,
        items: &[StorageWriteItem],
    ) -> Result<Vec<StorageKeyVersion>, StorageError> {
        let keys = items
            .iter()
            .map(|i| RecordKey::new(&i.bucket, &i.collection, &i.record, caller))
            .collect::<Result<Vec<_>, _>>()?;

        // Version checks see the state before the batch, so a key may appear once.
        let mut seen = HashSet::with_capacity(keys.len());
        if let Some(dup) = keys.iter().find(|key| !seen.insert(*key)) {
            return Err(dup.duplicate());
        }

        let mut records = self.records.lock();
        for (key, item) in keys.iter().zip(items) {
            check_version(key, item.version.as_deref(), records.get(key))?;
        }

        let mut written = Vec::with_capacity(items.len());
        for (key, item) in keys.into_iter().zip(items) {
            let version = version_of(&item.value);
            written.push(StorageKeyVersion {
                bucket: key.bucket.clone(),
                collection: key.collection.clone(),
                record: key.record.clone(),
                user_id: key.user_id.clone(),
                version: version.clone(),
            });
            let _ = records.insert(
                key,
                StoredValue {
                    value: item.value.clone(),
                    version,
                },
            );
        }
        Ok(written)
    }

    fn remove(&self, caller: &str, keys: &[StorageKey]) -> Result<(), StorageError> {
        let targets = keys
            .iter()
            .map(|k| RecordKey::new(&k.bucket, &k.collection, &k.record, caller))
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = self.records.lock();
        for (key, spec) in targets.iter().zip(keys) {
            if let Some(expected) = spec.version.as_deref() {
                if expected == VERSION_NONE {
                    return Err(key.mismatch());
                }
                check_version(key, Some(expected), records.get(key))?;
            }
        }
        for key in &targets {
            let _ = records.remove(key);
        }
        Ok(())
    }
}
