//! Ordered key-value storage seen by the migration and report passes.

use std::collections::BTreeMap;
use std::ops::Bound;

use recfix_error::Result;

/// Ordered key-value store holding records under a common key prefix.
///
/// Iteration is cursor-style so callers can write back between reads without
/// holding a borrow across the scan.
pub trait RecordStore {
    /// Value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`recfix_error::RepairError::Store`] on backend failure.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Overwrite the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`recfix_error::RepairError::Store`] on backend failure.
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// First entry whose key starts with `prefix` and sorts strictly after
    /// `after` (or the first entry under `prefix` when `after` is `None`).
    ///
    /// # Errors
    ///
    /// Returns [`recfix_error::RepairError::Store`] on backend failure.
    fn next_in_prefix(
        &self,
        prefix: &[u8],
        after: Option<&[u8]>,
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>>;
}

/// In-memory [`RecordStore`] backed by a `BTreeMap`.
///
/// Counts writes so callers can check that healthy records were never
/// rewritten.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    write_count: u64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry without counting it as a write.
    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.entries.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of [`RecordStore::set`] calls since creation.
    #[must_use]
    pub const fn write_count(&self) -> u64 {
        self.write_count
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_slice(), value.as_slice()))
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write_count += 1;
        self.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn next_in_prefix(
        &self,
        prefix: &[u8],
        after: Option<&[u8]>,
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let lower = match after {
            Some(key) => Bound::Excluded(key.to_vec()),
            None => Bound::Included(prefix.to_vec()),
        };
        Ok(self
            .entries
            .range((lower, Bound::Unbounded))
            .next()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone())))
    }
}

/// Store key of a contract: `prefix` followed by the identity bytes.
#[must_use]
pub fn contract_key(prefix: &[u8], identity: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + identity.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(identity);
    key
}
