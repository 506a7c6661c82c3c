// docvault-core/src/collection.rs
// Record store operations over one collection file

use crate::config::StoreConfig;
use crate::error::{Result, VaultError};
use crate::id::generate_id;
use crate::record::{Record, ID_FIELD};
use crate::transaction::{with_collection, Commit};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Handle to one collection file.
///
/// Cheap to clone and holds no open file: every operation is its own
/// transaction, so handles can be shared freely between threads, and
/// separate processes using the same path are serialized by the file lock.
#[derive(Debug, Clone)]
pub struct Collection {
    name: String,
    path: PathBuf,
    config: Arc<StoreConfig>,
}

impl Collection {
    pub fn new(name: String, path: PathBuf, config: Arc<StoreConfig>) -> Self {
        Collection { name, path, config }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in file order
    pub fn list(&self) -> Result<Vec<Record>> {
        self.transact(|records| Ok(Commit::Skip(std::mem::take(records))))
    }

    pub fn count(&self) -> Result<usize> {
        self.transact(|records| Ok(Commit::Skip(records.len())))
    }

    pub fn find(&self, id: &str) -> Result<Option<Record>> {
        self.transact(|records| {
            Ok(Commit::Skip(records.iter().find(|r| r.has_id(id)).cloned()))
        })
    }

    /// Append `record`. Fails with `DuplicateId` if its id is taken.
    pub fn insert(&self, record: Record) -> Result<Record> {
        let id = record.require_id()?.to_string();

        self.transact(|records| {
            if records.iter().any(|r| r.has_id(&id)) {
                return Err(VaultError::DuplicateId(id));
            }
            records.push(record.clone());
            Ok(Commit::Write(record))
        })
    }

    /// Insert `fields` under a freshly generated id, placed first in the record.
    /// An `id` already present in `fields` is ignored.
    pub fn insert_new(&self, fields: Map<String, Value>) -> Result<Record> {
        let mut record = Record::new(generate_id());
        record.merge(fields);
        self.insert(record)
    }

    /// Apply `mutator` to the record with `id` and persist it.
    ///
    /// The mutator sees the stored record and may refuse by returning an error
    /// (typically `VaultError::Rejected`); nothing is written in that case.
    /// Changing or removing `id` is refused with `InvalidRecord`.
    pub fn update_where<F>(&self, id: &str, mutator: F) -> Result<Record>
    where
        F: FnOnce(&mut Record) -> Result<()>,
    {
        self.transact(|records| {
            let record = records
                .iter_mut()
                .find(|r| r.has_id(id))
                .ok_or_else(|| VaultError::NotFound(id.to_string()))?;

            mutator(record)?;

            if !record.has_id(id) {
                return Err(VaultError::InvalidRecord(format!(
                    "mutator changed '{}' of record '{}'",
                    ID_FIELD, id
                )));
            }
            Ok(Commit::Write(record.clone()))
        })
    }

    /// Remove the record with `id`, keeping the order of the others.
    pub fn remove_where(&self, id: &str) -> Result<Record> {
        self.transact(|records| {
            let position = records
                .iter()
                .position(|r| r.has_id(id))
                .ok_or_else(|| VaultError::NotFound(id.to_string()))?;
            Ok(Commit::Write(records.remove(position)))
        })
    }

    /// Remove every record matching `predicate` in one transaction.
    /// Returns the removed records; survivors keep their order. No match, no write.
    pub fn remove_all_where<P>(&self, mut predicate: P) -> Result<Vec<Record>>
    where
        P: FnMut(&Record) -> bool,
    {
        self.transact(|records| {
            let (removed, kept): (Vec<Record>, Vec<Record>) =
                std::mem::take(records).into_iter().partition(|r| predicate(r));

            *records = kept;
            if removed.is_empty() {
                Ok(Commit::Skip(removed))
            } else {
                Ok(Commit::Write(removed))
            }
        })
    }

    /// Run `f` as one transaction over the whole collection, for changes that
    /// touch several records at once.
    pub fn transact<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Record>) -> Result<Commit<T>>,
    {
        with_collection(&self.path, &self.config, f)
    }
}
