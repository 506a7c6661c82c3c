// docvault-core/src/document.rs
// Singleton documents: one object per file, no id required

use crate::config::StoreConfig;
use crate::error::Result;
use crate::record::Record;
use crate::transaction::{with_document, Commit};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Handle to a file holding one configuration-like record (e.g. office info).
#[derive(Debug, Clone)]
pub struct Document {
    name: String,
    path: PathBuf,
    config: Arc<StoreConfig>,
}

impl Document {
    pub fn new(name: String, path: PathBuf, config: Arc<StoreConfig>) -> Self {
        Document { name, path, config }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` until the document has been written
    pub fn read(&self) -> Result<Option<Record>> {
        with_document(&self.path, &self.config, |doc| Ok(Commit::Skip(doc.take())))
    }

    /// Replace the whole document
    pub fn write(&self, record: Record) -> Result<()> {
        with_document(&self.path, &self.config, |doc| {
            *doc = Some(record);
            Ok(Commit::Write(()))
        })
    }

    /// Read-modify-write in one transaction, starting from an empty object
    /// when the document does not exist yet. A mutator error writes nothing.
    pub fn update<F>(&self, mutator: F) -> Result<Record>
    where
        F: FnOnce(&mut Record) -> Result<()>,
    {
        with_document(&self.path, &self.config, |doc| {
            let record = doc.get_or_insert_with(Record::default);
            mutator(record)?;
            Ok(Commit::Write(record.clone()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaultError;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_document() -> (TempDir, Document) {
        let temp_dir = TempDir::new().unwrap();
        let config = Arc::new(StoreConfig::new(temp_dir.path()));
        let path = temp_dir.path().join("doctor_info.json");
        (temp_dir, Document::new("doctor_info".to_string(), path, config))
    }

    #[test]
    fn test_read_missing_is_none() {
        let (_temp, doc) = create_test_document();
        assert!(doc.read().unwrap().is_none());
    }

    #[test]
    fn test_legacy_empty_array_reads_as_none() {
        let (_temp, doc) = create_test_document();
        fs::write(doc.path(), "[]").unwrap();
        assert!(doc.read().unwrap().is_none());
    }

    #[test]
    fn test_write_and_read() {
        let (_temp, doc) = create_test_document();
        let info = Record::from_value(json!({
            "name": "Dott. Giuseppe Verdi",
            "specialization": "Medicina Generale",
            "address": "Via Roma 1, Città"
        }))
        .unwrap();

        doc.write(info.clone()).unwrap();
        assert_eq!(doc.read().unwrap(), Some(info));

        let text = fs::read_to_string(doc.path()).unwrap();
        assert!(text.starts_with('{'));
        assert!(text.contains("Città"));
    }

    #[test]
    fn test_update_creates_then_modifies() {
        let (_temp, doc) = create_test_document();

        doc.update(|r| {
            r.set("phone", json!("06 1234567"));
            Ok(())
        })
        .unwrap();
        let updated = doc
            .update(|r| {
                r.set("email", json!("studio@example.com"));
                Ok(())
            })
            .unwrap();

        assert_eq!(updated.get_str("phone"), Some("06 1234567"));
        assert_eq!(updated.get_str("email"), Some("studio@example.com"));
    }

    #[test]
    fn test_update_rejection_writes_nothing() {
        let (_temp, doc) = create_test_document();
        let result = doc.update(|r| {
            r.set("phone", json!("x"));
            Err(VaultError::Rejected("invalid phone".into()))
        });
        assert!(matches!(result, Err(VaultError::Rejected(_))));
        assert!(doc.read().unwrap().is_none());
    }
}
