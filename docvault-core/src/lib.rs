// docvault-core/src/lib.rs
// File-backed JSON document store, safe for concurrent request handlers

//! Each collection is one JSON array on disk. Every operation is a single
//! locked read-modify-write transaction on that file, so independent threads
//! and processes can share a data directory without a database server.
//!
//! ```rust,no_run
//! use docvault_core::{collections, Store, VaultError};
//! use serde_json::json;
//!
//! let store = Store::open_dir("data")?;
//! let inventory = store.collection(collections::INVENTORY)?;
//!
//! let med = inventory.insert_new(
//!     json!({"name": "Tachipirina", "quantity": 5}).as_object().cloned().unwrap_or_default(),
//! )?;
//! let id = med.id().unwrap_or_default().to_string();
//!
//! inventory.update_where(&id, |r| {
//!     let qty = r.get_i64("quantity").unwrap_or(0);
//!     if qty <= 0 {
//!         return Err(VaultError::Rejected("out of stock".into()));
//!     }
//!     r.set("quantity", json!(qty - 1));
//!     Ok(())
//! })?;
//! # Ok::<(), VaultError>(())
//! ```

pub mod codec;
pub mod collection;
pub mod config;
pub mod document;
pub mod error;
pub mod id;
pub mod lock;
pub mod logging;
pub mod record;
pub mod store;
pub mod transaction;

// Public exports
pub use collection::Collection;
pub use config::{DecodePolicy, StoreConfig};
pub use document::Document;
pub use error::{Result, VaultError};
pub use id::generate_id;
pub use lock::FileLock;
pub use logging::{get_log_level, init_from_env, set_log_level, LogLevel};
pub use record::Record;
pub use store::{collections, documents, Store};
pub use transaction::{with_collection, with_document, Commit};
