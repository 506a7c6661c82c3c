//! Collection codec: the on-disk text form of collections and singleton documents.
//!
//! # Format
//!
//! ```text
//! [
//!     {
//!         "id": "65a1f0c2b3d4e.9f3c2a1b4d5e6f70",
//!         "name": "Niccolò",
//!         "quantity": 5
//!     }
//! ]
//! ```
//!
//! Four-space pretty printing, non-ASCII written verbatim, record field order
//! preserved. A singleton document is a bare object instead of an array.
//!
//! # Decoding
//!
//! Zero-length or whitespace-only content is the empty value. Anything else
//! that fails to parse is handled according to [`DecodePolicy`]: lenient
//! decoding logs a warning and substitutes the empty value, strict decoding
//! fails with `VaultError::Corruption`. A collection that is a valid JSON
//! array with some non-object entries keeps its objects under lenient decoding;
//! only the bad entries are logged and dropped.

use crate::config::DecodePolicy;
use crate::error::{Result, VaultError};
use crate::log_warn;
use crate::record::Record;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::path::Path;

const INDENT: &[u8] = b"    ";

/// A value that lives in one file and moves through a transaction
pub trait Stored: Sized {
    /// Value of a missing, empty or (leniently) unreadable file
    fn empty() -> Self;

    /// Parse non-blank content. `Err` carries a human-readable reason.
    fn parse(bytes: &[u8]) -> std::result::Result<Self, String>;

    /// Best-effort recovery used by lenient decoding when `parse` fails.
    /// `None` means nothing is salvageable and the empty value is used.
    fn salvage(_bytes: &[u8], _path: &Path) -> Option<Self> {
        None
    }

    fn encode(&self) -> Result<Vec<u8>>;
}

/// An ordered collection of records
impl Stored for Vec<Record> {
    fn empty() -> Self {
        Vec::new()
    }

    fn parse(bytes: &[u8]) -> std::result::Result<Self, String> {
        match serde_json::from_slice::<Value>(bytes).map_err(|e| e.to_string())? {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    Record::from_value(item).map_err(|e| format!("entry {}: {}", index, e))
                })
                .collect(),
            _ => Err("top-level value is not an array".to_string()),
        }
    }

    /// A well-formed array keeps its object entries; other entries are dropped
    fn salvage(bytes: &[u8], path: &Path) -> Option<Self> {
        let items = match serde_json::from_slice::<Value>(bytes).ok()? {
            Value::Array(items) => items,
            _ => return None,
        };

        let mut records = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            match Record::from_value(item) {
                Ok(record) => records.push(record),
                Err(e) => log_warn!(
                    "Dropping entry {} of {}: {}; it will be removed on next write",
                    index,
                    path.display(),
                    e
                ),
            }
        }
        Some(records)
    }

    fn encode(&self) -> Result<Vec<u8>> {
        to_pretty_bytes(self)
    }
}

/// A singleton document; `None` until first written
impl Stored for Option<Record> {
    fn empty() -> Self {
        None
    }

    fn parse(bytes: &[u8]) -> std::result::Result<Self, String> {
        match serde_json::from_slice::<Value>(bytes).map_err(|e| e.to_string())? {
            Value::Object(fields) => Ok(Some(Record::from_map(fields))),
            // Bootstrapped-as-collection files hold `[]`; a one-element array
            // is accepted for the same reason
            Value::Array(items) if items.is_empty() => Ok(None),
            Value::Array(mut items) if items.len() == 1 => match items.pop() {
                Some(Value::Object(fields)) => Ok(Some(Record::from_map(fields))),
                _ => Err("single array entry is not an object".to_string()),
            },
            _ => Err("top-level value is not an object".to_string()),
        }
    }

    fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Some(record) => to_pretty_bytes(record),
            None => Ok(Vec::new()),
        }
    }
}

/// Decode file content read from `path`.
pub fn decode<T: Stored>(bytes: &[u8], path: &Path, policy: DecodePolicy) -> Result<T> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::empty());
    }

    match T::parse(bytes) {
        Ok(value) => Ok(value),
        Err(reason) => match policy {
            DecodePolicy::Lenient => {
                if let Some(salvaged) = T::salvage(bytes, path) {
                    return Ok(salvaged);
                }
                log_warn!(
                    "DECODE FALLBACK: {} is unreadable ({}); treating as empty, {} bytes will be \
                     discarded on next write",
                    path.display(),
                    reason,
                    bytes.len()
                );
                Ok(T::empty())
            }
            DecodePolicy::Strict => Err(VaultError::Corruption {
                path: path.to_path_buf(),
                reason,
            }),
        },
    }
}

/// Encode for writing; always ends with a newline when non-empty.
pub fn encode<T: Stored>(value: &T) -> Result<Vec<u8>> {
    value.encode()
}

fn to_pretty_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(256);
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    value
        .serialize(&mut serializer)
        .map_err(|e| VaultError::Serialization(e.to_string()))?;
    buf.push(b'\n');
    Ok(buf)
}
