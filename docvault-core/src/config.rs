//! Store configuration
//!
//! Controls where collection files live, how long a transaction waits for a
//! file lock, and what happens when a collection file cannot be decoded.
//!
//! # Examples
//!
//! ```rust
//! use docvault_core::{DecodePolicy, StoreConfig};
//! use std::time::Duration;
//!
//! // Defaults: ./data, 5s lock timeout, 50ms poll, lenient decoding
//! let config = StoreConfig::default();
//!
//! // Stricter setup for tooling that must never discard data
//! let config = StoreConfig::new("/var/lib/studio/data")
//!     .with_lock_timeout(Duration::from_secs(2))
//!     .with_decode_policy(DecodePolicy::Strict);
//! ```

use crate::error::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub const ENV_DATA_DIR: &str = "DOCVAULT_DATA_DIR";
pub const ENV_LOCK_TIMEOUT_MS: &str = "DOCVAULT_LOCK_TIMEOUT_MS";
pub const ENV_POLL_INTERVAL_MS: &str = "DOCVAULT_POLL_INTERVAL_MS";
pub const ENV_DECODE_POLICY: &str = "DOCVAULT_DECODE_POLICY";

/// What a transaction does with a collection file that does not decode
///
/// - **Lenient**: log loudly, continue with an empty collection. The next
///   committed write replaces the unreadable content. Keeps the service up.
/// - **Strict**: fail with `VaultError::Corruption` and leave the file alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecodePolicy {
    #[default]
    Lenient,
    Strict,
}

impl DecodePolicy {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(DecodePolicy::Lenient),
            "strict" => Ok(DecodePolicy::Strict),
            other => Err(VaultError::InvalidConfig(format!(
                "decode policy must be 'lenient' or 'strict', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one `<name>.json` file per collection
    pub data_dir: PathBuf,

    /// Upper bound on waiting for a collection's lock. Zero means one attempt.
    #[serde(with = "millis")]
    pub lock_timeout: Duration,

    /// Delay between lock attempts
    #[serde(with = "millis")]
    pub poll_interval: Duration,

    pub decode_policy: DecodePolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            decode_policy: DecodePolicy::default(),
        }
    }
}

impl StoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        StoreConfig {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..StoreConfig::default()
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_decode_policy(mut self, policy: DecodePolicy) -> Self {
        self.decode_policy = policy;
        self
    }

    /// Defaults overlaid with the `DOCVAULT_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`StoreConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = StoreConfig::default();

        if let Some(dir) = lookup(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_LOCK_TIMEOUT_MS) {
            config.lock_timeout = parse_millis(ENV_LOCK_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            config.poll_interval = parse_millis(ENV_POLL_INTERVAL_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_DECODE_POLICY) {
            config.decode_policy = DecodePolicy::parse(&raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(VaultError::InvalidConfig(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(VaultError::InvalidConfig(
                "data directory must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| VaultError::InvalidConfig(format!("{}='{}': {}", key, raw, e)))
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = StoreConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.lock_timeout, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.decode_policy, DecodePolicy::Lenient);
    }

    #[test]
    fn test_env_overlay() {
        let config = StoreConfig::from_lookup(lookup_from(&[
            (ENV_DATA_DIR, "/srv/vault"),
            (ENV_LOCK_TIMEOUT_MS, "1500"),
            (ENV_POLL_INTERVAL_MS, "10"),
            (ENV_DECODE_POLICY, "STRICT"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/vault"));
        assert_eq!(config.lock_timeout, Duration::from_millis(1500));
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert_eq!(config.decode_policy, DecodePolicy::Strict);
    }

    #[test]
    fn test_env_rejects_garbage() {
        let err = StoreConfig::from_lookup(lookup_from(&[(ENV_LOCK_TIMEOUT_MS, "soon")]))
            .unwrap_err();
        assert!(matches!(err, VaultError::InvalidConfig(_)));

        let err = StoreConfig::from_lookup(lookup_from(&[(ENV_DECODE_POLICY, "yolo")]))
            .unwrap_err();
        assert!(matches!(err, VaultError::InvalidConfig(_)));
    }

    #[test]
    fn test_zero_poll_interval_is_invalid() {
        let config = StoreConfig::default().with_poll_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"data_dir": "x", "lock_timeout": 250}"#).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("x"));
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
    }
}
