//! Server configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! gives a working biller on `0.0.0.0:1850` backed by `biller.db`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use biller_store::CredentialHasher;
use serde::Deserialize;

use crate::ServerError;

/// Configuration for a biller process.
///
/// Loaded from an optional JSON file with [`load`](Self::load); fields
/// missing from the file keep their defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BillerConfig {
    /// Address the zone listener binds to.
    pub bind: String,

    /// Path of the account database. Created with its schema if missing.
    pub database: PathBuf,

    /// Sent to zones in CONNECTOK and CONNECTBAD.
    pub server_name: String,

    /// Sent to zones in CONNECTOK and CONNECTBAD.
    pub network: String,

    /// When set, a zone's CONNECT must carry this password.
    pub zone_password: Option<String>,

    /// How long a new connection has to send CONNECT before it is closed.
    pub connect_timeout_secs: u64,

    /// Argon2 memory cost in KiB for newly registered passwords.
    pub hash_memory_kib: u32,

    /// Argon2 iteration count for newly registered passwords.
    pub hash_iterations: u32,
}

impl Default for BillerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:1850".to_string(),
            database: PathBuf::from("biller.db"),
            server_name: "biller".to_string(),
            network: "zonenet".to_string(),
            zone_password: None,
            connect_timeout_secs: 10,
            hash_memory_kib: 19 * 1024,
            hash_iterations: 2,
        }
    }
}

impl BillerConfig {
    /// Reads a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parses a JSON config document.
    pub fn from_json(raw: &str) -> Result<Self, ServerError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Builds the password hasher for the configured cost.
    pub fn hasher(&self) -> Result<CredentialHasher, ServerError> {
        Ok(CredentialHasher::with_cost(
            self.hash_memory_kib,
            self.hash_iterations,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_listens_on_1850() {
        let config = BillerConfig::default();
        assert_eq!(config.bind, "0.0.0.0:1850");
        assert_eq!(config.database, PathBuf::from("biller.db"));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert!(config.zone_password.is_none());
    }

    #[test]
    fn test_from_json_empty_object_uses_defaults() {
        let config = BillerConfig::from_json("{}").unwrap();
        assert_eq!(config.bind, BillerConfig::default().bind);
        assert_eq!(config.hash_iterations, 2);
    }

    #[test]
    fn test_from_json_partial_overrides_only_given_fields() {
        let config = BillerConfig::from_json(
            r#"{ "bind": "127.0.0.1:9000", "zone_password": "hunter2" }"#,
        )
        .unwrap();

        assert_eq!(config.bind, "127.0.0.1:9000");
        assert_eq!(config.zone_password.as_deref(), Some("hunter2"));
        assert_eq!(config.database, PathBuf::from("biller.db"));
    }

    #[test]
    fn test_from_json_wrong_type_is_parse_error() {
        let result = BillerConfig::from_json(r#"{ "connect_timeout_secs": "soon" }"#);
        assert!(matches!(result, Err(ServerError::ConfigParse(_))));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = BillerConfig::load("/definitely/not/here/biller.json");
        assert!(matches!(result, Err(ServerError::Io(_))));
    }

    #[test]
    fn test_hasher_default_cost_is_valid() {
        assert!(BillerConfig::default().hasher().is_ok());
    }
}
