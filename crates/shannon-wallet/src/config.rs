//! Wallet configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, an
//! optional TOML file, and `SHANNON__*` environment variables (nested keys
//! separated by `__`, e.g. `SHANNON__RETRY__MAX_ATTEMPTS=5`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use shannon_core::address::Network;
use shannon_core::constants::DEFAULT_FEE;

use crate::coin_selection::{RetryPolicy, DEFAULT_PAGE_LIMIT};
use crate::error::WalletError;
use crate::keystore::{Cipher, Kdf};
use crate::logging::LogFormat;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "SHANNON";

const ENV_SEPARATOR: &str = "__";

/// Keystore encryption settings for newly written files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeystoreConfig {
    pub kdf: Kdf,
    pub cipher: Cipher,
}

/// Configuration for a wallet instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub network: Network,
    /// Flat transaction fee in shannons.
    pub fee: u64,
    /// Cells requested per `get_cells` page.
    pub page_limit: u32,
    pub retry: RetryPolicy,
    pub keystore: KeystoreConfig,
    /// Log level filter string (e.g. "info", "shannon_wallet=debug").
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            fee: DEFAULT_FEE,
            page_limit: DEFAULT_PAGE_LIMIT,
            retry: RetryPolicy::default(),
            keystore: KeystoreConfig::default(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl WalletConfig {
    /// Load `path` layered under the process environment.
    pub fn from_file(path: &Path) -> Result<Self, WalletError> {
        Self::load(Some(path), None)
    }

    /// Defaults layered under the process environment.
    pub fn from_env() -> Result<Self, WalletError> {
        Self::load(None, None)
    }

    /// `env` replaces the process environment when given.
    fn load(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self, WalletError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(env),
        );
        builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| WalletError::Config(e.to_string()))
    }

    /// Default location of the config file (`<config dir>/shannon/config.toml`).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shannon")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::Prf;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shannon.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn defaults() {
        let cfg = WalletConfig::default();
        assert_eq!(cfg.network, Network::Mainnet);
        assert_eq!(cfg.fee, 1_000);
        assert_eq!(cfg.page_limit, 100);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.keystore.kdf, Kdf::Scrypt { n: 262_144, r: 8, p: 1 });
        assert_eq!(cfg.keystore.cipher, Cipher::Aes128Ctr);
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let cfg = WalletConfig::load(None, Some(HashMap::new())).unwrap();
        assert_eq!(cfg, WalletConfig::default());
    }

    #[test]
    fn file_overrides_defaults() {
        let (_dir, path) = write_config(
            r#"
            network = "testnet"
            fee = 2000
            log_format = "json"

            [retry]
            max_attempts = 5

            [keystore]
            cipher = "aes-128-cbc"

            [keystore.kdf]
            kdf = "pbkdf2"
            c = 10000
            prf = "hmac-sha512"
            "#,
        );
        let cfg = WalletConfig::load(Some(&path), Some(HashMap::new())).unwrap();
        assert_eq!(cfg.network, Network::Testnet);
        assert_eq!(cfg.fee, 2_000);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.retry.initial_backoff_ms, RetryPolicy::default().initial_backoff_ms);
        assert_eq!(cfg.keystore.cipher, Cipher::Aes128Cbc);
        assert_eq!(cfg.keystore.kdf, Kdf::Pbkdf2 { c: 10_000, prf: Prf::HmacSha512 });
        assert_eq!(cfg.page_limit, DEFAULT_PAGE_LIMIT);
    }

    #[test]
    fn environment_overrides_file() {
        let (_dir, path) = write_config("fee = 2000\n");
        let env = HashMap::from([
            ("SHANNON__FEE".to_string(), "3000".to_string()),
            ("SHANNON__NETWORK".to_string(), "testnet".to_string()),
            ("SHANNON__RETRY__MAX_ATTEMPTS".to_string(), "7".to_string()),
        ]);
        let cfg = WalletConfig::load(Some(&path), Some(env)).unwrap();
        assert_eq!(cfg.fee, 3_000);
        assert_eq!(cfg.network, Network::Testnet);
        assert_eq!(cfg.retry.max_attempts, 7);
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = WalletConfig::load(Some(&dir.path().join("absent.toml")), None).unwrap_err();
        assert!(matches!(err, WalletError::Config(_)));
    }

    #[test]
    fn invalid_value_is_config_error() {
        let (_dir, path) = write_config("network = \"moonnet\"\n");
        let err = WalletConfig::load(Some(&path), Some(HashMap::new())).unwrap_err();
        assert!(matches!(err, WalletError::Config(_)));
    }

    #[test]
    fn default_path_ends_with_config_toml() {
        let path = WalletConfig::default_path();
        assert!(path.ends_with("shannon/config.toml"));
    }
}
