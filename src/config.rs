// ⚙️ Configuration - defaults → rent-ledger.toml → RENT_LEDGER_* env

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "rent-ledger.toml";

pub const ENV_PREFIX: &str = "RENT_LEDGER_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Owner of new contracts and actor recorded on escalations
    pub actor: String,

    /// `tracing` filter directive; `RUST_LOG` wins when set
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("rent-ledger.db"),
            actor: "local".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Provider chain. An explicit `path` must exist; the default file is optional.
    pub fn figment(path: Option<&Path>) -> Result<Figment, figment::Error> {
        let file = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(figment::Error::from(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                path.to_path_buf()
            }
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        Ok(Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).lowercase(true)))
    }

    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let config: Config = Self::figment(path)?.extract()?;
        tracing::debug!(
            database = %config.database_path.display(),
            actor = %config.actor,
            "configuration loaded"
        );
        Ok(config)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database_path, PathBuf::from("rent-ledger.db"));
        assert_eq!(config.actor, "local");
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database_path = \"/tmp/contracts.db\"").unwrap();
        writeln!(file, "actor = \"admin@example.com\"").unwrap();

        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/contracts.db"));
        assert_eq!(config.actor, "admin@example.com");
        // untouched keys keep their defaults
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");

        let err = Config::load(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_filter = \"rent_ledger=debug\"").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.log_filter, "rent_ledger=debug");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "actor = [not toml").unwrap();

        assert!(Config::load(Some(file.path())).is_err());
    }
}
