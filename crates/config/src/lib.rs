//! Layered configuration for shelf.
//!
//! Values are merged from the following sources, lowest priority first:
//! 1. Built-in defaults, with paths under the platform data directory.
//! 2. A configuration file: either the one passed explicitly, or any of
//!    `shelf.toml`, `shelf.yaml` and `shelf.json` found in the platform
//!    config directory.
//! 3. Environment variables prefixed with `SHELF_`, nested with `__`
//!    (`SHELF_PRIMARY__ENABLED=false`, `SHELF_FALLBACK__PATH=/srv/slots`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Primary store path that selects an in-memory database.
pub const IN_MEMORY: &str = ":memory:";
const ENV_PREFIX: &str = "SHELF_";
const FILE_STEM: &str = "shelf";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub primary: PrimaryConfig,
    pub fallback: FallbackConfig,
    /// Move legacy records out of the fallback slot when the library opens.
    pub migrate_on_startup: bool,
}

/// Transactional (SQLite) store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryConfig {
    /// When disabled, the library runs on the fallback slot alone.
    pub enabled: bool,
    /// Database file, or [`IN_MEMORY`].
    pub path: PathBuf,
}

/// Flat slot store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Directory holding one file per slot.
    pub path: PathBuf,
    /// Drop every write to the slot store (logged, never an error).
    pub read_only: bool,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", FILE_STEM)
}

fn data_dir() -> PathBuf {
    match project_dirs() {
        Some(dirs) => dirs.data_dir().to_path_buf(),
        // No home directory to speak of (containers, CI). Still absolute.
        None => std::env::temp_dir().join(FILE_STEM),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary: PrimaryConfig::default(),
            fallback: FallbackConfig::default(),
            migrate_on_startup: true,
        }
    }
}
impl Default for PrimaryConfig {
    fn default() -> Self {
        Self { enabled: true, path: data_dir().join("shelf.db") }
    }
}
impl Default for FallbackConfig {
    fn default() -> Self {
        Self { path: data_dir().join("slots"), read_only: false }
    }
}

impl PrimaryConfig {
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == IN_MEMORY
    }
}

impl Config {
    /// Build the layered figment without extracting it.
    ///
    /// With an explicit `file`, the platform config directory is not
    /// searched.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match file {
            Some(file) => {
                if !file.is_file() {
                    exn::bail!(ErrorKind::Invalid(format!("config file `{}` does not exist", file.display())));
                }
                figment = Self::merge_file(figment, file)?;
            },
            None => {
                if let Some(dirs) = project_dirs() {
                    for extension in ["toml", "yaml", "json"] {
                        let candidate = dirs.config_dir().join(format!("{FILE_STEM}.{extension}"));
                        if candidate.is_file() {
                            figment = Self::merge_file(figment, &candidate)?;
                        }
                    }
                }
            },
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    fn merge_file(figment: Figment, file: &Path) -> Result<Figment> {
        tracing::debug!(path = %file.display(), "Loading configuration file");
        Ok(match file.extension().and_then(|e| e.to_str()) {
            Some("toml") => figment.merge(Toml::file_exact(file)),
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(file)),
            Some("json") => figment.merge(Json::file_exact(file)),
            _ => exn::bail!(ErrorKind::Invalid(format!(
                "config file `{}` must be .toml, .yaml or .json",
                file.display()
            ))),
        })
    }

    /// Extract and validate configuration from a prepared figment.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from every layer (see the crate documentation).
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::from_figment(&Self::figment(file)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.fallback.path.is_absolute() {
            exn::bail!(ErrorKind::Invalid(format!(
                "fallback.path `{}` must be absolute",
                self.fallback.path.display()
            )));
        }
        if self.primary.path.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("primary.path must not be empty".to_string()));
        }
        if !self.primary.is_in_memory() && !self.primary.path.is_absolute() {
            exn::bail!(ErrorKind::Invalid(format!(
                "primary.path `{}` must be absolute or `{IN_MEMORY}`",
                self.primary.path.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert!(config.primary.enabled);
        assert!(!config.fallback.read_only);
        assert!(config.migrate_on_startup);
        assert!(config.primary.path.ends_with("shelf.db"));
        assert!(config.fallback.path.ends_with("slots"));
    }

    #[rstest]
    #[case::toml("shelf.toml", "migrate_on_startup = false\n[primary]\nenabled = false\n[fallback]\npath = \"/srv/shelf\"\n")]
    #[case::yaml("shelf.yaml", "migrate_on_startup: false\nprimary:\n  enabled: false\nfallback:\n  path: /srv/shelf\n")]
    #[case::json("shelf.json", r#"{"migrate_on_startup":false,"primary":{"enabled":false},"fallback":{"path":"/srv/shelf"}}"#)]
    fn test_load_file(#[case] name: &str, #[case] contents: &str) {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = write(temp_dir.path(), name, contents);
        let config = Config::from_figment(&Config::figment(Some(&file)).unwrap()).unwrap();
        assert!(!config.primary.enabled);
        assert!(!config.migrate_on_startup);
        assert_eq!(config.fallback.path, PathBuf::from("/srv/shelf"));
        // Untouched values keep their defaults.
        assert_eq!(config.primary.path, Config::default().primary.path);
        assert!(!config.fallback.read_only);
    }

    #[test]
    fn test_in_memory_primary() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = write(temp_dir.path(), "shelf.toml", "[primary]\npath = \":memory:\"\n");
        let config = Config::from_figment(&Config::figment(Some(&file)).unwrap()).unwrap();
        assert!(config.primary.is_in_memory());
    }

    #[test]
    fn test_later_layers_win() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = write(temp_dir.path(), "shelf.toml", "[fallback]\nread_only = false\n");
        let figment = Config::figment(Some(&file)).unwrap().merge(Serialized::default("fallback.read_only", true));
        assert!(Config::from_figment(&figment).unwrap().fallback.read_only);
    }

    #[test]
    fn test_missing_explicit_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = Config::figment(Some(&temp_dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_unknown_extension() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = write(temp_dir.path(), "shelf.ini", "[primary]\n");
        assert!(matches!(&*Config::figment(Some(&file)).unwrap_err(), ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_malformed_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = write(temp_dir.path(), "shelf.toml", "[primary\nenabled = ");
        let err = Config::from_figment(&Config::figment(Some(&file)).unwrap()).unwrap_err();
        assert_eq!(*err, ErrorKind::Load);
    }

    #[rstest]
    #[case::relative_fallback("relative/slots", "/tmp/shelf.db")]
    #[case::relative_primary("/tmp/slots", "shelf.db")]
    #[case::empty_primary("/tmp/slots", "")]
    fn test_validate_rejects(#[case] fallback: &str, #[case] primary: &str) {
        let mut config = Config::default();
        config.fallback.path = PathBuf::from(fallback);
        config.primary.path = PathBuf::from(primary);
        assert!(matches!(&*config.validate().unwrap_err(), ErrorKind::Invalid(_)));
    }
}
