//! Organizer configuration and the configuration error type.
//!
//! Settings are loaded from a TOML file and then resolved into a validated
//! [`Settings`] value that every component receives at construction time.
//!
//! # Configuration File Format
//!
//! ```toml
//! vault_root = "~/Notes"
//! backup_root = "~/backups/Notes"
//! retention_keep = 10
//! model_cache_dir = ".smart-env"
//!
//! # Omit to use the built-in list, set to [] to disable exclusion entirely.
//! exclude_patterns = ["backups", ".git", "*_env"]
//! ```

use crate::exclude::ExcludeMatcher;
use crate::path_guard;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".vault-organizer.toml";

/// Errors caused by an invalid configuration. Always fatal, raised before any
/// filesystem mutation takes place.
#[derive(Debug, Clone)]
pub enum ConfigurationError {
    /// The backup root resolves to the vault itself or a directory inside it.
    NestedBackupRoot {
        vault_root: PathBuf,
        backup_root: PathBuf,
        suggestion: PathBuf,
    },
    /// No external location could be derived for the default backup root.
    NoExternalBackupRoot(PathBuf),
    /// No vault root was configured.
    MissingVaultRoot,
    /// The vault root does not exist or is not a directory.
    VaultNotFound(PathBuf),
    /// A retention count of zero would delete every snapshot.
    InvalidRetention(usize),
    /// Configuration file not found at the specified path.
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    ConfigInvalid(String),
    /// Invalid glob pattern in the exclude list.
    InvalidGlobPattern {
        /// The pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },
    /// IO error while reading configuration or resolving a path.
    IoError(String),
}

impl ConfigurationError {
    /// A one-line suggestion for fixing the problem, if there is one.
    pub fn remedy(&self) -> Option<String> {
        match self {
            Self::NestedBackupRoot { suggestion, .. } => Some(format!(
                "Point backup_root outside the vault, e.g. --backup-root {}",
                suggestion.display()
            )),
            Self::NoExternalBackupRoot(_) => {
                Some("Set backup_root explicitly to a directory outside the vault".to_string())
            }
            Self::MissingVaultRoot => Some(format!(
                "Pass --vault <path> or set vault_root in {}",
                LOCAL_CONFIG_FILE
            )),
            Self::VaultNotFound(_) => Some("Check the vault_root path for typos".to_string()),
            Self::InvalidRetention(_) => Some("Use a retention count of 1 or more".to_string()),
            Self::ConfigInvalid(_) | Self::InvalidGlobPattern { .. } => {
                Some("Fix the configuration file and run the command again".to_string())
            }
            Self::ConfigNotFound(_) | Self::IoError(_) => None,
        }
    }
}

impl std::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NestedBackupRoot {
                vault_root,
                backup_root,
                suggestion,
            } => write!(
                f,
                "Backup root {} is inside the vault {}; backups would recursively copy themselves. \
                 Use an external location such as {}",
                backup_root.display(),
                vault_root.display(),
                suggestion.display()
            ),
            Self::NoExternalBackupRoot(vault_root) => write!(
                f,
                "Could not derive a default backup root outside the vault {}",
                vault_root.display()
            ),
            Self::MissingVaultRoot => write!(f, "No vault root configured"),
            Self::VaultNotFound(path) => {
                write!(f, "Vault root is not a directory: {}", path.display())
            }
            Self::InvalidRetention(count) => {
                write!(f, "Invalid retention count {}: must keep at least 1", count)
            }
            Self::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            Self::ConfigInvalid(msg) => write!(f, "Invalid configuration: {}", msg),
            Self::InvalidGlobPattern { pattern, reason } => {
                write!(f, "Invalid exclude pattern '{}': {}", pattern, reason)
            }
            Self::IoError(msg) => write!(f, "IO error reading configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Raw configuration as written in the TOML file.
///
/// Every field is optional; [`OrganizerConfig::resolve`] fills in defaults and
/// validates the result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrganizerConfig {
    /// Root directory of the vault. Required after CLI overrides are applied.
    pub vault_root: Option<PathBuf>,
    /// Where snapshots are written. Defaults to `~/backups/{vault_name}/`.
    pub backup_root: Option<PathBuf>,
    /// Exclude patterns. `None` selects the defaults, an empty list disables exclusion.
    pub exclude_patterns: Option<Vec<String>>,
    /// Number of snapshots to keep after each backup.
    pub retention_keep: Option<usize>,
    /// Embedding/model cache directory name added to the default exclude set.
    pub model_cache_dir: Option<String>,
}

impl OrganizerConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.vault-organizer.toml` in the current directory
    /// 3. Look for `vault-organizer/config.toml` in the user config directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read,
    /// or if any discovered file is not valid TOML.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigurationError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("vault-organizer").join("config.toml");
            if user_config.exists() {
                return Self::load_from_file(&user_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigurationError> {
        if !path.exists() {
            return Err(ConfigurationError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigurationError::IoError(format!("{}: {}", path.display(), e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigurationError> {
        toml::from_str(content).map_err(|e| ConfigurationError::ConfigInvalid(e.to_string()))
    }

    /// Applies command-line overrides on top of the file values.
    pub fn with_overrides(mut self, vault_root: Option<PathBuf>, backup_root: Option<PathBuf>) -> Self {
        if vault_root.is_some() {
            self.vault_root = vault_root;
        }
        if backup_root.is_some() {
            self.backup_root = backup_root;
        }
        self
    }

    /// Validates the configuration and fills in defaults.
    ///
    /// The nesting check between vault and backup root is left to
    /// [`crate::backup::BackupEngine::new`], so read-only commands still work
    /// with a misconfigured backup root.
    pub fn resolve(self) -> Result<Settings, ConfigurationError> {
        let raw_vault = self
            .vault_root
            .ok_or(ConfigurationError::MissingVaultRoot)?;
        let raw_vault = path_guard::expand_home(&raw_vault);
        if !raw_vault.is_dir() {
            return Err(ConfigurationError::VaultNotFound(raw_vault));
        }
        let vault_root = fs::canonicalize(&raw_vault)
            .map_err(|e| ConfigurationError::IoError(format!("{}: {}", raw_vault.display(), e)))?;
        let vault_name = path_guard::vault_name(&vault_root);

        let backup_root = match self.backup_root {
            Some(path) => path_guard::expand_home(&path),
            None => path_guard::default_backup_root(&vault_root)?,
        };

        let retention_keep = self.retention_keep.map(validate_retention).transpose()?;

        let exclude = match self.exclude_patterns {
            Some(patterns) => ExcludeMatcher::new(&patterns)?,
            None => ExcludeMatcher::with_defaults(self.model_cache_dir.as_deref()),
        };

        Ok(Settings {
            vault_root,
            vault_name,
            backup_root,
            exclude,
            retention_keep,
        })
    }
}

/// Fully resolved settings shared by the CLI handlers.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Canonical vault root.
    pub vault_root: PathBuf,
    /// Final component of the vault root, used in snapshot names.
    pub vault_name: String,
    /// Directory holding snapshots and the move history.
    pub backup_root: PathBuf,
    /// Compiled exclude patterns.
    pub exclude: ExcludeMatcher,
    /// Snapshots kept by auto-pruning, if enabled.
    pub retention_keep: Option<usize>,
}

/// Rejects retention counts that would delete every snapshot.
pub fn validate_retention(keep: usize) -> Result<usize, ConfigurationError> {
    if keep == 0 {
        return Err(ConfigurationError::InvalidRetention(keep));
    }
    Ok(keep)
}
