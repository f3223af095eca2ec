//! Guards against backup roots that live inside the vault.
//!
//! A backup root nested in the vault would be copied into every new snapshot,
//! so each backup would contain all previous ones. Paths are compared after
//! resolving symbolic links, so a symlink pointing back into the vault is
//! rejected as well.

use crate::config::ConfigurationError;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Fallback used when a vault root has no usable final component.
const FALLBACK_VAULT_NAME: &str = "vault";

/// Fails if `backup_root` resolves to `vault_root` or to a directory below it.
///
/// Neither path has to exist. The longest existing ancestor of each path is
/// canonicalized (resolving symlinks) and the remaining components are
/// appended lexically.
///
/// # Examples
///
/// ```
/// use vault_organizer::path_guard::validate_not_nested;
/// use std::path::Path;
///
/// assert!(validate_not_nested(Path::new("/v"), Path::new("/v/backups")).is_err());
/// assert!(validate_not_nested(Path::new("/v"), Path::new("/other/backups")).is_ok());
/// ```
pub fn validate_not_nested(vault_root: &Path, backup_root: &Path) -> Result<(), ConfigurationError> {
    let resolved_vault = resolve(vault_root)?;
    let resolved_backup = resolve(backup_root)?;

    if resolved_backup.starts_with(&resolved_vault) {
        let suggestion = default_backup_root(&resolved_vault).unwrap_or_else(|_| {
            PathBuf::from("~/backups").join(vault_name(&resolved_vault))
        });
        return Err(ConfigurationError::NestedBackupRoot {
            vault_root: resolved_vault,
            backup_root: resolved_backup,
            suggestion,
        });
    }

    Ok(())
}

/// Returns the default backup root for a vault: `~/backups/{vault_name}/`.
///
/// If the vault itself lives under that location (for example the vault is the
/// home directory), a sibling `{vault_name}-backups` directory is used instead.
pub fn default_backup_root(vault_root: &Path) -> Result<PathBuf, ConfigurationError> {
    let resolved_vault = resolve(vault_root)?;
    let name = vault_name(&resolved_vault);

    let mut candidates = Vec::new();
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join("backups").join(&name));
    }
    if let Some(parent) = resolved_vault.parent() {
        candidates.push(parent.join(format!("{}-backups", name)));
    }

    candidates
        .into_iter()
        .find(|candidate| {
            resolve_path(candidate)
                .map(|resolved| !resolved.starts_with(&resolved_vault))
                .unwrap_or(false)
        })
        .ok_or(ConfigurationError::NoExternalBackupRoot(resolved_vault))
}

/// Resolves a path to an absolute, symlink-free form without requiring it to exist.
pub fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;

    for ancestor in absolute.ancestors() {
        let Ok(canonical) = fs::canonicalize(ancestor) else {
            continue;
        };
        let Ok(rest) = absolute.strip_prefix(ancestor) else {
            continue;
        };

        let mut resolved = canonical;
        for component in rest.components() {
            match component {
                Component::ParentDir => {
                    resolved.pop();
                }
                Component::Normal(part) => resolved.push(part),
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }
        return Ok(resolved);
    }

    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no existing ancestor for {}", path.display()),
    ))
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Name of the vault as used in snapshot names.
pub fn vault_name(vault_root: &Path) -> String {
    vault_root
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_VAULT_NAME.to_string())
}

fn resolve(path: &Path) -> Result<PathBuf, ConfigurationError> {
    resolve_path(path)
        .map_err(|e| ConfigurationError::IoError(format!("{}: {}", path.display(), e)))
}
