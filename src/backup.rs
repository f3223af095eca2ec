//! Timestamped vault snapshots stored outside the vault.
//!
//! A snapshot is a plain copy of the vault (minus excluded paths) in
//! `backup_root/{vault_name}-{YYYYMMDD-HHMMSS}[-emergency][-NN]/`. After the copy
//! finishes a `.snapshot.json` marker is written into the snapshot; snapshots
//! without it are reported as incomplete and should not be trusted.

use crate::config::{self, ConfigurationError, Settings};
use crate::exclude::ExcludeMatcher;
use crate::path_guard;
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Completion marker written into every finished snapshot.
pub const SNAPSHOT_MARKER: &str = ".snapshot.json";

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
const TIMESTAMP_LEN: usize = 15;
const EMERGENCY_SUFFIX: &str = "-emergency";
const MAX_SEQUENCE: u32 = 99;

/// Errors raised while creating, restoring or pruning snapshots.
#[derive(Debug)]
pub enum BackupError {
    /// The operating system refused access to a path.
    PermissionDenied { path: PathBuf },
    /// Any other I/O failure.
    Io {
        path: PathBuf,
        action: &'static str,
        source: io::Error,
    },
    /// The requested snapshot does not exist.
    SnapshotNotFound { path: PathBuf },
    /// The requested snapshot contains no files.
    SnapshotEmpty { path: PathBuf },
    /// Invalid arguments, e.g. a retention count of zero.
    Configuration(ConfigurationError),
}

impl BackupError {
    fn io(path: &Path, action: &'static str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            Self::PermissionDenied {
                path: path.to_path_buf(),
            }
        } else {
            Self::Io {
                path: path.to_path_buf(),
                action,
                source,
            }
        }
    }

    fn walk(root: &Path, action: &'static str, error: walkdir::Error) -> Self {
        let path = error.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
        Self::io(&path, action, io::Error::from(error))
    }

    /// A one-line suggestion for fixing the problem, if there is one.
    pub fn remedy(&self) -> Option<String> {
        match self {
            Self::PermissionDenied { path } => Some(format!(
                "Check read/write permissions on {}",
                path.display()
            )),
            Self::Io { .. } => Some("Check free disk space and that the backup root is writable".to_string()),
            Self::SnapshotNotFound { .. } => {
                Some("Run `list-backups` to see available snapshots".to_string())
            }
            Self::SnapshotEmpty { .. } => {
                Some("Pick another snapshot with `list-backups`; this one holds no files".to_string())
            }
            Self::Configuration(e) => e.remedy(),
        }
    }
}

impl std::fmt::Display for BackupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied { path } => {
                write!(f, "Permission denied: {}", path.display())
            }
            Self::Io {
                path,
                action,
                source,
            } => write!(f, "Failed to {} {}: {}", action, path.display(), source),
            Self::SnapshotNotFound { path } => {
                write!(f, "Snapshot not found: {}", path.display())
            }
            Self::SnapshotEmpty { path } => write!(f, "Snapshot is empty: {}", path.display()),
            Self::Configuration(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for BackupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Configuration(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigurationError> for BackupError {
    fn from(e: ConfigurationError) -> Self {
        Self::Configuration(e)
    }
}

/// Result type for snapshot operations.
pub type BackupResult<T> = Result<T, BackupError>;

/// Why a snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    /// Requested by the user.
    Regular,
    /// Taken automatically right before a rollback.
    Emergency,
}

/// A snapshot directory under the backup root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub name: String,
    pub root_path: PathBuf,
    pub kind: SnapshotKind,
    /// Timestamp embedded in the name.
    pub created_at: NaiveDateTime,
    /// Files present in the snapshot, not counting the marker.
    pub file_count: usize,
    /// Files found in the vault when the snapshot was taken. Unknown for incomplete snapshots.
    pub source_file_count: Option<usize>,
    pub size_bytes: u64,
    /// Whether the completion marker is present.
    pub complete: bool,
    /// Sequence number used to disambiguate same-second names (0 for none).
    #[serde(default)]
    pub sequence: u32,
}

impl BackupSnapshot {
    /// True when the copied file count matches the vault's count.
    pub fn counts_match(&self) -> bool {
        self.source_file_count == Some(self.file_count)
    }
}

/// Result of [`BackupEngine::prune_backups`].
#[derive(Debug, Clone, Serialize)]
pub struct PruneReport {
    pub dry_run: bool,
    pub keep: usize,
    pub kept: Vec<String>,
    /// Snapshots deleted, or that would be deleted in a dry run.
    pub deleted: Vec<BackupSnapshot>,
    /// Snapshots without a completion marker. Never counted toward `keep` and never deleted.
    #[serde(default)]
    pub incomplete: Vec<String>,
}

/// Result of [`BackupEngine::rollback`].
#[derive(Debug, Clone, Serialize)]
pub struct RollbackReport {
    pub restored_from: String,
    /// Snapshot of the vault taken right before it was overwritten.
    pub emergency_snapshot: BackupSnapshot,
    pub restored_files: usize,
    /// Files and directories removed because they were not in the snapshot.
    pub removed_entries: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct CopyStats {
    files: usize,
    bytes: u64,
    skipped_links: usize,
}

/// Creates, lists, restores and prunes snapshots for a single vault.
#[derive(Debug, Clone)]
pub struct BackupEngine {
    vault_root: PathBuf,
    vault_name: String,
    backup_root: PathBuf,
    exclude: ExcludeMatcher,
}

impl BackupEngine {
    /// Creates an engine, validating that the backup root is outside the vault.
    ///
    /// No directory is created here; the check fails fast before any I/O
    /// other than path resolution.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::NestedBackupRoot` if `backup_root` is the
    /// vault or lies inside it, and `ConfigurationError::VaultNotFound` if the
    /// vault is not a directory.
    pub fn new(
        vault_root: &Path,
        backup_root: Option<&Path>,
        exclude: ExcludeMatcher,
    ) -> Result<Self, ConfigurationError> {
        let backup_root = match backup_root {
            Some(root) => root.to_path_buf(),
            None => path_guard::default_backup_root(vault_root)?,
        };
        path_guard::validate_not_nested(vault_root, &backup_root)?;

        if !vault_root.is_dir() {
            return Err(ConfigurationError::VaultNotFound(vault_root.to_path_buf()));
        }
        let vault_root = path_guard::resolve_path(vault_root)
            .map_err(|e| ConfigurationError::IoError(e.to_string()))?;

        Ok(Self {
            vault_name: path_guard::vault_name(&vault_root),
            vault_root,
            backup_root,
            exclude,
        })
    }

    /// Creates an engine from resolved settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigurationError> {
        Self::new(
            &settings.vault_root,
            Some(&settings.backup_root),
            settings.exclude.clone(),
        )
    }

    pub fn vault_root(&self) -> &Path {
        &self.vault_root
    }

    pub fn vault_name(&self) -> &str {
        &self.vault_name
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Creates a snapshot named after the current local time.
    pub fn create_backup(&self) -> BackupResult<BackupSnapshot> {
        self.create_backup_at(Local::now().naive_local())
    }

    /// Creates a snapshot named after `timestamp`.
    ///
    /// Snapshots taken within the same second get `-01`, `-02`, ... suffixes.
    pub fn create_backup_at(&self, timestamp: NaiveDateTime) -> BackupResult<BackupSnapshot> {
        self.take_snapshot(timestamp, SnapshotKind::Regular)
    }

    /// Lists this vault's snapshots, newest first.
    ///
    /// Directories under the backup root that do not follow the naming scheme
    /// for this vault are ignored.
    pub fn list_backups(&self) -> BackupResult<Vec<BackupSnapshot>> {
        if !self.backup_root.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.backup_root)
            .map_err(|e| BackupError::io(&self.backup_root, "read backup root", e))?;

        let mut snapshots = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BackupError::io(&self.backup_root, "read backup root", e))?;
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(parsed) = parse_snapshot_name(&self.vault_name, &name) {
                snapshots.push(self.load_snapshot(&name, parsed)?);
            }
        }

        snapshots.sort_by(|a, b| {
            (b.created_at, b.sequence).cmp(&(a.created_at, a.sequence))
        });
        Ok(snapshots)
    }

    /// Finds a snapshot of this vault by directory name.
    pub fn find_snapshot(&self, name: &str) -> BackupResult<BackupSnapshot> {
        self.list_backups()?
            .into_iter()
            .find(|snapshot| snapshot.name == name)
            .ok_or_else(|| BackupError::SnapshotNotFound {
                path: self.backup_root.join(name),
            })
    }

    /// The newest complete snapshot taken on request (not an emergency one).
    pub fn latest_complete_snapshot(&self) -> BackupResult<Option<BackupSnapshot>> {
        Ok(self
            .list_backups()?
            .into_iter()
            .find(|s| s.complete && s.kind == SnapshotKind::Regular))
    }

    /// Restores the vault to the exact contents of `snapshot`.
    ///
    /// An emergency snapshot of the current vault is taken first so the
    /// rollback itself can be undone. Files are then copied back over the
    /// vault, and non-excluded files that are not part of the snapshot are
    /// removed. Excluded paths in the vault (`.git`, ...) are left untouched.
    ///
    /// # Errors
    ///
    /// Fails before touching the vault if the snapshot is missing or empty.
    pub fn rollback(&self, snapshot: &BackupSnapshot) -> BackupResult<RollbackReport> {
        let source = &snapshot.root_path;
        if !source.is_dir() {
            return Err(BackupError::SnapshotNotFound {
                path: source.clone(),
            });
        }
        if snapshot_is_empty(source)? {
            return Err(BackupError::SnapshotEmpty {
                path: source.clone(),
            });
        }

        let emergency = self.take_snapshot(Local::now().naive_local(), SnapshotKind::Emergency)?;
        tracing::info!(snapshot = %emergency.name, "created emergency snapshot before rollback");

        let restored = copy_tree(source, &self.vault_root, |rel| rel == Path::new(SNAPSHOT_MARKER))?;
        let removed = self.remove_extraneous(source)?;

        tracing::info!(
            snapshot = %snapshot.name,
            restored = restored.files,
            removed,
            "rollback finished"
        );

        Ok(RollbackReport {
            restored_from: snapshot.name.clone(),
            emergency_snapshot: emergency,
            restored_files: restored.files,
            removed_entries: removed,
        })
    }

    /// Deletes all but the `keep` newest complete snapshots, ordered by the timestamp in their names.
    ///
    /// Incomplete snapshots are left alone and listed separately. In dry-run
    /// mode nothing is deleted; the report lists what would be.
    pub fn prune_backups(&self, keep: usize, dry_run: bool) -> BackupResult<PruneReport> {
        let keep = config::validate_retention(keep)?;
        let (mut snapshots, incomplete): (Vec<_>, Vec<_>) =
            self.list_backups()?.into_iter().partition(|s| s.complete);
        for snapshot in &incomplete {
            tracing::warn!(snapshot = %snapshot.name, "incomplete snapshot left out of pruning");
        }

        let deleted = if snapshots.len() > keep {
            snapshots.split_off(keep)
        } else {
            Vec::new()
        };

        if !dry_run {
            for snapshot in &deleted {
                fs::remove_dir_all(&snapshot.root_path)
                    .map_err(|e| BackupError::io(&snapshot.root_path, "delete snapshot", e))?;
                tracing::info!(snapshot = %snapshot.name, "pruned snapshot");
            }
        }

        Ok(PruneReport {
            dry_run,
            keep,
            kept: snapshots.into_iter().map(|s| s.name).collect(),
            deleted,
            incomplete: incomplete.into_iter().map(|s| s.name).collect(),
        })
    }

    fn take_snapshot(&self, timestamp: NaiveDateTime, kind: SnapshotKind) -> BackupResult<BackupSnapshot> {
        self.take_snapshot_with(timestamp, kind, |name, root, sequence| {
            self.fill_snapshot(name, root, timestamp, kind, sequence)
        })
    }

    /// Reserves a snapshot directory and fills it with `fill`.
    ///
    /// The directory is removed again if `fill` fails.
    fn take_snapshot_with<F>(
        &self,
        timestamp: NaiveDateTime,
        kind: SnapshotKind,
        fill: F,
    ) -> BackupResult<BackupSnapshot>
    where
        F: FnOnce(&str, &Path, u32) -> BackupResult<BackupSnapshot>,
    {
        fs::create_dir_all(&self.backup_root)
            .map_err(|e| BackupError::io(&self.backup_root, "create backup root", e))?;

        let (name, sequence, root) = self.reserve_snapshot_dir(timestamp, kind)?;

        match fill(&name, &root, sequence) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&root) {
                    tracing::error!(
                        path = %root.display(),
                        error = %cleanup,
                        "failed to remove partial snapshot"
                    );
                }
                Err(e)
            }
        }
    }

    /// Creates the snapshot directory, appending a sequence number on collision.
    fn reserve_snapshot_dir(
        &self,
        timestamp: NaiveDateTime,
        kind: SnapshotKind,
    ) -> BackupResult<(String, u32, PathBuf)> {
        for sequence in 0..=MAX_SEQUENCE {
            let name = snapshot_name(&self.vault_name, timestamp, kind, sequence);
            let root = self.backup_root.join(&name);
            match fs::create_dir(&root) {
                Ok(()) => return Ok((name, sequence, root)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(BackupError::io(&root, "create snapshot directory", e)),
            }
        }

        let name = snapshot_name(&self.vault_name, timestamp, kind, MAX_SEQUENCE);
        Err(BackupError::io(
            &self.backup_root.join(name),
            "create snapshot directory",
            io::Error::new(io::ErrorKind::AlreadyExists, "too many snapshots in one second"),
        ))
    }

    fn fill_snapshot(
        &self,
        name: &str,
        root: &Path,
        timestamp: NaiveDateTime,
        kind: SnapshotKind,
        sequence: u32,
    ) -> BackupResult<BackupSnapshot> {
        let exclude = &self.exclude;
        let skip = |rel: &Path| exclude.should_exclude(rel);
        let copied = copy_tree(&self.vault_root, root, skip)?;
        let source_files = count_source_files(&self.vault_root, skip)?;
        let (file_count, size_bytes) = count_files(root)?;

        if file_count != source_files {
            tracing::warn!(
                snapshot = %name,
                source_files,
                copied_files = file_count,
                "snapshot file count does not match the vault"
            );
        }
        if copied.skipped_links > 0 {
            tracing::warn!(
                snapshot = %name,
                skipped = copied.skipped_links,
                "symlinks were skipped"
            );
        }

        let snapshot = BackupSnapshot {
            name: name.to_string(),
            root_path: root.to_path_buf(),
            kind,
            created_at: timestamp,
            file_count,
            source_file_count: Some(source_files),
            size_bytes,
            complete: true,
            sequence,
        };

        let marker = root.join(SNAPSHOT_MARKER);
        let json = serde_json::to_string_pretty(&snapshot).map_err(|e| {
            BackupError::io(&marker, "write snapshot marker", io::Error::new(io::ErrorKind::InvalidData, e))
        })?;
        fs::write(&marker, json).map_err(|e| BackupError::io(&marker, "write snapshot marker", e))?;

        tracing::info!(
            snapshot = %name,
            files = file_count,
            bytes = copied.bytes,
            "snapshot complete"
        );
        Ok(snapshot)
    }

    fn load_snapshot(&self, name: &str, parsed: SnapshotName) -> BackupResult<BackupSnapshot> {
        let root = self.backup_root.join(name);
        let (file_count, size_bytes) = count_files(&root)?;
        let marker = fs::read_to_string(root.join(SNAPSHOT_MARKER))
            .ok()
            .and_then(|json| serde_json::from_str::<BackupSnapshot>(&json).ok());

        Ok(BackupSnapshot {
            name: name.to_string(),
            root_path: root,
            kind: parsed.kind,
            created_at: parsed.timestamp,
            file_count,
            source_file_count: marker.as_ref().and_then(|m| m.source_file_count),
            size_bytes,
            complete: marker.is_some(),
            sequence: parsed.sequence,
        })
    }

    /// Removes vault entries that are not present in the snapshot.
    ///
    /// Symlinks that snapshots never capture (symlinked directories and
    /// dangling links) are left in place.
    fn remove_extraneous(&self, snapshot_root: &Path) -> BackupResult<usize> {
        let vault_root = &self.vault_root;
        let exclude = &self.exclude;
        let walker = WalkDir::new(vault_root)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                entry
                    .path()
                    .strip_prefix(vault_root)
                    .map(|rel| !exclude.should_exclude(rel))
                    .unwrap_or(true)
            });

        let mut extraneous = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| BackupError::walk(vault_root, "scan vault", e))?;
            let Ok(rel) = entry.path().strip_prefix(vault_root) else {
                continue;
            };
            if fs::symlink_metadata(snapshot_root.join(rel)).is_ok() {
                continue;
            }
            if !is_captured(entry.path(), entry.file_type()) {
                tracing::debug!(path = %entry.path().display(), "kept entry that snapshots do not capture");
                continue;
            }
            extraneous.push((entry.path().to_path_buf(), entry.file_type().is_dir()));
        }

        // Parents precede their children in the walk.
        let mut removed = 0;
        for (path, is_dir) in extraneous.into_iter().rev() {
            if is_dir {
                match fs::remove_dir(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "kept directory that is not in the snapshot"
                    ),
                }
            } else {
                fs::remove_file(&path).map_err(|e| BackupError::io(&path, "remove file", e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SnapshotName {
    timestamp: NaiveDateTime,
    kind: SnapshotKind,
    sequence: u32,
}

/// Builds a snapshot directory name, e.g. `notes-20250101-120000-emergency-01`.
fn snapshot_name(vault_name: &str, timestamp: NaiveDateTime, kind: SnapshotKind, sequence: u32) -> String {
    let mut name = format!("{}-{}", vault_name, timestamp.format(TIMESTAMP_FORMAT));
    if kind == SnapshotKind::Emergency {
        name.push_str(EMERGENCY_SUFFIX);
    }
    if sequence > 0 {
        name.push_str(&format!("-{:02}", sequence));
    }
    name
}

fn parse_snapshot_name(vault_name: &str, name: &str) -> Option<SnapshotName> {
    let rest = name.strip_prefix(vault_name)?.strip_prefix('-')?;
    let timestamp = NaiveDateTime::parse_from_str(rest.get(..TIMESTAMP_LEN)?, TIMESTAMP_FORMAT).ok()?;
    let mut tail = rest.get(TIMESTAMP_LEN..)?;

    let kind = match tail.strip_prefix(EMERGENCY_SUFFIX) {
        Some(after) => {
            tail = after;
            SnapshotKind::Emergency
        }
        None => SnapshotKind::Regular,
    };

    let sequence = if tail.is_empty() {
        0
    } else {
        let digits = tail.strip_prefix('-')?;
        if digits.len() < 2 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()?
    };

    Some(SnapshotName {
        timestamp,
        kind,
        sequence,
    })
}

/// Copies `src` into `dst`, skipping relative paths for which `skip` returns true.
///
/// Symlinks to files are copied as regular files. Dangling symlinks and
/// symlinked directories are skipped with a warning.
fn copy_tree<F>(src: &Path, dst: &Path, skip: F) -> BackupResult<CopyStats>
where
    F: Fn(&Path) -> bool,
{
    let walker = WalkDir::new(src)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry
                .path()
                .strip_prefix(src)
                .map(|rel| !skip(rel))
                .unwrap_or(true)
        });

    let mut stats = CopyStats::default();
    for entry in walker {
        let entry = entry.map_err(|e| BackupError::walk(src, "read", e))?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            ensure_dir(&target)?;
        } else if file_type.is_file() {
            stats.bytes += copy_file(entry.path(), &target)?;
            stats.files += 1;
        } else if file_type.is_symlink() {
            match fs::metadata(entry.path()) {
                Ok(meta) if meta.is_file() => {
                    stats.bytes += copy_file(entry.path(), &target)?;
                    stats.files += 1;
                }
                Ok(_) => {
                    tracing::warn!(path = %entry.path().display(), "skipping symlinked directory");
                    stats.skipped_links += 1;
                }
                Err(_) => {
                    tracing::warn!(path = %entry.path().display(), "skipping dangling symlink");
                    stats.skipped_links += 1;
                }
            }
        } else {
            tracing::debug!(path = %entry.path().display(), "skipping special file");
        }
    }
    Ok(stats)
}

/// Creates `path` as a directory, replacing a file that is in the way.
fn ensure_dir(path: &Path) -> BackupResult<()> {
    if let Ok(meta) = fs::symlink_metadata(path)
        && !meta.is_dir()
    {
        fs::remove_file(path).map_err(|e| BackupError::io(path, "replace file", e))?;
    }
    fs::create_dir_all(path).map_err(|e| BackupError::io(path, "create directory", e))
}

/// Copies one file, replacing whatever is at `target`. Returns the bytes copied.
fn copy_file(source: &Path, target: &Path) -> BackupResult<u64> {
    if let Some(parent) = target.parent() {
        ensure_dir(parent)?;
    }
    match fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => {
            fs::remove_dir_all(target).map_err(|e| BackupError::io(target, "replace directory", e))?;
        }
        Ok(meta) if meta.file_type().is_symlink() => {
            fs::remove_file(target).map_err(|e| BackupError::io(target, "replace symlink", e))?;
        }
        _ => {}
    }
    fs::copy(source, target).map_err(|e| BackupError::io(source, "copy", e))
}

/// True for entries a snapshot copy reproduces: directories, regular files
/// and symlinks to files.
fn is_captured(path: &Path, file_type: fs::FileType) -> bool {
    if file_type.is_symlink() {
        return fs::metadata(path).map(|meta| meta.is_file()).unwrap_or(false);
    }
    file_type.is_dir() || file_type.is_file()
}

/// Counts the files below `root` that a snapshot copy would capture.
fn count_source_files<F>(root: &Path, skip: F) -> BackupResult<usize>
where
    F: Fn(&Path) -> bool,
{
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .map(|rel| !skip(rel))
                .unwrap_or(true)
        });

    let mut count = 0;
    for entry in walker {
        let entry = entry.map_err(|e| BackupError::walk(root, "read", e))?;
        if !entry.file_type().is_dir() && is_captured(entry.path(), entry.file_type()) {
            count += 1;
        }
    }
    Ok(count)
}

/// Counts regular files below `root` (excluding the marker) and their total size.
fn count_files(root: &Path) -> BackupResult<(usize, u64)> {
    let marker = root.join(SNAPSHOT_MARKER);
    let mut count = 0;
    let mut bytes = 0;
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|e| BackupError::walk(root, "read", e))?;
        if entry.file_type().is_file() && entry.path() != marker {
            count += 1;
            bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }
    Ok((count, bytes))
}

fn snapshot_is_empty(root: &Path) -> BackupResult<bool> {
    let entries = fs::read_dir(root).map_err(|e| BackupError::io(root, "read snapshot", e))?;
    for entry in entries {
        let entry = entry.map_err(|e| BackupError::io(root, "read snapshot", e))?;
        if entry.file_name() != SNAPSHOT_MARKER {
            return Ok(false);
        }
    }
    Ok(true)
}
