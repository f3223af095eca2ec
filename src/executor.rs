/// Execution of planned note moves.
///
/// This module applies a [`MovePlan`] produced by the dry-run planner. Only
/// operations in the `Planned` state are touched, and each target is checked
/// again right before its move because the vault may have changed since the
/// plan was computed. A failed move is recorded and the batch continues.
use crate::planner::{MoveOperation, MovePlan, MoveStatus};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Errors that can occur while moving a single note.
#[derive(Debug)]
pub enum MoveError {
    /// Something already exists at the target path.
    TargetExists { target: PathBuf },
    /// The note is no longer at its planned source path.
    SourceMissing { source: PathBuf },
    /// Failed to create the target directory.
    DirectoryCreationFailed {
        path: PathBuf,
        source: io::Error,
    },
    /// Failed to move the note to its target.
    FileMoveFailure {
        source: PathBuf,
        destination: PathBuf,
        source_error: io::Error,
    },
}

impl std::fmt::Display for MoveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TargetExists { target } => {
                write!(f, "conflict: target already exists: {}", target.display())
            }
            Self::SourceMissing { source } => {
                write!(f, "source no longer exists: {}", source.display())
            }
            Self::DirectoryCreationFailed { path, source } => {
                write!(
                    f,
                    "failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::FileMoveFailure {
                source,
                destination,
                source_error,
            } => {
                write!(
                    f,
                    "failed to move {} to {}: {}",
                    source.display(),
                    destination.display(),
                    source_error
                )
            }
        }
    }
}

impl std::error::Error for MoveError {}

/// Result type for single-move operations.
pub type MoveResult<T> = Result<T, MoveError>;

/// A move that did not happen, with the reason why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveFailure {
    pub source_path: PathBuf,
    pub target_path: PathBuf,
    pub reason: String,
}

/// Summary of a plan execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub vault_root: PathBuf,
    /// Moves that completed, with status `Executed`.
    pub executed: Vec<MoveOperation>,
    pub failures: Vec<MoveFailure>,
    /// Conflicts and operations that were not in the `Planned` state.
    pub skipped: usize,
}

impl ExecutionResult {
    fn new(vault_root: &Path) -> Self {
        Self {
            vault_root: vault_root.to_path_buf(),
            executed: Vec::new(),
            failures: Vec::new(),
            skipped: 0,
        }
    }

    pub fn executed_count(&self) -> usize {
        self.executed.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    /// Returns true if every planned move was executed.
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Applies move plans to the vault.
pub struct MoveExecutor;

impl MoveExecutor {
    /// Executes every planned operation in `plan`, updating their status in place.
    ///
    /// Conflicts, unknown-type and malformed notes are never touched.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vault_organizer::exclude::ExcludeMatcher;
    /// use vault_organizer::executor::MoveExecutor;
    /// use vault_organizer::planner::DryRunPlanner;
    /// use std::path::Path;
    ///
    /// let planner = DryRunPlanner::new(Path::new("/path/to/vault"), ExcludeMatcher::with_defaults(None));
    /// let mut plan = planner.plan();
    /// let result = MoveExecutor::execute(&mut plan);
    /// println!("Moved {} notes", result.executed_count());
    /// ```
    pub fn execute(plan: &mut MovePlan) -> ExecutionResult {
        Self::execute_with_progress(plan, |_| {})
    }

    /// Like [`MoveExecutor::execute`], calling `on_processed` after each planned operation.
    pub fn execute_with_progress<F>(plan: &mut MovePlan, mut on_processed: F) -> ExecutionResult
    where
        F: FnMut(&MoveOperation),
    {
        let mut result = ExecutionResult::new(&plan.vault_root);
        result.skipped = plan.conflicts.len();

        for operation in plan.operations.iter_mut() {
            if operation.status != MoveStatus::Planned {
                result.skipped += 1;
                continue;
            }

            match Self::move_file(&operation.source_path, &operation.target_path) {
                Ok(()) => {
                    operation.status = MoveStatus::Executed;
                    operation.reason = None;
                    result.executed.push(operation.clone());
                }
                Err(e) => {
                    tracing::warn!(
                        from = %operation.source_path.display(),
                        to = %operation.target_path.display(),
                        error = %e,
                        "move failed"
                    );
                    operation.status = MoveStatus::Failed;
                    operation.reason = Some(e.to_string());
                    result.failures.push(MoveFailure {
                        source_path: operation.source_path.clone(),
                        target_path: operation.target_path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
            on_processed(operation);
        }

        tracing::info!(
            executed = result.executed_count(),
            failed = result.failed_count(),
            skipped = result.skipped,
            "plan executed"
        );
        result
    }

    /// Moves one file to `target`, refusing to overwrite anything.
    ///
    /// The parent directory of `target` is created if needed. When `rename`
    /// fails (for example across volumes) the file is copied into a newly
    /// created target and the source is removed afterwards.
    pub fn move_file(source: &Path, target: &Path) -> MoveResult<()> {
        if fs::symlink_metadata(target).is_ok() {
            return Err(MoveError::TargetExists {
                target: target.to_path_buf(),
            });
        }
        if !source.is_file() {
            return Err(MoveError::SourceMissing {
                source: source.to_path_buf(),
            });
        }

        if let Some(parent) = target.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| MoveError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        match fs::rename(source, target) {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(
                    from = %source.display(),
                    error = %e,
                    "rename failed, falling back to copy and delete"
                );
                Self::copy_then_delete(source, target)
            }
        }
    }

    fn copy_then_delete(source: &Path, target: &Path) -> MoveResult<()> {
        let failure = |e: io::Error| MoveError::FileMoveFailure {
            source: source.to_path_buf(),
            destination: target.to_path_buf(),
            source_error: e,
        };

        let mut reader = fs::File::open(source).map_err(failure)?;
        let mut writer = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(target)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    MoveError::TargetExists {
                        target: target.to_path_buf(),
                    }
                } else {
                    failure(e)
                }
            })?;

        let copied = io::copy(&mut reader, &mut writer)
            .and_then(|_| writer.sync_all())
            .and_then(|_| fs::metadata(source))
            .and_then(|meta| fs::set_permissions(target, meta.permissions()));
        drop(writer);

        if let Err(e) = copied.and_then(|_| fs::remove_file(source)) {
            if let Err(cleanup) = fs::remove_file(target) {
                tracing::error!(
                    path = %target.display(),
                    error = %cleanup,
                    "failed to remove partial copy"
                );
            }
            return Err(failure(e));
        }
        Ok(())
    }
}
