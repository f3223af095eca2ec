/// Move history and undo of the last executed batch.
///
/// Every executed batch of moves is recorded in a JSON file kept next to the
/// snapshots, outside the vault. Undo moves each note back to where it came
/// from, newest move first.
use crate::executor::{ExecutionResult, MoveError, MoveExecutor};
use crate::frontmatter::NoteType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the history record inside the backup root.
pub const HISTORY_FILE_NAME: &str = ".organize-history.json";

/// One executed move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Where the note was before the move.
    pub original_path: PathBuf,
    /// Where the note was moved to.
    pub new_path: PathBuf,
    pub note_type: NoteType,
}

/// The moves performed by one `organize --execute` run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveHistory {
    /// RFC 3339 timestamp of the run.
    pub timestamp: String,
    pub vault_root: PathBuf,
    pub moves: Vec<MoveRecord>,
}

/// Errors that can occur while reading or writing the move history.
#[derive(Debug)]
pub enum HistoryError {
    /// Failed to write the history file.
    WriteFailed { path: PathBuf, source: std::io::Error },
    /// Failed to read the history file.
    ReadFailed { path: PathBuf, source: std::io::Error },
    /// History file has invalid format.
    InvalidFormat { reason: String },
    /// There is no recorded batch to undo.
    NoHistory,
}

impl HistoryError {
    /// A one-line suggestion for fixing the problem, if there is one.
    pub fn remedy(&self) -> Option<String> {
        match self {
            Self::NoHistory => Some("Nothing to undo; use `rollback` to restore a snapshot instead".to_string()),
            Self::InvalidFormat { .. } => {
                Some(format!("Remove the damaged {} and restore from a snapshot", HISTORY_FILE_NAME))
            }
            Self::WriteFailed { .. } | Self::ReadFailed { .. } => None,
        }
    }
}

impl std::fmt::Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WriteFailed { path, source } => {
                write!(f, "Failed to write history file {}: {}", path.display(), source)
            }
            Self::ReadFailed { path, source } => {
                write!(f, "Failed to read history file {}: {}", path.display(), source)
            }
            Self::InvalidFormat { reason } => write!(f, "Invalid history file format: {}", reason),
            Self::NoHistory => write!(f, "No previous organization found to undo"),
        }
    }
}

impl std::error::Error for HistoryError {}

/// Result type for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

impl MoveHistory {
    /// Creates an empty history for a vault.
    pub fn new(vault_root: PathBuf) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            vault_root,
            moves: Vec::new(),
        }
    }

    /// Records the executed moves of a batch.
    pub fn from_execution(result: &ExecutionResult) -> Self {
        let mut history = Self::new(result.vault_root.clone());
        for operation in &result.executed {
            history.add_move(MoveRecord {
                original_path: operation.source_path.clone(),
                new_path: operation.target_path.clone(),
                note_type: operation.note_type,
            });
        }
        history
    }

    pub fn add_move(&mut self, record: MoveRecord) {
        self.moves.push(record);
    }

    /// Returns the path of the history file inside `history_dir`.
    pub fn history_file_path(history_dir: &Path) -> PathBuf {
        history_dir.join(HISTORY_FILE_NAME)
    }

    /// Saves this history, replacing any previous one.
    pub fn save(&self, history_dir: &Path) -> HistoryResult<()> {
        let history_path = Self::history_file_path(history_dir);
        let write_failed = |source| HistoryError::WriteFailed {
            path: history_path.clone(),
            source,
        };

        fs::create_dir_all(history_dir).map_err(write_failed)?;
        let json = serde_json::to_string_pretty(self).map_err(|e| HistoryError::InvalidFormat {
            reason: format!("JSON serialization failed: {}", e),
        })?;
        fs::write(&history_path, json).map_err(write_failed)?;
        Ok(())
    }

    /// Loads the most recent history, if any.
    pub fn load(history_dir: &Path) -> HistoryResult<Option<Self>> {
        let history_path = Self::history_file_path(history_dir);
        if !history_path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&history_path).map_err(|source| HistoryError::ReadFailed {
            path: history_path.clone(),
            source,
        })?;
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| HistoryError::InvalidFormat {
                reason: format!("JSON parse error: {}", e),
            })
    }

    /// Deletes the history file.
    pub fn delete(history_dir: &Path) -> HistoryResult<()> {
        let history_path = Self::history_file_path(history_dir);
        if history_path.exists() {
            fs::remove_file(&history_path).map_err(|source| HistoryError::WriteFailed {
                path: history_path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Represents the result of an undo operation.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Number of notes moved back.
    pub restored_files: usize,
    /// Notes that could not be moved back.
    pub failed_restores: Vec<(PathBuf, String)>,
    /// Notes no longer at their moved location.
    pub skipped_files: Vec<(PathBuf, String)>,
}

impl UndoReport {
    /// Returns true if the undo was completely successful.
    pub fn is_complete_success(&self) -> bool {
        self.failed_restores.is_empty() && self.skipped_files.is_empty()
    }
}

/// Reverts the last executed batch of moves.
pub struct UndoManager;

impl UndoManager {
    /// Moves every note of the last recorded batch back to its original location.
    ///
    /// Notes missing from their moved location are skipped. If the original
    /// location is occupied the note stays where it is and the restore is
    /// recorded as a failure. The history file is only deleted when every
    /// note was restored.
    pub fn undo(history_dir: &Path) -> HistoryResult<UndoReport> {
        let history = MoveHistory::load(history_dir)?.ok_or(HistoryError::NoHistory)?;

        let mut report = UndoReport::default();
        for record in history.moves.iter().rev() {
            match MoveExecutor::move_file(&record.new_path, &record.original_path) {
                Ok(()) => report.restored_files += 1,
                Err(MoveError::SourceMissing { source }) => report
                    .skipped_files
                    .push((source, "File not found at expected location".to_string())),
                Err(e) => report
                    .failed_restores
                    .push((record.new_path.clone(), e.to_string())),
            }
        }

        if report.is_complete_success()
            && let Err(e) = MoveHistory::delete(history_dir)
        {
            tracing::warn!(error = %e, "could not delete history file");
        }

        Ok(report)
    }
}
