//! vault-organizer - safe reorganization of a Zettelkasten vault
//!
//! This library sorts markdown notes into `Permanent Notes/`, `Literature Notes/`
//! and `Fleeting Notes/` according to the `type` field of their YAML
//! frontmatter. Moves are always planned first (dry run), can be executed only
//! after a snapshot of the vault exists outside of it, never overwrite a file,
//! and can be reverted either by undoing the last batch or by rolling back to a
//! snapshot.

pub mod backup;
pub mod cli;
pub mod config;
pub mod exclude;
pub mod executor;
pub mod frontmatter;
pub mod history;
pub mod output;
pub mod path_guard;
pub mod planner;
pub mod report;

pub use backup::{BackupEngine, BackupError, BackupSnapshot, PruneReport, RollbackReport, SnapshotKind};
pub use config::{ConfigurationError, OrganizerConfig, Settings};
pub use exclude::ExcludeMatcher;
pub use executor::{ExecutionResult, MoveExecutor};
pub use frontmatter::{NoteType, VaultNote};
pub use history::{MoveHistory, UndoManager, UndoReport};
pub use planner::{DryRunPlanner, MoveOperation, MovePlan, MoveStatus, generate_report};
pub use report::{ReportFormat, ReportGenerator, Reportable};

pub use cli::{Cli, Command, run_cli};
