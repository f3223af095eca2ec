//! Command-line interface for vault-organizer.
//!
//! This module handles:
//! - Command parsing (`clap` derive)
//! - Loading and resolving configuration
//! - Orchestrating backup, planning, execution, rollback and undo
//! - Interactive confirmation before destructive operations

use crate::backup::{BackupEngine, BackupError, BackupSnapshot, SnapshotKind};
use crate::config::{ConfigurationError, OrganizerConfig, Settings};
use crate::executor::MoveExecutor;
use crate::history::{HistoryError, MoveHistory, UndoManager};
use crate::output::OutputFormatter;
use crate::planner::{DryRunPlanner, MovePlan};
use crate::report::{self, ReportFormat, ReportGenerator, Reportable};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Reorganize a Zettelkasten vault by note type, safely.
#[derive(Debug, Parser)]
#[command(name = "vault-organizer", version, about, long_about = None)]
pub struct Cli {
    /// Vault root directory (overrides `vault_root` from the config file).
    #[arg(long, global = true, value_name = "PATH")]
    pub vault: Option<PathBuf>,

    /// Directory holding snapshots; must be outside the vault.
    #[arg(long, global = true, value_name = "PATH")]
    pub backup_root: Option<PathBuf>,

    /// Configuration file to use instead of the discovered one.
    #[arg(long, short, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show informational log messages.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Create a snapshot of the vault.
    Backup {
        /// Write a backup report (.json or .md).
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// List snapshots of the vault, newest first.
    ListBackups,

    /// Delete old snapshots beyond the most recent N.
    PruneBackups {
        /// Number of snapshots to keep.
        #[arg(long, value_name = "N")]
        keep: usize,

        /// Show what would be deleted without deleting anything.
        #[arg(long)]
        dry_run: bool,

        /// Write a prune report (.json or .md).
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Plan or execute moving notes into their type directories.
    Organize {
        /// Only compute the plan (the default).
        #[arg(long, conflicts_with = "execute")]
        dry_run: bool,

        /// Move the notes.
        #[arg(long)]
        execute: bool,

        /// Write a report (.json or .md).
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Execute a plan saved earlier as a JSON report instead of re-planning.
        #[arg(long, value_name = "FILE", requires = "execute")]
        plan: Option<PathBuf>,

        /// Execute even if no complete snapshot exists.
        #[arg(long, requires = "execute")]
        skip_backup_check: bool,
    },

    /// Restore the vault from a snapshot.
    Rollback {
        /// Snapshot directory name, as shown by `list-backups`.
        snapshot: String,

        /// Do not ask for confirmation.
        #[arg(long, short)]
        yes: bool,
    },

    /// Move the notes of the last executed batch back.
    Undo,
}

/// Errors that end a CLI command.
#[derive(Debug)]
pub enum CliError {
    Configuration(ConfigurationError),
    Backup(BackupError),
    History(HistoryError),
    /// A report could not be written.
    ReportWrite { path: PathBuf, source: io::Error },
    /// A saved plan could not be read.
    PlanLoad { path: PathBuf, reason: String },
    /// `organize --execute` without a complete snapshot.
    BackupRequired { backup_root: PathBuf },
    /// A saved plan belongs to another vault.
    PlanVaultMismatch { plan_vault: PathBuf, vault: PathBuf },
    /// Reading the confirmation answer failed.
    Prompt(io::Error),
}

impl CliError {
    /// A one-line suggestion for fixing the problem, if there is one.
    pub fn remedy(&self) -> Option<String> {
        match self {
            Self::Configuration(e) => e.remedy(),
            Self::Backup(e) => e.remedy(),
            Self::History(e) => e.remedy(),
            Self::BackupRequired { .. } => Some(
                "Run `vault-organizer backup` first, or pass --skip-backup-check".to_string(),
            ),
            Self::PlanLoad { .. } => Some(
                "Regenerate the plan with `vault-organizer organize --dry-run --output plan.json`"
                    .to_string(),
            ),
            Self::PlanVaultMismatch { .. } => {
                Some("Pass the matching --vault or regenerate the plan".to_string())
            }
            Self::ReportWrite { .. } | Self::Prompt(_) => None,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(e) => write!(f, "{}", e),
            Self::Backup(e) => write!(f, "{}", e),
            Self::History(e) => write!(f, "{}", e),
            Self::ReportWrite { path, source } => {
                write!(f, "Failed to write report {}: {}", path.display(), source)
            }
            Self::PlanLoad { path, reason } => {
                write!(f, "Failed to load plan {}: {}", path.display(), reason)
            }
            Self::BackupRequired { backup_root } => write!(
                f,
                "Refusing to move notes: no complete snapshot found in {}",
                backup_root.display()
            ),
            Self::PlanVaultMismatch { plan_vault, vault } => write!(
                f,
                "Plan was made for {} but the vault is {}",
                plan_vault.display(),
                vault.display()
            ),
            Self::Prompt(e) => write!(f, "Failed to read confirmation: {}", e),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigurationError> for CliError {
    fn from(e: ConfigurationError) -> Self {
        Self::Configuration(e)
    }
}

impl From<BackupError> for CliError {
    fn from(e: BackupError) -> Self {
        Self::Backup(e)
    }
}

impl From<HistoryError> for CliError {
    fn from(e: HistoryError) -> Self {
        Self::History(e)
    }
}

/// Runs a parsed command line.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use vault_organizer::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["vault-organizer", "--vault", "/path/to/vault", "organize", "--dry-run"]);
/// if let Err(e) = run_cli(&cli) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(cli: &Cli) -> Result<(), CliError> {
    let settings = OrganizerConfig::load(cli.config.as_deref())?
        .with_overrides(cli.vault.clone(), cli.backup_root.clone())
        .resolve()?;
    tracing::debug!(?settings, "resolved settings");

    let stdin = io::stdin();
    run_command(&cli.command, &settings, &mut stdin.lock())
}

/// Runs one command against resolved settings, reading confirmations from `input`.
pub fn run_command<R: BufRead>(
    command: &Command,
    settings: &Settings,
    input: &mut R,
) -> Result<(), CliError> {
    match command {
        Command::Backup { output } => backup(settings, output.as_deref()),
        Command::ListBackups => list_backups(settings),
        Command::PruneBackups {
            keep,
            dry_run,
            output,
        } => prune_backups(settings, *keep, *dry_run, output.as_deref()),
        Command::Organize {
            execute: true,
            output,
            plan,
            skip_backup_check,
            ..
        } => organize_execute(
            settings,
            output.as_deref(),
            plan.as_deref(),
            *skip_backup_check,
        ),
        Command::Organize { output, .. } => organize_dry_run(settings, output.as_deref()),
        Command::Rollback { snapshot, yes } => rollback(settings, snapshot, *yes, input),
        Command::Undo => undo(settings),
    }
}

fn backup(settings: &Settings, output: Option<&Path>) -> Result<(), CliError> {
    let engine = BackupEngine::from_settings(settings)?;
    OutputFormatter::info(&format!(
        "Backing up {} to {}",
        engine.vault_root().display(),
        engine.backup_root().display()
    ));

    let spinner = OutputFormatter::create_spinner("Copying vault");
    let created = engine.create_backup();
    spinner.finish_and_clear();
    let snapshot = created?;

    OutputFormatter::success(&format!(
        "Snapshot created: {}",
        snapshot.root_path.display()
    ));
    OutputFormatter::plain(&format!(
        "  {} files, {}",
        snapshot.file_count,
        report::format_size(snapshot.size_bytes)
    ));
    if !snapshot.counts_match() {
        OutputFormatter::warning(&format!(
            "Copied {} files but the vault has {:?}; check the log before relying on this snapshot",
            snapshot.file_count, snapshot.source_file_count
        ));
    }

    if let Some(keep) = settings.retention_keep {
        let pruned = engine.prune_backups(keep, false)?;
        if !pruned.deleted.is_empty() {
            OutputFormatter::info(&format!(
                "Pruned {} old snapshot(s), keeping {}",
                pruned.deleted.len(),
                keep
            ));
        }
    }

    if let Some(path) = output {
        let generator = ReportGenerator::new().with_vault(&settings.vault_name, &settings.vault_root);
        write_report(path, &generator, Reportable::Backup(&snapshot))?;
    }
    Ok(())
}

fn list_backups(settings: &Settings) -> Result<(), CliError> {
    let engine = BackupEngine::from_settings(settings)?;
    let snapshots = engine.list_backups()?;

    if snapshots.is_empty() {
        OutputFormatter::info(&format!(
            "No snapshots of {} in {}",
            engine.vault_name(),
            engine.backup_root().display()
        ));
        return Ok(());
    }

    OutputFormatter::header(&format!("Snapshots in {}", engine.backup_root().display()));
    for snapshot in &snapshots {
        OutputFormatter::plain(&snapshot_line(snapshot));
    }
    Ok(())
}

fn snapshot_line(snapshot: &BackupSnapshot) -> String {
    let mut flags = Vec::new();
    if snapshot.kind == SnapshotKind::Emergency {
        flags.push("emergency");
    }
    if !snapshot.complete {
        flags.push("INCOMPLETE");
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!("  [{}]", flags.join(", "))
    };
    format!(
        "  {}  {}  {:>6} files  {:>10}{}",
        snapshot.name,
        snapshot.created_at.format("%Y-%m-%d %H:%M:%S"),
        snapshot.file_count,
        report::format_size(snapshot.size_bytes),
        flags
    )
}

fn prune_backups(
    settings: &Settings,
    keep: usize,
    dry_run: bool,
    output: Option<&Path>,
) -> Result<(), CliError> {
    let engine = BackupEngine::from_settings(settings)?;
    let pruned = engine.prune_backups(keep, dry_run)?;

    for name in &pruned.incomplete {
        OutputFormatter::warning(&format!("Snapshot {} is incomplete and was not pruned", name));
    }
    if pruned.deleted.is_empty() {
        OutputFormatter::info(&format!(
            "{} snapshot(s) found; nothing to prune",
            pruned.kept.len()
        ));
    } else if dry_run {
        OutputFormatter::dry_run_notice(&format!(
            "Would delete {} snapshot(s):",
            pruned.deleted.len()
        ));
        for snapshot in &pruned.deleted {
            OutputFormatter::plain(&format!("  - {}", snapshot.name));
        }
    } else {
        for snapshot in &pruned.deleted {
            OutputFormatter::plain(&format!("  - {}", snapshot.name));
        }
        OutputFormatter::success(&format!(
            "Deleted {} snapshot(s), kept {}",
            pruned.deleted.len(),
            pruned.kept.len()
        ));
    }

    if let Some(path) = output {
        let generator = ReportGenerator::new().with_vault(&settings.vault_name, &settings.vault_root);
        write_report(path, &generator, Reportable::Prune(&pruned))?;
    }
    Ok(())
}

fn organize_dry_run(settings: &Settings, output: Option<&Path>) -> Result<(), CliError> {
    OutputFormatter::dry_run_notice(&format!(
        "Analyzing {}; no files will be moved",
        settings.vault_root.display()
    ));
    let plan = DryRunPlanner::from_settings(settings).plan();
    print_plan(&plan);

    match output {
        Some(path) => write_report(path, &ReportGenerator::new(), Reportable::Plan(&plan))?,
        None => OutputFormatter::info("Pass --output report.md (or .json) to save the full plan"),
    }

    if plan.stats.to_move > 0 {
        OutputFormatter::plain(
            "\nCreate a backup with `vault-organizer backup`, then run `vault-organizer organize --execute`.",
        );
    }
    Ok(())
}

fn print_plan(plan: &MovePlan) {
    let relative = |path: &Path| {
        path.strip_prefix(&plan.vault_root)
            .unwrap_or(path)
            .display()
            .to_string()
    };

    if !plan.operations.is_empty() {
        OutputFormatter::header("Planned moves");
        for op in &plan.operations {
            OutputFormatter::plain(&format!(
                "  {} → {}",
                relative(&op.source_path),
                relative(&op.target_path)
            ));
        }
    }
    for op in &plan.conflicts {
        OutputFormatter::warning(&format!(
            "Conflict: {} ({})",
            relative(&op.source_path),
            op.reason.as_deref().unwrap_or("target unavailable")
        ));
    }

    let stats = &plan.stats;
    OutputFormatter::summary_table(&[
        ("Scanned", stats.total_scanned),
        ("With frontmatter", stats.with_frontmatter),
        ("Correctly placed", stats.correctly_placed),
        ("To move", stats.to_move),
        ("Conflicts", stats.conflicts),
        ("Unknown type", stats.unknown_type),
        ("Malformed", stats.malformed),
    ]);
}

fn organize_execute(
    settings: &Settings,
    output: Option<&Path>,
    plan_path: Option<&Path>,
    skip_backup_check: bool,
) -> Result<(), CliError> {
    let engine = BackupEngine::from_settings(settings)?;

    if skip_backup_check {
        OutputFormatter::warning("Skipping backup check");
    } else {
        match engine.latest_complete_snapshot()? {
            Some(snapshot) => {
                OutputFormatter::info(&format!("Latest snapshot: {}", snapshot.name))
            }
            None => {
                return Err(CliError::BackupRequired {
                    backup_root: engine.backup_root().to_path_buf(),
                });
            }
        }
    }

    let mut plan = match plan_path {
        Some(path) => load_plan(path, settings)?,
        None => DryRunPlanner::from_settings(settings).plan(),
    };

    let pending = plan.pending().count();
    if pending == 0 {
        OutputFormatter::info("Nothing to move; every typed note is already in place");
    }

    let pb = OutputFormatter::create_progress_bar(pending as u64);
    let result = MoveExecutor::execute_with_progress(&mut plan, |op| {
        if let Some(name) = op.source_path.file_name() {
            pb.set_message(name.to_string_lossy().into_owned());
        }
        pb.inc(1);
    });
    pb.finish_and_clear();

    if !result.executed.is_empty() {
        match MoveHistory::from_execution(&result).save(engine.backup_root()) {
            Ok(()) => OutputFormatter::info("History saved; run `vault-organizer undo` to revert"),
            Err(e) => OutputFormatter::warning(&format!("Could not save history: {}", e)),
        }
    }

    OutputFormatter::success(&format!("Moved {} note(s)", result.executed_count()));
    if result.skipped > 0 {
        OutputFormatter::info(&format!(
            "Skipped {} conflict(s); see the dry-run report",
            result.skipped
        ));
    }
    for failure in &result.failures {
        OutputFormatter::error(&format!(
            "{}: {}",
            failure.source_path.display(),
            failure.reason
        ));
    }
    if !result.is_complete_success() {
        OutputFormatter::warning("Some notes could not be moved. Please review errors above.");
    }

    if let Some(path) = output {
        write_report(path, &ReportGenerator::new(), Reportable::Execution(&result))?;
    }
    Ok(())
}

fn load_plan(path: &Path, settings: &Settings) -> Result<MovePlan, CliError> {
    let json = fs::read_to_string(path).map_err(|e| CliError::PlanLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let plan = MovePlan::from_json_report(&json).map_err(|e| CliError::PlanLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if plan.vault_root != settings.vault_root {
        return Err(CliError::PlanVaultMismatch {
            plan_vault: plan.vault_root,
            vault: settings.vault_root.clone(),
        });
    }
    Ok(plan)
}

fn rollback<R: BufRead>(
    settings: &Settings,
    name: &str,
    yes: bool,
    input: &mut R,
) -> Result<(), CliError> {
    let engine = BackupEngine::from_settings(settings)?;
    let snapshot = engine.find_snapshot(name)?;

    if !snapshot.complete {
        OutputFormatter::warning(&format!("Snapshot {} is incomplete", snapshot.name));
    }
    OutputFormatter::warning(&format!(
        "This replaces the contents of {} with snapshot {} ({} files).",
        engine.vault_root().display(),
        snapshot.name,
        snapshot.file_count
    ));

    if !yes && !confirm("Type 'yes' to continue:", input)? {
        OutputFormatter::info("Rollback cancelled; nothing was changed");
        return Ok(());
    }

    let restored = engine.rollback(&snapshot)?;
    OutputFormatter::success(&format!(
        "Restored {} file(s) from {}",
        restored.restored_files, restored.restored_from
    ));
    if restored.removed_entries > 0 {
        OutputFormatter::info(&format!(
            "Removed {} entries not present in the snapshot",
            restored.removed_entries
        ));
    }
    OutputFormatter::info(&format!(
        "Previous vault state saved as {}",
        restored.emergency_snapshot.name
    ));
    Ok(())
}

fn undo(settings: &Settings) -> Result<(), CliError> {
    OutputFormatter::info("Undoing the last organization...");
    let report = UndoManager::undo(&settings.backup_root)?;

    OutputFormatter::success(&format!("Restored {} note(s)", report.restored_files));
    for (path, reason) in &report.skipped_files {
        OutputFormatter::warning(&format!("Skipped {}: {}", path.display(), reason));
    }
    for (path, reason) in &report.failed_restores {
        OutputFormatter::error(&format!("{}: {}", path.display(), reason));
    }
    if !report.is_complete_success() {
        OutputFormatter::warning("History was kept; fix the issues above and run undo again");
    }
    Ok(())
}

fn write_report(
    path: &Path,
    generator: &ReportGenerator,
    item: Reportable<'_>,
) -> Result<(), CliError> {
    let content = generator.render(item, ReportFormat::from_path(path));
    let write_failed = |source| CliError::ReportWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(write_failed)?;
    }
    fs::write(path, content).map_err(write_failed)?;
    OutputFormatter::success(&format!("Report written to {}", path.display()));
    Ok(())
}

/// Prints `prompt` and reads one answer line from `input`.
fn confirm<R: BufRead>(prompt: &str, input: &mut R) -> Result<bool, CliError> {
    print!("{} ", prompt);
    io::stdout().flush().map_err(CliError::Prompt)?;

    let mut answer = String::new();
    input.read_line(&mut answer).map_err(CliError::Prompt)?;
    Ok(is_affirmative(&answer))
}

/// Only `yes` or `y` (any case) confirm.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "yes" | "y")
}
