//! JSON and Markdown reports.
//!
//! [`ReportGenerator`] turns plans, execution results, snapshots and prune
//! results into a string. It performs no I/O; the caller decides where the
//! report goes. JSON reports share one envelope:
//!
//! ```json
//! {
//!   "report": "plan",
//!   "generated_at": "2025-01-01T12:00:00+01:00",
//!   "tool": { "name": "vault-organizer", "version": "0.1.0" },
//!   "vault": { "name": "notes", "root": "/home/me/notes" },
//!   "data": { }
//! }
//! ```

use crate::backup::{BackupSnapshot, PruneReport};
use crate::executor::ExecutionResult;
use crate::planner::{MoveOperation, MovePlan, PlanIssue};
use chrono::Local;
use serde_json::{Value, json};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const UNKNOWN_VAULT: &str = "unknown";

/// Output format of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Markdown,
}

impl ReportFormat {
    /// Picks the format from a file extension: `.json` is JSON, anything else Markdown.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Markdown,
        }
    }
}

/// Anything a report can be generated for.
#[derive(Debug, Clone, Copy)]
pub enum Reportable<'a> {
    Plan(&'a MovePlan),
    Execution(&'a ExecutionResult),
    Backup(&'a BackupSnapshot),
    Prune(&'a PruneReport),
}

impl Reportable<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Self::Plan(_) => "plan",
            Self::Execution(_) => "execution",
            Self::Backup(_) => "backup",
            Self::Prune(_) => "prune",
        }
    }

    fn vault_root(&self) -> Option<&Path> {
        match self {
            Self::Plan(plan) => Some(&plan.vault_root),
            Self::Execution(result) => Some(&result.vault_root),
            Self::Backup(_) | Self::Prune(_) => None,
        }
    }

    fn data(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Plan(plan) => serde_json::to_value(plan),
            Self::Execution(result) => serde_json::to_value(result),
            Self::Backup(snapshot) => serde_json::to_value(snapshot),
            Self::Prune(report) => serde_json::to_value(report),
        }
    }
}

/// Renders reports. Vault identity is taken from the reported value when it
/// carries one, otherwise from [`ReportGenerator::with_vault`].
#[derive(Debug, Clone, Default)]
pub struct ReportGenerator {
    vault_name: Option<String>,
    vault_root: Option<PathBuf>,
}

impl ReportGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the vault identification used when the reported value has none.
    pub fn with_vault(mut self, name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.vault_name = Some(name.into());
        self.vault_root = Some(root.into());
        self
    }

    /// Renders `item` in the requested format.
    pub fn render(&self, item: Reportable<'_>, format: ReportFormat) -> String {
        match format {
            ReportFormat::Json => self.render_json(item),
            ReportFormat::Markdown => self.render_markdown(item),
        }
    }

    fn vault_identity(&self, item: &Reportable<'_>) -> (String, Option<PathBuf>) {
        let root = item
            .vault_root()
            .map(Path::to_path_buf)
            .or_else(|| self.vault_root.clone());
        let name = self
            .vault_name
            .clone()
            .or_else(|| {
                root.as_deref()
                    .and_then(Path::file_name)
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| UNKNOWN_VAULT.to_string());
        (name, root)
    }

    fn render_json(&self, item: Reportable<'_>) -> String {
        let (name, root) = self.vault_identity(&item);
        let data = item
            .data()
            .unwrap_or_else(|e| json!({ "error": format!("could not serialize report data: {}", e) }));

        let envelope = json!({
            "report": item.kind(),
            "generated_at": Local::now().to_rfc3339(),
            "tool": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
            "vault": {
                "name": name,
                "root": root.map(|r| r.display().to_string()),
            },
            "data": data,
        });
        serde_json::to_string_pretty(&envelope).unwrap_or_else(|_| envelope.to_string())
    }

    fn render_markdown(&self, item: Reportable<'_>) -> String {
        let (name, root) = self.vault_identity(&item);
        let mut out = String::new();

        let title = match item {
            Reportable::Plan(_) => "Vault Organization Plan",
            Reportable::Execution(_) => "Vault Organization Result",
            Reportable::Backup(_) => "Vault Backup",
            Reportable::Prune(_) => "Backup Pruning",
        };
        let _ = writeln!(out, "# {}\n", title);
        match &root {
            Some(root) => {
                let _ = writeln!(out, "- **Vault:** {} (`{}`)", name, root.display());
            }
            None => {
                let _ = writeln!(out, "- **Vault:** {}", name);
            }
        }
        let _ = writeln!(
            out,
            "- **Generated:** {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        match item {
            Reportable::Plan(plan) => plan_markdown(&mut out, plan),
            Reportable::Execution(result) => execution_markdown(&mut out, result),
            Reportable::Backup(snapshot) => backup_markdown(&mut out, snapshot),
            Reportable::Prune(report) => prune_markdown(&mut out, report),
        }
        out
    }
}

fn plan_markdown(out: &mut String, plan: &MovePlan) {
    let _ = writeln!(
        out,
        "> **Safety notice:** this is a dry run and no files were changed. \
         Create a backup with `vault-organizer backup` before running \
         `vault-organizer organize --execute`.\n"
    );

    let stats = &plan.stats;
    summary_table(
        out,
        &[
            ("Notes scanned", stats.total_scanned),
            ("With frontmatter", stats.with_frontmatter),
            ("Correctly placed", stats.correctly_placed),
            ("To move", stats.to_move),
            ("Conflicts", stats.conflicts),
            ("Unknown type", stats.unknown_type),
            ("Malformed", stats.malformed),
        ],
    );

    let root = plan.vault_root.as_path();
    let _ = writeln!(out, "## Planned moves\n");
    if plan.operations.is_empty() {
        let _ = writeln!(out, "_None._\n");
    } else {
        let _ = writeln!(out, "| Note | Type | Destination |");
        let _ = writeln!(out, "|------|------|-------------|");
        for op in &plan.operations {
            let _ = writeln!(
                out,
                "| {} | {} | {} |",
                cell(&relative(root, &op.source_path)),
                op.note_type,
                cell(&relative(root, &op.target_path)),
            );
        }
        out.push('\n');
    }

    if !plan.conflicts.is_empty() {
        let _ = writeln!(out, "## Conflicts\n");
        for op in &plan.conflicts {
            operation_line(out, root, op);
        }
        out.push('\n');
    }

    issue_section(out, root, "Unknown type", &plan.unknown_type_files);
    issue_section(out, root, "Malformed", &plan.malformed_files);

    let _ = writeln!(
        out,
        "## Correctly placed\n\n{} {} already in the right directory.",
        plan.correctly_placed.len(),
        notes_word(plan.correctly_placed.len()),
    );
}

fn execution_markdown(out: &mut String, result: &ExecutionResult) {
    summary_table(
        out,
        &[
            ("Moved", result.executed_count()),
            ("Failed", result.failed_count()),
            ("Skipped", result.skipped),
        ],
    );

    let root = result.vault_root.as_path();
    if !result.executed.is_empty() {
        let _ = writeln!(out, "## Moved\n");
        for op in &result.executed {
            operation_line(out, root, op);
        }
        out.push('\n');
    }

    if !result.failures.is_empty() {
        let _ = writeln!(out, "## Failed\n");
        for failure in &result.failures {
            let _ = writeln!(
                out,
                "- `{}` → `{}`: {}",
                relative(root, &failure.source_path),
                relative(root, &failure.target_path),
                failure.reason
            );
        }
        out.push('\n');
    }
}

fn backup_markdown(out: &mut String, snapshot: &BackupSnapshot) {
    let vault_files = snapshot
        .source_file_count
        .map_or_else(|| "unknown".to_string(), |count| count.to_string());
    let _ = writeln!(out, "| Field | Value |");
    let _ = writeln!(out, "|-------|-------|");
    let _ = writeln!(out, "| Snapshot | {} |", cell(&snapshot.name));
    let _ = writeln!(out, "| Location | {} |", cell(&snapshot.root_path.display().to_string()));
    let _ = writeln!(out, "| Kind | {:?} |", snapshot.kind);
    let _ = writeln!(out, "| Taken at | {} |", snapshot.created_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "| Files copied | {} |", snapshot.file_count);
    let _ = writeln!(out, "| Files in vault | {} |", vault_files);
    let _ = writeln!(out, "| Size | {} |", format_size(snapshot.size_bytes));
    let _ = writeln!(out, "| Complete | {} |\n", if snapshot.complete { "yes" } else { "no" });

    if snapshot.complete && !snapshot.counts_match() {
        let _ = writeln!(
            out,
            "> **Warning:** the number of copied files differs from the vault. \
             Check the log before relying on this snapshot.\n"
        );
    }
}

fn prune_markdown(out: &mut String, report: &PruneReport) {
    if report.dry_run {
        let _ = writeln!(out, "> Dry run: nothing was deleted.\n");
    }
    let _ = writeln!(out, "Keeping the {} most recent snapshots.\n", report.keep);

    let _ = writeln!(out, "## Kept\n");
    if report.kept.is_empty() {
        let _ = writeln!(out, "_None._");
    }
    for name in &report.kept {
        let _ = writeln!(out, "- {}", name);
    }

    let heading = if report.dry_run { "Would delete" } else { "Deleted" };
    let _ = writeln!(out, "\n## {}\n", heading);
    if report.deleted.is_empty() {
        let _ = writeln!(out, "_None._");
    }
    for snapshot in &report.deleted {
        let _ = writeln!(
            out,
            "- {} ({})",
            snapshot.name,
            format_size(snapshot.size_bytes)
        );
    }

    if !report.incomplete.is_empty() {
        let _ = writeln!(out, "\n## Incomplete (not pruned)\n");
        for name in &report.incomplete {
            let _ = writeln!(out, "- {}", name);
        }
    }
}

fn summary_table(out: &mut String, rows: &[(&str, usize)]) {
    let _ = writeln!(out, "## Summary\n");
    let _ = writeln!(out, "| Metric | Count |");
    let _ = writeln!(out, "|--------|-------|");
    for (label, count) in rows {
        let _ = writeln!(out, "| {} | {} |", label, count);
    }
    out.push('\n');
}

fn issue_section(out: &mut String, root: &Path, heading: &str, issues: &[PlanIssue]) {
    if issues.is_empty() {
        return;
    }
    let _ = writeln!(out, "## {}\n", heading);
    for issue in issues {
        let _ = writeln!(out, "- `{}`: {}", relative(root, &issue.path), issue.reason);
    }
    out.push('\n');
}

fn operation_line(out: &mut String, root: &Path, op: &MoveOperation) {
    let _ = write!(
        out,
        "- `{}` → `{}`",
        relative(root, &op.source_path),
        relative(root, &op.target_path)
    );
    match &op.reason {
        Some(reason) => {
            let _ = writeln!(out, ": {}", reason);
        }
        None => out.push('\n'),
    }
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn notes_word(count: usize) -> &'static str {
    if count == 1 { "note is" } else { "notes are" }
}

/// Formats a byte count for humans, e.g. `1.5 MiB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
