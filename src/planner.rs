//! Dry-run planning of note moves.
//!
//! The planner reads every markdown note in the vault, classifies it by the
//! `type` field of its frontmatter and computes where it should live. It never
//! writes to the filesystem; problems with individual notes are recorded in the
//! plan instead of aborting the scan.

use crate::config::Settings;
use crate::exclude::ExcludeMatcher;
use crate::frontmatter::{NoteType, VaultNote};
use crate::report::{ReportFormat, ReportGenerator, Reportable};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Lifecycle state of a move.
///
/// `Planned` moves to `Executed` or `Failed`; `Conflict` never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveStatus {
    Planned,
    Conflict,
    Executed,
    Failed,
}

/// A single planned or executed move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveOperation {
    pub source_path: PathBuf,
    pub target_path: PathBuf,
    pub note_type: NoteType,
    pub status: MoveStatus,
    /// Conflict or failure explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl MoveOperation {
    fn planned(source_path: PathBuf, target_path: PathBuf, note_type: NoteType) -> Self {
        Self {
            source_path,
            target_path,
            note_type,
            status: MoveStatus::Planned,
            reason: None,
        }
    }

    fn into_conflict(mut self, reason: String) -> Self {
        self.status = MoveStatus::Conflict;
        self.reason = Some(reason);
        self
    }
}

/// A note that could not be planned, with the reason why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanIssue {
    pub path: PathBuf,
    pub reason: String,
}

/// Counts summarizing a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStats {
    pub total_scanned: usize,
    pub with_frontmatter: usize,
    pub correctly_placed: usize,
    pub to_move: usize,
    pub conflicts: usize,
    pub unknown_type: usize,
    pub malformed: usize,
}

impl PlanStats {
    /// Notes that need a human: conflicts, unknown types and malformed files.
    pub fn issues(&self) -> usize {
        self.conflicts + self.unknown_type + self.malformed
    }
}

/// Output of a dry run.
///
/// Every scanned note appears in exactly one of `operations`, `conflicts`,
/// `correctly_placed`, `unknown_type_files` or `malformed_files`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovePlan {
    pub vault_root: PathBuf,
    pub generated_at: DateTime<Local>,
    pub operations: Vec<MoveOperation>,
    pub conflicts: Vec<MoveOperation>,
    pub correctly_placed: Vec<PathBuf>,
    pub unknown_type_files: Vec<PlanIssue>,
    pub malformed_files: Vec<PlanIssue>,
    pub stats: PlanStats,
}

impl MovePlan {
    fn empty(vault_root: &Path) -> Self {
        Self {
            vault_root: vault_root.to_path_buf(),
            generated_at: Local::now(),
            operations: Vec::new(),
            conflicts: Vec::new(),
            correctly_placed: Vec::new(),
            unknown_type_files: Vec::new(),
            malformed_files: Vec::new(),
            stats: PlanStats::default(),
        }
    }

    /// Operations still waiting to be executed.
    pub fn pending(&self) -> impl Iterator<Item = &MoveOperation> {
        self.operations
            .iter()
            .filter(|op| op.status == MoveStatus::Planned)
    }

    /// Reads the plan back from a JSON report written by [`generate_report`].
    pub fn from_json_report(json: &str) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct Envelope {
            data: MovePlan,
        }
        serde_json::from_str::<Envelope>(json).map(|envelope| envelope.data)
    }

    fn finalize_stats(&mut self, total_scanned: usize, with_frontmatter: usize) {
        self.stats = PlanStats {
            total_scanned,
            with_frontmatter,
            correctly_placed: self.correctly_placed.len(),
            to_move: self.operations.len(),
            conflicts: self.conflicts.len(),
            unknown_type: self.unknown_type_files.len(),
            malformed: self.malformed_files.len(),
        };
    }
}

/// Renders a plan as a JSON or Markdown report.
pub fn generate_report(plan: &MovePlan, format: ReportFormat) -> String {
    ReportGenerator::new().render(Reportable::Plan(plan), format)
}

/// Outcome of reading and classifying one note.
enum Classification {
    Malformed(String),
    Unknown { reason: String, has_frontmatter: bool },
    Typed(NoteType),
}

/// Computes move plans without touching the filesystem.
#[derive(Debug, Clone)]
pub struct DryRunPlanner {
    vault_root: PathBuf,
    exclude: ExcludeMatcher,
}

impl DryRunPlanner {
    pub fn new(vault_root: &Path, exclude: ExcludeMatcher) -> Self {
        Self {
            vault_root: vault_root.to_path_buf(),
            exclude,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.vault_root, settings.exclude.clone())
    }

    /// Scans the vault and builds a move plan.
    ///
    /// Notes whose target path is already taken, or whose target is claimed by
    /// another note in the same pass, are reported as conflicts rather than
    /// planned, so executing the plan can never overwrite a file.
    pub fn plan(&self) -> MovePlan {
        let mut plan = MovePlan::empty(&self.vault_root);
        let mut candidates = Vec::new();
        let mut total_scanned = 0;
        let mut with_frontmatter = 0;

        for discovered in self.discover() {
            total_scanned += 1;
            let path = match discovered {
                Ok(path) => path,
                Err(issue) => {
                    plan.malformed_files.push(issue);
                    continue;
                }
            };

            let note_type = match classify(&path) {
                Classification::Malformed(reason) => {
                    tracing::debug!(path = %path.display(), %reason, "malformed note");
                    plan.malformed_files.push(PlanIssue { path, reason });
                    continue;
                }
                Classification::Unknown {
                    reason,
                    has_frontmatter,
                } => {
                    if has_frontmatter {
                        with_frontmatter += 1;
                    }
                    plan.unknown_type_files.push(PlanIssue { path, reason });
                    continue;
                }
                Classification::Typed(note_type) => {
                    with_frontmatter += 1;
                    note_type
                }
            };

            let Some(target_dir) = note_type.target_dir() else {
                continue;
            };
            let type_root = self.vault_root.join(target_dir);
            if path.starts_with(&type_root) {
                plan.correctly_placed.push(path);
                continue;
            }

            let Some(file_name) = path.file_name() else {
                plan.malformed_files.push(PlanIssue {
                    path,
                    reason: "path has no file name".to_string(),
                });
                continue;
            };
            let target_path = type_root.join(file_name);
            let operation = MoveOperation::planned(path, target_path, note_type);

            if fs::symlink_metadata(&operation.target_path).is_ok() {
                let reason = format!(
                    "target already exists: {}",
                    operation.target_path.display()
                );
                plan.conflicts.push(operation.into_conflict(reason));
            } else {
                candidates.push(operation);
            }
        }

        self.resolve_shared_targets(&mut plan, candidates);
        plan.finalize_stats(total_scanned, with_frontmatter);

        tracing::info!(
            scanned = plan.stats.total_scanned,
            to_move = plan.stats.to_move,
            issues = plan.stats.issues(),
            "dry run complete"
        );
        plan
    }

    /// Moves candidates that share a target path into the conflict list.
    fn resolve_shared_targets(&self, plan: &mut MovePlan, candidates: Vec<MoveOperation>) {
        let mut claims: HashMap<PathBuf, Vec<PathBuf>> = HashMap::new();
        for op in &candidates {
            claims
                .entry(op.target_path.clone())
                .or_default()
                .push(op.source_path.clone());
        }

        for op in candidates {
            let claimants = &claims[&op.target_path];
            if claimants.len() == 1 {
                plan.operations.push(op);
                continue;
            }
            let others: Vec<String> = claimants
                .iter()
                .filter(|source| **source != op.source_path)
                .map(|source| self.display_relative(source))
                .collect();
            let reason = format!(
                "ambiguous target {}: also claimed by {}",
                op.target_path.display(),
                others.join(", ")
            );
            plan.conflicts.push(op.into_conflict(reason));
        }
    }

    /// Yields every markdown file below the vault root, skipping excluded paths.
    fn discover(&self) -> impl Iterator<Item = Result<PathBuf, PlanIssue>> + '_ {
        let root = &self.vault_root;
        WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                entry
                    .path()
                    .strip_prefix(root)
                    .map(|rel| !self.exclude.should_exclude(rel))
                    .unwrap_or(true)
            })
            .filter_map(move |entry| match entry {
                Ok(entry) => {
                    let has_md_extension = entry
                        .path()
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));
                    if !has_md_extension {
                        return None;
                    }
                    if entry.path_is_symlink() {
                        tracing::warn!(path = %entry.path().display(), "symlinked note left in place");
                        return Some(Err(PlanIssue {
                            path: entry.into_path(),
                            reason: "symbolic link; not moved".to_string(),
                        }));
                    }
                    entry.file_type().is_file().then(|| Ok(entry.into_path()))
                }
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                    tracing::warn!(path = %path.display(), error = %e, "could not scan path");
                    Some(Err(PlanIssue {
                        path,
                        reason: format!("could not scan: {}", e),
                    }))
                }
            })
    }

    fn display_relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.vault_root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

fn classify(path: &Path) -> Classification {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            return Classification::Malformed(format!("read error ({:?}): {}", e.kind(), e));
        }
    };
    let content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => return Classification::Malformed(format!("not valid UTF-8: {}", e.utf8_error())),
    };

    let note = match VaultNote::from_content(path, &content) {
        Ok(note) => note,
        Err(reason) => return Classification::Malformed(reason),
    };

    if note.note_type == NoteType::Unknown {
        return Classification::Unknown {
            reason: note.unknown_type_reason(),
            has_frontmatter: note.frontmatter.is_some(),
        };
    }
    Classification::Typed(note.note_type)
}
