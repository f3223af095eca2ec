/// Integration tests for vault-organizer
///
/// These tests drive the library the way the CLI does, against a temporary
/// vault with an external backup root.
///
/// Test categories:
/// 1. Dry-run planning and the no-mutation guarantee
/// 2. Conflict safety during planning and execution
/// 3. Backup, rollback and pruning
/// 4. Path nesting and exclusion rules
/// 5. CLI command flows
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use vault_organizer::backup::{BackupEngine, BackupError, SnapshotKind};
use vault_organizer::cli::{CliError, Command, run_command};
use vault_organizer::config::{ConfigurationError, OrganizerConfig, Settings};
use vault_organizer::exclude::ExcludeMatcher;
use vault_organizer::executor::MoveExecutor;
use vault_organizer::path_guard;
use vault_organizer::planner::{DryRunPlanner, MovePlan, MoveStatus};

// ============================================================================
// Test Utilities
// ============================================================================

/// A temporary vault named `notes` next to an external backup root.
struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(temp_dir.path().join("notes")).expect("Failed to create vault");
        TestFixture { temp_dir }
    }

    fn vault(&self) -> PathBuf {
        self.temp_dir.path().join("notes")
    }

    fn backup_root(&self) -> PathBuf {
        self.temp_dir.path().join("vault-backups")
    }

    /// Create a file (and its parent directories) inside the vault.
    fn create_note(&self, rel_path: &str, content: &str) {
        let path = self.vault().join(rel_path);
        fs::create_dir_all(path.parent().expect("note has a parent")).expect("Failed to create dir");
        fs::write(&path, content).expect("Failed to write note");
    }

    fn read_note(&self, rel_path: &str) -> String {
        fs::read_to_string(self.vault().join(rel_path)).expect("Failed to read note")
    }

    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.vault().join(rel_path);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_file_not_exists(&self, rel_path: &str) {
        let path = self.vault().join(rel_path);
        assert!(!path.exists(), "File should not exist: {}", path.display());
    }

    /// Every file in the vault mapped to its bytes, keyed by relative path.
    fn snapshot_contents(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        tree_contents(&self.vault())
    }

    fn planner(&self) -> DryRunPlanner {
        DryRunPlanner::new(&self.vault(), ExcludeMatcher::with_defaults(None))
    }

    fn engine(&self) -> BackupEngine {
        BackupEngine::new(
            &self.vault(),
            Some(&self.backup_root()),
            ExcludeMatcher::with_defaults(None),
        )
        .expect("Failed to create backup engine")
    }

    fn settings(&self) -> Settings {
        OrganizerConfig {
            vault_root: Some(self.vault()),
            backup_root: Some(self.backup_root()),
            ..OrganizerConfig::default()
        }
        .resolve()
        .expect("Failed to resolve settings")
    }

    fn run(&self, command: Command, input: &str) -> Result<(), CliError> {
        run_command(
            &command,
            &self.settings(),
            &mut Cursor::new(input.as_bytes().to_vec()),
        )
    }
}

fn tree_contents(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut contents = BTreeMap::new();
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry.expect("Failed to walk tree");
        if entry.file_type().is_file() {
            let rel = entry
                .path()
                .strip_prefix(root)
                .expect("entry under root")
                .to_path_buf();
            contents.insert(rel, fs::read(entry.path()).expect("Failed to read file"));
        }
    }
    contents
}

fn relative_targets(plan: &MovePlan) -> Vec<PathBuf> {
    plan.operations
        .iter()
        .map(|op| {
            op.target_path
                .strip_prefix(&plan.vault_root)
                .expect("target inside vault")
                .to_path_buf()
        })
        .collect()
}

fn mixed_vault(fixture: &TestFixture) {
    fixture.create_note("Inbox/a.md", "---\ntype: permanent\ntags: [idea]\n---\n# A\n");
    fixture.create_note("Inbox/b.md", "---\ntype: Literature\n---\n# B\n");
    fixture.create_note("Inbox/c.md", "# C without frontmatter\n");
    fixture.create_note("Inbox/d.md", "---\ntype: draft\n---\n");
    fixture.create_note("Inbox/e.md", "---\ntype: [unclosed\n---\n");
    fixture.create_note("Inbox/f.md", "---\ntype: fleeting\n");
    fixture.create_note("Permanent Notes/topic/g.md", "---\ntype: permanent\n---\n");
    fixture.create_note("Permanent Notes/h.md", "---\ntype: permanent\n---\n");
    fixture.create_note("Inbox/h.md", "---\ntype: permanent\n---\n");
    fixture.create_note("Projects/x/same.md", "---\ntype: fleeting\n---\n");
    fixture.create_note("Projects/y/same.md", "---\ntype: fleeting\n---\n");
    fixture.create_note("Attachments/image.png", "not a note");
    fixture.create_note(".git/HEAD.md", "---\ntype: permanent\n---\n");
}

// ============================================================================
// Dry-Run Planning
// ============================================================================

#[test]
fn test_basic_triage_scenario() {
    let fixture = TestFixture::new();
    fixture.create_note("Inbox/a.md", "---\ntype: permanent\n---\nA");
    fixture.create_note("Inbox/b.md", "---\ntype: literature\n---\nB");
    fixture.create_note("Inbox/c.md", "C");
    let before = fixture.snapshot_contents();

    let plan = fixture.planner().plan();

    assert_eq!(
        relative_targets(&plan),
        vec![
            PathBuf::from("Permanent Notes/a.md"),
            PathBuf::from("Literature Notes/b.md")
        ]
    );
    assert_eq!(plan.unknown_type_files.len() + plan.malformed_files.len(), 1);
    assert_eq!(plan.stats.total_scanned, 3);
    assert_eq!(plan.stats.to_move, 2);
    assert_eq!(fixture.snapshot_contents(), before);
}

#[test]
fn test_dry_run_leaves_vault_byte_identical() {
    let fixture = TestFixture::new();
    mixed_vault(&fixture);
    let before = fixture.snapshot_contents();

    let plan = fixture.planner().plan();
    let _ = vault_organizer::generate_report(&plan, vault_organizer::ReportFormat::Markdown);

    assert_eq!(fixture.snapshot_contents(), before);
    fixture.assert_file_not_exists("Literature Notes");
    fixture.assert_file_not_exists("Fleeting Notes");
}

#[test]
fn test_every_note_classified_exactly_once() {
    let fixture = TestFixture::new();
    mixed_vault(&fixture);

    let plan = fixture.planner().plan();

    let mut seen: Vec<PathBuf> = plan
        .operations
        .iter()
        .chain(plan.conflicts.iter())
        .map(|op| op.source_path.clone())
        .chain(plan.correctly_placed.iter().cloned())
        .chain(plan.unknown_type_files.iter().map(|issue| issue.path.clone()))
        .chain(plan.malformed_files.iter().map(|issue| issue.path.clone()))
        .collect();
    seen.sort();
    let total = seen.len();
    seen.dedup();
    assert_eq!(seen.len(), total, "a note was classified twice");

    let mut expected: Vec<PathBuf> = fixture
        .snapshot_contents()
        .into_keys()
        .filter(|rel| rel.extension().is_some_and(|ext| ext == "md"))
        .filter(|rel| !rel.starts_with(".git"))
        .map(|rel| plan.vault_root.join(rel))
        .collect();
    expected.sort();

    assert_eq!(seen, expected);
    assert_eq!(plan.stats.total_scanned, expected.len());
}

#[test]
fn test_notes_in_type_subfolders_stay_put() {
    let fixture = TestFixture::new();
    mixed_vault(&fixture);

    let plan = fixture.planner().plan();

    assert!(plan
        .correctly_placed
        .contains(&plan.vault_root.join("Permanent Notes/topic/g.md")));
    assert!(plan
        .operations
        .iter()
        .all(|op| !op.source_path.starts_with(plan.vault_root.join("Permanent Notes"))));
}

#[test]
fn test_same_target_from_two_folders_is_a_conflict() {
    let fixture = TestFixture::new();
    mixed_vault(&fixture);

    let plan = fixture.planner().plan();

    let shared: Vec<_> = plan
        .conflicts
        .iter()
        .filter(|op| op.target_path.ends_with("Fleeting Notes/same.md"))
        .collect();
    assert_eq!(shared.len(), 2);
    assert!(plan
        .operations
        .iter()
        .all(|op| !op.target_path.ends_with("Fleeting Notes/same.md")));
}

// ============================================================================
// Conflict Safety
// ============================================================================

#[test]
fn test_conflict_scenario_touches_neither_file() {
    let fixture = TestFixture::new();
    fixture.create_note("Inbox/a.md", "---\ntype: permanent\n---\ninbox version");
    fixture.create_note("Permanent Notes/a.md", "---\ntype: permanent\n---\nexisting version");

    let mut plan = fixture.planner().plan();
    assert_eq!(plan.stats.conflicts, 1);
    assert!(plan.operations.is_empty());
    assert_eq!(plan.conflicts[0].status, MoveStatus::Conflict);

    let result = MoveExecutor::execute(&mut plan);

    assert_eq!(result.executed_count(), 0);
    assert_eq!(result.skipped, 1);
    assert_eq!(fixture.read_note("Inbox/a.md"), "---\ntype: permanent\n---\ninbox version");
    assert_eq!(
        fixture.read_note("Permanent Notes/a.md"),
        "---\ntype: permanent\n---\nexisting version"
    );
}

#[test]
fn test_target_created_after_planning_is_not_overwritten() {
    let fixture = TestFixture::new();
    fixture.create_note("Inbox/a.md", "---\ntype: literature\n---\nmine");
    fixture.create_note("Inbox/b.md", "---\ntype: literature\n---\nother");

    let mut plan = fixture.planner().plan();
    assert_eq!(plan.stats.to_move, 2);
    fixture.create_note("Literature Notes/a.md", "appeared meanwhile");

    let result = MoveExecutor::execute(&mut plan);

    assert_eq!(result.executed_count(), 1);
    assert_eq!(result.failed_count(), 1);
    assert_eq!(fixture.read_note("Literature Notes/a.md"), "appeared meanwhile");
    fixture.assert_file_exists("Inbox/a.md");
    fixture.assert_file_exists("Literature Notes/b.md");
    fixture.assert_file_not_exists("Inbox/b.md");
}

// ============================================================================
// Backup and Rollback
// ============================================================================

#[test]
fn test_backup_rollback_round_trip() {
    let fixture = TestFixture::new();
    mixed_vault(&fixture);
    let engine = fixture.engine();
    let snapshot = engine.create_backup().expect("Backup failed");
    let before = tree_contents(&fixture.vault());

    fixture.create_note("Inbox/a.md", "rewritten");
    fixture.create_note("New/new.md", "added after backup");
    fs::remove_file(fixture.vault().join("Inbox/b.md")).expect("Failed to remove note");
    let mutated = fixture.snapshot_contents();

    let report = engine.rollback(&snapshot).expect("Rollback failed");

    let restored = fixture.snapshot_contents();
    let without_git = |tree: &BTreeMap<PathBuf, Vec<u8>>| {
        tree.iter()
            .filter(|(rel, _)| !rel.starts_with(".git"))
            .map(|(rel, bytes)| (rel.clone(), bytes.clone()))
            .collect::<BTreeMap<_, _>>()
    };
    assert_eq!(without_git(&restored), without_git(&before));
    assert!(!fixture.vault().join("New").exists());

    let emergency = &report.emergency_snapshot;
    assert_eq!(emergency.kind, SnapshotKind::Emergency);
    let emergency_tree: BTreeMap<_, _> = tree_contents(&emergency.root_path)
        .into_iter()
        .filter(|(rel, _)| rel != Path::new(".snapshot.json"))
        .collect();
    assert_eq!(emergency_tree, without_git(&mutated));
}

#[test]
fn test_backup_skips_excluded_paths() {
    let fixture = TestFixture::new();
    fixture.create_note("a.md", "note");
    fixture.create_note(".git/config", "git");
    fixture.create_note("py_env/lib.py", "venv");
    fixture.create_note("node_modules/pkg/index.js", "js");

    let snapshot = fixture.engine().create_backup().expect("Backup failed");

    assert!(snapshot.complete);
    assert_eq!(snapshot.file_count, 1);
    assert!(snapshot.root_path.join("a.md").exists());
    assert!(!snapshot.root_path.join(".git").exists());
    assert!(!snapshot.root_path.join("py_env").exists());
}

#[test]
fn test_same_second_backups_get_distinct_names() {
    let fixture = TestFixture::new();
    fixture.create_note("a.md", "note");
    let engine = fixture.engine();
    let at = NaiveDate::from_ymd_opt(2025, 3, 14)
        .and_then(|d| d.and_hms_opt(15, 9, 26))
        .expect("valid timestamp");

    let first = engine.create_backup_at(at).expect("first backup");
    let second = engine.create_backup_at(at).expect("second backup");
    let third = engine.create_backup_at(at).expect("third backup");

    assert_eq!(first.name, "notes-20250314-150926");
    assert_eq!(second.name, "notes-20250314-150926-01");
    assert_eq!(third.name, "notes-20250314-150926-02");
    assert_eq!(engine.list_backups().expect("list").len(), 3);
}

#[test]
fn test_prune_keeps_newest_by_name_timestamp() {
    let fixture = TestFixture::new();
    fixture.create_note("a.md", "note");
    let engine = fixture.engine();
    for day in [3, 1, 2] {
        let at = NaiveDate::from_ymd_opt(2025, 1, day)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .expect("valid timestamp");
        engine.create_backup_at(at).expect("backup");
    }

    let dry = engine.prune_backups(1, true).expect("dry-run prune");
    assert_eq!(dry.deleted.len(), 2);
    assert_eq!(engine.list_backups().expect("list").len(), 3);

    let pruned = engine.prune_backups(1, false).expect("prune");
    assert_eq!(pruned.kept, vec!["notes-20250103-080000".to_string()]);
    let remaining = engine.list_backups().expect("list");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "notes-20250103-080000");
}

// ============================================================================
// Nesting and Exclusion
// ============================================================================

#[test]
fn test_nested_backup_rejected_before_any_directory_is_created() {
    let fixture = TestFixture::new();
    let nested = fixture.vault().join("backups");

    let result = BackupEngine::new(
        &fixture.vault(),
        Some(&nested),
        ExcludeMatcher::with_defaults(None),
    );

    assert!(matches!(
        result,
        Err(ConfigurationError::NestedBackupRoot { .. })
    ));
    assert!(!nested.exists());
}

#[test]
fn test_nesting_rules_for_sibling_and_descendant_paths() {
    let fixture = TestFixture::new();
    let root = fixture.temp_dir.path();
    let v = root.join("v");
    fs::create_dir(&v).expect("Failed to create dir");

    assert!(path_guard::validate_not_nested(&v, &v.join("backups")).is_err());
    assert!(path_guard::validate_not_nested(&v, &v.join("sub/backups")).is_err());
    assert!(path_guard::validate_not_nested(&v, &v).is_err());
    assert!(path_guard::validate_not_nested(&v, &root.join("other/backups")).is_ok());
    assert!(path_guard::validate_not_nested(&v, &root.join("v_parent/backups")).is_ok());
}

#[test]
fn test_exclude_patterns() {
    let matcher = ExcludeMatcher::new(&["backups", "*_env"]).expect("valid patterns");

    assert!(matcher.should_exclude(Path::new("backups/x.md")));
    assert!(matcher.should_exclude(Path::new("web_env/lib.py")));
    assert!(matcher.should_exclude(Path::new("myproject_env")));
    assert!(!matcher.should_exclude(Path::new("my_backups_archive/file.md")));
}

// ============================================================================
// CLI Flows
// ============================================================================

#[test]
fn test_cli_execute_requires_backup_then_undo_reverts() {
    let fixture = TestFixture::new();
    fixture.create_note("Inbox/a.md", "---\ntype: permanent\n---\n");
    fixture.create_note("Inbox/b.md", "---\ntype: fleeting\n---\n");
    let execute = Command::Organize {
        dry_run: false,
        execute: true,
        output: None,
        plan: None,
        skip_backup_check: false,
    };

    let refused = fixture.run(execute.clone(), "");
    assert!(matches!(refused, Err(CliError::BackupRequired { .. })));
    fixture.assert_file_exists("Inbox/a.md");

    fixture
        .run(Command::Backup { output: None }, "")
        .expect("backup should succeed");
    fixture.run(execute, "").expect("execute should succeed");
    fixture.assert_file_exists("Permanent Notes/a.md");
    fixture.assert_file_exists("Fleeting Notes/b.md");

    fixture.run(Command::Undo, "").expect("undo should succeed");
    fixture.assert_file_exists("Inbox/a.md");
    fixture.assert_file_exists("Inbox/b.md");

    let second_undo = fixture.run(Command::Undo, "");
    assert!(matches!(second_undo, Err(CliError::History(_))));
}

#[test]
fn test_cli_rollback_requires_confirmation() {
    let fixture = TestFixture::new();
    fixture.create_note("a.md", "original");
    fixture
        .run(Command::Backup { output: None }, "")
        .expect("backup should succeed");
    let name = fixture.engine().list_backups().expect("list")[0].name.clone();
    fixture.create_note("a.md", "changed");

    fixture
        .run(
            Command::Rollback {
                snapshot: name.clone(),
                yes: false,
            },
            "nope\n",
        )
        .expect("cancel is not an error");
    assert_eq!(fixture.read_note("a.md"), "changed");

    fixture
        .run(
            Command::Rollback {
                snapshot: name,
                yes: false,
            },
            "yes\n",
        )
        .expect("rollback should succeed");
    assert_eq!(fixture.read_note("a.md"), "original");
}

#[test]
fn test_cli_backup_with_nested_root_fails() {
    let fixture = TestFixture::new();
    let settings = OrganizerConfig {
        vault_root: Some(fixture.vault()),
        backup_root: Some(fixture.vault().join("backups")),
        ..OrganizerConfig::default()
    }
    .resolve()
    .expect("resolution does not check nesting");

    let result = run_command(
        &Command::Backup { output: None },
        &settings,
        &mut Cursor::new(Vec::new()),
    );

    let err = result.expect_err("nested backup root must be rejected");
    assert!(matches!(
        err,
        CliError::Configuration(ConfigurationError::NestedBackupRoot { .. })
    ));
    assert!(err.remedy().is_some());
    assert!(!fixture.vault().join("backups").exists());
}

#[test]
fn test_cli_rollback_of_missing_snapshot() {
    let fixture = TestFixture::new();
    let result = fixture.run(
        Command::Rollback {
            snapshot: "notes-20000101-000000".to_string(),
            yes: true,
        },
        "",
    );
    assert!(matches!(
        result,
        Err(CliError::Backup(BackupError::SnapshotNotFound { .. }))
    ));
}
