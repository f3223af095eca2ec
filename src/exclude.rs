//! Exclude patterns for vault traversal.
//!
//! Patterns are either exact names (`backups`) or shell globs (`*_env`).
//! A relative path is excluded when any pattern matches its file name, any of
//! its parent directory names, or the whole relative path.

use crate::config::ConfigurationError;
use glob::{MatchOptions, Pattern};
use std::path::{Component, Path};

/// Patterns used when the configuration does not list any.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "backups",
    ".git",
    "*_env",
    "*.venv",
    "__pycache__",
    "node_modules",
    ".pytest_cache",
];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compiled exclude patterns.
#[derive(Debug, Clone)]
pub struct ExcludeMatcher {
    raw: Vec<String>,
    patterns: Vec<Pattern>,
}

impl ExcludeMatcher {
    /// Compiles the given patterns.
    ///
    /// An empty list disables exclusion entirely and logs a warning.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidGlobPattern` for patterns that do not compile.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigurationError> {
        if patterns.is_empty() {
            tracing::warn!("exclude pattern list is empty; every file in the vault will be included");
        }

        let raw: Vec<String> = patterns.iter().map(|p| p.as_ref().to_string()).collect();
        let patterns = raw
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|e| ConfigurationError::InvalidGlobPattern {
                    pattern: pattern.clone(),
                    reason: e.msg.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { raw, patterns })
    }

    /// The default pattern set, plus the embedding/model cache directory if one is configured.
    pub fn with_defaults(model_cache_dir: Option<&str>) -> Self {
        let mut raw: Vec<String> = DEFAULT_EXCLUDE_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .collect();
        let mut patterns: Vec<Pattern> = DEFAULT_EXCLUDE_PATTERNS
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .collect();

        if let Some(cache_dir) = model_cache_dir.filter(|dir| !dir.is_empty()) {
            raw.push(cache_dir.to_string());
            if let Ok(pattern) = Pattern::new(&Pattern::escape(cache_dir)) {
                patterns.push(pattern);
            }
        }

        Self { raw, patterns }
    }

    /// The patterns as configured.
    pub fn patterns(&self) -> &[String] {
        &self.raw
    }

    /// True when no pattern is configured.
    pub fn is_disabled(&self) -> bool {
        self.raw.is_empty()
    }

    /// Decides whether a path relative to the vault root should be skipped.
    ///
    /// # Examples
    ///
    /// ```
    /// use vault_organizer::exclude::ExcludeMatcher;
    /// use std::path::Path;
    ///
    /// let matcher = ExcludeMatcher::new(&["backups", "*_env"]).unwrap();
    /// assert!(matcher.should_exclude(Path::new("backups/x.md")));
    /// assert!(matcher.should_exclude(Path::new("web_env/lib.py")));
    /// assert!(!matcher.should_exclude(Path::new("my_backups_archive/file.md")));
    /// ```
    pub fn should_exclude(&self, relative_path: &Path) -> bool {
        if self.is_disabled() {
            return false;
        }

        let component_match = relative_path.components().any(|component| match component {
            Component::Normal(name) => self.matches_name(&name.to_string_lossy()),
            _ => false,
        });
        if component_match {
            return true;
        }

        let full = relative_path.to_string_lossy().replace('\\', "/");
        let full = full.trim_end_matches('/');
        self.raw.iter().any(|raw| raw == full)
            || self
                .patterns
                .iter()
                .any(|pattern| pattern.matches_with(full, MATCH_OPTIONS))
    }

    fn matches_name(&self, name: &str) -> bool {
        self.raw.iter().any(|raw| raw == name)
            || self
                .patterns
                .iter()
                .any(|pattern| pattern.matches_with(name, MATCH_OPTIONS))
    }
}

/// One-shot form of [`ExcludeMatcher::should_exclude`].
///
/// Patterns that are not valid globs still match as exact names.
pub fn should_exclude(relative_path: &Path, patterns: &[&str]) -> bool {
    match ExcludeMatcher::new(patterns) {
        Ok(matcher) => matcher.should_exclude(relative_path),
        Err(_) => {
            let names: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
            let matcher = ExcludeMatcher {
                raw: names,
                patterns: patterns.iter().filter_map(|p| Pattern::new(p).ok()).collect(),
            };
            matcher.should_exclude(relative_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(patterns: &[&str]) -> ExcludeMatcher {
        ExcludeMatcher::new(patterns).expect("patterns should compile")
    }

    #[test]
    fn test_exact_directory_name() {
        let m = matcher(&["backups", "*_env"]);
        assert!(m.should_exclude(Path::new("backups")));
        assert!(m.should_exclude(Path::new("backups/x.md")));
        assert!(m.should_exclude(Path::new("Projects/backups/old.md")));
    }

    #[test]
    fn test_wildcard_directory_name() {
        let m = matcher(&["backups", "*_env"]);
        assert!(m.should_exclude(Path::new("web_env/lib.py")));
        assert!(m.should_exclude(Path::new("myproject_env/")));
    }

    #[test]
    fn test_partial_name_is_not_a_match() {
        let m = matcher(&["backups", "*_env"]);
        assert!(!m.should_exclude(Path::new("my_backups_archive/file.md")));
        assert!(!m.should_exclude(Path::new("Inbox/environment.md")));
    }

    #[test]
    fn test_full_relative_path_pattern() {
        let m = matcher(&["Templates/*.md"]);
        assert!(m.should_exclude(Path::new("Templates/daily.md")));
        assert!(!m.should_exclude(Path::new("Templates/sub/daily.md")));
        assert!(!m.should_exclude(Path::new("Inbox/daily.md")));
    }

    #[test]
    fn test_defaults_cover_tooling_directories() {
        let m = ExcludeMatcher::with_defaults(None);
        assert!(m.should_exclude(Path::new(".git/HEAD")));
        assert!(m.should_exclude(Path::new("scripts/.venv/bin/python")));
        assert!(m.should_exclude(Path::new("scripts/__pycache__/a.pyc")));
        assert!(m.should_exclude(Path::new("node_modules/pkg/index.js")));
        assert!(m.should_exclude(Path::new(".pytest_cache/v/cache")));
        assert!(m.should_exclude(Path::new("tagger_env/bin/activate")));
        assert!(!m.should_exclude(Path::new("Inbox/note.md")));
        assert!(!m.should_exclude(Path::new(".obsidian/app.json")));
    }

    #[test]
    fn test_defaults_include_model_cache_dir() {
        let m = ExcludeMatcher::with_defaults(Some(".smart-env"));
        assert!(m.should_exclude(Path::new(".smart-env/embeddings.ajson")));
        assert!(m.patterns().contains(&".smart-env".to_string()));
    }

    #[test]
    fn test_empty_list_disables_exclusion() {
        let m = ExcludeMatcher::new::<&str>(&[]).expect("empty list is valid");
        assert!(m.is_disabled());
        assert!(!m.should_exclude(Path::new("backups/x.md")));
    }

    #[test]
    fn test_invalid_glob_is_rejected() {
        assert!(ExcludeMatcher::new(&["[unclosed"]).is_err());
    }

    #[test]
    fn test_free_function_matches_struct() {
        assert!(should_exclude(Path::new("backups/x.md"), &["backups"]));
        assert!(!should_exclude(Path::new("notes/x.md"), &["backups"]));
        assert!(should_exclude(Path::new("[odd]/x.md"), &["[odd]"]));
    }
}
