//! Terminal output.
//!
//! Every line the CLI shows to the user goes through [`OutputFormatter`] so
//! styling stays consistent across commands. Diagnostics meant for debugging
//! go through `tracing` instead.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const BAR_TEMPLATE: &str = "{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.cyan} {msg} ({elapsed})";

/// Styled terminal output for the CLI.
///
/// - success messages (green ✓)
/// - errors (red ✗, on stderr) and their remedies
/// - warnings (yellow ⚠)
/// - info lines (cyan)
/// - progress bars, spinners and summary tables
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// ```no_run
    /// use vault_organizer::output::OutputFormatter;
    /// OutputFormatter::success("Snapshot created");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red to stderr.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints the suggested fix for an error, indented under it.
    pub fn remedy(message: &str) {
        eprintln!("  {} {}", "→".yellow(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for `total` note moves.
    ///
    /// ```no_run
    /// use vault_organizer::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(12);
    /// pb.inc(1);
    /// pb.finish_with_message("done");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Creates a spinner for work of unknown length, such as copying a vault.
    pub fn create_spinner(message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Prints a two-column table of labelled counts under a `SUMMARY` header.
    ///
    /// Rows are printed in the given order; zero counts are dimmed.
    ///
    /// ```no_run
    /// use vault_organizer::output::OutputFormatter;
    /// OutputFormatter::summary_table(&[("To move", 4), ("Conflicts", 1)]);
    /// ```
    pub fn summary_table(rows: &[(&str, usize)]) {
        Self::header("SUMMARY");

        let width = rows
            .iter()
            .map(|(label, _)| label.chars().count())
            .max()
            .unwrap_or(0)
            .max(5);

        println!("{:<width$} | {}", "Item".bold(), "Notes".bold(), width = width);
        println!("{}", "-".repeat(width + 10));
        for (label, count) in rows {
            let count_text = if *count == 0 {
                count.to_string().dimmed()
            } else {
                count.to_string().green()
            };
            println!("{:<width$} | {}", label, count_text, width = width);
        }
        println!("{}", "-".repeat(width + 10));
    }

    /// Prints a dry-run notice in yellow.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}
