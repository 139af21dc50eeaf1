//! Terminal UI for the recon pipeline, rendered via `indicatif`.
//!
//! Two bars are stacked vertically:
//! - Phase bar — tracks how many phases have completed or been skipped
//! - Monitor bar — spinner with the live finished-target tally while a
//!   session-driven phase is being polled
//!
//! All output goes through `MultiProgress` so printed lines never tear the
//! bars.

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct ReconUI {
    multi: MultiProgress,
    phase_bar: ProgressBar,
    monitor_bar: ProgressBar,
    verbose: bool,
}

impl ReconUI {
    pub fn new(total_phases: u64, verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let phase_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let phase_bar = multi.add(ProgressBar::new(total_phases));
        phase_bar.set_style(phase_style);
        phase_bar.set_prefix("Phases");

        let monitor_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let monitor_bar = multi.add(ProgressBar::new_spinner());
        monitor_bar.set_style(monitor_style);
        monitor_bar.set_prefix("  Scan");

        Self {
            multi,
            phase_bar,
            monitor_bar,
            verbose,
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the
    /// rich UI fails, so failure banners are never silently lost.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn print_phase_header(&self, label: &str, hosts_file: &std::path::Path) {
        self.print_line("");
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
        self.print_line(format!(
            "{} Phase {}",
            style("▶").green().bold(),
            style(label).yellow().bold()
        ));
        self.print_line(format!(
            "{}  {}",
            style("Hosts:").dim(),
            hosts_file.display()
        ));
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
    }

    pub fn start_phase(&self, label: &str) {
        self.phase_bar.set_message(label.to_string());
        self.monitor_bar
            .enable_steady_tick(Duration::from_millis(100));
        self.monitor_bar.set_message("launching scan tool...");
    }

    /// Short status line under the current phase; printed only in verbose mode.
    pub fn log_step(&self, msg: &str) {
        self.monitor_bar
            .set_message(format!("{}", style(msg).dim()));
        if self.verbose {
            self.print_line(format!("    {} {}", style("→").dim(), style(msg).dim()));
        }
    }

    /// Announce one newly finished target and refresh the tally.
    pub fn host_finished(&self, target: &str, seen: usize, expected: usize) {
        self.print_line(format!(
            "    {} finished {}",
            style("✔").green(),
            style(target).yellow()
        ));
        self.monitor_bar.set_message(format!(
            "{}/{} targets finished",
            style(seen).green(),
            expected
        ));
    }

    pub fn phase_skipped(&self, label: &str) {
        self.phase_bar.inc(1);
        self.print_line(format!(
            "{} Phase {} already complete, skipping (use --force-phase to re-run)",
            style("≡").dim(),
            style(label).green()
        ));
    }

    pub fn phase_complete(&self, label: &str) {
        self.phase_bar.inc(1);
        self.monitor_bar.finish_with_message("done");
        self.print_line(format!(
            "{} Phase {} complete",
            style("✔").green().bold(),
            style(label).green().bold()
        ));
    }

    pub fn phase_failed(&self, label: &str, reason: &str) {
        self.monitor_bar.finish_with_message("failed");
        self.print_line(format!(
            "{} Phase {} failed: {}",
            style("✘").red().bold(),
            style(label).red().bold(),
            reason
        ));
    }
}
