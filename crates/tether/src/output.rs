//! Terminal output for package states and reconciliation outcomes

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tether_core::types::PackageState;
use tether_packages::PackageOutcome;

pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Warnings go to stderr so `--json` output stays parseable
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("⚠").yellow().bold(), msg);
}

pub fn info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

pub fn header(msg: &str) {
    println!("\n{}", style(msg).bold().underlined());
}

pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", style(key).dim(), value);
}

/// Status label colored by how far the package is from converged
pub fn state(state: PackageState) -> String {
    let label = state.label();
    match state {
        PackageState::Active => style(label).green().to_string(),
        PackageState::ActiveNeedsUpdate | PackageState::InactiveNeedsUpdate => {
            style(label).yellow().to_string()
        }
        PackageState::Inactive => style(label).cyan().to_string(),
        PackageState::NotInstalled => style(label).red().to_string(),
    }
}

pub fn outcome(outcome: PackageOutcome) -> String {
    let text = outcome.as_str();
    match outcome {
        PackageOutcome::Failed => style(text).red().bold().to_string(),
        PackageOutcome::Skipped => style(text).dim().to_string(),
        PackageOutcome::AlreadyActive => text.to_string(),
        _ => style(text).green().to_string(),
    }
}

/// Spinner shown while a reconciliation pass talks to the host
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
