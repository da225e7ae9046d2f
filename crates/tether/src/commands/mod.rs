//! CLI command implementations

pub mod bulk;
pub mod notices;
pub mod package;
pub mod status;

use anyhow::{anyhow, Context as _, Result};
use camino::Utf8Path;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use tether_core::HierarchicalConfigLoader;
use tether_packages::{Caller, Envelope, PackageService, ReconciliationResult};
use tracing::debug;

use crate::output;

/// Loaded configuration, service and caller shared by every command
pub struct Context {
    pub service: PackageService,
    pub caller: Caller,
}

impl Context {
    pub fn load(config: Option<&Utf8Path>, user: &str) -> Result<Self> {
        let loader = HierarchicalConfigLoader::new().context("Failed to locate config directory")?;
        let runtime = match config {
            Some(path) => loader.load_with_file(Some(path)),
            None => loader.load_runtime_config(),
        }
        .context("Failed to load configuration")?;
        debug!("Config directory: {}", loader.config_dir());

        let service = PackageService::from_config(&loader, &runtime)
            .context("Failed to initialize package service")?;

        // The local operator holds every capability
        Ok(Self {
            service,
            caller: Caller::administrator(user),
        })
    }
}

#[derive(Tabled)]
struct ResultRow {
    package: String,
    outcome: String,
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

/// Print per-package outcomes as a table
pub fn print_results(result: &ReconciliationResult) {
    if result.results.is_empty() {
        return;
    }
    let rows: Vec<ResultRow> = result
        .results
        .iter()
        .map(|r| ResultRow {
            package: r.slug.clone(),
            outcome: output::outcome(r.outcome),
        })
        .collect();
    let mut table = Table::new(&rows);
    table.with(Style::sharp());
    println!("{}", table);
}

/// Report an envelope; a failure envelope becomes the command's error
pub fn finish(envelope: Envelope, json: bool) -> Result<()> {
    if json {
        print_json(&envelope)?;
    } else if let Some(results) = &envelope.results {
        print_results(results);
    }

    if envelope.success {
        if !json {
            output::success(&envelope.message);
        }
        return Ok(());
    }

    match envelope.results {
        Some(results) => match results.into_error() {
            Some(err) => Err(anyhow!(err).context(envelope.message)),
            None => Err(anyhow!(envelope.message)),
        },
        None => Err(anyhow!(envelope.message)),
    }
}
