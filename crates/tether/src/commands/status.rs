//! Catalog status command

use anyhow::Result;
use console::style;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use tether_packages::catalog::SnapshotEntry;
use tether_packages::{CatalogCounts, CatalogFilter};

use super::{print_json, Context};
use crate::cli::StatusArgs;
use crate::output;

#[derive(Tabled)]
struct StatusRow {
    package: String,
    slug: String,
    #[tabled(rename = "type")]
    kind: String,
    status: String,
    version: String,
    action: String,
}

impl From<&SnapshotEntry> for StatusRow {
    fn from(entry: &SnapshotEntry) -> Self {
        let kind = if entry.spec.required {
            "Required"
        } else {
            "Recommended"
        };
        Self {
            package: entry.spec.name.clone(),
            slug: entry.spec.slug.clone(),
            kind: kind.to_string(),
            status: output::state(entry.state),
            version: entry.version_info().unwrap_or_default(),
            action: entry.action().unwrap_or("-").to_string(),
        }
    }
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    filter: Option<CatalogFilter>,
    counts: CatalogCounts,
    packages: Vec<&'a SnapshotEntry>,
}

/// Show every catalog package with its state
///
/// Without `--filter` the first non-empty tab is shown.
pub fn run(ctx: &Context, args: StatusArgs) -> Result<()> {
    let snapshot = ctx.service.snapshot();
    let filter = args.filter.or_else(|| snapshot.counts.default_filter());

    let packages: Vec<&SnapshotEntry> = match filter {
        Some(filter) => snapshot.filtered(filter).collect(),
        None => Vec::new(),
    };

    if args.json {
        return print_json(&StatusOutput {
            filter,
            counts: snapshot.counts,
            packages,
        });
    }

    output::header("Packages");
    let tabs: Vec<String> = snapshot
        .counts
        .available_filters()
        .into_iter()
        .map(|f| {
            let label = format!("{} ({})", f.label(), snapshot.counts.get(f));
            if Some(f) == filter {
                style(label).bold().to_string()
            } else {
                style(label).dim().to_string()
            }
        })
        .collect();
    if !tabs.is_empty() {
        println!("  {}", tabs.join("  "));
    }
    println!();

    if packages.is_empty() {
        output::info("No packages to show.");
        return Ok(());
    }

    let rows: Vec<StatusRow> = packages.into_iter().map(StatusRow::from).collect();
    let mut table = Table::new(&rows);
    table.with(Style::sharp());
    println!("{}", table);

    if snapshot.all_active() {
        output::success("All packages are active.");
    } else {
        let pending = snapshot.counts.all - snapshot.counts.active;
        output::kv("Needing attention", &pending.to_string());
    }
    Ok(())
}
