//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use tether_core::types::NoticeClass;
use tether_packages::CatalogFilter;

/// Tether - keep declared add-on packages installed, active and current
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a config file used in place of ~/.tether/config.yaml
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// User the operation runs as (dismissals are stored per user)
    #[arg(long, global = true, env = "TETHER_USER", default_value = "admin")]
    pub user: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show every catalog package with its state
    Status(StatusArgs),

    /// Install one package without activating it
    Install(PackageArgs),

    /// Activate one installed package
    Activate(PackageArgs),

    /// Update one package to its latest available version
    Update(PackageArgs),

    /// Install and activate every required package
    InstallRequired(BulkArgs),

    /// Install and activate every catalog package
    InstallRecommended(BulkArgs),

    /// Update every package below its minimum version
    UpdateAll(BulkArgs),

    /// Run the rate-limited required-package sweep
    Sweep(BulkArgs),

    /// Run the post-switch install of required packages
    Switch(BulkArgs),

    /// Report whether every catalog package is active
    CheckRecommended(JsonArgs),

    /// Show notices pending for the user
    Notices(JsonArgs),

    /// Dismiss a notice class for the user
    Dismiss(DismissArgs),
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Only show one tab (all, featured, required, active, inactive, not-installed)
    #[arg(short, long)]
    pub filter: Option<CatalogFilter>,
}

#[derive(Args, Debug)]
pub struct PackageArgs {
    /// Package slug
    pub slug: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct BulkArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct JsonArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct DismissArgs {
    /// Notice class (required, recommended, updates)
    pub class: NoticeClass,
}
