//! Tether CLI - keep declared add-on packages converged
//!
//! This is the main entry point for the Tether command-line interface.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};
use commands::Context;

fn main() -> Result<()> {
    // Initialize rustls crypto provider (required for rustls 0.23+)
    // This must be done before any TLS operations
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let ctx = Context::load(cli.config.as_deref(), &cli.user)?;

    match cli.command {
        Commands::Status(args) => commands::status::run(&ctx, args),
        Commands::Install(args) => commands::package::install(&ctx, args),
        Commands::Activate(args) => commands::package::activate(&ctx, args),
        Commands::Update(args) => commands::package::update(&ctx, args),
        Commands::InstallRequired(args) => commands::bulk::install_required(&ctx, args),
        Commands::InstallRecommended(args) => commands::bulk::install_recommended(&ctx, args),
        Commands::UpdateAll(args) => commands::bulk::update_all(&ctx, args),
        Commands::Sweep(args) => commands::bulk::sweep(&ctx, args),
        Commands::Switch(args) => commands::bulk::switch(&ctx, args),
        Commands::CheckRecommended(args) => commands::notices::check_recommended(&ctx, args),
        Commands::Notices(args) => commands::notices::list(&ctx, args),
        Commands::Dismiss(args) => commands::notices::dismiss(&ctx, args),
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
