//! Bulk convergence commands

use anyhow::Result;
use tether_packages::{Envelope, ReconciliationResult};

use super::{finish, print_json, print_results, Context};
use crate::cli::BulkArgs;
use crate::output;

fn with_spinner<T>(json: bool, msg: &str, f: impl FnOnce() -> T) -> T {
    let pb = (!json).then(|| output::spinner(msg));
    let value = f();
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    value
}

pub fn install_required(ctx: &Context, args: BulkArgs) -> Result<()> {
    let envelope = with_spinner(args.json, "Installing required packages...", || {
        ctx.service.install_required(&ctx.caller)
    })?;
    finish(envelope, args.json)
}

pub fn install_recommended(ctx: &Context, args: BulkArgs) -> Result<()> {
    let envelope = with_spinner(args.json, "Installing recommended packages...", || {
        ctx.service.install_recommended(&ctx.caller)
    })?;
    finish(envelope, args.json)
}

pub fn update_all(ctx: &Context, args: BulkArgs) -> Result<()> {
    let envelope = with_spinner(args.json, "Updating packages...", || {
        ctx.service.update_all(&ctx.caller)
    })?;
    finish(envelope, args.json)
}

pub fn sweep(ctx: &Context, args: BulkArgs) -> Result<()> {
    let result = with_spinner(args.json, "Checking required packages...", || {
        ctx.service.sweep(&ctx.caller)
    });
    match result {
        Some(result) => report(result, args.json, "Required package sweep"),
        None => {
            if args.json {
                print_json(&Envelope::success("Required packages were checked recently."))
            } else {
                output::info("Required packages were checked recently; nothing to do.");
                Ok(())
            }
        }
    }
}

pub fn switch(ctx: &Context, args: BulkArgs) -> Result<()> {
    let result = with_spinner(args.json, "Installing required packages...", || {
        ctx.service.on_switch(&ctx.caller)
    });
    match result {
        Some(result) => report(result, args.json, "Switch install"),
        None => {
            if !args.json {
                output::info("No required packages declared.");
            }
            Ok(())
        }
    }
}

fn report(result: ReconciliationResult, json: bool, what: &str) -> Result<()> {
    if json {
        print_json(&result)?;
    } else {
        print_results(&result);
    }

    let summary = format!(
        "{}: {} of {} packages converged",
        what, result.success_count, result.total_count
    );
    match result.into_error() {
        None => {
            if !json {
                output::success(&summary);
            }
            Ok(())
        }
        Some(err) => Err(anyhow::Error::new(err).context(summary)),
    }
}
