//! Single-package commands

use anyhow::Result;

use super::{finish, Context};
use crate::cli::PackageArgs;
use crate::output;

pub fn install(ctx: &Context, args: PackageArgs) -> Result<()> {
    let pb = (!args.json).then(|| output::spinner(&format!("Installing {}...", args.slug)));
    let envelope = ctx.service.install_one(&ctx.caller, &args.slug);
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    finish(envelope?, args.json)
}

pub fn activate(ctx: &Context, args: PackageArgs) -> Result<()> {
    finish(ctx.service.activate_one(&ctx.caller, &args.slug)?, args.json)
}

pub fn update(ctx: &Context, args: PackageArgs) -> Result<()> {
    let pb = (!args.json).then(|| output::spinner(&format!("Updating {}...", args.slug)));
    let envelope = ctx.service.update_one(&ctx.caller, &args.slug);
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    finish(envelope?, args.json)
}
