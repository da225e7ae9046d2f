//! Notice and aggregate-check commands

use anyhow::Result;

use super::{finish, print_json, Context};
use crate::cli::{DismissArgs, JsonArgs};
use crate::output;

pub fn check_recommended(ctx: &Context, args: JsonArgs) -> Result<()> {
    let envelope = ctx.service.check_recommended();
    if args.json {
        return print_json(&envelope);
    }
    if envelope.all_active == Some(true) {
        output::success(&envelope.message);
    } else {
        output::warning(&envelope.message);
    }
    Ok(())
}

pub fn list(ctx: &Context, args: JsonArgs) -> Result<()> {
    let pending = ctx.service.pending_notices(&ctx.caller);
    if args.json {
        return print_json(&pending);
    }

    if pending.is_empty() {
        output::success("No pending notices.");
        return Ok(());
    }
    for notice in &pending {
        output::warning(&notice.message);
        output::kv("Packages", &notice.slugs.join(", "));
        output::kv(
            "Dismiss with",
            &format!("tether dismiss {}", notice.class.as_str()),
        );
    }
    Ok(())
}

pub fn dismiss(ctx: &Context, args: DismissArgs) -> Result<()> {
    finish(ctx.service.dismiss(&ctx.caller, args.class), false)
}
