//! Config command - shows effective configuration.

use anyhow::Result;

use super::{parse_flags, Context, NoFlags};

pub const HELP: &[&str] = &["Show current configuration and required tools"];

/// Tools the docker workflow shells out to.
const TOOLS: [&str; 2] = ["docker", "curl"];

/// Execute the config command.
pub fn run(ctx: &mut Context<'_>, args: &[String]) -> Result<()> {
    if parse_flags::<NoFlags>(ctx, "config", args)?.is_none() {
        return Ok(());
    }

    writeln!(ctx.out, "Configuration:")?;
    for line in ctx.config.describe() {
        writeln!(ctx.out, "{}", line)?;
    }

    writeln!(ctx.out)?;
    writeln!(ctx.out, "Tools:")?;
    for tool in TOOLS {
        match ctx.runner.which(tool) {
            Some(path) => writeln!(ctx.out, "  {}: FOUND ({})", tool, path)?,
            None => writeln!(ctx.out, "  {}: NOT FOUND", tool)?,
        }
    }
    Ok(())
}
