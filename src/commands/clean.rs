//! Clean command - removes build artifacts.

use anyhow::Result;
use clap::Parser;

use super::{parse_flags, Context};
use crate::clean::{CleanOptions, Cleaner};

pub const HELP: &[&str] = &[
    "Cleans temporary files.",
    "",
    "Flags:",
    "  -u, --update           Also remove Package.resolved if it exists",
    "  -k, --keep-checkouts   Keep git checkouts of dependencies",
    "      --json             Print the report as JSON",
];

#[derive(Parser, Debug)]
#[command(about = "Cleans temporary files.")]
pub struct CleanFlags {
    /// Cleans Package.resolved file if it exists.
    #[arg(short, long)]
    pub update: bool,

    /// Keep git checkouts of dependencies.
    #[arg(short, long)]
    pub keep_checkouts: bool,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute the clean command.
///
/// Step failures show up in the report; only failing to produce the report
/// is an error.
pub fn run(ctx: &mut Context<'_>, args: &[String]) -> Result<()> {
    let Some(flags) = parse_flags::<CleanFlags>(ctx, "clean", args)? else {
        return Ok(());
    };
    let options = CleanOptions {
        update: flags.update,
        keep_checkouts: flags.keep_checkouts,
    };

    let report = Cleaner::new(ctx.runner, ctx.config, options)?.run();
    if flags.json {
        writeln!(ctx.out, "{}", report.render_json()?)?;
    } else {
        write!(ctx.out, "{}", report.render_table())?;
    }
    Ok(())
}
