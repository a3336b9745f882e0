//! Hatch - project toolbox for Swift server apps.
//!
//! Routes the command line through the command tree:
//! - `hatch clean` removes build artifacts and reports per target
//! - `hatch docker init|build|run|enter` drives the container workflow
//! - `hatch config` shows the effective configuration

use std::io;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use hatch::commands::{self, Context};
use hatch::config::Config;
use hatch::error;
use hatch::process::Runner;
use hatch::router;

fn init_tracing() {
    let filter = EnvFilter::try_from_env("HATCH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    // Load .env if present
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::load();
    let runner = Runner::new();

    #[cfg(unix)]
    {
        if let Err(err) = hatch::signals::install(&runner.slot()) {
            tracing::warn!("{:#}", err);
        }
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let tree = commands::tree();
    let mut stdout = io::stdout();
    let mut ctx = Context::new(&runner, &config, &mut stdout);

    match router::route(&tree, &args, &mut ctx) {
        Ok(outcome) => {
            tracing::debug!(?outcome, "done");
            ExitCode::SUCCESS
        }
        Err(err) => {
            if let Some(usage) = err.downcast_ref::<clap::Error>() {
                eprint!("{}", usage);
            } else {
                eprintln!("error: {:#}", err);
            }
            ExitCode::from(error::exit_code(&err))
        }
    }
}
