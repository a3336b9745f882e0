//! CLI command tree and leaf handlers.
//!
//! Each submodule handles one command:
//! - `clean` - Remove build artifacts
//! - `docker` - Dockerfile template, image build, run and shell
//! - `config` - Display effective configuration

pub mod clean;
pub mod config;
pub mod docker;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::error::ErrorKind;
use clap::Parser;

use crate::config::Config;
use crate::process::Runner;
use crate::router::{Console, Node};

/// Root help text.
pub const ROOT_HELP: &[&str] = &[
    "hatch - project toolbox for Swift server apps",
    "",
    "Cleans build artifacts and runs the app inside a Docker container.",
];

/// Everything a leaf body gets besides its arguments.
pub struct Context<'a> {
    pub runner: &'a Runner,
    pub config: &'a Config,
    pub out: &'a mut dyn Write,
}

impl<'a> Context<'a> {
    pub fn new(runner: &'a Runner, config: &'a Config, out: &'a mut dyn Write) -> Self {
        Self {
            runner,
            config,
            out,
        }
    }

    /// Project directory: the configured override, else `pwd`.
    pub fn cwd(&self) -> Result<PathBuf> {
        self.runner
            .cwd(self.config.test_directory.as_deref())
            .context("Failed to determine working directory")
    }
}

impl Console for Context<'_> {
    fn out(&mut self) -> &mut dyn Write {
        &mut *self.out
    }
}

/// Build the command tree.
pub fn tree<'a>() -> Node<Context<'a>> {
    Node::branch(
        "hatch",
        ROOT_HELP,
        vec![
            Node::leaf("clean", clean::HELP, clean::run),
            docker::node(),
            Node::leaf("config", config::HELP, config::run),
        ],
    )
}

/// Parse a leaf's flags with clap.
///
/// Help and version requests are printed to the context output and yield
/// `None`; any other parse error is returned as a usage error.
pub(crate) fn parse_flags<T: Parser>(
    ctx: &mut Context<'_>,
    name: &str,
    args: &[String],
) -> Result<Option<T>> {
    let argv = std::iter::once(name.to_string()).chain(args.iter().cloned());
    match T::try_parse_from(argv) {
        Ok(flags) => Ok(Some(flags)),
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            write!(ctx.out, "{}", err.render())?;
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

/// Flags of commands that take none.
#[derive(Parser, Debug)]
pub(crate) struct NoFlags {}
