//! Docker commands - Dockerfile template, image build, run and shell.
//!
//! The image tag is derived from the Swift version pinned in
//! `.swift-version`. Interactive children interrupted by the operator
//! (`Termination::Interrupted`) are not treated as failures.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing::debug;

use super::{parse_flags, Context, NoFlags};
use crate::error::Error;
use crate::process::{Cmd, Termination};
use crate::router::Node;

/// Version-pin file read from the project directory.
pub const VERSION_FILE: &str = ".swift-version";

const VERSION_MISSING: &str = "Could not determine Swift version (check your .swift-version file)";

pub const HELP: &[&str] = &["Setup and run the app via docker"];

const INIT_HELP: &[&str] = &[
    "Creates a Dockerfile",
    "",
    "Flags:",
    "  --verbose   Show download progress",
];

const BUILD_HELP: &[&str] = &[
    "Build the docker image, using the swift",
    "version specified in .swift-version.",
];

const RUN_HELP: &[&str] = &[
    "Run the app in a docker container with the",
    "image created by running 'docker build'",
];

const ENTER_HELP: &[&str] = &[
    "Enter the docker container (useful for",
    "debugging purposes)",
];

/// The `docker` branch.
pub fn node<'a>() -> Node<Context<'a>> {
    Node::branch(
        "docker",
        HELP,
        vec![
            Node::leaf("init", INIT_HELP, init),
            Node::leaf("build", BUILD_HELP, build),
            Node::leaf("run", RUN_HELP, run),
            Node::leaf("enter", ENTER_HELP, enter),
        ],
    )
}

/// Pinned Swift version, trimmed.
pub fn swift_version(dir: &Path) -> Result<String, Error> {
    let contents = fs::read_to_string(dir.join(VERSION_FILE)).map_err(|err| {
        debug!(error = %err, "version pin unreadable");
        Error::Precondition(VERSION_MISSING.to_string())
    })?;
    let version = contents.trim();
    if version.is_empty() {
        return Err(Error::Precondition(VERSION_MISSING.to_string()));
    }
    Ok(version.to_string())
}

/// Where to look for the version pin without spawning anything: the
/// configured override, else the process working directory.
fn pin_dir(ctx: &Context<'_>) -> PathBuf {
    ctx.config
        .test_directory
        .clone()
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Image tag for a pinned version.
pub fn image_name(repository: &str, version: &str) -> String {
    format!("{}:{}", repository, version)
}

#[derive(Parser, Debug)]
#[command(about = "Creates a Dockerfile")]
struct InitFlags {
    /// Show download progress.
    #[arg(long)]
    verbose: bool,
}

fn init(ctx: &mut Context<'_>, args: &[String]) -> Result<()> {
    let Some(flags) = parse_flags::<InitFlags>(ctx, "init", args)? else {
        return Ok(());
    };
    let cwd = ctx.cwd()?;

    if cwd.join("Dockerfile").exists() {
        return Err(Error::Failed(
            "A Dockerfile already exists in the current directory.\n\
             Please move it and try again or run `hatch docker build`."
                .to_string(),
        )
        .into());
    }

    writeln!(ctx.out, "Downloading Dockerfile...")?;
    let mut cmd = Cmd::new("curl").arg("-L");
    if !flags.verbose {
        cmd = cmd.arg("-s");
    }
    let cmd = cmd
        .arg(&ctx.config.dockerfile_url)
        .args(["-o", "Dockerfile"])
        .dir(&cwd);

    match ctx.runner.interactive(&cmd, None) {
        Ok(status) if status.success() => {}
        Ok(status) => {
            debug!(status = status.raw(), "curl failed");
            return Err(Error::Failed("Could not download Dockerfile.".to_string()).into());
        }
        Err(err) => {
            debug!(error = %err, "curl did not run");
            return Err(Error::Failed("Could not download Dockerfile.".to_string()).into());
        }
    }

    writeln!(ctx.out, "Dockerfile created.")?;
    writeln!(ctx.out, "You may now adjust the file or")?;
    writeln!(ctx.out, "run `hatch docker build`.")?;
    Ok(())
}

fn build(ctx: &mut Context<'_>, args: &[String]) -> Result<()> {
    if parse_flags::<NoFlags>(ctx, "build", args)?.is_none() {
        return Ok(());
    }
    let version = swift_version(&pin_dir(ctx))?;
    let cwd = ctx.cwd()?;
    let image = image_name(&ctx.config.docker_image, &version);

    writeln!(ctx.out, "Building docker image with Swift version: {}", version)?;
    writeln!(ctx.out, "This may take a few minutes if no layers are cached...")?;
    let cmd = Cmd::new("docker")
        .args(["build", "--rm", "-t", image.as_str(), "--build-arg"])
        .arg(format!("SWIFT_VERSION={}", version))
        .arg(".")
        .dir(&cwd);

    let status = match ctx.runner.interactive(&cmd, None) {
        Ok(status) => status,
        Err(err @ Error::Resolution { .. }) => {
            install_hint(ctx)?;
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    match status.termination() {
        t if t.is_benign() => return Ok(()),
        Termination::CommandNotFound => install_hint(ctx)?,
        Termination::Failure(1) => daemon_hint(ctx)?,
        _ => {}
    }
    Err(could_not_complete("Could not build Docker image", &cmd))
}

fn run(ctx: &mut Context<'_>, args: &[String]) -> Result<()> {
    if parse_flags::<NoFlags>(ctx, "run", args)?.is_none() {
        return Ok(());
    }
    let version = swift_version(&pin_dir(ctx))?;
    let cwd = ctx.cwd()?;
    let image = image_name(&ctx.config.docker_image, &version);

    let cmd = Cmd::new("docker")
        .args(["run", "--rm", "-it", "-v"])
        .arg(format!("{}:{}", cwd.display(), ctx.config.container_dir))
        .args(["-p", ctx.config.container_port.as_str(), image.as_str()])
        .dir(&cwd);

    writeln!(ctx.out, "Launching app with image {}", image)?;
    run_container(ctx, &cmd, "docker run command failed")
}

fn enter(ctx: &mut Context<'_>, args: &[String]) -> Result<()> {
    if parse_flags::<NoFlags>(ctx, "enter", args)?.is_none() {
        return Ok(());
    }
    let version = swift_version(&pin_dir(ctx))?;
    let cwd = ctx.cwd()?;
    let image = image_name(&ctx.config.docker_image, &version);

    let cmd = Cmd::new("docker")
        .args(["run", "--rm", "-it", "-v"])
        .arg(format!("{}:{}", cwd.display(), ctx.config.container_dir))
        .args(["--entrypoint", "bash", image.as_str()])
        .dir(&cwd);

    writeln!(ctx.out, "Starting bash in image {}", image)?;
    run_container(ctx, &cmd, "Could not enter Docker container")
}

/// Run an interactive container; an operator interrupt counts as success.
fn run_container(ctx: &mut Context<'_>, cmd: &Cmd, failure: &str) -> Result<()> {
    let status = ctx.runner.interactive(cmd, None)?;
    if status.termination().is_benign() {
        return Ok(());
    }
    debug!(status = status.raw(), "container exited");
    Err(could_not_complete(failure, cmd))
}

fn could_not_complete(message: &str, cmd: &Cmd) -> anyhow::Error {
    Error::Failed(format!("{}, command was\n{}", message, cmd.command_line())).into()
}

fn install_hint(ctx: &mut Context<'_>) -> Result<()> {
    writeln!(ctx.out)?;
    writeln!(ctx.out, "Make sure you have Docker installed")?;
    writeln!(ctx.out, "https://docs.docker.com/get-docker/")?;
    Ok(())
}

fn daemon_hint(ctx: &mut Context<'_>) -> Result<()> {
    writeln!(ctx.out)?;
    writeln!(ctx.out, "Make sure you have the Docker daemon running")?;
    writeln!(ctx.out, "or try running the following snippet:")?;
    writeln!(ctx.out, "`eval \"$(docker-machine env default)\"`")?;
    Ok(())
}
