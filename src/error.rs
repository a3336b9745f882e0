//! Error kinds surfaced by the runner, the router and the composite commands.

use std::io;

/// Errors the rest of the tool branches on.
///
/// Leaf bodies return `anyhow::Result`; these travel inside `anyhow::Error`
/// and are recovered with `downcast_ref` where a caller needs the kind.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The named program could not be found on the search path.
    #[error("unable to find executable for '{program}'")]
    Resolution { program: String },

    /// The OS refused to spawn the program.
    #[error("failed to launch '{program}'")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The program ran but wrote to stderr.
    #[error("'{program}' failed:\n{stderr}")]
    Execution { program: String, stderr: String },

    /// No child of the current node matched the requested name.
    #[error("unknown command '{attempted}' for '{path}'\nvalid commands: {}", .valid.join("|"))]
    UnknownCommand {
        /// The token that did not match.
        attempted: String,
        /// Names of the siblings that would have matched.
        valid: Vec<String>,
        /// Command path walked before the failure, e.g. `hatch docker`.
        path: String,
    },

    /// A required input of a composite command is missing or unreadable.
    #[error("{0}")]
    Precondition(String),

    /// A composite command could not complete.
    #[error("{0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Exit code for usage errors (unknown commands, bad flags).
pub const EXIT_USAGE: u8 = 2;

/// Exit code for every other failure.
pub const EXIT_FAILURE: u8 = 1;

/// Map an error chain to the process exit code.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(Error::UnknownCommand { .. }) = err.downcast_ref::<Error>() {
        return EXIT_USAGE;
    }
    if err.downcast_ref::<clap::Error>().is_some() {
        return EXIT_USAGE;
    }
    EXIT_FAILURE
}
