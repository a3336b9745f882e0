//! Centralized process execution with typed outcomes.
//!
//! Two modes:
//! - captured: all three streams piped, output collected after exit
//! - interactive: streams inherited from the terminal (or piped and streamed
//!   back in chunks), the raw wait status handed back to the caller
//!
//! Captured mode treats *any* stderr output as failure and ignores the exit
//! status entirely. This is a compatibility quirk, not a recommendation:
//! callers such as the program-exists probe depend on it, so it stays.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use tracing::debug;

use crate::error::{Error, Result};

/// Shell used for `shell()` and for search-path resolution.
pub const SHELL: &str = "/bin/sh";

/// How one standard stream of a child is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Piped into a buffer collected after exit.
    Capture,
    /// Shared with the parent (the controlling terminal).
    Inherit,
    /// Piped and delivered chunk by chunk while the child runs.
    Stream,
}

impl Disposition {
    fn stdio(self) -> Stdio {
        match self {
            Disposition::Inherit => Stdio::inherit(),
            Disposition::Capture | Disposition::Stream => Stdio::piped(),
        }
    }
}

/// Which stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Stdout,
    Stderr,
}

/// A piece of output read from a streaming child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub origin: Origin,
    pub bytes: Vec<u8>,
}

/// Output of a captured run.
#[derive(Debug, Clone)]
pub struct Captured {
    pub stdout: String,
    pub stderr: String,
    /// Wait status, informational only.
    pub status: WaitStatus,
}

impl Captured {
    /// Success means "nothing on stderr", whatever the exit status says.
    pub fn success(&self) -> bool {
        self.stderr.is_empty()
    }

    /// Apply the stderr policy: trimmed stdout, or `Error::Execution`.
    pub fn into_text(self, program: &str) -> Result<String> {
        if !self.success() {
            return Err(Error::Execution {
                program: program.to_string(),
                stderr: self.stderr.trim_end().to_string(),
            });
        }
        Ok(self.stdout.trim_end().to_string())
    }
}

// =============================================================================
// Wait status
// =============================================================================

/// Exit statuses with a recognized meaning.
///
/// | platform | value | meaning |
/// |---|---|---|
/// | unix | exit code 130 (raw wait status 33280) | child exited after SIGINT, e.g. Ctrl-C inside `docker run -it` |
/// | unix | killed by SIGINT | interrupted before it could exit cleanly |
/// | unix | exit code 127 (raw wait status 32512) | a shell could not find the command |
/// | windows | `STATUS_CONTROL_C_EXIT` | console Ctrl-C |
pub mod known {
    #[cfg(unix)]
    pub const INTERRUPTED_EXIT: i32 = 128 + libc::SIGINT;
    #[cfg(not(unix))]
    pub const INTERRUPTED_EXIT: i32 = 0xC000_013A_u32 as i32;

    pub const COMMAND_NOT_FOUND_EXIT: i32 = 127;
}

/// Classified termination of a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Success,
    /// The operator interrupted the child. Benign for interactive workflows.
    Interrupted,
    CommandNotFound,
    Failure(i32),
    /// Killed by a signal other than SIGINT.
    Signaled(i32),
}

impl Termination {
    /// Success, or a termination the operator asked for.
    pub fn is_benign(self) -> bool {
        matches!(self, Termination::Success | Termination::Interrupted)
    }
}

/// Raw OS wait status of a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitStatus(i32);

impl WaitStatus {
    pub fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> i32 {
        self.0
    }

    fn exit_status(self) -> ExitStatus {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            ExitStatus::from_raw(self.0)
        }
        #[cfg(windows)]
        {
            use std::os::windows::process::ExitStatusExt;
            ExitStatus::from_raw(self.0 as u32)
        }
    }

    /// Exit code, or None if terminated by a signal.
    pub fn code(self) -> Option<i32> {
        self.exit_status().code()
    }

    /// Terminating signal, if any.
    pub fn signal(self) -> Option<i32> {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            self.exit_status().signal()
        }
        #[cfg(not(unix))]
        {
            None
        }
    }

    pub fn success(self) -> bool {
        self.code() == Some(0)
    }

    pub fn termination(self) -> Termination {
        if let Some(signal) = self.signal() {
            if signal == libc::SIGINT {
                return Termination::Interrupted;
            }
            return Termination::Signaled(signal);
        }
        match self.code() {
            Some(0) => Termination::Success,
            Some(known::INTERRUPTED_EXIT) => Termination::Interrupted,
            Some(known::COMMAND_NOT_FOUND_EXIT) => Termination::CommandNotFound,
            Some(code) => Termination::Failure(code),
            None => Termination::Failure(-1),
        }
    }
}

impl From<ExitStatus> for WaitStatus {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            Self(status.into_raw())
        }
        #[cfg(not(unix))]
        {
            Self(status.code().unwrap_or(-1))
        }
    }
}

// =============================================================================
// Process descriptor
// =============================================================================

/// Description of one process launch.
///
/// The environment is inherited from the tool; `env` only layers overrides.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    envs: BTreeMap<String, String>,
    current_dir: Option<PathBuf>,
    stdin: Disposition,
    stdout: Disposition,
    stderr: Disposition,
}

impl Cmd {
    /// Create a new command descriptor.
    pub fn new(program: impl AsRef<str>) -> Self {
        Self {
            program: program.as_ref().to_string(),
            args: Vec::new(),
            envs: BTreeMap::new(),
            current_dir: None,
            stdin: Disposition::Capture,
            stdout: Disposition::Capture,
            stderr: Disposition::Capture,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    /// Set the working directory.
    pub fn dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    /// Override one environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.envs
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// The command line as shown to the operator.
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    fn wired(mut self, stdin: Disposition, out: Disposition) -> Self {
        self.stdin = stdin;
        self.stdout = out;
        self.stderr = out;
        self
    }

    fn command(&self, resolved: &str) -> Command {
        let mut cmd = Command::new(resolved);
        cmd.args(&self.args);
        cmd.envs(&self.envs);
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(self.stdin.stdio());
        cmd.stdout(self.stdout.stdio());
        cmd.stderr(self.stderr.stdio());
        cmd
    }
}

// =============================================================================
// Running slot
// =============================================================================

/// Handle to the interactive child currently in the foreground.
///
/// Cloned into the signal forwarder; the runner registers a child right after
/// spawn and the returned guard clears the slot when dropped, so the slot is
/// empty again on every exit path.
#[derive(Debug, Clone, Default)]
pub struct RunningSlot {
    pid: Arc<AtomicI32>,
}

impl RunningSlot {
    /// Pid of the registered child, if any.
    pub fn current(&self) -> Option<u32> {
        let pid = self.pid.load(Ordering::SeqCst);
        (pid > 0).then_some(pid as u32)
    }

    pub fn is_empty(&self) -> bool {
        self.current().is_none()
    }

    /// Send `signal` to the registered child. Returns false if none is running.
    #[cfg(unix)]
    pub fn forward(&self, signal: i32) -> bool {
        forward_to(&self.pid, signal)
    }

    pub(crate) fn shared(&self) -> Arc<AtomicI32> {
        Arc::clone(&self.pid)
    }

    fn register(&self, pid: u32) -> RunningGuard<'_> {
        let previous = self.pid.swap(pid as i32, Ordering::SeqCst);
        debug_assert_eq!(previous, 0, "only one interactive child at a time");
        RunningGuard { slot: self }
    }
}

/// Signal-safe forwarding used by both `RunningSlot::forward` and the handler.
#[cfg(unix)]
pub(crate) fn forward_to(pid: &AtomicI32, signal: i32) -> bool {
    let pid = pid.load(Ordering::SeqCst);
    if pid <= 0 {
        return false;
    }
    // SAFETY: kill(2) is async-signal-safe; pid was registered by the runner.
    unsafe { libc::kill(pid as libc::pid_t, signal) == 0 }
}

struct RunningGuard<'a> {
    slot: &'a RunningSlot,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.slot.pid.store(0, Ordering::SeqCst);
    }
}

// =============================================================================
// Runner
// =============================================================================

/// Executes process descriptors. One per invocation of the tool.
#[derive(Debug, Default)]
pub struct Runner {
    slot: RunningSlot,
    launches: AtomicUsize,
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The running slot, for registration with a signal forwarder.
    pub fn slot(&self) -> RunningSlot {
        self.slot.clone()
    }

    /// Number of processes spawned so far, resolver subprocesses included.
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Resolve `program` to an absolute path via the shell's `which`.
    pub fn resolve(&self, program: &str) -> Result<String> {
        if program.starts_with('/') {
            return Ok(program.to_string());
        }

        let probe = Cmd::new(SHELL).args(["-c", "which \"$1\"", "sh", program]);
        let captured = self.capture(&probe)?;
        let path = captured.stdout.trim();
        if !captured.success() || !path.starts_with('/') {
            debug!(program, stderr = %captured.stderr.trim(), "resolution failed");
            return Err(Error::Resolution {
                program: program.to_string(),
            });
        }
        debug!(program, path, "resolved");
        Ok(path.to_string())
    }

    /// Run with all streams piped and return raw captured output.
    pub fn capture(&self, cmd: &Cmd) -> Result<Captured> {
        let path = self.resolve(&cmd.program)?;
        let cmd = cmd
            .clone()
            .wired(Disposition::Capture, Disposition::Capture);
        let child = self.spawn(&cmd, &path)?;

        let output = child.wait_with_output().map_err(|source| Error::Launch {
            program: cmd.program.clone(),
            source,
        })?;
        let captured = Captured {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.into(),
        };
        debug!(program = %cmd.program, status = captured.status.raw(), "captured");
        Ok(captured)
    }

    /// Run captured and apply the stderr policy.
    pub fn captured(&self, cmd: &Cmd) -> Result<String> {
        self.capture(cmd)?.into_text(&cmd.program)
    }

    /// Run attached to the terminal and return the raw wait status.
    ///
    /// With `on_output`, stdout and stderr are piped instead and delivered as
    /// chunks on the calling thread. Stdin stays inherited either way.
    pub fn interactive(
        &self,
        cmd: &Cmd,
        on_output: Option<&mut dyn FnMut(Chunk)>,
    ) -> Result<WaitStatus> {
        println!("{}", cmd.command_line());
        let _ = io::stdout().flush();

        let path = self.resolve(&cmd.program)?;
        let out = if on_output.is_some() {
            Disposition::Stream
        } else {
            Disposition::Inherit
        };
        let cmd = cmd.clone().wired(Disposition::Inherit, out);
        let mut child = self.spawn(&cmd, &path)?;

        let _running = self.slot.register(child.id());
        if let Some(sink) = on_output {
            pump(&mut child, sink);
        }
        let status = child.wait().map_err(|source| Error::Launch {
            program: cmd.program.clone(),
            source,
        })?;

        let status = WaitStatus::from(status);
        debug!(program = %cmd.program, status = status.raw(), "interactive child exited");
        Ok(status)
    }

    /// `captured` for a bare program and argument list.
    pub fn run_captured<I, S>(&self, program: &str, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.captured(&Cmd::new(program).args(args))
    }

    /// `interactive` for a bare program and argument list.
    pub fn run_interactive<I, S>(
        &self,
        program: &str,
        args: I,
        on_output: Option<&mut dyn FnMut(Chunk)>,
    ) -> Result<WaitStatus>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.interactive(&Cmd::new(program).args(args), on_output)
    }

    /// Run a script via `sh -c`.
    pub fn shell(&self, script: &str) -> Result<String> {
        self.run_captured(SHELL, ["-c", script])
    }

    /// Full path of `program` on the search path, if any.
    pub fn which(&self, program: &str) -> Option<String> {
        self.resolve(program).ok()
    }

    /// Check if a program exists on the search path.
    pub fn exists(&self, program: &str) -> bool {
        self.which(program).is_some()
    }

    /// Working directory: `override_dir` if set, else `pwd`.
    pub fn cwd(&self, override_dir: Option<&Path>) -> Result<PathBuf> {
        match override_dir {
            Some(dir) => Ok(dir.to_path_buf()),
            None => self.shell("pwd").map(PathBuf::from),
        }
    }

    fn spawn(&self, cmd: &Cmd, path: &str) -> Result<Child> {
        let n = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(launch = n, path, args = ?cmd.args, "spawning");
        cmd.command(path).spawn().map_err(|source| Error::Launch {
            program: cmd.program.clone(),
            source,
        })
    }
}

/// Forward the child's piped output to `sink` until both streams close.
fn pump(child: &mut Child, sink: &mut dyn FnMut(Chunk)) {
    let (tx, rx) = mpsc::channel();
    let mut readers = Vec::new();

    if let Some(stdout) = child.stdout.take() {
        let tx = tx.clone();
        readers.push(thread::spawn(move || read_chunks(stdout, Origin::Stdout, tx)));
    }
    if let Some(stderr) = child.stderr.take() {
        let tx = tx.clone();
        readers.push(thread::spawn(move || read_chunks(stderr, Origin::Stderr, tx)));
    }
    drop(tx);

    for chunk in rx {
        sink(chunk);
    }
    for reader in readers {
        let _ = reader.join();
    }
}

fn read_chunks(mut reader: impl Read, origin: Origin, tx: mpsc::Sender<Chunk>) {
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                let chunk = Chunk {
                    origin,
                    bytes: buf[..n].to_vec(),
                };
                if tx.send(chunk).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
