//! Forward operator interrupts to the interactive child.
//!
//! The handler only reads the pid registered in the runner's slot. When no
//! child is running the tool exits with `128 + signal`, like a shell would.

use std::sync::atomic::AtomicI32;
use std::sync::{Arc, OnceLock};

use anyhow::{bail, Result};

use crate::process::{forward_to, RunningSlot};

static TARGET: OnceLock<Arc<AtomicI32>> = OnceLock::new();

/// Signals forwarded to the registered child.
pub const FORWARDED: [libc::c_int; 2] = [libc::SIGINT, libc::SIGTERM];

/// Install SIGINT/SIGTERM handlers bound to `slot`. Only the first call binds.
pub fn install(slot: &RunningSlot) -> Result<()> {
    if TARGET.set(slot.shared()).is_err() {
        tracing::debug!("signal forwarder already installed");
        return Ok(());
    }

    for signal in FORWARDED {
        // SAFETY: the action is fully initialised before sigaction reads it,
        // and `handle` only performs async-signal-safe work.
        let rc = unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = handle as extern "C" fn(libc::c_int) as libc::sighandler_t;
            action.sa_flags = libc::SA_RESTART;
            libc::sigemptyset(&mut action.sa_mask);
            libc::sigaction(signal, &action, std::ptr::null_mut())
        };
        if rc != 0 {
            bail!(
                "Failed to install handler for signal {}: {}",
                signal,
                std::io::Error::last_os_error()
            );
        }
    }

    tracing::debug!("signal forwarder installed");
    Ok(())
}

extern "C" fn handle(signal: libc::c_int) {
    let forwarded = TARGET
        .get()
        .map(|pid| forward_to(pid, signal))
        .unwrap_or(false);
    if !forwarded {
        // SAFETY: _exit is async-signal-safe.
        unsafe { libc::_exit(128 + signal) };
    }
}
