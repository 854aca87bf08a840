// LabWired Harness - Armv8-M Device Bus Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Operator break handling.
//!
//! [`BreakState`] holds the two flags shared between the SIGINT handler and
//! the control loop:
//! - `pending` is set only by the handler and read/cleared only by the loop,
//!   between engine steps.
//! - `in_console` is set/cleared only by the loop and read by the handler.
//!
//! A break that arrives while the console is reading input terminates the
//! process on the spot instead of being queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Exit status used when a second break kills the process from the console.
pub const EXIT_ABRUPT: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakAction {
    /// Recorded; the loop will pick it up before the next step.
    Deferred,
    /// The console is active; the process must exit now.
    Terminate,
}

#[derive(Debug, Default)]
pub struct BreakState {
    pending: AtomicBool,
    in_console: AtomicBool,
}

impl BreakState {
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            in_console: AtomicBool::new(false),
        }
    }

    /// Called from the asynchronous notification path.
    pub fn request_break(&self) -> BreakAction {
        if self.in_console.load(Ordering::Acquire) {
            return BreakAction::Terminate;
        }
        self.pending.store(true, Ordering::Release);
        BreakAction::Deferred
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Consumes a pending break.
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub fn enter_console(&self) {
        self.in_console.store(true, Ordering::Release);
    }

    pub fn leave_console(&self) {
        self.in_console.store(false, Ordering::Release);
    }

    pub fn in_console(&self) -> bool {
        self.in_console.load(Ordering::Acquire)
    }
}

#[cfg(unix)]
mod handler {
    use super::{BreakAction, BreakState, EXIT_ABRUPT};
    use std::sync::{Arc, OnceLock};

    static HANDLER_STATE: OnceLock<Arc<BreakState>> = OnceLock::new();

    extern "C" fn on_interrupt(_sig: libc::c_int) {
        if let Some(state) = HANDLER_STATE.get() {
            if state.request_break() == BreakAction::Terminate {
                // SAFETY: _exit is async-signal-safe.
                unsafe { libc::_exit(EXIT_ABRUPT) }
            }
        }
    }

    pub fn install(state: Arc<BreakState>) -> anyhow::Result<()> {
        if HANDLER_STATE.set(state).is_err() {
            anyhow::bail!("break handler already installed");
        }

        // SAFETY: the action struct is fully initialised before use and the
        // handler only touches atomics and _exit.
        unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = on_interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t;
            action.sa_flags = libc::SA_RESTART;
            libc::sigemptyset(&mut action.sa_mask);
            if libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut()) != 0 {
                return Err(std::io::Error::last_os_error().into());
            }
        }
        tracing::debug!("SIGINT break handler installed");
        Ok(())
    }
}

/// Routes SIGINT to `state`. Can be installed once per process.
#[cfg(unix)]
pub fn install_break_handler(state: Arc<BreakState>) -> anyhow::Result<()> {
    handler::install(state)
}

#[cfg(not(unix))]
pub fn install_break_handler(_state: Arc<BreakState>) -> anyhow::Result<()> {
    tracing::warn!("Operator break is not supported on this platform");
    Ok(())
}
