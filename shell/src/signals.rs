//! Signal handlers and the state they share with the dispatcher.
//!
//! Three handlers are installed once, before the first fork:
//!
//! - `SIGALRM` marks the deadline as expired. Killing the child is left to
//!   the dispatcher, which targets the whole process group.
//! - `SIGINT` prints a newline when idle, otherwise forwards the interrupt
//!   to the foreground child's process group.
//! - `SIGUSR1` is the launch synchronization signal and only records that it
//!   arrived.
//!
//! Handlers touch nothing but the atomics in [`SignalState`], `kill(2)` and
//! `write(2)` of literal buffers. None of them allocate, lock or log.
//!
//! None are installed with `SA_RESTART`, so a blocking `waitpid` or `read`
//! returns `EINTR` and the caller decides whether to retry.

use crate::error::ShellError;
use nix::libc;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Signal announcing that a freshly forked child has created its process group.
pub const SYNC_SIGNAL: Signal = Signal::SIGUSR1;

/// State shared between the handlers and the dispatcher.
///
/// Every field is a single word updated with one atomic store, so a handler
/// preempting the dispatcher never observes a half-written value.
#[derive(Debug)]
pub struct SignalState {
    current_child: AtomicI32,
    alarm_fired: AtomicBool,
    sync_ready: AtomicBool,
}

impl SignalState {
    pub const fn new() -> Self {
        Self {
            current_child: AtomicI32::new(0),
            alarm_fired: AtomicBool::new(false),
            sync_ready: AtomicBool::new(false),
        }
    }

    /// Pid of the foreground child, 0 when none is running.
    pub fn current_child(&self) -> i32 {
        self.current_child.load(Ordering::SeqCst)
    }

    pub fn set_current_child(&self, pid: i32) {
        self.current_child.store(pid, Ordering::SeqCst);
    }

    pub fn clear_current_child(&self) {
        self.current_child.store(0, Ordering::SeqCst);
    }

    pub fn alarm_fired(&self) -> bool {
        self.alarm_fired.load(Ordering::SeqCst)
    }

    pub fn mark_alarm_fired(&self) {
        self.alarm_fired.store(true, Ordering::SeqCst);
    }

    pub fn clear_alarm(&self) {
        self.alarm_fired.store(false, Ordering::SeqCst);
    }

    pub fn sync_ready(&self) -> bool {
        self.sync_ready.load(Ordering::SeqCst)
    }

    pub fn mark_sync_ready(&self) {
        self.sync_ready.store(true, Ordering::SeqCst);
    }

    pub fn clear_sync(&self) {
        self.sync_ready.store(false, Ordering::SeqCst);
    }
}

impl Default for SignalState {
    fn default() -> Self {
        Self::new()
    }
}

static STATE: SignalState = SignalState::new();

/// What the interrupt handler does for a given foreground child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InterruptAction {
    /// Nothing runs: emit a newline so the prompt starts on a fresh line.
    Newline,
    /// Forward the interrupt to every process in this group.
    ForwardToGroup(i32),
}

impl InterruptAction {
    pub(crate) fn for_child(pid: i32) -> Self {
        if pid == 0 {
            InterruptAction::Newline
        } else {
            InterruptAction::ForwardToGroup(pid)
        }
    }
}

/// Write a literal buffer straight to fd 2. Safe to call from a handler.
pub(crate) fn raw_stderr(bytes: &[u8]) {
    // SAFETY: write(2) is async-signal-safe and `bytes` outlives the call.
    unsafe {
        libc::write(libc::STDERR_FILENO, bytes.as_ptr().cast(), bytes.len());
    }
}

extern "C" fn on_deadline(_: libc::c_int) {
    STATE.mark_alarm_fired();
}

extern "C" fn on_interrupt(_: libc::c_int) {
    match InterruptAction::for_child(STATE.current_child()) {
        InterruptAction::Newline => raw_stderr(b"\n"),
        InterruptAction::ForwardToGroup(pgid) => {
            // SAFETY: kill(2) is async-signal-safe; a negative pid addresses the group.
            unsafe {
                libc::kill(-pgid, libc::SIGINT);
            }
        }
    }
}

extern "C" fn on_sync(_: libc::c_int) {
    STATE.mark_sync_ready();
}

/// Handle to the installed handlers and their shared [`SignalState`].
///
/// Cheap to copy; every copy refers to the same process-wide state.
#[derive(Debug, Clone, Copy)]
pub struct SignalCoordinator {
    state: &'static SignalState,
}

impl SignalCoordinator {
    /// Install the deadline, interrupt and sync handlers.
    ///
    /// Must run before the first child is launched, and after anything else
    /// that claims `SIGINT` (the line editor does). Installing twice is harmless.
    pub fn install() -> Result<Self, ShellError> {
        install_handler(Signal::SIGALRM, on_deadline)?;
        install_handler(Signal::SIGINT, on_interrupt)?;
        install_handler(SYNC_SIGNAL, on_sync)?;
        tracing::debug!("signal handlers installed");
        Ok(Self { state: &STATE })
    }

    pub fn state(&self) -> &'static SignalState {
        self.state
    }

    /// A coordinator over private state, with no handlers installed.
    #[cfg(test)]
    pub(crate) fn isolated() -> Self {
        Self {
            state: Box::leak(Box::new(SignalState::new())),
        }
    }
}

fn install_handler(signal: Signal, handler: extern "C" fn(libc::c_int)) -> Result<(), ShellError> {
    let action = SigAction::new(SigHandler::Handler(handler), SaFlags::empty(), SigSet::empty());
    // SAFETY: every handler above is async-signal-safe.
    unsafe { sigaction(signal, &action) }
        .map(drop)
        .map_err(|source| ShellError::SignalSetup { signal, source })
}

/// Put `signal` back to its default disposition. Used in a forked child.
pub(crate) fn reset_to_default(signal: Signal) {
    let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    // SAFETY: restoring SIG_DFL installs no handler code.
    let _ = unsafe { sigaction(signal, &action) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_starts_idle() {
        let state = SignalState::new();
        assert_eq!(state.current_child(), 0);
        assert!(!state.alarm_fired());
        assert!(!state.sync_ready());
    }

    #[test]
    fn flags_set_and_reset() {
        let state = SignalState::new();
        state.set_current_child(4242);
        state.mark_alarm_fired();
        state.mark_sync_ready();
        assert_eq!(state.current_child(), 4242);
        assert!(state.alarm_fired());
        assert!(state.sync_ready());

        state.clear_current_child();
        state.clear_alarm();
        state.clear_sync();
        assert_eq!(state.current_child(), 0);
        assert!(!state.alarm_fired());
        assert!(!state.sync_ready());
    }

    #[test]
    fn interrupt_prints_newline_without_child() {
        assert_eq!(InterruptAction::for_child(0), InterruptAction::Newline);
    }

    #[test]
    fn interrupt_targets_child_group() {
        assert_eq!(
            InterruptAction::for_child(311),
            InterruptAction::ForwardToGroup(311)
        );
    }
}
