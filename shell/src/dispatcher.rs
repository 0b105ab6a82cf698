//! Runs one command at a time through `Idle → Launching → Foreground → Reaping → Idle`.

use crate::command::{ChildStatus, CommandOutcome, CommandRequest};
use crate::env::Environment;
use crate::error::ShellError;
use crate::launcher::{self, ChildHandle};
use crate::signals::{self, SignalCoordinator};
use crate::terminal::TerminalController;
use crate::timeout::TimeoutGuard;
use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;

/// Printed on stderr once for every command killed by the deadline.
pub const TIMEOUT_MESSAGE: &[u8] = b"Bwahaha ... Tonight, I dine on turtle soup!\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Launching,
    Foreground,
    Reaping,
}

/// Result of blocking on the foreground child.
enum Wait {
    Reaped(ChildStatus),
    DeadlineExpired,
}

pub struct Dispatcher {
    signals: SignalCoordinator,
    terminal: TerminalController,
    guard: TimeoutGuard,
    env: Environment,
    state: DispatchState,
}

impl Dispatcher {
    pub fn new(
        signals: SignalCoordinator,
        terminal: TerminalController,
        guard: TimeoutGuard,
        env: Environment,
    ) -> Self {
        Self {
            signals,
            terminal,
            guard,
            env,
            state: DispatchState::Idle,
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn signals(&self) -> &SignalCoordinator {
        &self.signals
    }

    /// Launch `request`, give it the terminal and block until it is gone.
    ///
    /// On return the dispatcher is idle again whatever happened: no child is
    /// recorded and the shell owns the terminal.
    pub fn dispatch(&mut self, request: &CommandRequest) -> Result<CommandOutcome, ShellError> {
        let state = self.signals.state();
        state.clear_alarm();
        state.clear_sync();
        self.state = DispatchState::Launching;

        let child = match launcher::launch(request, &self.env) {
            Ok(child) => child,
            Err(e) => {
                self.state = DispatchState::Idle;
                return Err(e.into());
            }
        };
        tracing::trace!(sync = state.sync_ready(), "child group announced");

        state.set_current_child(child.pid.as_raw());
        if let Err(e) = self.terminal.acquire_foreground(child.pgid) {
            tracing::warn!(group = %child.pgid, error = %e, "could not hand over the terminal");
        }
        self.guard.arm();
        self.state = DispatchState::Foreground;

        let waited = wait_for_child(child.pid, || state.alarm_fired());
        self.state = DispatchState::Reaping;
        let outcome = self.reap(child, waited);

        if let Err(e) = self.terminal.restore_foreground() {
            tracing::warn!(error = %e, "could not take the terminal back");
        }
        self.state = DispatchState::Idle;

        let outcome = outcome?;
        tracing::debug!(
            pid = outcome.pid,
            code = outcome.code(),
            timed_out = outcome.timed_out,
            "command finished"
        );
        Ok(outcome)
    }

    /// Settle the child and forget it.
    ///
    /// The pid is cleared as soon as the child is gone so an interrupt during
    /// the terminal handover cannot be forwarded to a reused group id.
    fn reap(
        &self,
        child: ChildHandle,
        waited: Result<Wait, Errno>,
    ) -> Result<CommandOutcome, ShellError> {
        let outcome = self.collect(child, waited);
        self.signals.state().clear_current_child();
        outcome
    }

    fn collect(
        &self,
        child: ChildHandle,
        waited: Result<Wait, Errno>,
    ) -> Result<CommandOutcome, ShellError> {
        self.guard.disarm();
        let wait_error = |source| ShellError::Wait {
            pid: child.pid.as_raw(),
            source,
        };
        let mut status = match waited.map_err(wait_error)? {
            Wait::Reaped(status) => Some(status),
            Wait::DeadlineExpired => None,
        };

        let timed_out = self.signals.state().alarm_fired();
        if timed_out {
            match killpg(child.pgid, Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => tracing::warn!(group = %child.pgid, error = %e, "deadline kill failed"),
            }
            if status.is_none() {
                // Deadline is already handled; further alarms must not cut this wait short.
                status = match wait_for_child(child.pid, || false).map_err(wait_error)? {
                    Wait::Reaped(status) => Some(status),
                    Wait::DeadlineExpired => None,
                };
            }
            tracing::debug!(pid = %child.pid, "deadline expired, process group killed");
            signals::raw_stderr(TIMEOUT_MESSAGE);
        }

        Ok(CommandOutcome {
            pid: child.pid.as_raw(),
            status: status.unwrap_or(ChildStatus::Vanished),
            timed_out,
        })
    }
}

/// Block until `pid` terminates.
///
/// A wait interrupted by a signal is retried unless `deadline_expired`
/// reports that the interruption was the deadline.
fn wait_for_child(pid: Pid, deadline_expired: impl Fn() -> bool) -> Result<Wait, Errno> {
    loop {
        if deadline_expired() {
            return Ok(Wait::DeadlineExpired);
        }
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(Wait::Reaped(ChildStatus::Exited(code))),
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                return Ok(Wait::Reaped(ChildStatus::Signaled(signal)));
            }
            Ok(other) => tracing::trace!(?other, "ignoring non-terminal wait status"),
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => return Ok(Wait::Reaped(ChildStatus::Vanished)),
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_is_a_single_line() {
        assert!(TIMEOUT_MESSAGE.ends_with(b"\n"));
        assert_eq!(TIMEOUT_MESSAGE.iter().filter(|&&b| b == b'\n').count(), 1);
    }

    #[test]
    fn waiting_for_unknown_child_reports_vanished() {
        // pid 1 is never our child, so waitpid fails with ECHILD.
        let waited = wait_for_child(Pid::from_raw(1), || false).unwrap();
        assert!(matches!(waited, Wait::Reaped(ChildStatus::Vanished)));
    }

    fn detached_dispatcher() -> Dispatcher {
        Dispatcher::new(
            SignalCoordinator::isolated(),
            TerminalController::detached(),
            TimeoutGuard::new(0),
            Environment::default(),
        )
    }

    #[test]
    fn reaping_forgets_the_child_before_the_terminal_is_returned() {
        let dispatcher = detached_dispatcher();
        let state = dispatcher.signals().state();
        let child = ChildHandle {
            pid: Pid::from_raw(4242),
            pgid: Pid::from_raw(4242),
        };
        state.set_current_child(4242);

        let outcome = dispatcher
            .reap(child, Ok(Wait::Reaped(ChildStatus::Exited(3))))
            .unwrap();
        assert_eq!(state.current_child(), 0);
        assert_eq!(outcome.code(), 3);
        assert!(!outcome.timed_out);
    }

    #[test]
    fn failed_wait_still_forgets_the_child() {
        let dispatcher = detached_dispatcher();
        let state = dispatcher.signals().state();
        let child = ChildHandle {
            pid: Pid::from_raw(4243),
            pgid: Pid::from_raw(4243),
        };
        state.set_current_child(4243);

        let err = dispatcher.reap(child, Err(Errno::EINVAL)).unwrap_err();
        assert!(matches!(err, ShellError::Wait { pid: 4243, .. }));
        assert_eq!(state.current_child(), 0);
    }

    #[test]
    fn invalid_request_leaves_dispatcher_idle() {
        let mut dispatcher = detached_dispatcher();
        let request = CommandRequest::parse("/bin/echo bad\0arg").unwrap();

        let err = dispatcher.dispatch(&request).unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(dispatcher.state(), DispatchState::Idle);
        assert_eq!(dispatcher.signals().state().current_child(), 0);
    }
}
