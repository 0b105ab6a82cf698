use nix::errno::Errno;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use nix::unistd::{Pid, getpgrp, tcsetpgrp};
use std::io::{self, IsTerminal};
use std::os::fd::AsFd;

/// Moves the controlling terminal's foreground slot between the shell and a child.
///
/// Attached to standard input. Without a terminal there is nothing to hand
/// over, so both transfers succeed without doing anything.
#[derive(Debug, Clone, Copy)]
pub struct TerminalController {
    shell_pgid: Pid,
    interactive: bool,
}

impl TerminalController {
    pub fn new() -> Self {
        Self {
            shell_pgid: getpgrp(),
            interactive: io::stdin().is_terminal(),
        }
    }

    /// A controller that never touches the terminal.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            shell_pgid: getpgrp(),
            interactive: false,
        }
    }

    /// Give the terminal to `group`. The group must already exist.
    pub fn acquire_foreground(&self, group: Pid) -> Result<(), Errno> {
        if !self.interactive {
            return Ok(());
        }
        tcsetpgrp(io::stdin().as_fd(), group)?;
        tracing::trace!(%group, "terminal handed to child group");
        Ok(())
    }

    /// Take the terminal back for the shell's own group.
    ///
    /// The shell is a background process at this point, so `tcsetpgrp` would
    /// raise `SIGTTOU` against it. The signal is ignored for the duration of
    /// the call and the previous disposition restored afterwards.
    pub fn restore_foreground(&self) -> Result<(), Errno> {
        if !self.interactive {
            return Ok(());
        }
        let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
        // SAFETY: SIG_IGN installs no handler code.
        let previous = unsafe { sigaction(Signal::SIGTTOU, &ignore) }?;
        let result = tcsetpgrp(io::stdin().as_fd(), self.shell_pgid);
        // SAFETY: reinstalls the disposition that was active before.
        unsafe { sigaction(Signal::SIGTTOU, &previous) }?;
        result?;
        tracing::trace!(group = %self.shell_pgid, "terminal restored to shell");
        Ok(())
    }
}

impl Default for TerminalController {
    fn default() -> Self {
        Self::new()
    }
}
