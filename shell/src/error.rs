use nix::errno::Errno;
use nix::sys::signal::Signal;
use thiserror::Error;

/// Failure to start a program.
///
/// Only [`LaunchError::InvalidArgument`] is a user error; the remaining
/// variants mean the shell itself ran out of resources and must stop.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// An argument or environment entry cannot be passed to `execve`.
    #[error("{0:?}: argument contains an interior NUL byte")]
    InvalidArgument(String),

    #[error("fork failed: {0}")]
    Fork(#[source] Errno),

    #[error("failed to create the launch synchronization pipe: {0}")]
    SyncPipe(#[source] std::io::Error),
}

impl LaunchError {
    /// Whether the error should terminate the shell instead of the current command.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, LaunchError::InvalidArgument(_))
    }
}

/// Errors surfaced by the dispatcher and the prompt loop.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("failed to install the {signal} handler: {source}")]
    SignalSetup {
        signal: Signal,
        #[source]
        source: Errno,
    },

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("waiting for child {pid} failed: {source}")]
    Wait {
        pid: i32,
        #[source]
        source: Errno,
    },

    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ShellError {
    /// Whether the prompt loop has to stop.
    pub fn is_fatal(&self) -> bool {
        match self {
            ShellError::Launch(e) => e.is_fatal(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_is_recoverable() {
        let err = ShellError::from(LaunchError::InvalidArgument("a\0b".to_string()));
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("interior NUL"));
    }

    #[test]
    fn resource_failures_are_fatal() {
        assert!(ShellError::from(LaunchError::Fork(Errno::EAGAIN)).is_fatal());
        let wait = ShellError::Wait {
            pid: 42,
            source: Errno::ECHILD,
        };
        assert!(wait.is_fatal());
        assert!(wait.to_string().contains("42"));
    }
}
