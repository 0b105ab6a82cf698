use crate::command::CommandRequest;
use crate::env::Environment;
use crate::error::LaunchError;
use crate::signals::{self, SYNC_SIGNAL};
use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::{Signal, kill};
use nix::unistd::{ForkResult, Pid, execve, fork, getppid, setpgid};
use std::ffi::CString;
use std::io::{self, PipeReader, PipeWriter, Read, Write};

/// A running foreground child.
///
/// The child leads its own process group, so `pgid == pid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildHandle {
    pub pid: Pid,
    pub pgid: Pid,
}

/// Everything `execve` needs, converted before forking.
struct ExecImage {
    path: CString,
    argv: Vec<CString>,
    envp: Vec<CString>,
}

impl ExecImage {
    fn prepare(request: &CommandRequest, env: &Environment) -> Result<Self, LaunchError> {
        let argv = request
            .argv()
            .iter()
            .map(|arg| {
                CString::new(arg.as_str()).map_err(|_| LaunchError::InvalidArgument(arg.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            path: argv[0].clone(),
            argv,
            envp: env.to_envp()?,
        })
    }
}

/// Start `request` in a new process group and wait until that group exists.
///
/// The executable path is taken verbatim. A missing or non-executable
/// program is not detected here: the child reports it on stderr and exits
/// with status 1.
pub fn launch(request: &CommandRequest, env: &Environment) -> Result<ChildHandle, LaunchError> {
    let image = ExecImage::prepare(request, env)?;
    let (ready_rx, ready_tx) = io::pipe().map_err(LaunchError::SyncPipe)?;

    // SAFETY: the child only makes async-signal-safe calls before execve or _exit.
    match unsafe { fork() }.map_err(LaunchError::Fork)? {
        ForkResult::Child => {
            drop(ready_rx);
            run_child(&image, ready_tx)
        }
        ForkResult::Parent { child } => {
            drop(ready_tx);
            // Racing the child's own setpgid is fine; whichever runs first creates the group.
            match setpgid(child, child) {
                Ok(()) | Err(Errno::EACCES) | Err(Errno::ESRCH) => {}
                Err(e) => tracing::warn!(%child, error = %e, "setpgid from parent failed"),
            }
            wait_for_group(ready_rx);
            tracing::debug!(pid = %child, program = request.executable(), "launched");
            Ok(ChildHandle {
                pid: child,
                pgid: child,
            })
        }
    }
}

/// Block until the child announces its group, or dies trying.
fn wait_for_group(mut ready: PipeReader) {
    let mut token = [0u8; 1];
    loop {
        match ready.read(&mut token) {
            Ok(_) => return,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!(error = %e, "launch synchronization read failed");
                return;
            }
        }
    }
}

fn run_child(image: &ExecImage, mut ready: PipeWriter) -> ! {
    let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
    let _ = kill(getppid(), SYNC_SIGNAL);
    let _ = ready.write(&[1]);
    drop(ready);

    signals::reset_to_default(Signal::SIGINT);

    let err = match execve(&image.path, &image.argv, &image.envp) {
        Ok(never) => match never {},
        Err(e) => e,
    };
    report_exec_failure(image.path.as_bytes(), err);
    // SAFETY: _exit skips atexit handlers and stdio flushing inherited from the shell.
    unsafe { libc::_exit(1) }
}

fn report_exec_failure(path: &[u8], err: Errno) {
    signals::raw_stderr(b"shredder: ");
    signals::raw_stderr(path);
    signals::raw_stderr(b": ");
    signals::raw_stderr(err.desc().as_bytes());
    signals::raw_stderr(b"\n");
}
