use nix::sys::signal::Signal;
use regex::Regex;
use std::sync::LazyLock;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Runs of blanks separating words on a command line.
static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("separator pattern is valid"));

/// Strip leading and trailing blanks and line terminators.
pub fn trim(line: &str) -> &str {
    line.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
}

/// One command line split into an executable path and its argument vector.
///
/// `argv[0]` is the executable path and is used verbatim: no `PATH` search
/// happens anywhere in this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    argv: Vec<String>,
}

impl CommandRequest {
    /// Trim `line` and split it on spaces and tabs.
    ///
    /// Returns `None` when nothing but whitespace is left.
    pub fn parse(line: &str) -> Option<Self> {
        let line = trim(line);
        if line.is_empty() {
            return None;
        }
        let argv: Vec<String> = SEPARATORS
            .split(line)
            .filter(|word| !word.is_empty())
            .map(str::to_owned)
            .collect();
        if argv.is_empty() {
            None
        } else {
            Some(Self { argv })
        }
    }

    pub fn executable(&self) -> &str {
        &self.argv[0]
    }

    /// The complete argument vector, executable path included.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

/// How a reaped child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStatus {
    Exited(ExitCode),
    Signaled(Signal),
    /// The child was already collected by the time we asked.
    Vanished,
}

/// Result of one dispatched command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    pub pid: i32,
    pub status: ChildStatus,
    /// The deadline fired and the child's process group was killed.
    pub timed_out: bool,
}

impl CommandOutcome {
    /// Exit code as a shell would report it in `$?`.
    pub fn code(&self) -> ExitCode {
        match self.status {
            ChildStatus::Exited(code) => code,
            ChildStatus::Signaled(signal) => 128 + signal as i32,
            ChildStatus::Vanished => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_strips_blanks_and_newlines() {
        assert_eq!(trim("  \t/bin/ls -l \n"), "/bin/ls -l");
        assert_eq!(trim("\r\n"), "");
        assert_eq!(trim("echo"), "echo");
    }

    #[test]
    fn parse_splits_on_runs_of_blanks() {
        let req = CommandRequest::parse("  /bin/echo\t hello \t world\n").unwrap();
        assert_eq!(req.executable(), "/bin/echo");
        assert_eq!(req.argv(), ["/bin/echo", "hello", "world"]);
    }

    #[test]
    fn parse_keeps_executable_verbatim() {
        let req = CommandRequest::parse("sleep 5").unwrap();
        assert_eq!(req.executable(), "sleep");
        assert_eq!(req.argv().len(), 2);
    }

    #[test]
    fn parse_rejects_blank_lines() {
        assert_eq!(CommandRequest::parse(""), None);
        assert_eq!(CommandRequest::parse(" \t \n"), None);
    }

    #[test]
    fn outcome_codes_follow_shell_convention() {
        let exited = CommandOutcome {
            pid: 10,
            status: ChildStatus::Exited(3),
            timed_out: false,
        };
        assert_eq!(exited.code(), 3);

        let killed = CommandOutcome {
            pid: 10,
            status: ChildStatus::Signaled(Signal::SIGKILL),
            timed_out: true,
        };
        assert_eq!(killed.code(), 137);
    }
}
