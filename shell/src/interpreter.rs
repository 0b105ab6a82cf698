use crate::command::CommandRequest;
use crate::dispatcher::Dispatcher;
use crate::error::ShellError;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, BufRead, IsTerminal, Write};

/// Written before every read.
pub const PROMPT: &str = "penn-shredder# ";

/// Source of command lines for the prompt loop.
pub trait LineReader {
    /// Show the prompt and read one line.
    ///
    /// Returns `Ok(None)` at end of input. A read cut short by a signal
    /// yields an empty line so the prompt is shown again.
    fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// Prompt on stderr, lines from any buffered reader.
pub struct PlainReader<R> {
    input: R,
}

impl<R: BufRead> PlainReader<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

impl<R: BufRead> LineReader for PlainReader<R> {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        io::stderr().write_all(PROMPT.as_bytes())?;

        let mut line = Vec::new();
        loop {
            let available = match self.input.fill_buf() {
                Ok(buf) => buf,
                // The interrupt handler already printed the newline; drop the partial line.
                Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(Some(String::new())),
                Err(e) => return Err(e),
            };
            if available.is_empty() {
                return Ok(if line.is_empty() {
                    None
                } else {
                    Some(String::from_utf8_lossy(&line).into_owned())
                });
            }
            match available.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    line.extend_from_slice(&available[..=end]);
                    self.input.consume(end + 1);
                    return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
                }
                None => {
                    let len = available.len();
                    line.extend_from_slice(available);
                    self.input.consume(len);
                }
            }
        }
    }
}

/// Line editing with history for interactive terminals.
pub struct EditorReader {
    editor: DefaultEditor,
}

impl EditorReader {
    pub fn new() -> rustyline::Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl LineReader for EditorReader {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        match self.editor.readline(PROMPT) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(ReadlineError::Io(e)) if e.kind() == io::ErrorKind::Interrupted => {
                Ok(Some(String::new()))
            }
            Err(ReadlineError::Io(e)) => Err(e),
            Err(err) => Err(io::Error::other(err.to_string())),
        }
    }
}

/// Pick the reader for this process: line editing on a terminal, plain reads otherwise.
pub fn default_reader() -> Box<dyn LineReader> {
    if io::stdin().is_terminal() {
        match EditorReader::new() {
            Ok(reader) => return Box::new(reader),
            Err(e) => tracing::warn!(error = %e, "line editing unavailable, using plain input"),
        }
    }
    Box::new(PlainReader::new(io::stdin().lock()))
}

/// The interactive prompt loop.
///
/// Example
/// ```no_run
/// use shredder::{Config, Interpreter};
/// let mut sh = Interpreter::from_config(&Config::default()).unwrap();
/// sh.repl().unwrap();
/// ```
pub struct Interpreter {
    dispatcher: Dispatcher,
    reader: Box<dyn LineReader>,
}

impl Interpreter {
    pub fn new(dispatcher: Dispatcher, reader: Box<dyn LineReader>) -> Self {
        Self { dispatcher, reader }
    }

    /// Install the signal handlers and wire the default components for `config`.
    pub fn from_config(config: &crate::Config) -> Result<Self, ShellError> {
        use crate::env::Environment;
        use crate::signals::SignalCoordinator;
        use crate::terminal::TerminalController;
        use crate::timeout::TimeoutGuard;

        // rustyline swaps in its own SIGINT handler when the editor is built on
        // a terminal, so the reader must exist before ours is installed.
        let reader = default_reader();
        let dispatcher = Dispatcher::new(
            SignalCoordinator::install()?,
            TerminalController::new(),
            TimeoutGuard::new(config.timeout),
            Environment::new(),
        );
        Ok(Self::new(dispatcher, reader))
    }

    #[cfg(test)]
    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Read and run commands until end of input.
    ///
    /// Only fatal errors end the loop early; a command that cannot be
    /// launched is reported and the next line is read.
    pub fn repl(&mut self) -> Result<(), ShellError> {
        while let Some(line) = self.reader.read_line()? {
            let Some(request) = CommandRequest::parse(&line) else {
                continue;
            };
            match self.dispatcher.dispatch(&request) {
                Ok(_) => {}
                Err(e) if !e.is_fatal() => eprintln!("shredder: {e}"),
                Err(e) => return Err(e),
            }
        }
        tracing::debug!("end of input");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn lines(input: &str) -> Vec<Option<String>> {
        let mut reader = PlainReader::new(Cursor::new(input.as_bytes().to_vec()));
        let mut out = Vec::new();
        loop {
            let line = reader.read_line().unwrap();
            let done = line.is_none();
            out.push(line);
            if done {
                return out;
            }
        }
    }

    #[test]
    fn plain_reader_yields_lines_then_eof() {
        assert_eq!(
            lines("/bin/ls\n  \n/bin/echo hi\n"),
            [
                Some("/bin/ls\n".to_string()),
                Some("  \n".to_string()),
                Some("/bin/echo hi\n".to_string()),
                None
            ]
        );
    }

    #[test]
    fn plain_reader_returns_unterminated_last_line() {
        assert_eq!(lines("/bin/true"), [Some("/bin/true".to_string()), None]);
    }

    #[test]
    fn plain_reader_empty_input_is_eof() {
        assert_eq!(lines(""), [None]);
    }

    /// Fails its first read with `Interrupted`, then behaves like a cursor.
    struct InterruptedOnce {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedOnce {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(io::ErrorKind::Interrupted.into());
            }
            self.inner.read(buf)
        }
    }

    #[test]
    fn interrupted_read_yields_empty_line() {
        let input = io::BufReader::new(InterruptedOnce {
            interrupted: false,
            inner: Cursor::new(b"/bin/true\n".to_vec()),
        });
        let mut reader = PlainReader::new(input);
        assert_eq!(reader.read_line().unwrap(), Some(String::new()));
        assert_eq!(reader.read_line().unwrap(), Some("/bin/true\n".to_string()));
        assert_eq!(reader.read_line().unwrap(), None);
    }

    /// Replays canned lines.
    struct Script(Vec<&'static str>);

    impl LineReader for Script {
        fn read_line(&mut self) -> io::Result<Option<String>> {
            if self.0.is_empty() {
                Ok(None)
            } else {
                Ok(Some(self.0.remove(0).to_string()))
            }
        }
    }

    #[test]
    fn repl_skips_blank_lines_and_survives_bad_commands() {
        use crate::env::Environment;
        use crate::signals::SignalCoordinator;
        use crate::terminal::TerminalController;
        use crate::timeout::TimeoutGuard;

        let dispatcher = Dispatcher::new(
            SignalCoordinator::isolated(),
            TerminalController::detached(),
            TimeoutGuard::new(0),
            Environment::default(),
        );
        let script = Script(vec!["   ", "\t\n", "/bin/echo nul\0inside"]);
        let mut sh = Interpreter::new(dispatcher, Box::new(script));

        sh.repl().unwrap();
        assert_eq!(sh.dispatcher().state(), crate::dispatcher::DispatchState::Idle);
    }
}
