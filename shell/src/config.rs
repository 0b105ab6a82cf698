use argh::{EarlyExit, FromArgs};
use std::env;

/// Environment variable holding the log filter (`tracing_subscriber::EnvFilter` syntax).
pub const LOG_ENV: &str = "SHREDDER_LOG";

const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(FromArgs, Debug, PartialEq)]
/// Run one program at a time in the foreground, killing it once it outlives the deadline.
pub struct Options {
    #[argh(positional)]
    /// seconds a command may run before its process group is killed; 0 or omitted disables the deadline
    pub timeout: Option<u32>,
}

/// Startup configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Deadline in seconds, 0 when disabled.
    pub timeout: u32,
    pub log_filter: String,
}

impl Config {
    /// Parse the command line (without the program name) and read the log filter.
    ///
    /// Usage errors and `--help` come back as [`EarlyExit`], exactly as argh reports them.
    pub fn from_args(command_name: &str, args: &[&str]) -> Result<Self, EarlyExit> {
        let options = Options::from_args(&[command_name], args)?;
        Ok(Self {
            timeout: options.timeout.unwrap_or(0),
            log_filter: env::var(LOG_ENV).unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: 0,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}
