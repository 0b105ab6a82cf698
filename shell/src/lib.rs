//! A single-child interactive command runner with terminal job control.
//!
//! The shell runs exactly one external program at a time in the foreground.
//! Each program is started in its own process group, handed the controlling
//! terminal while it runs and, when a deadline is configured, killed together
//! with its whole process group once the deadline passes.
//!
//! The main entry point is [`Interpreter`], which reads command lines and hands
//! them to a [`Dispatcher`]. The dispatcher drives the launch, foreground and
//! reap phases using the [`signals`], [`terminal`], [`timeout`] and [`launcher`]
//! building blocks.

pub mod command;
pub mod config;
pub mod dispatcher;
pub mod env;
pub mod error;
mod interpreter;
pub mod launcher;
pub mod signals;
pub mod terminal;
pub mod timeout;

pub use config::Config;
pub use dispatcher::Dispatcher;
pub use error::{LaunchError, ShellError};
pub use interpreter::{EditorReader, Interpreter, LineReader, PROMPT, PlainReader};
