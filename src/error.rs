//! Error kinds raised by the shell core.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a line, a node or a persistence pass, never the shell.
#[derive(Debug, Error)]
pub enum ShellError {
    /// Malformed input: missing redirection target, unmatched grouping
    #[error("parse error: {0}")]
    Parse(String),
    /// No executable found for the program name
    #[error("command not found: {0}")]
    CommandNotFound(String),
    /// Process creation failed
    #[error("failed to execute {program}: {source}")]
    Spawn { program: String, source: io::Error },
    /// A redirection target could not be opened or bound
    #[error("{path}: {source}")]
    Redirect { path: String, source: io::Error },
    /// The pipe between two commands could not be created
    #[error("failed to create pipe: {0}")]
    Pipe(#[source] nix::Error),
    /// Writing or replacing the history file failed
    #[error("failed to save history to {}: {source}", path.display())]
    Persist { path: PathBuf, source: io::Error },
    /// A builtin rejected its arguments
    #[error("{0}")]
    Builtin(String),
}

impl ShellError {
    /// Exit status reported for a node that failed with this error.
    pub fn status(&self) -> i32 {
        match self {
            ShellError::CommandNotFound(_) => 127,
            ShellError::Spawn { .. } => 126,
            ShellError::Parse(_) => 2,
            _ => 1,
        }
    }
}

/// Exit status for any error surfaced by the executor.
pub fn status_of(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<ShellError>().map(ShellError::status).unwrap_or(1)
}
