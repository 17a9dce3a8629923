pub mod builtins;

use crate::shell::context::ShellContext;
use anyhow::Result;
use std::io;

/// Status of a writer killed by SIGPIPE (128 + 13).
const BROKEN_PIPE_STATUS: i32 = 141;

pub use builtins::register_all_builtins;

/// A command that runs inside the shell process instead of a child.
///
/// Builtins write through `std::io::stdout()` so that redirections, which
/// rebind file descriptor 1, apply to them as well.
pub trait Builtin: Send + Sync {
    fn execute(&self, args: &[String], ctx: &mut ShellContext) -> Result<i32>;
}

/// Turns the result of a builtin's output into its exit status.
///
/// SIGPIPE is ignored in the shell, so a reader that went away (`history |
/// head -n1`) shows up as `BrokenPipe`. That ends the builtin quietly, the
/// way SIGPIPE ends an external command.
pub fn finish_output(result: io::Result<()>) -> Result<i32> {
    match result {
        Ok(()) => Ok(0),
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(BROKEN_PIPE_STATUS),
        Err(err) => Err(err.into()),
    }
}
