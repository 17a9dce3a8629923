// Exit command

use crate::error::ShellError;
use crate::shell::commands::Builtin;
use crate::shell::context::ShellContext;
use anyhow::Result;

pub struct ExitCommand;

impl Builtin for ExitCommand {
    fn execute(&self, args: &[String], ctx: &mut ShellContext) -> Result<i32> {
        let exit_code = match args.get(1) {
            Some(code) => code.parse::<i32>().map_err(|_| {
                ShellError::Builtin(format!("exit: {}: numeric argument required", code))
            })?,
            None => ctx.exit_code,
        };
        // The REPL winds down (and saves history) instead of exiting here
        ctx.exit_requested = Some(exit_code);
        Ok(exit_code)
    }
}
