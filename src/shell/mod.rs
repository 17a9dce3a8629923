pub mod ast;
pub mod commands;
pub mod context;
pub mod executor;
pub mod parser;
pub mod resolve;
pub mod token;

use crate::error::status_of;
use anyhow::Result;
use colored::*;
use context::ShellContext;
use executor::execute_expr;

#[cfg(test)]
mod tests;

/// Parses and executes one line, recording its status in `ctx.exit_code`.
pub fn run_command_line(cmd_str: &str, ctx: &mut ShellContext) -> Result<i32> {
    let result = parser::parse_command_line(cmd_str, ctx).and_then(|expr| execute_expr(expr, ctx));
    ctx.exit_code = match &result {
        Ok(code) => *code,
        Err(err) => status_of(err),
    };
    result
}

/// Prints an error to stderr the way the shell reports every failure.
pub fn report_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "mysh:".red(), err);
}
