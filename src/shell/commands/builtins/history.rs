// History command

use crate::error::ShellError;
use crate::shell::commands::{Builtin, finish_output};
use crate::shell::context::ShellContext;
use anyhow::Result;
use std::io::{self, Write};
use std::sync::PoisonError;

const DEFAULT_LIMIT: usize = 10;

/// Prints the most recent commands, newest first, with their usage counts.
pub struct HistoryCommand;

impl Builtin for HistoryCommand {
    fn execute(&self, args: &[String], ctx: &mut ShellContext) -> Result<i32> {
        let limit = match args.get(1) {
            Some(n) => n
                .parse::<usize>()
                .map_err(|_| ShellError::Builtin(format!("history: {}: invalid count", n)))?,
            None => DEFAULT_LIMIT,
        };

        let Some(history) = &ctx.history else {
            return Ok(0);
        };
        let store = history.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out = io::stdout().lock();
        let written = store
            .iter()
            .take(limit)
            .enumerate()
            .try_for_each(|(i, item)| {
                writeln!(out, "{:>5}  {}  (used {})", i + 1, item.command, item.usage_count)
            })
            .and_then(|()| out.flush());
        finish_output(written)
    }
}
