pub mod cd;
pub mod exit;
pub mod history;

use crate::shell::context::ShellContext;

/// Helper to register all built-in commands at once
pub fn register_all_builtins(ctx: &mut ShellContext) {
    ctx.register_command("cd", Box::new(cd::CdCommand));
    ctx.register_command("exit", Box::new(exit::ExitCommand));
    ctx.register_command("history", Box::new(history::HistoryCommand));
}
