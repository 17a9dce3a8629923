use crate::shell::context::ShellContext;
use crate::shell::{report_error, run_command_line};

/// `mysh -c LINE`: runs one line without touching the history file.
pub fn handle_run(line: &str) -> i32 {
    let mut ctx = ShellContext::new();
    if let Err(err) = run_command_line(line, &mut ctx) {
        report_error(&err);
    }
    // Background jobs are left running, as a non-interactive shell would
    ctx.exit_requested.unwrap_or(ctx.exit_code)
}
