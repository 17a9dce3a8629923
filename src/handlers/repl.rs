use crate::config::ShellConfig;
use crate::editor::terminal::{self, RawMode};
use crate::editor::{Action, HistoryView, LineEditor};
use crate::history::{HistoryService, SharedHistory};
use crate::shell::context::ShellContext;
use crate::shell::{report_error, run_command_line};
use crate::utils::render_prompt;
use anyhow::{Context, Result};
use colored::*;
use log::info;
use std::env;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Runs the interactive shell until `exit` or end of input. Returns the
/// status the process should exit with.
pub fn handle_repl(config: &ShellConfig) -> Result<i32> {
    // SIGINT interrupts the foreground command, never the shell
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let flag = interrupted.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .context("Failed to install Ctrl-C handler")?;
    }

    let service = HistoryService::start(config.history.options())?;
    let mut history = service.store();
    let mut ctx = ShellContext::new().with_history(service.store());

    let result = if io::stdin().is_terminal() {
        interactive_loop(&mut ctx, &mut history, config, &interrupted)
    } else {
        batch_loop(&mut ctx, &mut history)
    };

    info!("Saving history to {}", service.path().display());
    service.shutdown();
    result
}

fn interactive_loop(
    ctx: &mut ShellContext,
    history: &mut SharedHistory,
    config: &ShellConfig,
    interrupted: &AtomicBool,
) -> Result<i32> {
    let mut editor = LineEditor::new();
    loop {
        report_finished_jobs(ctx);

        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("?"));
        let prompt = render_prompt(&cwd, &config.prompt);
        let Some(line) = read_line(&mut editor, &prompt, history)? else {
            println!();
            break;
        };

        execute_line(&line, ctx);
        if interrupted.swap(false, Ordering::SeqCst) {
            println!();
        }
        if let Some(code) = ctx.exit_requested {
            return Ok(code);
        }
    }
    Ok(ctx.exit_code)
}

/// Edits one line in raw mode. `None` at end of input.
fn read_line(
    editor: &mut LineEditor,
    prompt: &str,
    history: &mut SharedHistory,
) -> Result<Option<String>> {
    let _raw = RawMode::enable().context("Failed to put the terminal in raw mode")?;
    let mut out = io::stdout();
    write!(out, "{}", editor.render(prompt))?;
    out.flush()?;

    loop {
        let Some(byte) = terminal::read_byte()? else {
            return Ok(None);
        };
        match editor.feed(byte, history) {
            Action::Continue => {}
            Action::Redraw => write!(out, "{}", editor.render(prompt))?,
            Action::Commit(line) => {
                write!(out, "\r\n")?;
                out.flush()?;
                return Ok(Some(line));
            }
            Action::Eof => return Ok(None),
            Action::Interrupted => write!(out, "^C\r\n{}", editor.render(prompt))?,
        }
        out.flush()?;
    }
}

/// Reads lines from a non-terminal stdin, one command line each.
fn batch_loop(ctx: &mut ShellContext, history: &mut SharedHistory) -> Result<i32> {
    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read from stdin")?;
        history.commit(&line);
        execute_line(&line, ctx);
        report_finished_jobs(ctx);
        if let Some(code) = ctx.exit_requested {
            return Ok(code);
        }
    }
    Ok(ctx.exit_code)
}

fn execute_line(line: &str, ctx: &mut ShellContext) {
    if line.trim().is_empty() {
        return;
    }
    if let Err(err) = run_command_line(line, ctx) {
        report_error(&err);
    }
}

fn report_finished_jobs(ctx: &mut ShellContext) {
    for (pid, code) in ctx.reap_background() {
        eprintln!("{} done ({})", format!("[{}]", pid).cyan(), code);
    }
}
