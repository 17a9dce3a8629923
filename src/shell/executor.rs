use crate::error::{ShellError, status_of};
use crate::history::HistoryStore;
use crate::shell::ast::Command;
use crate::shell::context::ShellContext;
use crate::shell::report_error;
use crate::shell::resolve::resolve_executable;
use anyhow::Result;
use colored::*;
use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, close, dup, dup2, fork, pipe};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{self, ExitStatus};
use std::sync::PoisonError;

const STDIN_FILENO: RawFd = 0;
const STDOUT_FILENO: RawFd = 1;

/// Runs `expr` to completion and returns its exit status.
///
/// The tree is consumed. `Background` nodes are the one exception to running
/// to completion: their child is left running and recorded in `ctx`.
pub fn execute_expr(expr: Command, ctx: &mut ShellContext) -> Result<i32> {
    match expr {
        Command::Exec { argv } => execute_simple(argv, ctx),
        Command::Redirect {
            child,
            input_file,
            output_file,
            append,
        } => {
            // Restored when the guard drops, on every path out of this arm
            let _saved = SavedStdio::save()?;
            if let Some(path) = input_file {
                let file = File::open(&path).map_err(|source| ShellError::Redirect {
                    path: path.clone(),
                    source,
                })?;
                rebind(&file, STDIN_FILENO, &path)?;
            }
            if let Some(path) = output_file {
                let file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .append(append)
                    .truncate(!append)
                    .mode(0o644)
                    .open(&path)
                    .map_err(|source| ShellError::Redirect {
                        path: path.clone(),
                        source,
                    })?;
                let _ = io::stdout().flush();
                rebind(&file, STDOUT_FILENO, &path)?;
            }
            execute_expr(*child, ctx)
        }
        Command::Pipe { left, right } => execute_pipe(*left, *right, ctx),
        Command::Sequence { left, right } => {
            // The right side runs whatever happened on the left
            if let Err(err) = execute_expr(*left, ctx) {
                ctx.exit_code = status_of(&err);
                report_error(&err);
            }
            execute_expr(*right, ctx)
        }
        Command::Background { child } => {
            let pid = fork_subtree(*child, ctx, || Ok(()))?;
            eprintln!("{} {}", format!("[{}]", ctx.background.len() + 1).cyan(), pid);
            ctx.background.push(pid);
            ctx.exit_code = 0;
            Ok(0)
        }
    }
}

fn execute_simple(argv: Vec<String>, ctx: &mut ShellContext) -> Result<i32> {
    let Some(program) = argv.first() else {
        return Ok(0);
    };

    let registry = ctx.registry.clone();
    if let Some(builtin) = registry.get(program) {
        let exit_code = builtin.execute(&argv, ctx)?;
        ctx.exit_code = exit_code;
        return Ok(exit_code);
    }

    let path = resolve_executable(program, ctx.search_path.as_deref())
        .ok_or_else(|| ShellError::CommandNotFound(program.clone()))?;
    debug!("exec {} as {:?}", path.display(), argv);

    let _ = io::stdout().flush();
    let status = process::Command::new(&path)
        .arg0(program)
        .args(&argv[1..])
        .status()
        .map_err(|source| ShellError::Spawn {
            program: program.clone(),
            source,
        })?;

    let exit_code = exit_code(status);
    ctx.exit_code = exit_code;
    Ok(exit_code)
}

fn execute_pipe(left: Command, right: Command, ctx: &mut ShellContext) -> Result<i32> {
    let (read_end, write_end) = pipe().map_err(ShellError::Pipe)?;
    let (read_fd, write_fd) = (read_end.as_raw_fd(), write_end.as_raw_fd());

    // Children close raw fds and never return, so their copies of the
    // OwnedFd handles are never dropped a second time.
    let left_pid = fork_subtree(left, ctx, || {
        close(read_fd)?;
        dup2(write_fd, STDOUT_FILENO)?;
        close(write_fd)
    })?;

    let right_pid = match fork_subtree(right, ctx, || {
        close(write_fd)?;
        dup2(read_fd, STDIN_FILENO)?;
        close(read_fd)
    }) {
        Ok(pid) => pid,
        Err(err) => {
            drop(read_end);
            drop(write_end);
            wait_child(left_pid);
            return Err(err.into());
        }
    };

    // The reader only sees EOF once every write end is closed
    drop(read_end);
    drop(write_end);

    wait_child(left_pid);
    let exit_code = wait_child(right_pid);
    ctx.exit_code = exit_code;
    Ok(exit_code)
}

/// Forks a child that applies `wire` to its descriptors, runs `expr` and
/// exits with its status. Returns the child's pid in the parent.
fn fork_subtree<F>(expr: Command, ctx: &mut ShellContext, wire: F) -> Result<Pid, ShellError>
where
    F: FnOnce() -> nix::Result<()>,
{
    // Anything still buffered would otherwise be written by both processes
    let _ = io::stdout().flush();

    // The autosave thread does not survive the fork, so a lock it holds would
    // never be released in the child. The child works on its own copy.
    let detached = ctx
        .history
        .as_ref()
        .map(|history| history.lock().unwrap_or_else(PoisonError::into_inner).clone());

    // SAFETY: the child only rewires descriptors, runs the subtree and exits
    // through `_exit` without returning into the caller.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            debug!("forked {}", child);
            Ok(child)
        }
        Ok(ForkResult::Child) => {
            ctx.history = detached.map(HistoryStore::into_shared);
            let exit_code = match wire() {
                Ok(()) => run_in_child(expr, ctx),
                Err(err) => {
                    eprintln!("{} {}", "mysh:".red(), err);
                    1
                }
            };
            let _ = io::stdout().flush();
            // SAFETY: terminates the child without running the parent's
            // atexit handlers or destructors.
            unsafe { nix::libc::_exit(exit_code) }
        }
        Err(err) => Err(ShellError::Spawn {
            program: "fork".to_string(),
            source: err.into(),
        }),
    }
}

fn run_in_child(expr: Command, ctx: &mut ShellContext) -> i32 {
    match execute_expr(expr, ctx) {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            status_of(&err)
        }
    }
}

/// Blocks until `pid` exits. Wait failures are logged and count as status 1.
pub fn wait_child(pid: Pid) -> i32 {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return code,
            Ok(WaitStatus::Signaled(_, sig, _)) => return 128 + sig as i32,
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(err) => {
                warn!("waitpid({}) failed: {}", pid, err);
                return 1;
            }
        }
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

fn rebind(file: &File, target: RawFd, path: &str) -> Result<(), ShellError> {
    dup2(file.as_raw_fd(), target).map_err(|err| ShellError::Redirect {
        path: path.to_string(),
        source: err.into(),
    })?;
    Ok(())
}

/// Copies of the shell's stdin and stdout, put back on drop.
struct SavedStdio {
    stdin: OwnedFd,
    stdout: OwnedFd,
}

impl SavedStdio {
    fn save() -> Result<Self, ShellError> {
        let stdin = save_fd(STDIN_FILENO, "<stdin>")?;
        let stdout = save_fd(STDOUT_FILENO, "<stdout>")?;
        Ok(Self { stdin, stdout })
    }
}

fn save_fd(fd: RawFd, name: &str) -> Result<OwnedFd, ShellError> {
    let copy = dup(fd).map_err(|err| ShellError::Redirect {
        path: name.to_string(),
        source: err.into(),
    })?;
    // SAFETY: `dup` just returned this descriptor and nothing else owns it
    Ok(unsafe { OwnedFd::from_raw_fd(copy) })
}

impl Drop for SavedStdio {
    fn drop(&mut self) {
        let _ = io::stdout().flush();
        if let Err(err) = dup2(self.stdin.as_raw_fd(), STDIN_FILENO) {
            warn!("Failed to restore stdin: {}", err);
        }
        if let Err(err) = dup2(self.stdout.as_raw_fd(), STDOUT_FILENO) {
            warn!("Failed to restore stdout: {}", err);
        }
    }
}
