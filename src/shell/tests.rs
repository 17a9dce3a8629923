use crate::error::{ShellError, status_of};
use crate::history::HistoryStore;
use crate::shell::context::ShellContext;
use crate::shell::executor::wait_child;
use crate::shell::run_command_line;
use nix::errno::Errno;
use nix::sys::stat::fstat;
use nix::sys::wait::{WaitPidFlag, waitpid};
use nix::unistd::{ForkResult, alarm, dup2, fork};
use std::fs;
use std::io::{self, Write};
use std::os::fd::AsRawFd;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

fn scratch(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("mysh_exec_{}_{}", std::process::id(), name));
    let _ = fs::remove_file(&path);
    path
}

/// Runs `f` in a forked child and returns its exit status.
///
/// Redirections rebind the process-wide descriptors and `cd` changes the
/// process-wide directory, so those tests run out of the harness process.
fn in_subshell<F: FnOnce() -> i32>(f: F) -> i32 {
    let _ = io::stdout().flush();
    match unsafe { fork() }.unwrap() {
        ForkResult::Child => {
            let code = panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or(101);
            unsafe { nix::libc::_exit(code) }
        }
        ForkResult::Parent { child } => wait_child(child),
    }
}

fn run_line(line: &str) -> i32 {
    let line = line.to_string();
    in_subshell(move || {
        let mut ctx = ShellContext::new();
        match run_command_line(&line, &mut ctx) {
            Ok(code) => code,
            Err(err) => status_of(&err),
        }
    })
}

#[test]
fn test_redirect_round_trip_through_file() {
    let f = scratch("roundtrip_f");
    let g = scratch("roundtrip_g");
    assert_eq!(run_line(&format!("echo hi > {}", f.display())), 0);
    assert_eq!(run_line(&format!("cat < {} > {}", f.display(), g.display())), 0);
    assert_eq!(fs::read_to_string(&g).unwrap(), "hi\n");
    fs::remove_file(f).unwrap();
    fs::remove_file(g).unwrap();
}

#[test]
fn test_append_redirect() {
    let f = scratch("append");
    let code = run_line(&format!("echo a > \"{0}\"; echo b >> \"{0}\"; echo c >> \"{0}\"", f.display()));
    assert_eq!(code, 0);
    assert_eq!(fs::read_to_string(&f).unwrap(), "a\nb\nc\n");
    fs::remove_file(f).unwrap();
}

#[test]
fn test_last_output_redirect_wins() {
    let first = scratch("first");
    let second = scratch("second");
    assert_eq!(run_line(&format!("echo hi > {} > {}", first.display(), second.display())), 0);
    assert!(!first.exists());
    assert_eq!(fs::read_to_string(&second).unwrap(), "hi\n");
    fs::remove_file(second).unwrap();
}

#[test]
fn test_three_stage_pipeline() {
    let out = scratch("pipeline");
    let code = run_line(&format!("printf \"b\\na\\nc\\n\" | sort | head -n 2 > {}", out.display()));
    assert_eq!(code, 0);
    assert_eq!(fs::read_to_string(&out).unwrap(), "a\nb\n");
    fs::remove_file(out).unwrap();
}

#[test]
fn test_pipeline_reaps_every_child() {
    let out = scratch("reaped");
    let line = format!("echo x | cat | cat > {}", out.display());
    let code = in_subshell(move || {
        let mut ctx = ShellContext::new();
        if run_command_line(&line, &mut ctx).ok() != Some(0) {
            return 1;
        }
        // Nothing is left to reap once the pipeline returns
        match waitpid(None, Some(WaitPidFlag::WNOHANG)) {
            Err(Errno::ECHILD) => 0,
            _ => 2,
        }
    });
    assert_eq!(code, 0);
    assert_eq!(fs::read_to_string(&out).unwrap(), "x\n");
    fs::remove_file(out).unwrap();
}

#[test]
fn test_pipeline_status_is_right_side() {
    assert_eq!(run_line("true | false"), 1);
    assert_eq!(run_line("false | true"), 0);
}

#[test]
fn test_sequence_runs_right_after_failure() {
    let out = scratch("sequence");
    let code = run_line(&format!("mysh-no-such-command; echo ok > {}", out.display()));
    assert_eq!(code, 0);
    assert_eq!(fs::read_to_string(&out).unwrap(), "ok\n");
    fs::remove_file(out).unwrap();
}

#[test]
fn test_group_output_redirect() {
    let out = scratch("group");
    assert_eq!(run_line(&format!("(echo a; echo b) > {}", out.display())), 0);
    assert_eq!(fs::read_to_string(&out).unwrap(), "a\nb\n");
    fs::remove_file(out).unwrap();
}

#[test]
fn test_exit_status_expansion() {
    let out = scratch("status");
    let line = format!("echo $? > {}", out.display());
    // Expansion happens when a line is parsed, so the status comes from the previous line
    let code = in_subshell(move || {
        let mut ctx = ShellContext::new();
        let _ = run_command_line("false", &mut ctx);
        run_command_line(&line, &mut ctx).unwrap_or(1)
    });
    assert_eq!(code, 0);
    assert_eq!(fs::read_to_string(&out).unwrap(), "1\n");
    fs::remove_file(out).unwrap();
}

#[test]
fn test_failed_redirect_restores_stdio() {
    let code = in_subshell(|| {
        let before = (fstat(0).unwrap(), fstat(1).unwrap());
        let mut ctx = ShellContext::new();
        let err = run_command_line("cat < /nonexistent/mysh/input > /dev/null", &mut ctx).unwrap_err();
        if !matches!(err.downcast_ref::<ShellError>(), Some(ShellError::Redirect { .. })) {
            return 1;
        }
        let after = (fstat(0).unwrap(), fstat(1).unwrap());
        let same = |a: &nix::sys::stat::FileStat, b: &nix::sys::stat::FileStat| {
            a.st_dev == b.st_dev && a.st_ino == b.st_ino
        };
        if !same(&before.0, &after.0) || !same(&before.1, &after.1) {
            return 2;
        }
        0
    });
    assert_eq!(code, 0);
}

#[test]
fn test_cd_changes_shell_directory() {
    let dir = std::env::temp_dir().join(format!("mysh_cd_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let target = dir.canonicalize().unwrap();
    let out = scratch("pwd");
    let line = format!("cd {}; pwd > {}", target.display(), out.display());

    let expected = target.clone();
    let code = in_subshell(move || {
        let mut ctx = ShellContext::new();
        if run_command_line(&line, &mut ctx).is_err() {
            return 1;
        }
        if std::env::current_dir().ok() != Some(expected) {
            return 2;
        }
        // A failed cd reports and leaves the directory alone
        if run_command_line("cd /nonexistent/mysh", &mut ctx).is_ok() {
            return 3;
        }
        0
    });
    assert_eq!(code, 0);
    assert_eq!(fs::read_to_string(&out).unwrap().trim_end(), target.display().to_string());
    fs::remove_file(out).unwrap();
    fs::remove_dir(dir).unwrap();
}

#[test]
fn test_cd_inside_pipeline_does_not_leak() {
    let code = in_subshell(|| {
        let before = std::env::current_dir().ok();
        let mut ctx = ShellContext::new();
        if run_command_line("cd / | true", &mut ctx).is_err() {
            return 1;
        }
        if std::env::current_dir().ok() != before {
            return 2;
        }
        0
    });
    assert_eq!(code, 0);
}

#[test]
fn test_background_returns_immediately() {
    let code = in_subshell(|| {
        let mut ctx = ShellContext::new();
        let start = Instant::now();
        if run_command_line("sleep 0.5 &", &mut ctx).ok() != Some(0) {
            return 1;
        }
        if start.elapsed() >= Duration::from_millis(400) || ctx.background.len() != 1 {
            return 2;
        }
        let deadline = Instant::now() + Duration::from_secs(5);
        while !ctx.background.is_empty() {
            if Instant::now() > deadline {
                return 3;
            }
            std::thread::sleep(Duration::from_millis(20));
            ctx.reap_background();
        }
        0
    });
    assert_eq!(code, 0);
}

#[test]
fn test_history_builtin_honours_redirect() {
    let out = scratch("history");
    let line = format!("history 2 > {}", out.display());
    let code = in_subshell(move || {
        let mut store = HistoryStore::new();
        store.add_or_touch("ls", "/");
        store.add_or_touch("make", "/");
        store.add_or_touch("ls", "/");
        let mut ctx = ShellContext::new().with_history(store.into_shared());
        run_command_line(&line, &mut ctx).unwrap_or(1)
    });
    assert_eq!(code, 0);
    let content = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines, vec!["    1  ls  (used 2)", "    2  make  (used 1)"]);
    fs::remove_file(out).unwrap();
}

#[test]
fn test_forked_builtin_ignores_held_history_lock() {
    let out = scratch("held_lock");
    let line = format!("history | cat > {}", out.display());
    let code = in_subshell(move || {
        let mut store = HistoryStore::new();
        store.add_or_touch("make", "/");
        let shared = store.into_shared();

        // Another thread (the autosave worker in the REPL) owns the lock
        // when the pipeline forks
        let (locked_tx, locked_rx) = mpsc::channel();
        let holder = {
            let shared = shared.clone();
            std::thread::spawn(move || {
                let _guard = shared.lock().unwrap();
                let _ = locked_tx.send(());
                std::thread::sleep(Duration::from_millis(300));
            })
        };
        if locked_rx.recv().is_err() {
            return 1;
        }

        // A deadlocked child would hang the wait; SIGALRM turns that into 142
        alarm::set(5);
        let mut ctx = ShellContext::new().with_history(shared);
        let code = run_command_line(&line, &mut ctx).unwrap_or(2);
        let _ = holder.join();
        code
    });
    assert_eq!(code, 0);
    assert_eq!(fs::read_to_string(&out).unwrap(), "    1  make  (used 1)\n");
    fs::remove_file(out).unwrap();
}

#[test]
fn test_builtin_quiet_when_reader_exits() {
    let out = scratch("closed_pipe");
    let errors = scratch("closed_pipe_err");
    let line = format!("history 500 | head -n 1 > {}", out.display());
    let errors_path = errors.clone();
    let code = in_subshell(move || {
        // Far more than a pipe buffer, so the writer sees the reader go away
        let mut store = HistoryStore::new();
        let padding = "x".repeat(300);
        for i in 0..500 {
            store.add_or_touch(&format!("echo {} {}", i, padding), "/");
        }
        let Ok(stderr_file) = fs::File::create(&errors_path) else {
            return 1;
        };
        if dup2(stderr_file.as_raw_fd(), 2).is_err() {
            return 2;
        }
        let mut ctx = ShellContext::new().with_history(store.into_shared());
        run_command_line(&line, &mut ctx).unwrap_or(3)
    });
    assert_eq!(code, 0);
    assert!(fs::read_to_string(&out).unwrap().starts_with("    1  echo 499 "));
    let stderr = fs::read_to_string(&errors).unwrap();
    assert!(!stderr.contains("Broken pipe"), "unexpected stderr: {}", stderr);
    fs::remove_file(out).unwrap();
    fs::remove_file(errors).unwrap();
}

#[test]
fn test_command_not_found() {
    let mut ctx = ShellContext::new();
    let err = run_command_line("mysh-no-such-command --flag", &mut ctx).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ShellError>(),
        Some(ShellError::CommandNotFound(name)) if name == "mysh-no-such-command"
    ));
    assert_eq!(ctx.exit_code, 127);
}

#[test]
fn test_parse_error_aborts_line() {
    let mut ctx = ShellContext::new();
    let err = run_command_line("echo hi >", &mut ctx).unwrap_err();
    assert_eq!(err.to_string(), "parse error: missing filename for redirection");
    assert_eq!(ctx.exit_code, 2);
}

#[test]
fn test_empty_line_is_noop() {
    let mut ctx = ShellContext::new();
    ctx.exit_code = 5;
    assert_eq!(run_command_line("   ", &mut ctx).unwrap(), 0);
    assert_eq!(ctx.exit_code, 0);
}

#[test]
fn test_exit_builtin() {
    let mut ctx = ShellContext::new();
    assert_eq!(run_command_line("exit 3", &mut ctx).unwrap(), 3);
    assert_eq!(ctx.exit_requested, Some(3));

    let mut ctx = ShellContext::new();
    assert!(run_command_line("exit nope", &mut ctx).is_err());
    assert_eq!(ctx.exit_requested, None);
}
