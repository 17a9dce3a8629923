use crate::history::SharedHistory;
use crate::shell::commands::Builtin;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use log::{info, warn};
use std::collections::HashMap;
use std::ffi::OsString;
use std::sync::Arc;

pub struct ShellContext {
    pub exit_code: i32,
    /// Colon-separated directories searched for executables
    pub search_path: Option<OsString>,
    pub registry: Arc<HashMap<String, Box<dyn Builtin>>>,
    pub history: Option<SharedHistory>,
    /// Background children not yet reaped
    pub background: Vec<Pid>,
    /// Set by `exit`; the REPL stops after the current line
    pub exit_requested: Option<i32>,
}

impl ShellContext {
    pub fn new() -> Self {
        let mut ctx = Self {
            exit_code: 0,
            search_path: std::env::var_os("PATH"),
            registry: Arc::new(HashMap::new()),
            history: None,
            background: Vec::new(),
            exit_requested: None,
        };
        crate::shell::commands::register_all_builtins(&mut ctx);
        ctx
    }

    pub fn with_history(mut self, history: SharedHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn register_command(&mut self, name: &str, command: Box<dyn Builtin>) {
        if let Some(map) = Arc::get_mut(&mut self.registry) {
            map.insert(name.to_string(), command);
        } else {
            warn!("Cannot register builtin '{}': registry is shared", name);
        }
    }

    /// Value of `$name` for expansion; `$?` is the last exit status.
    pub fn lookup_var(&self, name: &str) -> Option<String> {
        if name == "?" {
            Some(self.exit_code.to_string())
        } else {
            std::env::var(name).ok()
        }
    }

    /// Collects background children that have exited, without blocking.
    /// Returns each reaped pid with its exit status.
    pub fn reap_background(&mut self) -> Vec<(Pid, i32)> {
        let mut finished = Vec::new();
        self.background.retain(|&pid| match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => true,
            Ok(WaitStatus::Exited(_, code)) => {
                finished.push((pid, code));
                false
            }
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                finished.push((pid, 128 + sig as i32));
                false
            }
            Ok(_) => true,
            Err(err) => {
                warn!("waitpid({}) failed: {}", pid, err);
                false
            }
        });
        for (pid, code) in &finished {
            info!("Background job {} finished with status {}", pid, code);
        }
        finished
    }
}

impl Default for ShellContext {
    fn default() -> Self {
        Self::new()
    }
}
