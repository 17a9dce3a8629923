// Cd command

use crate::error::ShellError;
use crate::shell::commands::Builtin;
use crate::shell::context::ShellContext;
use anyhow::Result;
use log::debug;
use std::env;

/// Changes the working directory of the shell process itself; running it in
/// a child would make the change invisible to the shell.
pub struct CdCommand;

impl Builtin for CdCommand {
    fn execute(&self, args: &[String], _ctx: &mut ShellContext) -> Result<i32> {
        // args[0] is "cd". args[1] is path.
        let target = match args.get(1) {
            Some(path) => path.clone(),
            None => env::var("HOME").map_err(|_| ShellError::Builtin("cd: HOME not set".to_string()))?,
        };

        env::set_current_dir(&target)
            .map_err(|err| ShellError::Builtin(format!("cd: {}: {}", target, err)))?;
        debug!("cd -> {:?}", env::current_dir().ok());
        Ok(0)
    }
}
