mod cli;
mod config;
mod editor;
mod error;
mod handlers;
mod history;
mod logger;
mod shell;
mod utils;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use config::load_config;
use handlers::{history as history_cmd, repl, run};

fn main() -> Result<()> {
    logger::init();
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(path) = &cli.history_file {
        config.history.path = Some(path.to_string_lossy().into_owned());
    }
    if cli.load_history {
        config.history.load_on_startup = true;
    }

    let code = match (cli.command, cli.line) {
        (Some(Commands::History { count }), _) => {
            history_cmd::handle_history(&config, count)?;
            0
        }
        (None, Some(line)) => run::handle_run(&line),
        (None, None) => repl::handle_repl(&config)?,
    };
    std::process::exit(code);
}
