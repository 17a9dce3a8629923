use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mysh", version, about = "mysh: a small interactive shell")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Run one command line and exit with its status
    #[arg(short = 'c', value_name = "LINE")]
    pub line: Option<String>,

    /// Config file (default: $MYSH_CONFIG or ~/.myshrc.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// History file, overriding the config
    #[arg(long, global = true, value_name = "PATH")]
    pub history_file: Option<PathBuf>,

    /// Load the history file on startup
    #[arg(long, global = true)]
    pub load_history: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the persisted history, most recent first
    #[command(visible_alias = "h")]
    History {
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interactive_by_default() {
        let cli = Cli::try_parse_from(["mysh"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.line.is_none());
        assert!(!cli.load_history);
    }

    #[test]
    fn test_one_shot_line() {
        let cli = Cli::try_parse_from(["mysh", "-c", "echo hi | wc -c"]).unwrap();
        assert_eq!(cli.line.as_deref(), Some("echo hi | wc -c"));
    }

    #[test]
    fn test_history_subcommand_with_global_flags() {
        let cli = Cli::try_parse_from(["mysh", "history", "-n", "3", "--history-file", "/tmp/h"])
            .unwrap();
        assert!(matches!(cli.command, Some(Commands::History { count: 3 })));
        assert_eq!(cli.history_file, Some(PathBuf::from("/tmp/h")));
    }
}
