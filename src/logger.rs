use colored::*;
use env_logger::{Builder, Target};
use log::Level;
use std::env;
use std::io::Write;

const DEFAULT_FILTER: &str = "warn";

/// Filter directives from `MYSH_LOG`, then `RUST_LOG`, else `warn`.
fn filter_spec(mysh_log: Option<String>, rust_log: Option<String>) -> String {
    mysh_log
        .or(rust_log)
        .filter(|spec| !spec.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

fn level_tag(level: Level) -> ColoredString {
    match level {
        Level::Error => "error".red().bold(),
        Level::Warn => "warn".yellow(),
        Level::Info => "info".green(),
        Level::Debug => "debug".blue(),
        Level::Trace => "trace".dimmed(),
    }
}

/// Installs the stderr logger. Calling it twice is harmless.
pub fn init() {
    let spec = filter_spec(env::var("MYSH_LOG").ok(), env::var("RUST_LOG").ok());
    let _ = Builder::new()
        .parse_filters(&spec)
        .target(Target::Stderr)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                "mysh".dimmed(),
                level_tag(record.level()),
                record.args()
            )
        })
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_precedence() {
        assert_eq!(filter_spec(None, None), "warn");
        assert_eq!(filter_spec(None, Some("info".into())), "info");
        assert_eq!(filter_spec(Some("debug".into()), Some("info".into())), "debug");
        assert_eq!(filter_spec(Some("  ".into()), None), "warn");
    }
}
