use crate::config::ShellConfig;
use crate::history::persist;
use anyhow::Result;
use chrono::Local;
use colored::*;

/// Prints the persisted history file, most recent first.
pub fn handle_history(config: &ShellConfig, count: usize) -> Result<()> {
    let path = config.history.resolved_path();
    let store = persist::load(&path, config.history.capacity)?;

    if store.is_empty() {
        println!("No history recorded in {}", path.display());
        return Ok(());
    }

    println!("{} {}", "History:".bold().underline(), path.display().to_string().dimmed());
    let width = store.iter().take(count).map(|item| item.command.len()).max().unwrap_or(0);
    for (i, item) in store.iter().take(count).enumerate() {
        let when = item.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S");
        println!(
            "{:>5}  {}  {}  {}",
            i + 1,
            format!("{:<width$}", item.command).cyan(),
            format!("used {}", item.usage_count).dimmed(),
            when.to_string().italic()
        );
    }
    Ok(())
}
