use crate::config::PromptConfig;
use colored::*;
use regex::Regex;
use std::borrow::Cow;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn ansi_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").ok())
        .as_ref()
}

pub fn strip_ansi(content: &str) -> Cow<'_, str> {
    match ansi_pattern() {
        Some(re) => re.replace_all(content, ""),
        None => Cow::Borrowed(content),
    }
}

/// Columns `text` occupies on screen, escape sequences excluded.
pub fn visible_width(text: &str) -> usize {
    strip_ansi(text).chars().count()
}

pub fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

/// Expands a leading `~` to `home`. Other paths are returned unchanged.
pub fn expand_tilde_with(path: &str, home: Option<&Path>) -> PathBuf {
    match (path, home) {
        ("~", Some(home)) => home.to_path_buf(),
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    expand_tilde_with(path, home_dir().as_deref())
}

/// The working directory followed by the prompt symbol.
pub fn render_prompt(cwd: &Path, prompt: &PromptConfig) -> String {
    let dir = cwd.display().to_string();
    if prompt.color {
        format!("{}{}", dir.truecolor(102, 204, 255), prompt.symbol)
    } else {
        format!("{}{}", dir, prompt.symbol)
    }
}
