use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Finds the program to run for `name`.
///
/// A name containing `/` is taken as a path and only checked for existence.
/// Anything else is looked up in the colon-separated `search_path`, first
/// executable match wins.
pub fn resolve_executable(name: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    if name.contains('/') {
        let path = Path::new(name);
        return path.exists().then(|| path.to_path_buf());
    }
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    which::which_in(name, search_path, cwd).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn test_finds_in_search_path() {
        let path = OsString::from("/nonexistent-dir:/bin:/usr/bin");
        let found = resolve_executable("sh", Some(&path)).unwrap();
        assert!(found.ends_with("sh"));
        assert!(found.is_absolute());
    }

    #[test]
    fn test_first_match_wins() {
        let path = OsString::from("/usr/bin:/bin");
        let found = resolve_executable("sh", Some(&path)).unwrap();
        let expected = if Path::new("/usr/bin/sh").exists() { "/usr/bin/sh" } else { "/bin/sh" };
        assert_eq!(found, PathBuf::from(expected));
    }

    #[test]
    fn test_path_names_are_used_as_is() {
        assert_eq!(resolve_executable("/bin/sh", None), Some(PathBuf::from("/bin/sh")));
        assert_eq!(resolve_executable("./definitely/not/here", None), None);
    }

    #[test]
    fn test_unknown_command() {
        let path = OsString::from("/bin:/usr/bin");
        assert_eq!(resolve_executable("mysh-no-such-command", Some(&path)), None);
        assert_eq!(resolve_executable("", Some(&path)), None);
    }
}
