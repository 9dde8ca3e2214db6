//! Small host queries used around command execution

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Whether `path` is an existing regular file
pub fn file_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_file()
}

/// Whether `path` is an existing directory
pub fn dir_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_dir()
}

/// Operating system the agent runs on, e.g. `linux`
#[must_use]
pub fn agent_platform() -> &'static str {
    std::env::consts::OS
}

/// Locate `program` on `PATH`
pub fn which(program: &str) -> Option<PathBuf> {
    ::which::which(program).ok()
}

/// Fresh path for a generated inventory file
#[must_use]
pub fn temporary_inventory_path() -> PathBuf {
    PathBuf::from(format!("/tmp/{}inventory.ini", Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_and_dir_checks() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("playbook.yml");
        std::fs::write(&file, "- hosts: all\n").unwrap();

        assert!(file_exists(&file));
        assert!(!dir_exists(&file));
        assert!(dir_exists(dir.path()));
        assert!(!file_exists(dir.path()));
        assert!(!file_exists(dir.path().join("missing")));
    }

    #[test]
    fn test_temporary_inventory_paths_are_unique() {
        let first = temporary_inventory_path();
        let second = temporary_inventory_path();

        assert_ne!(first, second);
        assert!(first.starts_with("/tmp"));
        assert!(first.to_string_lossy().ends_with("inventory.ini"));
    }

    #[cfg(unix)]
    #[test]
    fn test_which_finds_shell() {
        assert!(which("sh").is_some());
        assert!(which("ferry-no-such-program").is_none());
    }

    #[test]
    fn test_agent_platform() {
        assert!(!agent_platform().is_empty());
    }
}
