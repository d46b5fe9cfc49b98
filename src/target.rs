use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::SessionError;

/// The directory whose changes trigger run cycles, plus an optional entry script.
///
/// When the entry script is set and exists it is what gets executed on every
/// change; otherwise the changed script itself is executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchTarget {
    directory: PathBuf,
    entry: Option<PathBuf>,
}

impl WatchTarget {
    pub fn new(directory: impl Into<PathBuf>, entry: Option<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            entry,
        }
    }

    /// Build a target from a user selection.
    ///
    /// A directory is watched as-is. A file is treated as the entry script and its
    /// parent directory is watched.
    pub fn from_selection(path: &Path) -> Self {
        if path.is_file() {
            let directory = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            Self::new(directory, Some(path.to_path_buf()))
        } else {
            Self::new(path, None)
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn entry(&self) -> Option<&Path> {
        self.entry.as_deref()
    }

    /// Check the watched directory exists and is a directory.
    pub fn validate(&self) -> Result<(), SessionError> {
        if !self.directory.exists() {
            return Err(SessionError::TargetMissing(self.directory.clone()));
        }
        if !self.directory.is_dir() {
            return Err(SessionError::NotADirectory(self.directory.clone()));
        }
        Ok(())
    }

    /// The script to execute for a change to `changed`.
    pub fn executable_for(&self, changed: &Path) -> PathBuf {
        match &self.entry {
            Some(entry) if entry.is_file() => entry.clone(),
            _ => changed.to_path_buf(),
        }
    }

    /// True when an entry script is configured and present on disk.
    pub fn has_entry(&self) -> bool {
        self.entry.as_deref().is_some_and(Path::is_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_selecting_a_file_watches_its_parent() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("main.py");
        fs::write(&script, "print('hi')").unwrap();

        let target = WatchTarget::from_selection(&script);
        assert_eq!(target.directory(), dir.path());
        assert_eq!(target.entry(), Some(script.as_path()));
    }

    #[test]
    fn test_selecting_a_directory_has_no_entry() {
        let dir = tempfile::tempdir().unwrap();
        let target = WatchTarget::from_selection(dir.path());
        assert_eq!(target.directory(), dir.path());
        assert!(target.entry().is_none());
    }

    #[test]
    fn test_validate_reports_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let target = WatchTarget::new(&missing, None);
        assert_eq!(target.validate(), Err(SessionError::TargetMissing(missing)));
    }

    #[test]
    fn test_validate_rejects_plain_file_as_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.py");
        fs::write(&file, "").unwrap();
        let target = WatchTarget::new(&file, None);
        assert_eq!(target.validate(), Err(SessionError::NotADirectory(file)));
    }

    #[test]
    fn test_executable_prefers_existing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("main.py");
        let changed = dir.path().join("util.py");
        fs::write(&entry, "").unwrap();

        let target = WatchTarget::new(dir.path(), Some(entry.clone()));
        assert_eq!(target.executable_for(&changed), entry);
        assert!(target.has_entry());
    }

    #[test]
    fn test_executable_falls_back_to_changed_file_when_entry_missing() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("main.py");
        let changed = dir.path().join("util.py");

        let target = WatchTarget::new(dir.path(), Some(entry));
        assert_eq!(target.executable_for(&changed), changed);
        assert!(!target.has_entry());
    }
}
