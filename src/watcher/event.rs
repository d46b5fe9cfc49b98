use std::path::PathBuf;

/// Watch event after filtering and classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A watched script was created or its content changed.
    Modified(PathBuf),
    /// A watched script was deleted or moved away.
    Deleted(PathBuf),
    /// The watched directory itself is gone. Fatal for the session.
    RootRemoved(PathBuf),
    /// The OS watcher reported an error.
    Error(String),
}
