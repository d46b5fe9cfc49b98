use std::path::PathBuf;

use thiserror::Error;

/// Conditions reported back to the presentation surface by `WatchSession`.
///
/// None of these are fatal to the process; the caller prints them and carries on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Watcher is already running.")]
    AlreadyRunning,

    #[error("Watcher is not running.")]
    NotRunning,

    #[error("Error: {} not found.", .0.display())]
    TargetMissing(PathBuf),

    #[error("Error: {} is not a directory.", .0.display())]
    NotADirectory(PathBuf),

    /// The filesystem subscription could not be established.
    #[error("failed to watch {}: {message}", path.display())]
    Subscribe { path: PathBuf, message: String },
}

/// Failures of the remote explanation call.
#[derive(Debug, Error)]
pub enum ExplainError {
    #[error("no API key found (set {0})")]
    MissingCredentials(String),

    #[error("explanations are disabled (--offline)")]
    Disabled,

    #[error("explanation service returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request to explanation service failed: {0}")]
    Transport(String),

    #[error("explanation service returned no text: {0}")]
    EmptyReply(String),

    #[error("could not decode explanation response: {0}")]
    Decode(String),
}
