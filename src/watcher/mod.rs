pub mod debounce;
pub mod event;

use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use tokio::sync::mpsc as tokio_mpsc;
use tokio::task::JoinHandle;

pub use debounce::Debouncer;
use event::WatchEvent;

/// How often the bridge checks for a vanished root or a closed receiver.
const BRIDGE_TICK: Duration = Duration::from_millis(250);

/// Directories never worth re-running a script for.
const ALWAYS_SKIPPED: &[&str] = &[".git"];

/// Which changes qualify for a run. Fixed for the lifetime of a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchPolicy {
    /// Lowercase extensions without the dot.
    pub extensions: Vec<String>,
    pub recursive: bool,
    /// Glob patterns matched against the full path and each component.
    pub exclude: Vec<String>,
    /// Merge window for raw OS notifications.
    pub coalesce: Duration,
}

impl WatchPolicy {
    pub fn matches_extension(&self, path: &Path) -> bool {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        self.extensions.iter().any(|e| *e == ext)
    }
}

impl Default for WatchPolicy {
    fn default() -> Self {
        Self {
            extensions: vec!["py".to_string()],
            recursive: false,
            exclude: Vec::new(),
            coalesce: Duration::from_millis(75),
        }
    }
}

/// Handle to a running watcher. Keeps the debouncer alive (dropping stops watching).
pub struct WatcherHandle {
    root: PathBuf,
    debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    /// The bridge task forwarding events from the std channel to the tokio channel.
    bridge_task: JoinHandle<()>,
}

impl WatcherHandle {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stop the OS watcher and wait for the bridge to exit.
    ///
    /// Teardown failures are logged, never returned: the caller is already stopping.
    pub async fn unsubscribe(self) {
        let Self {
            root,
            mut debouncer,
            bridge_task,
        } = self;

        if let Err(err) = debouncer.watcher().unwatch(&root) {
            tracing::debug!(root = %root.display(), "unwatch failed: {err:?}");
        }
        drop(debouncer);

        if let Err(err) = bridge_task.await {
            tracing::warn!(root = %root.display(), "watcher bridge ended abnormally: {err}");
        }
        tracing::info!(root = %root.display(), "stopped watching");
    }
}

/// Build a Gitignore matcher from the watched directory's .gitignore file.
/// If no .gitignore exists, returns an empty matcher that matches nothing.
fn build_gitignore_matcher(root: &Path) -> Gitignore {
    let mut builder = GitignoreBuilder::new(root);
    let gitignore_path = root.join(".gitignore");
    if gitignore_path.exists() {
        let _ = builder.add(&gitignore_path);
    }
    builder.build().unwrap_or_else(|_| Gitignore::empty())
}

/// Subscribe to changes under `watch_root`.
///
/// Returns a `WatcherHandle` (must be kept alive) and a tokio mpsc receiver
/// that yields classified `WatchEvent`s. `watch_root` must be an existing directory.
pub fn start_watcher(
    watch_root: &Path,
    policy: &WatchPolicy,
) -> anyhow::Result<(WatcherHandle, tokio_mpsc::Receiver<WatchEvent>)> {
    let root = watch_root.canonicalize()?;
    if !root.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }

    let (std_tx, std_rx) = std::sync::mpsc::channel::<DebounceEventResult>();

    let mut debouncer = new_debouncer(policy.coalesce, move |res| {
        let _ = std_tx.send(res);
    })?;
    let mode = if policy.recursive {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };
    debouncer.watcher().watch(&root, mode)?;

    let gitignore = build_gitignore_matcher(&root);

    let (tokio_tx, tokio_rx) = tokio_mpsc::channel::<WatchEvent>(256);

    // Bridge: spawn_blocking to receive from std channel, classify, forward to tokio
    let bridge_root = root.clone();
    let recursive = policy.recursive;
    let policy = policy.clone();
    let bridge_task = tokio::task::spawn_blocking(move || {
        let root = bridge_root;
        loop {
            if tokio_tx.is_closed() {
                return;
            }
            if !root.exists() {
                let _ = tokio_tx.blocking_send(WatchEvent::RootRemoved(root.clone()));
                return;
            }

            let events = match std_rx.recv_timeout(BRIDGE_TICK) {
                Ok(Ok(events)) => events,
                Ok(Err(err)) => {
                    let message = format!("{err:?}");
                    tracing::warn!(root = %root.display(), "watcher error: {message}");
                    if tokio_tx.blocking_send(WatchEvent::Error(message)).is_err() {
                        return;
                    }
                    continue;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return,
            };

            for debounced_event in events {
                if let Some(watch_event) = classify_event(&debounced_event.path, &policy, &gitignore)
                    && tokio_tx.blocking_send(watch_event).is_err()
                {
                    return; // receiver dropped, shutdown
                }
            }
        }
    });

    tracing::info!(
        root = %root.display(),
        recursive,
        "watching for changes"
    );

    Ok((
        WatcherHandle {
            root,
            debouncer,
            bridge_task,
        },
        tokio_rx,
    ))
}

/// Classify a filesystem event path into a WatchEvent, or None if it should be ignored.
///
/// Filtering order:
/// 1. Hardcoded exclusions (`.git`)
/// 2. .gitignore rules of the watched directory
/// 3. `exclude` patterns from the policy
/// 4. Directories
/// 5. Script extension filter
/// 6. File existence check (Modified vs Deleted)
fn classify_event(path: &Path, policy: &WatchPolicy, gitignore: &Gitignore) -> Option<WatchEvent> {
    if path
        .components()
        .any(|c| ALWAYS_SKIPPED.iter().any(|s| c.as_os_str() == *s))
    {
        return None;
    }

    let is_dir = path.is_dir();
    if gitignore.matched(path, is_dir).is_ignore() {
        return None;
    }

    if is_excluded(path, &policy.exclude) {
        return None;
    }

    if is_dir {
        return None;
    }

    if !policy.matches_extension(path) {
        return None;
    }

    // notify-debouncer-mini does not distinguish create from modify, nor
    // remove from rename-away; existence settles it.
    if path.exists() {
        Some(WatchEvent::Modified(path.to_path_buf()))
    } else {
        Some(WatchEvent::Deleted(path.to_path_buf()))
    }
}

/// Returns true if `path` matches any exclusion pattern.
fn is_excluded(path: &Path, patterns: &[String]) -> bool {
    let path_str = path.to_string_lossy();

    for pattern in patterns {
        let Ok(matcher) = glob::Pattern::new(pattern) else {
            continue;
        };
        if matcher.matches(&path_str) {
            return true;
        }
        // Also check if any component matches the pattern directly.
        for component in path.components() {
            if let Some(s) = component.as_os_str().to_str()
                && matcher.matches(s)
            {
                return true;
            }
        }
    }

    false
}
