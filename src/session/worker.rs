use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};

use super::Notification;
use crate::classify::{ClassifiedOutput, ClassifiedRun, OutputClassifier, StderrEcho};
use crate::runner::{ProcessRunner, LAUNCH_FAILED};
use crate::target::WatchTarget;
use crate::watcher::event::WatchEvent;
use crate::watcher::{Debouncer, WatcherHandle};

/// How the worker loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum WorkerExit {
    Stopped,
    Fatal(String),
}

/// One execute-then-classify sequence for a target.
#[derive(Clone)]
pub struct RunCycle {
    target: WatchTarget,
    args: Vec<String>,
    runner: Arc<ProcessRunner>,
    classifier: Arc<OutputClassifier>,
}

impl RunCycle {
    pub fn new(
        target: WatchTarget,
        args: Vec<String>,
        runner: Arc<ProcessRunner>,
        classifier: Arc<OutputClassifier>,
    ) -> Self {
        Self {
            target,
            args,
            runner,
            classifier,
        }
    }

    /// Run the cycle on the current thread. Blocks on the child and the explainer.
    pub fn run_blocking(&self, changed: &Path) -> ClassifiedRun {
        let script = self.target.executable_for(changed);
        let result = self.runner.execute(&script, &self.args);
        self.classifier.classify(result)
    }

    /// Run the cycle on the blocking pool. A panic inside the cycle becomes an
    /// unparsed result instead of ending the session.
    pub async fn run(&self, changed: PathBuf) -> ClassifiedRun {
        let cycle = self.clone();
        match tokio::task::spawn_blocking(move || cycle.run_blocking(&changed)).await {
            Ok(run) => run,
            Err(err) => {
                tracing::error!("run cycle failed: {err}");
                ClassifiedRun {
                    exit_code: LAUNCH_FAILED,
                    stdout: String::new(),
                    output: ClassifiedOutput::Unparsed {
                        raw_text: format!("Run cycle failed: {err}"),
                    },
                    stderr: StderrEcho(String::new()),
                }
            }
        }
    }

    fn has_entry(&self) -> bool {
        self.target.has_entry()
    }
}

/// Worker task body: watch, debounce, run, report; then tear down the subscription.
pub(super) async fn run(
    cycle: RunCycle,
    debounce_window: Duration,
    watcher: WatcherHandle,
    mut events: mpsc::Receiver<WatchEvent>,
    shutdown: oneshot::Receiver<()>,
    notifications: mpsc::UnboundedSender<Notification>,
) -> WorkerExit {
    let exit = watch_loop(&cycle, debounce_window, &mut events, shutdown, &notifications).await;

    drop(events);
    watcher.unsubscribe().await;

    if let WorkerExit::Fatal(reason) = &exit {
        tracing::error!("watch session ended: {reason}");
        let _ = notifications.send(Notification::Fatal {
            reason: reason.clone(),
        });
        let _ = notifications.send(Notification::Finished);
    }
    exit
}

async fn watch_loop(
    cycle: &RunCycle,
    debounce_window: Duration,
    events: &mut mpsc::Receiver<WatchEvent>,
    mut shutdown: oneshot::Receiver<()>,
    notifications: &mpsc::UnboundedSender<Notification>,
) -> WorkerExit {
    let mut debouncer = Debouncer::new(debounce_window);

    loop {
        // Shutdown is only observed between cycles, so an in-flight cycle
        // always completes and reports before the worker stops.
        let event = tokio::select! {
            biased;
            _ = &mut shutdown => return WorkerExit::Stopped,
            event = events.recv() => event,
        };

        let changed = match event {
            None => return WorkerExit::Fatal("filesystem subscription closed".to_string()),
            Some(WatchEvent::RootRemoved(root)) => {
                return WorkerExit::Fatal(format!(
                    "watched directory {} was removed",
                    root.display()
                ));
            }
            Some(WatchEvent::Error(message)) => {
                tracing::warn!("watcher reported an error: {message}");
                continue;
            }
            Some(WatchEvent::Deleted(path)) if !cycle.has_entry() => {
                tracing::debug!(path = %path.display(), "script removed, nothing to run");
                continue;
            }
            Some(WatchEvent::Modified(path)) | Some(WatchEvent::Deleted(path)) => path,
        };

        if !debouncer.accept(Instant::now()) {
            tracing::debug!(path = %changed.display(), "change suppressed by debounce");
            continue;
        }

        tracing::info!(path = %changed.display(), "change detected, re-running script");
        let run = cycle.run(changed).await;
        let _ = notifications.send(Notification::Result { run });

        // Changes seen while the cycle was in flight are dropped, not queued.
        let mut dropped = 0usize;
        loop {
            match events.try_recv() {
                Ok(WatchEvent::RootRemoved(root)) => {
                    return WorkerExit::Fatal(format!(
                        "watched directory {} was removed",
                        root.display()
                    ));
                }
                Ok(_) => dropped += 1,
                Err(_) => break,
            }
        }
        if dropped > 0 {
            tracing::debug!(dropped, "discarded changes that arrived during the run");
        }
    }
}
