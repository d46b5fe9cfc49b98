//! Watch session lifecycle.
//!
//! A `WatchSession` is owned by the presentation surface. It runs at most one
//! worker task at a time; the worker owns the filesystem subscription, the
//! debounce state and the run cycles. The only traffic between the two is
//! start/stop calls in one direction and `Notification` values in the other.

mod worker;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::classify::{ClassifiedRun, OutputClassifier};
use crate::error::SessionError;
use crate::runner::ProcessRunner;
use crate::target::WatchTarget;
use crate::watcher::{self, WatchPolicy};

pub use worker::RunCycle;
use worker::WorkerExit;

/// Settings fixed for the lifetime of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub policy: WatchPolicy,
    pub debounce_window: Duration,
    /// Arguments passed to the script on every run.
    pub args: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            policy: WatchPolicy::default(),
            debounce_window: Duration::from_secs(3),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Stopping,
}

/// Messages from the session to the presentation surface, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    Started { target: WatchTarget },
    /// One completed run cycle.
    Result { run: ClassifiedRun },
    /// The user asked the session to stop and it has.
    Stopped,
    /// The session ended on its own (watched directory gone, subscription lost).
    Fatal { reason: String },
    /// The worker has exited; always the last notification of a session.
    Finished,
}

struct Worker {
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<WorkerExit>,
}

pub struct WatchSession {
    config: SessionConfig,
    runner: Arc<ProcessRunner>,
    classifier: Arc<OutputClassifier>,
    notifications: mpsc::UnboundedSender<Notification>,
    state: SessionState,
    worker: Option<Worker>,
}

impl WatchSession {
    /// Create an idle session and the receiving end of its notification channel.
    pub fn new(
        config: SessionConfig,
        runner: Arc<ProcessRunner>,
        classifier: Arc<OutputClassifier>,
    ) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            config,
            runner,
            classifier,
            notifications: tx,
            state: SessionState::Idle,
            worker: None,
        };
        (session, rx)
    }

    /// Current state. A worker that exited on its own counts as Idle.
    pub fn state(&self) -> SessionState {
        match &self.worker {
            Some(worker) if worker.join.is_finished() => SessionState::Idle,
            _ => self.state,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// Begin watching `target`. Must be called from within a tokio runtime.
    pub fn start(&mut self, target: WatchTarget) -> Result<(), SessionError> {
        self.reap();
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyRunning);
        }
        target.validate()?;

        let (handle, events) = watcher::start_watcher(target.directory(), &self.config.policy)
            .map_err(|err| SessionError::Subscribe {
                path: target.directory().to_path_buf(),
                message: err.to_string(),
            })?;

        let cycle = RunCycle::new(
            target.clone(),
            self.config.args.clone(),
            Arc::clone(&self.runner),
            Arc::clone(&self.classifier),
        );
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join = tokio::spawn(worker::run(
            cycle,
            self.config.debounce_window,
            handle,
            events,
            shutdown_rx,
            self.notifications.clone(),
        ));

        self.worker = Some(Worker {
            shutdown: shutdown_tx,
            join,
        });
        self.state = SessionState::Running;
        tracing::info!(target = %target.directory().display(), "session started");
        self.emit(Notification::Started { target });
        Ok(())
    }

    /// Stop watching. Waits for an in-flight run cycle to finish and report first.
    pub async fn stop(&mut self) -> Result<(), SessionError> {
        self.reap();
        let Some(worker) = self.worker.take() else {
            return Err(SessionError::NotRunning);
        };

        self.state = SessionState::Stopping;
        let _ = worker.shutdown.send(());

        let exit = match worker.join.await {
            Ok(exit) => exit,
            Err(err) => {
                tracing::warn!("watch worker ended abnormally: {err}");
                WorkerExit::Stopped
            }
        };
        self.state = SessionState::Idle;

        // A worker that hit a fatal condition has already reported it.
        if exit == WorkerExit::Stopped {
            tracing::info!("session stopped");
            self.emit(Notification::Stopped);
            self.emit(Notification::Finished);
        }
        Ok(())
    }

    /// Forget a worker that exited on its own.
    fn reap(&mut self) {
        if self
            .worker
            .as_ref()
            .is_some_and(|worker| worker.join.is_finished())
        {
            self.worker = None;
            self.state = SessionState::Idle;
        }
    }

    fn emit(&self, notification: Notification) {
        let _ = self.notifications.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassifiedOutput;
    use crate::error::ExplainError;
    use crate::explain::Explainer;
    use std::fs;
    use std::path::Path;

    struct Template;

    impl Explainer for Template {
        fn explain(&self, _error_text: &str) -> Result<String, ExplainError> {
            Ok("Error: E\nCause: C\nSolution: S".to_string())
        }
    }

    fn session() -> (WatchSession, mpsc::UnboundedReceiver<Notification>) {
        let config = SessionConfig {
            policy: WatchPolicy {
                extensions: vec!["sh".to_string()],
                ..WatchPolicy::default()
            },
            debounce_window: Duration::from_millis(200),
            args: Vec::new(),
        };
        WatchSession::new(
            config,
            Arc::new(ProcessRunner::new(Some("sh".to_string()))),
            Arc::new(OutputClassifier::new(Arc::new(Template))),
        )
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Notification {
        tokio::time::timeout(Duration::from_secs(15), rx.recv())
            .await
            .expect("notification in time")
            .expect("channel open")
    }

    fn target(dir: &Path) -> WatchTarget {
        WatchTarget::new(dir, None)
    }

    #[tokio::test]
    async fn test_start_twice_reports_already_running() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, mut rx) = session();

        session.start(target(dir.path())).unwrap();
        assert_eq!(
            session.start(target(dir.path())),
            Err(SessionError::AlreadyRunning)
        );
        assert_eq!(session.state(), SessionState::Running);
        assert!(matches!(next(&mut rx).await, Notification::Started { .. }));

        session.stop().await.unwrap();
        assert_eq!(next(&mut rx).await, Notification::Stopped);
        assert_eq!(next(&mut rx).await, Notification::Finished);
        assert!(rx.try_recv().is_err(), "exactly one session was started");
    }

    #[tokio::test]
    async fn test_stop_when_idle_reports_not_running() {
        let (mut session, mut rx) = session();
        assert_eq!(session.stop().await, Err(SessionError::NotRunning));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(rx.try_recv().is_err(), "no teardown notifications");
    }

    #[tokio::test]
    async fn test_start_rejects_missing_target() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let (mut session, _rx) = session();

        assert_eq!(
            session.start(target(&missing)),
            Err(SessionError::TargetMissing(missing))
        );
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_can_restart_after_stop() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, _rx) = session();

        session.start(target(dir.path())).unwrap();
        session.stop().await.unwrap();
        session.start(target(dir.path())).unwrap();
        assert!(session.is_running());
        session.stop().await.unwrap();
        assert_eq!(session.stop().await, Err(SessionError::NotRunning));
    }

    #[tokio::test]
    async fn test_modified_script_produces_parsed_result() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("crash.sh");
        let (mut session, mut rx) = session();

        session.start(target(dir.path())).unwrap();
        assert!(matches!(next(&mut rx).await, Notification::Started { .. }));

        fs::write(
            &script,
            "echo 'ZeroDivisionError: division by zero' >&2\nexit 1\n",
        )
        .unwrap();

        match next(&mut rx).await {
            Notification::Result { run } => {
                assert_eq!(run.exit_code, 1);
                assert_eq!(
                    run.output,
                    ClassifiedOutput::Parsed {
                        error: "E".to_string(),
                        cause: "C".to_string(),
                        solution: "S".to_string(),
                    }
                );
                assert_eq!(run.stderr.0, "ZeroDivisionError: division by zero\n");
            }
            other => panic!("expected a result, got {other:?}"),
        }

        session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_removed_directory_is_fatal() {
        let parent = tempfile::tempdir().unwrap();
        let watched = parent.path().join("project");
        fs::create_dir(&watched).unwrap();
        let (mut session, mut rx) = session();

        session.start(target(&watched)).unwrap();
        assert!(matches!(next(&mut rx).await, Notification::Started { .. }));

        fs::remove_dir_all(&watched).unwrap();

        assert!(matches!(next(&mut rx).await, Notification::Fatal { .. }));
        assert_eq!(next(&mut rx).await, Notification::Finished);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.stop().await, Err(SessionError::NotRunning));
    }
}
