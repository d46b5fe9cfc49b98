//! Terminal presentation surface: turns user input into session intents and
//! renders notifications. Never blocks on a run cycle; all waiting happens in
//! the session worker.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

use script_watch::classify::OutputClassifier;
use script_watch::config::ScriptWatchConfig;
use script_watch::explain::{Explainer, build_explainer};
use script_watch::output::print_notification;
use script_watch::session::{Notification, RunCycle, WatchSession};
use script_watch::target::WatchTarget;

use crate::cli::RunOptions;

const HELP: &str = "\
Commands:
  select <path>   choose a directory, or a script to run on every change
  start           start watching the selection
  stop            stop watching
  toggle          start if stopped, stop if running
  status          show the selection and session state
  help            show this help
  quit            stop watching and exit";

/// A user intent typed at the interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Select(PathBuf),
    Start,
    Stop,
    Toggle,
    Status,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_intent(line: &str) -> Result<Option<Intent>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    let intent = match command.to_ascii_lowercase().as_str() {
        "select" | "open" => {
            if rest.is_empty() {
                return Err("usage: select <path>".to_string());
            }
            Intent::Select(PathBuf::from(rest))
        }
        "start" => Intent::Start,
        "stop" => Intent::Stop,
        "toggle" => Intent::Toggle,
        "status" => Intent::Status,
        "help" | "?" => Intent::Help,
        "quit" | "exit" | "q" => Intent::Quit,
        other => return Err(format!("unknown command '{other}' (type 'help')")),
    };
    Ok(Some(intent))
}

fn load_config(dir: &Path, options: &RunOptions) -> ScriptWatchConfig {
    ScriptWatchConfig::load(dir).with_overrides(options.overrides())
}

fn explainer(config: &ScriptWatchConfig, options: &RunOptions) -> Result<Arc<dyn Explainer>> {
    build_explainer(&config.explain, options.offline)
        .context("explanation service unavailable (use --offline to run without it)")
}

fn new_session(
    config: &ScriptWatchConfig,
    explainer: Arc<dyn Explainer>,
) -> (WatchSession, UnboundedReceiver<Notification>) {
    WatchSession::new(
        config.session_config(),
        Arc::new(config.runner()),
        Arc::new(OutputClassifier::new(explainer)),
    )
}

/// `script-watch watch`: start immediately, stop on Ctrl-C.
pub async fn watch(path: PathBuf, entry: Option<PathBuf>, options: RunOptions) -> Result<()> {
    let target = match entry {
        Some(entry) => WatchTarget::new(path, Some(entry)),
        None => WatchTarget::from_selection(&path),
    };
    let config = load_config(target.directory(), &options);
    let explainer = explainer(&config, &options)?;
    let (mut session, mut rx) = new_session(&config, explainer);

    session.start(target)?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stopping = false;
    let mut fatal = None;

    loop {
        tokio::select! {
            signal = &mut ctrl_c, if !stopping => {
                stopping = true;
                if let Err(err) = signal {
                    tracing::warn!("failed to listen for Ctrl-C: {err}");
                }
                if let Err(err) = session.stop().await {
                    tracing::debug!("stop on Ctrl-C: {err}");
                }
            }
            notification = rx.recv() => {
                let Some(notification) = notification else { break };
                print_notification(&notification, options.json);
                match notification {
                    Notification::Fatal { reason } => fatal = Some(reason),
                    Notification::Finished => break,
                    _ => {}
                }
            }
        }
    }

    match fatal {
        Some(reason) => bail!(reason),
        None => Ok(()),
    }
}

/// `script-watch run`: a single run cycle without a watcher.
pub async fn run_once(script: PathBuf, options: RunOptions) -> Result<()> {
    if !script.is_file() {
        bail!("Error: {} not found.", script.display());
    }
    let target = WatchTarget::from_selection(&script);
    let config = load_config(target.directory(), &options);
    let explainer = explainer(&config, &options)?;

    let cycle = RunCycle::new(
        target,
        config.args.clone(),
        Arc::new(config.runner()),
        Arc::new(OutputClassifier::new(explainer)),
    );
    let run = cycle.run(script).await;
    print_notification(&Notification::Result { run }, options.json);
    Ok(())
}

/// `script-watch interactive`: a line-driven stand-in for the start/stop window.
///
/// Watch settings follow the selected directory's `script-watch.toml`; the
/// explanation client is built once from the initial directory's settings.
pub async fn interactive(initial: Option<PathBuf>, options: RunOptions) -> Result<()> {
    let mut selected = initial.as_deref().map(WatchTarget::from_selection);
    let config_dir = selected
        .as_ref()
        .map(|t| t.directory().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let config = load_config(&config_dir, &options);
    let explainer = explainer(&config, &options)?;
    let (mut session, mut rx) = new_session(&config, Arc::clone(&explainer));

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read from stdin")? else { break };
                let intent = match parse_intent(&line) {
                    Ok(Some(intent)) => intent,
                    Ok(None) => continue,
                    Err(message) => {
                        println!("{message}");
                        continue;
                    }
                };
                match intent {
                    Intent::Select(path) => {
                        if session.is_running() {
                            println!("Stop the watcher before selecting another target.");
                        } else {
                            let target = WatchTarget::from_selection(&path);
                            while let Ok(notification) = rx.try_recv() {
                                print_notification(&notification, options.json);
                            }
                            let config = load_config(target.directory(), &options);
                            (session, rx) = new_session(&config, Arc::clone(&explainer));
                            println!("Selected: {}", describe(&target));
                            selected = Some(target);
                        }
                    }
                    Intent::Start => start(&mut session, selected.as_ref()),
                    Intent::Stop => {
                        if let Err(err) = session.stop().await {
                            println!("{err}");
                        }
                    }
                    Intent::Toggle => {
                        if session.is_running() {
                            if let Err(err) = session.stop().await {
                                println!("{err}");
                            }
                        } else {
                            start(&mut session, selected.as_ref());
                        }
                    }
                    Intent::Status => {
                        let selection = selected
                            .as_ref()
                            .map(describe)
                            .unwrap_or_else(|| "nothing".to_string());
                        println!("Selected: {selection}; session: {:?}", session.state());
                    }
                    Intent::Help => println!("{HELP}"),
                    Intent::Quit => break,
                }
            }
            Some(notification) = rx.recv() => print_notification(&notification, options.json),
        }
    }

    if session.is_running() {
        let _ = session.stop().await;
    }
    while let Ok(notification) = rx.try_recv() {
        print_notification(&notification, options.json);
    }
    Ok(())
}

fn start(session: &mut WatchSession, selected: Option<&WatchTarget>) {
    let Some(target) = selected else {
        println!("Please select a directory or script first.");
        return;
    };
    if let Err(err) = session.start(target.clone()) {
        println!("{err}");
    }
}

fn describe(target: &WatchTarget) -> String {
    match target.entry() {
        Some(entry) => format!("{} (entry {})", target.directory().display(), entry.display()),
        None => target.directory().display().to_string(),
    }
}
