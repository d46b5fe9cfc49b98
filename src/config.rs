use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::runner::ProcessRunner;
use crate::session::SessionConfig;
use crate::watcher::WatchPolicy;

/// Config file looked up in the watched directory.
pub const CONFIG_FILE: &str = "script-watch.toml";

/// Configuration loaded from `script-watch.toml` in the watched directory.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScriptWatchConfig {
    /// Program that runs the script. Empty runs the script directly.
    pub interpreter: String,
    /// Script-source extensions that trigger a run (without the dot).
    pub extensions: Vec<String>,
    /// Minimum time between accepted triggers.
    pub debounce_ms: u64,
    /// Window used to merge raw OS notifications before debouncing.
    pub coalesce_ms: u64,
    pub recursive: bool,
    /// Extra glob patterns to ignore, matched against the path and its components.
    pub exclude: Vec<String>,
    /// Arguments passed to the script on every run.
    pub args: Vec<String>,
    pub explain: ExplainConfig,
}

/// Remote explanation settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExplainConfig {
    pub model: String,
    pub endpoint: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for ScriptWatchConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            extensions: vec!["py".to_string()],
            debounce_ms: 3000,
            coalesce_ms: 75,
            recursive: false,
            exclude: vec![
                "__pycache__".to_string(),
                ".venv".to_string(),
                "venv".to_string(),
            ],
            args: Vec::new(),
            explain: ExplainConfig::default(),
        }
    }
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash-lite".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub interpreter: Option<String>,
    pub extensions: Vec<String>,
    pub debounce_ms: Option<u64>,
    pub recursive: bool,
    pub model: Option<String>,
    pub args: Vec<String>,
}

impl ScriptWatchConfig {
    /// Load configuration from `script-watch.toml` in the given directory.
    ///
    /// Returns the defaults if the file does not exist or cannot be parsed.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!("failed to parse {CONFIG_FILE}: {err}. Using defaults.");
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!("failed to read {CONFIG_FILE}: {err}. Using defaults.");
                Self::default()
            }
        }
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(interpreter) = overrides.interpreter {
            self.interpreter = interpreter;
        }
        if !overrides.extensions.is_empty() {
            self.extensions = overrides.extensions;
        }
        if let Some(ms) = overrides.debounce_ms {
            self.debounce_ms = ms;
        }
        if overrides.recursive {
            self.recursive = true;
        }
        if let Some(model) = overrides.model {
            self.explain.model = model;
        }
        if !overrides.args.is_empty() {
            self.args = overrides.args;
        }
        self
    }

    pub fn runner(&self) -> ProcessRunner {
        ProcessRunner::new(Some(self.interpreter.clone()))
    }

    pub fn watch_policy(&self) -> WatchPolicy {
        WatchPolicy {
            extensions: self
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            recursive: self.recursive,
            exclude: self.exclude.clone(),
            coalesce: Duration::from_millis(self.coalesce_ms),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            policy: self.watch_policy(),
            debounce_window: Duration::from_millis(self.debounce_ms),
            args: self.args.clone(),
        }
    }
}
