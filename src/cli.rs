use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use script_watch::config::Overrides;

/// Re-run a script whenever its sources change and explain failures.
///
/// script-watch watches a directory, executes the script after every save,
/// and when the script fails asks a language model what went wrong.
#[derive(Parser, Debug)]
#[command(
    name = "script-watch",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    /// Log debug detail (debounce decisions, child process lifecycle) to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that runs scripts.
#[derive(Args, Debug, Clone, Default)]
pub struct RunOptions {
    /// Interpreter used to run the script (default from script-watch.toml, else python3).
    /// Pass an empty string to execute the script directly.
    #[arg(long)]
    pub interpreter: Option<String>,

    /// Script extensions that trigger a run (comma-separated, e.g. "py,pyw").
    #[arg(long = "ext", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Minimum milliseconds between two runs.
    #[arg(long)]
    pub debounce_ms: Option<u64>,

    /// Watch subdirectories too.
    #[arg(short, long)]
    pub recursive: bool,

    /// Model used for explanations.
    #[arg(long)]
    pub model: Option<String>,

    /// Do not contact the explanation service; failures are shown without an explanation.
    #[arg(long)]
    pub offline: bool,

    /// Print one JSON object per event instead of text.
    #[arg(long)]
    pub json: bool,

    /// Arguments passed to the script.
    #[arg(last = true)]
    pub script_args: Vec<String>,
}

impl RunOptions {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            interpreter: self.interpreter.clone(),
            extensions: self.extensions.clone(),
            debounce_ms: self.debounce_ms,
            recursive: self.recursive,
            model: self.model.clone(),
            args: self.script_args.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch a directory (or a script's directory) and re-run on every change.
    ///
    /// Press Ctrl-C to stop.
    Watch {
        /// Directory to watch, or a script whose directory is watched and which runs on every change.
        path: PathBuf,

        /// Script to run on every change instead of the changed file.
        #[arg(long)]
        entry: Option<PathBuf>,

        #[command(flatten)]
        options: RunOptions,
    },

    /// Drive a watch session with typed commands: select, start, stop, status, quit.
    Interactive {
        /// Initial selection.
        path: Option<PathBuf>,

        #[command(flatten)]
        options: RunOptions,
    },

    /// Run a script once and explain a failure, without watching.
    Run {
        /// Script to run.
        script: PathBuf,

        #[command(flatten)]
        options: RunOptions,
    },
}
