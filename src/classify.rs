use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;

use crate::explain::Explainer;
use crate::runner::RunResult;

pub const ERROR_LABEL: &str = "Error:";
pub const CAUSE_LABEL: &str = "Cause:";
pub const SOLUTION_LABEL: &str = "Solution:";

/// Labels the explanation prompt asks for, in reply order.
pub const REPLY_LABELS: [&str; 3] = [ERROR_LABEL, CAUSE_LABEL, SOLUTION_LABEL];

/// Marker shown for a run that exited with status 0.
pub const SUCCESS_MARKER: &str = "Script executed successfully.";

/// `Error: <e> Cause: <c> Solution: <s>`, first two sections lazy, last greedy, across lines.
static REPLY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Error:\s*(.+?)\s*Cause:\s*(.+?)\s*Solution:\s*(.+)")
        .expect("reply pattern is valid")
});

/// A markdown code fence wrapping the whole solution. A language tag is only
/// recognised when a newline follows it; a one-line fence is all body.
static FENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A```(?:[^\n`]*\n)?(.*?)\n?```\s*\z").expect("fence pattern is valid")
});

/// What a run cycle produced, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifiedOutput {
    Success,
    Parsed {
        error: String,
        cause: String,
        solution: String,
    },
    /// The reply did not follow the template, or no reply could be obtained.
    Unparsed { raw_text: String },
}

/// The unmodified stderr of the run, shown next to any classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StderrEcho(pub String);

/// A classified run plus the raw streams that accompany it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedRun {
    pub exit_code: i32,
    pub stdout: String,
    pub output: ClassifiedOutput,
    pub stderr: StderrEcho,
}

/// Decides success vs failure and explains failures through an [`Explainer`].
pub struct OutputClassifier {
    explainer: Arc<dyn Explainer>,
}

impl OutputClassifier {
    pub fn new(explainer: Arc<dyn Explainer>) -> Self {
        Self { explainer }
    }

    /// Classify one run. Blocks on the explainer for failing runs; never panics.
    pub fn classify(&self, result: RunResult) -> ClassifiedRun {
        let RunResult {
            exit_code,
            stdout,
            stderr,
        } = result;

        let output = if exit_code == 0 {
            ClassifiedOutput::Success
        } else {
            tracing::info!(exit_code, "script failed, asking for an explanation");
            match self.explainer.explain(&stderr) {
                Ok(reply) => parse_reply(&reply),
                Err(err) => {
                    tracing::warn!(error = %err, "explanation unavailable");
                    ClassifiedOutput::Unparsed {
                        raw_text: format!("Explanation unavailable: {err}"),
                    }
                }
            }
        };

        ClassifiedRun {
            exit_code,
            stdout,
            output,
            stderr: StderrEcho(stderr),
        }
    }
}

/// Extract `{error, cause, solution}` from a reply, or keep the reply verbatim.
pub fn parse_reply(reply: &str) -> ClassifiedOutput {
    let Some(caps) = REPLY_PATTERN.captures(reply) else {
        return ClassifiedOutput::Unparsed {
            raw_text: reply.to_string(),
        };
    };

    ClassifiedOutput::Parsed {
        error: caps[1].trim().to_string(),
        cause: caps[2].trim().to_string(),
        solution: strip_code_fence(caps[3].trim()).trim().to_string(),
    }
}

/// Remove a surrounding ```` ```lang ```` ... ```` ``` ```` fence, if present.
pub fn strip_code_fence(text: &str) -> &str {
    match FENCE_PATTERN.captures(text).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str(),
        None => text,
    }
}
