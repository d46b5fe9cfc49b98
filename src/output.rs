use std::fmt::Write as _;

use crate::classify::{ClassifiedOutput, ClassifiedRun, SUCCESS_MARKER};
use crate::session::Notification;

/// Render a notification as human-readable text.
///
/// A result renders the explanation sections first, then the script's own
/// output and the raw stderr as a secondary stream.
pub fn format_notification(notification: &Notification) -> String {
    match notification {
        Notification::Started { target } => {
            let mut out = format!("Watcher started on {}", target.directory().display());
            if let Some(entry) = target.entry() {
                let _ = write!(out, " (running {})", entry.display());
            }
            out.push('.');
            out
        }
        Notification::Result { run } => format_run(run),
        Notification::Stopped => "Watcher stopped.".to_string(),
        Notification::Fatal { reason } => format!("Watcher stopped unexpectedly: {reason}"),
        Notification::Finished => "Watcher finished.".to_string(),
    }
}

/// Render one classified run.
pub fn format_run(run: &ClassifiedRun) -> String {
    let mut out = String::new();

    match &run.output {
        ClassifiedOutput::Success => out.push_str(SUCCESS_MARKER),
        ClassifiedOutput::Parsed {
            error,
            cause,
            solution,
        } => {
            let _ = writeln!(out, "Error (exit code {}):", run.exit_code);
            let _ = writeln!(out, "{}", indent(error));
            let _ = writeln!(out, "Cause:");
            let _ = writeln!(out, "{}", indent(cause));
            let _ = writeln!(out, "Solution:");
            let _ = write!(out, "{}", indent(solution));
        }
        ClassifiedOutput::Unparsed { raw_text } => {
            let _ = writeln!(out, "Script failed (exit code {}).", run.exit_code);
            let _ = write!(out, "{}", raw_text.trim_end());
        }
    }

    if !run.stdout.trim().is_empty() {
        let _ = write!(out, "\n--- stdout ---\n{}", run.stdout.trim_end());
    }
    if !run.stderr.0.trim().is_empty() {
        let _ = write!(out, "\n--- stderr ---\n{}", run.stderr.0.trim_end());
    }
    out
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Print a notification to stdout.
///
/// - `json = true`: one compact JSON object per line.
/// - `json = false`: the text rendering, followed by a blank line for results.
pub fn print_notification(notification: &Notification, json: bool) {
    if json {
        match serde_json::to_string(notification) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("error serialising notification: {e}"),
        }
        return;
    }

    println!("{}", format_notification(notification));
    if matches!(notification, Notification::Result { .. }) {
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::StderrEcho;
    use crate::target::WatchTarget;

    fn run(output: ClassifiedOutput, stderr: &str) -> ClassifiedRun {
        ClassifiedRun {
            exit_code: if output == ClassifiedOutput::Success { 0 } else { 1 },
            stdout: String::new(),
            output,
            stderr: StderrEcho(stderr.to_string()),
        }
    }

    #[test]
    fn test_success_renders_marker_only() {
        let text = format_run(&run(ClassifiedOutput::Success, ""));
        assert_eq!(text, SUCCESS_MARKER);
    }

    #[test]
    fn test_parsed_renders_three_sections_and_stderr() {
        let text = format_run(&run(
            ClassifiedOutput::Parsed {
                error: "E".to_string(),
                cause: "C".to_string(),
                solution: "line one\nline two".to_string(),
            },
            "Traceback\n",
        ));

        assert!(text.starts_with("Error (exit code 1):\n  E\nCause:\n  C\nSolution:\n"));
        assert!(text.contains("  line one\n  line two"));
        assert!(text.ends_with("--- stderr ---\nTraceback"));
    }

    #[test]
    fn test_unparsed_keeps_raw_text() {
        let text = format_run(&run(
            ClassifiedOutput::Unparsed {
                raw_text: "free-form reply\n".to_string(),
            },
            "",
        ));
        assert_eq!(text, "Script failed (exit code 1).\nfree-form reply");
    }

    #[test]
    fn test_started_mentions_entry() {
        let target = WatchTarget::new("/work", Some("/work/main.py".into()));
        let text = format_notification(&Notification::Started { target });
        assert_eq!(text, "Watcher started on /work (running /work/main.py).");
    }

    #[test]
    fn test_notifications_serialize_with_event_tag() {
        let json = serde_json::to_value(Notification::Result {
            run: run(ClassifiedOutput::Success, ""),
        })
        .unwrap();
        assert_eq!(json["event"], "result");
        assert_eq!(json["run"]["output"]["kind"], "success");
        assert_eq!(json["run"]["stderr"], "");

        let json = serde_json::to_value(Notification::Finished).unwrap();
        assert_eq!(json["event"], "finished");
    }
}
