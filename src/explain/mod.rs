//! Remote explanation of script failures.
//!
//! The prompt asks the model to answer with the three labels that
//! [`crate::classify::parse_reply`] extracts. Both sides read the labels from
//! [`crate::classify::REPLY_LABELS`].

pub mod gemini;

use std::sync::Arc;

use crate::config::ExplainConfig;
use crate::error::ExplainError;

pub use gemini::GeminiClient;

/// Prompt sent for every failing run. `{error}` is replaced with the captured stderr.
pub const PROMPT_TEMPLATE: &str = "I encountered the following error while running my script:\n\
{error}\n\
Figure out what caused the problem and how to fix it. Keep it concise. \
Provide the solution in code format with a comment on every line explaining it.\n\
Answer using exactly this format:\n\
\n\
Error: Explains the error\n\
Cause: Shows why the error occurred\n\
Solution: Shows how to fix the error\n";

/// Fill the prompt template with the captured error stream.
pub fn render_prompt(error_text: &str) -> String {
    PROMPT_TEMPLATE.replace("{error}", error_text.trim_end())
}

/// A single blocking request/response to a text-generation service.
pub trait Explainer: Send + Sync {
    fn explain(&self, error_text: &str) -> Result<String, ExplainError>;
}

/// Explainer used with `--offline`: every failure is reported without an explanation.
#[derive(Debug, Default)]
pub struct OfflineExplainer;

impl Explainer for OfflineExplainer {
    fn explain(&self, _error_text: &str) -> Result<String, ExplainError> {
        Err(ExplainError::Disabled)
    }
}

/// Construct the process-wide explainer from resolved configuration.
///
/// Missing credentials are an error unless `offline` is set.
pub fn build_explainer(
    config: &ExplainConfig,
    offline: bool,
) -> Result<Arc<dyn Explainer>, ExplainError> {
    if offline {
        tracing::info!("explanations disabled");
        return Ok(Arc::new(OfflineExplainer));
    }
    let client = GeminiClient::from_config(config)?;
    tracing::info!(model = %config.model, "explanation client ready");
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::REPLY_LABELS;

    #[test]
    fn test_prompt_names_every_reply_label() {
        for label in REPLY_LABELS {
            assert!(
                PROMPT_TEMPLATE.contains(label),
                "prompt must ask for {label}"
            );
        }
    }

    #[test]
    fn test_render_prompt_embeds_error() {
        let prompt = render_prompt("ZeroDivisionError: division by zero\n");
        assert!(prompt.contains("ZeroDivisionError: division by zero\nFigure out"));
        assert!(!prompt.contains("{error}"));
    }

    #[test]
    fn test_offline_explainer_is_disabled() {
        let err = OfflineExplainer.explain("boom").unwrap_err();
        assert!(matches!(err, ExplainError::Disabled));
    }

    #[test]
    fn test_build_explainer_offline_needs_no_key() {
        let config = ExplainConfig {
            api_key_env: "SCRIPT_WATCH_TEST_UNSET_KEY_1b7e".to_string(),
            ..Default::default()
        };
        assert!(build_explainer(&config, true).is_ok());
    }
}
