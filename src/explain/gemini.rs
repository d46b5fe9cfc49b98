//! Gemini `generateContent` client.
//!
//! One blocking request per failing run, no retry.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{render_prompt, Explainer};
use crate::config::ExplainConfig;
use crate::error::ExplainError;

/// Fallback variable consulted when the configured one is unset.
const FALLBACK_KEY_ENV: &str = "GEMINI_API_KEY";

pub struct GeminiClient {
    agent: ureq::Agent,
    url: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<TextPart<'a>>,
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl GeminiClient {
    /// Resolve the API key from the process environment.
    pub fn from_config(config: &ExplainConfig) -> Result<Self, ExplainError> {
        Self::with_key_lookup(config, |name| std::env::var(name).ok())
    }

    /// Resolve the API key through `lookup` (called with variable names).
    pub fn with_key_lookup(
        config: &ExplainConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ExplainError> {
        let mut names = vec![config.api_key_env.as_str()];
        if config.api_key_env != FALLBACK_KEY_ENV {
            names.push(FALLBACK_KEY_ENV);
        }

        let api_key = names
            .iter()
            .find_map(|name| lookup(name).filter(|value| !value.trim().is_empty()))
            .ok_or_else(|| ExplainError::MissingCredentials(names.join(" or ")))?;

        // Error statuses are read like any other response so the service's
        // message reaches the user.
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            agent,
            url: generate_url(&config.endpoint, &config.model),
            api_key,
        })
    }
}

impl Explainer for GeminiClient {
    fn explain(&self, error_text: &str) -> Result<String, ExplainError> {
        let prompt = render_prompt(error_text);
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![TextPart { text: &prompt }],
            }],
        };

        tracing::info!(url = %self.url, "requesting explanation");
        let mut response = self
            .agent
            .post(self.url.as_str())
            .header("x-goog-api-key", self.api_key.as_str())
            .send_json(&body)
            .map_err(|err| match err {
                ureq::Error::StatusCode(status) => ExplainError::Http {
                    status,
                    message: "no details".to_string(),
                },
                other => ExplainError::Transport(other.to_string()),
            })?;

        let status = response.status().as_u16();
        if status >= 400 {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let parsed: GenerateResponse = response
            .body_mut()
            .read_json()
            .map_err(|err| ExplainError::Decode(err.to_string()))?;

        extract_text(parsed)
    }
}

fn generate_url(endpoint: &str, model: &str) -> String {
    format!(
        "{}/models/{}:generateContent",
        endpoint.trim_end_matches('/'),
        model
    )
}

/// Build the error for a non-success status, using the service's own message when
/// the body carries one.
fn status_error(status: u16, body: &str) -> ExplainError {
    let message = serde_json::from_str::<GenerateResponse>(body)
        .ok()
        .and_then(|response| response.error)
        .map(|error| error.message)
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| "no details".to_string());
    ExplainError::Http { status, message }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: GenerateResponse) -> Result<String, ExplainError> {
    if let Some(error) = response.error {
        return Err(ExplainError::EmptyReply(error.message));
    }

    let candidate = response
        .candidates
        .and_then(|c| c.into_iter().next())
        .ok_or_else(|| ExplainError::EmptyReply("no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .collect();

    if text.trim().is_empty() {
        let reason = candidate
            .finish_reason
            .unwrap_or_else(|| "empty candidate".to_string());
        return Err(ExplainError::EmptyReply(reason));
    }
    Ok(text)
}
