//! Model-generated rewrites for flagged cells
//!
//! An issue is turned into a [`SuggestionRequest`], rendered as a prompt and
//! sent through a [`SuggestionClient`]. The bundled client talks to an Ollama
//! compatible server (`api/generate`, `api/pull`) and is compiled with the
//! `ai` feature.

use crate::issue::Issue;
use crate::notebook::Cell;
use crate::orchestrator::ScanConfig;
use serde_json::Value;

/// What the model is told about one issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionRequest {
    pub cell_content: String,
    pub issue_id: String,
    pub issue_description: String,
}

impl SuggestionRequest {
    pub fn from_issue(cell: &Cell, issue: &Issue) -> Self {
        Self {
            cell_content: cell.source.clone(),
            issue_id: issue.rule_id().to_string(),
            issue_description: issue.description(),
        }
    }

    pub fn format_prompt(&self) -> String {
        format!(
            "The following represents a jupyter notebook cell and an accessibility issue found in it.\n\n\
             Content: \n{}\n\n\
             Issue: {}\n\n\
             Description: {}\n\n\
             Respond in JSON format with the following fields:\n\
             \x20   - exampleCellContent: A suggested fix for the cell, without any explanation.\n\
             \x20   - explanation: An explanation of the issue and the suggested fix.\n",
            self.cell_content, self.issue_id, self.issue_description
        )
    }
}

/// A proposed replacement for a cell's source. Both fields may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Suggestion {
    pub replacement: String,
    pub explanation: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SuggestionError {
    #[error("Could not reach the model server: {0}")]
    Transport(String),

    #[error("Model server answered with HTTP {0}")]
    Status(u16),

    #[error("Model answer is not the expected JSON: {0}")]
    MalformedResponse(String),
}

pub trait SuggestionClient {
    fn suggest(&mut self, request: &SuggestionRequest, scan: ScanConfig) -> Result<Suggestion, SuggestionError>;
}

/// Parse the text the model generated. Missing fields read as empty; text
/// that is not a JSON object is an error.
pub fn parse_model_answer(text: &str) -> Result<Suggestion, SuggestionError> {
    let body = strip_code_fence(text.trim());
    let value: Value = serde_json::from_str(body).map_err(|e| SuggestionError::MalformedResponse(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(SuggestionError::MalformedResponse("expected a JSON object".to_string()));
    };

    let field = |name: &str| fields.get(name).and_then(Value::as_str).unwrap_or_default().to_string();
    Ok(Suggestion {
        replacement: field("exampleCellContent"),
        explanation: field("explanation"),
    })
}

/// Models like to wrap JSON in a ```json fence
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(feature = "ai")]
pub use ollama::OllamaClient;

#[cfg(feature = "ai")]
mod ollama {
    use super::{Suggestion, SuggestionClient, SuggestionError, SuggestionRequest, parse_model_answer};
    use crate::config::SuggestionConfig;
    use crate::orchestrator::ScanConfig;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Serialize)]
    struct GenerateRequest<'a> {
        model: &'a str,
        prompt: &'a str,
        stream: bool,
    }

    #[derive(Deserialize)]
    struct GenerateResponse {
        response: String,
    }

    #[derive(Serialize)]
    struct PullRequest<'a> {
        name: &'a str,
        stream: bool,
    }

    pub struct OllamaClient {
        agent: ureq::Agent,
        endpoint: String,
        model: String,
        pulled: bool,
    }

    impl OllamaClient {
        pub fn new(config: &SuggestionConfig) -> Self {
            let agent: ureq::Agent = ureq::Agent::config_builder()
                .timeout_global(Some(Duration::from_secs(300)))
                .build()
                .into();
            let mut endpoint = config.endpoint.clone();
            if !endpoint.ends_with('/') {
                endpoint.push('/');
            }
            Self {
                agent,
                endpoint,
                model: config.model.clone(),
                pulled: false,
            }
        }

        fn pull_model(&mut self) -> Result<(), SuggestionError> {
            log::info!("Pulling model {} from {}", self.model, self.endpoint);
            self.agent
                .post(format!("{}api/pull", self.endpoint))
                .send_json(&PullRequest {
                    name: &self.model,
                    stream: false,
                })
                .map_err(transport_error)?;
            self.pulled = true;
            Ok(())
        }
    }

    impl SuggestionClient for OllamaClient {
        fn suggest(&mut self, request: &SuggestionRequest, scan: ScanConfig) -> Result<Suggestion, SuggestionError> {
            if !scan.model_already_warmed && !self.pulled {
                self.pull_model()?;
            }

            let prompt = request.format_prompt();
            log::debug!("Requesting suggestion for {} from {}", request.issue_id, self.endpoint);

            let mut response = self
                .agent
                .post(format!("{}api/generate", self.endpoint))
                .send_json(&GenerateRequest {
                    model: &self.model,
                    prompt: &prompt,
                    stream: false,
                })
                .map_err(transport_error)?;

            let body: GenerateResponse = response
                .body_mut()
                .read_json()
                .map_err(|e| SuggestionError::MalformedResponse(e.to_string()))?;

            parse_model_answer(&body.response)
        }
    }

    fn transport_error(err: ureq::Error) -> SuggestionError {
        match err {
            ureq::Error::StatusCode(code) => SuggestionError::Status(code),
            other => SuggestionError::Transport(other.to_string()),
        }
    }
}
