//! Optional diagram enhancement through a local Ollama model.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 500;

#[derive(Debug, thiserror::Error)]
pub enum EnhanceError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("enhancement request timed out")]
    Timeout,
    #[error("enhancement request failed: {0}")]
    Request(String),
    #[error("model server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model returned an empty diagram")]
    Empty,
}

/// A text completion backend.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, EnhanceError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    /// # Errors
    ///
    /// [`EnhanceError::Client`] if the HTTP client cannot be built.
    pub fn new(base_url: Option<&str>, model: Option<&str>) -> Result<Self, EnhanceError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EnhanceError::Client(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or(DEFAULT_OLLAMA_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
        })
    }

    /// Endpoint and model from `OLLAMA_URL` / `OLLAMA_MODEL`, overridden by
    /// explicit values.
    ///
    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn from_env(base_url: Option<&str>, model: Option<&str>) -> Result<Self, EnhanceError> {
        let env_url = std::env::var("OLLAMA_URL").ok();
        let env_model = std::env::var("OLLAMA_MODEL").ok();
        Self::new(
            base_url.or(env_url.as_deref()),
            model.or(env_model.as_deref()),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Completion for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, EnhanceError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: TEMPERATURE,
                num_predict: MAX_TOKENS,
            },
        };
        tracing::info!(model = %self.model, url = %self.base_url, "requesting enhancement");

        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EnhanceError::Timeout
                } else {
                    EnhanceError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EnhanceError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| EnhanceError::Request(e.to_string()))?;
        tracing::debug!(chars = reply.response.len(), "enhancement received");
        Ok(reply.response)
    }
}

pub fn enhancement_prompt(source: &str) -> String {
    format!(
        "You are a Mermaid diagram expert. Please improve and enhance the following \
         Mermaid diagram syntax:\n\n{source}\n\nMake the diagram more professional, add \
         better styling, improve node names, add colors if appropriate, and ensure best \
         practices. Return ONLY the enhanced Mermaid syntax without any explanations or \
         markdown formatting."
    )
}

/// Strip markdown fences and a leading `mermaid` language tag from a reply.
pub fn clean_completion(reply: &str) -> String {
    let mut lines: Vec<&str> = reply.trim().lines().collect();
    if lines.first().is_some_and(|l| l.trim_start().starts_with("```")) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| l.trim() == "```") {
        lines.pop();
    }
    if lines.first().is_some_and(|l| l.trim() == "mermaid") {
        lines.remove(0);
    }
    lines.join("\n").trim().to_string()
}

/// Ask `completion` for an improved version of `source`.
///
/// The reply is not validated; callers decide whether to keep it.
///
/// # Errors
///
/// Backend failures, or [`EnhanceError::Empty`] when nothing usable came
/// back.
pub async fn enhance_diagram(
    completion: &dyn Completion,
    source: &str,
) -> Result<String, EnhanceError> {
    let reply = completion.complete(&enhancement_prompt(source)).await?;
    let cleaned = clean_completion(&reply);
    if cleaned.is_empty() {
        return Err(EnhanceError::Empty);
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(&'static str);

    #[async_trait]
    impl Completion for Canned {
        async fn complete(&self, prompt: &str) -> Result<String, EnhanceError> {
            assert!(prompt.contains("flowchart TD"));
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_clean_completion_strips_fences() {
        assert_eq!(
            clean_completion("```mermaid\nflowchart TD\n    A --> B\n```"),
            "flowchart TD\n    A --> B"
        );
        assert_eq!(
            clean_completion("```\nmermaid\nflowchart LR\n```\n"),
            "flowchart LR"
        );
        assert_eq!(clean_completion("  pie\n  \"A\" : 1  "), "pie\n  \"A\" : 1");
    }

    #[test]
    fn test_prompt_embeds_source() {
        let prompt = enhancement_prompt("flowchart TD\n    A --> B");
        assert!(prompt.contains("\n\nflowchart TD\n    A --> B\n\n"));
        assert!(prompt.ends_with("markdown formatting."));
    }

    #[tokio::test]
    async fn test_enhance_diagram_cleans_reply() {
        let canned = Canned("```mermaid\nflowchart TD\n    A[Begin] --> B[Finish]\n```");
        let enhanced = enhance_diagram(&canned, "flowchart TD\n    A --> B")
            .await
            .unwrap();
        assert_eq!(enhanced, "flowchart TD\n    A[Begin] --> B[Finish]");
    }

    #[tokio::test]
    async fn test_enhance_diagram_rejects_empty_reply() {
        let canned = Canned("```\n```");
        assert!(matches!(
            enhance_diagram(&canned, "flowchart TD").await,
            Err(EnhanceError::Empty)
        ));
    }

    #[test]
    fn test_client_defaults() {
        let client = OllamaClient::new(Some("http://gpu-box:11434/"), None).unwrap();
        assert_eq!(client.base_url(), "http://gpu-box:11434");
        assert_eq!(client.model(), DEFAULT_MODEL);
    }
}
