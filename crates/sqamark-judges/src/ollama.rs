//! Ollama (local model) judge.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use sqamark_core::error::JudgeError;
use sqamark_core::traits::{
    parse_verdict, render_judge_prompt, BulletJudge, JudgeRequest, JudgeVerdict, DEFAULT_JUDGE_PROMPT,
};

use crate::http::{check_status, parse_failure, send_error};

pub(crate) const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_TIMEOUT_SECS: u64 = 300; // Local models are slower

/// Judge backed by a local Ollama server.
pub struct OllamaJudge {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaJudge {
    pub fn new(base_url: &str, model: impl Into<String>) -> Self {
        let base = if base_url.is_empty() {
            DEFAULT_BASE_URL
        } else {
            base_url
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            base_url: base.trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        }
    }

    fn unreachable(&self) -> JudgeError {
        JudgeError::NetworkError(format!(
            "Ollama not reachable at {}. Is it running? Start with: ollama serve",
            self.base_url
        ))
    }

    /// Names of the models pulled into the local Ollama instance.
    pub async fn list_models(&self) -> Result<Vec<String>, JudgeError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|_| self.unreachable())?;
        let response = check_status(response, &self.model).await?;
        let tags: TagsResponse = response.json().await.map_err(parse_failure)?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    format: &'static str,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    name: String,
}

#[async_trait]
impl BulletJudge for OllamaJudge {
    fn name(&self) -> &str {
        "ollama"
    }

    #[instrument(skip(self, request), fields(model = %self.model, question_id = %request.question_id, bullet = request.bullet.bullet))]
    async fn judge(&self, request: &JudgeRequest) -> Result<JudgeVerdict, JudgeError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: DEFAULT_JUDGE_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: render_judge_prompt(request),
                },
            ],
            stream: false,
            format: "json",
            options: ChatOptions { temperature: 0.0 },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    self.unreachable()
                } else {
                    send_error(e, std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
                }
            })?;

        if response.status().as_u16() == 404 {
            return Err(JudgeError::ModelNotFound(format!(
                "'{}' is not available locally; pull it with: ollama pull {}",
                self.model, self.model
            )));
        }
        let response = check_status(response, &self.model).await?;
        let api_response: ChatResponse = response.json().await.map_err(parse_failure)?;
        parse_verdict(&api_response.message.content)
    }
}
