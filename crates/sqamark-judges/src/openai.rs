//! OpenAI-compatible chat completions judge.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use sqamark_core::error::JudgeError;
use sqamark_core::traits::{
    parse_verdict, render_judge_prompt, BulletJudge, JudgeRequest, JudgeVerdict, DEFAULT_JUDGE_PROMPT,
};

use crate::http::{check_status, parse_failure, send_error};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const MAX_TOKENS: u32 = 256;

/// Judge backed by an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiJudge {
    api_key: String,
    base_url: String,
    org_id: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl OpenAiJudge {
    pub fn new(
        api_key: &str,
        base_url: Option<String>,
        org_id: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            org_id,
            model: model.into(),
            client,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl BulletJudge for OpenAiJudge {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, request), fields(model = %self.model, question_id = %request.question_id, bullet = request.bullet.bullet))]
    async fn judge(&self, request: &JudgeRequest) -> Result<JudgeVerdict, JudgeError> {
        let body = ChatRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: 0.0,
            response_format: ResponseFormat { kind: "json_object" },
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
        };

        let mut req = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json");

        if let Some(org) = &self.org_id {
            req = req.header("OpenAI-Organization", org);
        }

        let response = req
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(e, std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS)))?;
        let response = check_status(response, &self.model).await?;
        let api_response: ChatResponse = response.json().await.map_err(parse_failure)?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        parse_verdict(&content)
    }
}
