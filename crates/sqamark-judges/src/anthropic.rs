//! Anthropic Messages API judge.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use sqamark_core::error::JudgeError;
use sqamark_core::traits::{
    parse_verdict, render_judge_prompt, BulletJudge, JudgeRequest, JudgeVerdict, DEFAULT_JUDGE_PROMPT,
};

use crate::http::{check_status, parse_failure, send_error};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const MAX_TOKENS: u32 = 256;

/// Judge backed by the Anthropic Messages API.
pub struct AnthropicJudge {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicJudge {
    pub fn new(api_key: &str, base_url: Option<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.into(),
            client,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl BulletJudge for AnthropicJudge {
    fn name(&self) -> &str {
        "anthropic"
    }

    #[instrument(skip(self, request), fields(model = %self.model, question_id = %request.question_id, bullet = request.bullet.bullet))]
    async fn judge(&self, request: &JudgeRequest) -> Result<JudgeVerdict, JudgeError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: 0.0,
            system: DEFAULT_JUDGE_PROMPT,
            messages: vec![Message {
                role: "user",
                content: render_judge_prompt(request),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(e, std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS)))?;

        let response = check_status(response, &self.model).await?;
        let api_response: MessagesResponse = response.json().await.map_err(parse_failure)?;

        let text: String = api_response
            .content
            .iter()
            .map(|block| block.text.as_str())
            .collect();
        parse_verdict(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqamark_core::model::{IllustrativeAnswer, MarkingBullet};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> JudgeRequest {
        JudgeRequest {
            question_id: "q1".into(),
            stem: "Solve 3x + 2 = 11.".into(),
            response_text: "x = 3".into(),
            working_shown: None,
            bullet: MarkingBullet {
                bullet: 2,
                process: "solves correctly".into(),
                marks: 2,
            },
            candidates: vec![IllustrativeAnswer {
                bullet: 2,
                answer: "x = 3".into(),
                answer_latex: None,
                tolerance_range: None,
                acceptable_variations: vec![],
            }],
        }
    }

    fn reply(text: &str) -> serde_json::Value {
        serde_json::json!({
            "content": [{"type": "text", "text": text}],
            "model": "claude-sonnet-4-20250514",
            "usage": {"input_tokens": 120, "output_tokens": 20}
        })
    }

    #[tokio::test]
    async fn successful_verdict() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "claude-sonnet-4-20250514",
                "temperature": 0.0
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply(
                "```json\n{\"awarded\": true, \"rationale\": \"Correct value of x.\"}\n```",
            )))
            .expect(1)
            .mount(&server)
            .await;

        let judge = AnthropicJudge::new("test-key", Some(server.uri()), "claude-sonnet-4-20250514");
        let verdict = judge.judge(&request()).await.unwrap();
        assert!(verdict.awarded);
        assert_eq!(verdict.rationale, "Correct value of x.");
    }

    #[tokio::test]
    async fn prose_reply_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("Looks right to me.")))
            .mount(&server)
            .await;

        let judge = AnthropicJudge::new("test-key", Some(server.uri()), "claude-sonnet-4-20250514");
        let err = judge.judge(&request()).await.unwrap_err();
        assert!(matches!(err, JudgeError::MalformedVerdict(_)));
    }

    #[tokio::test]
    async fn authentication_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let judge = AnthropicJudge::new("bad-key", Some(server.uri()), "claude-sonnet-4-20250514");
        let err = judge.judge(&request()).await.unwrap_err();
        assert!(matches!(err, JudgeError::AuthenticationFailed(_)));
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn rate_limiting() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let judge = AnthropicJudge::new("test-key", Some(server.uri()), "claude-sonnet-4-20250514");
        let err = judge.judge(&request()).await.unwrap_err();
        assert!(matches!(err, JudgeError::RateLimited { retry_after_ms: 7000 }));
    }

    #[tokio::test]
    async fn api_error_message_is_extracted() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(529).set_body_json(serde_json::json!({
                "type": "error",
                "error": {"type": "overloaded_error", "message": "Overloaded"}
            })))
            .mount(&server)
            .await;

        let judge = AnthropicJudge::new("test-key", Some(server.uri()), "claude-sonnet-4-20250514");
        let err = judge.judge(&request()).await.unwrap_err();
        assert_eq!(err.to_string(), "API error (HTTP 529): Overloaded");
    }
}
