//! Response handling shared by the HTTP judges.

use std::time::Duration;

use serde_json::Value;
use sqamark_core::error::JudgeError;

/// Map a transport failure to a judge error.
pub(crate) fn send_error(e: reqwest::Error, timeout: Duration) -> JudgeError {
    if e.is_timeout() {
        JudgeError::Timeout(timeout)
    } else {
        JudgeError::NetworkError(e.to_string())
    }
}

/// Turn non-success HTTP statuses into judge errors.
pub(crate) async fn check_status(
    response: reqwest::Response,
    model: &str,
) -> Result<reqwest::Response, JudgeError> {
    let status = response.status().as_u16();
    match status {
        429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5)
                * 1000;
            Err(JudgeError::RateLimited {
                retry_after_ms: retry_after,
            })
        }
        401 | 403 => {
            let body = response.text().await.unwrap_or_default();
            Err(JudgeError::AuthenticationFailed(body))
        }
        404 => Err(JudgeError::ModelNotFound(model.to_string())),
        s if s >= 400 => {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body).unwrap_or(body);
            Err(JudgeError::ApiError { status, message })
        }
        _ => Ok(response),
    }
}

/// Pull `error.message` (Anthropic, OpenAI) or a bare `error` string (Ollama) out of a body.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        Value::String(s) => Some(s.clone()),
        other => other.get("message")?.as_str().map(str::to_string),
    }
}

pub(crate) fn parse_failure(e: reqwest::Error) -> JudgeError {
    JudgeError::ApiError {
        status: 0,
        message: format!("failed to parse response: {e}"),
    }
}
