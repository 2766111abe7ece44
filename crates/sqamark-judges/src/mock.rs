//! Mock judge for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use sqamark_core::error::JudgeError;
use sqamark_core::traits::{BulletJudge, JudgeRequest, JudgeVerdict};

/// A failure the mock should inject for a bullet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    Api { status: u16, message: String },
    Malformed,
    RateLimited,
}

impl MockFailure {
    fn to_error(&self) -> JudgeError {
        match self {
            MockFailure::Api { status, message } => JudgeError::ApiError {
                status: *status,
                message: message.clone(),
            },
            MockFailure::Malformed => JudgeError::MalformedVerdict("mock reply was not JSON".into()),
            MockFailure::RateLimited => JudgeError::RateLimited {
                retry_after_ms: 1000,
            },
        }
    }
}

/// A scriptable judge for exercising the marking engine without real API calls.
///
/// Verdicts are keyed by `(question_id, bullet)`; unscripted bullets get the
/// default verdict.
pub struct MockJudge {
    verdicts: HashMap<(String, u32), JudgeVerdict>,
    failures: HashMap<(String, u32), MockFailure>,
    default_verdict: JudgeVerdict,
    delay: Option<Duration>,
    call_count: AtomicU32,
    last_request: Mutex<Option<JudgeRequest>>,
}

impl MockJudge {
    /// A mock that awards every bullet unless scripted otherwise.
    pub fn awarding() -> Self {
        Self::with_default(JudgeVerdict::awarded("mock: awarded"))
    }

    /// A mock that withholds every bullet unless scripted otherwise.
    pub fn withholding() -> Self {
        Self::with_default(JudgeVerdict::withheld("mock: withheld"))
    }

    fn with_default(default_verdict: JudgeVerdict) -> Self {
        Self {
            verdicts: HashMap::new(),
            failures: HashMap::new(),
            default_verdict,
            delay: None,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn with_verdict(mut self, question_id: &str, bullet: u32, verdict: JudgeVerdict) -> Self {
        self.verdicts.insert((question_id.to_string(), bullet), verdict);
        self
    }

    pub fn with_failure(mut self, question_id: &str, bullet: u32, failure: MockFailure) -> Self {
        self.failures.insert((question_id.to_string(), bullet), failure);
        self
    }

    /// Sleep this long before every verdict.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<JudgeRequest> {
        self.last_request.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl BulletJudge for MockJudge {
    fn name(&self) -> &str {
        "mock"
    }

    async fn judge(&self, request: &JudgeRequest) -> Result<JudgeVerdict, JudgeError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let key = (request.question_id.clone(), request.bullet.bullet);
        if let Some(failure) = self.failures.get(&key) {
            return Err(failure.to_error());
        }
        Ok(self
            .verdicts
            .get(&key)
            .cloned()
            .unwrap_or_else(|| self.default_verdict.clone()))
    }
}
