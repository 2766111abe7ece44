//! Error types shared across sqamark.
//!
//! `JudgeError` lives here rather than in `sqamark-judges` so the marking
//! engine can classify a failed judgment without string matching.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ExamStatus;

/// Errors returned by an external bullet judge.
#[derive(Debug, Error)]
pub enum JudgeError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The judgment did not complete in time.
    #[error("judgment timed out after {0:?}")]
    Timeout(Duration),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The judge answered, but not with a usable verdict.
    #[error("malformed verdict: {0}")]
    MalformedVerdict(String),

    /// No illustrative answer correlates with the bullet being judged.
    #[error("no illustrative answer available for bullet {bullet}")]
    NoCandidates { bullet: u32 },
}

impl JudgeError {
    /// Returns `true` if retrying the same call cannot succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            JudgeError::AuthenticationFailed(_)
                | JudgeError::ModelNotFound(_)
                | JudgeError::NoCandidates { .. }
        )
    }
}

/// Which family of contract rule a violation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// The document itself is malformed.
    Structural,
    /// The document references something that does not exist.
    CrossReference,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Structural => write!(f, "structural"),
            ViolationKind::CrossReference => write!(f, "cross-reference"),
        }
    }
}

/// One violated contract invariant, located by a JSON-path-like string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn structural(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ViolationKind::Structural,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn cross_reference(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ViolationKind::CrossReference,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Every invariant a document violated, collected in one error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{document} failed validation with {} violation(s):{}", .violations.len(), render_violations(.violations))]
pub struct ContractError {
    /// Which document was rejected ("exam", "submission").
    pub document: String,
    pub violations: Vec<Violation>,
}

fn render_violations(violations: &[Violation]) -> String {
    violations.iter().map(|v| format!("\n  - {v}")).collect()
}

impl ContractError {
    pub fn new(document: impl Into<String>, violations: Vec<Violation>) -> Self {
        Self {
            document: document.into(),
            violations,
        }
    }

    /// Returns `Ok(())` when nothing was violated.
    pub fn check(document: &str, violations: Vec<Violation>) -> Result<(), ContractError> {
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ContractError::new(document, violations))
        }
    }

    pub fn has_cross_reference_failure(&self) -> bool {
        self.violations
            .iter()
            .any(|v| v.kind == ViolationKind::CrossReference)
    }
}

/// Failures of the marking engine.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// The exam or submission was rejected before grading.
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// Totals computed two ways disagreed. This is a defect, never a student error.
    #[error("internal aggregation fault in {scope}: {detail}")]
    AggregationFault { scope: String, detail: String },
}

/// An exam status change that would move the lifecycle backwards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot move exam {exam_id} from {from} to {to}")]
pub struct LifecycleError {
    pub exam_id: String,
    pub from: ExamStatus,
    pub to: ExamStatus,
}

/// A threshold table whose cut points are out of range or out of order.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BandTableError {
    #[error("threshold {name} = {value} is outside {min}..={max}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("threshold {higher} ({higher_value}) must be above {lower} ({lower_value})")]
    NotDescending {
        higher: &'static str,
        higher_value: f64,
        lower: &'static str,
        lower_value: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_error_lists_every_violation() {
        let err = ContractError::new(
            "exam",
            vec![
                Violation::structural("sections[0].total_marks", "expected 5, questions sum to 4"),
                Violation::structural("status", "unknown status 'live'"),
            ],
        );
        let text = err.to_string();
        assert!(text.contains("2 violation(s)"));
        assert!(text.contains("sections[0].total_marks"));
        assert!(text.contains("unknown status"));
        assert!(!err.has_cross_reference_failure());
    }

    #[test]
    fn check_passes_on_empty() {
        assert!(ContractError::check("exam", vec![]).is_ok());
        assert!(ContractError::check("exam", vec![Violation::cross_reference("exam_id", "x")]).is_err());
    }

    #[test]
    fn timeout_keeps_sub_second_precision() {
        assert_eq!(
            JudgeError::Timeout(Duration::from_millis(250)).to_string(),
            "judgment timed out after 250ms"
        );
        assert_eq!(
            JudgeError::Timeout(Duration::from_secs(30)).to_string(),
            "judgment timed out after 30s"
        );
    }

    #[test]
    fn permanent_judge_errors() {
        assert!(JudgeError::AuthenticationFailed("bad".into()).is_permanent());
        assert!(JudgeError::NoCandidates { bullet: 2 }.is_permanent());
        assert!(!JudgeError::Timeout(Duration::from_secs(30)).is_permanent());
        assert!(!JudgeError::RateLimited { retry_after_ms: 10 }.is_permanent());
    }
}
