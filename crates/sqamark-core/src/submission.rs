//! Student submission model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::default_schema_version;

/// A student's attempt at one exam. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSubmission {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub submission_id: String,
    pub exam_id: String,
    pub student_id: String,
    pub answers: Vec<StudentAnswer>,
    pub exam_metadata: SubmissionMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionMetadata {
    pub started_at: DateTime<Utc>,
    pub questions_attempted: u32,
}

/// One answer. The graded content is `response_text`; the older bare
/// `answer` field is rejected at ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAnswer {
    pub question_id: String,
    pub question_number: u32,
    pub response_text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_with_images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_shown: Option<String>,
}

impl StudentAnswer {
    /// Blank response with no working: nothing to mark.
    pub fn is_blank(&self) -> bool {
        self.response_text.trim().is_empty()
            && self
                .working_shown
                .as_deref()
                .map_or(true, |w| w.trim().is_empty())
    }
}

impl ExamSubmission {
    pub fn answer_for(&self, question_id: &str) -> Option<&StudentAnswer> {
        self.answers.iter().find(|a| a.question_id == question_id)
    }
}
