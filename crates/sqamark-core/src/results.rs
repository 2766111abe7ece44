//! Evaluation result documents produced by the marking engine.
//!
//! An `EvaluationResult` is derived and replaceable: recomputing it from the
//! same exam and submission yields a value-equal document.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::grading::{Grade, GradeBandTable};
use crate::mastery::MasteryLevel;
use crate::model::default_schema_version;

/// Grading output for one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub evaluation_id: Uuid,
    pub submission_id: String,
    pub overall_result: OverallResult,
    pub question_feedback: Vec<QuestionResult>,
    pub section_results: Vec<SectionResult>,
    #[serde(default)]
    pub topic_coverage: Vec<String>,
    #[serde(default)]
    pub learning_recommendations: Vec<LearningRecommendation>,
    pub encouragement_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallResult {
    pub marks_earned: u32,
    pub marks_possible: u32,
    pub percentage: f64,
    pub grade: Grade,
    /// The threshold table this grade was resolved against.
    pub grade_band: GradeBandTable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: String,
    pub marks_earned: u32,
    pub marks_possible: u32,
    pub bullet_marks: Vec<BulletMark>,
    pub overall_feedback: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletMark {
    pub bullet: u32,
    pub marks_earned: u32,
    pub marks_possible: u32,
    pub feedback: String,
    /// Set when the judgment for this bullet failed; the bullet scores 0.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ungraded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionResult {
    pub section_id: String,
    pub section_name: String,
    pub marks_earned: u32,
    pub marks_possible: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningRecommendation {
    pub topic_id: String,
    pub mastery_level: MasteryLevel,
    pub recommendation: String,
}

impl QuestionResult {
    /// Sum of bullet marks; equals `marks_earned` in a consistent result.
    pub fn bullet_total(&self) -> u64 {
        self.bullet_marks.iter().map(|b| u64::from(b.marks_earned)).sum()
    }

    pub fn ungraded_bullets(&self) -> impl Iterator<Item = &BulletMark> {
        self.bullet_marks.iter().filter(|b| b.ungraded)
    }
}

impl EvaluationResult {
    pub fn question(&self, question_id: &str) -> Option<&QuestionResult> {
        self.question_feedback
            .iter()
            .find(|q| q.question_id == question_id)
    }

    /// Number of bullets left ungraded across the whole evaluation.
    pub fn ungraded_count(&self) -> usize {
        self.question_feedback
            .iter()
            .map(|q| q.ungraded_bullets().count())
            .sum()
    }
}
