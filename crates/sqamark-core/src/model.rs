//! Exam document model.
//!
//! An `Exam` is produced by the authoring process and is immutable once
//! published; only its lifecycle status may change afterwards. Field names
//! are part of the cross-process JSON contract.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;

/// Schema version shared by the exam, submission, and evaluation documents.
pub const SCHEMA_VERSION: u32 = 1;

pub(crate) fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Root document for one assessment instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub exam_id: String,
    pub course_id: String,
    pub subject: String,
    /// Qualification level (e.g. "National 5", "Higher"); selects the grade band table.
    pub level: String,
    pub status: ExamStatus,
    pub metadata: ExamMetadata,
    pub sections: Vec<Section>,
    #[serde(default)]
    pub topic_coverage: Vec<String>,
    #[serde(default)]
    pub template_sources: Vec<String>,
    pub difficulty_distribution: DifficultyDistribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamMetadata {
    pub total_marks: u32,
    pub duration_minutes: u32,
    pub calculator_allowed: bool,
}

/// Groups questions under one theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub section_id: String,
    pub section_name: String,
    pub total_marks: u32,
    pub questions: Vec<Question>,
}

/// A single gradable item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question_id: String,
    pub question_number: u32,
    pub stem: String,
    #[serde(default)]
    pub stem_latex: String,
    pub marks: u32,
    pub difficulty: Difficulty,
    /// Topic identifier carried over from authoring, used for recommendations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub marking_scheme: MarkingScheme,
}

/// The dual generic/illustrative SQA marking contract for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkingScheme {
    pub max_marks: u32,
    pub generic_scheme: Vec<MarkingBullet>,
    pub illustrative_scheme: Vec<IllustrativeAnswer>,
}

impl MarkingScheme {
    /// Sum of all generic bullet marks; must equal `max_marks` in a valid exam.
    ///
    /// Widened to `u64` so an unvalidated scheme cannot overflow.
    pub fn bullet_total(&self) -> u64 {
        self.generic_scheme.iter().map(|b| u64::from(b.marks)).sum()
    }

    /// Illustrative entries correlated with a generic bullet by number.
    pub fn illustrative_for(&self, bullet: u32) -> Vec<IllustrativeAnswer> {
        self.illustrative_scheme
            .iter()
            .filter(|a| a.bullet == bullet)
            .cloned()
            .collect()
    }
}

/// One atomic unit of partial credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkingBullet {
    pub bullet: u32,
    pub process: String,
    pub marks: u32,
}

/// One accepted final form for a bullet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IllustrativeAnswer {
    pub bullet: u32,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_latex: Option<String>,
    /// Inclusive `[low, high]` interval for numeric answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance_range: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptable_variations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [&'static str; 3] = ["easy", "medium", "hard"];
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// Question counts per difficulty bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyDistribution {
    pub easy: u32,
    pub medium: u32,
    pub hard: u32,
}

impl DifficultyDistribution {
    pub fn total(&self) -> u32 {
        self.easy + self.medium + self.hard
    }

    pub fn count(&self, difficulty: Difficulty) -> u32 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }
}

/// Exam lifecycle. Transitions only move forward: draft → published → archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamStatus {
    Draft,
    Published,
    Archived,
}

impl ExamStatus {
    pub const ALL: [&'static str; 3] = ["draft", "published", "archived"];

    pub fn can_transition_to(self, next: ExamStatus) -> bool {
        matches!(
            (self, next),
            (ExamStatus::Draft, ExamStatus::Published) | (ExamStatus::Published, ExamStatus::Archived)
        ) || self == next
    }
}

impl fmt::Display for ExamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExamStatus::Draft => write!(f, "draft"),
            ExamStatus::Published => write!(f, "published"),
            ExamStatus::Archived => write!(f, "archived"),
        }
    }
}

impl FromStr for ExamStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ExamStatus::Draft),
            "published" => Ok(ExamStatus::Published),
            "archived" => Ok(ExamStatus::Archived),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

impl Exam {
    /// All questions in section order.
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.sections.iter().flat_map(|s| s.questions.iter())
    }

    pub fn question_count(&self) -> usize {
        self.sections.iter().map(|s| s.questions.len()).sum()
    }

    pub fn find_question(&self, question_id: &str) -> Option<&Question> {
        self.questions().find(|q| q.question_id == question_id)
    }

    /// The set of template identifiers this exam was built from.
    pub fn template_signature(&self) -> BTreeSet<&str> {
        self.template_sources.iter().map(String::as_str).collect()
    }

    pub fn publish(&mut self) -> Result<(), LifecycleError> {
        self.transition(ExamStatus::Published)
    }

    pub fn archive(&mut self) -> Result<(), LifecycleError> {
        self.transition(ExamStatus::Archived)
    }

    fn transition(&mut self, next: ExamStatus) -> Result<(), LifecycleError> {
        if !self.status.can_transition_to(next) {
            return Err(LifecycleError {
                exam_id: self.exam_id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

impl Question {
    /// Topic used when grouping results; untagged questions fall back to their section.
    pub fn topic_or<'a>(&'a self, section_id: &'a str) -> &'a str {
        self.topic.as_deref().unwrap_or(section_id)
    }
}
