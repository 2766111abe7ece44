//! Topic mastery and learning recommendations.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BandTableError;
use crate::model::Exam;
use crate::results::{LearningRecommendation, QuestionResult};

/// Coarse per-topic performance category, ordered lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryLevel {
    #[serde(rename = "needs support", alias = "needs_support")]
    NeedsSupport,
    Developing,
    Secure,
}

impl fmt::Display for MasteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MasteryLevel::NeedsSupport => write!(f, "needs support"),
            MasteryLevel::Developing => write!(f, "developing"),
            MasteryLevel::Secure => write!(f, "secure"),
        }
    }
}

/// Ratio cut points (earned / possible) for each mastery level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MasteryThresholds {
    #[serde(default = "default_secure")]
    pub secure: f64,
    #[serde(default = "default_developing")]
    pub developing: f64,
}

fn default_secure() -> f64 {
    0.8
}

fn default_developing() -> f64 {
    0.5
}

impl Default for MasteryThresholds {
    fn default() -> Self {
        Self {
            secure: default_secure(),
            developing: default_developing(),
        }
    }
}

impl MasteryThresholds {
    pub fn validate(&self) -> Result<(), BandTableError> {
        for (name, value) in [("secure", self.secure), ("developing", self.developing)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(BandTableError::OutOfRange {
                    name,
                    value,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }
        if self.secure <= self.developing {
            return Err(BandTableError::NotDescending {
                higher: "secure",
                higher_value: self.secure,
                lower: "developing",
                lower_value: self.developing,
            });
        }
        Ok(())
    }

    pub fn level(&self, ratio: f64) -> MasteryLevel {
        if ratio >= self.secure {
            MasteryLevel::Secure
        } else if ratio >= self.developing {
            MasteryLevel::Developing
        } else {
            MasteryLevel::NeedsSupport
        }
    }
}

/// Earned and possible marks accumulated for one topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicTally {
    pub earned: u64,
    pub possible: u64,
}

impl TopicTally {
    pub fn ratio(&self) -> f64 {
        if self.possible == 0 {
            0.0
        } else {
            self.earned as f64 / self.possible as f64
        }
    }
}

/// Sum question results per topic, keyed in stable (sorted) order.
pub fn tally_topics(exam: &Exam, results: &[QuestionResult]) -> BTreeMap<String, TopicTally> {
    let mut topics: BTreeMap<String, TopicTally> = BTreeMap::new();
    for section in &exam.sections {
        for question in &section.questions {
            let Some(result) = results.iter().find(|r| r.question_id == question.question_id)
            else {
                continue;
            };
            let tally = topics
                .entry(question.topic_or(&section.section_id).to_string())
                .or_default();
            tally.earned += u64::from(result.marks_earned);
            tally.possible += u64::from(result.marks_possible);
        }
    }
    topics
}

/// One recommendation per topic below "secure", or every topic when
/// `full_coverage` is requested.
pub fn derive_recommendations(
    exam: &Exam,
    results: &[QuestionResult],
    thresholds: &MasteryThresholds,
    full_coverage: bool,
) -> Vec<LearningRecommendation> {
    tally_topics(exam, results)
        .into_iter()
        .filter_map(|(topic_id, tally)| {
            let level = thresholds.level(tally.ratio());
            if level == MasteryLevel::Secure && !full_coverage {
                return None;
            }
            let recommendation = recommendation_text(&topic_id, level, &tally);
            Some(LearningRecommendation {
                topic_id,
                mastery_level: level,
                recommendation,
            })
        })
        .collect()
}

fn recommendation_text(topic: &str, level: MasteryLevel, tally: &TopicTally) -> String {
    let score = format!("{}/{}", tally.earned, tally.possible);
    match level {
        MasteryLevel::Secure => format!(
            "{topic} is secure ({score}). Keep it fresh with mixed practice and move on to harder problems."
        ),
        MasteryLevel::Developing => format!(
            "{topic} is developing ({score}). Review the marking steps you missed and try similar questions, showing full working."
        ),
        MasteryLevel::NeedsSupport => format!(
            "{topic} needs support ({score}). Revisit the core method with worked examples before attempting exam-style questions again."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::QuestionResult;
    use crate::test_support::sample_exam;

    fn result(question_id: &str, earned: u32, possible: u32) -> QuestionResult {
        QuestionResult {
            question_id: question_id.into(),
            marks_earned: earned,
            marks_possible: possible,
            bullet_marks: vec![],
            overall_feedback: "x".into(),
        }
    }

    #[test]
    fn level_cut_points() {
        let t = MasteryThresholds::default();
        assert_eq!(t.level(0.8), MasteryLevel::Secure);
        assert_eq!(t.level(0.79), MasteryLevel::Developing);
        assert_eq!(t.level(0.5), MasteryLevel::Developing);
        assert_eq!(t.level(0.49), MasteryLevel::NeedsSupport);
    }

    #[test]
    fn thresholds_must_descend() {
        assert!(MasteryThresholds::default().validate().is_ok());
        let bad = MasteryThresholds {
            secure: 0.4,
            developing: 0.5,
        };
        assert!(bad.validate().is_err());
        let out = MasteryThresholds {
            secure: 1.5,
            developing: 0.5,
        };
        assert!(matches!(out.validate(), Err(BandTableError::OutOfRange { .. })));
    }

    #[test]
    fn recommends_only_insecure_topics_by_default() {
        let exam = sample_exam();
        // q1 (algebra, 3), q2 (algebra, 2), q3 (untagged, section s2, 5)
        let results = vec![result("q1", 3, 3), result("q2", 2, 2), result("q3", 1, 5)];

        let recs = derive_recommendations(&exam, &results, &MasteryThresholds::default(), false);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].topic_id, "s2");
        assert_eq!(recs[0].mastery_level, MasteryLevel::NeedsSupport);
        assert!(recs[0].recommendation.contains("1/5"));

        let all = derive_recommendations(&exam, &results, &MasteryThresholds::default(), true);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].topic_id, "algebra");
        assert_eq!(all[0].mastery_level, MasteryLevel::Secure);
    }

    #[test]
    fn tally_groups_by_topic() {
        let exam = sample_exam();
        let results = vec![result("q1", 1, 3), result("q2", 2, 2), result("q3", 0, 5)];
        let topics = tally_topics(&exam, &results);
        assert_eq!(topics["algebra"], TopicTally { earned: 3, possible: 5 });
        assert_eq!(topics["s2"].ratio(), 0.0);
    }

    #[test]
    fn mastery_level_json_matches_display() {
        for level in [MasteryLevel::NeedsSupport, MasteryLevel::Developing, MasteryLevel::Secure] {
            assert_eq!(serde_json::to_string(&level).unwrap(), format!("\"{level}\""));
        }
        let legacy: MasteryLevel = serde_json::from_str("\"needs_support\"").unwrap();
        assert_eq!(legacy, MasteryLevel::NeedsSupport);
    }
}
