//! Cohort statistics across many evaluation results for one exam.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::grading::Grade;
use crate::mastery::{tally_topics, TopicTally};
use crate::model::Exam;
use crate::results::EvaluationResult;

/// Aggregate statistics for a cohort of submissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortStats {
    pub exam_id: String,
    pub submissions: usize,
    /// Mean percentage; 0 for an empty cohort.
    pub mean_percentage: f64,
    pub median_percentage: f64,
    pub min_percentage: f64,
    pub max_percentage: f64,
    /// Count per grade, every grade present.
    pub grade_distribution: BTreeMap<Grade, usize>,
    /// Per-question statistics in exam order.
    pub per_question: Vec<QuestionStats>,
    /// Per-topic totals across the cohort.
    pub per_topic: BTreeMap<String, TopicStats>,
    pub ungraded_bullets: usize,
}

/// How one question performed across the cohort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionStats {
    pub question_id: String,
    pub marks_possible: u32,
    pub mean_marks: f64,
    /// Mean marks as a fraction of marks possible (the classical facility index).
    pub facility: f64,
    /// Submissions where the question scored full marks.
    pub full_marks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicStats {
    pub earned: u64,
    pub possible: u64,
    pub ratio: f64,
}

impl From<TopicTally> for TopicStats {
    fn from(tally: TopicTally) -> Self {
        Self {
            earned: tally.earned,
            possible: tally.possible,
            ratio: tally.ratio(),
        }
    }
}

/// Compute cohort statistics. Question results whose ids are not in `exam` are ignored.
pub fn compute_cohort_stats(exam: &Exam, results: &[EvaluationResult]) -> CohortStats {
    let mut percentages: Vec<f64> = results.iter().map(|r| r.overall_result.percentage).collect();
    percentages.sort_by(|a, b| a.total_cmp(b));

    let n = percentages.len();
    let mean_percentage = if n == 0 {
        0.0
    } else {
        round1(percentages.iter().sum::<f64>() / n as f64)
    };
    let median_percentage = match n {
        0 => 0.0,
        n if n % 2 == 1 => percentages[n / 2],
        n => round1((percentages[n / 2 - 1] + percentages[n / 2]) / 2.0),
    };

    let mut grade_distribution: BTreeMap<Grade, usize> = [Grade::NoAward, Grade::D, Grade::C, Grade::B, Grade::A]
        .into_iter()
        .map(|g| (g, 0))
        .collect();
    for r in results {
        *grade_distribution.entry(r.overall_result.grade).or_default() += 1;
    }

    let per_question = exam
        .questions()
        .map(|question| {
            let scores: Vec<u32> = results
                .iter()
                .filter_map(|r| r.question(&question.question_id))
                .map(|q| q.marks_earned)
                .collect();
            let mean_marks = if scores.is_empty() {
                0.0
            } else {
                scores.iter().map(|&s| u64::from(s)).sum::<u64>() as f64 / scores.len() as f64
            };
            QuestionStats {
                question_id: question.question_id.clone(),
                marks_possible: question.marks,
                mean_marks,
                facility: if question.marks == 0 {
                    0.0
                } else {
                    mean_marks / question.marks as f64
                },
                full_marks: scores.iter().filter(|&&s| s == question.marks).count(),
            }
        })
        .collect();

    let mut per_topic: BTreeMap<String, TopicTally> = BTreeMap::new();
    for r in results {
        for (topic, tally) in tally_topics(exam, &r.question_feedback) {
            let entry = per_topic.entry(topic).or_default();
            entry.earned += tally.earned;
            entry.possible += tally.possible;
        }
    }

    CohortStats {
        exam_id: exam.exam_id.clone(),
        submissions: n,
        mean_percentage,
        median_percentage,
        min_percentage: percentages.first().copied().unwrap_or(0.0),
        max_percentage: percentages.last().copied().unwrap_or(0.0),
        grade_distribution,
        per_question,
        per_topic: per_topic.into_iter().map(|(k, v)| (k, v.into())).collect(),
        ungraded_bullets: results.iter().map(|r| r.ungraded_count()).sum(),
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::{MarkingEngine, MarkingEngineConfig};
    use crate::matching::IllustrativeJudge;
    use crate::submission::ExamSubmission;
    use crate::test_support::{sample_exam, sample_submission};

    async fn cohort() -> Vec<EvaluationResult> {
        let engine = MarkingEngine::new(Arc::new(IllustrativeJudge), MarkingEngineConfig::default());
        let exam = sample_exam();

        let perfect = sample_submission();
        let mut weak_geometry = sample_submission();
        weak_geometry.submission_id = "sub-002".into();
        weak_geometry.answers[2].response_text = "c = 14".into();
        let mut blank = ExamSubmission {
            submission_id: "sub-003".into(),
            ..sample_submission()
        };
        blank.answers.clear();

        let mut out = Vec::new();
        for s in [perfect, weak_geometry, blank] {
            out.push(engine.evaluate(&exam, &s).await.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn cohort_summary() {
        let stats = compute_cohort_stats(&sample_exam(), &cohort().await);

        assert_eq!(stats.submissions, 3);
        assert_eq!(stats.mean_percentage, 50.0);
        assert_eq!(stats.median_percentage, 50.0);
        assert_eq!(stats.min_percentage, 0.0);
        assert_eq!(stats.max_percentage, 100.0);
        assert_eq!(stats.grade_distribution[&Grade::A], 1);
        assert_eq!(stats.grade_distribution[&Grade::C], 1);
        assert_eq!(stats.grade_distribution[&Grade::NoAward], 1);
        assert_eq!(stats.grade_distribution[&Grade::B], 0);
        assert_eq!(stats.ungraded_bullets, 0);
    }

    #[tokio::test]
    async fn per_question_and_topic() {
        let stats = compute_cohort_stats(&sample_exam(), &cohort().await);

        let ids: Vec<&str> = stats.per_question.iter().map(|q| q.question_id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q2", "q3"]);
        let q1 = &stats.per_question[0];
        assert_eq!(q1.mean_marks, 2.0);
        assert!((q1.facility - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(q1.full_marks, 2);
        let q3 = &stats.per_question[2];
        assert_eq!(q3.full_marks, 1);

        let algebra = &stats.per_topic["algebra"];
        assert_eq!((algebra.earned, algebra.possible), (10, 15));
        let geometry = &stats.per_topic["s2"];
        assert_eq!((geometry.earned, geometry.possible), (5, 15));
    }

    #[test]
    fn empty_cohort() {
        let stats = compute_cohort_stats(&sample_exam(), &[]);
        assert_eq!(stats.submissions, 0);
        assert_eq!(stats.mean_percentage, 0.0);
        assert_eq!(stats.per_question.len(), 3);
        assert_eq!(stats.per_question[0].facility, 0.0);
        assert!(stats.per_topic.is_empty());
        assert_eq!(stats.grade_distribution.values().sum::<usize>(), 0);
    }

    #[test]
    fn even_median_averages_middle_pair() {
        let mut results = Vec::new();
        for pct in [40.0, 60.0] {
            let mut r = crate::test_support::blank_result();
            r.overall_result.percentage = pct;
            results.push(r);
        }
        assert_eq!(compute_cohort_stats(&sample_exam(), &results).median_percentage, 50.0);
    }
}
