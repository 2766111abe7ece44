//! The marking engine.
//!
//! Turns a submission plus its source exam into bullet marks, question and
//! section totals, an overall percentage and grade, and learning
//! recommendations. Bullet judgments are delegated to a [`BulletJudge`]; every
//! other step is deterministic.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::contract::{validate_exam, validate_submission};
use crate::error::{EvaluationError, JudgeError};
use crate::grading::{percentage, resolve_grade, Grade, GradeBandTable};
use crate::mastery::{derive_recommendations, MasteryThresholds};
use crate::model::{Exam, MarkingBullet, Question};
use crate::results::{BulletMark, EvaluationResult, OverallResult, QuestionResult, SectionResult};
use crate::submission::{ExamSubmission, StudentAnswer};
use crate::traits::{BulletJudge, JudgeRequest};

/// Namespace for deterministic evaluation ids (UUIDv5 of exam and submission ids).
const EVALUATION_NAMESPACE: Uuid = Uuid::from_u128(0x5a6d_2f3e_8c41_4b7a_9e0d_71c3_a2b4_f605);

/// Configuration for the marking engine.
#[derive(Debug, Clone)]
pub struct MarkingEngineConfig {
    /// Grade thresholds for this exam's qualification level.
    pub grade_bands: GradeBandTable,
    /// Mastery cut points for learning recommendations.
    pub mastery: MasteryThresholds,
    /// Upper bound on a single bullet judgment.
    pub judge_timeout: Duration,
    /// Maximum concurrent bullet judgments.
    pub parallelism: usize,
    /// Emit a recommendation for every topic, not only those below "secure".
    pub full_topic_coverage: bool,
}

impl Default for MarkingEngineConfig {
    fn default() -> Self {
        Self {
            grade_bands: GradeBandTable::default(),
            mastery: MasteryThresholds::default(),
            judge_timeout: Duration::from_secs(30),
            parallelism: 4,
            full_topic_coverage: false,
        }
    }
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_question_marked(&self, submission_id: &str, result: &QuestionResult);
    fn on_bullet_ungraded(&self, submission_id: &str, question_id: &str, bullet: u32, error: &str);
    fn on_evaluation_complete(&self, result: &EvaluationResult);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_question_marked(&self, _: &str, _: &QuestionResult) {}
    fn on_bullet_ungraded(&self, _: &str, _: &str, _: u32, _: &str) {}
    fn on_evaluation_complete(&self, _: &EvaluationResult) {}
}

/// The marking engine.
pub struct MarkingEngine {
    judge: Arc<dyn BulletJudge>,
    config: MarkingEngineConfig,
}

impl MarkingEngine {
    pub fn new(judge: Arc<dyn BulletJudge>, config: MarkingEngineConfig) -> Self {
        Self { judge, config }
    }

    pub fn config(&self) -> &MarkingEngineConfig {
        &self.config
    }

    pub fn judge_name(&self) -> &str {
        self.judge.name()
    }

    /// Grade one submission against its exam.
    pub async fn evaluate(
        &self,
        exam: &Exam,
        submission: &ExamSubmission,
    ) -> Result<EvaluationResult, EvaluationError> {
        self.evaluate_with_progress(exam, submission, &NoopReporter)
            .await
    }

    pub async fn evaluate_with_progress(
        &self,
        exam: &Exam,
        submission: &ExamSubmission,
        progress: &dyn ProgressReporter,
    ) -> Result<EvaluationResult, EvaluationError> {
        validate_exam(exam)?;
        validate_submission(submission, exam)?;

        let semaphore = Semaphore::new(self.config.parallelism.max(1));

        let question_feedback = join_all(exam.questions().map(|question| {
            let answer = submission.answer_for(&question.question_id);
            let semaphore = &semaphore;
            async move {
                let result = self
                    .mark_question(question, answer, semaphore, &submission.submission_id, progress)
                    .await;
                progress.on_question_marked(&submission.submission_id, &result);
                result
            }
        }))
        .await;

        let result = assemble(exam, submission, question_feedback, &self.config)?;
        tracing::info!(
            submission_id = %submission.submission_id,
            marks = result.overall_result.marks_earned,
            grade = %result.overall_result.grade,
            "evaluation complete"
        );
        progress.on_evaluation_complete(&result);
        Ok(result)
    }

    /// Grade several independent submissions to the same exam, preserving input order.
    pub async fn evaluate_batch(
        &self,
        exam: &Exam,
        submissions: &[ExamSubmission],
        progress: &dyn ProgressReporter,
    ) -> Vec<Result<EvaluationResult, EvaluationError>> {
        join_all(
            submissions
                .iter()
                .map(|submission| self.evaluate_with_progress(exam, submission, progress)),
        )
        .await
    }

    async fn mark_question(
        &self,
        question: &Question,
        answer: Option<&StudentAnswer>,
        semaphore: &Semaphore,
        submission_id: &str,
        progress: &dyn ProgressReporter,
    ) -> QuestionResult {
        let scheme = &question.marking_scheme;

        let Some(answer) = answer.filter(|a| !a.is_blank()) else {
            tracing::debug!(question_id = %question.question_id, "not attempted");
            return not_attempted(question);
        };

        let bullet_marks = join_all(scheme.generic_scheme.iter().map(|bullet| {
            let request = JudgeRequest {
                question_id: question.question_id.clone(),
                stem: question.stem.clone(),
                response_text: answer.response_text.clone(),
                working_shown: answer.working_shown.clone(),
                bullet: bullet.clone(),
                candidates: scheme.illustrative_for(bullet.bullet),
            };
            async move {
                let mark = self.judge_bullet(&request, semaphore).await;
                if mark.ungraded {
                    progress.on_bullet_ungraded(
                        submission_id,
                        &request.question_id,
                        bullet.bullet,
                        &mark.feedback,
                    );
                }
                mark
            }
        }))
        .await;

        let marks_earned = bullet_marks.iter().map(|b| b.marks_earned).sum();
        let overall_feedback = question_feedback(question, &bullet_marks, marks_earned);
        tracing::debug!(
            question_id = %question.question_id,
            marks_earned,
            marks_possible = question.marks,
            "question marked"
        );

        QuestionResult {
            question_id: question.question_id.clone(),
            marks_earned,
            marks_possible: question.marks,
            bullet_marks,
            overall_feedback,
        }
    }

    async fn judge_bullet(&self, request: &JudgeRequest, semaphore: &Semaphore) -> BulletMark {
        let bullet = &request.bullet;
        // The semaphore is never closed, so a failed acquire only drops the concurrency bound.
        let _permit = semaphore.acquire().await.ok();

        let outcome = match tokio::time::timeout(self.config.judge_timeout, self.judge.judge(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(JudgeError::Timeout(self.config.judge_timeout)),
        };

        match outcome {
            Ok(verdict) => {
                let feedback = if verdict.rationale.trim().is_empty() {
                    default_rationale(bullet, verdict.awarded)
                } else {
                    verdict.rationale
                };
                BulletMark {
                    bullet: bullet.bullet,
                    marks_earned: if verdict.awarded { bullet.marks } else { 0 },
                    marks_possible: bullet.marks,
                    feedback,
                    ungraded: false,
                }
            }
            Err(e) => {
                tracing::warn!(
                    question_id = %request.question_id,
                    bullet = bullet.bullet,
                    judge = self.judge.name(),
                    "bullet left ungraded: {e}"
                );
                ungraded(bullet, &e)
            }
        }
    }
}

fn not_attempted(question: &Question) -> QuestionResult {
    let bullet_marks = question
        .marking_scheme
        .generic_scheme
        .iter()
        .map(|b| BulletMark {
            bullet: b.bullet,
            marks_earned: 0,
            marks_possible: b.marks,
            feedback: "Not attempted: no response was given for this question.".into(),
            ungraded: false,
        })
        .collect();
    QuestionResult {
        question_id: question.question_id.clone(),
        marks_earned: 0,
        marks_possible: question.marks,
        bullet_marks,
        overall_feedback: format!("Not attempted: 0/{} marks.", question.marks),
    }
}

fn ungraded(bullet: &MarkingBullet, error: &JudgeError) -> BulletMark {
    BulletMark {
        bullet: bullet.bullet,
        marks_earned: 0,
        marks_possible: bullet.marks,
        feedback: format!(
            "Not graded ({error}). This bullet scores 0 until it is reviewed by a marker."
        ),
        ungraded: true,
    }
}

fn default_rationale(bullet: &MarkingBullet, awarded: bool) -> String {
    if awarded {
        format!("Awarded: {}.", bullet.process)
    } else {
        format!("Not awarded: {}.", bullet.process)
    }
}

fn question_feedback(question: &Question, marks: &[BulletMark], earned: u32) -> String {
    if earned == question.marks {
        return format!("Full marks ({earned}/{}).", question.marks);
    }

    let mut feedback = format!("{earned}/{} marks.", question.marks);
    let process_of = |n: u32| {
        question
            .marking_scheme
            .generic_scheme
            .iter()
            .find(|b| b.bullet == n)
            .map(|b| b.process.as_str())
            .unwrap_or("")
    };

    for mark in marks.iter().filter(|m| m.marks_earned == 0) {
        if mark.ungraded {
            feedback.push_str(&format!(
                " Bullet {} ({}) could not be graded automatically and needs review.",
                mark.bullet,
                process_of(mark.bullet)
            ));
        } else {
            feedback.push_str(&format!(
                " Missed bullet {} ({}): {}",
                mark.bullet,
                process_of(mark.bullet),
                mark.feedback
            ));
        }
    }
    feedback
}

/// Deterministic evaluation id for an (exam, submission) pair.
pub fn evaluation_id(exam_id: &str, submission_id: &str) -> Uuid {
    Uuid::new_v5(&EVALUATION_NAMESPACE, format!("{exam_id}/{submission_id}").as_bytes())
}

fn fault(scope: impl Into<String>, detail: impl Into<String>) -> EvaluationError {
    let err = EvaluationError::AggregationFault {
        scope: scope.into(),
        detail: detail.into(),
    };
    tracing::error!("{err}");
    err
}

/// Sum marks in `u64`, faulting if the total does not fit a mark field.
fn narrow(scope: &str, marks: impl Iterator<Item = u32>) -> Result<u32, EvaluationError> {
    let total: u64 = marks.map(u64::from).sum();
    u32::try_from(total).map_err(|_| fault(scope, format!("mark total {total} overflows")))
}

/// Aggregate question results into an `EvaluationResult`, cross-checking
/// every total two ways.
pub(crate) fn assemble(
    exam: &Exam,
    submission: &ExamSubmission,
    question_feedback: Vec<QuestionResult>,
    config: &MarkingEngineConfig,
) -> Result<EvaluationResult, EvaluationError> {
    if question_feedback.len() != exam.question_count() {
        return Err(fault(
            "exam",
            format!(
                "{} question results for {} questions",
                question_feedback.len(),
                exam.question_count()
            ),
        ));
    }

    for (result, question) in question_feedback.iter().zip(exam.questions()) {
        let scope = format!("question {}", question.question_id);
        if result.question_id != question.question_id {
            return Err(fault(scope, format!("result is for '{}'", result.question_id)));
        }
        if result.marks_possible != question.marks {
            return Err(fault(
                scope,
                format!("marks_possible {} != question marks {}", result.marks_possible, question.marks),
            ));
        }
        if result.bullet_total() != u64::from(result.marks_earned) {
            return Err(fault(
                scope,
                format!(
                    "bullet marks sum to {} but marks_earned is {}",
                    result.bullet_total(),
                    result.marks_earned
                ),
            ));
        }
        if result.marks_earned > result.marks_possible
            || result.bullet_marks.iter().any(|b| b.marks_earned > b.marks_possible)
        {
            return Err(fault(scope, "marks earned exceed marks possible"));
        }
    }

    let mut section_results = Vec::with_capacity(exam.sections.len());
    let mut offset = 0;
    for section in &exam.sections {
        let results = &question_feedback[offset..offset + section.questions.len()];
        offset += section.questions.len();

        let scope = format!("section {}", section.section_id);
        let marks_earned = narrow(&scope, results.iter().map(|r| r.marks_earned))?;
        let computed_possible: u64 = results.iter().map(|r| u64::from(r.marks_possible)).sum();
        if computed_possible != u64::from(section.total_marks) {
            return Err(fault(
                scope,
                format!(
                    "question marks sum to {computed_possible} but section total is {}",
                    section.total_marks
                ),
            ));
        }
        section_results.push(SectionResult {
            section_id: section.section_id.clone(),
            section_name: section.section_name.clone(),
            marks_earned,
            marks_possible: section.total_marks,
        });
    }

    let marks_earned = narrow("overall", section_results.iter().map(|s| s.marks_earned))?;
    let question_earned: u64 = question_feedback.iter().map(|q| u64::from(q.marks_earned)).sum();
    if u64::from(marks_earned) != question_earned {
        return Err(fault(
            "overall",
            format!("sections sum to {marks_earned} but questions sum to {question_earned}"),
        ));
    }
    let section_possible: u64 = section_results.iter().map(|s| u64::from(s.marks_possible)).sum();
    let marks_possible = exam.metadata.total_marks;
    if section_possible != u64::from(marks_possible) {
        return Err(fault(
            "overall",
            format!("section totals sum to {section_possible} but exam total is {marks_possible}"),
        ));
    }

    let pct = percentage(marks_earned, marks_possible);
    let grade = resolve_grade(pct, &config.grade_bands);
    let learning_recommendations = derive_recommendations(
        exam,
        &question_feedback,
        &config.mastery,
        config.full_topic_coverage,
    );
    let ungraded = question_feedback
        .iter()
        .map(|q| q.ungraded_bullets().count())
        .sum();

    Ok(EvaluationResult {
        schema_version: crate::model::SCHEMA_VERSION,
        evaluation_id: evaluation_id(&exam.exam_id, &submission.submission_id),
        submission_id: submission.submission_id.clone(),
        overall_result: OverallResult {
            marks_earned,
            marks_possible,
            percentage: pct,
            grade,
            grade_band: config.grade_bands,
        },
        question_feedback,
        section_results,
        topic_coverage: exam.topic_coverage.clone(),
        learning_recommendations,
        encouragement_message: encouragement(grade, pct, &config.grade_bands, ungraded),
    })
}

fn encouragement(grade: Grade, pct: f64, bands: &GradeBandTable, ungraded: usize) -> String {
    let mut message = match (grade, bands.next_grade(pct)) {
        (Grade::A, _) | (_, None) => {
            format!("Excellent work! {pct:.1}% is grade A. Keep stretching yourself with the hardest questions.")
        }
        (Grade::NoAward, Some((next, threshold))) => format!(
            "You scored {pct:.1}%. Every mark counts: {:.1}% more reaches grade {next}. Focus on the recommendations below and try again.",
            threshold - pct
        ),
        (_, Some((next, threshold))) => format!(
            "Well done, {pct:.1}% is grade {grade}. You are {:.1}% away from grade {next}; the recommendations below show where to find those marks.",
            threshold - pct
        ),
    };
    if ungraded > 0 {
        message.push_str(&format!(
            " {ungraded} marking step(s) are awaiting review, so your score may go up."
        ));
    }
    message
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::ContractError;
    use crate::matching::IllustrativeJudge;
    use crate::results::BulletMark;
    use crate::test_support::{answer, sample_exam, sample_submission};
    use crate::traits::JudgeVerdict;

    /// Scripted judge: per (question, bullet) outcomes, awarding everything else.
    #[derive(Default)]
    struct ScriptedJudge {
        withheld: Vec<(&'static str, u32)>,
        failures: Vec<(&'static str, u32)>,
        calls: AtomicU32,
        seen: Mutex<Vec<(String, u32)>>,
    }

    #[async_trait]
    impl BulletJudge for ScriptedJudge {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn judge(&self, request: &JudgeRequest) -> Result<JudgeVerdict, JudgeError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let hit = |list: &[(&str, u32)]| {
                list.iter()
                    .any(|(q, b)| *q == request.question_id && *b == request.bullet.bullet)
            };
            self.seen
                .lock()
                .unwrap()
                .push((request.question_id.clone(), request.bullet.bullet));
            if hit(&self.failures) {
                return Err(JudgeError::ApiError {
                    status: 500,
                    message: "upstream exploded".into(),
                });
            }
            if hit(&self.withheld) {
                return Ok(JudgeVerdict::withheld("step not shown"));
            }
            Ok(JudgeVerdict::awarded("step shown"))
        }
    }

    struct SlowJudge;

    #[async_trait]
    impl BulletJudge for SlowJudge {
        fn name(&self) -> &str {
            "slow"
        }

        async fn judge(&self, request: &JudgeRequest) -> Result<JudgeVerdict, JudgeError> {
            if request.question_id == "q2" {
                tokio::time::sleep(Duration::from_secs(600)).await;
            }
            Ok(JudgeVerdict::awarded("ok"))
        }
    }

    fn engine(judge: Arc<dyn BulletJudge>) -> MarkingEngine {
        MarkingEngine::new(judge, MarkingEngineConfig::default())
    }

    fn assert_consistent(result: &EvaluationResult) {
        for q in &result.question_feedback {
            assert!(q.marks_earned <= q.marks_possible);
            assert_eq!(u64::from(q.marks_earned), q.bullet_total());
            assert!(!q.overall_feedback.is_empty());
            assert!(q.bullet_marks.iter().all(|b| !b.feedback.is_empty()));
        }
        let sections: u32 = result.section_results.iter().map(|s| s.marks_earned).sum();
        let questions: u32 = result.question_feedback.iter().map(|q| q.marks_earned).sum();
        assert_eq!(result.overall_result.marks_earned, sections);
        assert_eq!(sections, questions);
        assert!(!result.encouragement_message.is_empty());
    }

    #[tokio::test]
    async fn full_marks_with_rule_judge() {
        let result = engine(Arc::new(IllustrativeJudge))
            .evaluate(&sample_exam(), &sample_submission())
            .await
            .unwrap();

        assert_consistent(&result);
        assert_eq!(result.overall_result.marks_earned, 10);
        assert_eq!(result.overall_result.marks_possible, 10);
        assert_eq!(result.overall_result.percentage, 100.0);
        assert_eq!(result.overall_result.grade, Grade::A);
        assert_eq!(result.overall_result.grade_band, GradeBandTable::default());
        assert!(result.learning_recommendations.is_empty());
        assert_eq!(result.topic_coverage, vec!["algebra", "geometry"]);
        assert_eq!(result.section_results[0].section_name, "Algebra");
    }

    #[tokio::test]
    async fn partial_credit_on_two_bullet_question() {
        let mut submission = sample_submission();
        submission.answers[0].response_text = "3x + 2 = 11, x = 4".into();

        let result = engine(Arc::new(IllustrativeJudge))
            .evaluate(&sample_exam(), &submission)
            .await
            .unwrap();

        let q1 = result.question("q1").unwrap();
        assert_eq!(q1.marks_earned, 1);
        assert_eq!(q1.marks_possible, 3);
        assert_eq!(
            q1.bullet_marks
                .iter()
                .map(|b| (b.bullet, b.marks_earned, b.marks_possible))
                .collect::<Vec<_>>(),
            vec![(1, 1, 1), (2, 0, 2)]
        );
        assert!(q1.overall_feedback.contains("Missed bullet 2 (solves correctly)"));
        assert_consistent(&result);
        assert_eq!(result.overall_result.marks_earned, 8);
    }

    #[tokio::test]
    async fn omitted_answer_is_not_attempted() {
        let mut submission = sample_submission();
        submission.answers.retain(|a| a.question_id != "q2");
        let judge = Arc::new(ScriptedJudge::default());

        let result = engine(judge.clone())
            .evaluate(&sample_exam(), &submission)
            .await
            .unwrap();

        let q2 = result.question("q2").unwrap();
        assert_eq!(q2.marks_earned, 0);
        assert_eq!(q2.bullet_marks.len(), 2);
        assert!(q2
            .bullet_marks
            .iter()
            .all(|b| b.marks_earned == 0 && b.feedback.to_lowercase().contains("not attempted")));
        assert_eq!(result.question("q1").unwrap().marks_earned, 3);
        assert_eq!(result.question("q3").unwrap().marks_earned, 5);
        // q1 has 2 bullets, q3 has 3; q2 never reaches the judge
        assert_eq!(judge.calls.load(Ordering::Relaxed), 5);
        assert!(judge.seen.lock().unwrap().iter().all(|(q, _)| q != "q2"));
        assert_eq!(result.question_feedback.len(), 3);
    }

    #[tokio::test]
    async fn blank_response_is_not_attempted_but_working_is_marked() {
        let mut submission = sample_submission();
        submission.answers[0].response_text = "  ".into();
        submission.answers[1] = StudentAnswer {
            working_shown: Some("2x + 6 + 3x - 5".into()),
            ..answer("q2", 2, "")
        };

        let result = engine(Arc::new(IllustrativeJudge))
            .evaluate(&sample_exam(), &submission)
            .await
            .unwrap();

        assert!(result.question("q1").unwrap().overall_feedback.starts_with("Not attempted"));
        let q2 = result.question("q2").unwrap();
        assert_eq!(q2.bullet_marks[0].marks_earned, 1);
        assert!(q2.bullet_marks[0].feedback.contains("working shown"));
        assert_eq!(q2.bullet_marks[1].marks_earned, 0);
    }

    #[tokio::test]
    async fn judge_failure_leaves_bullet_ungraded() {
        let judge = Arc::new(ScriptedJudge {
            failures: vec![("q3", 2)],
            withheld: vec![("q1", 2)],
            ..Default::default()
        });

        let result = engine(judge)
            .evaluate(&sample_exam(), &sample_submission())
            .await
            .unwrap();

        assert_consistent(&result);
        let q3 = result.question("q3").unwrap();
        assert_eq!(q3.marks_earned, 3);
        assert!(q3.bullet_marks[1].ungraded);
        assert!(q3.bullet_marks[1].feedback.contains("upstream exploded"));
        assert!(q3.overall_feedback.contains("needs review"));
        assert_eq!(result.ungraded_count(), 1);
        assert_eq!(result.overall_result.marks_earned, 6);
        assert!(result.encouragement_message.contains("awaiting review"));
    }

    #[tokio::test(start_paused = true)]
    async fn judge_timeout_is_recorded_not_fatal() {
        let config = MarkingEngineConfig {
            judge_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let result = MarkingEngine::new(Arc::new(SlowJudge), config)
            .evaluate(&sample_exam(), &sample_submission())
            .await
            .unwrap();

        let q2 = result.question("q2").unwrap();
        assert_eq!(q2.marks_earned, 0);
        assert!(q2.bullet_marks.iter().all(|b| b.ungraded));
        assert!(q2.bullet_marks[0].feedback.contains("timed out after 5s"));
        assert_eq!(result.question("q1").unwrap().marks_earned, 3);
        assert_eq!(result.question("q3").unwrap().marks_earned, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn sub_second_timeout_is_reported_precisely() {
        let config = MarkingEngineConfig {
            judge_timeout: Duration::from_millis(250),
            ..Default::default()
        };
        let result = MarkingEngine::new(Arc::new(SlowJudge), config)
            .evaluate(&sample_exam(), &sample_submission())
            .await
            .unwrap();

        let q2 = result.question("q2").unwrap();
        assert!(q2.bullet_marks[0].feedback.contains("timed out after 250ms"));
    }

    #[tokio::test]
    async fn evaluation_is_idempotent() {
        let engine = engine(Arc::new(IllustrativeJudge));
        let mut submission = sample_submission();
        submission.answers[2].response_text = "c = 14".into();

        let first = engine.evaluate(&sample_exam(), &submission).await.unwrap();
        let second = engine.evaluate(&sample_exam(), &submission).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.evaluation_id, evaluation_id("nat5-maths-001", "sub-001"));

        submission.submission_id = "sub-002".into();
        let other = engine.evaluate(&sample_exam(), &submission).await.unwrap();
        assert_ne!(first.evaluation_id, other.evaluation_id);
    }

    #[tokio::test]
    async fn recommendations_follow_topic_performance() {
        let judge = Arc::new(ScriptedJudge {
            withheld: vec![("q3", 1), ("q3", 2)],
            ..Default::default()
        });
        let config = MarkingEngineConfig {
            full_topic_coverage: true,
            ..Default::default()
        };
        let result = MarkingEngine::new(judge, config)
            .evaluate(&sample_exam(), &sample_submission())
            .await
            .unwrap();

        assert_eq!(result.overall_result.marks_earned, 6);
        assert_eq!(result.overall_result.grade, Grade::B);
        let topics: Vec<(&str, crate::mastery::MasteryLevel)> = result
            .learning_recommendations
            .iter()
            .map(|r| (r.topic_id.as_str(), r.mastery_level))
            .collect();
        assert_eq!(
            topics,
            vec![
                ("algebra", crate::mastery::MasteryLevel::Secure),
                ("s2", crate::mastery::MasteryLevel::NeedsSupport),
            ]
        );
        assert!(result.encouragement_message.contains("10.0% away from grade A"));
    }

    #[tokio::test]
    async fn contract_violations_stop_grading() {
        let mut exam = sample_exam();
        exam.sections[0].questions[0].marking_scheme.generic_scheme[1].marks = 5;
        let judge = Arc::new(ScriptedJudge::default());

        let err = engine(judge.clone())
            .evaluate(&exam, &sample_submission())
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluationError::Contract(ContractError { .. })));
        assert_eq!(judge.calls.load(Ordering::Relaxed), 0);

        let mut submission = sample_submission();
        submission.answers.push(answer("q1", 1, "again"));
        let err = engine(judge.clone())
            .evaluate(&sample_exam(), &submission)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("duplicate answer"));
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let engine = engine(Arc::new(IllustrativeJudge));
        let mut second = sample_submission();
        second.submission_id = "sub-002".into();
        second.answers.clear();
        let mut third = sample_submission();
        third.exam_id = "other-exam".into();

        let results = engine
            .evaluate_batch(&sample_exam(), &[sample_submission(), second, third], &NoopReporter)
            .await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().overall_result.marks_earned, 10);
        let blank = results[1].as_ref().unwrap();
        assert_eq!(blank.overall_result.marks_earned, 0);
        assert_eq!(blank.overall_result.grade, Grade::NoAward);
        assert!(results[2].is_err());
    }

    #[test]
    fn assemble_detects_inconsistent_totals() {
        let exam = sample_exam();
        let submission = sample_submission();
        let config = MarkingEngineConfig::default();

        let mut feedback: Vec<QuestionResult> = exam.questions().map(not_attempted).collect();
        assemble(&exam, &submission, feedback.clone(), &config).unwrap();

        feedback[0].marks_earned = 2;
        let err = assemble(&exam, &submission, feedback.clone(), &config).unwrap_err();
        assert!(matches!(err, EvaluationError::AggregationFault { .. }));
        assert!(err.to_string().contains("question q1"));

        feedback[0].marks_earned = 0;
        feedback[0].bullet_marks[0] = BulletMark {
            bullet: 1,
            marks_earned: 4,
            marks_possible: 1,
            feedback: "x".into(),
            ungraded: false,
        };
        feedback[0].marks_earned = 4;
        let err = assemble(&exam, &submission, feedback.clone(), &config).unwrap_err();
        assert!(err.to_string().contains("exceed"));

        feedback.pop();
        let err = assemble(&exam, &submission, feedback, &config).unwrap_err();
        assert!(err.to_string().contains("2 question results for 3 questions"));
    }

    #[test]
    fn assemble_detects_section_total_drift() {
        let mut exam = sample_exam();
        exam.sections[1].total_marks = 6;
        let feedback: Vec<QuestionResult> = exam.questions().map(not_attempted).collect();
        let err = assemble(&exam, &sample_submission(), feedback, &MarkingEngineConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("section s2"));
    }

    #[test]
    fn assemble_compares_large_totals_without_wrapping() {
        let mut exam = sample_exam();
        for question in &mut exam.sections[0].questions {
            question.marks = 3_000_000_000;
        }
        // 6_000_000_000 wrapped to u32.
        exam.sections[0].total_marks = 1_705_032_704;
        let feedback: Vec<QuestionResult> = exam.questions().map(not_attempted).collect();

        let err = assemble(&exam, &sample_submission(), feedback, &MarkingEngineConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("section s1"));
        assert!(err.to_string().contains("6000000000"));
    }

    #[test]
    fn narrow_faults_on_overflow() {
        assert_eq!(narrow("overall", [3, 4].into_iter()).unwrap(), 7);
        let err = narrow("overall", [u32::MAX, 1].into_iter()).unwrap_err();
        assert!(err.to_string().contains("mark total 4294967296 overflows"));
    }

    #[test]
    fn not_attempted_shape() {
        let exam = sample_exam();
        let q = not_attempted(exam.find_question("q3").unwrap());
        assert_eq!(q.bullet_marks.len(), 3);
        assert_eq!(q.marks_possible, 5);
        assert_eq!(q.overall_feedback, "Not attempted: 0/5 marks.");
    }

    #[test]
    fn encouragement_varies_by_grade() {
        let bands = GradeBandTable::default();
        assert!(encouragement(Grade::A, 85.0, &bands, 0).starts_with("Excellent"));
        assert!(encouragement(Grade::C, 55.0, &bands, 0).contains("5.0% away from grade B"));
        assert!(encouragement(Grade::NoAward, 30.0, &bands, 2).contains("2 marking step(s)"));
    }
}
