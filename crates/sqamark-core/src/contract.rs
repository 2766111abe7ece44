//! Structural and cross-reference validation of exams and submissions.
//!
//! Every check runs; violations are collected and returned together so the
//! author can fix all of them before resubmitting.

use std::collections::HashSet;

use crate::error::{ContractError, Violation};
use crate::grading::{percentage, resolve_grade};
use crate::model::{Difficulty, DifficultyDistribution, Exam, ExamStatus, SCHEMA_VERSION};
use crate::results::EvaluationResult;
use crate::submission::ExamSubmission;

/// Validate an authored exam document.
pub fn validate_exam(exam: &Exam) -> Result<(), ContractError> {
    ContractError::check("exam", exam_violations(exam))
}

/// Collect every structural violation in an exam without failing.
pub fn exam_violations(exam: &Exam) -> Vec<Violation> {
    let mut violations = Vec::new();

    if exam.schema_version != SCHEMA_VERSION {
        violations.push(Violation::structural(
            "schema_version",
            format!(
                "unsupported schema version {} (expected {SCHEMA_VERSION})",
                exam.schema_version
            ),
        ));
    }

    for (field, value) in [("exam_id", &exam.exam_id), ("course_id", &exam.course_id)] {
        if value.trim().is_empty() {
            violations.push(Violation::structural(field, "must not be empty"));
        }
    }

    if exam.metadata.total_marks == 0 {
        violations.push(Violation::structural(
            "metadata.total_marks",
            "must be a positive integer",
        ));
    }
    if exam.metadata.duration_minutes == 0 {
        violations.push(Violation::structural(
            "metadata.duration_minutes",
            "must be a positive integer",
        ));
    }

    if exam.sections.is_empty() {
        violations.push(Violation::structural("sections", "exam has no sections"));
    }

    let mut section_ids = HashSet::new();
    let mut question_ids = HashSet::new();
    let mut actual = DifficultyDistribution::default();

    for (si, section) in exam.sections.iter().enumerate() {
        let spath = format!("sections[{si}]");

        if !section_ids.insert(section.section_id.as_str()) {
            violations.push(Violation::structural(
                format!("{spath}.section_id"),
                format!("duplicate section_id '{}'", section.section_id),
            ));
        }
        if section.total_marks == 0 {
            violations.push(Violation::structural(
                format!("{spath}.total_marks"),
                "must be a positive integer",
            ));
        }
        if section.questions.is_empty() {
            violations.push(Violation::structural(
                format!("{spath}.questions"),
                "section has no questions",
            ));
        }

        let question_sum: u64 = section.questions.iter().map(|q| u64::from(q.marks)).sum();
        if question_sum != u64::from(section.total_marks) {
            violations.push(Violation::structural(
                format!("{spath}.total_marks"),
                format!(
                    "section total {} does not equal the sum of its question marks {question_sum}",
                    section.total_marks
                ),
            ));
        }

        check_question_numbering(&spath, section, &mut violations);

        for (qi, question) in section.questions.iter().enumerate() {
            let qpath = format!("{spath}.questions[{qi}]");

            if !question_ids.insert(question.question_id.as_str()) {
                violations.push(Violation::structural(
                    format!("{qpath}.question_id"),
                    format!("duplicate question_id '{}'", question.question_id),
                ));
            }
            if question.marks == 0 {
                violations.push(Violation::structural(
                    format!("{qpath}.marks"),
                    "must be a positive integer",
                ));
            }
            match question.difficulty {
                Difficulty::Easy => actual.easy += 1,
                Difficulty::Medium => actual.medium += 1,
                Difficulty::Hard => actual.hard += 1,
            }

            check_marking_scheme(&qpath, question, &mut violations);
        }
    }

    let section_sum: u64 = exam.sections.iter().map(|s| u64::from(s.total_marks)).sum();
    if section_sum != u64::from(exam.metadata.total_marks) {
        violations.push(Violation::structural(
            "metadata.total_marks",
            format!(
                "exam total {} does not equal the sum of section totals {section_sum}",
                exam.metadata.total_marks
            ),
        ));
    }

    let declared = exam.difficulty_distribution;
    if declared.total() as usize != exam.question_count() {
        violations.push(Violation::structural(
            "difficulty_distribution",
            format!(
                "counts sum to {} but the exam has {} question(s)",
                declared.total(),
                exam.question_count()
            ),
        ));
    }
    for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
        if declared.count(difficulty) != actual.count(difficulty) {
            violations.push(Violation::structural(
                format!("difficulty_distribution.{difficulty}"),
                format!(
                    "declares {} but {} question(s) are {difficulty}",
                    declared.count(difficulty),
                    actual.count(difficulty)
                ),
            ));
        }
    }

    violations
}

fn check_question_numbering(
    spath: &str,
    section: &crate::model::Section,
    violations: &mut Vec<Violation>,
) {
    let numbers: Vec<u32> = section.questions.iter().map(|q| q.question_number).collect();
    if numbers.iter().any(|&n| n == 0) {
        violations.push(Violation::structural(
            format!("{spath}.questions"),
            "question_number is 1-based; found 0",
        ));
    }
    let mut seen = HashSet::new();
    for n in &numbers {
        if !seen.insert(n) {
            violations.push(Violation::structural(
                format!("{spath}.questions"),
                format!("duplicate question_number {n}"),
            ));
        }
    }
    if numbers.windows(2).any(|w| w[1] != w[0] + 1) {
        violations.push(Violation::structural(
            format!("{spath}.questions"),
            format!("question numbers {numbers:?} are not a contiguous ascending sequence"),
        ));
    }
}

fn check_marking_scheme(
    qpath: &str,
    question: &crate::model::Question,
    violations: &mut Vec<Violation>,
) {
    let scheme = &question.marking_scheme;
    let mpath = format!("{qpath}.marking_scheme");

    if scheme.max_marks != question.marks {
        violations.push(Violation::structural(
            format!("{mpath}.max_marks"),
            format!(
                "max_marks {} does not equal question marks {}",
                scheme.max_marks, question.marks
            ),
        ));
    }
    if scheme.generic_scheme.is_empty() {
        violations.push(Violation::structural(
            format!("{mpath}.generic_scheme"),
            "at least one marking bullet is required",
        ));
    }
    if scheme.illustrative_scheme.is_empty() {
        violations.push(Violation::structural(
            format!("{mpath}.illustrative_scheme"),
            "at least one illustrative answer is required",
        ));
    }

    let bullet_sum = scheme.bullet_total();
    if bullet_sum != u64::from(scheme.max_marks) {
        violations.push(Violation::structural(
            format!("{mpath}.generic_scheme"),
            format!(
                "bullet marks sum to {bullet_sum} but max_marks is {}",
                scheme.max_marks
            ),
        ));
    }

    let mut bullets = HashSet::new();
    for (bi, bullet) in scheme.generic_scheme.iter().enumerate() {
        let bpath = format!("{mpath}.generic_scheme[{bi}]");
        if bullet.bullet == 0 {
            violations.push(Violation::structural(
                format!("{bpath}.bullet"),
                "bullet numbers are 1-based",
            ));
        }
        if !bullets.insert(bullet.bullet) {
            violations.push(Violation::structural(
                format!("{bpath}.bullet"),
                format!("duplicate bullet number {}", bullet.bullet),
            ));
        }
        if bullet.marks == 0 {
            violations.push(Violation::structural(
                format!("{bpath}.marks"),
                "must be a positive integer",
            ));
        }
    }

    for (ii, entry) in scheme.illustrative_scheme.iter().enumerate() {
        let ipath = format!("{mpath}.illustrative_scheme[{ii}]");
        if !bullets.contains(&entry.bullet) {
            violations.push(Violation::structural(
                format!("{ipath}.bullet"),
                format!("refers to bullet {} which is not in the generic scheme", entry.bullet),
            ));
        }
        if let Some([low, high]) = entry.tolerance_range {
            if !(low.is_finite() && high.is_finite()) || low > high {
                violations.push(Violation::structural(
                    format!("{ipath}.tolerance_range"),
                    format!("[{low}, {high}] is not a valid inclusive interval"),
                ));
            }
        }
    }
}

/// Validate a submission against the exam it claims to answer.
///
/// Structural problems within the submission and cross-reference failures
/// against the exam are reported together.
pub fn validate_submission(submission: &ExamSubmission, exam: &Exam) -> Result<(), ContractError> {
    ContractError::check("submission", submission_violations(submission, exam))
}

pub fn submission_violations(submission: &ExamSubmission, exam: &Exam) -> Vec<Violation> {
    let mut violations = Vec::new();

    if submission.schema_version != SCHEMA_VERSION {
        violations.push(Violation::structural(
            "schema_version",
            format!(
                "unsupported schema version {} (expected {SCHEMA_VERSION})",
                submission.schema_version
            ),
        ));
    }
    if submission.submission_id.trim().is_empty() {
        violations.push(Violation::structural("submission_id", "must not be empty"));
    }

    if submission.exam_id != exam.exam_id {
        violations.push(Violation::cross_reference(
            "exam_id",
            format!(
                "submission references exam '{}' but was checked against '{}'",
                submission.exam_id, exam.exam_id
            ),
        ));
    }
    if exam.status != ExamStatus::Published {
        violations.push(Violation::cross_reference(
            "exam_id",
            format!("exam '{}' is {}, not published", exam.exam_id, exam.status),
        ));
    }

    let mut seen = HashSet::new();
    for (ai, answer) in submission.answers.iter().enumerate() {
        let apath = format!("answers[{ai}]");
        if !seen.insert(answer.question_id.as_str()) {
            violations.push(Violation::structural(
                format!("{apath}.question_id"),
                format!("duplicate answer for question '{}'", answer.question_id),
            ));
        }
        match exam.find_question(&answer.question_id) {
            None => violations.push(Violation::cross_reference(
                format!("{apath}.question_id"),
                format!("question '{}' does not exist in exam '{}'", answer.question_id, exam.exam_id),
            )),
            Some(q) if q.question_number != answer.question_number => {
                violations.push(Violation::structural(
                    format!("{apath}.question_number"),
                    format!(
                        "question '{}' is number {}, answer says {}",
                        answer.question_id, q.question_number, answer.question_number
                    ),
                ))
            }
            Some(_) => {}
        }
    }

    violations
}

/// Find the exam a submission references in a catalog and validate against it.
pub fn validate_submission_in<'a>(
    submission: &ExamSubmission,
    exams: &'a [Exam],
) -> Result<&'a Exam, ContractError> {
    let Some(exam) = exams.iter().find(|e| e.exam_id == submission.exam_id) else {
        return Err(ContractError::new(
            "submission",
            vec![Violation::cross_reference(
                "exam_id",
                format!("exam '{}' does not exist", submission.exam_id),
            )],
        ));
    };
    validate_submission(submission, exam)?;
    Ok(exam)
}

/// Validate a stored evaluation result before it is compared or aggregated.
pub fn validate_result(result: &EvaluationResult) -> Result<(), ContractError> {
    ContractError::check("evaluation result", result_violations(result))
}

/// Schema version and mark arithmetic of an evaluation result, checked
/// bullet -> question -> overall and section -> overall.
pub fn result_violations(result: &EvaluationResult) -> Vec<Violation> {
    let mut violations = Vec::new();

    if result.schema_version != SCHEMA_VERSION {
        violations.push(Violation::structural(
            "schema_version",
            format!(
                "unsupported schema version {} (expected {SCHEMA_VERSION})",
                result.schema_version
            ),
        ));
    }

    let mut question_ids = HashSet::new();
    for (qi, question) in result.question_feedback.iter().enumerate() {
        let qpath = format!("question_feedback[{qi}]");
        if !question_ids.insert(question.question_id.as_str()) {
            violations.push(Violation::structural(
                format!("{qpath}.question_id"),
                format!("duplicate question_id '{}'", question.question_id),
            ));
        }
        for (bi, bullet) in question.bullet_marks.iter().enumerate() {
            if bullet.marks_earned > bullet.marks_possible {
                violations.push(Violation::structural(
                    format!("{qpath}.bullet_marks[{bi}].marks_earned"),
                    format!(
                        "{} exceeds marks_possible {}",
                        bullet.marks_earned, bullet.marks_possible
                    ),
                ));
            }
        }
        let bullet_possible: u64 = question
            .bullet_marks
            .iter()
            .map(|b| u64::from(b.marks_possible))
            .sum();
        if bullet_possible != u64::from(question.marks_possible) {
            violations.push(Violation::structural(
                format!("{qpath}.marks_possible"),
                format!(
                    "{} does not equal the sum of bullet marks_possible {bullet_possible}",
                    question.marks_possible
                ),
            ));
        }
        if question.bullet_total() != u64::from(question.marks_earned) {
            violations.push(Violation::structural(
                format!("{qpath}.marks_earned"),
                format!(
                    "{} does not equal the sum of bullet marks {}",
                    question.marks_earned,
                    question.bullet_total()
                ),
            ));
        }
        if question.marks_earned > question.marks_possible {
            violations.push(Violation::structural(
                format!("{qpath}.marks_earned"),
                format!("exceeds marks_possible {}", question.marks_possible),
            ));
        }
    }

    let overall = &result.overall_result;
    let totals = [
        (
            "question_feedback",
            sum_marks(result.question_feedback.iter().map(|q| q.marks_earned)),
            sum_marks(result.question_feedback.iter().map(|q| q.marks_possible)),
        ),
        (
            "section_results",
            sum_marks(result.section_results.iter().map(|s| s.marks_earned)),
            sum_marks(result.section_results.iter().map(|s| s.marks_possible)),
        ),
    ];
    for (path, earned, possible) in totals {
        if earned != u64::from(overall.marks_earned) {
            violations.push(Violation::structural(
                path,
                format!(
                    "marks_earned sum to {earned} but overall_result.marks_earned is {}",
                    overall.marks_earned
                ),
            ));
        }
        if possible != u64::from(overall.marks_possible) {
            violations.push(Violation::structural(
                path,
                format!(
                    "marks_possible sum to {possible} but overall_result.marks_possible is {}",
                    overall.marks_possible
                ),
            ));
        }
    }

    let expected = percentage(overall.marks_earned, overall.marks_possible);
    if (overall.percentage - expected).abs() > 0.05 {
        violations.push(Violation::structural(
            "overall_result.percentage",
            format!("{} does not match {expected} computed from marks", overall.percentage),
        ));
    }
    let grade = resolve_grade(overall.percentage, &overall.grade_band);
    if grade != overall.grade {
        violations.push(Violation::structural(
            "overall_result.grade",
            format!("{} does not match {grade} resolved from the grade band", overall.grade),
        ));
    }

    violations
}

fn sum_marks(marks: impl Iterator<Item = u32>) -> u64 {
    marks.map(u64::from).sum()
}
