//! Shared fixtures for unit tests.

use chrono::{TimeZone, Utc};

use crate::model::*;
use crate::submission::*;

fn bullet(bullet: u32, process: &str, marks: u32) -> MarkingBullet {
    MarkingBullet {
        bullet,
        process: process.into(),
        marks,
    }
}

fn illustrative(bullet: u32, answer: &str) -> IllustrativeAnswer {
    IllustrativeAnswer {
        bullet,
        answer: answer.into(),
        answer_latex: None,
        tolerance_range: None,
        acceptable_variations: vec![],
    }
}

/// Two sections, three questions, ten marks.
///
/// - s1 "Algebra": q1 (3 marks, bullets 1+2), q2 (2 marks, bullets 1+1), both tagged "algebra"
/// - s2 "Geometry": q3 (5 marks, bullets 2+2+1), untagged
pub(crate) fn sample_exam() -> Exam {
    let q1 = Question {
        question_id: "q1".into(),
        question_number: 1,
        stem: "Solve 3x + 2 = 11.".into(),
        stem_latex: "Solve $3x + 2 = 11$.".into(),
        marks: 3,
        difficulty: Difficulty::Easy,
        topic: Some("algebra".into()),
        marking_scheme: MarkingScheme {
            max_marks: 3,
            generic_scheme: vec![
                bullet(1, "sets up equation", 1),
                bullet(2, "solves correctly", 2),
            ],
            illustrative_scheme: vec![
                illustrative(1, "3x + 2 = 11"),
                IllustrativeAnswer {
                    tolerance_range: Some([3.0, 3.0]),
                    acceptable_variations: vec!["x=3.0".into()],
                    ..illustrative(2, "x = 3")
                },
            ],
        },
    };

    let q2 = Question {
        question_id: "q2".into(),
        question_number: 2,
        stem: "Expand and simplify 2(x + 3) + 3x - 5.".into(),
        stem_latex: "Expand and simplify $2(x + 3) + 3x - 5$.".into(),
        marks: 2,
        difficulty: Difficulty::Medium,
        topic: Some("algebra".into()),
        marking_scheme: MarkingScheme {
            max_marks: 2,
            generic_scheme: vec![bullet(1, "expands brackets", 1), bullet(2, "simplifies", 1)],
            illustrative_scheme: vec![
                illustrative(1, "2x + 6"),
                IllustrativeAnswer {
                    acceptable_variations: vec!["1 + 5x".into()],
                    ..illustrative(2, "5x + 1")
                },
            ],
        },
    };

    let q3 = Question {
        question_id: "q3".into(),
        question_number: 3,
        stem: "A right-angled triangle has shorter sides 6 cm and 8 cm. Find the hypotenuse.".into(),
        stem_latex: String::new(),
        marks: 5,
        difficulty: Difficulty::Hard,
        topic: None,
        marking_scheme: MarkingScheme {
            max_marks: 5,
            generic_scheme: vec![
                bullet(1, "uses Pythagoras' theorem", 2),
                bullet(2, "calculates hypotenuse", 2),
                bullet(3, "states units", 1),
            ],
            illustrative_scheme: vec![
                IllustrativeAnswer {
                    acceptable_variations: vec!["6^2 + 8^2".into()],
                    ..illustrative(1, "a^2 + b^2 = c^2")
                },
                IllustrativeAnswer {
                    tolerance_range: Some([9.95, 10.05]),
                    ..illustrative(2, "10")
                },
                illustrative(3, "cm"),
            ],
        },
    };

    Exam {
        schema_version: SCHEMA_VERSION,
        exam_id: "nat5-maths-001".into(),
        course_id: "nat5-maths".into(),
        subject: "Mathematics".into(),
        level: "National 5".into(),
        status: ExamStatus::Published,
        metadata: ExamMetadata {
            total_marks: 10,
            duration_minutes: 45,
            calculator_allowed: true,
        },
        sections: vec![
            Section {
                section_id: "s1".into(),
                section_name: "Algebra".into(),
                total_marks: 5,
                questions: vec![q1, q2],
            },
            Section {
                section_id: "s2".into(),
                section_name: "Geometry".into(),
                total_marks: 5,
                questions: vec![q3],
            },
        ],
        topic_coverage: vec!["algebra".into(), "geometry".into()],
        template_sources: vec!["tpl-linear-eq".into(), "tpl-expand".into(), "tpl-pythag".into()],
        difficulty_distribution: DifficultyDistribution {
            easy: 1,
            medium: 1,
            hard: 1,
        },
    }
}

pub(crate) fn answer(question_id: &str, question_number: u32, response: &str) -> StudentAnswer {
    StudentAnswer {
        question_id: question_id.into(),
        question_number,
        response_text: response.into(),
        response_with_images: vec![],
        working_shown: None,
    }
}

/// A fully correct attempt at `sample_exam`.
pub(crate) fn sample_submission() -> ExamSubmission {
    ExamSubmission {
        schema_version: SCHEMA_VERSION,
        submission_id: "sub-001".into(),
        exam_id: "nat5-maths-001".into(),
        student_id: "student-42".into(),
        answers: vec![
            answer("q1", 1, "3x + 2 = 11 so 3x = 9 and x = 3"),
            answer("q2", 2, "2x + 6 + 3x - 5 = 5x + 1"),
            answer("q3", 3, "6^2 + 8^2 = c^2 = 100, c = 10 cm"),
        ],
        exam_metadata: SubmissionMetadata {
            started_at: Utc.with_ymd_and_hms(2025, 5, 12, 9, 0, 0).unwrap(),
            questions_attempted: 3,
        },
    }
}

/// An evaluation result with no questions, for statistics that only read the overall block.
pub(crate) fn blank_result() -> crate::results::EvaluationResult {
    use crate::grading::{Grade, GradeBandTable};
    use crate::results::{EvaluationResult, OverallResult};

    EvaluationResult {
        schema_version: SCHEMA_VERSION,
        evaluation_id: uuid::Uuid::nil(),
        submission_id: "blank".into(),
        overall_result: OverallResult {
            marks_earned: 0,
            marks_possible: 10,
            percentage: 0.0,
            grade: Grade::NoAward,
            grade_band: GradeBandTable::default(),
        },
        question_feedback: vec![],
        section_results: vec![],
        topic_coverage: vec![],
        learning_recommendations: vec![],
        encouragement_message: String::new(),
    }
}
