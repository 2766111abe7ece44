//! JSON document ingest.
//!
//! Raw documents are pre-scanned before typed deserialization so shape
//! problems (unknown enum values, non-positive marks, a missing
//! `response_text`, the legacy `answer` field) are reported as aggregated
//! contract violations instead of a single serde error.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::contract::{exam_violations, submission_violations};
use crate::error::{ContractError, Violation};
use crate::model::{Difficulty, Exam, ExamStatus, SCHEMA_VERSION};
use crate::submission::ExamSubmission;

const MARK_FIELDS: [&str; 3] = ["marks", "total_marks", "max_marks"];

/// Parse and structurally validate an exam document.
pub fn parse_exam_str(content: &str) -> Result<Exam, ContractError> {
    let raw: Value = serde_json::from_str(content).map_err(|e| {
        ContractError::new("exam", vec![Violation::structural("$", format!("invalid JSON: {e}"))])
    })?;

    let mut violations = Vec::new();
    check_schema_version(&raw, &mut violations);
    match raw.get("status") {
        Some(Value::String(s)) if ExamStatus::ALL.contains(&s.as_str()) => {}
        Some(other) => violations.push(Violation::structural(
            "status",
            format!("unknown status {other}; expected one of {:?}", ExamStatus::ALL),
        )),
        None => violations.push(Violation::structural("status", "missing required field")),
    }
    scan_marks(&raw, "$", &mut violations);
    scan_difficulties(&raw, &mut violations);
    ContractError::check("exam", violations)?;

    let exam: Exam = serde_json::from_value(raw).map_err(|e| {
        ContractError::new("exam", vec![Violation::structural("$", e.to_string())])
    })?;
    ContractError::check("exam", exam_violations(&exam))?;
    Ok(exam)
}

/// Parse a submission and validate it against the exam it answers.
pub fn parse_submission_str(content: &str, exam: &Exam) -> Result<ExamSubmission, ContractError> {
    let submission = parse_submission_shape(content)?;
    ContractError::check("submission", submission_violations(&submission, exam))?;
    Ok(submission)
}

/// Parse a submission, checking only its own shape.
pub fn parse_submission_shape(content: &str) -> Result<ExamSubmission, ContractError> {
    let raw: Value = serde_json::from_str(content).map_err(|e| {
        ContractError::new(
            "submission",
            vec![Violation::structural("$", format!("invalid JSON: {e}"))],
        )
    })?;

    let mut violations = Vec::new();
    check_schema_version(&raw, &mut violations);
    match raw.get("answers") {
        Some(Value::Array(answers)) => {
            for (i, answer) in answers.iter().enumerate() {
                let path = format!("answers[{i}]");
                if answer.get("answer").is_some() {
                    violations.push(Violation::structural(
                        format!("{path}.answer"),
                        "legacy field 'answer' is not accepted; send 'response_text'",
                    ));
                }
                match answer.get("response_text") {
                    Some(Value::String(_)) => {}
                    Some(_) => violations.push(Violation::structural(
                        format!("{path}.response_text"),
                        "must be a string (use \"\" for no attempt)",
                    )),
                    None => violations.push(Violation::structural(
                        format!("{path}.response_text"),
                        "field is missing (use \"\" for no attempt)",
                    )),
                }
            }
        }
        Some(_) => violations.push(Violation::structural("answers", "must be an array")),
        None => violations.push(Violation::structural("answers", "missing required field")),
    }
    ContractError::check("submission", violations)?;

    serde_json::from_value(raw).map_err(|e| {
        ContractError::new("submission", vec![Violation::structural("$", e.to_string())])
    })
}

fn check_schema_version(raw: &Value, violations: &mut Vec<Violation>) {
    match raw.get("schema_version") {
        None => {}
        Some(v) if v.as_u64() == Some(SCHEMA_VERSION as u64) => {}
        Some(v) => violations.push(Violation::structural(
            "schema_version",
            format!("unsupported schema version {v} (expected {SCHEMA_VERSION})"),
        )),
    }
}

/// Every `marks`-like field anywhere in the document must be a positive integer.
fn scan_marks(value: &Value, path: &str, violations: &mut Vec<Violation>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = format!("{path}.{key}");
                if MARK_FIELDS.contains(&key.as_str()) && !is_positive_int(child) {
                    violations.push(Violation::structural(
                        child_path.trim_start_matches("$."),
                        format!("must be a positive integer, got {child}"),
                    ));
                    continue;
                }
                scan_marks(child, &child_path, violations);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                scan_marks(item, &format!("{path}[{i}]"), violations);
            }
        }
        _ => {}
    }
}

fn is_positive_int(value: &Value) -> bool {
    value
        .as_u64()
        .is_some_and(|n| n > 0 && n <= u32::MAX as u64)
}

fn scan_difficulties(raw: &Value, violations: &mut Vec<Violation>) {
    let Some(sections) = raw.get("sections").and_then(Value::as_array) else {
        return;
    };
    for (si, section) in sections.iter().enumerate() {
        let Some(questions) = section.get("questions").and_then(Value::as_array) else {
            continue;
        };
        for (qi, question) in questions.iter().enumerate() {
            match question.get("difficulty") {
                Some(Value::String(d)) if Difficulty::ALL.contains(&d.as_str()) => {}
                Some(other) => violations.push(Violation::structural(
                    format!("sections[{si}].questions[{qi}].difficulty"),
                    format!("unknown difficulty {other}; expected one of {:?}", Difficulty::ALL),
                )),
                None => violations.push(Violation::structural(
                    format!("sections[{si}].questions[{qi}].difficulty"),
                    "missing required field",
                )),
            }
        }
    }
}

/// Read and ingest a single exam file.
pub fn load_exam(path: &Path) -> Result<Exam> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read exam file: {}", path.display()))?;
    parse_exam_str(&content).with_context(|| format!("invalid exam: {}", path.display()))
}

/// Read a submission file and validate it against `exam`.
pub fn load_submission(path: &Path, exam: &Exam) -> Result<ExamSubmission> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read submission file: {}", path.display()))?;
    parse_submission_str(&content, exam)
        .with_context(|| format!("invalid submission: {}", path.display()))
}

/// Recursively load all `.json` exams under a directory, skipping invalid ones.
pub fn load_exam_directory(dir: &Path) -> Result<Vec<Exam>> {
    let mut exams = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            exams.extend(load_exam_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "json") {
            match load_exam(&path) {
                Ok(exam) => exams.push(exam),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    exams.sort_by(|a, b| a.exam_id.cmp(&b.exam_id));
    Ok(exams)
}

/// A pair of exams built from exactly the same set of question templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDuplicate {
    pub first: String,
    pub second: String,
}

/// Report exams whose `template_sources` sets are identical.
///
/// Exams without template provenance are ignored.
pub fn find_template_duplicates(exams: &[Exam]) -> Vec<TemplateDuplicate> {
    let mut first_seen: HashMap<Vec<&str>, &str> = HashMap::new();
    let mut duplicates = Vec::new();

    for exam in exams {
        let signature: Vec<&str> = exam.template_signature().into_iter().collect();
        if signature.is_empty() {
            continue;
        }
        match first_seen.get(&signature) {
            Some(first) => duplicates.push(TemplateDuplicate {
                first: first.to_string(),
                second: exam.exam_id.clone(),
            }),
            None => {
                first_seen.insert(signature, &exam.exam_id);
            }
        }
    }

    duplicates
}
