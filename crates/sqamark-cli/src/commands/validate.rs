//! The `sqamark validate` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use sqamark_core::error::ContractError;
use sqamark_core::model::Exam;
use sqamark_core::parser::{find_template_duplicates, parse_exam_str, parse_submission_str};

pub fn execute(exam_path: PathBuf, submission_path: Option<PathBuf>) -> Result<()> {
    let files = if exam_path.is_dir() {
        json_files(&exam_path)?
    } else {
        vec![exam_path.clone()]
    };

    if submission_path.is_some() && files.len() != 1 {
        anyhow::bail!("--submission needs a single exam file, not a directory");
    }

    let mut exams = Vec::new();
    let mut total_violations = 0;

    for file in &files {
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read exam file: {}", file.display()))?;
        match parse_exam_str(&content) {
            Ok(exam) => {
                println!(
                    "Exam: {} ({} questions, {} marks, {}) OK",
                    exam.exam_id,
                    exam.question_count(),
                    exam.metadata.total_marks,
                    exam.status
                );
                exams.push(exam);
            }
            Err(e) => {
                println!("Exam: {}", file.display());
                total_violations += print_violations(&e);
            }
        }
    }

    for dup in find_template_duplicates(&exams) {
        println!(
            "  WARNING: {} and {} are built from the same question templates",
            dup.first, dup.second
        );
    }

    if let (Some(path), [exam]) = (submission_path, exams.as_slice()) {
        total_violations += validate_submission(&path, exam)?;
    }

    if total_violations == 0 {
        println!("All documents valid.");
        Ok(())
    } else {
        anyhow::bail!("{total_violations} violation(s) found")
    }
}

fn validate_submission(path: &Path, exam: &Exam) -> Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read submission file: {}", path.display()))?;
    match parse_submission_str(&content, exam) {
        Ok(submission) => {
            println!(
                "Submission: {} ({} answers) OK",
                submission.submission_id,
                submission.answers.len()
            );
            Ok(0)
        }
        Err(e) => {
            println!("Submission: {}", path.display());
            Ok(print_violations(&e))
        }
    }
}

fn print_violations(err: &ContractError) -> usize {
    for v in &err.violations {
        println!("  ERROR [{}] {v}", v.kind);
    }
    err.violations.len()
}

/// All `.json` files under `dir`, recursively, in path order.
fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_dir() {
            files.extend(json_files(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
