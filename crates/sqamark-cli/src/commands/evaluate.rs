//! The `sqamark evaluate` command.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use sqamark_core::engine::{MarkingEngine, ProgressReporter};
use sqamark_core::parser::{load_exam, load_submission};
use sqamark_core::results::{EvaluationResult, QuestionResult};
use sqamark_core::submission::ExamSubmission;
use sqamark_judges::config::load_config_from;

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_question_marked(&self, submission_id: &str, result: &QuestionResult) {
        eprintln!(
            "  {submission_id} :: {} {}/{}",
            result.question_id, result.marks_earned, result.marks_possible
        );
    }

    fn on_bullet_ungraded(&self, submission_id: &str, question_id: &str, bullet: u32, error: &str) {
        eprintln!("  UNGRADED: {submission_id} :: {question_id} bullet {bullet}: {error}");
    }

    fn on_evaluation_complete(&self, result: &EvaluationResult) {
        eprintln!(
            "  Done: {} {}/{} ({:.1}%, grade {})",
            result.submission_id,
            result.overall_result.marks_earned,
            result.overall_result.marks_possible,
            result.overall_result.percentage,
            result.overall_result.grade
        );
    }
}

pub struct EvaluateArgs {
    pub exam: PathBuf,
    pub submission: PathBuf,
    pub judge: Option<String>,
    pub model: Option<String>,
    pub output: Option<PathBuf>,
    pub full_coverage: bool,
    pub config: Option<PathBuf>,
}

pub async fn execute(args: EvaluateArgs) -> Result<()> {
    let config = load_config_from(args.config.as_deref())?;
    let exam = load_exam(&args.exam)?;

    let mut engine_config = config.engine_config(&exam.level);
    engine_config.full_topic_coverage |= args.full_coverage;
    let judge = config.judge(args.judge.as_deref(), args.model.as_deref())?;

    eprintln!(
        "Marking against {} ({}) with judge '{}'",
        exam.exam_id,
        exam.level,
        judge.name()
    );
    let engine = MarkingEngine::new(judge, engine_config);
    let start = Instant::now();

    if args.submission.is_dir() {
        let submissions = load_submissions(&args.submission, &exam)?;
        let results = engine
            .evaluate_batch(&exam, &submissions, &ConsoleReporter)
            .await;

        let output_dir = args.output.unwrap_or_else(|| config.output_dir.clone());
        let mut graded = Vec::new();
        let mut failed = 0usize;
        for (submission, result) in submissions.iter().zip(results) {
            match result {
                Ok(result) => {
                    result.save_json(&output_dir.join(format!("{}.json", result.submission_id)))?;
                    graded.push(result);
                }
                Err(e) => {
                    failed += 1;
                    eprintln!("  ERROR: {}: {e}", submission.submission_id);
                }
            }
        }

        eprintln!(
            "\nComplete: {}/{} graded, {failed} failed ({:.1}s)",
            graded.len(),
            submissions.len(),
            start.elapsed().as_secs_f64()
        );
        eprintln!("Results saved to: {}", output_dir.display());
        print_batch_summary(&graded);
        if failed > 0 {
            anyhow::bail!("{failed} submission(s) could not be graded");
        }
    } else {
        let submission = load_submission(&args.submission, &exam)?;
        let result = engine
            .evaluate_with_progress(&exam, &submission, &ConsoleReporter)
            .await?;

        let path = args.output.unwrap_or_else(|| {
            config
                .output_dir
                .join(format!("{}.json", result.submission_id))
        });
        result.save_json(&path)?;
        eprintln!("Result saved to: {}", path.display());
        print_summary(&result);
    }

    Ok(())
}

fn load_submissions(dir: &Path, exam: &sqamark_core::model::Exam) -> Result<Vec<ExamSubmission>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut submissions = Vec::new();
    for path in paths {
        match load_submission(&path, exam) {
            Ok(s) => submissions.push(s),
            Err(e) => tracing::warn!("skipping {}: {:#}", path.display(), e),
        }
    }
    if submissions.is_empty() {
        anyhow::bail!("no valid submissions for {} in {}", exam.exam_id, dir.display());
    }
    Ok(submissions)
}

fn print_summary(result: &EvaluationResult) {
    let mut table = Table::new();
    table.set_header(vec!["Question", "Marks", "Feedback"]);
    for q in &result.question_feedback {
        table.add_row(vec![
            Cell::new(&q.question_id),
            Cell::new(format!("{}/{}", q.marks_earned, q.marks_possible)),
            Cell::new(&q.overall_feedback),
        ]);
    }
    println!("{table}");

    let overall = &result.overall_result;
    println!(
        "Total: {}/{} ({:.1}%) Grade: {}",
        overall.marks_earned, overall.marks_possible, overall.percentage, overall.grade
    );
    for rec in &result.learning_recommendations {
        println!("  [{}] {}", rec.mastery_level, rec.recommendation);
    }
    println!("{}", result.encouragement_message);
}

fn print_batch_summary(results: &[EvaluationResult]) {
    let mut table = Table::new();
    table.set_header(vec!["Submission", "Marks", "Percentage", "Grade", "Ungraded"]);
    for r in results {
        let overall = &r.overall_result;
        table.add_row(vec![
            Cell::new(&r.submission_id),
            Cell::new(format!("{}/{}", overall.marks_earned, overall.marks_possible)),
            Cell::new(format!("{:.1}%", overall.percentage)),
            Cell::new(overall.grade),
            Cell::new(r.ungraded_count()),
        ]);
    }
    println!("{table}");
}
