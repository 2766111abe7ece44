//! The `sqamark compare` command.

use std::path::PathBuf;

use anyhow::Result;

use sqamark_core::report::BulletChange;
use sqamark_core::results::EvaluationResult;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    format: String,
    fail_on_change: bool,
) -> Result<()> {
    let baseline = EvaluationResult::load_json(&baseline_path)?;
    let current = EvaluationResult::load_json(&current_path)?;

    if baseline.submission_id != current.submission_id {
        tracing::warn!(
            "comparing different submissions: {} vs {}",
            baseline.submission_id,
            current.submission_id
        );
    }

    let report = current.compare(&baseline);

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", report.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!(
                "{}: {} -> {} marks, grade {} -> {}",
                report.submission_id,
                report.baseline_marks,
                report.current_marks,
                report.baseline_grade,
                report.current_grade
            );
            println!(
                "Comparison: {} regressions, {} improvements, {} unchanged",
                report.regressions.len(),
                report.improvements.len(),
                report.unchanged
            );
            print_changes("Regressions", &report.regressions);
            print_changes("Improvements", &report.improvements);

            if report.newly_ungraded > 0 {
                println!("\n{} bullet(s) newly ungraded", report.newly_ungraded);
            }
            if report.resolved_ungraded > 0 {
                println!("{} ungraded bullet(s) resolved", report.resolved_ungraded);
            }
            if report.added_bullets > 0 {
                println!("{} new bullet(s)", report.added_bullets);
            }
            if report.removed_bullets > 0 {
                println!("{} removed bullet(s)", report.removed_bullets);
            }
        }
    }

    if fail_on_change && report.has_changes() {
        std::process::exit(1);
    }

    Ok(())
}

fn print_changes(title: &str, changes: &[BulletChange]) {
    if changes.is_empty() {
        return;
    }
    println!("\n{title}:");
    for c in changes {
        println!(
            "  {} bullet {}: {} -> {} ({:+})",
            c.question_id, c.bullet, c.baseline_marks, c.current_marks, c.delta
        );
    }
}
