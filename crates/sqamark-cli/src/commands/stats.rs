//! The `sqamark stats` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use sqamark_core::parser::load_exam;
use sqamark_core::report::load_results_dir;
use sqamark_core::statistics::compute_cohort_stats;

pub fn execute(exam_path: PathBuf, evaluations: PathBuf, format: String) -> Result<()> {
    let exam = load_exam(&exam_path)?;
    let results = load_results_dir(&evaluations)?;
    if results.is_empty() {
        anyhow::bail!("no evaluation results found in {}", evaluations.display());
    }

    let stats = compute_cohort_stats(&exam, &results);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Exam: {} ({} submissions)", stats.exam_id, stats.submissions);
    println!(
        "Mean {:.1}%  Median {:.1}%  Min {:.1}%  Max {:.1}%",
        stats.mean_percentage, stats.median_percentage, stats.min_percentage, stats.max_percentage
    );

    let distribution: Vec<String> = stats
        .grade_distribution
        .iter()
        .rev()
        .map(|(grade, count)| format!("{grade}: {count}"))
        .collect();
    println!("Grades: {}", distribution.join(", "));

    let mut table = Table::new();
    table.set_header(vec!["Question", "Marks", "Mean", "Facility", "Full marks"]);
    for q in &stats.per_question {
        table.add_row(vec![
            Cell::new(&q.question_id),
            Cell::new(q.marks_possible),
            Cell::new(format!("{:.2}", q.mean_marks)),
            Cell::new(format!("{:.2}", q.facility)),
            Cell::new(q.full_marks),
        ]);
    }
    println!("{table}");

    let mut topics = Table::new();
    topics.set_header(vec!["Topic", "Earned", "Possible", "Ratio"]);
    for (topic, t) in &stats.per_topic {
        topics.add_row(vec![
            Cell::new(topic),
            Cell::new(t.earned),
            Cell::new(t.possible),
            Cell::new(format!("{:.2}", t.ratio)),
        ]);
    }
    println!("{topics}");

    if stats.ungraded_bullets > 0 {
        println!("{} bullet(s) across the cohort await review", stats.ungraded_bullets);
    }

    Ok(())
}
