//! Evaluation result persistence and regrade comparison.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::contract::validate_result;
use crate::grading::Grade;
use crate::results::EvaluationResult;

impl EvaluationResult {
    /// Save the result as pretty JSON, creating parent directories.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize evaluation result")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write result to {}", path.display()))?;
        Ok(())
    }

    /// Load a result from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read result from {}", path.display()))?;
        let result: EvaluationResult = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse result JSON in {}", path.display()))?;
        validate_result(&result)
            .with_context(|| format!("rejected result in {}", path.display()))?;
        Ok(result)
    }

    /// Compare this result against an earlier grading of the same submission.
    pub fn compare(&self, baseline: &EvaluationResult) -> RegradeReport {
        if self.submission_id != baseline.submission_id {
            tracing::warn!(
                current = %self.submission_id,
                baseline = %baseline.submission_id,
                "comparing results for different submissions"
            );
        }

        let bullet_map = |result: &EvaluationResult| -> BTreeMap<(String, u32), (u32, bool)> {
            result
                .question_feedback
                .iter()
                .flat_map(|q| {
                    q.bullet_marks.iter().map(move |b| {
                        ((q.question_id.clone(), b.bullet), (b.marks_earned, b.ungraded))
                    })
                })
                .collect()
        };
        let baseline_bullets = bullet_map(baseline);
        let current_bullets = bullet_map(self);

        let mut regressions = Vec::new();
        let mut improvements = Vec::new();
        let mut unchanged = 0usize;
        let mut newly_ungraded = 0usize;
        let mut resolved_ungraded = 0usize;
        let mut added_bullets = 0usize;

        for ((question_id, bullet), &(current, current_ungraded)) in &current_bullets {
            let Some(&(previous, previous_ungraded)) =
                baseline_bullets.get(&(question_id.clone(), *bullet))
            else {
                added_bullets += 1;
                continue;
            };

            match (previous_ungraded, current_ungraded) {
                (false, true) => newly_ungraded += 1,
                (true, false) => resolved_ungraded += 1,
                _ => {}
            }

            let change = BulletChange {
                question_id: question_id.clone(),
                bullet: *bullet,
                baseline_marks: previous,
                current_marks: current,
                delta: current as i64 - previous as i64,
            };
            match change.delta {
                d if d < 0 => regressions.push(change),
                d if d > 0 => improvements.push(change),
                _ => unchanged += 1,
            }
        }

        let removed_bullets = baseline_bullets
            .keys()
            .filter(|k| !current_bullets.contains_key(*k))
            .count();

        RegradeReport {
            submission_id: self.submission_id.clone(),
            baseline_marks: baseline.overall_result.marks_earned,
            current_marks: self.overall_result.marks_earned,
            baseline_grade: baseline.overall_result.grade,
            current_grade: self.overall_result.grade,
            regressions,
            improvements,
            unchanged,
            newly_ungraded,
            resolved_ungraded,
            added_bullets,
            removed_bullets,
        }
    }
}

/// Result of comparing two gradings of one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegradeReport {
    pub submission_id: String,
    pub baseline_marks: u32,
    pub current_marks: u32,
    pub baseline_grade: Grade,
    pub current_grade: Grade,
    /// Bullets that lost marks.
    pub regressions: Vec<BulletChange>,
    /// Bullets that gained marks.
    pub improvements: Vec<BulletChange>,
    pub unchanged: usize,
    /// Bullets graded before but not now.
    pub newly_ungraded: usize,
    /// Bullets ungraded before and graded now.
    pub resolved_ungraded: usize,
    pub added_bullets: usize,
    pub removed_bullets: usize,
}

/// A change in one bullet's marks between gradings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletChange {
    pub question_id: String,
    pub bullet: u32,
    pub baseline_marks: u32,
    pub current_marks: u32,
    pub delta: i64,
}

impl RegradeReport {
    /// Format the regrade report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**{}:** {} -> {} marks, grade {} -> {}\n\n",
            self.submission_id,
            self.baseline_marks,
            self.current_marks,
            self.baseline_grade,
            self.current_grade
        ));
        md.push_str(&format!(
            "**Summary:** {} regressions, {} improvements, {} unchanged\n\n",
            self.regressions.len(),
            self.improvements.len(),
            self.unchanged
        ));

        for (title, changes) in [("Regressions", &self.regressions), ("Improvements", &self.improvements)] {
            if changes.is_empty() {
                continue;
            }
            md.push_str(&format!("### {title}\n\n"));
            md.push_str("| Question | Bullet | Baseline | Current | Delta |\n");
            md.push_str("|----------|--------|----------|---------|-------|\n");
            for c in changes {
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {:+} |\n",
                    c.question_id, c.bullet, c.baseline_marks, c.current_marks, c.delta
                ));
            }
            md.push('\n');
        }

        if self.newly_ungraded > 0 || self.resolved_ungraded > 0 {
            md.push_str(&format!(
                "Ungraded bullets: {} new, {} resolved\n",
                self.newly_ungraded, self.resolved_ungraded
            ));
        }

        md
    }

    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }

    pub fn grade_changed(&self) -> bool {
        self.baseline_grade != self.current_grade
    }

    pub fn has_changes(&self) -> bool {
        !self.regressions.is_empty()
            || !self.improvements.is_empty()
            || self.grade_changed()
            || self.added_bullets > 0
            || self.removed_bullets > 0
    }
}

/// Load every `*.json` evaluation result directly under `dir`, sorted by submission id.
pub fn load_results_dir(dir: &Path) -> Result<Vec<EvaluationResult>> {
    let mut results = Vec::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read results directory {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "json") {
            results.push(EvaluationResult::load_json(&path)?);
        }
    }
    results.sort_by(|a, b| a.submission_id.cmp(&b.submission_id));
    Ok(results)
}
