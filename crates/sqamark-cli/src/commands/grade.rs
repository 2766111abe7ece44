//! The `sqamark grade` command.

use std::path::PathBuf;

use anyhow::Result;

use sqamark_core::grading::{resolve_grade, Grade};
use sqamark_judges::config::{load_config_from, DEFAULT_BANDS};

pub fn execute(percentage: f64, level: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    if !(0.0..=100.0).contains(&percentage) {
        anyhow::bail!("percentage must be between 0 and 100, got {percentage}");
    }

    let config = load_config_from(config_path.as_deref())?;
    let level = level.as_deref().unwrap_or(DEFAULT_BANDS);
    let bands = config.grade_bands_for(level);
    let grade = resolve_grade(percentage, &bands);

    println!("{percentage:.1}% -> grade {grade}");
    let cut_points: Vec<String> = bands
        .thresholds()
        .iter()
        .map(|(g, t)| format!("{g} >= {t}"))
        .collect();
    println!("Bands ({level}): {}", cut_points.join(", "));
    if let Some((next, threshold)) = bands.next_grade(percentage) {
        println!("{}", shortfall(percentage, next, threshold));
    }

    Ok(())
}

fn shortfall(percentage: f64, next: Grade, threshold: f64) -> String {
    format!("{:.1}% short of grade {next}", threshold - percentage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqamark_core::grading::GradeBandTable;

    #[test]
    fn shortfall_is_distance_to_next_threshold() {
        let bands = GradeBandTable::default();
        let (next, threshold) = bands.next_grade(65.0).unwrap();
        assert_eq!(shortfall(65.0, next, threshold), "5.0% short of grade A");

        let (next, threshold) = bands.next_grade(12.5).unwrap();
        assert_eq!(shortfall(12.5, next, threshold), "27.5% short of grade D");
    }
}
