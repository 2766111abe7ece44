//! Grade band resolution.
//!
//! Maps an overall percentage to an SQA grade using a threshold table passed
//! in by the caller, so one resolver serves every qualification level.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BandTableError;

/// Qualification grade, ordered lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "No Award")]
    NoAward,
    D,
    C,
    B,
    A,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::A => write!(f, "A"),
            Grade::B => write!(f, "B"),
            Grade::C => write!(f, "C"),
            Grade::D => write!(f, "D"),
            Grade::NoAward => write!(f, "No Award"),
        }
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" => Ok(Grade::A),
            "B" => Ok(Grade::B),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            "NO AWARD" | "NO_AWARD" => Ok(Grade::NoAward),
            other => Err(format!("unknown grade: {other}")),
        }
    }
}

/// Inclusive lower-bound percentage for each awarded grade.
///
/// Serialized with the grade letters as keys, e.g. `{"A":70,"B":60,"C":50,"D":40}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeBandTable {
    #[serde(rename = "A")]
    pub a: f64,
    #[serde(rename = "B")]
    pub b: f64,
    #[serde(rename = "C")]
    pub c: f64,
    #[serde(rename = "D")]
    pub d: f64,
}

impl Default for GradeBandTable {
    fn default() -> Self {
        Self {
            a: 70.0,
            b: 60.0,
            c: 50.0,
            d: 40.0,
        }
    }
}

impl GradeBandTable {
    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Result<Self, BandTableError> {
        let table = Self { a, b, c, d };
        table.validate()?;
        Ok(table)
    }

    /// Checks every threshold is within 0..=100 and strictly descending A > B > C > D.
    pub fn validate(&self) -> Result<(), BandTableError> {
        let ordered = self.thresholds();
        for (grade, value) in ordered {
            if !(0.0..=100.0).contains(&value) {
                return Err(BandTableError::OutOfRange {
                    name: grade_name(grade),
                    value,
                    min: 0.0,
                    max: 100.0,
                });
            }
        }
        for pair in ordered.windows(2) {
            let (higher, higher_value) = pair[0];
            let (lower, lower_value) = pair[1];
            if higher_value <= lower_value {
                return Err(BandTableError::NotDescending {
                    higher: grade_name(higher),
                    higher_value,
                    lower: grade_name(lower),
                    lower_value,
                });
            }
        }
        Ok(())
    }

    /// Thresholds from the highest grade down.
    pub fn thresholds(&self) -> [(Grade, f64); 4] {
        [
            (Grade::A, self.a),
            (Grade::B, self.b),
            (Grade::C, self.c),
            (Grade::D, self.d),
        ]
    }

    /// Lower bound of `grade`, or `None` for No Award.
    pub fn lower_bound(&self, grade: Grade) -> Option<f64> {
        self.thresholds()
            .into_iter()
            .find(|(g, _)| *g == grade)
            .map(|(_, v)| v)
    }

    /// The next grade up and the percentage needed to reach it.
    pub fn next_grade(&self, percentage: f64) -> Option<(Grade, f64)> {
        self.thresholds()
            .into_iter()
            .rev()
            .find(|(_, threshold)| percentage < *threshold)
    }
}

fn grade_name(grade: Grade) -> &'static str {
    match grade {
        Grade::A => "A",
        Grade::B => "B",
        Grade::C => "C",
        Grade::D => "D",
        Grade::NoAward => "No Award",
    }
}

/// Highest grade whose lower bound `percentage` meets or exceeds.
///
/// A percentage exactly on a threshold belongs to the higher grade.
pub fn resolve_grade(percentage: f64, bands: &GradeBandTable) -> Grade {
    bands
        .thresholds()
        .into_iter()
        .find(|(_, threshold)| percentage >= *threshold)
        .map(|(grade, _)| grade)
        .unwrap_or(Grade::NoAward)
}

/// `earned / possible * 100`, clamped to 0..=100 and rounded to one decimal place.
pub fn percentage(earned: u32, possible: u32) -> f64 {
    if possible == 0 {
        return 0.0;
    }
    let raw = earned as f64 / possible as f64 * 100.0;
    ((raw * 10.0).round() / 10.0).clamp(0.0, 100.0)
}
