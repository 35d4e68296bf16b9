//! Numeric score → letter grade mapping.
//!
//! Ranges are closed below and open above except A+, which closes at 100:
//! F [0,35), D- [35,40), D [40,45), D+ [45,50), C- [50,55), C [55,65),
//! C+ [65,70), B- [70,75), B [75,80), B+ [80,85), A- [85,90), A [90,95),
//! A+ [95,100].

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LetterGrade {
    #[serde(rename = "F")]
    F,
    #[serde(rename = "D-")]
    DMinus,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "D+")]
    DPlus,
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A+")]
    APlus,
}

impl LetterGrade {
    pub fn as_str(self) -> &'static str {
        match self {
            LetterGrade::F => "F",
            LetterGrade::DMinus => "D-",
            LetterGrade::D => "D",
            LetterGrade::DPlus => "D+",
            LetterGrade::CMinus => "C-",
            LetterGrade::C => "C",
            LetterGrade::CPlus => "C+",
            LetterGrade::BMinus => "B-",
            LetterGrade::B => "B",
            LetterGrade::BPlus => "B+",
            LetterGrade::AMinus => "A-",
            LetterGrade::A => "A",
            LetterGrade::APlus => "A+",
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower bound of each letter, highest first.
const GRADE_SCALE: [(f64, LetterGrade); 13] = [
    (95.0, LetterGrade::APlus),
    (90.0, LetterGrade::A),
    (85.0, LetterGrade::AMinus),
    (80.0, LetterGrade::BPlus),
    (75.0, LetterGrade::B),
    (70.0, LetterGrade::BMinus),
    (65.0, LetterGrade::CPlus),
    (55.0, LetterGrade::C),
    (50.0, LetterGrade::CMinus),
    (45.0, LetterGrade::DPlus),
    (40.0, LetterGrade::D),
    (35.0, LetterGrade::DMinus),
    (0.0, LetterGrade::F),
];

/// Map a score to its letter grade.
///
/// Scores outside [0, 100] are clamped first (NaN reads as 0). This is the
/// only place in the crate that silently corrects a value.
pub fn letter_grade(score: f64) -> LetterGrade {
    let s = if score.is_nan() { 0.0 } else { score.clamp(0.0, 100.0) };
    GRADE_SCALE
        .iter()
        .find(|(lower, _)| s >= *lower)
        .map(|(_, grade)| *grade)
        .unwrap_or(LetterGrade::F)
}
