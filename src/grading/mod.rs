pub mod coaching;
pub mod defense;
pub mod line;
pub mod outliers;
pub mod scale;
pub mod skill;
pub mod summary;
pub mod team_unit;

pub use scale::{letter_grade, LetterGrade};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GradeError;

/// Pipeline stage identifiers, used in diagnostics and cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    TeamUnit,
    IndividualLine,
    SkillPosition,
    Defensive,
    Outlier,
    Coaching,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::TeamUnit => "team_unit",
            Stage::IndividualLine => "individual_line",
            Stage::SkillPosition => "skill_position",
            Stage::Defensive => "defensive",
            Stage::Outlier => "outlier",
            Stage::Coaching => "coaching",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunable thresholds shared by the graders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradingParams {
    /// Minimum pass + run plays for a team-unit grade
    pub min_plays: u32,
    /// Minimum weeks for season summaries and outlier analysis
    pub min_games: u32,
    /// Snap share below which a lineman-week is not graded
    pub min_snap_pct: f64,
    /// Standard deviations from the mean that mark an outlier week
    pub std_threshold: f64,
    /// Minimum decided games for the coaching efficiency leaderboard
    pub min_coach_games: u32,
}

impl Default for GradingParams {
    fn default() -> Self {
        Self {
            min_plays: 40,
            min_games: 3,
            min_snap_pct: 0.25,
            std_threshold: 1.5,
            min_coach_games: 8,
        }
    }
}

impl GradingParams {
    /// Stable textual fingerprint, folded into cache keys so results computed
    /// under different thresholds never collide.
    pub fn fingerprint(&self) -> String {
        format!(
            "p{}-g{}-s{}-t{}-c{}",
            self.min_plays, self.min_games, self.min_snap_pct, self.std_threshold, self.min_coach_games
        )
    }
}

/// An entity a stage could not grade, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityFailure {
    pub stage: Stage,
    pub entity: String,
    pub season: u16,
    pub error: GradeError,
}

/// Records produced by a stage plus the entities that failed inside it.
///
/// `diagnostics` lists entities that were graded through a neutral fallback
/// or left out because an upstream input was missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutput<T> {
    pub records: Vec<T>,
    pub failures: Vec<EntityFailure>,
    #[serde(default)]
    pub diagnostics: Vec<GradeError>,
}

impl<T> Default for StageOutput<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            failures: Vec::new(),
            diagnostics: Vec::new(),
        }
    }
}

impl<T> StageOutput<T> {
    /// Split per-entity results into records and failures, preserving order.
    pub fn collect(results: Vec<Result<T, EntityFailure>>) -> Self {
        let mut out = Self::default();
        for r in results {
            match r {
                Ok(rec) => out.records.push(rec),
                Err(f) => out.failures.push(f),
            }
        }
        out
    }

    /// Record a fallback or omission caused by missing input.
    pub fn note(&mut self, diagnostic: GradeError) {
        tracing::debug!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }
}

/// Order diagnostics by stage, then entity.
pub fn sort_diagnostics(diagnostics: &mut [GradeError]) {
    diagnostics.sort_by(|a, b| (a.stage(), a.entity()).cmp(&(b.stage(), b.entity())));
}

/// Round to one decimal place. Every emitted grade goes through this.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `num / den`, or `None` when the denominator is zero.
pub(crate) fn ratio(num: f64, den: f64) -> Option<f64> {
    if den > 0.0 {
        Some(num / den)
    } else {
        None
    }
}

/// Reject a computed grade outside [0, 100]. Never clamps.
pub(crate) fn ensure_grade_bounds(
    stage: Stage,
    entity: &str,
    season: u16,
    value: f64,
) -> Result<f64, EntityFailure> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        tracing::error!("{}: {} produced out-of-range grade {}", stage, entity, value);
        Err(EntityFailure {
            stage,
            entity: entity.to_string(),
            season,
            error: GradeError::RangeViolation {
                stage,
                entity: entity.to_string(),
                value,
                min: 0.0,
                max: 100.0,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn round1_half_away_from_zero() {
        assert_relative_eq!(round1(85.04), 85.0);
        assert_relative_eq!(round1(85.05000001), 85.1);
        assert_relative_eq!(round1(90.10000000000001), 90.1);
    }

    #[test]
    fn ratio_guards_zero_denominator() {
        assert_eq!(ratio(3.0, 0.0), None);
        assert_relative_eq!(ratio(3.0, 4.0).unwrap(), 0.75);
    }

    #[test]
    fn bounds_check_reports_instead_of_clamping() {
        assert_eq!(ensure_grade_bounds(Stage::Defensive, "x", 2023, 100.0), Ok(100.0));
        let fail = ensure_grade_bounds(Stage::Defensive, "x", 2023, 100.1).unwrap_err();
        assert_eq!(fail.entity, "x");
        assert!(matches!(fail.error, GradeError::RangeViolation { .. }));
        assert!(ensure_grade_bounds(Stage::Defensive, "x", 2023, f64::NAN).is_err());
        assert!(ensure_grade_bounds(Stage::Defensive, "x", 2023, -0.1).is_err());
    }

    #[test]
    fn stage_output_splits_results() {
        let fail = ensure_grade_bounds(Stage::Coaching, "c", 2023, 120.0).unwrap_err();
        let out = StageOutput::collect(vec![Ok(1), Err(fail), Ok(2)]);
        assert_eq!(out.records, vec![1, 2]);
        assert_eq!(out.failures.len(), 1);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn diagnostics_sort_by_stage_then_entity() {
        let missing = |stage, entity: &str| GradeError::MissingDependency {
            stage,
            entity: entity.into(),
            dependency: "x".into(),
        };
        let mut out: StageOutput<u8> = StageOutput::default();
        out.note(missing(Stage::Defensive, "b"));
        out.note(missing(Stage::SkillPosition, "z"));
        out.note(missing(Stage::Defensive, "a"));
        sort_diagnostics(&mut out.diagnostics);
        let keys: Vec<_> = out.diagnostics.iter().map(|d| (d.stage(), d.entity())).collect();
        assert_eq!(
            keys,
            vec![(Stage::SkillPosition, "z"), (Stage::Defensive, "a"), (Stage::Defensive, "b")]
        );
    }

    #[test]
    fn default_params() {
        let p = GradingParams::default();
        assert_eq!(p.min_plays, 40);
        assert_eq!(p.min_games, 3);
        assert_relative_eq!(p.std_threshold, 1.5);
        assert_eq!(p.fingerprint(), "p40-g3-s0.25-t1.5-c8");
    }
}
