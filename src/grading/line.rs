//! Individual offensive/defensive lineman grades derived from unit grades.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::team_unit::{LineUnit, TeamUnitGrade, TeamUnitIndex};
use super::{ensure_grade_bounds, letter_grade, round1, EntityFailure, GradingParams, LetterGrade, Stage, StageOutput};
use crate::error::GradeError;
use crate::records::{PositionGroup, SnapRecord};

/// Weight of the pass sub-score (protection or rush) for a line position.
/// The remainder goes to the run sub-score.
pub fn pass_weight(position: &str) -> Option<f64> {
    let w = match position.trim().to_uppercase().as_str() {
        "T" | "LT" | "RT" | "OT" => 0.7,
        "C" => 0.5,
        "G" | "LG" | "RG" | "OG" => 0.3,
        "OL" => 0.5,
        "DE" | "EDGE" => 0.8,
        "DT" | "NT" => 0.3,
        "DL" => 0.5,
        _ => return None,
    };
    Some(w)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualLineGrade {
    pub player_id: String,
    pub player_name: String,
    pub position: String,
    pub team: String,
    pub season: u16,
    pub week: u8,
    pub grade: f64,
    pub letter_grade: LetterGrade,
    pub pass_weight: f64,
    /// `None` for play-by-play estimates
    pub snaps: Option<u32>,
    pub snap_pct: Option<f64>,
    pub unit_grade: TeamUnitGrade,
}

/// Why snap data could not drive individual grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapDataIssue {
    /// No snap records for the season
    Missing,
    /// Snap records exist but none carries a line position with a snap share
    Malformed,
}

impl SnapDataIssue {
    pub fn diagnostic(self, season: u16) -> GradeError {
        let entity = format!("snap_counts/{season}");
        match self {
            SnapDataIssue::Missing => GradeError::MissingDependency {
                stage: Stage::IndividualLine,
                entity,
                dependency: "snap counts".into(),
            },
            SnapDataIssue::Malformed => GradeError::DataShapeMismatch {
                stage: Stage::IndividualLine,
                entity,
                field: "line position with offense_pct or defense_pct".into(),
            },
        }
    }
}

/// Individual line grades, tagged with the path that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum LineGradeSet {
    Snaps {
        grades: Vec<IndividualLineGrade>,
    },
    PlayByPlayEstimate {
        reason: SnapDataIssue,
        grades: Vec<IndividualLineGrade>,
    },
}

impl LineGradeSet {
    pub fn grades(&self) -> &[IndividualLineGrade] {
        match self {
            LineGradeSet::Snaps { grades } | LineGradeSet::PlayByPlayEstimate { grades, .. } => grades,
        }
    }

    pub fn is_estimate(&self) -> bool {
        matches!(self, LineGradeSet::PlayByPlayEstimate { .. })
    }

    /// Why the estimate path was taken, if it was.
    pub fn diagnostic(&self, season: u16) -> Option<GradeError> {
        match self {
            LineGradeSet::Snaps { .. } => None,
            LineGradeSet::PlayByPlayEstimate { reason, .. } => Some(reason.diagnostic(season)),
        }
    }
}

/// Grade linemen for a season.
///
/// Uses snap participation when it is usable; otherwise emits one
/// play-by-play estimate per unit grade, with snap fields unset.
pub fn grade_linemen(
    snaps: &[SnapRecord],
    units: &[TeamUnitGrade],
    params: &GradingParams,
) -> (LineGradeSet, Vec<EntityFailure>) {
    if let Some(reason) = snap_data_issue(snaps) {
        warn!(
            "Snap data unusable ({:?}), estimating {} line grades from play-by-play",
            reason,
            units.len()
        );
        let out = estimate_from_units(units);
        return (
            LineGradeSet::PlayByPlayEstimate {
                reason,
                grades: out.records,
            },
            out.failures,
        );
    }

    let out = grade_from_snaps(snaps, units, params);
    (LineGradeSet::Snaps { grades: out.records }, out.failures)
}

fn snap_data_issue(snaps: &[SnapRecord]) -> Option<SnapDataIssue> {
    if snaps.is_empty() {
        return Some(SnapDataIssue::Missing);
    }
    let usable = snaps.iter().any(|s| {
        s.position.as_deref().and_then(pass_weight).is_some()
            && (s.offense_pct.is_some() || s.defense_pct.is_some())
    });
    if usable {
        None
    } else {
        Some(SnapDataIssue::Malformed)
    }
}

fn grade_from_snaps(
    snaps: &[SnapRecord],
    units: &[TeamUnitGrade],
    params: &GradingParams,
) -> StageOutput<IndividualLineGrade> {
    let index = TeamUnitIndex::new(units);
    let mut results = Vec::new();
    let mut below_floor = 0usize;
    let mut no_unit = 0usize;

    for snap in snaps {
        let Some(position) = snap.position.as_deref() else {
            continue;
        };
        let Some(weight) = pass_weight(position) else {
            continue;
        };
        let (unit, count, pct) = match PositionGroup::from_position(position) {
            Some(PositionGroup::OffensiveLine) => (LineUnit::Oline, snap.offense_snaps, snap.offense_pct),
            Some(PositionGroup::DefensiveLine) => (LineUnit::Dline, snap.defense_snaps, snap.defense_pct),
            _ => continue,
        };
        let Some(pct) = pct else {
            debug!("{} week {}: no snap share for {}", snap.player_id, snap.week, unit);
            continue;
        };
        if pct < params.min_snap_pct {
            below_floor += 1;
            continue;
        }
        let Some(unit_grade) = index.get(&snap.team, snap.season, snap.week, unit) else {
            no_unit += 1;
            continue;
        };

        let entity = format!("{}/{}/{}", snap.player_id, snap.season, snap.week);
        let raw = weight * unit_grade.pass_score + (1.0 - weight) * unit_grade.run_score;
        results.push(ensure_grade_bounds(Stage::IndividualLine, &entity, snap.season, round1(raw)).map(
            |grade| IndividualLineGrade {
                player_id: snap.player_id.clone(),
                player_name: snap.player_name.clone(),
                position: position.to_string(),
                team: snap.team.clone(),
                season: snap.season,
                week: snap.week,
                grade,
                letter_grade: letter_grade(grade),
                pass_weight: weight,
                snaps: count,
                snap_pct: Some(pct),
                unit_grade: unit_grade.clone(),
            },
        ));
    }

    let mut out = StageOutput::collect(results);
    sort_grades(&mut out.records);
    info!(
        "Linemen: {} graded from snaps, {} below snap floor, {} without unit grade",
        out.records.len(),
        below_floor,
        no_unit
    );
    out
}

fn estimate_from_units(units: &[TeamUnitGrade]) -> StageOutput<IndividualLineGrade> {
    let results = units
        .iter()
        .map(|unit| {
            let (suffix, position) = match unit.unit {
                LineUnit::Oline => ("OLINE", "OL"),
                LineUnit::Dline => ("DLINE", "DL"),
            };
            let weight = 0.5;
            let raw = weight * unit.pass_score + (1.0 - weight) * unit.run_score;
            let player_id = format!("{}-{}", unit.team, suffix);
            let entity = format!("{}/{}/{}", player_id, unit.season, unit.week);
            ensure_grade_bounds(Stage::IndividualLine, &entity, unit.season, round1(raw)).map(|grade| {
                IndividualLineGrade {
                    player_name: format!("{} {}", unit.team, position),
                    player_id,
                    position: position.to_string(),
                    team: unit.team.clone(),
                    season: unit.season,
                    week: unit.week,
                    grade,
                    letter_grade: letter_grade(grade),
                    pass_weight: weight,
                    snaps: None,
                    snap_pct: None,
                    unit_grade: unit.clone(),
                }
            })
        })
        .collect();

    let mut out = StageOutput::collect(results);
    sort_grades(&mut out.records);
    out
}

fn sort_grades(grades: &mut [IndividualLineGrade]) {
    grades.sort_by(|a, b| {
        (a.season, a.week, &a.team, &a.player_id).cmp(&(b.season, b.week, &b.team, &b.player_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit(team: &str, week: u8, unit: LineUnit, pass: f64, run: f64) -> TeamUnitGrade {
        let overall = round1(0.6 * pass + 0.4 * run);
        TeamUnitGrade {
            team: team.into(),
            season: 2023,
            week,
            unit,
            pass_score: pass,
            run_score: run,
            overall,
            letter_grade: letter_grade(overall),
            pass_rate: None,
            run_rate: None,
            pass_plays: 30,
            run_plays: 20,
            total_plays: 50,
        }
    }

    fn snap(id: &str, position: Option<&str>, team: &str, week: u8, pct: Option<f64>) -> SnapRecord {
        let defense = matches!(position, Some("DE" | "DT" | "NT" | "EDGE" | "DL"));
        SnapRecord {
            player_id: id.into(),
            player_name: id.to_uppercase(),
            position: position.map(str::to_string),
            team: team.into(),
            season: 2023,
            week,
            offense_snaps: if defense { None } else { pct.map(|p| (p * 60.0) as u32) },
            offense_pct: if defense { None } else { pct },
            defense_snaps: if defense { pct.map(|p| (p * 60.0) as u32) } else { None },
            defense_pct: if defense { pct } else { None },
        }
    }

    #[test]
    fn position_weights_blend_subscores() {
        let units = vec![
            unit("KC", 1, LineUnit::Oline, 90.0, 70.0),
            unit("KC", 1, LineUnit::Dline, 80.0, 60.0),
        ];
        let snaps = vec![
            snap("lt", Some("LT"), "KC", 1, Some(1.0)),
            snap("c", Some("C"), "KC", 1, Some(1.0)),
            snap("rg", Some("RG"), "KC", 1, Some(0.9)),
            snap("de", Some("DE"), "KC", 1, Some(0.8)),
            snap("dt", Some("DT"), "KC", 1, Some(0.6)),
        ];
        let (set, failures) = grade_linemen(&snaps, &units, &GradingParams::default());
        assert!(failures.is_empty());
        assert!(!set.is_estimate());

        let by_id = |id: &str| set.grades().iter().find(|g| g.player_id == id).unwrap().grade;
        assert_relative_eq!(by_id("lt"), 84.0, epsilon = 1e-9);
        assert_relative_eq!(by_id("c"), 80.0, epsilon = 1e-9);
        assert_relative_eq!(by_id("rg"), 76.0, epsilon = 1e-9);
        assert_relative_eq!(by_id("de"), 76.0, epsilon = 1e-9);
        assert_relative_eq!(by_id("dt"), 66.0, epsilon = 1e-9);
    }

    #[test]
    fn snap_share_gates_but_does_not_scale() {
        let units = vec![unit("KC", 1, LineUnit::Oline, 90.0, 70.0)];
        let snaps = vec![
            snap("full", Some("LT"), "KC", 1, Some(1.0)),
            snap("half", Some("RT"), "KC", 1, Some(0.3)),
            snap("spot", Some("OT"), "KC", 1, Some(0.1)),
        ];
        let (set, _) = grade_linemen(&snaps, &units, &GradingParams::default());
        let grades = set.grades();
        assert_eq!(grades.len(), 2);
        assert_relative_eq!(grades[0].grade, grades[1].grade);
        assert!(grades.iter().all(|g| g.player_id != "spot"));
    }

    #[test]
    fn missing_unit_grade_skips_player_week() {
        let units = vec![unit("KC", 1, LineUnit::Oline, 90.0, 70.0)];
        let snaps = vec![
            snap("lt", Some("LT"), "KC", 2, Some(1.0)),
            snap("lt", Some("LT"), "KC", 1, Some(1.0)),
        ];
        let (set, _) = grade_linemen(&snaps, &units, &GradingParams::default());
        assert_eq!(set.grades().len(), 1);
        assert_eq!(set.grades()[0].week, 1);
        assert_eq!(set.grades()[0].snaps, Some(60));
    }

    #[test]
    fn empty_snaps_fall_back_to_unit_estimates() {
        let units = vec![
            unit("KC", 1, LineUnit::Oline, 90.0, 70.0),
            unit("DET", 1, LineUnit::Dline, 80.0, 60.0),
        ];
        let (set, failures) = grade_linemen(&[], &units, &GradingParams::default());
        assert!(failures.is_empty());
        match &set {
            LineGradeSet::PlayByPlayEstimate { reason, grades } => {
                assert_eq!(*reason, SnapDataIssue::Missing);
                assert_eq!(grades.len(), 2);
                let kc = grades.iter().find(|g| g.player_id == "KC-OLINE").unwrap();
                assert_relative_eq!(kc.grade, 80.0, epsilon = 1e-9);
                assert_eq!(kc.position, "OL");
                assert_eq!(kc.snaps, None);
                assert_eq!(kc.snap_pct, None);
            }
            other => panic!("expected estimate, got {other:?}"),
        }
    }

    #[test]
    fn snaps_without_positions_are_malformed() {
        let units = vec![unit("KC", 1, LineUnit::Oline, 90.0, 70.0)];
        let snaps = vec![snap("x", None, "KC", 1, Some(1.0)), snap("y", Some("WR"), "KC", 1, Some(1.0))];
        let (set, _) = grade_linemen(&snaps, &units, &GradingParams::default());
        assert!(matches!(
            set,
            LineGradeSet::PlayByPlayEstimate {
                reason: SnapDataIssue::Malformed,
                ..
            }
        ));
        assert_eq!(set.grades().len(), 1);
        let d = set.diagnostic(2023).unwrap();
        assert!(matches!(d, GradeError::DataShapeMismatch { .. }));
        assert_eq!(d.entity(), "snap_counts/2023");
    }

    #[test]
    fn fallback_reasons_map_to_error_kinds() {
        let (set, _) = grade_linemen(&[], &[], &GradingParams::default());
        assert!(matches!(
            set.diagnostic(2022),
            Some(GradeError::MissingDependency {
                stage: Stage::IndividualLine,
                ..
            })
        ));
        let snaps = LineGradeSet::Snaps { grades: Vec::new() };
        assert_eq!(snaps.diagnostic(2022), None);
    }

    #[test]
    fn tagged_serialization() {
        let set = LineGradeSet::PlayByPlayEstimate {
            reason: SnapDataIssue::Missing,
            grades: Vec::new(),
        };
        let v = serde_json::to_value(&set).unwrap();
        assert_eq!(v["source"], "play_by_play_estimate");
        assert_eq!(v["reason"], "missing");
    }
}
