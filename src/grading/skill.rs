//! Skill-position (QB/RB/WR/TE) weekly grades with offensive-line context.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::team_unit::{LineUnit, TeamUnitGrade, TeamUnitIndex};
use super::{ensure_grade_bounds, letter_grade, ratio, round1, EntityFailure, LetterGrade, Stage, StageOutput};
use crate::error::GradeError;
use crate::records::{PositionGroup, SkillStatRecord};

// ── Base formulas ──────────────────────────────────────────────────────────

const QB_BASE: f64 = 30.0;
const RB_BASE: f64 = 35.0;
const RECEIVER_BASE: f64 = 35.0;

pub fn qb_base_grade(s: &SkillStatRecord) -> f64 {
    let attempts = s.attempts as f64;
    let yards = (s.passing_yards / 25.0).min(16.0);
    let completion = ratio(s.completions as f64, attempts)
        .map(|pct| ((pct - 0.5).max(0.0) * 40.0).min(10.0))
        .unwrap_or(0.0);
    let ypa = ratio(s.passing_yards, attempts)
        .map(|ypa| ((ypa - 6.0).max(0.0) * 2.5).min(8.0))
        .unwrap_or(0.0);
    let total = QB_BASE + yards + completion + 12.0 * s.passing_tds as f64
        - 8.0 * s.interceptions as f64
        + ypa;
    total.clamp(0.0, 100.0)
}

pub fn rb_base_grade(s: &SkillStatRecord) -> f64 {
    let yards = (s.rushing_yards / 10.0).min(20.0);
    let ypc = ratio(s.rushing_yards, s.carries as f64)
        .map(|ypc| ((ypc - 4.2).max(0.0) * 4.0).min(8.0))
        .unwrap_or(0.0);
    let receiving = (s.receiving_yards / 15.0 + s.receptions as f64).min(10.0);
    let total = RB_BASE
        + yards
        + ypc
        + 10.0 * s.rushing_tds as f64
        + receiving
        + 8.0 * s.receiving_tds as f64;
    total.clamp(0.0, 100.0)
}

pub fn receiver_base_grade(s: &SkillStatRecord) -> f64 {
    let yards = (s.receiving_yards / 8.0).min(20.0);
    let catch_rate = ratio(s.receptions as f64, s.targets as f64)
        .map(|rate| ((rate - 0.6).max(0.0) * 25.0).min(8.0))
        .unwrap_or(0.0);
    let total = RECEIVER_BASE
        + yards
        + 3.0 * s.receptions as f64
        + 12.0 * s.receiving_tds as f64
        + catch_rate;
    total.clamp(0.0, 100.0)
}

/// Base grade for a skill position, `None` for non-skill positions.
pub fn base_grade(group: PositionGroup, s: &SkillStatRecord) -> Option<f64> {
    match group {
        PositionGroup::Quarterback => Some(qb_base_grade(s)),
        PositionGroup::RunningBack => Some(rb_base_grade(s)),
        PositionGroup::Receiver => Some(receiver_base_grade(s)),
        _ => None,
    }
}

// ── O-line adjustment ──────────────────────────────────────────────────────

/// Step multiplier from the team's OLINE overall grade. Receivers and
/// players without a unit grade get 1.0.
pub fn oline_multiplier(group: PositionGroup, oline_grade: Option<f64>) -> f64 {
    let Some(g) = oline_grade else {
        return 1.0;
    };
    let (qb, rb) = if g >= 85.0 {
        (1.06, 1.08)
    } else if g >= 75.0 {
        (1.03, 1.05)
    } else if g >= 65.0 {
        (1.00, 1.00)
    } else if g >= 55.0 {
        (0.97, 0.95)
    } else {
        (0.93, 0.90)
    };
    match group {
        PositionGroup::Quarterback => qb,
        PositionGroup::RunningBack => rb,
        _ => 1.0,
    }
}

/// Multiplier actually applied to `base`: the step multiplier, reduced just
/// enough that the adjusted grade stays on the 0–100 scale.
pub fn applied_multiplier(base: f64, step_multiplier: f64) -> f64 {
    if base > 0.0 && base * step_multiplier > 100.0 {
        100.0 / base
    } else {
        step_multiplier
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillGrade {
    pub player_id: String,
    pub player_name: String,
    pub position: String,
    pub position_group: PositionGroup,
    pub team: String,
    pub season: u16,
    pub week: u8,
    pub base_grade: f64,
    pub base_letter_grade: LetterGrade,
    /// Team OLINE overall for the week, when one was graded
    pub oline_grade: Option<f64>,
    /// Step multiplier for the O-line grade
    pub step_multiplier: f64,
    /// Multiplier applied; `adjusted_grade == round1(base_grade * multiplier)`
    pub multiplier: f64,
    pub adjusted_grade: f64,
    pub letter_grade: LetterGrade,
    pub grade_improvement: f64,
}

fn grade_one(
    stat: &SkillStatRecord,
    group: PositionGroup,
    oline_grade: Option<f64>,
) -> Result<SkillGrade, EntityFailure> {
    let entity = entity_key(stat);
    let raw = base_grade(group, stat).unwrap_or(0.0);
    let base = ensure_grade_bounds(Stage::SkillPosition, &entity, stat.season, round1(raw))?;

    let step_multiplier = oline_multiplier(group, oline_grade);
    let multiplier = applied_multiplier(base, step_multiplier);
    let adjusted = ensure_grade_bounds(Stage::SkillPosition, &entity, stat.season, round1(base * multiplier))?;

    Ok(SkillGrade {
        player_id: stat.player_id.clone(),
        player_name: stat.player_name.clone(),
        position: stat.position.clone(),
        position_group: group,
        team: stat.team.clone(),
        season: stat.season,
        week: stat.week,
        base_grade: base,
        base_letter_grade: letter_grade(base),
        oline_grade,
        step_multiplier,
        multiplier,
        adjusted_grade: adjusted,
        letter_grade: letter_grade(adjusted),
        grade_improvement: round1(adjusted - base),
    })
}

fn entity_key(stat: &SkillStatRecord) -> String {
    format!("{}/{}/{}", stat.player_id, stat.season, stat.week)
}

/// Grade every involved skill player-week.
///
/// QBs and RBs without a graded team O-line keep their base grade and are
/// listed in the output diagnostics.
pub fn grade_skill_positions(
    stats: &[SkillStatRecord],
    units: &[TeamUnitGrade],
) -> StageOutput<SkillGrade> {
    let index = TeamUnitIndex::new(units);
    let mut skipped = 0usize;
    let mut missing_line = Vec::new();

    let results: Vec<_> = stats
        .iter()
        .filter_map(|stat| {
            let group = PositionGroup::from_position(&stat.position).filter(|g| g.is_skill())?;
            if !stat.has_involvement() {
                skipped += 1;
                return None;
            }
            let oline_grade = match group {
                PositionGroup::Quarterback | PositionGroup::RunningBack => {
                    let grade = index
                        .get(&stat.team, stat.season, stat.week, LineUnit::Oline)
                        .map(|u: &TeamUnitGrade| u.overall);
                    if grade.is_none() {
                        missing_line.push(GradeError::MissingDependency {
                            stage: Stage::SkillPosition,
                            entity: entity_key(stat),
                            dependency: format!("{} OLINE unit grade for week {}", stat.team, stat.week),
                        });
                    }
                    grade
                }
                _ => None,
            };
            Some(grade_one(stat, group, oline_grade))
        })
        .collect();

    let mut out = StageOutput::collect(results);
    for diagnostic in missing_line {
        out.note(diagnostic);
    }
    out.records
        .sort_by(|a, b| (a.season, a.week, &a.player_id).cmp(&(b.season, b.week, &b.player_id)));
    let adjusted = out.records.iter().filter(|g| g.oline_grade.is_some()).count();
    debug!("Skill: skipped {} rows without involvement", skipped);
    info!(
        "Skill: {} player-weeks graded, {} with O-line adjustment",
        out.records.len(),
        adjusted
    );
    out
}
