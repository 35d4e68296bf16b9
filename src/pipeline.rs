//! Stage orchestration for one or more seasons.
//!
//! Stages run in dependency order: team units first, then individual
//! linemen and skill players (both read unit grades) alongside defenders,
//! then outliers and coaching over the skill and defensive output. Each stage
//! result is looked up in, or written to, the results cache under
//! `(stage, params fingerprint + input digest, season)`.

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::db::{CacheKey, GradeCache};
use crate::grading::coaching::{grade_coaches, CoachGrade, ContributorPool};
use crate::grading::defense::{grade_defenders, DefensiveGrade};
use crate::grading::line::{grade_linemen, LineGradeSet};
use crate::grading::outliers::{analyze_outliers, OutlierSummary};
use crate::grading::skill::{grade_skill_positions, SkillGrade};
use crate::grading::summary::{summarize, weekly_grades, SeasonSummary};
use crate::grading::team_unit::{grade_team_units, TeamUnitGrade};
use crate::error::GradeError;
use crate::grading::{sort_diagnostics, EntityFailure, GradingParams, Stage, StageOutput};
use crate::records::SeasonRecords;

/// Every stage's output for one season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonGrades {
    pub season: u16,
    pub team_units: Vec<TeamUnitGrade>,
    pub linemen: LineGradeSet,
    pub skill: Vec<SkillGrade>,
    pub defense: Vec<DefensiveGrade>,
    /// Skill and defensive players with at least `min_games` weeks
    pub summaries: Vec<SeasonSummary>,
    pub outliers: Vec<OutlierSummary>,
    pub coaches: Vec<CoachGrade>,
    /// Entities a stage could not grade
    pub failures: Vec<EntityFailure>,
    /// Fallbacks and omissions caused by missing input
    pub diagnostics: Vec<GradeError>,
}

/// Result of grading a set of seasons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingRun {
    pub params: GradingParams,
    pub seasons: Vec<SeasonGrades>,
}

impl GradingRun {
    pub fn failures(&self) -> impl Iterator<Item = &EntityFailure> {
        self.seasons.iter().flat_map(|s| s.failures.iter())
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &GradeError> {
        self.seasons.iter().flat_map(|s| s.diagnostics.iter())
    }

    pub fn coaches(&self) -> Vec<CoachGrade> {
        self.seasons.iter().flat_map(|s| s.coaches.iter().cloned()).collect()
    }
}

/// Return the cached value for `key`, or compute and store it.
fn cached<T, F>(cache: &dyn GradeCache, key: CacheKey, compute: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> T,
{
    if let Some(value) = cache
        .get(&key)
        .with_context(|| format!("{}: cache read failed for {}", cache.name(), key))?
    {
        match serde_json::from_value(value) {
            Ok(hit) => {
                debug!("Cache hit {}", key);
                return Ok(hit);
            }
            Err(e) => warn!("Discarding unreadable cache entry {}: {}", key, e),
        }
    }

    let fresh = compute();
    let value = serde_json::to_value(&fresh).with_context(|| format!("serialising {}", key))?;
    cache
        .put(&key, &value)
        .with_context(|| format!("{}: cache write failed for {}", cache.name(), key))?;
    Ok(fresh)
}

/// SHA-256 of the season's records, hex encoded.
fn input_digest(records: &SeasonRecords) -> Result<String> {
    let bytes = serde_json::to_vec(records).context("serialising season records")?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Grade one season through every stage.
pub fn run_season(records: &SeasonRecords, params: &GradingParams, cache: &dyn GradeCache) -> Result<SeasonGrades> {
    let season = records.season;
    let digest = input_digest(records)?;
    let entity = format!("{}-{}", params.fingerprint(), &digest[..16]);
    let key = |stage: Stage| CacheKey::new(stage, entity.clone(), season);

    let units: StageOutput<TeamUnitGrade> = cached(cache, key(Stage::TeamUnit), || {
        grade_team_units(&records.plays, params)
    })?;

    let (offense, defense) = rayon::join(
        || -> Result<_> {
            let linemen: (LineGradeSet, Vec<EntityFailure>) = cached(cache, key(Stage::IndividualLine), || {
                grade_linemen(&records.snaps, &units.records, params)
            })?;
            let skill: StageOutput<SkillGrade> = cached(cache, key(Stage::SkillPosition), || {
                grade_skill_positions(&records.skill_stats, &units.records)
            })?;
            Ok((linemen, skill))
        },
        || -> Result<StageOutput<DefensiveGrade>> {
            cached(cache, key(Stage::Defensive), || {
                grade_defenders(&records.plays, &records.rosters, &records.snaps)
            })
        },
    );
    let ((linemen, line_failures), skill) = offense?;
    let defense = defense?;

    let weekly = weekly_grades(&skill.records, &defense.records);
    let outliers: Vec<OutlierSummary> = cached(cache, key(Stage::Outlier), || analyze_outliers(&weekly, params))?;

    // Key-contributor rules carry their own game minimums.
    let pool = ContributorPool::new(summarize(&weekly, 1));
    let coaches: StageOutput<CoachGrade> = cached(cache, key(Stage::Coaching), || {
        grade_coaches(&records.schedule, &records.plays, &pool)
    })?;

    let mut failures: Vec<EntityFailure> = units
        .failures
        .into_iter()
        .chain(line_failures)
        .chain(skill.failures)
        .chain(defense.failures)
        .chain(coaches.failures)
        .collect();
    failures.sort_by(|a, b| (a.stage, &a.entity).cmp(&(b.stage, &b.entity)));
    if !failures.is_empty() {
        warn!("Season {}: {} entities failed grading", season, failures.len());
    }

    let mut diagnostics: Vec<GradeError> = linemen
        .diagnostic(season)
        .into_iter()
        .chain(units.diagnostics)
        .chain(skill.diagnostics)
        .chain(defense.diagnostics)
        .chain(coaches.diagnostics)
        .collect();
    sort_diagnostics(&mut diagnostics);

    info!(
        "Season {}: {} unit grades, {} linemen{}, {} skill, {} defensive, {} coaches",
        season,
        units.records.len(),
        linemen.grades().len(),
        if linemen.is_estimate() { " (estimated)" } else { "" },
        skill.records.len(),
        defense.records.len(),
        coaches.records.len()
    );

    Ok(SeasonGrades {
        season,
        team_units: units.records,
        linemen,
        summaries: summarize(&weekly, params.min_games),
        skill: skill.records,
        defense: defense.records,
        outliers,
        coaches: coaches.records,
        failures,
        diagnostics,
    })
}

/// Grade every season. Seasons are independent and run in parallel; output
/// is ordered by season.
pub fn run_grading(seasons: Vec<SeasonRecords>, params: &GradingParams, cache: &dyn GradeCache) -> Result<GradingRun> {
    let mut graded = seasons
        .par_iter()
        .map(|records| run_season(records, params, cache).with_context(|| format!("grading season {}", records.season)))
        .collect::<Result<Vec<_>>>()?;
    graded.sort_by_key(|s| s.season);
    Ok(GradingRun {
        params: *params,
        seasons: graded,
    })
}
