//! Team offensive- and defensive-line unit grades from play-by-play.
//!
//! Each unit gets two sub-scores on a fixed band (a linear map of a success
//! rate between a floor and a ceiling) and an overall grade that is a fixed
//! 60/40 blend of them:
//!
//! | unit  | pass sub-score            | run sub-score             | band   |
//! |-------|---------------------------|---------------------------|--------|
//! | OLINE | clean-pocket rate .70–.95 | 4+ yard run rate .25–.60  | 60–95  |
//! | DLINE | pressure rate .05–.30     | ≤2 yard run rate .15–.45  | 60–90  |

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ensure_grade_bounds, letter_grade, ratio, round1, GradingParams, LetterGrade, Stage, StageOutput};
use crate::records::{PlayEvent, PlayType};

/// Weight of the pass sub-score in the overall unit grade.
pub const PASS_WEIGHT: f64 = 0.6;

/// A run of this many yards or more is a blocking success.
const RUN_SUCCESS_YARDS: f64 = 4.0;
/// A run of this many yards or fewer is a defensive stuff.
const RUN_STUFF_YARDS: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LineUnit {
    Oline,
    Dline,
}

impl fmt::Display for LineUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineUnit::Oline => f.write_str("OLINE"),
            LineUnit::Dline => f.write_str("DLINE"),
        }
    }
}

/// Linear map of `rate` from `[floor, ceiling]` onto `[low, high]`, saturating
/// at both ends.
#[derive(Debug, Clone, Copy)]
struct Band {
    floor: f64,
    ceiling: f64,
    low: f64,
    high: f64,
}

impl Band {
    fn score(&self, rate: Option<f64>) -> f64 {
        let Some(rate) = rate else {
            return self.low;
        };
        let t = ((rate - self.floor) / (self.ceiling - self.floor)).clamp(0.0, 1.0);
        self.low + (self.high - self.low) * t
    }
}

const PASS_PROTECTION_BAND: Band = Band { floor: 0.70, ceiling: 0.95, low: 60.0, high: 95.0 };
const RUN_BLOCKING_BAND: Band = Band { floor: 0.25, ceiling: 0.60, low: 60.0, high: 95.0 };
const PASS_RUSH_BAND: Band = Band { floor: 0.05, ceiling: 0.30, low: 60.0, high: 90.0 };
const RUN_STUFF_BAND: Band = Band { floor: 0.15, ceiling: 0.45, low: 60.0, high: 90.0 };

/// Grade for one team's line unit in one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamUnitGrade {
    pub team: String,
    pub season: u16,
    pub week: u8,
    pub unit: LineUnit,
    /// Pass protection (OLINE) or pass rush (DLINE) sub-score
    pub pass_score: f64,
    /// Run blocking (OLINE) or run defense (DLINE) sub-score
    pub run_score: f64,
    pub overall: f64,
    pub letter_grade: LetterGrade,
    /// Clean-pocket rate (OLINE) or pressure rate (DLINE)
    pub pass_rate: Option<f64>,
    /// 4+ yard run rate (OLINE) or ≤2 yard stuff rate (DLINE)
    pub run_rate: Option<f64>,
    pub pass_plays: u32,
    pub run_plays: u32,
    pub total_plays: u32,
}

impl TeamUnitGrade {
    pub fn entity_key(&self) -> String {
        format!("{}/{}/{}/{}", self.team, self.season, self.week, self.unit)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct UnitTally {
    pass_plays: u32,
    clean_pockets: u32,
    sacks: u32,
    qb_hits: u32,
    run_plays: u32,
    successful_runs: u32,
    stuffed_runs: u32,
}

impl UnitTally {
    fn add(&mut self, play: &PlayEvent) {
        match play.play_type {
            PlayType::Pass => {
                self.pass_plays += 1;
                if play.sack {
                    self.sacks += 1;
                }
                if play.qb_hit {
                    self.qb_hits += 1;
                }
                if !play.sack && !play.qb_hit {
                    self.clean_pockets += 1;
                }
            }
            PlayType::Run => {
                self.run_plays += 1;
                if play.yards_gained >= RUN_SUCCESS_YARDS {
                    self.successful_runs += 1;
                }
                if play.yards_gained <= RUN_STUFF_YARDS {
                    self.stuffed_runs += 1;
                }
            }
            PlayType::Other => {}
        }
    }

    fn total_plays(&self) -> u32 {
        self.pass_plays + self.run_plays
    }
}

type UnitKey = (String, u16, u8, LineUnit);

fn tally_units(plays: &[PlayEvent]) -> BTreeMap<UnitKey, UnitTally> {
    let mut tallies: BTreeMap<UnitKey, UnitTally> = BTreeMap::new();
    for play in plays.iter().filter(|p| p.play_type != PlayType::Other) {
        if let Some(team) = &play.offense_team {
            tallies
                .entry((team.clone(), play.season, play.week, LineUnit::Oline))
                .or_default()
                .add(play);
        }
        if let Some(team) = &play.defense_team {
            tallies
                .entry((team.clone(), play.season, play.week, LineUnit::Dline))
                .or_default()
                .add(play);
        }
    }
    tallies
}

/// Overall unit grade from its two sub-scores.
pub fn overall_unit_grade(pass_score: f64, run_score: f64) -> f64 {
    PASS_WEIGHT * pass_score + (1.0 - PASS_WEIGHT) * run_score
}

/// OLINE sub-scores from clean-pocket and run-success rates.
pub fn oline_subscores(pass_pro_rate: Option<f64>, run_success_rate: Option<f64>) -> (f64, f64) {
    (
        PASS_PROTECTION_BAND.score(pass_pro_rate),
        RUN_BLOCKING_BAND.score(run_success_rate),
    )
}

/// DLINE sub-scores from pressure and run-stuff rates.
pub fn dline_subscores(pressure_rate: Option<f64>, run_stuff_rate: Option<f64>) -> (f64, f64) {
    (
        PASS_RUSH_BAND.score(pressure_rate),
        RUN_STUFF_BAND.score(run_stuff_rate),
    )
}

fn grade_unit(key: UnitKey, tally: UnitTally) -> Result<TeamUnitGrade, super::EntityFailure> {
    let (team, season, week, unit) = key;
    let pass_plays = tally.pass_plays as f64;
    let run_plays = tally.run_plays as f64;

    let (pass_rate, run_rate) = match unit {
        LineUnit::Oline => (
            ratio(tally.clean_pockets as f64, pass_plays),
            ratio(tally.successful_runs as f64, run_plays),
        ),
        LineUnit::Dline => (
            ratio((tally.sacks + tally.qb_hits) as f64, pass_plays),
            ratio(tally.stuffed_runs as f64, run_plays),
        ),
    };
    let (pass_score, run_score) = match unit {
        LineUnit::Oline => oline_subscores(pass_rate, run_rate),
        LineUnit::Dline => dline_subscores(pass_rate, run_rate),
    };

    let entity = format!("{}/{}/{}/{}", team, season, week, unit);
    let overall = ensure_grade_bounds(
        Stage::TeamUnit,
        &entity,
        season,
        round1(overall_unit_grade(pass_score, run_score)),
    )?;

    Ok(TeamUnitGrade {
        team,
        season,
        week,
        unit,
        pass_score: round1(pass_score),
        run_score: round1(run_score),
        overall,
        letter_grade: letter_grade(overall),
        pass_rate,
        run_rate,
        pass_plays: tally.pass_plays,
        run_plays: tally.run_plays,
        total_plays: tally.total_plays(),
    })
}

/// Grade every (team, week, unit) with at least `min_plays` pass and run
/// plays. Unit-weeks below the minimum are omitted, not zeroed.
pub fn grade_team_units(plays: &[PlayEvent], params: &GradingParams) -> StageOutput<TeamUnitGrade> {
    let tallies = tally_units(plays);
    let candidates = tallies.len();

    let results: Vec<_> = tallies
        .into_par_iter()
        .filter_map(|(key, tally)| {
            if tally.total_plays() < params.min_plays {
                debug!(
                    "{}/{}/{}/{}: {} plays below minimum {}",
                    key.0,
                    key.1,
                    key.2,
                    key.3,
                    tally.total_plays(),
                    params.min_plays
                );
                return None;
            }
            Some(grade_unit(key, tally))
        })
        .collect();

    let mut out = StageOutput::collect(results);
    out.records
        .sort_by(|a, b| (&a.team, a.season, a.week, a.unit).cmp(&(&b.team, b.season, b.week, b.unit)));
    info!(
        "Team units: {} graded, {} below {} plays",
        out.records.len(),
        candidates - out.records.len() - out.failures.len(),
        params.min_plays
    );
    out
}

/// Lookup of unit grades by (team, season, week, unit).
#[derive(Debug, Clone, Default)]
pub struct TeamUnitIndex<'a> {
    by_key: HashMap<(&'a str, u16, u8, LineUnit), &'a TeamUnitGrade>,
}

impl<'a> TeamUnitIndex<'a> {
    pub fn new(grades: &'a [TeamUnitGrade]) -> Self {
        let by_key = grades
            .iter()
            .map(|g| ((g.team.as_str(), g.season, g.week, g.unit), g))
            .collect();
        Self { by_key }
    }

    pub fn get(&self, team: &str, season: u16, week: u8, unit: LineUnit) -> Option<&'a TeamUnitGrade> {
        self.by_key.get(&(team, season, week, unit)).copied()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
