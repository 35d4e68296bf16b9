//! Head-coach grades: win-percentage base grade adjusted for the talent of
//! the team's key contributors.
//!
//! Each coach-season moves through a fixed progression, one type per state:
//!
//! ```text
//! CoachRecord ─grade_base─▶ BaseGraded ─select_key_contributors─▶ ContributorsSelected
//!             ─tier_roster─▶ RosterTiered ─adjust─▶ CoachGrade
//! ```
//!
//! Every transition consumes its input, so a grade can only be recomputed by
//! starting again from the schedule.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::summary::SeasonSummary;
use super::{
    ensure_grade_bounds, letter_grade, ratio, round1, EntityFailure, GradingParams, LetterGrade, Stage, StageOutput,
};
use crate::error::GradeError;
use crate::records::{PlayEvent, PlayType, PositionGroup, ScheduleGame};

/// League-average key-contributor grade.
pub const LEAGUE_AVERAGE_CONTRIBUTOR_GRADE: f64 = 67.0;
/// Expected coaching grade for a league-average roster.
pub const LEAGUE_EXPECTED_PERFORMANCE: f64 = 65.0;
/// Expected-grade points per point of roster mean above league average.
const ROSTER_SENSITIVITY: f64 = 4.0;
/// Share of the gap between realised and expected grade that is credited.
const ADJUSTMENT_RATE: f64 = 0.5;
pub const MAX_ADJUSTMENT: f64 = 12.0;

// ── Coach records ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    Win,
    Loss,
    Tie,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachGame {
    pub game_id: String,
    pub week: u8,
    pub team: String,
    pub opponent: String,
    pub home: bool,
    pub points_for: Option<u32>,
    pub points_against: Option<u32>,
    /// `None` until the game is played
    pub result: Option<GameResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachRecord {
    pub coach: String,
    pub season: u16,
    /// Teams coached this season, sorted
    pub teams: Vec<String>,
    /// Team with the most games coached
    pub primary_team: String,
    /// Games in week order
    pub games: Vec<CoachGame>,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
}

impl CoachRecord {
    pub fn decided_games(&self) -> u32 {
        self.wins + self.losses + self.ties
    }

    /// Ties count as half a win. `None` before any game is decided.
    pub fn win_pct(&self) -> Option<f64> {
        let decided = self.decided_games();
        if decided == 0 {
            return None;
        }
        Some((self.wins as f64 + 0.5 * self.ties as f64) / decided as f64)
    }

    pub fn record_string(&self) -> String {
        if self.ties > 0 {
            format!("{}-{}-{}", self.wins, self.losses, self.ties)
        } else {
            format!("{}-{}", self.wins, self.losses)
        }
    }

    pub fn entity_key(&self) -> String {
        format!("{}/{}", self.coach, self.season)
    }

    pub fn grade_base(self) -> Result<BaseGraded, GradeError> {
        let Some(win_pct) = self.win_pct() else {
            return Err(GradeError::InsufficientSample {
                stage: Stage::Coaching,
                entity: self.entity_key(),
                observed: 0,
                required: 1,
                unit: "decided games".into(),
            });
        };
        Ok(BaseGraded {
            base_grade: round1(base_grade_from_win_pct(win_pct)),
            win_pct,
            record: self,
        })
    }
}

fn game_result(points_for: Option<u32>, points_against: Option<u32>) -> Option<GameResult> {
    let (pf, pa) = (points_for?, points_against?);
    Some(match pf.cmp(&pa) {
        std::cmp::Ordering::Greater => GameResult::Win,
        std::cmp::Ordering::Less => GameResult::Loss,
        std::cmp::Ordering::Equal => GameResult::Tie,
    })
}

/// Build one record per (coach, season) from both sidelines of the schedule.
pub fn extract_coach_records(schedule: &[ScheduleGame]) -> Vec<CoachRecord> {
    let mut games: BTreeMap<(u16, String), Vec<CoachGame>> = BTreeMap::new();

    for g in schedule {
        let sides = [
            (&g.home_coach, &g.home_team, &g.away_team, true, g.home_score, g.away_score),
            (&g.away_coach, &g.away_team, &g.home_team, false, g.away_score, g.home_score),
        ];
        for (coach, team, opponent, home, pf, pa) in sides {
            let Some(coach) = coach.as_deref().map(str::trim).filter(|c| !c.is_empty()) else {
                continue;
            };
            games.entry((g.season, coach.to_string())).or_default().push(CoachGame {
                game_id: g.game_id.clone(),
                week: g.week,
                team: team.clone(),
                opponent: opponent.clone(),
                home,
                points_for: pf,
                points_against: pa,
                result: game_result(pf, pa),
            });
        }
    }

    games
        .into_iter()
        .map(|((season, coach), mut games)| {
            games.sort_by(|a, b| (a.week, &a.game_id).cmp(&(b.week, &b.game_id)));

            let mut per_team: BTreeMap<&str, u32> = BTreeMap::new();
            for g in &games {
                *per_team.entry(g.team.as_str()).or_default() += 1;
            }
            // BTreeMap iterates team ids ascending, so the first max wins ties.
            let primary_team = per_team
                .iter()
                .fold(None, |best: Option<(&str, u32)>, (team, n)| match best {
                    Some((_, m)) if m >= *n => best,
                    _ => Some((*team, *n)),
                })
                .map(|(t, _)| t.to_string())
                .unwrap_or_default();
            let teams = per_team.keys().map(|t| t.to_string()).collect();

            let count = |r: GameResult| games.iter().filter(|g| g.result == Some(r)).count() as u32;
            let (wins, losses, ties) = (count(GameResult::Win), count(GameResult::Loss), count(GameResult::Tie));

            CoachRecord {
                coach,
                season,
                teams,
                primary_team,
                games,
                wins,
                losses,
                ties,
            }
        })
        .collect()
}

/// Piecewise-linear base grade from win percentage (0.0–1.0).
pub fn base_grade_from_win_pct(win_pct: f64) -> f64 {
    let wp = win_pct.clamp(0.0, 1.0);
    if wp >= 0.8 {
        90.0 + (wp - 0.8) / 0.2 * 10.0
    } else if wp >= 0.7 {
        80.0 + (wp - 0.7) / 0.1 * 10.0
    } else if wp >= 0.6 {
        75.0 + (wp - 0.6) / 0.1 * 5.0
    } else if wp >= 0.5 {
        65.0 + (wp - 0.5) / 0.1 * 10.0
    } else if wp >= 0.4 {
        55.0 + (wp - 0.4) / 0.1 * 10.0
    } else {
        40.0 + wp / 0.4 * 15.0
    }
}

// ── Play efficiency ────────────────────────────────────────────────────────

/// Pass and run outcomes accumulated for one side of the ball.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct SideTally {
    pass_plays: u32,
    run_plays: u32,
    pass_yards: f64,
    run_yards: f64,
    sacks: u32,
    interceptions: u32,
    stuffs: u32,
}

impl SideTally {
    fn add(&mut self, play: &PlayEvent) {
        match play.play_type {
            PlayType::Pass => {
                self.pass_plays += 1;
                self.pass_yards += play.yards_gained;
                self.sacks += u32::from(play.sack);
                self.interceptions += u32::from(play.interception_by.is_some());
            }
            PlayType::Run => {
                self.run_plays += 1;
                self.run_yards += play.yards_gained;
                self.stuffs += u32::from(play.yards_gained <= 0.0);
            }
            PlayType::Other => {}
        }
    }

    fn merge(&mut self, other: &SideTally) {
        self.pass_plays += other.pass_plays;
        self.run_plays += other.run_plays;
        self.pass_yards += other.pass_yards;
        self.run_yards += other.run_yards;
        self.sacks += other.sacks;
        self.interceptions += other.interceptions;
        self.stuffs += other.stuffs;
    }

    fn summary(&self) -> Option<SideEfficiency> {
        let plays = self.pass_plays + self.run_plays;
        let pass_rate = ratio(self.pass_plays as f64, plays as f64)?;
        let (passes, runs) = (self.pass_plays as f64, self.run_plays as f64);
        Some(SideEfficiency {
            pass_plays: self.pass_plays,
            run_plays: self.run_plays,
            pass_rate,
            yards_per_pass_play: ratio(self.pass_yards, passes),
            yards_per_carry: ratio(self.run_yards, runs),
            sack_rate: ratio(self.sacks as f64, passes),
            interception_rate: ratio(self.interceptions as f64, passes),
            stuff_rate: ratio(self.stuffs as f64, runs),
        })
    }
}

/// Pass/run efficiency for one side of the ball. On defense every figure
/// is what the opponents achieved; sacks and interceptions are takeaways.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideEfficiency {
    pub pass_plays: u32,
    pub run_plays: u32,
    pub pass_rate: f64,
    pub yards_per_pass_play: Option<f64>,
    pub yards_per_carry: Option<f64>,
    /// Sacks per pass play
    pub sack_rate: Option<f64>,
    /// Interceptions per pass play
    pub interception_rate: Option<f64>,
    /// Share of runs gaining no yards
    pub stuff_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayEfficiency {
    pub offense: Option<SideEfficiency>,
    pub defense: Option<SideEfficiency>,
}

/// Play tallies per (game, team), with the team on offense and on defense.
#[derive(Debug, Default)]
pub struct GamePlays {
    offense: HashMap<(String, String), SideTally>,
    defense: HashMap<(String, String), SideTally>,
}

impl GamePlays {
    pub fn new(plays: &[PlayEvent]) -> Self {
        let mut index = Self::default();
        for play in plays {
            if let Some(team) = &play.offense_team {
                index.offense.entry((play.game_id.clone(), team.clone())).or_default().add(play);
            }
            if let Some(team) = &play.defense_team {
                index.defense.entry((play.game_id.clone(), team.clone())).or_default().add(play);
            }
        }
        index
    }

    /// Efficiency over the coach's games, from their own sideline.
    pub fn efficiency(&self, games: &[CoachGame]) -> PlayEfficiency {
        let (mut offense, mut defense) = (SideTally::default(), SideTally::default());
        for g in games {
            let key = (g.game_id.clone(), g.team.clone());
            if let Some(t) = self.offense.get(&key) {
                offense.merge(t);
            }
            if let Some(t) = self.defense.get(&key) {
                defense.merge(t);
            }
        }
        PlayEfficiency {
            offense: offense.summary(),
            defense: defense.summary(),
        }
    }
}

// ── Key contributors ───────────────────────────────────────────────────────

/// How many players of a position group count as key contributors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionRule {
    pub group: PositionGroup,
    pub limit: usize,
    pub min_games: u32,
}

pub const SELECTION_RULES: [SelectionRule; 5] = [
    SelectionRule { group: PositionGroup::Quarterback, limit: 2, min_games: 1 },
    SelectionRule { group: PositionGroup::RunningBack, limit: 3, min_games: 4 },
    SelectionRule { group: PositionGroup::Receiver, limit: 6, min_games: 6 },
    SelectionRule { group: PositionGroup::Linebacker, limit: 15, min_games: 8 },
    SelectionRule { group: PositionGroup::Secondary, limit: 15, min_games: 8 },
];

/// Season summaries of every graded skill and defensive player, by team.
#[derive(Debug, Clone, Default)]
pub struct ContributorPool {
    by_team: HashMap<(String, u16), Vec<SeasonSummary>>,
}

impl ContributorPool {
    pub fn new(summaries: Vec<SeasonSummary>) -> Self {
        let mut by_team: HashMap<(String, u16), Vec<SeasonSummary>> = HashMap::new();
        for s in summaries {
            by_team.entry((s.team.clone(), s.season)).or_default().push(s);
        }
        Self { by_team }
    }

    pub fn team(&self, team: &str, season: u16) -> &[SeasonSummary] {
        self.by_team
            .get(&(team.to_string(), season))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerTier {
    Elite,
    Good,
    Average,
    BelowAverage,
}

impl PlayerTier {
    pub fn from_grade(grade: f64) -> Self {
        if grade >= 78.0 {
            PlayerTier::Elite
        } else if grade >= 70.0 {
            PlayerTier::Good
        } else if grade >= 62.0 {
            PlayerTier::Average
        } else {
            PlayerTier::BelowAverage
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RosterTier {
    Elite,
    Good,
    Average,
    BelowAverage,
    Poor,
}

impl RosterTier {
    pub fn from_mean(mean: f64) -> Self {
        if mean >= 72.0 {
            RosterTier::Elite
        } else if mean >= 68.0 {
            RosterTier::Good
        } else if mean >= 64.0 {
            RosterTier::Average
        } else if mean >= 60.0 {
            RosterTier::BelowAverage
        } else {
            RosterTier::Poor
        }
    }
}

impl fmt::Display for RosterTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RosterTier::Elite => "Elite",
            RosterTier::Good => "Good",
            RosterTier::Average => "Average",
            RosterTier::BelowAverage => "Below Average",
            RosterTier::Poor => "Poor",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyContributor {
    pub player_id: String,
    pub player_name: String,
    pub position: String,
    pub position_group: PositionGroup,
    pub games: u32,
    pub mean_grade: f64,
    pub tier: Option<PlayerTier>,
}

/// Ranked, position-scoped key contributors for one team-season.
pub fn select_key_contributors(candidates: &[SeasonSummary]) -> Vec<KeyContributor> {
    let mut selected = Vec::new();
    for rule in SELECTION_RULES {
        let mut pool: Vec<&SeasonSummary> = candidates
            .iter()
            .filter(|s| s.position_group == rule.group && s.games >= rule.min_games)
            .collect();
        pool.sort_by(|a, b| {
            b.games
                .cmp(&a.games)
                .then_with(|| b.mean_grade.total_cmp(&a.mean_grade))
                .then_with(|| a.player_id.cmp(&b.player_id))
        });
        selected.extend(pool.into_iter().take(rule.limit).map(|s| KeyContributor {
            player_id: s.player_id.clone(),
            player_name: s.player_name.clone(),
            position: s.position.clone(),
            position_group: s.position_group,
            games: s.games,
            mean_grade: s.mean_grade,
            tier: None,
        }));
    }
    selected
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub elite: u32,
    pub good: u32,
    pub average: u32,
    pub below_average: u32,
}

/// Depth on a 0–40 scale: 4 points per contributor graded 90+, 3 for 80+,
/// 2 for 70+, 1 for 60+, averaged and scaled by 10.
pub fn depth_score(grades: &[f64]) -> f64 {
    if grades.is_empty() {
        return 0.0;
    }
    let points: u32 = grades
        .iter()
        .map(|&g| match g {
            g if g >= 90.0 => 4,
            g if g >= 80.0 => 3,
            g if g >= 70.0 => 2,
            g if g >= 60.0 => 1,
            _ => 0,
        })
        .sum();
    round1(points as f64 / grades.len() as f64 * 10.0)
}

/// Key-contributor quality for one side of the ball.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitQuality {
    pub contributors: u32,
    pub mean_grade: f64,
    pub tier: RosterTier,
    pub depth_score: f64,
}

impl UnitQuality {
    fn from_grades(grades: &[f64]) -> Option<Self> {
        if grades.is_empty() {
            return None;
        }
        let mean_grade = round1(grades.iter().sum::<f64>() / grades.len() as f64);
        Some(Self {
            contributors: grades.len() as u32,
            mean_grade,
            tier: RosterTier::from_mean(mean_grade),
            depth_score: depth_score(grades),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterQualitySnapshot {
    pub team: String,
    pub season: u16,
    pub contributors: Vec<KeyContributor>,
    pub tier_counts: TierCounts,
    pub mean_grade: f64,
    pub tier: RosterTier,
    pub depth_score: f64,
    /// Skill-position contributors
    pub offense: Option<UnitQuality>,
    /// Linebacker and secondary contributors
    pub defense: Option<UnitQuality>,
}

impl RosterQualitySnapshot {
    /// Tier every contributor and the roster as a whole. `None` when no
    /// player met a selection rule.
    pub fn build(team: &str, season: u16, mut contributors: Vec<KeyContributor>) -> Option<Self> {
        if contributors.is_empty() {
            return None;
        }
        let mut tier_counts = TierCounts::default();
        for c in &mut contributors {
            let tier = PlayerTier::from_grade(c.mean_grade);
            match tier {
                PlayerTier::Elite => tier_counts.elite += 1,
                PlayerTier::Good => tier_counts.good += 1,
                PlayerTier::Average => tier_counts.average += 1,
                PlayerTier::BelowAverage => tier_counts.below_average += 1,
            }
            c.tier = Some(tier);
        }
        let grades: Vec<f64> = contributors.iter().map(|c| c.mean_grade).collect();
        let side = |offense: bool| -> Vec<f64> {
            contributors
                .iter()
                .filter(|c| c.position_group.is_skill() == offense)
                .map(|c| c.mean_grade)
                .collect()
        };
        let (offense, defense) = (UnitQuality::from_grades(&side(true)), UnitQuality::from_grades(&side(false)));
        let mean_grade = round1(grades.iter().sum::<f64>() / grades.len() as f64);
        Some(Self {
            team: team.to_string(),
            season,
            tier_counts,
            mean_grade,
            tier: RosterTier::from_mean(mean_grade),
            depth_score: depth_score(&grades),
            offense,
            defense,
            contributors,
        })
    }
}

// ── Adjustment ─────────────────────────────────────────────────────────────

/// Grade a coach of a roster with this mean would be expected to earn.
pub fn expected_performance(roster_mean: f64) -> f64 {
    LEAGUE_EXPECTED_PERFORMANCE + ROSTER_SENSITIVITY * (roster_mean - LEAGUE_AVERAGE_CONTRIBUTOR_GRADE)
}

/// Signed roster adjustment, bounded to ±12 and to keep the adjusted grade
/// inside [0, 100].
pub fn roster_adjustment(base_grade: f64, roster_mean: f64) -> f64 {
    let raw = ADJUSTMENT_RATE * (base_grade - expected_performance(roster_mean));
    let lo = (-MAX_ADJUSTMENT).max(-base_grade);
    let hi = MAX_ADJUSTMENT.min(100.0 - base_grade);
    round1(raw.clamp(lo, hi))
}

// ── Progression states ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct BaseGraded {
    pub record: CoachRecord,
    pub win_pct: f64,
    pub base_grade: f64,
}

impl BaseGraded {
    pub fn select_key_contributors(self, pool: &ContributorPool) -> ContributorsSelected {
        let candidates = pool.team(&self.record.primary_team, self.record.season);
        let contributors = select_key_contributors(candidates);
        ContributorsSelected { base: self, contributors }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContributorsSelected {
    pub base: BaseGraded,
    pub contributors: Vec<KeyContributor>,
}

impl ContributorsSelected {
    pub fn tier_roster(self) -> RosterTiered {
        let roster = RosterQualitySnapshot::build(
            &self.base.record.primary_team,
            self.base.record.season,
            self.contributors,
        );
        RosterTiered { base: self.base, roster }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RosterTiered {
    pub base: BaseGraded,
    pub roster: Option<RosterQualitySnapshot>,
}

impl RosterTiered {
    pub fn adjust(self, plays: &GamePlays) -> Result<CoachGrade, EntityFailure> {
        let RosterTiered { base, roster } = self;
        let entity = base.record.entity_key();
        let season = base.record.season;
        let play_efficiency = plays.efficiency(&base.record.games);

        let (expected, adjustment) = match &roster {
            Some(r) => (
                Some(round1(expected_performance(r.mean_grade))),
                roster_adjustment(base.base_grade, r.mean_grade),
            ),
            None => (None, 0.0),
        };
        let side_adjustment = |side: Option<&UnitQuality>| side.map(|q| roster_adjustment(base.base_grade, q.mean_grade));
        let offense_adjustment = side_adjustment(roster.as_ref().and_then(|r| r.offense.as_ref()));
        let defense_adjustment = side_adjustment(roster.as_ref().and_then(|r| r.defense.as_ref()));
        let base_grade = ensure_grade_bounds(Stage::Coaching, &entity, season, base.base_grade)?;
        let adjusted = ensure_grade_bounds(Stage::Coaching, &entity, season, round1(base_grade + adjustment))?;

        let record = base.record;
        Ok(CoachGrade {
            record: record.record_string(),
            games_decided: record.decided_games(),
            coach: record.coach,
            season,
            team: record.primary_team,
            teams: record.teams,
            wins: record.wins,
            losses: record.losses,
            ties: record.ties,
            win_pct: base.win_pct,
            base_grade,
            base_letter_grade: letter_grade(base_grade),
            roster_quality: roster,
            expected_performance: expected,
            adjustment,
            adjusted_grade: adjusted,
            letter_grade: letter_grade(adjusted),
            efficiency: adjustment,
            offense_adjustment,
            defense_adjustment,
            play_efficiency,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachGrade {
    pub coach: String,
    pub season: u16,
    /// Primary team
    pub team: String,
    pub teams: Vec<String>,
    pub record: String,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub games_decided: u32,
    pub win_pct: f64,
    pub base_grade: f64,
    pub base_letter_grade: LetterGrade,
    /// Absent when no key contributor could be selected
    pub roster_quality: Option<RosterQualitySnapshot>,
    pub expected_performance: Option<f64>,
    pub adjustment: f64,
    pub adjusted_grade: f64,
    pub letter_grade: LetterGrade,
    pub efficiency: f64,
    /// Adjustment the offensive contributors alone would imply
    pub offense_adjustment: Option<f64>,
    /// Adjustment the defensive contributors alone would imply
    pub defense_adjustment: Option<f64>,
    pub play_efficiency: PlayEfficiency,
}

/// Run one coach-season through every progression state.
pub fn grade_coach(
    record: CoachRecord,
    pool: &ContributorPool,
    plays: &GamePlays,
) -> Option<Result<CoachGrade, EntityFailure>> {
    match record.grade_base() {
        Ok(base) => Some(base.select_key_contributors(pool).tier_roster().adjust(plays)),
        Err(e) => {
            debug!("{}", e);
            None
        }
    }
}

/// Grade every coach on the schedule. Coaches with no decided game are
/// omitted.
pub fn grade_coaches(
    schedule: &[ScheduleGame],
    plays: &[PlayEvent],
    pool: &ContributorPool,
) -> StageOutput<CoachGrade> {
    let records = extract_coach_records(schedule);
    let total = records.len();
    let game_plays = GamePlays::new(plays);

    let results: Vec<_> = records
        .into_par_iter()
        .filter_map(|record| grade_coach(record, pool, &game_plays))
        .collect();

    let mut out = StageOutput::collect(results);
    out.records
        .sort_by(|a, b| (a.season, &a.coach).cmp(&(b.season, &b.coach)));
    let without_roster = out.records.iter().filter(|g| g.roster_quality.is_none()).count();
    info!(
        "Coaching: {} of {} coach-seasons graded, {} without roster snapshot",
        out.records.len(),
        total,
        without_roster
    );
    out
}

// ── Reports ────────────────────────────────────────────────────────────────

/// Coaches who got the most out of their rosters.
pub fn efficiency_leaders<'a>(grades: &'a [CoachGrade], params: &GradingParams) -> Vec<&'a CoachGrade> {
    let mut leaders: Vec<&'a CoachGrade> = grades
        .iter()
        .filter(|g| g.roster_quality.is_some() && g.games_decided >= params.min_coach_games)
        .collect();
    leaders.sort_by(|a, b| {
        b.efficiency
            .total_cmp(&a.efficiency)
            .then_with(|| b.adjusted_grade.total_cmp(&a.adjusted_grade))
            .then_with(|| a.coach.cmp(&b.coach))
    });
    leaders
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachComparison {
    pub coach: String,
    pub season: u16,
    pub team: String,
    pub record: String,
    pub base_grade: f64,
    pub adjusted_grade: f64,
    pub delta: f64,
    pub roster_tier: Option<RosterTier>,
    pub roster_mean: Option<f64>,
}

/// Side-by-side rows for the named coaches, in request order.
pub fn compare_coaches(grades: &[CoachGrade], names: &[&str]) -> Vec<CoachComparison> {
    names
        .iter()
        .flat_map(|name| grades.iter().filter(move |g| g.coach == *name))
        .map(|g| CoachComparison {
            coach: g.coach.clone(),
            season: g.season,
            team: g.team.clone(),
            record: g.record.clone(),
            base_grade: g.base_grade,
            adjusted_grade: g.adjusted_grade,
            delta: round1(g.adjusted_grade - g.base_grade),
            roster_tier: g.roster_quality.as_ref().map(|r| r.tier),
            roster_mean: g.roster_quality.as_ref().map(|r| r.mean_grade),
        })
        .collect()
}
