//! Season consistency and outlier-week detection over weekly grades.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::summary::WeeklyGrade;
use super::{letter_grade, round1, GradingParams, LetterGrade};
use crate::records::PositionGroup;

/// Below this a standard deviation is float noise from identical grades.
const STD_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceType {
    Over,
    Under,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekDeviation {
    pub week: u8,
    pub team: String,
    pub grade: f64,
    /// `grade - mean`
    pub deviation: f64,
    pub performance: PerformanceType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierSummary {
    pub player_id: String,
    pub player_name: String,
    pub position_group: PositionGroup,
    pub season: u16,
    pub games: u32,
    pub mean_grade: f64,
    pub std_dev: f64,
    pub consistency: f64,
    pub best_grade: f64,
    pub worst_grade: f64,
    pub letter_grade: LetterGrade,
    pub over_performances: u32,
    pub under_performances: u32,
    pub weeks: Vec<WeekDeviation>,
}

impl OutlierSummary {
    pub fn outlier_weeks(&self) -> impl Iterator<Item = &WeekDeviation> {
        self.weeks
            .iter()
            .filter(|w| w.performance != PerformanceType::Normal)
    }
}

/// Sample standard deviation (n - 1). Zero for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}

fn classify(grade: f64, mean: f64, std: f64, threshold: f64) -> PerformanceType {
    if std == 0.0 {
        PerformanceType::Normal
    } else if grade > mean + threshold * std {
        PerformanceType::Over
    } else if grade < mean - threshold * std {
        PerformanceType::Under
    } else {
        PerformanceType::Normal
    }
}

fn summarize_player(weeks: &[&WeeklyGrade], threshold: f64) -> OutlierSummary {
    let grades: Vec<f64> = weeks.iter().map(|w| w.grade).collect();
    let mean = grades.iter().sum::<f64>() / grades.len() as f64;
    let std = match sample_std(&grades) {
        s if s < STD_EPSILON => 0.0,
        s => s,
    };

    let week_rows: Vec<WeekDeviation> = weeks
        .iter()
        .map(|w| WeekDeviation {
            week: w.week,
            team: w.team.clone(),
            grade: w.grade,
            deviation: round1(w.grade - mean),
            performance: classify(w.grade, mean, std, threshold),
        })
        .collect();
    let count = |kind: PerformanceType| week_rows.iter().filter(|w| w.performance == kind).count() as u32;

    let first = weeks[0];
    OutlierSummary {
        player_id: first.player_id.clone(),
        player_name: first.player_name.clone(),
        position_group: first.position_group,
        season: first.season,
        games: weeks.len() as u32,
        mean_grade: round1(mean),
        std_dev: round1(std),
        consistency: round1((100.0 - std).clamp(0.0, 100.0)),
        best_grade: grades.iter().copied().fold(f64::MIN, f64::max),
        worst_grade: grades.iter().copied().fold(f64::MAX, f64::min),
        letter_grade: letter_grade(round1(mean)),
        over_performances: count(PerformanceType::Over),
        under_performances: count(PerformanceType::Under),
        weeks: week_rows,
    }
}

/// Outlier summaries for every (season, player, position group) with at
/// least `min_games` weekly grades, sorted by player.
pub fn analyze_outliers(weekly: &[WeeklyGrade], params: &GradingParams) -> Vec<OutlierSummary> {
    let mut by_player: BTreeMap<(u16, &str, PositionGroup), Vec<&WeeklyGrade>> = BTreeMap::new();
    for w in weekly {
        by_player
            .entry((w.season, w.player_id.as_str(), w.position_group))
            .or_default()
            .push(w);
    }

    let summaries: Vec<OutlierSummary> = by_player
        .into_values()
        .filter(|weeks| weeks.len() as u32 >= params.min_games.max(1))
        .map(|mut weeks| {
            weeks.sort_by_key(|w| w.week);
            summarize_player(&weeks, params.std_threshold)
        })
        .collect();

    let flagged = summaries
        .iter()
        .map(|s| (s.over_performances + s.under_performances) as usize)
        .sum::<usize>();
    info!(
        "Outliers: {} player-seasons analysed, {} outlier weeks",
        summaries.len(),
        flagged
    );
    summaries
}

/// Best `n` players in a position group by mean grade, then consistency.
pub fn top_performers(summaries: &[OutlierSummary], group: PositionGroup, n: usize) -> Vec<&OutlierSummary> {
    let mut pool: Vec<&OutlierSummary> = summaries.iter().filter(|s| s.position_group == group).collect();
    pool.sort_by(|a, b| {
        b.mean_grade
            .total_cmp(&a.mean_grade)
            .then_with(|| b.consistency.total_cmp(&a.consistency))
            .then_with(|| a.player_id.cmp(&b.player_id))
    });
    pool.truncate(n);
    pool
}
