//! Per-week grade views shared by outlier analysis and coaching, and
//! season-level rollups built from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::defense::DefensiveGrade;
use super::skill::SkillGrade;
use super::{letter_grade, round1, LetterGrade};
use crate::records::PositionGroup;

/// One player-week grade, independent of which grader produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyGrade {
    pub player_id: String,
    pub player_name: String,
    pub position: String,
    pub position_group: PositionGroup,
    pub team: String,
    pub season: u16,
    pub week: u8,
    pub grade: f64,
}

impl From<&SkillGrade> for WeeklyGrade {
    fn from(g: &SkillGrade) -> Self {
        Self {
            player_id: g.player_id.clone(),
            player_name: g.player_name.clone(),
            position: g.position.clone(),
            position_group: g.position_group,
            team: g.team.clone(),
            season: g.season,
            week: g.week,
            grade: g.adjusted_grade,
        }
    }
}

impl From<&DefensiveGrade> for WeeklyGrade {
    fn from(g: &DefensiveGrade) -> Self {
        Self {
            player_id: g.player_id.clone(),
            player_name: g.player_name.clone(),
            position: g.position.clone(),
            position_group: g.position_group,
            team: g.team.clone(),
            season: g.season,
            week: g.week,
            grade: g.grade,
        }
    }
}

/// Weekly views of every skill and defensive grade.
pub fn weekly_grades(skill: &[SkillGrade], defense: &[DefensiveGrade]) -> Vec<WeeklyGrade> {
    skill
        .iter()
        .map(WeeklyGrade::from)
        .chain(defense.iter().map(WeeklyGrade::from))
        .collect()
}

/// A player's season with one team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonSummary {
    pub player_id: String,
    pub player_name: String,
    pub position: String,
    pub position_group: PositionGroup,
    pub team: String,
    pub season: u16,
    pub games: u32,
    pub mean_grade: f64,
    pub best_grade: f64,
    pub worst_grade: f64,
    pub letter_grade: LetterGrade,
}

/// Roll weekly grades up per (season, team, player, position group),
/// keeping players with at least `min_games` weeks.
pub fn summarize(weekly: &[WeeklyGrade], min_games: u32) -> Vec<SeasonSummary> {
    let mut groups: BTreeMap<(u16, &str, &str, PositionGroup), Vec<&WeeklyGrade>> = BTreeMap::new();
    for w in weekly {
        groups
            .entry((w.season, w.team.as_str(), w.player_id.as_str(), w.position_group))
            .or_default()
            .push(w);
    }

    groups
        .into_values()
        .filter(|weeks| weeks.len() as u32 >= min_games.max(1))
        .map(|weeks| {
            let n = weeks.len() as f64;
            let mean = round1(weeks.iter().map(|w| w.grade).sum::<f64>() / n);
            let best = weeks.iter().map(|w| w.grade).fold(f64::MIN, f64::max);
            let worst = weeks.iter().map(|w| w.grade).fold(f64::MAX, f64::min);
            // Latest week carries the current name and position.
            let latest = weeks.iter().max_by_key(|w| w.week).copied().unwrap_or(weeks[0]);
            SeasonSummary {
                player_id: latest.player_id.clone(),
                player_name: latest.player_name.clone(),
                position: latest.position.clone(),
                position_group: latest.position_group,
                team: latest.team.clone(),
                season: latest.season,
                games: weeks.len() as u32,
                mean_grade: mean,
                best_grade: best,
                worst_grade: worst,
                letter_grade: letter_grade(mean),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn weekly(id: &str, team: &str, group: PositionGroup, week: u8, grade: f64) -> WeeklyGrade {
        WeeklyGrade {
            player_id: id.into(),
            player_name: id.to_uppercase(),
            position: "X".into(),
            position_group: group,
            team: team.into(),
            season: 2023,
            week,
            grade,
        }
    }

    #[test]
    fn rollup_per_team_and_player() {
        let rows = vec![
            weekly("a", "KC", PositionGroup::Quarterback, 1, 80.0),
            weekly("a", "KC", PositionGroup::Quarterback, 2, 70.0),
            weekly("a", "KC", PositionGroup::Quarterback, 3, 75.5),
            weekly("a", "DEN", PositionGroup::Quarterback, 4, 60.0),
            weekly("b", "KC", PositionGroup::Receiver, 1, 90.0),
        ];
        let s = summarize(&rows, 3);
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].team, "KC");
        assert_eq!(s[0].games, 3);
        assert_relative_eq!(s[0].mean_grade, 75.2, epsilon = 1e-9);
        assert_relative_eq!(s[0].best_grade, 80.0);
        assert_relative_eq!(s[0].worst_grade, 70.0);
        assert_eq!(s[0].letter_grade, LetterGrade::B);

        assert_eq!(summarize(&rows, 1).len(), 3);
    }
}
