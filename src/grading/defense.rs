//! Linebacker and secondary weekly grades from attributed play events.

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{ensure_grade_bounds, letter_grade, round1, EntityFailure, LetterGrade, Stage, StageOutput};
use crate::error::GradeError;
use crate::records::{Attribution, PlayEvent, PositionGroup, RosterEntry, SnapRecord};

/// Defensive event totals for one player-week.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefensiveEventCounts {
    pub player_id: String,
    pub player_name: String,
    pub team: String,
    pub season: u16,
    pub week: u8,
    pub sacks: u32,
    pub interceptions: u32,
    pub solo_tackles: u32,
    pub assisted_tackles: u32,
    pub pass_deflections: u32,
    pub forced_fumbles: u32,
}

impl DefensiveEventCounts {
    /// Solo tackles plus half credit for assists.
    pub fn total_tackles(&self) -> f64 {
        self.solo_tackles as f64 + 0.5 * self.assisted_tackles as f64
    }
}

#[derive(Clone, Copy)]
enum Event {
    Sack,
    Interception,
    SoloTackle,
    AssistedTackle,
    PassDeflection,
    ForcedFumble,
}

type PlayerWeekKey = (u16, u8, String, String);

/// Sum attributed defensive events per (season, week, defense team, player).
pub fn aggregate_defensive_events(plays: &[PlayEvent]) -> Vec<DefensiveEventCounts> {
    let mut counts: BTreeMap<PlayerWeekKey, DefensiveEventCounts> = BTreeMap::new();

    for play in plays {
        let Some(team) = play.defense_team.as_deref() else {
            continue;
        };
        let mut credit = |who: &Attribution, event: Event| {
            let entry = counts
                .entry((play.season, play.week, team.to_string(), who.player_id.clone()))
                .or_insert_with(|| DefensiveEventCounts {
                    player_id: who.player_id.clone(),
                    player_name: who.player_name.clone(),
                    team: team.to_string(),
                    season: play.season,
                    week: play.week,
                    ..Default::default()
                });
            match event {
                Event::Sack => entry.sacks += 1,
                Event::Interception => entry.interceptions += 1,
                Event::SoloTackle => entry.solo_tackles += 1,
                Event::AssistedTackle => entry.assisted_tackles += 1,
                Event::PassDeflection => entry.pass_deflections += 1,
                Event::ForcedFumble => entry.forced_fumbles += 1,
            }
        };

        if let Some(who) = &play.sack_by {
            credit(who, Event::Sack);
        }
        if let Some(who) = &play.interception_by {
            credit(who, Event::Interception);
        }
        for who in &play.solo_tackles {
            credit(who, Event::SoloTackle);
        }
        for who in &play.assisted_tackles {
            credit(who, Event::AssistedTackle);
        }
        for who in &play.pass_deflections {
            credit(who, Event::PassDeflection);
        }
        for who in &play.forced_fumbles {
            credit(who, Event::ForcedFumble);
        }
    }

    counts.into_values().collect()
}

/// Points per event and the cap on each event's contribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefensiveWeights {
    pub base: f64,
    pub tackle: (f64, f64),
    pub sack: (f64, f64),
    pub interception: (f64, f64),
    pub pass_deflection: (f64, f64),
    pub forced_fumble: (f64, f64),
}

pub const LINEBACKER_WEIGHTS: DefensiveWeights = DefensiveWeights {
    base: 55.0,
    tackle: (1.2, 15.0),
    sack: (4.0, 12.0),
    interception: (4.0, 8.0),
    pass_deflection: (1.5, 6.0),
    forced_fumble: (3.0, 6.0),
};

pub const SECONDARY_WEIGHTS: DefensiveWeights = DefensiveWeights {
    base: 55.0,
    tackle: (0.4, 8.0),
    sack: (3.0, 6.0),
    interception: (5.0, 15.0),
    pass_deflection: (1.5, 12.0),
    forced_fumble: (3.0, 6.0),
};

impl DefensiveWeights {
    pub fn for_group(group: PositionGroup) -> Option<&'static DefensiveWeights> {
        match group {
            PositionGroup::Linebacker => Some(&LINEBACKER_WEIGHTS),
            PositionGroup::Secondary => Some(&SECONDARY_WEIGHTS),
            _ => None,
        }
    }
}

fn capped(count: f64, (points, cap): (f64, f64)) -> f64 {
    (count * points).min(cap)
}

pub fn defensive_grade(counts: &DefensiveEventCounts, w: &DefensiveWeights) -> f64 {
    let total = w.base
        + capped(counts.total_tackles(), w.tackle)
        + capped(counts.sacks as f64, w.sack)
        + capped(counts.interceptions as f64, w.interception)
        + capped(counts.pass_deflections as f64, w.pass_deflection)
        + capped(counts.forced_fumbles as f64, w.forced_fumble);
    total.clamp(0.0, 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefensiveGrade {
    pub player_id: String,
    pub player_name: String,
    /// Roster position
    pub position: String,
    pub position_group: PositionGroup,
    pub team: String,
    pub season: u16,
    pub week: u8,
    pub grade: f64,
    pub letter_grade: LetterGrade,
    pub events: DefensiveEventCounts,
}

/// Positions by (player, season, week), falling back to the player's most
/// recent listed position for the season.
#[derive(Default)]
struct PositionTable<'a> {
    weekly: HashMap<(&'a str, u16, u8), &'a str>,
    latest: HashMap<(&'a str, u16), (u8, &'a str)>,
}

impl<'a> PositionTable<'a> {
    fn insert(&mut self, player_id: &'a str, season: u16, week: Option<u8>, position: &'a str) {
        let week = match week {
            Some(w) => {
                self.weekly.insert((player_id, season, w), position);
                w
            }
            None => 0,
        };
        let e = self.latest.entry((player_id, season)).or_insert((week, position));
        if week >= e.0 {
            *e = (week, position);
        }
    }

    fn get(&self, player_id: &str, season: u16, week: u8) -> Option<&'a str> {
        self.weekly
            .get(&(player_id, season, week))
            .copied()
            .or_else(|| self.latest.get(&(player_id, season)).map(|(_, pos)| *pos))
    }
}

/// Roster positions keyed by the play-by-play player id.
///
/// Rosters are authoritative. Snap-count positions fill the gaps; their ids
/// are translated through each roster entry's PFR id.
struct PositionLookup<'a> {
    roster: PositionTable<'a>,
    snaps: PositionTable<'a>,
}

impl<'a> PositionLookup<'a> {
    fn new(rosters: &'a [RosterEntry], snaps: &'a [SnapRecord]) -> Self {
        let mut roster = PositionTable::default();
        let mut by_pfr: HashMap<&'a str, &'a str> = HashMap::new();
        for r in rosters {
            roster.insert(&r.player_id, r.season, r.week, &r.position);
            if let Some(pfr) = r.pfr_id.as_deref() {
                by_pfr.insert(pfr, r.player_id.as_str());
            }
        }

        let mut from_snaps = PositionTable::default();
        for s in snaps {
            let Some(pos) = s.position.as_deref() else {
                continue;
            };
            let id = by_pfr.get(s.player_id.as_str()).copied().unwrap_or(s.player_id.as_str());
            from_snaps.insert(id, s.season, Some(s.week), pos);
        }

        Self {
            roster,
            snaps: from_snaps,
        }
    }

    fn get(&self, player_id: &str, season: u16, week: u8) -> Option<&'a str> {
        self.roster
            .get(player_id, season, week)
            .or_else(|| self.snaps.get(player_id, season, week))
    }
}

/// Grade every linebacker and defensive back with at least one attributed
/// event. Players without a resolvable position are left out and listed in
/// the output diagnostics.
pub fn grade_defenders(
    plays: &[PlayEvent],
    rosters: &[RosterEntry],
    snaps: &[SnapRecord],
) -> StageOutput<DefensiveGrade> {
    let counts = aggregate_defensive_events(plays);
    let positions = PositionLookup::new(rosters, snaps);

    let results: Vec<Result<Result<DefensiveGrade, EntityFailure>, GradeError>> = counts
        .into_par_iter()
        .filter_map(|events| {
            let entity = format!("{}/{}/{}", events.player_id, events.season, events.week);
            let Some(position) = positions.get(&events.player_id, events.season, events.week) else {
                return Some(Err(GradeError::MissingDependency {
                    stage: Stage::Defensive,
                    entity,
                    dependency: "roster position".into(),
                }));
            };
            // Linemen and offensive players credited on returns are graded elsewhere or not at all.
            let group = PositionGroup::from_position(position)?;
            let weights = DefensiveWeights::for_group(group)?;
            let raw = round1(defensive_grade(&events, weights));
            Some(Ok(
                ensure_grade_bounds(Stage::Defensive, &entity, events.season, raw).map(|grade| DefensiveGrade {
                    player_id: events.player_id.clone(),
                    player_name: events.player_name.clone(),
                    position: position.to_string(),
                    position_group: group,
                    team: events.team.clone(),
                    season: events.season,
                    week: events.week,
                    grade,
                    letter_grade: letter_grade(grade),
                    events,
                }),
            ))
        })
        .collect();

    let mut graded = Vec::with_capacity(results.len());
    let mut unresolved = Vec::new();
    for r in results {
        match r {
            Ok(g) => graded.push(g),
            Err(missing) => unresolved.push(missing),
        }
    }
    let mut out = StageOutput::collect(graded);
    if !unresolved.is_empty() {
        warn!("Defense: {} player-weeks left ungraded without a roster position", unresolved.len());
    }
    for diagnostic in unresolved {
        out.note(diagnostic);
    }
    out.records
        .sort_by(|a, b| (a.season, a.week, &a.team, &a.player_id).cmp(&(b.season, b.week, &b.team, &b.player_id)));
    info!("Defense: {} player-weeks graded", out.records.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::team_unit::tests::play;
    use crate::records::PlayType;
    use approx::assert_relative_eq;

    fn who(id: &str) -> Attribution {
        Attribution {
            player_id: id.into(),
            player_name: id.to_uppercase(),
        }
    }

    fn snap(id: &str, position: &str, week: u8) -> SnapRecord {
        SnapRecord {
            player_id: id.into(),
            player_name: id.to_uppercase(),
            position: Some(position.into()),
            team: "DET".into(),
            season: 2023,
            week,
            offense_snaps: None,
            offense_pct: None,
            defense_snaps: Some(60),
            defense_pct: Some(1.0),
        }
    }

    #[test]
    fn secondary_scenario_matches_weights() {
        let counts = DefensiveEventCounts {
            player_id: "cb1".into(),
            interceptions: 5,
            pass_deflections: 10,
            solo_tackles: 40,
            forced_fumbles: 1,
            ..Default::default()
        };
        // 55 + min(25, 15) + min(15, 12) + min(16, 8) + 3 = 93
        assert_relative_eq!(defensive_grade(&counts, &SECONDARY_WEIGHTS), 93.0, epsilon = 1e-9);
    }

    #[test]
    fn linebacker_weights_tackles_most() {
        let counts = DefensiveEventCounts {
            solo_tackles: 8,
            assisted_tackles: 4,
            sacks: 1,
            ..Default::default()
        };
        assert_relative_eq!(counts.total_tackles(), 10.0);
        // 55 + 12 + 4 = 71
        assert_relative_eq!(defensive_grade(&counts, &LINEBACKER_WEIGHTS), 71.0, epsilon = 1e-9);
        assert!(defensive_grade(&counts, &LINEBACKER_WEIGHTS) > defensive_grade(&counts, &SECONDARY_WEIGHTS));
    }

    #[test]
    fn aggregates_attributions_per_player_week() {
        let mut p1 = play("KC", "DET", 1, PlayType::Pass);
        p1.interception_by = Some(who("cb1"));
        p1.solo_tackles = vec![who("lb1")];
        let mut p2 = play("KC", "DET", 1, PlayType::Run);
        p2.assisted_tackles = vec![who("lb1"), who("cb1")];
        p2.forced_fumbles = vec![who("lb1")];
        let mut p3 = play("KC", "DET", 2, PlayType::Run);
        p3.solo_tackles = vec![who("lb1")];

        let counts = aggregate_defensive_events(&[p1, p2, p3]);
        assert_eq!(counts.len(), 3);
        let lb_w1 = counts.iter().find(|c| c.player_id == "lb1" && c.week == 1).unwrap();
        assert_eq!(lb_w1.solo_tackles, 1);
        assert_eq!(lb_w1.assisted_tackles, 1);
        assert_eq!(lb_w1.forced_fumbles, 1);
        assert_eq!(lb_w1.team, "DET");
        let cb = counts.iter().find(|c| c.player_id == "cb1").unwrap();
        assert_eq!(cb.interceptions, 1);
    }

    fn roster(gsis: &str, pfr: &str, position: &str, week: Option<u8>) -> RosterEntry {
        RosterEntry {
            player_id: gsis.into(),
            player_name: gsis.to_uppercase(),
            position: position.into(),
            team: "DET".into(),
            season: 2023,
            week,
            pfr_id: Some(pfr.into()),
        }
    }

    #[test]
    fn line_players_are_excluded_and_unknowns_are_not_graded() {
        let mut p = play("KC", "DET", 1, PlayType::Pass);
        p.sack_by = Some(who("de1"));
        p.solo_tackles = vec![who("lb1"), who("x1")];
        p.pass_deflections = vec![who("fs1")];
        let snaps = vec![snap("de1", "DE", 1), snap("lb1", "ILB", 1), snap("fs1", "FS", 1)];

        let out = grade_defenders(&[p], &[], &snaps);
        let ids: Vec<_> = out.records.iter().map(|g| g.player_id.as_str()).collect();
        assert_eq!(ids, vec!["fs1", "lb1"]);

        let fs = &out.records[0];
        assert_eq!(fs.position_group, PositionGroup::Secondary);
        assert_relative_eq!(fs.grade, 56.5, epsilon = 1e-9);

        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].entity(), "x1/2023/1");
        assert!(matches!(out.diagnostics[0], GradeError::MissingDependency { .. }));
    }

    #[test]
    fn snap_ids_join_play_ids_through_rosters() {
        // Snap counts only carry PFR ids; attributions carry GSIS ids.
        let mut p = play("KC", "DET", 1, PlayType::Pass);
        p.sack_by = Some(who("00-0037764"));
        p.interception_by = Some(who("00-0036000"));
        let snaps = vec![snap("HutcAi00", "DE", 1), snap("BranBr00", "CB", 1)];
        let rosters = vec![
            roster("00-0037764", "HutcAi00", "DE", None),
            roster("00-0036000", "BranBr00", "DB", Some(2)),
        ];

        let out = grade_defenders(&[p], &rosters, &snaps);
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.records.len(), 1);
        let cb = &out.records[0];
        assert_eq!(cb.player_id, "00-0036000");
        assert_eq!(cb.position_group, PositionGroup::Secondary);
        // No week-1 listing: the latest roster position still beats the snap row.
        assert_eq!(cb.position, "DB");
    }

    #[test]
    fn unmatched_snap_ids_resolve_nothing() {
        let mut p = play("KC", "DET", 1, PlayType::Pass);
        p.sack_by = Some(who("00-0037764"));
        let out = grade_defenders(&[p], &[], &[snap("HutcAi00", "DE", 1)]);
        assert!(out.records.is_empty());
        assert_eq!(out.diagnostics.len(), 1);
    }

    #[test]
    fn seasonal_position_covers_weeks_without_snaps() {
        let mut p = play("KC", "DET", 4, PlayType::Run);
        p.solo_tackles = vec![who("cb2")];
        let snaps = vec![snap("cb2", "CB", 1), snap("cb2", "CB", 2)];
        let out = grade_defenders(&[p], &[], &snaps);
        assert_eq!(out.records[0].position, "CB");
    }
}
