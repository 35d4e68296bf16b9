use serde::{Deserialize, Serialize};

/// One player-week of declared offensive counting stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillStatRecord {
    pub player_id: String,
    pub player_name: String,
    /// Roster position as reported by the provider ("QB", "RB", "WR", ...)
    pub position: String,
    pub team: String,
    pub season: u16,
    pub week: u8,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub completions: u32,
    #[serde(default)]
    pub passing_yards: f64,
    #[serde(default)]
    pub passing_tds: u32,
    #[serde(default)]
    pub interceptions: u32,
    #[serde(default)]
    pub carries: u32,
    #[serde(default)]
    pub rushing_yards: f64,
    #[serde(default)]
    pub rushing_tds: u32,
    #[serde(default)]
    pub targets: u32,
    #[serde(default)]
    pub receptions: u32,
    #[serde(default)]
    pub receiving_yards: f64,
    #[serde(default)]
    pub receiving_tds: u32,
}

impl SkillStatRecord {
    /// Whether the player touched the ball (or was targeted) at all this week.
    pub fn has_involvement(&self) -> bool {
        self.attempts > 0 || self.carries > 0 || self.targets > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayType {
    Pass,
    Run,
    Other,
}

impl PlayType {
    pub fn from_str_lossy(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pass" => PlayType::Pass,
            "run" => PlayType::Run,
            _ => PlayType::Other,
        }
    }
}

/// A defensive player credited with an event on a play.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribution {
    pub player_id: String,
    pub player_name: String,
}

/// One play from the play-by-play feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayEvent {
    pub game_id: String,
    pub season: u16,
    pub week: u8,
    /// Team in possession
    pub offense_team: Option<String>,
    pub defense_team: Option<String>,
    pub play_type: PlayType,
    #[serde(default)]
    pub sack: bool,
    #[serde(default)]
    pub qb_hit: bool,
    /// Yards gained on the play (rushing yards for run plays)
    #[serde(default)]
    pub yards_gained: f64,
    #[serde(default)]
    pub sack_by: Option<Attribution>,
    #[serde(default)]
    pub interception_by: Option<Attribution>,
    #[serde(default)]
    pub solo_tackles: Vec<Attribution>,
    #[serde(default)]
    pub assisted_tackles: Vec<Attribution>,
    #[serde(default)]
    pub pass_deflections: Vec<Attribution>,
    #[serde(default)]
    pub forced_fumbles: Vec<Attribution>,
}

/// Snap participation for one player-week.
///
/// Percentages are fractions in [0, 1]. Fields the provider could not supply
/// are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapRecord {
    pub player_id: String,
    pub player_name: String,
    pub position: Option<String>,
    pub team: String,
    pub season: u16,
    pub week: u8,
    pub offense_snaps: Option<u32>,
    pub offense_pct: Option<f64>,
    pub defense_snaps: Option<u32>,
    pub defense_pct: Option<f64>,
}

/// One roster listing. Play-by-play attributions carry `player_id` (GSIS);
/// snap counts may only carry `pfr_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub player_id: String,
    pub player_name: String,
    pub position: String,
    pub team: String,
    pub season: u16,
    /// `None` for season-level rosters
    pub week: Option<u8>,
    #[serde(default)]
    pub pfr_id: Option<String>,
}

/// One scheduled game with the head coach on each sideline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleGame {
    pub game_id: String,
    pub season: u16,
    pub week: u8,
    pub home_team: String,
    pub away_team: String,
    pub home_coach: Option<String>,
    pub away_coach: Option<String>,
    /// `None` until the game has been played
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
}

/// Every record stream for one season, as fetched from the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeasonRecords {
    pub season: u16,
    pub skill_stats: Vec<SkillStatRecord>,
    pub plays: Vec<PlayEvent>,
    pub snaps: Vec<SnapRecord>,
    pub schedule: Vec<ScheduleGame>,
    #[serde(default)]
    pub rosters: Vec<RosterEntry>,
}

impl SeasonRecords {
    pub fn new(season: u16) -> Self {
        Self {
            season,
            ..Default::default()
        }
    }
}

/// Position families used for formula selection and key-contributor rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionGroup {
    Quarterback,
    RunningBack,
    /// Wide receivers and tight ends
    Receiver,
    OffensiveLine,
    DefensiveLine,
    Linebacker,
    Secondary,
}

impl PositionGroup {
    pub fn from_position(position: &str) -> Option<Self> {
        let group = match position.trim().to_uppercase().as_str() {
            "QB" => PositionGroup::Quarterback,
            "RB" | "HB" | "FB" => PositionGroup::RunningBack,
            "WR" | "TE" => PositionGroup::Receiver,
            "C" | "G" | "LG" | "RG" | "OG" | "T" | "LT" | "RT" | "OT" | "OL" => {
                PositionGroup::OffensiveLine
            }
            "DE" | "DT" | "NT" | "EDGE" | "DL" => PositionGroup::DefensiveLine,
            "LB" | "ILB" | "OLB" | "MLB" => PositionGroup::Linebacker,
            "CB" | "S" | "FS" | "SS" | "SAF" | "DB" => PositionGroup::Secondary,
            _ => return None,
        };
        Some(group)
    }

    pub fn is_line(self) -> bool {
        matches!(self, PositionGroup::OffensiveLine | PositionGroup::DefensiveLine)
    }

    pub fn is_skill(self) -> bool {
        matches!(
            self,
            PositionGroup::Quarterback | PositionGroup::RunningBack | PositionGroup::Receiver
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_groups_from_roster_codes() {
        assert_eq!(PositionGroup::from_position("qb"), Some(PositionGroup::Quarterback));
        assert_eq!(PositionGroup::from_position("TE"), Some(PositionGroup::Receiver));
        assert_eq!(PositionGroup::from_position("LT"), Some(PositionGroup::OffensiveLine));
        assert_eq!(PositionGroup::from_position("EDGE"), Some(PositionGroup::DefensiveLine));
        assert_eq!(PositionGroup::from_position("OLB"), Some(PositionGroup::Linebacker));
        assert_eq!(PositionGroup::from_position("FS"), Some(PositionGroup::Secondary));
        assert_eq!(PositionGroup::from_position("K"), None);
    }

    #[test]
    fn involvement_requires_a_touch_or_target() {
        let mut rec = SkillStatRecord {
            player_id: "p".into(),
            player_name: "P".into(),
            position: "WR".into(),
            team: "KC".into(),
            season: 2023,
            week: 1,
            attempts: 0,
            completions: 0,
            passing_yards: 0.0,
            passing_tds: 0,
            interceptions: 0,
            carries: 0,
            rushing_yards: 0.0,
            rushing_tds: 0,
            targets: 0,
            receptions: 0,
            receiving_yards: 0.0,
            receiving_tds: 0,
        };
        assert!(!rec.has_involvement());
        rec.targets = 1;
        assert!(rec.has_involvement());
    }

    #[test]
    fn play_type_parse() {
        assert_eq!(PlayType::from_str_lossy("Pass"), PlayType::Pass);
        assert_eq!(PlayType::from_str_lossy(" run "), PlayType::Run);
        assert_eq!(PlayType::from_str_lossy("punt"), PlayType::Other);
    }
}
