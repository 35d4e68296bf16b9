use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::models::{
    Attribution, PlayEvent, PlayType, RosterEntry, ScheduleGame, SeasonRecords, SkillStatRecord,
    SnapRecord,
};
use super::provider::StatRecordProvider;

const PLAYER_STATS_FILE: &str = "player_stats.json";
const PBP_FILE: &str = "pbp.json";
const SNAP_COUNTS_FILE: &str = "snap_counts.json";
const SCHEDULES_FILE: &str = "schedules.json";
const ROSTERS_FILE: &str = "rosters.json";

/// Provider backed by per-season JSON exports:
/// `<root>/<season>/{player_stats,pbp,snap_counts,schedules,rosters}.json`.
///
/// Each file holds an array of row objects using nflverse column names. Rows
/// missing identifying fields are dropped; numeric fields accept numbers or
/// numeric strings.
pub struct JsonDirProvider {
    root: PathBuf,
}

impl JsonDirProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn season_dir(&self, season: u16) -> PathBuf {
        self.root.join(season.to_string())
    }
}

#[async_trait]
impl StatRecordProvider for JsonDirProvider {
    fn name(&self) -> &str {
        "json-dir"
    }

    async fn fetch_season(&self, season: u16) -> Result<SeasonRecords> {
        let dir = self.season_dir(season);
        debug!("Reading season {} from {}", season, dir.display());

        let stats = read_rows(&dir.join(PLAYER_STATS_FILE)).await?;
        let pbp = read_rows(&dir.join(PBP_FILE)).await?;
        let schedules = read_rows(&dir.join(SCHEDULES_FILE)).await?;

        // Snap counts and rosters are optional: linemen fall back to a
        // play-by-play estimate and defenders to snap-count positions.
        let snaps = read_optional_rows(&dir.join(SNAP_COUNTS_FILE), season, "snap counts").await;
        let rosters = read_optional_rows(&dir.join(ROSTERS_FILE), season, "rosters").await;

        let pct = PercentScale::detect(&snaps, &["offense_pct", "defense_pct"]);
        debug!("Season {}: snap shares read as {:?}", season, pct);

        Ok(SeasonRecords {
            season,
            skill_stats: parse_rows(&stats, season, parse_skill_row, "player stats"),
            plays: parse_rows(&pbp, season, parse_play_row, "play-by-play"),
            snaps: parse_rows(&snaps, season, |row, s| parse_snap_row(row, s, pct), "snap counts"),
            schedule: parse_rows(&schedules, season, parse_schedule_row, "schedule"),
            rosters: parse_rows(&rosters, season, parse_roster_row, "rosters"),
        })
    }
}

async fn read_optional_rows(path: &Path, season: u16, label: &str) -> Vec<Value> {
    match read_rows(path).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!("Season {}: {} unavailable ({:#})", season, label, e);
            Vec::new()
        }
    }
}

async fn read_rows(path: &Path) -> Result<Vec<Value>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let raw: Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    match raw {
        Value::Array(rows) => Ok(rows),
        _ => anyhow::bail!("{} is not a JSON array", path.display()),
    }
}

fn parse_rows<T>(
    rows: &[Value],
    season: u16,
    parse: impl Fn(&Value, u16) -> Option<T>,
    label: &str,
) -> Vec<T> {
    let parsed: Vec<T> = rows.iter().filter_map(|row| parse(row, season)).collect();
    let dropped = rows.len() - parsed.len();
    if dropped > 0 {
        warn!(
            "Season {}: dropped {} of {} {} rows with missing fields",
            season,
            dropped,
            rows.len(),
            label
        );
    }
    parsed
}

// ── Field helpers ──────────────────────────────────────────────────────────────

fn text(row: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match &row[*k] {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn number(row: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| match &row[*k] {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    })
    .filter(|v| v.is_finite())
}

fn count(row: &Value, keys: &[&str]) -> Option<u32> {
    number(row, keys).map(|v| v.max(0.0).round() as u32)
}

fn flag(row: &Value, key: &str) -> bool {
    number(row, &[key]).map(|v| v > 0.0).unwrap_or(false)
}

/// Unit of the percentage columns in one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PercentScale {
    /// 0.0–1.0
    Fraction,
    /// 0–100
    Percent,
}

impl PercentScale {
    /// A file is on the 0–100 scale if any of its values exceeds 1.
    fn detect(rows: &[Value], keys: &[&str]) -> Self {
        let over_one = rows
            .iter()
            .flat_map(|row| keys.iter().filter_map(move |k| number(row, &[*k])))
            .any(|v| v > 1.0);
        if over_one {
            PercentScale::Percent
        } else {
            PercentScale::Fraction
        }
    }

    fn fraction(self, row: &Value, key: &str) -> Option<f64> {
        number(row, &[key]).map(|v| match self {
            PercentScale::Fraction => v,
            PercentScale::Percent => v / 100.0,
        })
    }
}

fn row_season(row: &Value, season: u16) -> u16 {
    count(row, &["season"]).map(|s| s as u16).unwrap_or(season)
}

fn attribution(row: &Value, id_key: &str, name_key: &str) -> Option<Attribution> {
    let player_id = text(row, &[id_key])?;
    let player_name = text(row, &[name_key]).unwrap_or_else(|| player_id.clone());
    Some(Attribution {
        player_id,
        player_name,
    })
}

fn attributions(row: &Value, prefix: &str, slots: usize) -> Vec<Attribution> {
    (1..=slots)
        .filter_map(|i| {
            attribution(
                row,
                &format!("{prefix}_{i}_player_id"),
                &format!("{prefix}_{i}_player_name"),
            )
        })
        .collect()
}

// ── Row parsers ────────────────────────────────────────────────────────────────

fn parse_skill_row(row: &Value, season: u16) -> Option<SkillStatRecord> {
    let player_id = text(row, &["player_id", "gsis_id"])?;
    Some(SkillStatRecord {
        player_name: text(row, &["player_display_name", "player_name"])
            .unwrap_or_else(|| player_id.clone()),
        player_id,
        position: text(row, &["position"])?,
        team: text(row, &["recent_team", "team"])?,
        season: row_season(row, season),
        week: count(row, &["week"])? as u8,
        attempts: count(row, &["attempts"]).unwrap_or(0),
        completions: count(row, &["completions"]).unwrap_or(0),
        passing_yards: number(row, &["passing_yards"]).unwrap_or(0.0),
        passing_tds: count(row, &["passing_tds"]).unwrap_or(0),
        interceptions: count(row, &["passing_interceptions", "interceptions"]).unwrap_or(0),
        carries: count(row, &["carries"]).unwrap_or(0),
        rushing_yards: number(row, &["rushing_yards"]).unwrap_or(0.0),
        rushing_tds: count(row, &["rushing_tds"]).unwrap_or(0),
        targets: count(row, &["targets"]).unwrap_or(0),
        receptions: count(row, &["receptions"]).unwrap_or(0),
        receiving_yards: number(row, &["receiving_yards"]).unwrap_or(0.0),
        receiving_tds: count(row, &["receiving_tds"]).unwrap_or(0),
    })
}

fn parse_play_row(row: &Value, season: u16) -> Option<PlayEvent> {
    Some(PlayEvent {
        game_id: text(row, &["game_id"])?,
        season: row_season(row, season),
        week: count(row, &["week"])? as u8,
        offense_team: text(row, &["posteam"]),
        defense_team: text(row, &["defteam"]),
        play_type: text(row, &["play_type"])
            .map(|s| PlayType::from_str_lossy(&s))
            .unwrap_or(PlayType::Other),
        sack: flag(row, "sack"),
        qb_hit: flag(row, "qb_hit"),
        yards_gained: number(row, &["rushing_yards", "yards_gained"]).unwrap_or(0.0),
        sack_by: attribution(row, "sack_player_id", "sack_player_name"),
        interception_by: attribution(row, "interception_player_id", "interception_player_name"),
        solo_tackles: attributions(row, "solo_tackle", 2),
        assisted_tackles: attributions(row, "assist_tackle", 4),
        pass_deflections: attributions(row, "pass_defense", 2),
        forced_fumbles: attributions(row, "forced_fumble_player", 2),
    })
}

fn parse_snap_row(row: &Value, season: u16, pct: PercentScale) -> Option<SnapRecord> {
    let player_id = text(row, &["player_id", "pfr_player_id", "gsis_id"])?;
    Some(SnapRecord {
        player_name: text(row, &["player", "player_name"]).unwrap_or_else(|| player_id.clone()),
        player_id,
        position: text(row, &["position"]),
        team: text(row, &["team"])?,
        season: row_season(row, season),
        week: count(row, &["week"])? as u8,
        offense_snaps: count(row, &["offense_snaps"]),
        offense_pct: pct.fraction(row, "offense_pct"),
        defense_snaps: count(row, &["defense_snaps"]),
        defense_pct: pct.fraction(row, "defense_pct"),
    })
}

fn parse_roster_row(row: &Value, season: u16) -> Option<RosterEntry> {
    let player_id = text(row, &["gsis_id", "player_id"])?;
    Some(RosterEntry {
        player_name: text(row, &["full_name", "player_name"]).unwrap_or_else(|| player_id.clone()),
        player_id,
        position: text(row, &["depth_chart_position", "position"])?,
        team: text(row, &["team"])?,
        season: row_season(row, season),
        week: count(row, &["week"]).map(|w| w as u8),
        pfr_id: text(row, &["pfr_id"]),
    })
}

fn parse_schedule_row(row: &Value, season: u16) -> Option<ScheduleGame> {
    Some(ScheduleGame {
        game_id: text(row, &["game_id"])?,
        season: row_season(row, season),
        week: count(row, &["week"])? as u8,
        home_team: text(row, &["home_team"])?,
        away_team: text(row, &["away_team"])?,
        home_coach: text(row, &["home_coach"]),
        away_coach: text(row, &["away_coach"]),
        home_score: count(row, &["home_score"]),
        away_score: count(row, &["away_score"]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn skill_row_accepts_numeric_strings_and_alias_columns() {
        let row = json!({
            "player_id": "00-0033873",
            "player_display_name": "Patrick Mahomes",
            "position": "QB",
            "recent_team": "KC",
            "week": "3",
            "attempts": 35,
            "completions": "25",
            "passing_yards": 300.0,
            "passing_tds": 3,
            "passing_interceptions": 1
        });
        let rec = parse_skill_row(&row, 2023).unwrap();
        assert_eq!(rec.season, 2023);
        assert_eq!(rec.week, 3);
        assert_eq!(rec.team, "KC");
        assert_eq!(rec.completions, 25);
        assert_eq!(rec.interceptions, 1);
        assert_eq!(rec.carries, 0);
    }

    #[test]
    fn skill_row_without_team_is_dropped() {
        let row = json!({ "player_id": "x", "position": "WR", "week": 1 });
        assert!(parse_skill_row(&row, 2023).is_none());
    }

    #[test]
    fn play_row_collects_attributions() {
        let row = json!({
            "game_id": "2023_01_DET_KC",
            "week": 1,
            "posteam": "KC",
            "defteam": "DET",
            "play_type": "pass",
            "sack": 1,
            "qb_hit": 0,
            "sack_player_id": "d1",
            "sack_player_name": "A. Hutchinson",
            "solo_tackle_1_player_id": "d1",
            "assist_tackle_1_player_id": "d2",
            "assist_tackle_2_player_id": "d3",
            "pass_defense_1_player_id": null
        });
        let play = parse_play_row(&row, 2023).unwrap();
        assert!(play.sack);
        assert!(!play.qb_hit);
        assert_eq!(play.play_type, PlayType::Pass);
        assert_eq!(play.sack_by.as_ref().unwrap().player_name, "A. Hutchinson");
        assert_eq!(play.solo_tackles.len(), 1);
        assert_eq!(play.assisted_tackles.len(), 2);
        assert_eq!(play.assisted_tackles[0].player_name, "d2");
        assert!(play.pass_deflections.is_empty());
    }

    fn snap_json(id: &str, offense_pct: f64) -> Value {
        json!({
            "pfr_player_id": id,
            "player": "Joe Smith",
            "position": "T",
            "team": "KC",
            "week": 2,
            "offense_snaps": 60,
            "offense_pct": offense_pct
        })
    }

    #[test]
    fn snap_row_normalizes_percent_values() {
        let rows = vec![snap_json("SmitJo00", 92.0)];
        let pct = PercentScale::detect(&rows, &["offense_pct", "defense_pct"]);
        assert_eq!(pct, PercentScale::Percent);
        let snap = parse_snap_row(&rows[0], 2023, pct).unwrap();
        assert_eq!(snap.player_id, "SmitJo00");
        assert_eq!(snap.position.as_deref(), Some("T"));
        assert!((snap.offense_pct.unwrap() - 0.92).abs() < 1e-9);
        assert!(snap.defense_pct.is_none());
    }

    #[test]
    fn percent_unit_is_decided_per_file() {
        // One percent on a 0-100 file stays one percent.
        let percent_file = vec![snap_json("a", 1.0), snap_json("b", 45.5)];
        let pct = PercentScale::detect(&percent_file, &["offense_pct", "defense_pct"]);
        let snap = parse_snap_row(&percent_file[0], 2023, pct).unwrap();
        assert!((snap.offense_pct.unwrap() - 0.01).abs() < 1e-9);

        let fraction_file = vec![snap_json("a", 1.0), snap_json("b", 0.5)];
        let pct = PercentScale::detect(&fraction_file, &["offense_pct", "defense_pct"]);
        assert_eq!(pct, PercentScale::Fraction);
        let snap = parse_snap_row(&fraction_file[0], 2023, pct).unwrap();
        assert!((snap.offense_pct.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn roster_row_carries_both_ids() {
        let row = json!({
            "season": 2023,
            "week": 5,
            "team": "DET",
            "position": "DL",
            "depth_chart_position": "DE",
            "full_name": "Aidan Hutchinson",
            "gsis_id": "00-0037764",
            "pfr_id": "HutcAi00"
        });
        let entry = parse_roster_row(&row, 2023).unwrap();
        assert_eq!(entry.player_id, "00-0037764");
        assert_eq!(entry.pfr_id.as_deref(), Some("HutcAi00"));
        assert_eq!(entry.position, "DE");
        assert_eq!(entry.week, Some(5));
    }

    #[test]
    fn schedule_row_keeps_unplayed_scores_empty() {
        let row = json!({
            "game_id": "2023_18_KC_LV",
            "season": 2023,
            "week": 18,
            "home_team": "LV",
            "away_team": "KC",
            "home_coach": "Antonio Pierce",
            "away_coach": "Andy Reid",
            "home_score": null,
            "away_score": null
        });
        let game = parse_schedule_row(&row, 2023).unwrap();
        assert!(game.home_score.is_none());
        assert_eq!(game.away_coach.as_deref(), Some("Andy Reid"));
    }

    #[tokio::test]
    async fn missing_snap_file_yields_empty_stream() {
        let dir = std::env::temp_dir().join(format!("gridiron-json-dir-{}", std::process::id()));
        let season_dir = dir.join("2023");
        std::fs::create_dir_all(&season_dir).unwrap();
        std::fs::write(season_dir.join(PLAYER_STATS_FILE), "[]").unwrap();
        std::fs::write(season_dir.join(PBP_FILE), "[]").unwrap();
        std::fs::write(season_dir.join(SCHEDULES_FILE), "[]").unwrap();

        let provider = JsonDirProvider::new(&dir);
        let records = provider.fetch_season(2023).await.unwrap();
        assert_eq!(records.season, 2023);
        assert!(records.snaps.is_empty());
        assert!(records.rosters.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn missing_play_by_play_is_an_error() {
        let provider = JsonDirProvider::new("/nonexistent/gridiron");
        assert!(provider.fetch_season(2023).await.is_err());
    }
}
