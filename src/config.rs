use std::path::PathBuf;

use clap::Parser;

use crate::grading::GradingParams;

/// Football grading pipeline
#[derive(Parser, Debug, Clone)]
#[command(name = "gridiron-grades", version, about)]
pub struct Config {
    /// Directory holding one sub-directory of JSON record files per season
    #[arg(long, env = "GRADES_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Seasons to grade (comma-separated, e.g. 2022,2023)
    #[arg(long, env = "GRADES_SEASONS", value_delimiter = ',', required = true)]
    pub seasons: Vec<u16>,

    /// Output file for the graded run (JSON)
    #[arg(long, env = "GRADES_OUTPUT", default_value = "grades.json")]
    pub output: PathBuf,

    /// SQLite results cache path; no caching when unset
    #[arg(long, env = "GRADES_CACHE_PATH")]
    pub cache_path: Option<String>,

    /// Minimum pass + run plays for a team line-unit grade
    #[arg(long, env = "MIN_PLAYS", default_value = "40")]
    pub min_plays: u32,

    /// Minimum weeks for season summaries and outlier analysis
    #[arg(long, env = "MIN_GAMES", default_value = "3")]
    pub min_games: u32,

    /// Snap share (0.0–1.0) below which a lineman-week is not graded
    #[arg(long, env = "MIN_SNAP_PCT", default_value = "0.25")]
    pub min_snap_pct: f64,

    /// Standard deviations from the season mean that mark an outlier week
    #[arg(long, env = "STD_THRESHOLD", default_value = "1.5")]
    pub std_threshold: f64,

    /// Minimum decided games for the coaching efficiency leaderboard
    #[arg(long, env = "MIN_COACH_GAMES", default_value = "8")]
    pub min_coach_games: u32,

    /// Number of coaches to log from the efficiency leaderboard
    #[arg(long, env = "LEADERBOARD_SIZE", default_value = "10")]
    pub leaderboard_size: usize,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.seasons.is_empty() {
            anyhow::bail!("at least one season is required");
        }
        if let Some(s) = self.seasons.iter().find(|s| !(1920..=2100).contains(*s)) {
            anyhow::bail!("season {} is out of range", s);
        }
        if self.min_plays == 0 {
            anyhow::bail!("min_plays must be positive");
        }
        if self.min_games == 0 {
            anyhow::bail!("min_games must be positive");
        }
        if !(0.0..=1.0).contains(&self.min_snap_pct) {
            anyhow::bail!("min_snap_pct must be between 0.0 and 1.0");
        }
        if !self.std_threshold.is_finite() || self.std_threshold < 0.0 {
            anyhow::bail!("std_threshold must be a non-negative number");
        }
        Ok(())
    }

    /// Library-facing grading thresholds.
    pub fn grading_params(&self) -> GradingParams {
        GradingParams {
            min_plays: self.min_plays,
            min_games: self.min_games,
            min_snap_pct: self.min_snap_pct,
            std_threshold: self.std_threshold,
            min_coach_games: self.min_coach_games,
        }
    }
}
