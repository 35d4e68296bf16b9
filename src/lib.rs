//! Football grading pipeline.
//!
//! Raw per-play and per-game statistics go in; normalized 0–100 grades with
//! letter equivalents come out for line units, individual linemen, skill
//! players, defenders, and head coaches.

pub mod config;
pub mod db;
pub mod error;
pub mod grading;
pub mod pipeline;
pub mod records;

pub use error::GradeError;
pub use grading::{letter_grade, GradingParams, LetterGrade};
pub use pipeline::{run_grading, run_season, GradingRun, SeasonGrades};
