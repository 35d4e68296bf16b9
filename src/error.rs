use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grading::Stage;

/// Failure taxonomy shared by every grading stage.
///
/// `InsufficientSample` and `MissingDependency` are normally handled inside a
/// stage (omission or neutral fallback) and only surface in diagnostics.
/// `RangeViolation` is a programming error and is reported per entity.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum GradeError {
    #[error("{stage}: {entity} has {observed} {unit}, minimum is {required}")]
    InsufficientSample {
        stage: Stage,
        entity: String,
        observed: u32,
        required: u32,
        unit: String,
    },

    #[error("{stage}: {entity} is missing upstream {dependency}")]
    MissingDependency {
        stage: Stage,
        entity: String,
        dependency: String,
    },

    #[error("{stage}: record for {entity} lacks field '{field}'")]
    DataShapeMismatch {
        stage: Stage,
        entity: String,
        field: String,
    },

    #[error("{stage}: {entity} produced {value} outside [{min}, {max}]")]
    RangeViolation {
        stage: Stage,
        entity: String,
        value: f64,
        min: f64,
        max: f64,
    },
}

impl GradeError {
    pub fn stage(&self) -> Stage {
        match self {
            GradeError::InsufficientSample { stage, .. }
            | GradeError::MissingDependency { stage, .. }
            | GradeError::DataShapeMismatch { stage, .. }
            | GradeError::RangeViolation { stage, .. } => *stage,
        }
    }

    pub fn entity(&self) -> &str {
        match self {
            GradeError::InsufficientSample { entity, .. }
            | GradeError::MissingDependency { entity, .. }
            | GradeError::DataShapeMismatch { entity, .. }
            | GradeError::RangeViolation { entity, .. } => entity,
        }
    }
}
