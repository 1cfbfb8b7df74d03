use thiserror::Error;

use crate::ids::ZoneId;

/// Reference-data problems found while setting up a run. Any of these aborts
/// setup: no simulation year can proceed on top of corrupt aggregates.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("unknown dwelling type '{0}'")]
    UnknownDwellingType(String),
    #[error("table '{table}' is missing required column '{column}'")]
    MissingColumn { table: String, column: String },
    #[error("zone {0} is not part of the zone system")]
    UnknownZone(ZoneId),
    #[error("zone {0} defined more than once")]
    DuplicateZone(ZoneId),
    #[error("invalid value '{value}' in column '{column}' (line {line})")]
    InvalidValue {
        column: String,
        value: String,
        line: usize,
    },
    #[error("unknown development capacity mode '{0}', expected 'units' or 'area'")]
    InvalidMode(String),
}
