//! Error types for the emulation system compiler

use thiserror::Error;

/// Result type for emulation system operations
pub type Result<T> = std::result::Result<T, EmulationError>;

/// Emulation system error types
#[derive(Error, Debug)]
pub enum EmulationError {
    #[error("Invalid identifier for \"{field}\": \"{value}\" must match ^[A-Za-z0-9_-]+$")]
    InvalidIdentifier { field: String, value: String },

    #[error("Duplicate identifier: \"{0}\" is used by more than one container")]
    DuplicateIdentifier(String),

    #[error("Emulation level \"{level}\" not supported for \"{hardware}\"")]
    UnsupportedCombination { hardware: String, level: String },

    #[error("Wrong robot: expected {expected}, found {found}")]
    WrongRobotExpected { expected: String, found: String },

    #[error(
        "Could not classify source \"{field}\": \"{value}\" is not \"latest\", a 40 character commit sha, an allowed branch or an existing absolute directory"
    )]
    SourceClassificationFailed { field: String, value: String },

    #[error("Unknown repository: {0}")]
    UnknownRepository(String),

    #[error("No robot defined, required by {0}")]
    MissingRobot(String),

    #[error("Image undefined: {0}")]
    ImageUndefined(String),

    #[error("Invalid pipette \"{field}\" = \"{value}\": {reason}")]
    InvalidPipette {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid mount \"{field}\" = \"{value}\": {reason}")]
    InvalidMount {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Remote only was requested but \"{0}\" uses a local source")]
    NotRemoteOnly(String),

    #[error("Invalid container filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Compose error: {0}")]
    Compose(String),

    #[error("Compose file parse error: {0}")]
    ComposeParse(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(String),
}
