use std::path::PathBuf;

use loom_core::{ConfigError, PipelineError, ValidationError, WriteError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid input {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: PipelineError,
    },

    #[error(transparent)]
    Pipeline(PipelineError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("strict mode failed: warnings={warning_count}, errors={error_count}")]
    StrictModeViolation {
        warning_count: usize,
        error_count: usize,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<PipelineError> for CliError {
    fn from(error: PipelineError) -> Self {
        match error {
            PipelineError::Config(error) => Self::Config(error),
            PipelineError::Write(error) => Self::Write(error),
            PipelineError::Validation(error) => Self::Validation(error),
            other => Self::Pipeline(other),
        }
    }
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Input { .. } => 2,
            Self::Pipeline(_) => 3,
            Self::Write(_) => 4,
            Self::StrictModeViolation { .. } => 5,
            Self::Read { .. } | Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}
