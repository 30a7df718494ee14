use std::io;

use thiserror::Error;

/// Top-level failures that abort `main` with a specific exit code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("missing required argument: size")]
    MissingSize,

    #[error("failed to initialize log sink: {0}")]
    LogSinkInit(#[from] io::Error),
}

impl AppError {
    /// Exit code contract from SPEC_FULL.md §6.1.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::ConfigParse(_) => 1,
            AppError::MissingSize => 2,
            AppError::LogSinkInit(_) => 3,
        }
    }
}
