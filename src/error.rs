//! Typed errors returned across the core boundary

use thiserror::Error;

use crate::types::ResolutionSpec;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModeError {
    #[error("Invalid resolution format: '{0}' (expected 'width,height[,refresh[,hidpi]]' or 'WIDTHxHEIGHT[@REFRESH]')")]
    InvalidSpecFormat(String),

    #[error("Display not found: '{0}'")]
    DisplayNotFound(String),

    #[error("No matching mode for {0}")]
    NoMatchingMode(ResolutionSpec),

    #[error("Failed to apply {mode} on '{display}'")]
    ModeApplicationFailed { display: String, mode: String },

    #[error("Main display unavailable")]
    MainDisplayUnavailable,

    #[error("Could not determine target display")]
    TargetDisplayUndetermined,
}
