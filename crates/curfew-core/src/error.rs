//! Error types shared by the enforcement core.

use curfew_provider::StoreError;
use std::fmt;
use thiserror::Error;

pub type CurfewResult<T> = Result<T, CurfewError>;

/// Crate-level error for configuration, IO, and anything escaping a session.
#[derive(Debug, Error)]
pub enum CurfewError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML configuration: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("failed to render TOML configuration: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("failed to process YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Restriction(#[from] RestrictionError),

    #[error(transparent)]
    Session(#[from] FatalSessionError),
}

/// Step of the restriction lifecycle that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictionErrorKind {
    ReadFailed,
    PathCreateFailed,
    WriteProbeFailed,
    WriteFailed,
    VerifyMismatch,
    RevertFailed,
}

impl RestrictionErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RestrictionErrorKind::ReadFailed => "read failed",
            RestrictionErrorKind::PathCreateFailed => "key creation failed",
            RestrictionErrorKind::WriteProbeFailed => "write-permission probe failed",
            RestrictionErrorKind::WriteFailed => "write failed",
            RestrictionErrorKind::VerifyMismatch => "verification mismatch",
            RestrictionErrorKind::RevertFailed => "revert failed",
        }
    }
}

impl fmt::Display for RestrictionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {cause}")]
pub struct RestrictionError {
    pub kind: RestrictionErrorKind,
    pub cause: String,
}

impl RestrictionError {
    pub fn new(kind: RestrictionErrorKind, cause: impl Into<String>) -> Self {
        Self {
            kind,
            cause: cause.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("failed to sanitize input: {0}")]
    SanitizeFailed(String),

    #[error("invalid target sentence: {0}")]
    InvalidTarget(String),
}

/// Failure reported by a presentation callback.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("projection `{callback}` failed: {reason}")]
pub struct ProjectionError {
    pub callback: &'static str,
    pub reason: String,
}

impl ProjectionError {
    pub fn new(callback: &'static str, reason: impl Into<String>) -> Self {
        Self {
            callback,
            reason: reason.into(),
        }
    }
}

/// Unrecoverable session failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FatalSessionError {
    #[error("restriction could not be applied: {0}")]
    Restriction(#[from] RestrictionError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("session aborted: {0}")]
    Aborted(String),
}
