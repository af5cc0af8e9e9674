//! Error types for tweak registration and reloading.

use std::path::PathBuf;
use thiserror::Error;

use crate::value::TweakType;

/// Errors surfaced to the caller of [`Tweaks::register`](crate::Tweaks::register).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TweakError {
    #[error("Failed to initialize tweak engine: {reason}")]
    InitFailed { reason: String },

    #[error("Tweak table is full ({capacity} entries)")]
    CapacityExceeded { capacity: usize },

    #[error("Tweak '{name}' in {file} is already registered as {existing}, not {requested}")]
    TypeConflict {
        name: String,
        file: PathBuf,
        existing: TweakType,
        requested: TweakType,
    },

    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("Tweak engine has been shut down")]
    ShutDown,
}

impl From<notify::Error> for TweakError {
    fn from(e: notify::Error) -> Self {
        TweakError::InitFailed {
            reason: e.to_string(),
        }
    }
}

/// Errors hit while refreshing a value from disk.
///
/// These never reach readers: the engine logs them and keeps the last good value.
#[derive(Error, Debug)]
pub enum ReloadError {
    #[error("Cannot read {path}: {source}")]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No assignment found for '{name}'")]
    ExtractionMiss { name: String },

    #[error("Literal {literal:?} for '{name}' is not a valid {expected}")]
    ParseFailure {
        name: String,
        literal: String,
        expected: TweakType,
    },
}

pub type TweakResult<T> = Result<T, TweakError>;
