//! Error types for parfind
//!
//! This module defines the error hierarchy for the traversal engine:
//! - Configuration and CLI validation errors
//! - Per-action errors that abort the run (copy/unlink without the
//!   corresponding ignore flag, exec children killed by signal)
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Tolerable per-entry I/O errors never surface here; they are logged,
//!   counted in `Statistics` and traversal continues
//! - Errors that do surface are the ones that end the run

use std::io;
use thiserror::Error;

/// Top-level error type for the parfind application
#[derive(Error, Debug)]
pub enum ParfindError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors (signal handler setup, file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid thread count
    #[error("Invalid thread count {count}: must be at least 1")]
    InvalidThreadCount { count: u32 },

    /// Unrecognized --type character
    #[error("Invalid search type '{given}': expected one of f, d, b, c, p, l, s")]
    InvalidSearchType { given: String },

    /// A size or time argument did not parse
    #[error("Invalid value '{value}' for --{option}: {reason}")]
    InvalidFilterValue {
        option: &'static str,
        value: String,
        reason: String,
    },

    /// A --name or --path pattern did not compile
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// --exec was given without the ';' terminator
    #[error("Missing terminator ';' in 'exec' arguments list")]
    MissingExecTerminator,

    /// --exec was given more than once
    #[error("'exec' option is given more than once")]
    DuplicateExec,

    /// --copyto allows at most one scan path
    #[error("Only a single scan path may be given when --copyto is used")]
    CopyRequiresSinglePath,

    /// --user name could not be resolved
    #[error("Given user name could not be resolved to a numeric UID. Does the user exist? User: {name}")]
    UnknownUser { name: String },

    /// --group name could not be resolved
    #[error("Given group name could not be resolved to a numeric GID. Does the group exist? Group: {name}")]
    UnknownGroup { name: String },

    /// --mount/--xdev could not determine the device ID of the scan path
    #[error("Device ID retrieval for scan path '{path}' failed: {source}")]
    MountIdUnavailable { path: String, source: io::Error },

    /// --newer reference file could not be statted
    #[error("Failed to get attributes of path '{path}': {source}")]
    NewerFileInaccessible { path: String, source: io::Error },
}

/// Errors from the action pipeline that abort the run
///
/// Per-entry action failures covered by `--nocopyerr`/`--nodelerr` are logged
/// and counted instead; only the non-ignored ones become values of this type.
#[derive(Error, Debug)]
pub enum ActionError {
    /// Copy stage failed and copy errors are not ignored
    #[error("Failed to copy '{path}': {source}")]
    Copy { path: String, source: io::Error },

    /// Unlink stage failed and unlink errors are not ignored
    #[error("Failed to unlink '{path}': {source}")]
    Unlink { path: String, source: io::Error },

    /// Exec child was terminated by a signal
    #[error("Exec command terminated on signal {signal} for path '{path}'")]
    ExecKilled { path: String, signal: i32 },
}

/// Result type alias for ParfindError
pub type Result<T> = std::result::Result<T, ParfindError>;

/// Result type alias for ConfigError
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_conversion() {
        let cfg_err = ConfigError::InvalidThreadCount { count: 0 };
        let err: ParfindError = cfg_err.into();
        assert!(matches!(err, ParfindError::Config(_)));
    }

    #[test]
    fn test_action_error_display() {
        let err = ActionError::ExecKilled {
            path: "/data/f".into(),
            signal: 9,
        };
        let msg = err.to_string();
        assert!(msg.contains("signal 9"));
        assert!(msg.contains("/data/f"));
    }
}
