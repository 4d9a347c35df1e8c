//! Error types for devdocker

use std::path::PathBuf;

use thiserror::Error;

/// Exit status for config-level failures.
pub const EXIT_CONFIG: i32 = 1;

/// Exit status when the running container does not match the config.
pub const EXIT_VERSION: i32 = 100;

#[derive(Error, Debug)]
pub enum DevDockerError {
    #[error("Config file '{name}' not found in {start} or any parent directory")]
    ConfigNotFound { name: String, start: PathBuf },

    #[error("Failed to parse {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Cannot merge key '{key}': {left} and {right} values are incompatible")]
    ConfigMergeConflict {
        key: String,
        left: &'static str,
        right: &'static str,
    },

    #[error("Invalid config {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    #[error(
        "Container '{container}' runs image version {found} but config wants {expected}. \
         Recreate it with `devdocker create`"
    )]
    VersionMismatch {
        container: String,
        found: String,
        expected: String,
    },

    #[error(
        "Container '{container}' carries no image version stamp. \
         Recreate it with `devdocker create`"
    )]
    VersionMissing { container: String },

    #[error("Post-create command `{command}` exited with status {status}")]
    PostCreateFailed { command: String, status: i32 },

    #[error("Container '{container}' is not running")]
    ContainerNotRunning { container: String },

    #[error("Unexpected output from `{command}`: {message}")]
    UnexpectedOutput { command: String, message: String },

    #[error("`{command}` exited with status {status}")]
    RuntimeFailed { command: String, status: i32 },

    #[error("`{command}` was interrupted (status {status})")]
    Interrupted { command: String, status: i32 },

    #[error("Failed to set Ctrl+C handler: {0}")]
    InterruptHandler(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DevDockerError {
    /// Process exit status to report for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            DevDockerError::VersionMismatch { .. } | DevDockerError::VersionMissing { .. } => {
                EXIT_VERSION
            }
            DevDockerError::RuntimeFailed { status, .. }
            | DevDockerError::Interrupted { status, .. }
                if *status != 0 =>
            {
                *status
            }
            _ => EXIT_CONFIG,
        }
    }

    /// Ctrl+C ended a child; callers must not treat this as a tolerable failure
    pub fn is_interrupt(&self) -> bool {
        matches!(self, DevDockerError::Interrupted { .. })
    }
}

pub type Result<T> = std::result::Result<T, DevDockerError>;
