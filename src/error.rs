//! Error taxonomy for the conversion service. Usage errors reject a single
//! request with a descriptive message; filesystem and external-collaborator
//! errors are fatal for that request only. No error here tears down the
//! process.

use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad or missing input in the request or the runfolder contents.
    #[error("{message}")]
    Usage { message: String },

    #[error("no runfolder named '{name}' found under the configured runfolder paths")]
    RunfolderNotFound { name: String },

    #[error(
        "invalid lane specification '{spec}'. Expected lanes 1-8 as a single digit, \
         a run of digits, or a range such as '2-6'"
    )]
    LaneSpec { spec: String },

    /// No command builder is registered for this tool version.
    #[error("no bcl-convert runner configured for version '{version}'")]
    UnknownVersion { version: String },

    #[error("failed to parse run metadata {path:?}: {message}")]
    RunInfoFormat { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A failure reported by the external job queue, passed through unmodified.
    #[error(transparent)]
    External(#[from] anyhow::Error),
}

impl Error {
    pub fn usage(message: impl Into<String>) -> Error {
        Error::Usage {
            message: message.into(),
        }
    }

    /// True for errors a network front end should report as a client error
    /// rather than a server error.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Error::Usage { .. }
                | Error::RunfolderNotFound { .. }
                | Error::LaneSpec { .. }
                | Error::UnknownVersion { .. }
        )
    }
}
