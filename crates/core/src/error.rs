//! Error taxonomy for the monitoring engine

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by monitors, scans and registrations.
///
/// Local failures inside a large scan (one unreadable entry) are logged
/// and skipped rather than surfaced here; these variants cover failures
/// that abort a whole operation or registration.
#[derive(Debug, Error)]
pub enum Error {
    /// Start-time validation: the monitored path is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A directory listing or scan failed outright.
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backend refused to set up a watch for a registration.
    #[error("registration failed: {0}")]
    Registration(String),

    /// The backend reported an error for an already-active registration.
    /// The registration is implicitly unregistered afterwards.
    #[error("monitoring failed: {0}")]
    Monitoring(String),
}

impl Error {
    /// Attach path context to an i/o failure.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
