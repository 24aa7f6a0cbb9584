//! Error types and exit codes for codehost

use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Main error type for codehost operations
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Unsupported profile {serial}: the runtime can only be installed for the primary profile")]
    UnsupportedProfile { serial: u64 },

    #[error("Failed to read archive: {message}")]
    ArchiveRead { message: String },

    #[error("Failed to write {path}: {message}")]
    FilesystemWrite { path: PathBuf, message: String },

    #[error("Status surface error: {message}")]
    StatusSurface { message: String },

    #[error("Failed to terminate session {session}: {message}")]
    SessionTermination { session: String, message: String },

    #[error("Failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("Another install is already running against {root}")]
    InstallInProgress { root: PathBuf },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Control channel error: {message}")]
    Control { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HostError {
    /// Build an archive read error from anything displayable
    pub fn archive(err: impl std::fmt::Display) -> Self {
        Self::ArchiveRead {
            message: err.to_string(),
        }
    }

    /// Build a filesystem write error for `path`
    pub fn write(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::FilesystemWrite {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Whether this error must take the whole application down
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnsupportedProfile { .. })
    }

    /// Convert error to an exit code:
    /// - 1: IO / filesystem error
    /// - 2: Archive could not be read
    /// - 3: Unsupported profile
    /// - 4: Session or status failure surfaced to the caller
    /// - 5: Configuration or control channel error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Io(_) => ExitCode::from(1),
            Self::FilesystemWrite { .. } => ExitCode::from(1),
            Self::InstallInProgress { .. } => ExitCode::from(1),
            Self::ArchiveRead { .. } => ExitCode::from(2),
            Self::UnsupportedProfile { .. } => ExitCode::from(3),
            Self::StatusSurface { .. } => ExitCode::from(4),
            Self::SessionTermination { .. } => ExitCode::from(4),
            Self::Spawn { .. } => ExitCode::from(4),
            Self::ConfigError { .. } => ExitCode::from(5),
            Self::Control { .. } => ExitCode::from(5),
        }
    }
}

/// Result type alias for codehost operations
pub type Result<T> = std::result::Result<T, HostError>;
