use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures surfaced by the analyzer, capture, diff and search layers.
///
/// Every variant is terminal for the call that produced it; batch operations
/// abort on the first one and return no partial result.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Invalid range: {message}")]
    InvalidRange { message: String },

    #[error("Syntax error in {origin}: {message}")]
    ParseFailure { origin: String, message: String },

    #[error("Invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Coarse classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidRange,
    ParseFailure,
    InvalidPattern,
    Io,
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn file_not_found(path: &Path) -> Self {
        Self::not_found(format!("file {}", path.display()))
    }

    pub fn invalid_range(message: impl Into<String>) -> Self {
        Self::InvalidRange {
            message: message.into(),
        }
    }

    pub fn parse_failure(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseFailure {
            origin: origin.into(),
            message: message.into(),
        }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidRange { .. } => ErrorKind::InvalidRange,
            Self::ParseFailure { .. } => ErrorKind::ParseFailure,
            Self::InvalidPattern(_) => ErrorKind::InvalidPattern,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    /// Qualify a `NotFound` resource with the file it was looked up in.
    pub fn in_file(self, path: &Path) -> Self {
        match self {
            Self::NotFound { resource } => Self::NotFound {
                resource: format!("{} in {}", resource, path.display()),
            },
            other => other,
        }
    }
}

/// Read a whole source file, reporting a missing file as `NotFound`.
pub(crate) fn read_source(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(CoreError::file_not_found(path));
    }
    std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))
}
