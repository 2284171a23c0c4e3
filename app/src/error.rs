/// error.rs — Error kinds surfaced by the loader, the archiver and the session.
use serde::Serialize;
use std::{fmt, io, path::PathBuf};
use thiserror::Error;

/// Failures of the two file operations.
#[derive(Error, Debug)]
pub enum ZipperError {
    /// Path missing, unreadable, or an I/O error while reading.
    #[error("cannot read {}: {source}", .path.display())]
    ReadFailure {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    /// Source gone at zip time, destination unwritable, or stat failure.
    #[error("cannot write archive {}: {source}", .path.display())]
    WriteFailure {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ZipperError {
    pub fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::ReadFailure { path: path.into(), source }
    }

    pub fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::WriteFailure { path: path.into(), source }
    }

    pub fn path(&self) -> &PathBuf {
        match self {
            Self::ReadFailure { path, .. } | Self::WriteFailure { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Load,
    Archive,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Load    => f.write_str("load"),
            Operation::Archive => f.write_str("archive"),
        }
    }
}

/// Rejections raised by the session controller on top of file errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    File(#[from] ZipperError),

    #[error("{0} already in progress")]
    Busy(Operation),

    #[error("no file has been loaded")]
    NothingLoaded,
}
