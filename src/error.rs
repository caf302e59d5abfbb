use std::io;

use thiserror::Error;

use crate::netcdf::DecodeError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced while opening or navigating an archive
#[derive(Debug, Error)]
pub enum Error {
    /// The archive could not be opened or its table of contents enumerated
    #[error("cannot read archive {path}: {source}")]
    ArchiveFormat {
        path: String,
        #[source]
        source: io::Error,
    },

    /// A child name is neither a directory nor a leaf under `context`
    #[error("'{requested}' not found under '/{context}'")]
    PathNotFound { requested: String, context: String },

    /// Leaf bytes were read but are not a decodable array file
    #[error("cannot decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: DecodeError,
    },

    /// Reading a member's bytes from the archive stream failed
    #[error("cannot read member {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The owning archive handle was closed or dropped
    #[error("archive is closed")]
    Closed,

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl Error {
    /// True for failures of the underlying stream, including use after close
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io { .. } | Error::Closed)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::PathNotFound { .. })
    }
}
