use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// The parallel phases of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Map,
    Reduce,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Map => f.write_str("map"),
            Phase::Reduce => f.write_str("reduce"),
        }
    }
}

/// Errors surfaced by the engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("filesystem error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed record at {}:{line}: {content:?}", path.display())]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("invalid key {key:?}: keys must be non-empty and contain no whitespace")]
    InvalidKey { key: String },

    #[error("value overflow while combining key {key:?}")]
    ValueOverflow { key: String },

    #[error("{phase} worker {index} failed: {source}")]
    Callback {
        phase: Phase,
        index: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{phase} worker {index} panicked: {message}")]
    Panicked {
        phase: Phase,
        index: usize,
        message: String,
    },

    #[error("{phase} worker {index} cancelled after another worker failed")]
    Cancelled { phase: Phase, index: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no {0} callback registered")]
    MissingCallback(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn callback(phase: Phase, index: usize, source: anyhow::Error) -> Self {
        Error::Callback {
            phase,
            index,
            source: source.into(),
        }
    }

    /// Whether this is the filesystem-error condition.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}

/// Attaches the path being worked on to an [`io::Error`].
pub(crate) trait IoContext<T> {
    fn with_path(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn with_path(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|source| Error::io(path, source))
    }
}
