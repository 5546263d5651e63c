//! Filesystem endpoint contract used by the transfer engine.
//!
//! The engine never talks to a concrete endpoint - it is written against [`Filesystem`], which is
//! implemented once for the local filesystem ([`crate::local::LocalFs`]) and once for the remote
//! side of an authenticated SFTP session (in the `remote` crate).
//!
//! Paths are plain strings in the endpoint's own separator convention; translating between two
//! conventions is the job of [`crate::path`].
//!
//! # Chunked I/O
//!
//! Readers and writers returned by [`Filesystem::open_read`] and [`Filesystem::open_write`] are
//! ordinary tokio I/O handles. The engine drives them one call at a time (a single `read`, a
//! single `write`) so that short counts surface to the caller instead of being retried
//! implicitly.

use std::future::Future;

/// Kind of a discovered filesystem object.
///
/// Anything that is neither a directory nor a regular file (symlink target we could not
/// resolve, device, socket...) is reported as [`Kind::File`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Directory,
    File,
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Kind::Directory => write!(f, "directory"),
            Kind::File => write!(f, "file"),
        }
    }
}

/// Outcome of a single directory creation attempt.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DirCreate {
    Created,
    AlreadyExists,
    /// The immediate parent does not exist; nothing was created.
    ParentMissing,
}

/// Errors reported by filesystem endpoints.
///
/// Every variant names the path it failed on so that the message alone identifies the entry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot stat {path:?}: {source:#}")]
    Stat {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("{path:?} does not exist")]
    NotFound { path: String },
    #[error("cannot list directory {path:?}: {source:#}")]
    List {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("cannot create directory {path:?}: {source:#}")]
    DirectoryCreate {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("cannot open {path:?}: {source:#}")]
    Open {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed reading from {path:?}: {source:#}")]
    Read {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed writing to {path:?}: {source:#}")]
    Write {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("short write to {path:?}: {written} of {requested} bytes accepted")]
    ShortWrite {
        path: String,
        requested: usize,
        written: usize,
    },
}

impl Error {
    pub fn stat(path: &str, source: impl Into<anyhow::Error>) -> Self {
        Error::Stat {
            path: path.to_string(),
            source: source.into(),
        }
    }

    pub fn list(path: &str, source: impl Into<anyhow::Error>) -> Self {
        Error::List {
            path: path.to_string(),
            source: source.into(),
        }
    }

    pub fn directory_create(path: &str, source: impl Into<anyhow::Error>) -> Self {
        Error::DirectoryCreate {
            path: path.to_string(),
            source: source.into(),
        }
    }

    pub fn open(path: &str, source: impl Into<anyhow::Error>) -> Self {
        Error::Open {
            path: path.to_string(),
            source: source.into(),
        }
    }

    pub fn read(path: &str, source: impl Into<anyhow::Error>) -> Self {
        Error::Read {
            path: path.to_string(),
            source: source.into(),
        }
    }

    pub fn write(path: &str, source: impl Into<anyhow::Error>) -> Self {
        Error::Write {
            path: path.to_string(),
            source: source.into(),
        }
    }
}

/// One endpoint of a transfer.
///
/// Implementations are borrowed by the engine for the duration of a transfer and are never
/// closed by it - tearing down whatever session backs an endpoint is the owner's job.
pub trait Filesystem: Send + Sync {
    type Reader: tokio::io::AsyncRead + Unpin + Send;
    type Writer: tokio::io::AsyncWrite + Unpin + Send;

    /// Native path separator of this endpoint.
    fn separator(&self) -> char;

    /// Short label used in log messages ("local", "remote").
    fn name(&self) -> &str;

    /// Largest single read or write the endpoint's handles accept in one call, if bounded.
    fn max_chunk(&self) -> Option<u64> {
        None
    }

    /// Returns `None` if nothing exists at `path`.
    fn classify(&self, path: &str) -> impl Future<Output = Result<Option<Kind>, Error>> + Send;

    /// Lists the direct children of a directory as `(name, kind)` pairs, excluding `.` and `..`.
    ///
    /// Order is whatever the endpoint reports.
    fn list_children(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Vec<(String, Kind)>, Error>> + Send;

    /// Attempts to create exactly one directory, without creating any missing ancestors.
    fn create_directory(&self, path: &str) -> impl Future<Output = Result<DirCreate, Error>> + Send;

    /// Opens a file for reading and returns it along with its size at the time of opening.
    fn open_read(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<(Self::Reader, u64), Error>> + Send;

    /// Opens a file for writing, creating it if needed and truncating any existing content.
    fn open_write(&self, path: &str) -> impl Future<Output = Result<Self::Writer, Error>> + Send;
}
