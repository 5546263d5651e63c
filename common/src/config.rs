//! Configuration types for transfers, the runtime and logging

use crate::path;

/// Default number of bytes moved per read/write call.
pub const DEFAULT_CHUNK_SIZE: u64 = 32 * 1024;

/// Upper bound for a single read/write call; SFTP servers commonly reject larger packets.
pub const MAX_CHUNK_SIZE: u64 = 255 * 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{0} is required for {1} authentication")]
    Missing(&'static str, &'static str),
    #[error("chunk size must be between 1 byte and {max}, got {got}")]
    ChunkSize {
        got: bytesize::ByteSize,
        max: bytesize::ByteSize,
    },
}

/// Which way the data flows relative to the local machine.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    /// Local source, remote destination.
    #[default]
    Upload,
    /// Remote source, local destination.
    Download,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Direction::Upload => write!(f, "upload"),
            Direction::Download => write!(f, "download"),
        }
    }
}

/// Validated description of one transfer. Built once and read-only afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferConfig {
    direction: Direction,
    recursive: bool,
    source_root: String,
    destination_root: String,
    /// Abort on the first entry that fails instead of moving on to the next one.
    pub fail_early: bool,
    pub chunk_size: u64,
}

impl TransferConfig {
    /// Trailing separators are stripped from both roots.
    pub fn new(
        direction: Direction,
        recursive: bool,
        source_root: &str,
        destination_root: &str,
    ) -> Result<Self, ConfigError> {
        let source_root = path::strip_trailing_separators(source_root);
        let destination_root = path::strip_trailing_separators(destination_root);
        if source_root.is_empty() {
            return Err(ConfigError::Empty("source path"));
        }
        if destination_root.is_empty() {
            return Err(ConfigError::Empty("destination path"));
        }
        Ok(Self {
            direction,
            recursive,
            source_root: source_root.to_string(),
            destination_root: destination_root.to_string(),
            fail_early: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    pub fn with_fail_early(mut self, fail_early: bool) -> Self {
        self.fail_early = fail_early;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Result<Self, ConfigError> {
        if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::ChunkSize {
                got: bytesize::ByteSize(chunk_size),
                max: bytesize::ByteSize(MAX_CHUNK_SIZE),
            });
        }
        self.chunk_size = chunk_size;
        Ok(self)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }

    pub fn source_root(&self) -> &str {
        &self.source_root
    }

    pub fn destination_root(&self) -> &str {
        &self.destination_root
    }
}

/// Runtime configuration for tokio and thread pools
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeConfig {
    /// Number of worker threads (0 = number of CPU cores)
    pub max_workers: usize,
    /// Number of blocking threads (0 = tokio default of 512)
    pub max_blocking_threads: usize,
}

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress error output
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
    /// Print summary statistics at the end
    pub print_summary: bool,
}

/// Tracing configuration for debugging
#[derive(Debug, Default, Clone)]
pub struct TracingConfig {
    /// Write a TRACE level log (including the SSH protocol trace) to this file
    pub debug_log_file: Option<std::path::PathBuf>,
}
