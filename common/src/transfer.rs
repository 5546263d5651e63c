//! Transfer driver: moves a file or a directory tree from one endpoint to another.
//!
//! A transfer runs in four steps:
//! 1. classify the source root and enumerate everything below it (see [`crate::walk`]),
//! 2. make sure the destination root exists, creating missing ancestors on the way,
//! 3. translate each entry's path to the destination (see [`crate::path::Translator`]),
//! 4. create directories and copy file contents, in enumeration order.
//!
//! Failing at steps 1 or 2 aborts the transfer before anything is written. Failures of
//! individual entries are logged and counted, and the driver moves on to the next entry unless
//! [`TransferConfig::fail_early`] is set.

use anyhow::anyhow;
use async_recursion::async_recursion;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::instrument;

use crate::config::TransferConfig;
use crate::fs::{self, DirCreate, Filesystem, Kind};
use crate::path::{self, Separators, Translator};
use crate::walk::{self, SourceEntry};

/// Error type for transfers that preserves the summary of work done before the failure.
///
/// # Logging Convention
/// The Display implementation automatically shows the full error chain, so you can log it
/// with any format specifier:
/// ```ignore
/// tracing::error!("transfer failed: {}", &error);   // ✅ Shows full chain
/// tracing::error!("transfer failed: {:#}", &error); // ✅ Shows full chain
/// ```
#[derive(Debug, thiserror::Error)]
#[error("{source:#}")]
pub struct Error {
    #[source]
    pub source: anyhow::Error,
    pub summary: Summary,
}

impl Error {
    #[must_use]
    pub fn new(source: anyhow::Error, summary: Summary) -> Self {
        Error { source, summary }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub bytes_copied: u64,
    pub files_copied: usize,
    pub directories_created: usize,
    pub directories_unchanged: usize,
    pub files_failed: usize,
    pub directories_failed: usize,
}

impl Summary {
    pub fn failures(&self) -> usize {
        self.files_failed + self.directories_failed
    }
}

impl std::ops::Add for Summary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            bytes_copied: self.bytes_copied + other.bytes_copied,
            files_copied: self.files_copied + other.files_copied,
            directories_created: self.directories_created + other.directories_created,
            directories_unchanged: self.directories_unchanged + other.directories_unchanged,
            files_failed: self.files_failed + other.files_failed,
            directories_failed: self.directories_failed + other.directories_failed,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "bytes copied: {}\n\
            files copied: {}\n\
            directories created: {}\n\
            directories unchanged: {}\n\
            files failed: {}\n\
            directories failed: {}",
            bytesize::ByteSize(self.bytes_copied),
            self.files_copied,
            self.directories_created,
            self.directories_unchanged,
            self.files_failed,
            self.directories_failed,
        )
    }
}

/// Makes sure `path` exists as a directory, creating any missing ancestors first.
///
/// Returns [`DirCreate::Created`] or [`DirCreate::AlreadyExists`], never
/// [`DirCreate::ParentMissing`]. Each recursive step works on a strictly shorter path.
#[async_recursion]
pub async fn ensure_directory<F: Filesystem>(fs: &F, path: &str) -> Result<DirCreate, fs::Error> {
    match fs.create_directory(path).await? {
        DirCreate::Created => {
            tracing::info!("created directory {:?} on {}", path, fs.name());
            return Ok(DirCreate::Created);
        }
        DirCreate::AlreadyExists => {
            tracing::debug!("directory {:?} already exists on {}", path, fs.name());
            return Ok(DirCreate::AlreadyExists);
        }
        DirCreate::ParentMissing => {}
    }
    let parent = path::parent(path, fs.separator())
        .filter(|parent| parent.len() < path.len())
        .ok_or_else(|| {
            fs::Error::directory_create(path, anyhow!("parent is missing and cannot be derived"))
        })?;
    tracing::info!(
        "parent {:?} of {:?} is missing on {}, creating it first",
        parent,
        path,
        fs.name()
    );
    ensure_directory(fs, parent)
        .await
        .map_err(|error| fs::Error::directory_create(path, anyhow::Error::new(error)))?;
    match fs.create_directory(path).await? {
        DirCreate::ParentMissing => Err(fs::Error::directory_create(
            path,
            anyhow!("parent {parent:?} vanished right after it was created"),
        )),
        outcome => {
            tracing::info!("created directory {:?} on {}", path, fs.name());
            Ok(outcome)
        }
    }
}

/// Copies the full content of `src` into `dst`, replacing whatever `dst` held before.
///
/// The source size is taken when the file is opened. Each step issues a single read of at most
/// `chunk_size` bytes (never more than what is left) and a single write of what was read; a
/// short read just means the next step asks for the remainder. A read returning zero bytes
/// ends the copy early. A write accepting fewer bytes than it was given fails the file with
/// [`fs::Error::ShortWrite`]. `chunk_size` is lowered to the smaller [`Filesystem::max_chunk`]
/// of the two endpoints.
///
/// Returns the number of bytes copied.
#[instrument(skip(src_fs, dst_fs))]
pub async fn copy_file<S: Filesystem, D: Filesystem>(
    src_fs: &S,
    dst_fs: &D,
    src: &str,
    dst: &str,
    chunk_size: u64,
) -> Result<u64, fs::Error> {
    let prog = crate::get_progress();
    let (mut reader, size) = src_fs.open_read(src).await?;
    let mut writer = dst_fs.open_write(dst).await?;
    let chunk_size = [src_fs.max_chunk(), dst_fs.max_chunk()]
        .into_iter()
        .flatten()
        .fold(chunk_size, u64::min);
    tracing::debug!("copying {} bytes in chunks of up to {}", size, chunk_size);
    let mut buffer = vec![0u8; chunk_size.clamp(1, size.max(1)) as usize];
    let mut remaining = size;
    while remaining > 0 {
        let requested = remaining.min(buffer.len() as u64) as usize;
        let read = reader
            .read(&mut buffer[..requested])
            .await
            .map_err(|error| fs::Error::read(src, error))?;
        if read == 0 {
            tracing::warn!(
                "{:?} ended after {} of {} bytes, it may have been truncated while copying",
                src,
                size - remaining,
                size
            );
            break;
        }
        if read < requested {
            tracing::trace!("short read: {} of {} bytes, continuing", read, requested);
        }
        let written = writer
            .write(&buffer[..read])
            .await
            .map_err(|error| fs::Error::write(dst, error))?;
        if written != read {
            return Err(fs::Error::ShortWrite {
                path: dst.to_string(),
                requested: read,
                written,
            });
        }
        remaining -= read as u64;
        prog.bytes_copied.add(read as u64);
    }
    writer
        .shutdown()
        .await
        .map_err(|error| fs::Error::write(dst, error))?;
    Ok(size - remaining)
}

async fn transfer_entry<S: Filesystem, D: Filesystem>(
    src_fs: &S,
    dst_fs: &D,
    translator: &Translator,
    entry: &SourceEntry,
    chunk_size: u64,
) -> anyhow::Result<Summary> {
    let prog = crate::get_progress();
    let destination = translator.translate(&entry.path)?;
    tracing::debug!("{} {:?} -> {:?}", entry.kind, &entry.path, &destination);
    match entry.kind {
        Kind::Directory => match ensure_directory(dst_fs, &destination).await? {
            DirCreate::Created => {
                prog.directories_created.inc();
                Ok(Summary {
                    directories_created: 1,
                    ..Default::default()
                })
            }
            _ => {
                prog.directories_unchanged.inc();
                Ok(Summary {
                    directories_unchanged: 1,
                    ..Default::default()
                })
            }
        },
        Kind::File => {
            let bytes_copied =
                copy_file(src_fs, dst_fs, &entry.path, &destination, chunk_size).await?;
            tracing::info!(
                "copied {:?} -> {:?} ({})",
                &entry.path,
                &destination,
                bytesize::ByteSize(bytes_copied)
            );
            prog.files_copied.inc();
            Ok(Summary {
                bytes_copied,
                files_copied: 1,
                ..Default::default()
            })
        }
    }
}

/// Copies the configured source root from `src_fs` into the destination root on `dst_fs`.
///
/// Both endpoints are only borrowed; whatever session backs them stays open.
#[instrument(skip(src_fs, dst_fs))]
pub async fn transfer<S: Filesystem, D: Filesystem>(
    src_fs: &S,
    dst_fs: &D,
    config: &TransferConfig,
) -> Result<Summary, Error> {
    let prog = crate::get_progress();
    let root = config.source_root();
    tracing::info!(
        "{}: {:?} ({}) -> {:?} ({})",
        config.direction(),
        root,
        src_fs.name(),
        config.destination_root(),
        dst_fs.name()
    );
    let listing = walk::enumerate(src_fs, root, config.recursive())
        .await
        .map_err(|error| Error::new(anyhow::Error::new(error), Default::default()))?;
    if listing.entries[0].kind == Kind::File && config.recursive() {
        tracing::warn!("{:?} is not a directory, recursion has no effect", root);
    }
    let unlisted = listing.unlisted_directories.len();
    let mut summary = Summary {
        directories_failed: unlisted,
        ..Default::default()
    };
    prog.failures.add(unlisted as u64);
    if config.fail_early
        && let Some(error) = listing.unlisted_directories.into_iter().next()
    {
        return Err(Error::new(anyhow::Error::new(error), summary));
    }
    ensure_directory(dst_fs, config.destination_root())
        .await
        .map_err(|error| {
            Error::new(
                anyhow::Error::new(error).context(format!(
                    "cannot prepare destination {:?}",
                    config.destination_root()
                )),
                summary,
            )
        })?;
    let translator = Translator::new(
        root,
        config.destination_root(),
        Separators {
            source: src_fs.separator(),
            destination: dst_fs.separator(),
        },
    );
    prog.entries_total.add(listing.entries.len() as u64);
    for entry in &listing.entries {
        let result = transfer_entry(src_fs, dst_fs, &translator, entry, config.chunk_size).await;
        prog.entries_done.inc();
        match result {
            Ok(entry_summary) => summary = summary + entry_summary,
            Err(error) => {
                tracing::error!("{} {:?} failed: {:#}", entry.kind, &entry.path, &error);
                prog.failures.inc();
                match entry.kind {
                    Kind::Directory => summary.directories_failed += 1,
                    Kind::File => summary.files_failed += 1,
                }
                if config.fail_early {
                    return Err(Error::new(error, summary));
                }
            }
        }
    }
    if summary.failures() > 0 {
        return Err(Error::new(
            anyhow!(
                "transfer encountered errors: {} of {} entries failed",
                summary.failures(),
                listing.entries.len() + unlisted
            ),
            summary,
        ));
    }
    tracing::info!("transfer of {:?} complete", root);
    Ok(summary)
}
