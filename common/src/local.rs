use anyhow::{Context, anyhow};
use tracing::instrument;

use crate::fs::{DirCreate, Error, Filesystem, Kind};

/// Permission bits for files and directories created on the local endpoint (rwxrwxr--).
pub const CREATE_MODE: u32 = 0o774;

fn kind_of(metadata: &std::fs::Metadata) -> Kind {
    if metadata.is_dir() {
        Kind::Directory
    } else {
        if !metadata.is_file() {
            tracing::debug!(
                "unsupported file type {:?}, treating it as a file",
                metadata.file_type()
            );
        }
        Kind::File
    }
}

/// The filesystem of the machine we run on.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

impl Filesystem for LocalFs {
    type Reader = tokio::fs::File;
    type Writer = tokio::fs::File;

    fn separator(&self) -> char {
        std::path::MAIN_SEPARATOR
    }

    fn name(&self) -> &str {
        "local"
    }

    #[instrument(skip(self))]
    async fn classify(&self, path: &str) -> Result<Option<Kind>, Error> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) => Ok(Some(kind_of(&metadata))),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(Error::stat(path, error)),
        }
    }

    #[instrument(skip(self))]
    async fn list_children(&self, path: &str) -> Result<Vec<(String, Kind)>, Error> {
        let mut entries = tokio::fs::read_dir(path)
            .await
            .map_err(|error| Error::list(path, error))?;
        let mut children = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("failed traversing directory {path:?}"))
            .map_err(|error| Error::list(path, error))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if name == "." || name == ".." {
                continue;
            }
            // follow symlinks the same way classify() does
            let kind = match tokio::fs::metadata(entry.path()).await {
                Ok(metadata) => kind_of(&metadata),
                Err(error) => {
                    tracing::warn!(
                        "cannot determine type of {:?}, treating it as a file: {}",
                        entry.path(),
                        error
                    );
                    Kind::File
                }
            };
            children.push((name, kind));
        }
        Ok(children)
    }

    #[instrument(skip(self))]
    async fn create_directory(&self, path: &str) -> Result<DirCreate, Error> {
        let mut builder = tokio::fs::DirBuilder::new();
        #[cfg(unix)]
        builder.mode(CREATE_MODE);
        match builder.create(path).await {
            Ok(()) => Ok(DirCreate::Created),
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {
                match self.classify(path).await? {
                    Some(Kind::Directory) => Ok(DirCreate::AlreadyExists),
                    _ => Err(Error::directory_create(
                        path,
                        anyhow!("path exists and is not a directory"),
                    )),
                }
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Ok(DirCreate::ParentMissing)
            }
            Err(error) => Err(Error::directory_create(path, error)),
        }
    }

    #[instrument(skip(self))]
    async fn open_read(&self, path: &str) -> Result<(Self::Reader, u64), Error> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|error| Error::open(path, error))?;
        let metadata = file
            .metadata()
            .await
            .map_err(|error| Error::stat(path, error))?;
        Ok((file, metadata.len()))
    }

    #[instrument(skip(self))]
    async fn open_write(&self, path: &str) -> Result<Self::Writer, Error> {
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(CREATE_MODE);
        options
            .open(path)
            .await
            .map_err(|error| Error::open(path, error))
    }
}
