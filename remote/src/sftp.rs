//! Remote endpoint: the filesystem of the SSH server, reached over an SFTP channel.

use anyhow::anyhow;
use common::fs::{DirCreate, Error, Filesystem, Kind};
use common::local::CREATE_MODE;
use russh_sftp::client::SftpSession;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::protocol::{FileAttributes, OpenFlags, StatusCode};
use tracing::instrument;

fn status_code(error: &SftpError) -> Option<StatusCode> {
    match error {
        SftpError::Status(status) => Some(status.status_code),
        _ => None,
    }
}

fn reported_size(path: &str, attributes: &FileAttributes) -> Result<u64, Error> {
    attributes
        .size
        .ok_or_else(|| Error::stat(path, anyhow!("server did not report a size")))
}

fn create_attributes() -> FileAttributes {
    FileAttributes {
        permissions: Some(CREATE_MODE),
        ..FileAttributes::empty()
    }
}

/// SFTP paths always use `/`, whatever the server's operating system.
pub struct SftpFs {
    session: SftpSession,
    max_chunk: u64,
}

impl SftpFs {
    /// File handles move at most [`common::MAX_CHUNK_SIZE`] bytes per call, the packet limit of
    /// OpenSSH's sftp-server.
    pub fn new(session: SftpSession) -> Self {
        Self {
            session,
            max_chunk: common::MAX_CHUNK_SIZE,
        }
    }

    pub(crate) async fn close(&self) -> Result<(), SftpError> {
        self.session.close().await
    }

    async fn kind_of_link(&self, path: &str) -> Kind {
        match self.classify(path).await {
            Ok(Some(kind)) => kind,
            Ok(None) | Err(_) => {
                tracing::debug!("cannot follow link {:?}, treating it as a file", path);
                Kind::File
            }
        }
    }
}

impl Filesystem for SftpFs {
    type Reader = russh_sftp::client::fs::File;
    type Writer = russh_sftp::client::fs::File;

    fn separator(&self) -> char {
        '/'
    }

    fn name(&self) -> &str {
        "remote"
    }

    fn max_chunk(&self) -> Option<u64> {
        Some(self.max_chunk)
    }

    #[instrument(skip(self))]
    async fn classify(&self, path: &str) -> Result<Option<Kind>, Error> {
        match self.session.metadata(path).await {
            Ok(attributes) if attributes.is_dir() => Ok(Some(Kind::Directory)),
            Ok(_) => Ok(Some(Kind::File)),
            Err(error) if status_code(&error) == Some(StatusCode::NoSuchFile) => Ok(None),
            Err(error) => Err(Error::stat(path, error)),
        }
    }

    #[instrument(skip(self))]
    async fn list_children(&self, path: &str) -> Result<Vec<(String, Kind)>, Error> {
        let entries = self
            .session
            .read_dir(path)
            .await
            .map_err(|error| Error::list(path, error))?;
        let mut children = vec![];
        for entry in entries {
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }
            let file_type = entry.file_type();
            let kind = if file_type.is_dir() {
                Kind::Directory
            } else if file_type.is_symlink() {
                self.kind_of_link(&common::path::join(path, '/', &name))
                    .await
            } else {
                Kind::File
            };
            children.push((name, kind));
        }
        Ok(children)
    }

    #[instrument(skip(self))]
    async fn create_directory(&self, path: &str) -> Result<DirCreate, Error> {
        let error = match self.session.create_dir(path).await {
            Ok(()) => {
                if let Err(error) = self.session.set_metadata(path, create_attributes()).await {
                    tracing::warn!("cannot set permissions of {:?}: {}", path, &error);
                }
                return Ok(DirCreate::Created);
            }
            Err(error) => error,
        };
        if status_code(&error) == Some(StatusCode::NoSuchFile) {
            return Ok(DirCreate::ParentMissing);
        }
        // servers report an existing path as a generic failure
        match self.classify(path).await {
            Ok(Some(Kind::Directory)) => Ok(DirCreate::AlreadyExists),
            Ok(Some(Kind::File)) => Err(Error::directory_create(
                path,
                anyhow!("path exists and is not a directory"),
            )),
            _ => Err(Error::directory_create(path, error)),
        }
    }

    #[instrument(skip(self))]
    async fn open_read(&self, path: &str) -> Result<(Self::Reader, u64), Error> {
        let file = self
            .session
            .open(path)
            .await
            .map_err(|error| Error::open(path, error))?;
        let attributes = file
            .metadata()
            .await
            .map_err(|error| Error::stat(path, error))?;
        let size = reported_size(path, &attributes)?;
        Ok((file, size))
    }

    #[instrument(skip(self))]
    async fn open_write(&self, path: &str) -> Result<Self::Writer, Error> {
        self.session
            .open_with_flags_and_attributes(
                path,
                OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
                create_attributes(),
            )
            .await
            .map_err(|error| Error::open(path, error))
    }
}
