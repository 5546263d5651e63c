//! Helpers shared by the unit tests of this crate.

use std::collections::{BTreeMap, HashSet};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use anyhow::anyhow;

use crate::fs::{DirCreate, Error, Filesystem, Kind};
use crate::path;

pub async fn setup_test_dir() -> anyhow::Result<tempfile::TempDir> {
    let tmp_dir = tempfile::tempdir()?;
    // foo
    // |- 0.txt
    // |- bar
    //    |- 1.txt
    //    |- 2.txt
    //    |- 3.txt
    // |- baz
    //    |- 4.txt
    //    |- 5.txt -> ../bar/2.txt
    let foo_path = tmp_dir.path().join("foo");
    tokio::fs::create_dir(&foo_path).await.unwrap();
    tokio::fs::write(foo_path.join("0.txt"), "0").await.unwrap();
    let bar_path = foo_path.join("bar");
    tokio::fs::create_dir(&bar_path).await.unwrap();
    tokio::fs::write(bar_path.join("1.txt"), "1").await.unwrap();
    tokio::fs::write(bar_path.join("2.txt"), "2").await.unwrap();
    tokio::fs::write(bar_path.join("3.txt"), "3").await.unwrap();
    let baz_path = foo_path.join("baz");
    tokio::fs::create_dir(&baz_path).await.unwrap();
    tokio::fs::write(baz_path.join("4.txt"), "4").await.unwrap();
    tokio::fs::symlink("../bar/2.txt", baz_path.join("5.txt"))
        .await
        .unwrap();
    Ok(tmp_dir)
}

#[derive(Clone, Debug)]
enum Node {
    Dir,
    File(Vec<u8>),
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    unlistable: HashSet<String>,
    unwritable: HashSet<String>,
    created_dirs: Vec<String>,
}

/// In-memory endpoint with a configurable separator.
///
/// Reads and writes can be capped per call to exercise short-count handling, and individual
/// paths can be made unlistable or unwritable.
#[derive(Clone, Debug)]
pub struct MemoryFs {
    separator: char,
    max_read: usize,
    max_write: usize,
    max_chunk: Option<u64>,
    state: Arc<Mutex<State>>,
}

impl MemoryFs {
    pub fn new(separator: char) -> Self {
        Self {
            separator,
            max_read: usize::MAX,
            max_write: usize::MAX,
            max_chunk: None,
            state: Default::default(),
        }
    }

    /// Caps every single read call at `max_read` bytes.
    pub fn with_max_read(mut self, max_read: usize) -> Self {
        self.max_read = max_read;
        self
    }

    /// Caps every single write call at `max_write` bytes.
    pub fn with_max_write(mut self, max_write: usize) -> Self {
        self.max_write = max_write;
        self
    }

    /// Advertises `max_chunk` through [`Filesystem::max_chunk`].
    pub fn with_max_chunk(mut self, max_chunk: u64) -> Self {
        self.max_chunk = Some(max_chunk);
        self
    }

    pub fn add_dir(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .nodes
            .insert(path.to_string(), Node::Dir);
    }

    pub fn add_file(&self, path: &str, content: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .nodes
            .insert(path.to_string(), Node::File(content.to_vec()));
    }

    pub fn deny_listing(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .unlistable
            .insert(path.to_string());
    }

    pub fn deny_writing(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .unwritable
            .insert(path.to_string());
    }

    pub fn is_dir(&self, path: &str) -> bool {
        matches!(
            self.state.lock().unwrap().nodes.get(path),
            Some(Node::Dir)
        )
    }

    pub fn file_content(&self, path: &str) -> Option<Vec<u8>> {
        match self.state.lock().unwrap().nodes.get(path) {
            Some(Node::File(content)) => Some(content.clone()),
            _ => None,
        }
    }

    /// Every path that exists, in sorted order.
    pub fn paths(&self) -> Vec<String> {
        self.state.lock().unwrap().nodes.keys().cloned().collect()
    }

    /// Directories created through [`Filesystem::create_directory`], in creation order.
    pub fn created_dirs(&self) -> Vec<String> {
        self.state.lock().unwrap().created_dirs.clone()
    }

    fn parent_exists(&self, state: &State, path: &str) -> bool {
        match path::parent(path, self.separator) {
            // a bare name or a root lives in the (always present) top level
            None => true,
            Some(parent) if parent.len() == self.separator.len_utf8() => true,
            Some(parent) if !parent.contains(self.separator) => true,
            Some(parent) => matches!(state.nodes.get(parent), Some(Node::Dir)),
        }
    }
}

pub struct MemoryReader {
    data: Vec<u8>,
    pos: usize,
    max_read: usize,
}

impl tokio::io::AsyncRead for MemoryReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let remaining = self.data.len() - self.pos;
        let len = remaining.min(buf.remaining()).min(self.max_read);
        let start = self.pos;
        buf.put_slice(&self.data[start..start + len]);
        self.pos += len;
        Poll::Ready(Ok(()))
    }
}

pub struct MemoryWriter {
    path: String,
    max_write: usize,
    state: Arc<Mutex<State>>,
}

impl tokio::io::AsyncWrite for MemoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let len = buf.len().min(self.max_write);
        let mut state = self.state.lock().unwrap();
        match state.nodes.get_mut(&self.path) {
            Some(Node::File(content)) => {
                content.extend_from_slice(&buf[..len]);
                Poll::Ready(Ok(len))
            }
            _ => Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "file was removed while open",
            ))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl Filesystem for MemoryFs {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn separator(&self) -> char {
        self.separator
    }

    fn name(&self) -> &str {
        "memory"
    }

    fn max_chunk(&self) -> Option<u64> {
        self.max_chunk
    }

    async fn classify(&self, path: &str) -> Result<Option<Kind>, Error> {
        Ok(match self.state.lock().unwrap().nodes.get(path) {
            Some(Node::Dir) => Some(Kind::Directory),
            Some(Node::File(_)) => Some(Kind::File),
            None => None,
        })
    }

    async fn list_children(&self, path: &str) -> Result<Vec<(String, Kind)>, Error> {
        let state = self.state.lock().unwrap();
        if state.unlistable.contains(path) {
            return Err(Error::list(path, anyhow!("permission denied")));
        }
        if !matches!(state.nodes.get(path), Some(Node::Dir)) {
            return Err(Error::list(path, anyhow!("not a directory")));
        }
        Ok(state
            .nodes
            .iter()
            .filter(|(candidate, _)| path::parent(candidate, self.separator) == Some(path))
            .map(|(candidate, node)| {
                let kind = match node {
                    Node::Dir => Kind::Directory,
                    Node::File(_) => Kind::File,
                };
                (path::basename(candidate, self.separator).to_string(), kind)
            })
            .collect())
    }

    async fn create_directory(&self, path: &str) -> Result<DirCreate, Error> {
        let mut state = self.state.lock().unwrap();
        match state.nodes.get(path) {
            Some(Node::Dir) => return Ok(DirCreate::AlreadyExists),
            Some(Node::File(_)) => {
                return Err(Error::directory_create(
                    path,
                    anyhow!("path exists and is not a directory"),
                ));
            }
            None => {}
        }
        if state.unwritable.contains(path) {
            return Err(Error::directory_create(path, anyhow!("permission denied")));
        }
        if !self.parent_exists(&state, path) {
            return Ok(DirCreate::ParentMissing);
        }
        state.nodes.insert(path.to_string(), Node::Dir);
        state.created_dirs.push(path.to_string());
        Ok(DirCreate::Created)
    }

    async fn open_read(&self, path: &str) -> Result<(Self::Reader, u64), Error> {
        match self.state.lock().unwrap().nodes.get(path) {
            Some(Node::File(content)) => Ok((
                MemoryReader {
                    data: content.clone(),
                    pos: 0,
                    max_read: self.max_read,
                },
                content.len() as u64,
            )),
            Some(Node::Dir) => Err(Error::open(path, anyhow!("is a directory"))),
            None => Err(Error::open(path, anyhow!("no such file"))),
        }
    }

    async fn open_write(&self, path: &str) -> Result<Self::Writer, Error> {
        let mut state = self.state.lock().unwrap();
        if state.unwritable.contains(path) {
            return Err(Error::open(path, anyhow!("permission denied")));
        }
        if matches!(state.nodes.get(path), Some(Node::Dir)) {
            return Err(Error::open(path, anyhow!("is a directory")));
        }
        if !self.parent_exists(&state, path) {
            return Err(Error::open(path, anyhow!("no such file or directory")));
        }
        state.nodes.insert(path.to_string(), Node::File(vec![]));
        Ok(MemoryWriter {
            path: path.to_string(),
            max_write: self.max_write,
            state: self.state.clone(),
        })
    }
}
