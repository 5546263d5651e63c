use async_recursion::async_recursion;
use tracing::instrument;

use crate::fs::{Error, Filesystem, Kind};
use crate::path;

/// One filesystem object discovered under the source root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceEntry {
    pub path: String,
    pub kind: Kind,
}

/// Result of walking a source root.
///
/// `entries` always starts with the root and lists every directory before anything found inside
/// it (depth-first pre-order).
#[derive(Debug, Default)]
pub struct Listing {
    pub entries: Vec<SourceEntry>,
    /// Directories below the root whose contents could not be listed.
    pub unlisted_directories: Vec<Error>,
}

#[async_recursion]
async fn walk_directory<F: Filesystem>(
    fs: &F,
    dir: &str,
    recursive: bool,
    listing: &mut Listing,
) -> Result<(), Error> {
    let children = fs.list_children(dir).await?;
    for (name, kind) in children {
        let child_path = path::join(dir, fs.separator(), &name);
        tracing::debug!("found {} {:?}", kind, &child_path);
        listing.entries.push(SourceEntry {
            path: child_path.clone(),
            kind,
        });
        if kind == Kind::Directory && recursive {
            if let Err(error) = walk_directory(fs, &child_path, recursive, listing).await {
                tracing::error!("{:#}", &error);
                listing.unlisted_directories.push(error);
            }
        }
    }
    Ok(())
}

/// Enumerates everything under `root`.
///
/// A file root yields just itself. For a directory root its children are always listed; deeper
/// levels are only visited with `recursive` set, otherwise subdirectories are recorded but not
/// entered. Failing to classify or list the root itself is an error; failing to list a deeper
/// directory is recorded in [`Listing::unlisted_directories`] and the walk continues.
#[instrument(skip(fs))]
pub async fn enumerate<F: Filesystem>(
    fs: &F,
    root: &str,
    recursive: bool,
) -> Result<Listing, Error> {
    let kind = fs.classify(root).await?.ok_or_else(|| Error::NotFound {
        path: root.to_string(),
    })?;
    let mut listing = Listing {
        entries: vec![SourceEntry {
            path: root.to_string(),
            kind,
        }],
        unlisted_directories: vec![],
    };
    if kind == Kind::Directory {
        walk_directory(fs, root, recursive, &mut listing).await?;
    }
    tracing::info!(
        "found {} entries under {:?} on {}",
        listing.entries.len(),
        root,
        fs.name()
    );
    Ok(listing)
}
