//! Path-string arithmetic shared by both endpoints.
//!
//! Nothing in here touches a filesystem: every function is a pure transformation of its inputs,
//! parameterized by the separator(s) of the endpoint(s) involved.

/// Returns the last component of `path`, or the whole of `path` if it has no separator.
pub fn basename(path: &str, separator: char) -> &str {
    match path.rfind(separator) {
        Some(pos) => &path[pos + separator.len_utf8()..],
        None => path,
    }
}

/// Returns everything before the last separator of `path`.
///
/// A path whose only separator is the leading one has the root separator as its parent.
/// Returns `None` for bare names and for the root itself.
pub fn parent(path: &str, separator: char) -> Option<&str> {
    let pos = path.rfind(separator)?;
    if pos == 0 {
        if path.len() == separator.len_utf8() {
            return None;
        }
        return Some(&path[..separator.len_utf8()]);
    }
    Some(&path[..pos])
}

/// Joins `name` onto `dir`, avoiding a doubled separator when `dir` already ends with one.
pub fn join(dir: &str, separator: char, name: &str) -> String {
    if dir.ends_with(separator) {
        format!("{dir}{name}")
    } else {
        format!("{dir}{separator}{name}")
    }
}

/// Rewrites every `from` separator in `path` to `to`.
pub fn convert_separators(path: &str, from: char, to: char) -> String {
    if from == to {
        return path.to_string();
    }
    path.chars()
        .map(|c| if c == from { to } else { c })
        .collect()
}

/// Returns the part of `entry` that lies below `root`, including its leading separator.
///
/// The root itself yields an empty suffix.
pub fn suffix<'a>(root: &str, entry: &'a str) -> anyhow::Result<&'a str> {
    entry
        .strip_prefix(root)
        .ok_or_else(|| anyhow::anyhow!("{entry:?} is not located under {root:?}"))
}

/// Strips trailing `/` and `\` characters, leaving a lone root separator in place.
pub fn strip_trailing_separators(path: &str) -> &str {
    let trimmed = path.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() && !path.is_empty() {
        &path[..1]
    } else {
        trimmed
    }
}

/// Separator conventions of the two endpoints of a transfer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Separators {
    pub source: char,
    pub destination: char,
}

/// Maps discovered source paths to their destination counterparts.
///
/// The destination mirrors the *last component* of the source root as the new top-level entry:
/// copying `/a/b/c` into `/x/y` produces `/x/y/c`, and `/a/b/c/d/e` lands at `/x/y/c/d/e`.
#[derive(Clone, Debug)]
pub struct Translator {
    source_root: String,
    destination_base: String,
    separators: Separators,
}

impl Translator {
    pub fn new(source_root: &str, destination_root: &str, separators: Separators) -> Self {
        let base_name = basename(source_root, separators.source);
        let destination_base = join(
            destination_root,
            separators.destination,
            &convert_separators(base_name, separators.source, separators.destination),
        );
        Self {
            source_root: source_root.to_string(),
            destination_base,
            separators,
        }
    }

    /// Destination path of the source root itself.
    pub fn destination_root_entry(&self) -> &str {
        &self.destination_base
    }

    /// Destination path for `entry`, which must be the source root or one of its descendants.
    pub fn translate(&self, entry: &str) -> anyhow::Result<String> {
        let rest = suffix(&self.source_root, entry)?;
        Ok(format!(
            "{}{}",
            self.destination_base,
            convert_separators(rest, self.separators.source, self.separators.destination)
        ))
    }
}
