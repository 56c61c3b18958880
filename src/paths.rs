//! Path algebra between the source tree, the output tree and hosted URLs.
//!
//! All three kinds are `/`-separated strings relative to their root, so they
//! compare, sort and print identically on every platform. Conversion to a
//! filesystem path only happens at the edges via `to_fs`.
//!
//! ```text
//! SourcePath  2021/01/01/alpha/index.md
//!     │ to_dest("html")
//!     ▼
//! DestPath    2021/01/01/alpha/index.html
//!     │ Linker::link(from, to)
//!     ▼
//! href        ../../../02/01/beta/index.html   (relative)
//!             /blog/2021/02/01/beta/index.html (with host_root = "/blog")
//! ```

use std::{
    fmt,
    path::{Path, PathBuf},
};

/// Split a `/`-separated relative path into `(dir, file_name)`.
fn split_last(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((dir, name)) => (dir, name),
        None => ("", path),
    }
}

/// Split a file name into `(stem, extension)`.
fn split_ext(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

fn join_fs(root: &Path, rel: &str) -> PathBuf {
    rel.split('/')
        .filter(|c| !c.is_empty())
        .fold(root.to_path_buf(), |acc, c| acc.join(c))
}

fn normalize(rel: &str) -> String {
    rel.replace('\\', "/").trim_matches('/').to_owned()
}

// ============================================================================
// SourcePath
// ============================================================================

/// A file relative to the source root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourcePath(String);

impl SourcePath {
    pub fn new(rel: &str) -> Self {
        Self(normalize(rel))
    }

    /// Relative source path of `file`, if it lies under `root`.
    pub fn from_fs(root: &Path, file: &Path) -> Option<Self> {
        let rel = file.strip_prefix(root).ok()?;
        let parts: Vec<&str> = rel
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(Self(parts.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_fs(&self, root: &Path) -> PathBuf {
        join_fs(root, &self.0)
    }

    /// Containing directory (`""` at the root).
    pub fn dir(&self) -> &str {
        split_last(&self.0).0
    }

    pub fn file_name(&self) -> &str {
        split_last(&self.0).1
    }

    pub fn file_stem(&self) -> &str {
        split_ext(self.file_name()).0
    }

    pub fn extension(&self) -> Option<&str> {
        split_ext(self.file_name()).1
    }

    /// Output location: same path with the extension replaced.
    pub fn to_dest(&self, output_ext: &str) -> DestPath {
        let dir = self.dir();
        let name = format!("{}.{output_ext}", self.file_stem());
        if dir.is_empty() {
            DestPath(name)
        } else {
            DestPath(format!("{dir}/{name}"))
        }
    }

}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// DestPath
// ============================================================================

/// A file relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DestPath(String);

impl DestPath {
    pub fn new(rel: &str) -> Self {
        Self(normalize(rel))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_fs(&self, root: &Path) -> PathBuf {
        join_fs(root, &self.0)
    }

    pub fn dir(&self) -> &str {
        split_last(&self.0).0
    }

    pub fn file_stem(&self) -> &str {
        split_ext(split_last(&self.0).1).0
    }

    /// A file in the same directory.
    pub fn sibling(&self, name: &str) -> Self {
        match self.dir() {
            "" => Self(name.to_owned()),
            dir => Self(format!("{dir}/{name}")),
        }
    }

    /// Relative href from the directory containing `from` to `self`.
    pub fn relative_to(&self, from: &DestPath) -> String {
        let from_dirs: Vec<&str> = from.dir().split('/').filter(|c| !c.is_empty()).collect();
        let to_parts: Vec<&str> = self.0.split('/').collect();
        let to_dirs = &to_parts[..to_parts.len().saturating_sub(1)];

        let common = from_dirs
            .iter()
            .zip(to_dirs)
            .take_while(|(a, b)| a == b)
            .count();

        let mut href = "../".repeat(from_dirs.len() - common);
        href.push_str(&to_parts[common..].join("/"));
        href
    }

    /// Absolute URL path under a hosting prefix.
    pub fn to_host(&self, prefix: &str) -> String {
        format!("{}/{}", prefix.trim_end_matches('/'), self.0)
    }
}

impl fmt::Display for DestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Linker
// ============================================================================

/// Produces hrefs between output files, relative or absolute depending on
/// whether a hosting root is configured.
#[derive(Debug, Clone, Default)]
pub struct Linker {
    host_root: Option<String>,
}

impl Linker {
    pub fn new(host_root: Option<String>) -> Self {
        Self { host_root }
    }

    pub fn link(&self, from: &DestPath, to: &DestPath) -> String {
        match &self.host_root {
            Some(prefix) => to.to_host(prefix),
            None => to.relative_to(from),
        }
    }
}
