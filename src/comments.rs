//! Threaded comments.
//!
//! Comment fragments live next to the item they belong to, one file per
//! comment, named by their position in the thread:
//!
//! ```text
//! 2021/01/01/alpha/
//! ├── index.md
//! ├── comment.1.mdc      first top-level comment
//! ├── comment.1.1.mdc    first reply to it
//! ├── comment.1.2.mdc    second reply
//! └── comment.2.mdc      second top-level comment
//! ```
//!
//! Every fragment is rendered on its own, then the thread is folded into a
//! single fragment in pre-order: a comment's container holds its rendered
//! text, its reply link, and then its folded children.
//!
//! Siblings are scanned `1, 2, 3, ...` and the scan stops at the first
//! missing index, so `1.3` without `1.2` is never reached. Such unreachable
//! fragments are reported back as `dropped`.

use crate::render::{RenderContext, RenderError, Renderer};
use std::{
    collections::{BTreeMap, BTreeSet, btree_map::Entry},
    fmt, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;

const FILE_PREFIX: &str = "comment.";

// ============================================================================
// Comment paths
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid comment path `{0}`")]
pub struct CommentPathError(String);

/// Dot-separated, 1-based sibling indices, e.g. `1.2`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommentPath(Vec<u32>);

impl CommentPath {
    /// The item itself; parent of top-level comments.
    fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, index: u32) -> Self {
        let mut parts = self.0.clone();
        parts.push(index);
        Self(parts)
    }

    /// HTML id of the comment container: `comment-1-2`.
    pub fn anchor(&self) -> String {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        format!("comment-{}", parts.join("-"))
    }
}

impl FromStr for CommentPath {
    type Err = CommentPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split('.')
            .map(|part| part.parse::<u32>().ok().filter(|&n| n > 0))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| CommentPathError(s.to_owned()))?;
        Ok(Self(parts))
    }
}

impl fmt::Display for CommentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// All comment files found in one folder.
#[derive(Debug, Default)]
pub struct CommentThread {
    nodes: BTreeMap<CommentPath, PathBuf>,
    /// File names that look like comments but carry an invalid path.
    pub invalid: Vec<String>,
    /// File names whose path was already taken by an earlier file
    /// (`comment.1.mdc` after `comment.01.mdc`); the first in name order wins.
    pub duplicates: Vec<String>,
}

impl CommentThread {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.nodes.values().map(PathBuf::as_path)
    }
}

/// Every `comment.*.<ext>` file directly inside `dir`.
fn comment_entries(dir: &Path, ext: &str) -> io::Result<Vec<(String, PathBuf)>> {
    let suffix = format!(".{ext}");
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut out = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if name.starts_with(FILE_PREFIX) && name.ends_with(&suffix) {
            out.push((name, entry.path()));
        }
    }
    out.sort();
    Ok(out)
}

/// Find the comment thread in `dir`.
pub fn discover(dir: &Path, ext: &str) -> io::Result<CommentThread> {
    let suffix = format!(".{ext}");
    let mut thread = CommentThread::default();

    for (name, file) in comment_entries(dir, ext)? {
        let middle = name
            .strip_prefix(FILE_PREFIX)
            .and_then(|rest| rest.strip_suffix(&suffix))
            .unwrap_or_default();
        match middle.parse::<CommentPath>() {
            Ok(path) => match thread.nodes.entry(path) {
                Entry::Vacant(slot) => {
                    slot.insert(file);
                }
                Entry::Occupied(_) => thread.duplicates.push(name),
            },
            Err(_) => thread.invalid.push(name),
        }
    }
    Ok(thread)
}

// ============================================================================
// Assembly
// ============================================================================

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("reading comment `{0}`")]
    Read(PathBuf, #[source] io::Error),

    #[error("rendering comment {path}")]
    Render {
        path: CommentPath,
        #[source]
        source: RenderError,
    },
}

/// The folded thread of one item.
#[derive(Debug, Default)]
pub struct Folded {
    pub html: String,
    /// Discovered comments the fold never reached.
    pub dropped: Vec<CommentPath>,
}

/// Render every comment of `thread` and fold them into one fragment.
///
/// Any single render failure fails the whole thread.
pub fn assemble(thread: &CommentThread, renderer: &dyn Renderer) -> Result<Folded, CommentError> {
    let mut rendered = BTreeMap::new();
    for (path, file) in &thread.nodes {
        let text = fs::read_to_string(file).map_err(|err| CommentError::Read(file.clone(), err))?;
        let html = renderer
            .render(&text, &RenderContext::Comment { path: path.clone() })
            .map_err(|source| CommentError::Render {
                path: path.clone(),
                source,
            })?;
        rendered.insert(path.clone(), html);
    }
    Ok(fold(&rendered))
}

/// Fold already-rendered fragments, pre-order, stopping each sibling scan
/// at the first gap.
pub fn fold(rendered: &BTreeMap<CommentPath, String>) -> Folded {
    let mut html = String::new();
    let mut reached = BTreeSet::new();
    fold_children(&CommentPath::root(), rendered, &mut html, &mut reached);

    let dropped = rendered
        .keys()
        .filter(|path| !reached.contains(*path))
        .cloned()
        .collect();
    Folded { html, dropped }
}

fn fold_children<'a>(
    parent: &CommentPath,
    rendered: &'a BTreeMap<CommentPath, String>,
    out: &mut String,
    reached: &mut BTreeSet<&'a CommentPath>,
) {
    for index in 1.. {
        let path = parent.child(index);
        let Some((key, fragment)) = rendered.get_key_value(&path) else {
            break;
        };
        reached.insert(key);

        out.push_str(&format!(
            "<div class=\"comment\" id=\"{}\" data-reply-to=\"{path}\">\n",
            path.anchor()
        ));
        out.push_str(fragment.trim_end());
        out.push('\n');
        out.push_str(&format!(
            "<a class=\"comment-reply\" href=\"?reply-to={path}#comment-form\">Reply</a>\n"
        ));
        fold_children(&path, rendered, out, reached);
        out.push_str("</div>\n");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn p(s: &str) -> CommentPath {
        s.parse().unwrap()
    }

    fn rendered(paths: &[&str]) -> BTreeMap<CommentPath, String> {
        paths.iter().map(|s| (p(s), format!("<p>c{s}</p>"))).collect()
    }

    struct Echo;

    impl Renderer for Echo {
        fn render(&self, source: &str, ctx: &RenderContext) -> Result<String, RenderError> {
            match ctx {
                RenderContext::Comment { path } => Ok(format!("<p>{path}:{}</p>", source.trim())),
                RenderContext::Item(_) => Ok(source.to_owned()),
            }
        }
    }

    struct FailOn(&'static str);

    impl Renderer for FailOn {
        fn render(&self, source: &str, ctx: &RenderContext) -> Result<String, RenderError> {
            match ctx {
                RenderContext::Comment { path } if path.to_string() == self.0 => {
                    Err(RenderError::Failed("boom".into()))
                }
                _ => Ok(source.to_owned()),
            }
        }
    }

    #[test]
    fn test_comment_path_parse_and_display() {
        assert_eq!(p("1.2.3").to_string(), "1.2.3");
        assert_eq!(p("1.2").anchor(), "comment-1-2");
        assert_eq!(p("1").child(2), p("1.2"));

        for bad in ["", "0", "1..2", "a", "1.0", "-1", "1."] {
            assert!(bad.parse::<CommentPath>().is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_fold_nesting() {
        let folded = fold(&rendered(&["1", "1.1", "2"]));
        assert!(folded.dropped.is_empty());

        let html = &folded.html;
        let open_1 = html.find("id=\"comment-1\"").unwrap();
        let open_11 = html.find("id=\"comment-1-1\"").unwrap();
        let open_2 = html.find("id=\"comment-2\"").unwrap();
        assert!(open_1 < open_11 && open_11 < open_2);

        // 1.1 closes, then 1 closes, before 2 opens
        let between = &html[open_11..open_2];
        assert_eq!(between.matches("</div>").count(), 2);
        // 2 is top-level: everything before it is balanced
        let before_2 = &html[..open_2];
        assert_eq!(
            before_2.matches("<div").count(),
            before_2.matches("</div>").count() + 1
        );
    }

    #[test]
    fn test_fold_gap_drops_later_siblings() {
        let folded = fold(&rendered(&["1", "1.1", "1.3"]));
        assert!(folded.html.contains("c1.1"));
        assert!(!folded.html.contains("c1.3"));
        assert_eq!(folded.dropped, vec![p("1.3")]);
    }

    #[test]
    fn test_fold_orphan_reply_dropped() {
        let folded = fold(&rendered(&["2", "2.1"]));
        assert!(folded.html.is_empty());
        assert_eq!(folded.dropped, vec![p("2"), p("2.1")]);
    }

    #[test]
    fn test_fold_empty() {
        let folded = fold(&BTreeMap::new());
        assert!(folded.html.is_empty());
        assert!(folded.dropped.is_empty());
    }

    #[test]
    fn test_fold_numeric_sibling_order() {
        let names: Vec<String> = (1..=10).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let folded = fold(&rendered(&refs));
        let c2 = folded.html.find("<p>c2</p>").unwrap();
        let c10 = folded.html.find("<p>c10</p>").unwrap();
        assert!(c2 < c10);
    }

    #[test]
    fn test_reply_annotation() {
        let folded = fold(&rendered(&["1", "1.1"]));
        assert!(folded.html.contains("data-reply-to=\"1.1\""));
        assert!(folded.html.contains("href=\"?reply-to=1.1#comment-form\""));
    }

    #[test]
    fn test_discover_and_assemble() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.md"), "post").unwrap();
        fs::write(dir.path().join("comment.1.mdc"), "first").unwrap();
        fs::write(dir.path().join("comment.1.1.mdc"), "reply").unwrap();
        fs::write(dir.path().join("comment.x.mdc"), "bad").unwrap();
        fs::write(dir.path().join("comment.2.txt"), "ignored").unwrap();

        let thread = discover(dir.path(), "mdc").unwrap();
        assert_eq!(thread.len(), 2);
        assert_eq!(thread.invalid, vec!["comment.x.mdc".to_string()]);

        let folded = assemble(&thread, &Echo).unwrap();
        assert!(folded.html.contains("<p>1:first</p>"));
        assert!(folded.html.contains("<p>1.1:reply</p>"));
    }

    #[test]
    fn test_discover_reports_duplicate_paths() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("comment.01.mdc"), "padded").unwrap();
        fs::write(dir.path().join("comment.1.mdc"), "plain").unwrap();

        let thread = discover(dir.path(), "mdc").unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread.duplicates, vec!["comment.1.mdc".to_string()]);
        assert!(thread.files().all(|f| f.ends_with("comment.01.mdc")));
    }

    #[test]
    fn test_discover_missing_dir() {
        let dir = TempDir::new().unwrap();
        let thread = discover(&dir.path().join("nope"), "mdc").unwrap();
        assert!(thread.is_empty());
    }

    #[test]
    fn test_assemble_render_failure_fails_thread() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("comment.1.mdc"), "ok").unwrap();
        fs::write(dir.path().join("comment.2.mdc"), "bad").unwrap();

        let thread = discover(dir.path(), "mdc").unwrap();
        let err = assemble(&thread, &FailOn("2")).unwrap_err();
        assert!(matches!(err, CommentError::Render { ref path, .. } if *path == p("2")));
    }
}
