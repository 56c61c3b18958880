//! Metadata scanner.
//!
//! Enumerates source documents, reads their front-matter and produces one
//! [`Item`] per document. Scanning never writes anything; every problem it
//! finds is a warning recorded in [`Diagnostics`].
//!
//! # Item kinds
//!
//! | Path shape                                | Kind        |
//! |-------------------------------------------|-------------|
//! | `yyyy/mm/dd/<slug>/index.<document-ext>`  | `Post`      |
//! | any other `*.<document-ext>`              | `Page`      |
//! | any `*.<generated-ext>`                   | `Generated` |

pub mod frontmatter;

use crate::{
    config::SiteConfig,
    diagnostics::Diagnostics,
    log,
    paths::SourcePath,
    utils::{date, fs::collect_all_files},
};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rayon::prelude::*;
use regex::Regex;
use std::{collections::BTreeSet, fs, path::Path};

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// Dated, chronologically navigable.
    Post,
    /// Undated, no navigation.
    Page,
    /// Listing stub written by the materializer.
    Generated,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Page => "page",
            Self::Generated => "generated",
        }
    }
}

/// A scanned source document.
#[derive(Debug, Clone)]
pub struct Item {
    pub path: SourcePath,
    pub kind: ItemKind,
    pub title: String,
    /// Always `Some` for posts.
    pub date: Option<NaiveDate>,
    pub tags: BTreeSet<String>,
    pub categories: BTreeSet<String>,
    /// Document text after the front-matter block.
    pub body: String,
}

impl Item {
    pub fn is_post(&self) -> bool {
        self.kind == ItemKind::Post
    }
}

// ============================================================================
// Scanner
// ============================================================================

pub struct Scanner<'a> {
    config: &'a SiteConfig,
    diag: &'a Diagnostics,
    post_pattern: Regex,
}

impl<'a> Scanner<'a> {
    pub fn new(config: &'a SiteConfig, diag: &'a Diagnostics) -> Result<Self> {
        let pattern = format!(
            r"^[0-9]{{4}}/[0-9]{{2}}/[0-9]{{2}}/[^/]+/index\.{}$",
            regex::escape(&config.build.extensions.document)
        );
        let post_pattern = Regex::new(&pattern).context("invalid document extension")?;
        Ok(Self {
            config,
            diag,
            post_pattern,
        })
    }

    /// Scan every authored document (posts and pages).
    pub fn scan_authored(&self) -> Result<Vec<Item>> {
        self.scan_with_extension(&self.config.build.extensions.document)
    }

    /// Scan every generated stub.
    pub fn scan_generated(&self) -> Result<Vec<Item>> {
        self.scan_with_extension(&self.config.build.extensions.generated)
    }

    fn scan_with_extension(&self, ext: &str) -> Result<Vec<Item>> {
        let root = &self.config.build.source;
        let files: Vec<SourcePath> = collect_all_files(root)
            .iter()
            .filter_map(|file| SourcePath::from_fs(root, file))
            .filter(|path| path.extension() == Some(ext))
            .collect();

        log!(level = 2; "scan"; "{} `.{}` files", files.len(), ext);

        // `collect_all_files` is sorted and rayon preserves order on collect.
        files
            .par_iter()
            .map(|path| self.scan_file(root, path))
            .collect()
    }

    fn scan_file(&self, root: &Path, path: &SourcePath) -> Result<Item> {
        let file = path.to_fs(root);
        let bytes = fs::read(&file).with_context(|| format!("reading `{}`", file.display()))?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(self.parse_item(path.clone(), &text))
    }

    /// Classify a path by its extension and shape.
    pub fn classify(&self, path: &SourcePath) -> Option<ItemKind> {
        let ext = path.extension()?;
        let exts = &self.config.build.extensions;
        if ext == exts.generated {
            Some(ItemKind::Generated)
        } else if ext == exts.document {
            if self.post_pattern.is_match(path.as_str()) {
                Some(ItemKind::Post)
            } else {
                Some(ItemKind::Page)
            }
        } else {
            None
        }
    }

    /// Build an item from document text, raising warnings as needed.
    pub fn parse_item(&self, path: SourcePath, text: &str) -> Item {
        let kind = self.classify(&path).unwrap_or(ItemKind::Page);

        let (meta, body) = match frontmatter::parse(text) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.diag.warn(&path, &err);
                let body = frontmatter::split(text)
                    .map(|(_, body)| body)
                    .unwrap_or(text);
                (frontmatter::FrontMatter::default(), body)
            }
        };
        for issue in &meta.issues {
            self.diag.warn(&path, issue);
        }

        let title = match meta.title {
            Some(title) => title,
            None => {
                let fallback = fallback_title(&path);
                self.diag
                    .warn(&path, format!("no title, using `{fallback}`"));
                fallback
            }
        };

        let parsed_date = match &meta.date {
            Some(text) => {
                let parsed = date::parse_date(text);
                if parsed.is_none() && kind != ItemKind::Post {
                    self.diag.warn(&path, format!("unrecognized date `{text}`"));
                }
                parsed
            }
            None => None,
        };

        let date = match (kind, parsed_date) {
            (ItemKind::Post, None) => {
                let today = date::today();
                let reason = match &meta.date {
                    Some(text) => format!("unrecognized date `{text}`"),
                    None => "no date".to_owned(),
                };
                self.diag
                    .warn(&path, format!("{reason}, using today ({today})"));
                Some(today)
            }
            (_, parsed) => parsed,
        };

        if kind == ItemKind::Post {
            if meta.categories.is_empty() {
                self.diag.warn(&path, "no categories");
            }
            if meta.keywords.is_empty() {
                self.diag.warn(&path, "no keywords");
            }
        }

        Item {
            kind,
            title,
            date,
            tags: meta.keywords.into_iter().collect(),
            categories: meta.categories.into_iter().collect(),
            body: body.to_owned(),
            path,
        }
    }
}

/// Title derived from the path: the folder name for `index.*`, else the stem.
fn fallback_title(path: &SourcePath) -> String {
    let stem = path.file_stem();
    if stem == "index" {
        let dir = path.dir();
        let folder = dir.rsplit('/').next().unwrap_or(dir);
        if !folder.is_empty() {
            return folder.to_owned();
        }
    }
    stem.to_owned()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scanner_config(root: &Path) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.build.source = root.to_path_buf();
        config
    }

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn test_classify() {
        let config = SiteConfig::default();
        let diag = Diagnostics::default();
        let scanner = Scanner::new(&config, &diag).unwrap();

        let kind = |p: &str| scanner.classify(&SourcePath::new(p));
        assert_eq!(kind("2021/01/01/alpha/index.md"), Some(ItemKind::Post));
        assert_eq!(kind("2021/01/01/index.md"), Some(ItemKind::Page));
        assert_eq!(kind("2021/01/01/alpha/notes.md"), Some(ItemKind::Page));
        assert_eq!(kind("about.md"), Some(ItemKind::Page));
        assert_eq!(kind("tag/x/index.mdg"), Some(ItemKind::Generated));
        assert_eq!(kind("2021/01/01/alpha/comment.1.mdc"), None);
        assert_eq!(kind("2021/01/01/alpha/photo.png"), None);
    }

    #[test]
    fn test_parse_post_item() {
        let config = SiteConfig::default();
        let diag = Diagnostics::default();
        let scanner = Scanner::new(&config, &diag).unwrap();

        let item = scanner.parse_item(
            SourcePath::new("2021/01/01/alpha/index.md"),
            "---\ntitle: Alpha\ndate: 2021-01-01\nkeywords: [x]\ncategories: [notes]\n---\nHello\n",
        );
        assert_eq!(item.kind, ItemKind::Post);
        assert_eq!(item.title, "Alpha");
        assert_eq!(item.date, NaiveDate::from_ymd_opt(2021, 1, 1));
        assert!(item.tags.contains("x"));
        assert!(item.categories.contains("notes"));
        assert_eq!(item.body, "Hello\n");
        assert_eq!(diag.count(), 0);
    }

    #[test]
    fn test_post_without_date_defaults_to_today() {
        let config = SiteConfig::default();
        let diag = Diagnostics::default();
        let scanner = Scanner::new(&config, &diag).unwrap();

        let item = scanner.parse_item(
            SourcePath::new("2021/01/01/alpha/index.md"),
            "---\ntitle: Alpha\ndate: someday\nkeywords: [x]\ncategories: [c]\n---\n",
        );
        assert_eq!(item.date, Some(date::today()));
        let messages = diag.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("unrecognized date `someday`"));
    }

    #[test]
    fn test_missing_front_matter_warns() {
        let config = SiteConfig::default();
        let diag = Diagnostics::default();
        let scanner = Scanner::new(&config, &diag).unwrap();

        let item = scanner.parse_item(SourcePath::new("notes/todo.md"), "# Todo\n");
        assert_eq!(item.kind, ItemKind::Page);
        assert_eq!(item.title, "todo");
        assert_eq!(item.date, None);
        assert!(item.tags.is_empty());
        assert_eq!(item.body, "# Todo\n");
        // missing block + missing title
        assert_eq!(diag.count(), 2);
    }

    #[test]
    fn test_post_missing_labels_warns() {
        let config = SiteConfig::default();
        let diag = Diagnostics::default();
        let scanner = Scanner::new(&config, &diag).unwrap();

        let item = scanner.parse_item(
            SourcePath::new("2021/03/04/gamma/index.md"),
            "---\ndate: 2021-03-04\n---\n",
        );
        assert_eq!(item.title, "gamma");
        let messages = diag.messages();
        assert!(messages.iter().any(|m| m.contains("no categories")));
        assert!(messages.iter().any(|m| m.contains("no keywords")));
    }

    #[test]
    fn test_scan_authored_and_generated() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "2021/02/01/beta/index.md", "---\ntitle: Beta\ndate: 2021-02-01\nkeywords: [x]\ncategories: [c]\n---\n");
        write(root, "2021/01/01/alpha/index.md", "---\ntitle: Alpha\ndate: 2021-01-01\nkeywords: [x]\ncategories: [c]\n---\n");
        write(root, "2021/01/01/alpha/comment.1.mdc", "Nice!");
        write(root, "about.md", "---\ntitle: About\n---\n");
        write(root, "tag/x/index.mdg", "---\ntitle: 'Tag: x'\n---\n");

        let config = scanner_config(root);
        let diag = Diagnostics::default();
        let scanner = Scanner::new(&config, &diag).unwrap();

        let authored = scanner.scan_authored().unwrap();
        let paths: Vec<&str> = authored.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["2021/01/01/alpha/index.md", "2021/02/01/beta/index.md", "about.md"]
        );

        let generated = scanner.scan_generated().unwrap();
        assert_eq!(generated.len(), 1);
        assert_eq!(generated[0].kind, ItemKind::Generated);
        assert_eq!(generated[0].title, "Tag: x");
        assert_eq!(diag.count(), 0);
    }

    #[test]
    fn test_fallback_title() {
        assert_eq!(fallback_title(&SourcePath::new("2021/01/01/alpha/index.md")), "alpha");
        assert_eq!(fallback_title(&SourcePath::new("pages/about.md")), "about");
        assert_eq!(fallback_title(&SourcePath::new("index.md")), "index");
    }
}
