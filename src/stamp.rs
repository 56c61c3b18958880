//! Link stamps.
//!
//! A page embeds facts about *other* items: its chronological neighbors and
//! the slugs of its labels. Those facts are not part of the page's own
//! inputs, so each item gets a stamp recording them:
//!
//! ```text
//! <source>/.quire/links/2021/02/01/beta/index.md.yml
//!
//! previous:
//!   path: 2021/01/01/alpha/index.md
//!   title: Alpha
//! tags:
//!   x: x
//! ```
//!
//! Stamps go through the change-aware writer, so a stamp's mtime only moves
//! when the facts change and the staleness detector sees exactly that.
//! A stamp whose source is gone marks an output to delete.

use crate::{
    index::SiteIndex,
    log,
    paths::{DestPath, SourcePath},
    scan::Item,
    utils::fs::{collect_all_files, remove_file_and_empty_parents},
    writer::write_if_changed,
};
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    path::{Path, PathBuf},
};

/// Hidden state directory under the source root; scans never enter it.
pub const STATE_DIR: &str = ".quire";
const LINKS_DIR: &str = "links";
const STAMP_EXT: &str = "yml";

#[derive(Debug, Serialize, PartialEq, Eq)]
struct Neighbor<'a> {
    path: &'a str,
    title: &'a str,
}

impl<'a> Neighbor<'a> {
    fn of(item: &'a Item) -> Self {
        Self {
            path: item.path.as_str(),
            title: &item.title,
        }
    }
}

/// What an item's page knows about the rest of the site.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct LinkStamp<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    previous: Option<Neighbor<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next: Option<Neighbor<'a>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    tags: BTreeMap<&'a str, &'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    categories: BTreeMap<&'a str, &'a str>,
}

impl<'a> LinkStamp<'a> {
    /// Neighbors apply to posts only; labels map to their assigned slugs.
    pub fn of(
        item: &'a Item,
        index: &'a SiteIndex,
        tag_slugs: &'a BTreeMap<&str, String>,
        category_slugs: &'a BTreeMap<&str, String>,
    ) -> Self {
        let is_post = item.is_post();
        Self {
            previous: is_post
                .then(|| index.previous(&item.path).map(Neighbor::of))
                .flatten(),
            next: is_post.then(|| index.next(&item.path).map(Neighbor::of)).flatten(),
            tags: slugs_of(&item.tags, tag_slugs),
            categories: slugs_of(&item.categories, category_slugs),
        }
    }

    pub fn to_text(&self) -> Result<String> {
        serde_yaml::to_string(self).context("serializing link stamp")
    }
}

fn slugs_of<'a>(
    labels: &'a BTreeSet<String>,
    slugs: &'a BTreeMap<&str, String>,
) -> BTreeMap<&'a str, &'a str> {
    labels
        .iter()
        .filter_map(|label| Some((label.as_str(), slugs.get(label.as_str())?.as_str())))
        .collect()
}

/// Stamp files for one source root.
pub struct StampStore<'a> {
    source_root: &'a Path,
    dir: PathBuf,
}

impl<'a> StampStore<'a> {
    pub fn new(source_root: &'a Path) -> Self {
        Self {
            source_root,
            dir: source_root.join(STATE_DIR).join(LINKS_DIR),
        }
    }

    /// Stamp location of `path`.
    pub fn file_of(&self, path: &SourcePath) -> PathBuf {
        SourcePath::new(&format!("{path}.{STAMP_EXT}")).to_fs(&self.dir)
    }

    /// Write every stamp produced by `stamp`; returns how many changed.
    pub fn write_all<F>(&self, items: &[&Item], stamp: F) -> Result<usize>
    where
        F: Fn(&Item) -> Result<String> + Sync,
    {
        items
            .par_iter()
            .map(|item| -> Result<usize> {
                let text = stamp(item)?;
                let outcome = write_if_changed(&self.file_of(&item.path), text.as_bytes())?;
                if outcome.changed() {
                    log!(level = 3; "stamp"; "{}", item.path);
                }
                Ok(usize::from(outcome.changed()))
            })
            .try_reduce(|| 0, |a, b| Ok(a + b))
    }

    /// Delete stamps whose source is not in `live`, together with the
    /// outputs they vouched for. Returns the number of outputs removed.
    ///
    /// `extra` lists further output files owned by each page, such as its
    /// equation assets.
    pub fn prune<F>(
        &self,
        live: &HashSet<&SourcePath>,
        output_root: &Path,
        output_ext: &str,
        extra: F,
    ) -> Result<usize>
    where
        F: Fn(&DestPath) -> Vec<DestPath>,
    {
        let suffix = format!(".{STAMP_EXT}");
        let mut removed = 0;

        for file in collect_all_files(&self.dir) {
            let Some(stamp) = SourcePath::from_fs(&self.dir, &file) else {
                continue;
            };
            let Some(source) = stamp.as_str().strip_suffix(&suffix).map(SourcePath::new) else {
                continue;
            };
            if live.contains(&source) || source.to_fs(self.source_root).exists() {
                continue;
            }

            let output = source.to_dest(output_ext);
            let output_file = output.to_fs(output_root);
            if output_file.exists() {
                log!(level = 2; "prune"; "{output} (source `{source}` is gone)");
                removed += 1;
            }
            for owned in extra(&output).iter().chain([&output]) {
                remove_file_and_empty_parents(&owned.to_fs(output_root), output_root)
                    .with_context(|| format!("removing output `{owned}`"))?;
            }
            remove_file_and_empty_parents(&file, &self.dir)
                .with_context(|| format!("removing stamp `{}`", file.display()))?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::ItemKind;
    use crate::utils::slug::assign_slugs;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    fn post(path: &str, title: &str, day: u32, tags: &[&str]) -> Item {
        Item {
            path: SourcePath::new(path),
            kind: ItemKind::Post,
            title: title.into(),
            date: NaiveDate::from_ymd_opt(2021, 1, day),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            categories: BTreeSet::new(),
            body: String::new(),
        }
    }

    fn stamp_text(items: Vec<Item>, path: &str) -> String {
        let index = SiteIndex::build(items);
        let tags = assign_slugs(index.tags.labels());
        let categories = BTreeMap::new();
        let item = index.get(&SourcePath::new(path)).unwrap();
        LinkStamp::of(item, &index, &tags, &categories).to_text().unwrap()
    }

    #[test]
    fn test_stamp_follows_chronology() {
        let a = post("2021/01/01/a/index.md", "A", 1, &[]);
        let b = post("2021/01/02/b/index.md", "B", 2, &[]);
        let c = post("2021/01/03/c/index.md", "C", 3, &[]);

        let before = stamp_text(vec![a.clone(), b.clone(), c.clone()], "2021/01/02/b/index.md");
        assert!(before.contains("title: A"));
        assert!(before.contains("title: C"));

        // C moves before A: B becomes the newest post
        let moved = Item {
            date: NaiveDate::from_ymd_opt(2020, 12, 1),
            ..c
        };
        let after = stamp_text(vec![a, b, moved], "2021/01/02/b/index.md");
        assert!(!after.contains("next:"));
        assert_ne!(before, after);
    }

    #[test]
    fn test_stamp_records_label_slugs() {
        let old = post("2021/01/01/a/index.md", "A", 1, &["C++"]);
        let before = stamp_text(vec![old.clone()], "2021/01/01/a/index.md");
        assert!(before.ends_with(": c\n"));

        let newer = post("2021/01/02/b/index.md", "B", 2, &["C"]);
        let after = stamp_text(vec![old, newer], "2021/01/01/a/index.md");
        assert_ne!(before, after);
    }

    #[test]
    fn test_pages_have_no_neighbors() {
        let page = Item {
            kind: ItemKind::Page,
            date: None,
            ..post("about.md", "About", 1, &[])
        };
        let a = post("2021/01/01/a/index.md", "A", 1, &[]);
        assert_eq!(stamp_text(vec![page, a], "about.md"), "{}\n");
    }

    #[test]
    fn test_prune_removes_outputs_of_missing_sources() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("public");
        let store = StampStore::new(&src);

        let kept = post("2021/01/01/a/index.md", "A", 1, &[]);
        let gone = post("2021/01/02/b/index.md", "B", 2, &[]);
        fs::create_dir_all(kept.path.to_fs(&src).parent().unwrap()).unwrap();
        fs::write(kept.path.to_fs(&src), "a").unwrap();
        store
            .write_all(&[&kept, &gone], |_| Ok("{}\n".to_owned()))
            .unwrap();
        for item in [&kept, &gone] {
            let output = item.path.to_dest("html").to_fs(&out);
            fs::create_dir_all(output.parent().unwrap()).unwrap();
            fs::write(output, "o").unwrap();
        }
        let asset = out.join("2021/01/02/b/index-eq1.svg");
        fs::write(&asset, "eq").unwrap();

        let live: HashSet<&SourcePath> = [&kept.path].into_iter().collect();
        let removed = store
            .prune(&live, &out, "html", |page| vec![page.sibling("index-eq1.svg")])
            .unwrap();

        assert_eq!(removed, 1);
        assert!(out.join("2021/01/01/a/index.html").exists());
        assert!(!out.join("2021/01/02/b").exists());
        assert!(!store.file_of(&gone.path).exists());
        assert!(store.file_of(&kept.path).exists());
    }
}
