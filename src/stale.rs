//! Staleness detection.
//!
//! An item's output must be regenerated when it is missing or not strictly
//! newer than anything it was built from:
//!
//! | Input                          | Applies to          |
//! |--------------------------------|---------------------|
//! | the item's source              | every item          |
//! | its comment fragments          | posts and pages     |
//! | templates and the config file  | every item          |
//! | previous/next post sources     | posts               |
//! | its link stamp                 | every item          |
//!
//! Comparisons use `output <= input`, so equal timestamps count as stale.

use crate::{
    comments::CommentThread,
    index::SiteIndex,
    paths::{DestPath, SourcePath},
    scan::{Item, ItemKind},
    stamp::StampStore,
    utils::fs::mtime,
};
use std::{fmt, path::Path, time::SystemTime};

/// Why an item needs rebuilding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    Forced,
    OutputMissing,
    SourceMissing,
    SourceNewer,
    CommentNewer,
    DependencyNewer,
    NeighborNewer,
    LinksChanged,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Forced => "forced",
            Self::OutputMissing => "output missing",
            Self::SourceMissing => "source unreadable",
            Self::SourceNewer => "source changed",
            Self::CommentNewer => "comment changed",
            Self::DependencyNewer => "template or config changed",
            Self::NeighborNewer => "neighbor changed",
            Self::LinksChanged => "navigation or label links changed",
        })
    }
}

/// Timestamps gathered for one item in one run.
#[derive(Debug, Clone, Default)]
pub struct BuildRecord {
    pub source_time: Option<SystemTime>,
    pub output_time: Option<SystemTime>,
    pub comment_times: Vec<SystemTime>,
    pub dependency_time: Option<SystemTime>,
    pub neighbor_times: Vec<SystemTime>,
    pub stamp_time: Option<SystemTime>,
}

impl BuildRecord {
    /// `None` when the output is fresh.
    pub fn check(&self, force: bool) -> Option<StaleReason> {
        if force {
            return Some(StaleReason::Forced);
        }
        let Some(output) = self.output_time else {
            return Some(StaleReason::OutputMissing);
        };
        let Some(source) = self.source_time else {
            return Some(StaleReason::SourceMissing);
        };

        if output <= source {
            return Some(StaleReason::SourceNewer);
        }
        if self.comment_times.iter().any(|&t| output <= t) {
            return Some(StaleReason::CommentNewer);
        }
        if self.dependency_time.is_some_and(|t| output <= t) {
            return Some(StaleReason::DependencyNewer);
        }
        if self.neighbor_times.iter().any(|&t| output <= t) {
            return Some(StaleReason::NeighborNewer);
        }
        if self.stamp_time.is_some_and(|t| output <= t) {
            return Some(StaleReason::LinksChanged);
        }
        None
    }
}

/// Gathers [`BuildRecord`]s against the source and output roots.
pub struct StalenessDetector<'a> {
    pub source_root: &'a Path,
    pub output_root: &'a Path,
    pub output_ext: &'a str,
    pub stamps: &'a StampStore<'a>,
    /// Newest modification among shared render dependencies.
    pub dependency_time: Option<SystemTime>,
    pub force: bool,
}

impl StalenessDetector<'_> {
    pub fn record(&self, item: &Item, comments: &CommentThread, index: &SiteIndex) -> BuildRecord {
        let source_mtime = |path: &SourcePath| mtime(&path.to_fs(self.source_root));

        let neighbor_times = if item.kind == ItemKind::Post {
            [index.previous(&item.path), index.next(&item.path)]
                .into_iter()
                .flatten()
                .filter_map(|n| source_mtime(&n.path))
                .collect()
        } else {
            Vec::new()
        };

        BuildRecord {
            source_time: source_mtime(&item.path),
            output_time: mtime(&self.output_of(&item.path).to_fs(self.output_root)),
            comment_times: comments.files().filter_map(mtime).collect(),
            dependency_time: self.dependency_time,
            neighbor_times,
            stamp_time: mtime(&self.stamps.file_of(&item.path)),
        }
    }

    pub fn output_of(&self, path: &SourcePath) -> DestPath {
        path.to_dest(self.output_ext)
    }

    pub fn check(&self, item: &Item, comments: &CommentThread, index: &SiteIndex) -> Option<StaleReason> {
        self.record(item, comments, index).check(self.force)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comments;
    use chrono::NaiveDate;
    use std::{
        collections::BTreeSet,
        fs::{self, File},
        time::Duration,
    };
    use tempfile::TempDir;

    fn at(base: SystemTime, secs: u64) -> SystemTime {
        base + Duration::from_secs(secs)
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options().write(true).open(path).unwrap().set_modified(time).unwrap();
    }

    fn post(path: &str, title: &str, day: u32) -> Item {
        Item {
            path: SourcePath::new(path),
            kind: ItemKind::Post,
            title: title.into(),
            date: NaiveDate::from_ymd_opt(2021, 1, day),
            tags: BTreeSet::new(),
            categories: BTreeSet::new(),
            body: String::new(),
        }
    }

    #[test]
    fn test_record_rules() {
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        let fresh = BuildRecord {
            source_time: Some(at(base, 10)),
            output_time: Some(at(base, 20)),
            comment_times: vec![at(base, 5), at(base, 15)],
            dependency_time: Some(at(base, 1)),
            neighbor_times: vec![at(base, 19)],
            stamp_time: Some(at(base, 2)),
        };
        assert_eq!(fresh.check(false), None);
        assert_eq!(fresh.check(true), Some(StaleReason::Forced));

        let missing = BuildRecord { output_time: None, ..fresh.clone() };
        assert_eq!(missing.check(false), Some(StaleReason::OutputMissing));

        // equality is stale
        let same = BuildRecord { source_time: Some(at(base, 20)), ..fresh.clone() };
        assert_eq!(same.check(false), Some(StaleReason::SourceNewer));

        let comment = BuildRecord { comment_times: vec![at(base, 21)], ..fresh.clone() };
        assert_eq!(comment.check(false), Some(StaleReason::CommentNewer));

        let dep = BuildRecord { dependency_time: Some(at(base, 30)), ..fresh.clone() };
        assert_eq!(dep.check(false), Some(StaleReason::DependencyNewer));

        let neighbor = BuildRecord { neighbor_times: vec![at(base, 20)], ..fresh.clone() };
        assert_eq!(neighbor.check(false), Some(StaleReason::NeighborNewer));

        let links = BuildRecord { stamp_time: Some(at(base, 25)), ..fresh };
        assert_eq!(links.check(false), Some(StaleReason::LinksChanged));
    }

    #[test]
    fn test_touching_comment_flips_staleness() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("public");
        let item_dir = src.join("2021/01/01/alpha");
        fs::create_dir_all(&item_dir).unwrap();
        fs::create_dir_all(out.join("2021/01/01/alpha")).unwrap();

        let source = item_dir.join("index.md");
        let comment = item_dir.join("comment.1.mdc");
        let output = out.join("2021/01/01/alpha/index.html");
        fs::write(&source, "x").unwrap();
        fs::write(&comment, "c").unwrap();
        fs::write(&output, "o").unwrap();

        let base = SystemTime::now() - Duration::from_secs(1000);
        set_mtime(&source, at(base, 0));
        set_mtime(&comment, at(base, 10));
        set_mtime(&output, at(base, 100));

        let item = post("2021/01/01/alpha/index.md", "Alpha", 1);
        let index = SiteIndex::build(vec![item.clone()]);
        let stamps = StampStore::new(&src);
        let detector = StalenessDetector {
            source_root: &src,
            output_root: &out,
            output_ext: "html",
            stamps: &stamps,
            dependency_time: None,
            force: false,
        };

        let thread = comments::discover(&item_dir, "mdc").unwrap();
        assert_eq!(detector.check(&item, &thread, &index), None);

        set_mtime(&comment, at(base, 200));
        assert_eq!(
            detector.check(&item, &thread, &index),
            Some(StaleReason::CommentNewer)
        );
    }

    #[test]
    fn test_neighbor_source_change() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("public");
        let base = SystemTime::now() - Duration::from_secs(1000);

        let a = post("2021/01/01/a/index.md", "A", 1);
        let b = post("2021/01/02/b/index.md", "B", 2);
        for item in [&a, &b] {
            let s = item.path.to_fs(&src);
            let o = item.path.to_dest("html").to_fs(&out);
            fs::create_dir_all(s.parent().unwrap()).unwrap();
            fs::create_dir_all(o.parent().unwrap()).unwrap();
            fs::write(&s, "x").unwrap();
            fs::write(&o, "x").unwrap();
            set_mtime(&s, at(base, 0));
            set_mtime(&o, at(base, 100));
        }

        let index = SiteIndex::build(vec![a.clone(), b.clone()]);
        let stamps = StampStore::new(&src);
        let detector = StalenessDetector {
            source_root: &src,
            output_root: &out,
            output_ext: "html",
            stamps: &stamps,
            dependency_time: None,
            force: false,
        };
        let none = CommentThread::default();
        assert_eq!(detector.check(&a, &none, &index), None);

        set_mtime(&b.path.to_fs(&src), at(base, 150));
        assert_eq!(detector.check(&a, &none, &index), Some(StaleReason::NeighborNewer));
        assert_eq!(detector.check(&b, &none, &index), Some(StaleReason::SourceNewer));
    }

    #[test]
    fn test_rewritten_stamp_flips_staleness() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("public");
        let base = SystemTime::now() - Duration::from_secs(1000);

        let a = post("2021/01/01/a/index.md", "A", 1);
        let s = a.path.to_fs(&src);
        let o = a.path.to_dest("html").to_fs(&out);
        fs::create_dir_all(s.parent().unwrap()).unwrap();
        fs::create_dir_all(o.parent().unwrap()).unwrap();
        fs::write(&s, "x").unwrap();
        fs::write(&o, "x").unwrap();
        set_mtime(&s, at(base, 0));
        set_mtime(&o, at(base, 100));

        let stamps = StampStore::new(&src);
        stamps.write_all(&[&a], |_| Ok("{}\n".to_owned())).unwrap();
        let stamp = stamps.file_of(&a.path);
        set_mtime(&stamp, at(base, 50));

        let index = SiteIndex::build(vec![a.clone()]);
        let detector = StalenessDetector {
            source_root: &src,
            output_root: &out,
            output_ext: "html",
            stamps: &stamps,
            dependency_time: None,
            force: false,
        };
        let none = CommentThread::default();
        assert_eq!(detector.check(&a, &none, &index), None);

        set_mtime(&stamp, at(base, 150));
        assert_eq!(detector.check(&a, &none, &index), Some(StaleReason::LinksChanged));
    }
}
