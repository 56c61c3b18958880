//! Site-wide indices built once per run from the scanned items.
//!
//! [`SiteIndex`] is constructed after the scan and never mutated afterwards;
//! every later phase borrows it. It holds:
//!
//! - the chronological sequence of posts (`next`/`previous`/`recent`)
//! - reverse indices for tags and categories
//! - the month grouping used by archives
//!
//! Only posts contribute to any index. Member lists are sorted by source
//! path, which embeds the date, so listings come out chronologically.

use crate::{
    paths::SourcePath,
    scan::Item,
    utils::date::YearMonth,
};
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// Reverse Index
// ============================================================================

/// Label → posts carrying that label.
#[derive(Debug, Default)]
pub struct ReverseIndex {
    groups: BTreeMap<String, Vec<SourcePath>>,
}

impl ReverseIndex {
    fn insert(&mut self, label: &str, path: &SourcePath) {
        self.groups
            .entry(label.to_owned())
            .or_default()
            .push(path.clone());
    }

    /// Impose the dump order: members sorted by path.
    fn finish(&mut self) {
        for members in self.groups.values_mut() {
            members.sort();
            members.dedup();
        }
    }

    #[cfg(test)]
    pub fn members(&self, label: &str) -> Option<&[SourcePath]> {
        self.groups.get(label).map(Vec::as_slice)
    }

    /// Groups in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[SourcePath])> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }
}

// ============================================================================
// Site Index
// ============================================================================

#[derive(Debug, Default)]
pub struct SiteIndex {
    items: Vec<Item>,
    by_path: HashMap<SourcePath, usize>,
    /// Indices into `items`, posts only, ordered by (date, title, path).
    chronology: Vec<usize>,
    /// Source path → position in `chronology`.
    position: HashMap<SourcePath, usize>,
    pub tags: ReverseIndex,
    pub categories: ReverseIndex,
    pub months: BTreeMap<YearMonth, Vec<SourcePath>>,
}

impl SiteIndex {
    pub fn build(items: Vec<Item>) -> Self {
        let by_path = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.path.clone(), i))
            .collect();

        let mut chronology: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_post())
            .map(|(i, _)| i)
            .collect();
        chronology.sort_by(|&a, &b| {
            let (a, b) = (&items[a], &items[b]);
            (a.date, &a.title, &a.path).cmp(&(b.date, &b.title, &b.path))
        });

        let position = chronology
            .iter()
            .enumerate()
            .map(|(pos, &i)| (items[i].path.clone(), pos))
            .collect();

        let mut tags = ReverseIndex::default();
        let mut categories = ReverseIndex::default();
        let mut months: BTreeMap<YearMonth, Vec<SourcePath>> = BTreeMap::new();

        for item in items.iter().filter(|item| item.is_post()) {
            for tag in &item.tags {
                tags.insert(tag, &item.path);
            }
            for category in &item.categories {
                categories.insert(category, &item.path);
            }
            if let Some(date) = item.date {
                months
                    .entry(YearMonth::of(date))
                    .or_default()
                    .push(item.path.clone());
            }
        }

        tags.finish();
        categories.finish();
        for members in months.values_mut() {
            members.sort();
        }

        Self {
            items,
            by_path,
            chronology,
            position,
            tags,
            categories,
            months,
        }
    }

    /// All indexed items, sorted by path.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, path: &SourcePath) -> Option<&Item> {
        self.by_path.get(path).map(|&i| &self.items[i])
    }

    /// Posts in chronological order.
    pub fn chronology(&self) -> impl DoubleEndedIterator<Item = &Item> {
        self.chronology.iter().map(|&i| &self.items[i])
    }

    pub fn post_count(&self) -> usize {
        self.chronology.len()
    }

    /// The post after `path`, if `path` is a post and not the newest one.
    pub fn next(&self, path: &SourcePath) -> Option<&Item> {
        let pos = *self.position.get(path)?;
        self.chronology.get(pos + 1).map(|&i| &self.items[i])
    }

    /// The post before `path`, if `path` is a post and not the oldest one.
    pub fn previous(&self, path: &SourcePath) -> Option<&Item> {
        let pos = *self.position.get(path)?;
        let prev = pos.checked_sub(1)?;
        self.chronology.get(prev).map(|&i| &self.items[i])
    }

    /// The `n` newest posts, newest first.
    pub fn recent(&self, n: usize) -> Vec<&Item> {
        self.chronology().rev().take(n).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::ItemKind;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn post(path: &str, title: &str, date: (i32, u32, u32), tags: &[&str]) -> Item {
        Item {
            path: SourcePath::new(path),
            kind: ItemKind::Post,
            title: title.into(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            categories: BTreeSet::from(["notes".to_string()]),
            body: String::new(),
        }
    }

    fn page(path: &str, tags: &[&str]) -> Item {
        Item {
            path: SourcePath::new(path),
            kind: ItemKind::Page,
            title: "Page".into(),
            date: None,
            tags: tags.iter().map(|s| s.to_string()).collect(),
            categories: BTreeSet::new(),
            body: String::new(),
        }
    }

    fn titles<'a>(items: impl Iterator<Item = &'a Item>) -> Vec<&'a str> {
        items.map(|i| i.title.as_str()).collect()
    }

    #[test]
    fn test_chronology_independent_of_input_order() {
        let a = post("2021/01/01/a/index.md", "A", (2021, 1, 1), &[]);
        let b = post("2021/02/01/b/index.md", "B", (2021, 2, 1), &[]);
        let c = post("2021/03/01/c/index.md", "C", (2021, 3, 1), &[]);

        for order in [
            vec![c.clone(), a.clone(), b.clone()],
            vec![b.clone(), c.clone(), a.clone()],
            vec![a.clone(), b.clone(), c.clone()],
        ] {
            let index = SiteIndex::build(order);
            assert_eq!(titles(index.chronology()), vec!["A", "B", "C"]);
        }
    }

    #[test]
    fn test_same_date_ordered_by_title() {
        let index = SiteIndex::build(vec![
            post("2021/01/01/zeta/index.md", "Zeta", (2021, 1, 1), &[]),
            post("2021/01/01/alpha/index.md", "Alpha", (2021, 1, 1), &[]),
        ]);
        assert_eq!(titles(index.chronology()), vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn test_next_previous_boundaries() {
        let index = SiteIndex::build(vec![
            post("2021/01/01/a/index.md", "A", (2021, 1, 1), &[]),
            post("2021/02/01/b/index.md", "B", (2021, 2, 1), &[]),
            post("2021/03/01/c/index.md", "C", (2021, 3, 1), &[]),
            page("about.md", &[]),
        ]);
        let a = SourcePath::new("2021/01/01/a/index.md");
        let b = SourcePath::new("2021/02/01/b/index.md");
        let c = SourcePath::new("2021/03/01/c/index.md");

        assert!(index.previous(&a).is_none());
        assert_eq!(index.next(&a).map(|i| i.title.as_str()), Some("B"));
        assert_eq!(index.previous(&b).map(|i| i.title.as_str()), Some("A"));
        assert_eq!(index.next(&b).map(|i| i.title.as_str()), Some("C"));
        assert!(index.next(&c).is_none());

        let about = SourcePath::new("about.md");
        assert!(index.next(&about).is_none());
        assert!(index.previous(&about).is_none());
    }

    #[test]
    fn test_reverse_index_membership() {
        let index = SiteIndex::build(vec![
            post("2021/02/01/beta/index.md", "Beta", (2021, 2, 1), &["x", "y"]),
            post("2021/01/01/alpha/index.md", "Alpha", (2021, 1, 1), &["x"]),
            page("about.md", &["x"]),
        ]);

        let x: Vec<&str> = index.tags.members("x").unwrap().iter().map(SourcePath::as_str).collect();
        assert_eq!(x, vec!["2021/01/01/alpha/index.md", "2021/02/01/beta/index.md"]);
        assert_eq!(index.tags.members("y").unwrap().len(), 1);
        assert!(index.tags.members("z").is_none());
        assert_eq!(index.tags.len(), 2);
        assert_eq!(index.categories.members("notes").unwrap().len(), 2);
    }

    #[test]
    fn test_removed_post_drops_label() {
        let with = SiteIndex::build(vec![
            post("2021/01/01/a/index.md", "A", (2021, 1, 1), &["solo"]),
            post("2021/02/01/b/index.md", "B", (2021, 2, 1), &["x"]),
        ]);
        assert!(with.tags.members("solo").is_some());

        let without = SiteIndex::build(vec![post("2021/02/01/b/index.md", "B", (2021, 2, 1), &["x"])]);
        assert!(without.tags.members("solo").is_none());
    }

    #[test]
    fn test_months_and_recent() {
        let index = SiteIndex::build(vec![
            post("2021/01/01/a/index.md", "A", (2021, 1, 1), &[]),
            post("2021/01/20/b/index.md", "B", (2021, 1, 20), &[]),
            post("2021/02/01/c/index.md", "C", (2021, 2, 1), &[]),
        ]);
        let months: Vec<String> = index.months.keys().map(ToString::to_string).collect();
        assert_eq!(months, vec!["January 2021", "February 2021"]);

        assert_eq!(titles(index.recent(2).into_iter()), vec!["C", "B"]);
        assert_eq!(index.recent(10).len(), 3);
    }
}
