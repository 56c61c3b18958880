//! URL slugification for label directories.
//!
//! Tags and categories are free text; their listing stubs live under
//! `tag/<slug>/` and `category/<slug>/`, so labels must become safe,
//! stable path components.

use deunicode::deunicode;
use std::collections::{BTreeMap, HashSet};

/// Used when a label has no alphanumeric content at all (e.g. `"#"`).
const EMPTY_SLUG: &str = "label";

/// Convert a label to a lowercase ASCII slug.
///
/// Non-ASCII text is transliterated, every run of non-alphanumeric
/// characters becomes a single `-`, and leading/trailing `-` are trimmed.
///
/// | Label            | Slug            |
/// |------------------|-----------------|
/// | `Rust`           | `rust`          |
/// | `Static Sites`   | `static-sites`  |
/// | `Café`           | `cafe`          |
/// | `C++`            | `c`             |
pub fn slugify(label: &str) -> String {
    let ascii = deunicode(label);
    let mut slug = String::with_capacity(ascii.len());
    let mut pending_dash = false;

    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        EMPTY_SLUG.to_owned()
    } else {
        slug
    }
}

/// Assign a distinct slug to every label.
///
/// Labels are visited in sorted order, and a label whose slug is already
/// taken gets `-2`, `-3`, ... appended, so the assignment is deterministic
/// across runs.
pub fn assign_slugs<'a>(labels: impl IntoIterator<Item = &'a str>) -> BTreeMap<&'a str, String> {
    let mut sorted: Vec<&str> = labels.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut taken = HashSet::new();
    let mut out = BTreeMap::new();
    for label in sorted {
        let base = slugify(label);
        let mut candidate = base.clone();
        let mut n = 2;
        while !taken.insert(candidate.clone()) {
            candidate = format!("{base}-{n}");
            n += 1;
        }
        out.insert(label, candidate);
    }
    out
}
