//! Derived-page materializer.
//!
//! Writes the reverse indices back into the source tree as generated stubs
//! so they are rendered like any other document:
//!
//! ```text
//! tag/<slug>/index.mdg        one per tag
//! category/<slug>/index.mdg   one per category
//! <yyyy>/<mm>/index.mdg       one per month with posts
//! archives.mdg                one link per month, oldest first
//! ```
//!
//! Stub text is a pure function of group membership, so an unchanged group
//! produces identical bytes and the writer leaves the stub (and therefore
//! its rendered page) alone.

use crate::{
    config::SiteConfig,
    index::{ReverseIndex, SiteIndex},
    log,
    paths::{DestPath, Linker, SourcePath},
    utils::{
        fs::{collect_all_files, remove_file_and_empty_parents},
        slug::assign_slugs,
    },
    writer::{WriteStats, write_if_changed},
};
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::{collections::HashSet, path::Path};

pub const TAG_DIR: &str = "tag";
pub const CATEGORY_DIR: &str = "category";

/// Stub location of one label group, e.g. `tag/<slug>/index.mdg`.
pub fn label_stub(dir: &str, slug: &str, generated_ext: &str) -> SourcePath {
    SourcePath::new(&format!("{dir}/{slug}/index.{generated_ext}"))
}

/// A generated source document before it is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stub {
    pub path: SourcePath,
    pub title: String,
    /// Markdown list, one line per link.
    pub body: String,
}

#[derive(Serialize)]
struct StubHeader<'a> {
    title: &'a str,
    kind: &'static str,
}

impl Stub {
    /// Full stub text: YAML front-matter followed by the body.
    pub fn to_text(&self) -> Result<String> {
        let header = serde_yaml::to_string(&StubHeader {
            title: &self.title,
            kind: "generated",
        })
        .context("serializing stub front-matter")?;
        Ok(format!("---\n{header}---\n\n{}", self.body))
    }
}

/// What one materialize pass did.
#[derive(Debug, Default)]
pub struct MaterializeReport {
    pub stubs: usize,
    pub pruned: usize,
}

pub struct Materializer<'a> {
    source_root: &'a Path,
    output_root: &'a Path,
    generated_ext: &'a str,
    output_ext: &'a str,
    linker: &'a Linker,
}

impl<'a> Materializer<'a> {
    pub fn new(config: &'a SiteConfig, linker: &'a Linker) -> Self {
        Self {
            source_root: &config.build.source,
            output_root: &config.build.output,
            generated_ext: &config.build.extensions.generated,
            output_ext: &config.build.extensions.output,
            linker,
        }
    }

    /// Compute every stub for the current index, in a fixed order.
    pub fn plan(&self, index: &SiteIndex) -> Vec<Stub> {
        let mut stubs = Vec::new();
        stubs.extend(self.label_stubs(index, &index.tags, TAG_DIR, "Tag"));
        stubs.extend(self.label_stubs(index, &index.categories, CATEGORY_DIR, "Category"));

        for (month, members) in &index.months {
            let path = self.stub_path(&format!("{}/index", month.dir()));
            let body = self.member_list(index, &path, members);
            stubs.push(Stub {
                path,
                title: month.to_string(),
                body,
            });
        }

        // BTreeMap iteration keeps months ascending.
        let archives = self.stub_path("archives");
        let from = archives.to_dest(self.output_ext);
        let body: String = index
            .months
            .iter()
            .map(|(month, members)| {
                let target = self.stub_path(&format!("{}/index", month.dir()));
                let href = self.linker.link(&from, &target.to_dest(self.output_ext));
                format!(
                    "- [{}]({}) ({})\n",
                    escape_text(&month.to_string()),
                    escape_href(&href),
                    members.len()
                )
            })
            .collect();
        stubs.push(Stub {
            path: archives,
            title: "Archives".to_owned(),
            body,
        });

        stubs
    }

    fn label_stubs(
        &self,
        index: &SiteIndex,
        groups: &ReverseIndex,
        dir: &str,
        heading: &str,
    ) -> Vec<Stub> {
        let slugs = assign_slugs(groups.labels());
        groups
            .iter()
            .filter_map(|(label, members)| {
                let slug = slugs.get(label)?;
                let path = label_stub(dir, slug, self.generated_ext);
                let body = self.member_list(index, &path, members);
                Some(Stub {
                    path,
                    title: format!("{heading}: {label}"),
                    body,
                })
            })
            .collect()
    }

    /// `- <date> [Title](href)` for each member, in member order.
    fn member_list(&self, index: &SiteIndex, stub: &SourcePath, members: &[SourcePath]) -> String {
        let from = stub.to_dest(self.output_ext);
        members
            .iter()
            .filter_map(|path| index.get(path))
            .map(|item| {
                let href = self.linker.link(&from, &item.path.to_dest(self.output_ext));
                let date = item
                    .date
                    .map(|d| format!("{} ", d.format("%Y-%m-%d")))
                    .unwrap_or_default();
                format!("- {date}[{}]({})\n", escape_text(&item.title), escape_href(&href))
            })
            .collect()
    }

    fn stub_path(&self, stem: &str) -> SourcePath {
        SourcePath::new(&format!("{stem}.{}", self.generated_ext))
    }

    /// Write every planned stub and prune the ones no longer planned.
    pub fn materialize(&self, index: &SiteIndex, stats: &WriteStats) -> Result<MaterializeReport> {
        let stubs = self.plan(index);

        stubs.par_iter().try_for_each(|stub| -> Result<()> {
            let text = stub.to_text()?;
            let outcome = write_if_changed(&stub.path.to_fs(self.source_root), text.as_bytes())?;
            if stats.record(outcome).changed() {
                log!(level = 2; "materialize"; "{}", stub.path);
            }
            Ok(())
        })?;

        let keep: HashSet<&SourcePath> = stubs.iter().map(|stub| &stub.path).collect();
        let pruned = self.prune(&keep)?;

        Ok(MaterializeReport {
            stubs: stubs.len(),
            pruned,
        })
    }

    /// Delete generated stubs outside `keep`, together with their outputs.
    fn prune(&self, keep: &HashSet<&SourcePath>) -> Result<usize> {
        let obsolete: Vec<SourcePath> = collect_all_files(self.source_root)
            .iter()
            .filter_map(|file| SourcePath::from_fs(self.source_root, file))
            .filter(|path| path.extension() == Some(self.generated_ext))
            .filter(|path| !keep.contains(path))
            .collect();

        for stub in &obsolete {
            let output: DestPath = stub.to_dest(self.output_ext);
            log!(level = 2; "prune"; "{stub}");

            remove_file_and_empty_parents(&stub.to_fs(self.source_root), self.source_root)
                .with_context(|| format!("removing stub `{stub}`"))?;
            remove_file_and_empty_parents(&output.to_fs(self.output_root), self.output_root)
                .with_context(|| format!("removing output `{output}`"))?;
        }

        Ok(obsolete.len())
    }
}

/// Escape Markdown inline syntax in link text.
pub(crate) fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '[' | ']' | '*' | '_' | '`' | '<') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Wrap a destination in `<...>` when it would otherwise break the link.
fn escape_href(href: &str) -> String {
    if href.contains([' ', '(', ')']) {
        format!("<{href}>")
    } else {
        href.to_owned()
    }
}
