//! Site build orchestration.
//!
//! # Phases
//!
//! ```text
//! build_site()
//!     │
//!     ├── Scan         authored documents → Items (warnings only)
//!     ├── IndexBuild   Items → SiteIndex (immutable from here on)
//!     ├── (strict)     abort on any scan warning, nothing written yet
//!     ├── Materialize  SiteIndex → generated stubs in the source tree
//!     │   ─────────    barrier: no item work before every stub exists
//!     ├── Stamps       link stamps per item; outputs of vanished sources removed
//!     ├── Worklist     authored + generated Items, staleness per item
//!     ├── PerItem      (parallel) comments → render → equations → write
//!     ├── Media        allow-listed files next to every item
//!     └── HomeSummary  always regenerated, written only if changed
//! ```
//!
//! A per-item failure is logged and leaves that item's previous output in
//! place; the remaining items still build. Only missing roots or templates
//! abort the run.

use crate::{
    comments::{self, CommentThread},
    config::SiteConfig,
    diagnostics::Diagnostics,
    index::SiteIndex,
    log,
    materialize::{CATEGORY_DIR, Materializer, TAG_DIR, label_stub},
    media,
    paths::{DestPath, Linker, SourcePath},
    render::{
        self, ItemContext, Link, RenderContext, Renderer,
        equations::{self, CommandRasterizer, EquationMatcher, EquationRasterizer},
    },
    scan::{Item, ItemKind, Scanner},
    stale::{StaleReason, StalenessDetector},
    stamp::{LinkStamp, StampStore},
    summary,
    utils::{
        fs::{latest_mtime, remove_file_and_empty_parents, touch},
        slug::assign_slugs,
    },
    writer::{WriteOutcome, WriteStats, write_if_changed},
};
use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    fmt,
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
};

// ============================================================================
// Report
// ============================================================================

/// Counters for one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub scanned: usize,
    pub stale: usize,
    pub rendered: usize,
    pub failed: usize,
    pub written: usize,
    pub unchanged: usize,
    pub media: usize,
    pub stubs: usize,
    pub pruned: usize,
    pub warnings: usize,
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} items, {} stale, {} rendered, {} failed; {} written, {} unchanged; \
             {} media; {} stubs, {} pruned; {} warnings",
            self.scanned,
            self.stale,
            self.rendered,
            self.failed,
            self.written,
            self.unchanged,
            self.media,
            self.stubs,
            self.pruned,
            self.warnings
        )
    }
}

// ============================================================================
// Entry Points
// ============================================================================

/// Build the site with the renderer and rasterizer named by `config`.
pub fn build_site(config: &SiteConfig) -> Result<BuildReport> {
    let renderer = render::from_config(config)?;
    let rasterizer: Option<Box<dyn EquationRasterizer>> = config
        .equations
        .enabled()
        .then(|| Box::new(CommandRasterizer::new(&config.equations)) as Box<dyn EquationRasterizer>);
    build_with(config, renderer, rasterizer)
}

/// Build the site with explicit collaborators.
pub fn build_with(
    config: &SiteConfig,
    renderer: Box<dyn Renderer>,
    rasterizer: Option<Box<dyn EquationRasterizer>>,
) -> Result<BuildReport> {
    let source = &config.build.source;
    if !source.is_dir() {
        bail!("source directory `{}` does not exist", source.display());
    }

    let diag = Diagnostics::new(config.build.strict);
    let stats = WriteStats::default();
    let linker = Linker::new(config.build.host_root.clone());
    let mut report = BuildReport::default();

    // ------------------------------------------------------------------------
    // Scan + IndexBuild
    // ------------------------------------------------------------------------
    log!(level = 2; "build"; "scan");
    let scanner = Scanner::new(config, &diag)?;
    let authored = scanner.scan_authored()?;

    log!(level = 2; "build"; "index");
    let index = SiteIndex::build(authored);
    log!(
        "scan";
        "{} posts, {} pages, {} tags, {} categories",
        index.post_count(),
        index.items().len() - index.post_count(),
        index.tags.len(),
        index.categories.len()
    );

    // Scan warnings are fatal under strict mode before anything is written.
    diag.check("scan")?;

    // ------------------------------------------------------------------------
    // Materialize + Barrier
    // ------------------------------------------------------------------------
    log!(level = 2; "build"; "materialize");
    let materialized = Materializer::new(config, &linker).materialize(&index, &stats)?;
    report.stubs = materialized.stubs;
    report.pruned = materialized.pruned;

    let generated = scanner.scan_generated()?;
    let pipeline = Pipeline::new(config, &index, &linker, renderer, rasterizer, &diag, &stats)?;
    let all: Vec<&Item> = index.items().iter().chain(&generated).collect();
    report.scanned = all.len();

    // ------------------------------------------------------------------------
    // Stamps
    // ------------------------------------------------------------------------
    log!(level = 2; "build"; "stamps");
    let stamps = StampStore::new(source);
    let restamped = stamps.write_all(&all, |item| pipeline.link_stamp(item).to_text())?;
    if restamped > 0 {
        log!(level = 2; "stamp"; "{restamped} item(s) with changed links");
    }
    let live: HashSet<&SourcePath> = all.iter().map(|item| &item.path).collect();
    report.pruned += stamps.prune(
        &live,
        &config.build.output,
        &config.build.extensions.output,
        |page| pipeline.owned_assets(page),
    )?;

    // ------------------------------------------------------------------------
    // Worklist
    // ------------------------------------------------------------------------
    log!(level = 2; "build"; "worklist");
    let detector = StalenessDetector {
        source_root: source,
        output_root: &config.build.output,
        output_ext: &config.build.extensions.output,
        stamps: &stamps,
        dependency_time: config
            .dependency_paths()
            .into_iter()
            .filter_map(latest_mtime)
            .max(),
        force: config.build.force,
    };

    let rendered = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let work: Vec<(&Item, CommentThread, StaleReason)> = all
        .par_iter()
        .filter_map(|&item| {
            let thread = match pipeline.discover_comments(item) {
                Ok(thread) => thread,
                Err(err) => {
                    log!("error"; "{}: {err:#}", item.path);
                    failed.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            };
            let reason = detector.check(item, &thread, &index)?;
            Some((item, thread, reason))
        })
        .collect();
    report.stale = work.len();

    // ------------------------------------------------------------------------
    // PerItem
    // ------------------------------------------------------------------------
    log!(level = 2; "build"; "render {} stale item(s)", work.len());

    work.par_iter().for_each(|(item, thread, reason)| {
        log!("render"; "{} ({reason})", item.path);
        match pipeline.build_item(item, thread) {
            Ok(_) => {
                rendered.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                log!("error"; "{}: {err:#}", item.path);
                failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    });

    // ------------------------------------------------------------------------
    // Media + HomeSummary
    // ------------------------------------------------------------------------
    log!(level = 2; "build"; "media");
    report.media = media::sync(index.items(), config)?;

    log!(level = 2; "build"; "summary");
    if let Err(err) = pipeline.build_home() {
        log!("error"; "home summary: {err:#}");
        failed.fetch_add(1, Ordering::Relaxed);
    }

    report.rendered = rendered.into_inner();
    report.failed = failed.into_inner();
    report.written = stats.written();
    report.unchanged = stats.unchanged();
    report.warnings = diag.count();
    log!("build"; "{report}");

    if diag.is_strict() && report.failed > 0 {
        bail!("strict mode: {} item(s) failed to build", report.failed);
    }
    diag.check("build")?;
    Ok(report)
}

// ============================================================================
// Per-Item Pipeline
// ============================================================================

/// Everything a worker needs to build one item; shared read-only.
struct Pipeline<'a> {
    config: &'a SiteConfig,
    index: &'a SiteIndex,
    linker: &'a Linker,
    renderer: Box<dyn Renderer>,
    equations: Option<(EquationMatcher, Box<dyn EquationRasterizer>)>,
    tag_slugs: BTreeMap<&'a str, String>,
    category_slugs: BTreeMap<&'a str, String>,
    diag: &'a Diagnostics,
    stats: &'a WriteStats,
}

impl<'a> Pipeline<'a> {
    fn new(
        config: &'a SiteConfig,
        index: &'a SiteIndex,
        linker: &'a Linker,
        renderer: Box<dyn Renderer>,
        rasterizer: Option<Box<dyn EquationRasterizer>>,
        diag: &'a Diagnostics,
        stats: &'a WriteStats,
    ) -> Result<Self> {
        let equations = match rasterizer {
            Some(rasterizer) => Some((
                EquationMatcher::new().context("compiling equation pattern")?,
                rasterizer,
            )),
            None => None,
        };

        Ok(Self {
            config,
            index,
            linker,
            renderer,
            equations,
            tag_slugs: assign_slugs(index.tags.labels()),
            category_slugs: assign_slugs(index.categories.labels()),
            diag,
            stats,
        })
    }

    fn output_root(&self) -> &Path {
        &self.config.build.output
    }

    fn dest_of(&self, path: &SourcePath) -> DestPath {
        path.to_dest(&self.config.build.extensions.output)
    }

    /// Comment files in the item's folder; generated stubs have none.
    fn discover_comments(&self, item: &Item) -> Result<CommentThread> {
        if item.kind == ItemKind::Generated {
            return Ok(CommentThread::default());
        }
        let root = &self.config.build.source;
        let file = item.path.to_fs(root);
        let dir = file.parent().unwrap_or(root);
        let thread = comments::discover(dir, &self.config.build.extensions.comment)
            .with_context(|| format!("listing comments in `{}`", dir.display()))?;

        for name in &thread.invalid {
            self.diag
                .warn(&item.path, format!("`{name}` is not a valid comment path, skipped"));
        }
        for name in &thread.duplicates {
            self.diag
                .warn(&item.path, format!("`{name}` repeats an earlier comment path, skipped"));
        }
        Ok(thread)
    }

    /// Fold comments, render, substitute equations and write one item.
    fn build_item(&self, item: &Item, thread: &CommentThread) -> Result<WriteOutcome> {
        if !thread.is_empty() {
            log!(level = 3; "comments"; "{}: {} file(s)", item.path, thread.len());
        }
        let folded = comments::assemble(thread, self.renderer.as_ref())?;
        for path in &folded.dropped {
            self.diag.warn(
                &item.path,
                format!("comment {path} follows a numbering gap and was dropped"),
            );
        }

        let dest = self.dest_of(&item.path);
        let ctx = self.item_context(item, &dest, folded.html);
        let outcome = self.render_to(&dest, &item.body, ctx)?;

        // Unchanged bytes still need a fresh mtime, or the item stays stale.
        if outcome == WriteOutcome::Unchanged {
            let file = dest.to_fs(self.output_root());
            touch(&file).with_context(|| format!("touching `{}`", file.display()))?;
        }
        Ok(outcome)
    }

    /// The summary of recent posts, rendered to `index.<ext>` at the root.
    fn build_home(&self) -> Result<()> {
        let output_ext = &self.config.build.extensions.output;
        let dest = summary::home_dest(output_ext);

        if let Some(owner) = self
            .index
            .items()
            .iter()
            .find(|item| self.dest_of(&item.path) == dest)
        {
            self.diag
                .warn(&owner.path, format!("maps to `{dest}`, home summary skipped"));
            return Ok(());
        }

        let source = summary::compose(
            self.index,
            self.config.build.summary_length,
            output_ext,
            self.linker,
        );
        let ctx = ItemContext {
            title: summary::HOME_TITLE.to_owned(),
            date: None,
            kind: ItemKind::Generated,
            tags: Vec::new(),
            categories: Vec::new(),
            previous: None,
            next: None,
            comments: String::new(),
        };
        let outcome = self.render_to(&dest, &source, ctx)?;
        if outcome.changed() {
            log!(level = 2; "summary"; "{dest}");
        }
        Ok(())
    }

    /// Render `source` and commit it, plus its equation assets, to `dest`.
    ///
    /// Nothing is written unless rendering and rasterizing both succeed.
    fn render_to(&self, dest: &DestPath, source: &str, ctx: ItemContext) -> Result<WriteOutcome> {
        let html = self.renderer.render(source, &RenderContext::Item(ctx))?;

        let (html, assets) = match &self.equations {
            Some((matcher, rasterizer)) => {
                let sub = equations::substitute(&html, dest, matcher, rasterizer.as_ref())?;
                (sub.html, sub.assets)
            }
            None => (html, Vec::new()),
        };

        let root = self.output_root();
        for (asset, bytes) in &assets {
            self.stats.record(write_if_changed(&asset.to_fs(root), bytes)?);
        }
        if let Some((_, rasterizer)) = &self.equations {
            for leftover in equations::leftover_assets(root, dest, rasterizer.extension(), assets.len()) {
                remove_file_and_empty_parents(&leftover.to_fs(root), root)
                    .with_context(|| format!("removing `{leftover}`"))?;
            }
        }

        Ok(self
            .stats
            .record(write_if_changed(&dest.to_fs(root), html.as_bytes())?))
    }

    /// Equation assets currently sitting next to `page`.
    fn owned_assets(&self, page: &DestPath) -> Vec<DestPath> {
        match &self.equations {
            Some((_, rasterizer)) => {
                equations::leftover_assets(self.output_root(), page, rasterizer.extension(), 0)
            }
            None => Vec::new(),
        }
    }

    fn link_stamp<'s>(&'s self, item: &'s Item) -> LinkStamp<'s> {
        LinkStamp::of(item, self.index, &self.tag_slugs, &self.category_slugs)
    }

    fn label_links(
        &self,
        labels: &BTreeSet<String>,
        slugs: &BTreeMap<&str, String>,
        dir: &str,
        from: &DestPath,
    ) -> Vec<Link> {
        let gen_ext = &self.config.build.extensions.generated;
        labels
            .iter()
            .filter_map(|label| {
                let slug = slugs.get(label.as_str())?;
                let target = self.dest_of(&label_stub(dir, slug, gen_ext));
                Some(Link {
                    href: self.linker.link(from, &target),
                    title: label.clone(),
                })
            })
            .collect()
    }

    fn item_context(&self, item: &Item, dest: &DestPath, comments: String) -> ItemContext {
        let neighbor = |other: Option<&Item>| {
            other.map(|other| Link {
                href: self.linker.link(dest, &self.dest_of(&other.path)),
                title: other.title.clone(),
            })
        };

        // Pages keep their labels but never get navigation.
        let is_post = item.is_post();
        ItemContext {
            title: item.title.clone(),
            date: item.date.map(|d| d.format("%Y-%m-%d").to_string()),
            kind: item.kind,
            tags: self.label_links(&item.tags, &self.tag_slugs, TAG_DIR, dest),
            categories: self.label_links(&item.categories, &self.category_slugs, CATEGORY_DIR, dest),
            previous: is_post.then(|| neighbor(self.index.previous(&item.path))).flatten(),
            next: is_post.then(|| neighbor(self.index.next(&item.path))).flatten(),
            comments,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
