//! Document rendering capability.
//!
//! The core only depends on [`Renderer`]: turn one document's text plus its
//! context into markup. Two backends exist:
//!
//! | Backend   | Implementation                                     |
//! |-----------|----------------------------------------------------|
//! | `builtin` | [`builtin::BuiltinRenderer`]: Markdown + template  |
//! | `command` | [`command::CommandRenderer`]: external process     |
//!
//! Equation rasterization is a second, independent capability in
//! [`equations`].

pub mod builtin;
pub mod command;
pub mod equations;

use crate::{
    comments::CommentPath,
    config::{RenderBackend, SiteConfig},
    scan::ItemKind,
    utils::exec::ExecError,
};
use anyhow::Result;
use std::{io, path::PathBuf, string::FromUtf8Error};
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template `{0}` could not be read")]
    Template(PathBuf, #[source] io::Error),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("renderer produced invalid UTF-8")]
    Utf8(#[from] FromUtf8Error),

    #[error("{0}")]
    Failed(String),
}

// ============================================================================
// Context
// ============================================================================

/// A hyperlink with its display text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub href: String,
    pub title: String,
}

/// Everything a renderer knows about an item beyond its text.
#[derive(Debug, Clone)]
pub struct ItemContext {
    pub title: String,
    /// `YYYY-MM-DD`, posts (and dated pages) only.
    pub date: Option<String>,
    pub kind: ItemKind,
    pub tags: Vec<Link>,
    pub categories: Vec<Link>,
    pub previous: Option<Link>,
    pub next: Option<Link>,
    /// Folded comment thread, already rendered.
    pub comments: String,
}

impl ItemContext {
    /// Flattened `key → value` pairs, used for template placeholders and
    /// command-line variables. Link groups are pre-rendered as HTML.
    pub fn variables(&self) -> Vec<(&'static str, String)> {
        let mut vars = vec![
            ("title", escape_html(&self.title)),
            ("kind", self.kind.as_str().to_owned()),
            ("date", self.date.clone().unwrap_or_default()),
            ("tags", link_list(&self.tags, "tag")),
            ("categories", link_list(&self.categories, "category")),
            ("nav", self.nav()),
            ("comments", self.comments.clone()),
        ];
        if let Some(prev) = &self.previous {
            vars.push(("previous", prev.href.clone()));
            vars.push(("previous-title", escape_html(&prev.title)));
        }
        if let Some(next) = &self.next {
            vars.push(("next", next.href.clone()));
            vars.push(("next-title", escape_html(&next.title)));
        }
        vars
    }

    /// Previous/next navigation block; empty when neither exists.
    fn nav(&self) -> String {
        if self.previous.is_none() && self.next.is_none() {
            return String::new();
        }
        let mut nav = String::from("<nav class=\"post-nav\">");
        if let Some(prev) = &self.previous {
            nav.push_str(&format!(
                "<a rel=\"prev\" href=\"{}\">{}</a>",
                escape_html(&prev.href),
                escape_html(&prev.title)
            ));
        }
        if let Some(next) = &self.next {
            nav.push_str(&format!(
                "<a rel=\"next\" href=\"{}\">{}</a>",
                escape_html(&next.href),
                escape_html(&next.title)
            ));
        }
        nav.push_str("</nav>");
        nav
    }
}

fn link_list(links: &[Link], class: &str) -> String {
    links
        .iter()
        .map(|link| {
            format!(
                "<a class=\"{class}\" href=\"{}\">{}</a>",
                escape_html(&link.href),
                escape_html(&link.title)
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// What is being rendered.
#[derive(Debug, Clone)]
pub enum RenderContext {
    Item(ItemContext),
    Comment { path: CommentPath },
}

// ============================================================================
// Capability
// ============================================================================

/// Converts one document into markup. Implementations are shared across
/// worker threads.
pub trait Renderer: Send + Sync {
    fn render(&self, source: &str, ctx: &RenderContext) -> Result<String, RenderError>;
}

/// Construct the configured renderer. A missing template is fatal here.
pub fn from_config(config: &SiteConfig) -> Result<Box<dyn Renderer>> {
    Ok(match config.render.backend {
        RenderBackend::Builtin => Box::new(builtin::BuiltinRenderer::load(&config.build.templates)?),
        RenderBackend::Command => Box::new(command::CommandRenderer::new(
            &config.render,
            &config.build.templates,
        )),
    })
}

/// Minimal HTML escaping for text and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
