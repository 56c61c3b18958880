//! In-process renderer: Markdown through pulldown-cmark, wrapped in the
//! `page.html` template.
//!
//! Template placeholders use `{{name}}`; see [`ItemContext::variables`] for
//! the available names plus `{{body}}`. Unknown names render as nothing.
//!
//! Comments are rendered without the template: an optional byline from
//! their own front-matter (`author`, `date`) followed by the Markdown body.

use super::{ItemContext, RenderContext, RenderError, Renderer, escape_html};
use crate::scan::frontmatter;
use pulldown_cmark::{Options, Parser, html};
use std::{fs, path::Path};

pub const TEMPLATE_FILE: &str = "page.html";

pub struct BuiltinRenderer {
    template: String,
}

impl BuiltinRenderer {
    pub fn load(templates: &Path) -> Result<Self, RenderError> {
        let path = templates.join(TEMPLATE_FILE);
        let template = fs::read_to_string(&path).map_err(|err| RenderError::Template(path, err))?;
        Ok(Self::with_template(template))
    }

    pub fn with_template(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    fn render_item(&self, source: &str, ctx: &ItemContext) -> String {
        let mut vars = ctx.variables();
        vars.push(("body", markdown_to_html(source)));
        fill_template(&self.template, &vars)
    }
}

impl Renderer for BuiltinRenderer {
    fn render(&self, source: &str, ctx: &RenderContext) -> Result<String, RenderError> {
        match ctx {
            RenderContext::Item(item) => Ok(self.render_item(source, item)),
            RenderContext::Comment { .. } => render_comment(source),
        }
    }
}

fn render_comment(source: &str) -> Result<String, RenderError> {
    let (meta, body) =
        frontmatter::parse_optional(source).map_err(|err| RenderError::Failed(err.to_string()))?;

    let byline: Vec<String> = [meta.author, meta.date]
        .into_iter()
        .flatten()
        .map(|s| escape_html(&s))
        .collect();

    let mut out = String::new();
    if !byline.is_empty() {
        out.push_str(&format!("<p class=\"comment-meta\">{}</p>\n", byline.join(" · ")));
    }
    out.push_str(&markdown_to_html(body));
    Ok(out)
}

pub fn markdown_to_html(source: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_MATH;
    let parser = Parser::new_ext(source, options);
    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Replace every `{{ name }}` in `template`.
fn fill_template(template: &str, vars: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };
        out.push_str(&rest[..start]);
        let name = rest[start + 2..start + 2 + len].trim();
        if let Some((_, value)) = vars.iter().find(|(key, _)| *key == name) {
            out.push_str(value);
        }
        rest = &rest[start + 2 + len + 2..];
    }
    out.push_str(rest);
    out
}
