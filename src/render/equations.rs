//! Equation extraction and rasterization.
//!
//! Rendered markup marks equations as
//! `<span class="math inline">…</span>` (pandoc) or
//! `<span class="math math-inline">…</span>` (pulldown-cmark), and likewise
//! for `display`. Each distinct expression of a page is rasterized once into
//! a numbered asset next to the page's output and the span is replaced with
//! an `<img>` pointing at it:
//!
//! ```text
//! 2021/01/01/alpha/index.html
//! 2021/01/01/alpha/index-eq1.svg
//! 2021/01/01/alpha/index-eq2.svg
//! ```

use super::escape_html;
use crate::{
    config::EquationConfig,
    paths::DestPath,
    utils::exec::{self, ExecError},
};
use regex::Regex;
use std::{
    collections::HashMap,
    ffi::OsString,
    fs, io,
    ops::Range,
    path::Path,
    time::Duration,
};
use tempfile::TempDir;
use thiserror::Error;

const PATTERN: &str = r#"(?s)<span class="math (?:math-)?(inline|display)">(.*?)</span>"#;

// ============================================================================
// Matcher
// ============================================================================

/// One equation found in rendered markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquationMatch {
    pub display: bool,
    /// Decoded expression, delimiters removed.
    pub expression: String,
    /// Byte range of the whole span element.
    pub span: Range<usize>,
}

/// Finds equation spans: non-overlapping, left to right, shortest match.
pub struct EquationMatcher {
    re: Regex,
}

impl EquationMatcher {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            re: Regex::new(PATTERN)?,
        })
    }

    /// Lazily iterate over the equations of `html`.
    pub fn find_iter(&self, html: &str) -> impl Iterator<Item = EquationMatch> {
        self.re.captures_iter(html).filter_map(|caps| {
            let whole = caps.get(0)?;
            let display = caps.get(1)?.as_str() == "display";
            let expression = clean_expression(caps.get(2)?.as_str());
            Some(EquationMatch {
                display,
                expression,
                span: whole.range(),
            })
        })
    }
}

/// Strip pandoc's `\(..\)` / `\[..\]` delimiters and decode entities.
fn clean_expression(raw: &str) -> String {
    let decoded = unescape_html(raw.trim());
    let inner = decoded
        .strip_prefix("\\(")
        .and_then(|s| s.strip_suffix("\\)"))
        .or_else(|| decoded.strip_prefix("\\[").and_then(|s| s.strip_suffix("\\]")))
        .unwrap_or(&decoded);
    inner.trim().to_owned()
}

fn unescape_html(text: &str) -> String {
    const ENTITIES: &[(&str, &str)] = &[
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&#39;", "'"),
        ("&#x27;", "'"),
        ("&amp;", "&"),
    ];

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    'outer: while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        for (entity, ch) in ENTITIES {
            if let Some(after) = rest.strip_prefix(entity) {
                out.push_str(ch);
                rest = after;
                continue 'outer;
            }
        }
        out.push('&');
        rest = &rest[1..];
    }
    out.push_str(rest);
    out
}

// ============================================================================
// Rasterizer
// ============================================================================

#[derive(Debug, Error)]
pub enum RasterError {
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("rasterizer I/O error")]
    Io(#[from] io::Error),

    #[error("rasterizer produced no output for `{0}`")]
    NoOutput(String),
}

/// Converts one expression into an image asset.
pub trait EquationRasterizer: Send + Sync {
    fn rasterize(&self, expression: &str, display: bool) -> Result<Vec<u8>, RasterError>;

    /// Extension of produced assets, without the dot.
    fn extension(&self) -> &str;
}

/// Runs an external rasterizer in a private temporary directory.
///
/// Placeholders in the command: `{input}` (file holding the expression),
/// `{output}` (file to produce), `{display}` (`true`/`false`). Without
/// `{input}` the expression goes to stdin; without an output file, stdout
/// is taken as the asset.
pub struct CommandRasterizer {
    command: Vec<String>,
    extension: String,
    timeout: Duration,
}

impl CommandRasterizer {
    pub fn new(config: &EquationConfig) -> Self {
        Self {
            command: config.command.clone(),
            extension: config.extension.clone(),
            timeout: Duration::from_secs(config.timeout),
        }
    }
}

impl EquationRasterizer for CommandRasterizer {
    fn rasterize(&self, expression: &str, display: bool) -> Result<Vec<u8>, RasterError> {
        // One directory per invocation; concurrent items never share one.
        let work = TempDir::new()?;
        let input = work.path().join("equation.tex");
        let output = work.path().join(format!("equation.{}", self.extension));
        fs::write(&input, expression)?;

        let uses_input = self.command.iter().any(|arg| arg.contains("{input}"));
        let cmd: Vec<OsString> = self
            .command
            .iter()
            .map(|arg| {
                OsString::from(
                    arg.replace("{input}", &input.to_string_lossy())
                        .replace("{output}", &output.to_string_lossy())
                        .replace("{display}", if display { "true" } else { "false" }),
                )
            })
            .collect();
        let stdin = if uses_input { &[][..] } else { expression.as_bytes() };

        let captured = exec::run_with_input(&cmd, &[], stdin, Some(work.path()), self.timeout)?;

        match fs::read(&output) {
            Ok(bytes) if !bytes.is_empty() => Ok(bytes),
            _ if !captured.stdout.is_empty() => Ok(captured.stdout),
            _ => Err(RasterError::NoOutput(expression.to_owned())),
        }
    }

    fn extension(&self) -> &str {
        &self.extension
    }
}

// ============================================================================
// Substitution
// ============================================================================

/// Rewritten markup plus the assets it references.
#[derive(Debug, Default)]
pub struct Substitution {
    pub html: String,
    pub assets: Vec<(DestPath, Vec<u8>)>,
}

/// Asset name for the `n`-th distinct equation of `page`.
fn asset_name(page: &DestPath, n: usize, ext: &str) -> String {
    format!("{}-eq{n}.{ext}", page.file_stem())
}

/// Replace every equation in `html` with an image asset.
///
/// Identical expressions (same text and mode) within one page share one
/// asset. The cache lives only for this call.
pub fn substitute(
    html: &str,
    page: &DestPath,
    matcher: &EquationMatcher,
    rasterizer: &dyn EquationRasterizer,
) -> Result<Substitution, RasterError> {
    let mut cache: HashMap<(bool, String), String> = HashMap::new();
    let mut out = Substitution {
        html: String::with_capacity(html.len()),
        assets: Vec::new(),
    };
    let mut last = 0;

    for eq in matcher.find_iter(html) {
        out.html.push_str(&html[last..eq.span.start]);
        last = eq.span.end;

        let key = (eq.display, eq.expression.clone());
        let name = match cache.get(&key) {
            Some(name) => name.clone(),
            None => {
                let bytes = rasterizer.rasterize(&eq.expression, eq.display)?;
                let name = asset_name(page, out.assets.len() + 1, rasterizer.extension());
                out.assets.push((page.sibling(&name), bytes));
                cache.insert(key, name.clone());
                name
            }
        };

        let class = if eq.display { "math math-display" } else { "math math-inline" };
        out.html.push_str(&format!(
            "<img class=\"{class}\" src=\"{name}\" alt=\"{}\">",
            escape_html(&eq.expression)
        ));
    }
    out.html.push_str(&html[last..]);
    Ok(out)
}

/// Equation assets of `page` numbered above `keep`, left over from an
/// earlier render with more equations.
pub fn leftover_assets(output_root: &Path, page: &DestPath, ext: &str, keep: usize) -> Vec<DestPath> {
    (keep + 1..)
        .map(|n| page.sibling(&asset_name(page, n, ext)))
        .take_while(|asset| asset.to_fs(output_root).exists())
        .collect()
}
