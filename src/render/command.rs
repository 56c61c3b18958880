//! External-process renderer.
//!
//! The document is written to the command's stdin and the rendered markup is
//! read from its stdout. Context goes on the command line as repeated
//! `<variable_flag> key=value` pairs, which matches pandoc's `--variable`:
//!
//! ```text
//! pandoc --from=markdown --to=html5 --template=templates/page.html \
//!     --variable title=Alpha --variable next=../../../02/01/beta/index.html ...
//! ```
//!
//! Comments use `comment_command` with a single `reply-to=<path>` variable.

use super::{RenderContext, RenderError, Renderer};
use crate::{config::RenderConfig, log, utils::exec};
use std::{ffi::OsString, path::Path, time::Duration};

pub struct CommandRenderer {
    command: Vec<OsString>,
    comment_command: Vec<OsString>,
    variable_flag: OsString,
    timeout: Duration,
}

impl CommandRenderer {
    pub fn new(config: &RenderConfig, templates: &Path) -> Self {
        let templates = templates.to_string_lossy();
        let expand = |cmd: &[String]| -> Vec<OsString> {
            cmd.iter()
                .map(|arg| OsString::from(arg.replace("{templates}", &templates)))
                .collect()
        };

        Self {
            command: expand(&config.command),
            comment_command: expand(&config.comment_command),
            variable_flag: OsString::from(&config.variable_flag),
            timeout: Duration::from_secs(config.timeout),
        }
    }

    fn variable_args(&self, vars: &[(&str, String)]) -> Vec<OsString> {
        vars.iter()
            .flat_map(|(key, value)| {
                [
                    self.variable_flag.clone(),
                    OsString::from(format!("{key}={value}")),
                ]
            })
            .collect()
    }
}

impl Renderer for CommandRenderer {
    fn render(&self, source: &str, ctx: &RenderContext) -> Result<String, RenderError> {
        let (command, args) = match ctx {
            RenderContext::Item(item) => (&self.command, self.variable_args(&item.variables())),
            RenderContext::Comment { path } => (
                &self.comment_command,
                self.variable_args(&[("reply-to", path.to_string())]),
            ),
        };

        let captured = exec::run_with_input(command, &args, source.as_bytes(), None, self.timeout)?;
        if !captured.stderr.is_empty() {
            log!(level = 3; "render"; "{}", String::from_utf8_lossy(&captured.stderr).trim());
        }
        Ok(String::from_utf8(captured.stdout)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{comments::CommentPath, render::ItemContext, scan::ItemKind};

    fn config(command: &[&str]) -> RenderConfig {
        RenderConfig {
            command: command.iter().map(|s| s.to_string()).collect(),
            comment_command: command.iter().map(|s| s.to_string()).collect(),
            ..RenderConfig::default()
        }
    }

    fn item() -> RenderContext {
        RenderContext::Item(ItemContext {
            title: "Alpha".into(),
            date: None,
            kind: ItemKind::Page,
            tags: vec![],
            categories: vec![],
            previous: None,
            next: None,
            comments: String::new(),
        })
    }

    #[test]
    fn test_templates_placeholder_expanded() {
        let renderer = CommandRenderer::new(
            &config(&["pandoc", "--template={templates}/page.html"]),
            Path::new("/site/templates"),
        );
        assert_eq!(renderer.command[1], OsString::from("--template=/site/templates/page.html"));
    }

    #[test]
    fn test_variable_args() {
        let renderer = CommandRenderer::new(&config(&["x"]), Path::new("t"));
        let args = renderer.variable_args(&[("title", "A".into()), ("kind", "post".into())]);
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["--variable", "title=A", "--variable", "kind=post"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_render_through_process() {
        // `sh -c 'cat' sh <args...>` ignores the variables and echoes stdin
        let renderer = CommandRenderer::new(&config(&["sh", "-c", "cat", "sh"]), Path::new("t"));
        assert_eq!(renderer.render("<p>hi</p>", &item()).unwrap(), "<p>hi</p>");

        let ctx = RenderContext::Comment {
            path: "1.2".parse::<CommentPath>().unwrap(),
        };
        assert_eq!(renderer.render("reply", &ctx).unwrap(), "reply");
    }

    #[cfg(unix)]
    #[test]
    fn test_render_failure_is_error() {
        let renderer = CommandRenderer::new(&config(&["sh", "-c", "exit 1", "sh"]), Path::new("t"));
        assert!(matches!(renderer.render("x", &item()), Err(RenderError::Exec(_))));
    }
}
