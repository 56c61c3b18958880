//! Home-page summary of the most recent posts.
//!
//! The summary is composed in memory as Markdown and then rendered like a
//! generated item; nothing is written to the source tree.

use crate::{
    index::SiteIndex,
    materialize::escape_text,
    paths::{DestPath, Linker},
};

/// Marks the end of a post's excerpt.
pub const MORE_TAG: &str = "<!-- more -->";

pub const HOME_TITLE: &str = "Home";

/// Output path of the summary page.
pub fn home_dest(output_ext: &str) -> DestPath {
    DestPath::new(&format!("index.{output_ext}"))
}

/// The part of `body` shown on the home page: everything before the
/// [`MORE_TAG`], or the first paragraph when there is none.
pub fn excerpt(body: &str) -> &str {
    if let Some((before, _)) = body.split_once(MORE_TAG) {
        return before.trim();
    }

    let body = body.trim_start();
    let mut end = body.len();
    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        if line.trim().is_empty() {
            end = offset;
            break;
        }
        offset += line.len();
    }
    body[..end].trim_end()
}

/// Markdown for the `count` newest posts, newest first.
pub fn compose(index: &SiteIndex, count: usize, output_ext: &str, linker: &Linker) -> String {
    let from = home_dest(output_ext);
    let mut out = String::new();

    for post in index.recent(count) {
        let href = linker.link(&from, &post.path.to_dest(output_ext));
        out.push_str(&format!("## [{}]({href})\n\n", escape_text(&post.title)));
        if let Some(date) = post.date {
            out.push_str(&format!("*{}*\n\n", date.format("%Y-%m-%d")));
        }
        let text = excerpt(&post.body);
        if !text.is_empty() {
            out.push_str(text);
            out.push_str("\n\n");
        }
        out.push_str(&format!("[Read more]({href})\n\n"));
    }
    out
}
