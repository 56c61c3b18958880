//! `[render]` and `[equations]` section configuration.
//!
//! Both sections describe external collaborators: the document renderer and
//! the equation rasterizer. Commands are argument vectors, not shell strings.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

// ============================================================================
// Enums
// ============================================================================

/// Which document renderer to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderBackend {
    /// In-process Markdown renderer with the `page.html` template (default).
    #[default]
    Builtin,
    /// External command reading the document on stdin.
    Command,
}

// ============================================================================
// [render]
// ============================================================================

/// `[render]` section in quire.toml.
///
/// # Example
/// ```toml
/// [render]
/// backend = "command"
/// command = ["pandoc", "--to=html5", "--template={templates}/page.html"]
/// comment_command = ["pandoc", "--to=html5"]
/// timeout = 60
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Renderer backend.
    #[serde(default = "defaults::render::backend")]
    #[educe(Default = defaults::render::backend())]
    pub backend: RenderBackend,

    /// Command for whole documents. `{templates}` expands to the template dir.
    #[serde(default = "defaults::render::command")]
    #[educe(Default = defaults::render::command())]
    pub command: Vec<String>,

    /// Command for comment fragments.
    #[serde(default = "defaults::render::comment_command")]
    #[educe(Default = defaults::render::comment_command())]
    pub comment_command: Vec<String>,

    /// Flag preceding each `key=value` context argument.
    #[serde(default = "defaults::render::variable_flag")]
    #[educe(Default = defaults::render::variable_flag())]
    pub variable_flag: String,

    /// Seconds before a render invocation is killed.
    #[serde(default = "defaults::render::timeout")]
    #[educe(Default = defaults::render::timeout())]
    pub timeout: u64,
}

// ============================================================================
// [equations]
// ============================================================================

/// `[equations]` section in quire.toml.
///
/// An empty `command` disables rasterization and leaves equation markup as is.
///
/// # Example
/// ```toml
/// [equations]
/// command = ["tex2svg", "{input}", "{output}"]
/// extension = "svg"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct EquationConfig {
    /// Rasterizer command with `{input}`/`{output}` placeholders.
    #[serde(default = "defaults::equations::command")]
    #[educe(Default = defaults::equations::command())]
    pub command: Vec<String>,

    /// Extension of produced assets.
    #[serde(default = "defaults::equations::extension")]
    #[educe(Default = defaults::equations::extension())]
    pub extension: String,

    /// Seconds before a rasterizer invocation is killed.
    #[serde(default = "defaults::equations::timeout")]
    #[educe(Default = defaults::equations::timeout())]
    pub timeout: u64,
}

impl EquationConfig {
    pub fn enabled(&self) -> bool {
        !self.command.is_empty()
    }
}
