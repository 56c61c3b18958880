//! `[build]` section configuration.
//!
//! Contains the source/output/template roots, link hosting, and the file
//! extension conventions that decide what the scanner treats as a document.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Main BuildConfig
// ============================================================================

/// `[build]` section in quire.toml - build pipeline configuration.
///
/// # Example
/// ```toml
/// [build]
/// source = "src"             # Source tree (posts, pages, comments)
/// output = "public"          # Rendered tree
/// templates = "templates"    # Template directory
/// host_root = "/blog"        # Absolute links instead of relative ones
/// summary_length = 10        # Posts on the home summary
///
/// [build.extensions]
/// document = "md"
///
/// [build.media]
/// extensions = ["png", "jpg"]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Source tree root.
    #[serde(default = "defaults::build::source")]
    #[educe(Default = defaults::build::source())]
    pub source: PathBuf,

    /// Rendered output root.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Template directory handed to the renderer.
    #[serde(default = "defaults::build::templates")]
    #[educe(Default = defaults::build::templates())]
    pub templates: PathBuf,

    /// Hosting-root prefix. When set, links are absolute (`<host_root>/<path>`).
    #[serde(default = "defaults::build::host_root")]
    #[educe(Default = defaults::build::host_root())]
    pub host_root: Option<String>,

    /// Number of recent posts on the home summary.
    #[serde(default = "defaults::build::summary_length")]
    #[educe(Default = defaults::build::summary_length())]
    pub summary_length: usize,

    /// Treat every item as stale.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub force: bool,

    /// Promote every warning to a fatal error.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub strict: bool,

    /// File extension conventions.
    #[serde(default)]
    pub extensions: ExtensionConfig,

    /// Media copy settings.
    #[serde(default)]
    pub media: MediaConfig,
}

// ============================================================================
// Sub-configurations
// ============================================================================

/// `[build.extensions]` section - file-type conventions.
///
/// Document, generated and comment extensions must be pairwise distinct so
/// that each source file has exactly one role.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct ExtensionConfig {
    /// Authored documents (posts and pages).
    #[serde(default = "defaults::build::extensions::document")]
    #[educe(Default = defaults::build::extensions::document())]
    pub document: String,

    /// Generated stubs (tag/category/archive listings).
    #[serde(default = "defaults::build::extensions::generated")]
    #[educe(Default = defaults::build::extensions::generated())]
    pub generated: String,

    /// Comment fragments.
    #[serde(default = "defaults::build::extensions::comment")]
    #[educe(Default = defaults::build::extensions::comment())]
    pub comment: String,

    /// Rendered output.
    #[serde(default = "defaults::build::extensions::output")]
    #[educe(Default = defaults::build::extensions::output())]
    pub output: String,
}

/// `[build.media]` section - media files copied next to rendered items.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct MediaConfig {
    /// Allow-listed extensions, compared case-insensitively.
    #[serde(default = "defaults::build::media::extensions")]
    #[educe(Default = defaults::build::media::extensions())]
    pub extensions: Vec<String>,
}

impl MediaConfig {
    pub fn allows(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config_defaults() {
        let config = BuildConfig::default();
        assert_eq!(config.source, PathBuf::from("src"));
        assert_eq!(config.output, PathBuf::from("public"));
        assert_eq!(config.templates, PathBuf::from("templates"));
        assert_eq!(config.summary_length, 10);
        assert!(config.host_root.is_none());
        assert!(!config.force);
        assert!(!config.strict);
        assert_eq!(config.extensions.document, "md");
        assert_eq!(config.extensions.generated, "mdg");
        assert_eq!(config.extensions.comment, "mdc");
        assert_eq!(config.extensions.output, "html");
    }

    #[test]
    fn test_build_config_partial_toml() {
        let config: BuildConfig = toml::from_str(
            r#"
            source = "content"
            summary_length = 3

            [extensions]
            document = "markdown"
            "#,
        )
        .unwrap();
        assert_eq!(config.source, PathBuf::from("content"));
        assert_eq!(config.summary_length, 3);
        assert_eq!(config.extensions.document, "markdown");
        assert_eq!(config.extensions.generated, "mdg");
    }

    #[test]
    fn test_build_config_unknown_field_rejected() {
        let result: Result<BuildConfig, _> = toml::from_str("minify = true");
        assert!(result.is_err());
    }

    #[test]
    fn test_media_allows_case_insensitive() {
        let media = MediaConfig::default();
        assert!(media.allows("png"));
        assert!(media.allows("JPG"));
        assert!(!media.allows("md"));
        assert!(!media.allows("exe"));
    }
}
