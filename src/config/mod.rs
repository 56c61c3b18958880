//! Site configuration management for `quire.toml`.
//!
//! # Sections
//!
//! | Section        | Purpose                                          |
//! |----------------|--------------------------------------------------|
//! | `[build]`      | Roots, link hosting, extensions, media, strict   |
//! | `[render]`     | Document renderer backend and command            |
//! | `[equations]`  | Equation rasterizer command                      |
//! | `[log]`        | Verbosity threshold and log file                 |
//!
//! The file is optional: every field has a default, and CLI flags override
//! whatever the file says.
//!
//! # Example
//!
//! ```toml
//! [build]
//! source = "src"
//! output = "public"
//! strict = true
//!
//! [render]
//! backend = "builtin"
//!
//! [log]
//! verbosity = 2
//! file = "quire.log"
//! ```

mod build;
pub mod defaults;
mod error;
mod render;

pub use build::{BuildConfig, ExtensionConfig, MediaConfig};
pub use error::ConfigError;
pub use render::{EquationConfig, RenderBackend, RenderConfig};

use crate::cli::Cli;
use anyhow::{Context, Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing quire.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (may not exist)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Document renderer settings
    #[serde(default)]
    pub render: RenderConfig,

    /// Equation rasterizer settings
    #[serde(default)]
    pub equations: EquationConfig,

    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

/// `[log]` section in quire.toml.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Verbosity threshold; warnings and errors ignore it.
    #[serde(default = "defaults::log::verbosity")]
    #[educe(Default = defaults::log::verbosity())]
    pub verbosity: u8,

    /// Plain-text log file mirroring terminal output.
    #[serde(default = "defaults::log::file")]
    #[educe(Default = defaults::log::file())]
    pub file: Option<PathBuf>,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content).with_context(|| format!("in `{}`", path.display()))
    }

    /// Load the config file named by the CLI (if present), apply CLI
    /// overrides, resolve paths and validate.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = if cli.config.exists() {
            Self::from_path(&cli.config)?
        } else {
            Self::default()
        };

        let root = cli
            .config
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("./"), Path::to_path_buf);

        config.config_path = Self::normalize_path(&cli.config);
        config.update_with_cli(cli);
        config.resolve_paths(&root);
        config.validate()?;
        Ok(config)
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        Self::update_option(&mut self.build.source, cli.source.as_ref());
        Self::update_option(&mut self.build.output, cli.output.as_ref());
        Self::update_option(&mut self.build.templates, cli.templates.as_ref());
        Self::update_option(&mut self.build.summary_length, cli.summary_length.as_ref());

        if let Some(host_root) = &cli.host_root {
            self.build.host_root = Some(host_root.clone());
        }
        if let Some(file) = &cli.log_file {
            self.log.file = Some(file.clone());
        }

        self.build.force |= cli.force;
        self.build.strict |= cli.strict;
        self.log.verbosity = self
            .log
            .verbosity
            .saturating_add(cli.verbose)
            .saturating_sub(cli.quiet);
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Make every directory absolute relative to `root` and strip trailing
    /// slashes from the hosting prefix.
    pub fn resolve_paths(&mut self, root: &Path) {
        self.build.source = Self::normalize_path(&root.join(&self.build.source));
        self.build.output = Self::normalize_path(&root.join(&self.build.output));
        self.build.templates = Self::normalize_path(&root.join(&self.build.templates));
        if let Some(file) = &self.log.file {
            self.log.file = Some(Self::normalize_path(&root.join(file)));
        }

        self.build.host_root = self
            .build
            .host_root
            .take()
            .map(|prefix| prefix.trim_end_matches('/').to_owned());
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            // For non-existent paths, manually make them absolute
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration. Failures here are fatal for the run.
    pub fn validate(&self) -> Result<()> {
        if !self.build.source.is_dir() {
            bail!(ConfigError::Validation(format!(
                "[build.source] `{}` not found",
                self.build.source.display()
            )));
        }

        if !self.build.templates.is_dir() {
            bail!(ConfigError::Validation(format!(
                "[build.templates] `{}` not found",
                self.build.templates.display()
            )));
        }

        let ext = &self.build.extensions;
        let roles = [&ext.document, &ext.generated, &ext.comment];
        if roles.iter().any(|e| e.is_empty()) {
            bail!(ConfigError::Validation(
                "[build.extensions] must not be empty".into()
            ));
        }
        if ext.document == ext.generated || ext.document == ext.comment || ext.generated == ext.comment
        {
            bail!(ConfigError::Validation(
                "[build.extensions] document, generated and comment must differ".into()
            ));
        }

        if self.render.backend == RenderBackend::Command {
            Self::check_command_installed("[render.command]", &self.render.command)?;
            Self::check_command_installed("[render.comment_command]", &self.render.comment_command)?;
        }

        if self.equations.enabled() {
            Self::check_command_installed("[equations.command]", &self.equations.command)?;
        }

        Ok(())
    }

    /// Check if a command is installed and available
    fn check_command_installed(field: &str, command: &[String]) -> Result<()> {
        let Some(cmd) = command.first() else {
            bail!(ConfigError::Validation(format!(
                "{field} must have at least one element"
            )));
        };

        which::which(cmd)
            .with_context(|| format!("`{cmd}` not found. Please install it first."))?;

        Ok(())
    }

    /// Files and directories every rendered output depends on.
    pub fn dependency_paths(&self) -> Vec<&Path> {
        vec![self.config_path.as_path(), self.build.templates.as_path()]
    }
}

// ============================================================================
// Tests
// ============================================================================
