//! Quire - an incremental static-site regenerator for Markdown blogs.

mod build;
mod cli;
mod comments;
mod config;
mod diagnostics;
mod index;
mod logger;
mod materialize;
mod media;
mod paths;
mod render;
mod scan;
mod stale;
mod stamp;
mod summary;
mod utils;
mod writer;

use anyhow::{Context, Result};
use build::build_site;
use clap::Parser;
use cli::Cli;
use config::SiteConfig;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run(&Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log!("error"; "{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = SiteConfig::load(cli)?;

    logger::set_verbosity(config.log.verbosity);
    if let Some(file) = &config.log.file {
        logger::set_log_file(file)
            .with_context(|| format!("opening log file `{}`", file.display()))?;
    }

    build_site(&config).map(|_| ())
}
