//! Media sync.
//!
//! Allow-listed files sitting next to a document are copied to the same
//! relative folder in the output tree. Only the item's own folder is
//! considered (no recursion), and a copy is skipped while the destination
//! is at least as new as the source.

use crate::{
    config::SiteConfig,
    log,
    paths::{DestPath, SourcePath},
    scan::Item,
    utils::fs::mtime,
};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

/// Whether `dst` is missing or older than `src`.
fn needs_copy(src: &Path, dst: &Path) -> bool {
    match (mtime(src), mtime(dst)) {
        (Some(src), Some(dst)) => src > dst,
        _ => true,
    }
}

/// Media files directly inside `dir`, sorted.
fn media_in(dir: &Path, config: &SiteConfig) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err).with_context(|| format!("listing `{}`", dir.display())),
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .map(|entry| entry.path())
        .filter(|path| {
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_none_or(|n| n.starts_with('.'));
            let allowed = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| config.build.media.allows(e));
            !hidden && allowed
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Copy media for every folder that holds at least one of `items`.
///
/// Returns the number of files copied.
pub fn sync(items: &[Item], config: &SiteConfig) -> Result<usize> {
    let source = &config.build.source;
    let output = &config.build.output;

    let dirs: BTreeSet<&str> = items.iter().map(|item| item.path.dir()).collect();
    let copied = AtomicUsize::new(0);

    dirs.par_iter().try_for_each(|dir| -> Result<()> {
        let src_dir = SourcePath::new(dir).to_fs(source);
        let dst_dir = DestPath::new(dir).to_fs(output);

        for src in media_in(&src_dir, config)? {
            let Some(name) = src.file_name() else {
                continue;
            };
            let dst = dst_dir.join(name);
            if !needs_copy(&src, &dst) {
                continue;
            }

            fs::create_dir_all(&dst_dir)
                .with_context(|| format!("creating `{}`", dst_dir.display()))?;
            fs::copy(&src, &dst).with_context(|| format!("copying `{}`", src.display()))?;
            log!(level = 2; "media"; "{}", dst.strip_prefix(output).unwrap_or(&dst).display());
            copied.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    })?;

    Ok(copied.into_inner())
}
