//! Output names, collision handling and crash-safe writes.
//!
//! Every output is produced in a temporary file next to its final path and
//! renamed into place, so a reader never observes a half-written target. The
//! temporary is owned by a [`tempfile::NamedTempFile`] and is removed on every
//! path that does not end in a successful rename.

use crate::config::{OutputOptions, SaveMode};
use crate::error::FileError;
use crate::util::file_name_lossy;
use anyhow::{Context, Result};
use regex::{NoExpand, Regex};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use unicode_normalization::UnicodeNormalization;

pub const TEMP_PREFIX: &str = ".tmp_";
pub const TEMP_SUFFIX: &str = ".pdf";

/// Upper bound on re-probing when another writer keeps taking the probed name.
const MAX_CLAIM_ATTEMPTS: usize = 64;

#[derive(Debug, Clone)]
pub struct OutputResolver {
    options: OutputOptions,
    separator_runs: Regex,
}

impl OutputResolver {
    pub fn new(options: &OutputOptions) -> Result<Self> {
        let separator_runs = Regex::new(r"[\s\W]+").with_context(|| "compiling name cleaner")?;
        Ok(Self {
            options: options.clone(),
            separator_runs,
        })
    }

    /// `prefix + stem + suffix`, cleaned per `clean_mode`, original extension kept.
    pub fn clean_name(&self, file_name: &str) -> String {
        let path = Path::new(file_name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut raw = format!(
            "{}{}{}",
            self.options.filename_prefix, stem, self.options.filename_suffix
        );
        if self.options.normalize_unicode {
            raw = raw.nfc().collect();
        }
        // Prefix/suffix must never turn the name into a path.
        raw = raw.replace(['/', '\\'], "_");

        let name = match self.options.clean_mode.separator() {
            None => raw,
            Some(sep) => {
                let replacement = sep.to_string();
                let replaced = self.separator_runs.replace_all(&raw, NoExpand(&replacement));
                let trimmed = replaced.trim_matches(sep);
                if trimmed.is_empty() {
                    raw.clone()
                } else {
                    trimmed.to_string()
                }
            }
        };
        format!("{name}{ext}")
    }

    /// Where `input`'s output would go, without touching the filesystem.
    pub fn plan_target(&self, input: &Path) -> PathBuf {
        let name = self.clean_name(&file_name_lossy(input));
        match self.options.save_mode {
            SaveMode::Copy => resolve_collision(&self.copy_dir(input).join(name)),
            SaveMode::Overwrite => parent_dir(input).join(name),
        }
    }

    fn copy_dir(&self, input: &Path) -> PathBuf {
        parent_dir(input).join(&self.options.processed_dir_name)
    }

    /// Writes `input`'s output through `write`, which receives the temporary path.
    /// Returns the final path.
    pub fn write_output<F>(&self, input: &Path, write: F) -> Result<PathBuf, FileError>
    where
        F: FnOnce(&Path) -> Result<(), FileError>,
    {
        let name = self.clean_name(&file_name_lossy(input));
        match self.options.save_mode {
            SaveMode::Copy => {
                let dir = self.copy_dir(input);
                std::fs::create_dir_all(&dir)
                    .map_err(|e| FileError::io("creating output directory", &dir, e))?;
                persist_atomic(&dir.join(name), Placement::NoClobber, write)
            }
            SaveMode::Overwrite => {
                persist_atomic(&parent_dir(input).join(name), Placement::Replace, write)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Atomically replace whatever is at the target.
    Replace,
    /// Never replace: take the first free ` (N)` variant of the target.
    NoClobber,
}

/// Renders into a temporary beside `target`, then renames it into place.
pub fn persist_atomic<F>(
    target: &Path,
    placement: Placement,
    write: F,
) -> Result<PathBuf, FileError>
where
    F: FnOnce(&Path) -> Result<(), FileError>,
{
    let dir = parent_dir(target);
    let tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(&dir)
        .map_err(|e| FileError::io("creating temporary", &dir, e))?;
    debug!(tmp = %tmp.path().display(), target = %target.display(), "writing temporary");

    write(tmp.path())?;

    match placement {
        Placement::Replace => {
            tmp.persist(target)
                .map_err(|e| FileError::io("replacing output", target, e.error))?;
            Ok(target.to_path_buf())
        }
        Placement::NoClobber => claim_free_name(tmp, target),
    }
}

fn claim_free_name(mut tmp: NamedTempFile, target: &Path) -> Result<PathBuf, FileError> {
    let mut candidate = resolve_collision(target);
    for _ in 0..MAX_CLAIM_ATTEMPTS {
        match tmp.persist_noclobber(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                warn!("{} was taken while writing; probing again", candidate.display());
                tmp = e.file;
                candidate = resolve_collision(target);
            }
            Err(e) => return Err(FileError::io("placing output", &candidate, e.error)),
        }
    }
    Err(FileError::io(
        "placing output",
        &candidate,
        std::io::Error::new(ErrorKind::AlreadyExists, "no free name found"),
    ))
}

/// Writes `bytes` to `path` with the same temporary-then-rename protocol.
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<(), FileError> {
    persist_atomic(path, Placement::Replace, |tmp| {
        std::fs::write(tmp, bytes).map_err(|e| FileError::io("writing temporary", tmp, e))
    })?;
    Ok(())
}

/// `path` if free, else `stem (N).ext` with the smallest free N ≥ 1.
pub fn resolve_collision(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let dir = parent_dir(path);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (1..)
        .map(|n| dir.join(format!("{stem} ({n}){ext}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

pub fn is_temp_name(name: &str) -> bool {
    name.len() > TEMP_PREFIX.len() + TEMP_SUFFIX.len()
        && name.starts_with(TEMP_PREFIX)
        && name.ends_with(TEMP_SUFFIX)
}

/// Deletes temporaries left in `dir` by a process that died mid-write.
/// Only call this while no job is writing into `dir`.
pub fn sweep_stale_temps(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("reading directory: {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() || !is_temp_name(&entry.file_name().to_string_lossy()) {
            continue;
        }
        std::fs::remove_file(&path)
            .with_context(|| format!("removing stale temporary: {}", path.display()))?;
        info!("removed stale temporary {}", path.display());
        removed.push(path);
    }
    removed.sort();
    Ok(removed)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
