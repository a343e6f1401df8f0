use crate::naming::is_temp_name;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Ordered, deduplicated list of PDFs a job will visit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileQueue {
    files: Vec<PathBuf>,
}

impl FileQueue {
    /// Files are taken as given; directories contribute their immediate `*.pdf` entries.
    pub fn from_inputs(inputs: &[PathBuf]) -> Result<Self> {
        let mut files = Vec::new();
        for input in inputs {
            if input.is_dir() {
                files.extend(pdfs_in(input)?);
            } else if input.is_file() {
                if !has_pdf_extension(input) {
                    warn!("input does not look like a PDF: {}", input.display());
                }
                files.push(input.clone());
            } else {
                return Err(anyhow!("input does not exist: {}", input.display()));
            }
        }
        Ok(Self::from_paths(files))
    }

    pub fn from_paths(mut files: Vec<PathBuf>) -> Self {
        files.sort();
        files.dedup();
        Self { files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.files
    }
}

fn pdfs_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("reading directory: {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() || !has_pdf_extension(&path) {
            continue;
        }
        if is_temp_name(&entry.file_name().to_string_lossy()) {
            debug!("skipping temporary {}", path.display());
            continue;
        }
        out.push(path);
    }
    Ok(out)
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}
