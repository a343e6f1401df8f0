use super::{process, EngineError, Raster};
use std::ffi::OsStr;
use std::path::Path;
use tracing::debug;

/// Renders single pages of a PDF on disk through poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PopplerRenderer {
    exe: String,
}

impl PopplerRenderer {
    pub fn new(exe: impl Into<String>) -> Self {
        Self { exe: exe.into() }
    }

    pub fn probe(&self) -> Result<String, EngineError> {
        let out = process::run_piped(&self.exe, ["-v"], None)
            .map_err(|e| EngineError::Unavailable(format!("{}: {e}", self.exe)))?;
        if !out.status.success() {
            return Err(EngineError::Unavailable(format!(
                "{} -v exited with {}",
                self.exe, out.status
            )));
        }
        // pdftoppm prints its version banner on stderr.
        let banner = String::from_utf8_lossy(&out.stderr);
        Ok(banner.lines().next().unwrap_or("").trim().to_string())
    }

    /// `page_number` is 1-based, as in the source file.
    pub fn render(&self, source: &Path, page_number: u32, dpi: u32) -> Result<Raster, EngineError> {
        let index = page_number.saturating_sub(1) as usize;
        let scratch = tempfile::Builder::new()
            .prefix("pdf-batch-render")
            .tempdir()
            .map_err(|e| EngineError::RenderFailed {
                page: index,
                reason: format!("scratch dir: {e}"),
            })?;
        let stem = scratch.path().join("page");
        let page = page_number.to_string();
        let dpi_arg = dpi.to_string();

        let args: [&OsStr; 10] = [
            OsStr::new("-r"),
            OsStr::new(&dpi_arg),
            OsStr::new("-f"),
            OsStr::new(&page),
            OsStr::new("-l"),
            OsStr::new(&page),
            OsStr::new("-png"),
            OsStr::new("-singlefile"),
            source.as_os_str(),
            stem.as_os_str(),
        ];

        let out = process::run_piped(&self.exe, args, None).map_err(|e| {
            EngineError::RenderFailed {
                page: index,
                reason: format!("{}: {e}", self.exe),
            }
        })?;

        if !out.status.success() {
            return Err(EngineError::RenderFailed {
                page: index,
                reason: format!(
                    "{} exited with {}: {}",
                    self.exe,
                    out.status,
                    process::stderr_tail(&out)
                ),
            });
        }

        let png_path = stem.with_extension("png");
        let png = std::fs::read(&png_path).map_err(|e| EngineError::RenderFailed {
            page: index,
            reason: format!("reading {}: {e}", png_path.display()),
        })?;
        debug!(page = page_number, dpi, bytes = png.len(), "rendered page");
        Ok(Raster { png, dpi })
    }
}
