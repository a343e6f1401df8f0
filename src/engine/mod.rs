pub mod pdf;
pub mod process;
pub mod render;
pub mod tesseract;
pub mod types;

use std::path::Path;

pub use types::{EngineError, Raster, RecognizerDiag};

/// Opens and creates documents. Shared by reference with the worker thread.
pub trait DocumentEngine: Send + Sync + 'static {
    type Doc: Document;

    fn open(&self, path: &Path) -> Result<Self::Doc, EngineError>;

    /// An empty document that recognized pages are appended to.
    fn create(&self) -> Result<Self::Doc, EngineError>;

    /// Checked at job start when recognition is requested.
    fn probe_rendering(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// A working copy of one document. Page indices are 0-based and always refer
/// to the current state of the copy, after any deletions.
pub trait Document {
    fn page_count(&self) -> usize;
    fn page_has_text(&self, index: usize) -> Result<bool, EngineError>;
    fn delete_page(&mut self, index: usize) -> Result<(), EngineError>;
    fn render_page(&self, index: usize, dpi: u32) -> Result<Raster, EngineError>;
    fn append_pdf_page(&mut self, pdf: &[u8]) -> Result<(), EngineError>;
    fn save(&mut self, path: &Path) -> Result<(), EngineError>;
}

pub trait Recognizer: Send + Sync + 'static {
    /// Fails with [`EngineError::Unavailable`] when the engine or one of the
    /// requested languages is missing.
    fn probe(&self, language: &str) -> Result<RecognizerDiag, EngineError>;

    /// Turns one page raster into a single-page PDF carrying an invisible text layer.
    fn recognize(&self, raster: &Raster, language: &str) -> Result<Vec<u8>, EngineError>;
}
