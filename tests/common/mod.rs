//! In-memory stand-ins for the PDF and OCR collaborators.
//!
//! A "document" on disk is JSON: a list of pages, each with its text and a tag
//! that survives rendering and recognition, so tests can tell which source page
//! ended up where.

#![allow(dead_code)]

use pdf_batch::engine::{Document, DocumentEngine, EngineError, Raster, Recognizer, RecognizerDiag};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub type Hook = Box<dyn FnMut(usize) + Send>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FakePage {
    pub text: String,
    pub tag: String,
}

/// Writes a fake document whose page `i` carries `texts[i]` and tag `p{i+1}`.
pub fn write_doc(path: &Path, texts: &[&str]) {
    let pages: Vec<FakePage> = texts
        .iter()
        .enumerate()
        .map(|(i, t)| FakePage {
            text: t.to_string(),
            tag: format!("p{}", i + 1),
        })
        .collect();
    std::fs::write(path, serde_json::to_vec(&pages).unwrap()).unwrap();
}

pub fn read_doc(path: &Path) -> Vec<FakePage> {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

/// Every file in `dir`, sorted by name.
pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

pub struct FakeEngine {
    pub rendering_available: bool,
    pub opens: AtomicUsize,
    pub on_open: Mutex<Option<Hook>>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            rendering_available: true,
            opens: AtomicUsize::new(0),
            on_open: Mutex::new(None),
        }
    }
}

impl FakeEngine {
    /// `hook` runs on every `open`, with the 1-based call number.
    pub fn set_on_open(&self, hook: impl FnMut(usize) + Send + 'static) {
        *self.on_open.lock().unwrap() = Some(Box::new(hook));
    }
}

pub struct FakeDoc {
    pub pages: Vec<FakePage>,
}

impl DocumentEngine for FakeEngine {
    type Doc = FakeDoc;

    fn open(&self, path: &Path) -> Result<FakeDoc, EngineError> {
        let n = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(hook) = self.on_open.lock().unwrap().as_mut() {
            hook(n);
        }
        let open_failed = |reason: String| EngineError::OpenFailed {
            path: path.to_path_buf(),
            reason,
        };
        let raw = std::fs::read(path).map_err(|e| open_failed(e.to_string()))?;
        let pages = serde_json::from_slice(&raw).map_err(|e| open_failed(e.to_string()))?;
        Ok(FakeDoc { pages })
    }

    fn create(&self) -> Result<FakeDoc, EngineError> {
        Ok(FakeDoc { pages: Vec::new() })
    }

    fn probe_rendering(&self) -> Result<(), EngineError> {
        if self.rendering_available {
            Ok(())
        } else {
            Err(EngineError::Unavailable("renderer missing".into()))
        }
    }
}

impl Document for FakeDoc {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_has_text(&self, index: usize) -> Result<bool, EngineError> {
        let page = self
            .pages
            .get(index)
            .ok_or_else(|| EngineError::Malformed(format!("no page {index}")))?;
        Ok(!page.text.trim().is_empty())
    }

    fn delete_page(&mut self, index: usize) -> Result<(), EngineError> {
        if index >= self.pages.len() {
            return Err(EngineError::Malformed(format!("no page {index}")));
        }
        self.pages.remove(index);
        Ok(())
    }

    fn render_page(&self, index: usize, dpi: u32) -> Result<Raster, EngineError> {
        let page = self.pages.get(index).ok_or_else(|| EngineError::RenderFailed {
            page: index,
            reason: "out of range".into(),
        })?;
        Ok(Raster {
            png: page.tag.as_bytes().to_vec(),
            dpi,
        })
    }

    fn append_pdf_page(&mut self, pdf: &[u8]) -> Result<(), EngineError> {
        let page: FakePage =
            serde_json::from_slice(pdf).map_err(|e| EngineError::Malformed(e.to_string()))?;
        self.pages.push(page);
        Ok(())
    }

    fn save(&mut self, path: &Path) -> Result<(), EngineError> {
        let bytes = serde_json::to_vec(&self.pages).map_err(|e| EngineError::SaveFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, bytes).map_err(|e| EngineError::SaveFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

pub struct FakeRecognizer {
    pub available: bool,
    pub fail_on_call: Option<usize>,
    pub calls: AtomicUsize,
    pub languages: Mutex<Vec<String>>,
    pub on_call: Mutex<Option<Hook>>,
}

impl Default for FakeRecognizer {
    fn default() -> Self {
        Self {
            available: true,
            fail_on_call: None,
            calls: AtomicUsize::new(0),
            languages: Mutex::new(Vec::new()),
            on_call: Mutex::new(None),
        }
    }
}

impl FakeRecognizer {
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::default()
        }
    }

    /// `hook` runs inside every `recognize`, with the 1-based call number,
    /// before the page is returned.
    pub fn set_on_call(&self, hook: impl FnMut(usize) + Send + 'static) {
        *self.on_call.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Recognizer for FakeRecognizer {
    fn probe(&self, language: &str) -> Result<RecognizerDiag, EngineError> {
        if !self.available {
            return Err(EngineError::Unavailable("tesseract not found".into()));
        }
        Ok(RecognizerDiag {
            exe: "fake-ocr".into(),
            version: "0.0".into(),
            languages: vec![language.to_string()],
            ok: true,
            error: None,
        })
    }

    fn recognize(&self, raster: &Raster, language: &str) -> Result<Vec<u8>, EngineError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.languages.lock().unwrap().push(language.to_string());
        if let Some(hook) = self.on_call.lock().unwrap().as_mut() {
            hook(n);
        }
        if self.fail_on_call == Some(n) {
            return Err(EngineError::RecognitionFailed(format!("call {n} rejected")));
        }
        let tag = String::from_utf8_lossy(&raster.png).into_owned();
        let page = FakePage {
            text: format!("recognized {tag} at {}", raster.dpi),
            tag,
        };
        Ok(serde_json::to_vec(&page).unwrap())
    }
}

/// `name` inside `dir`, as a `PathBuf`.
pub fn at(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}
