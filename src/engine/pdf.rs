//! lopdf-backed documents.
//!
//! Pages are edited in memory. Rendering goes back to the untouched source file,
//! so every document remembers which source page each of its pages came from.

use super::{render::PopplerRenderer, Document, DocumentEngine, EngineError, Raster};
use lopdf::{dictionary, Dictionary, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Attributes a page may inherit from its `Pages` node.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

pub struct PdfEngine {
    renderer: PopplerRenderer,
}

impl PdfEngine {
    pub fn new(renderer: PopplerRenderer) -> Self {
        Self { renderer }
    }
}

impl DocumentEngine for PdfEngine {
    type Doc = PdfDocument;

    fn open(&self, path: &Path) -> Result<PdfDocument, EngineError> {
        let inner = lopdf::Document::load(path).map_err(|e| EngineError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let source_pages = inner.get_pages().into_keys().collect();
        Ok(PdfDocument {
            inner,
            source: Some(path.to_path_buf()),
            source_pages,
            renderer: self.renderer.clone(),
        })
    }

    fn create(&self) -> Result<PdfDocument, EngineError> {
        let mut inner = lopdf::Document::with_version("1.5");
        let pages_id = inner.new_object_id();
        inner.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => Vec::<Object>::new(),
                "Count" => 0,
            }),
        );
        let catalog_id = inner.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        inner.trailer.set("Root", catalog_id);
        Ok(PdfDocument {
            inner,
            source: None,
            source_pages: Vec::new(),
            renderer: self.renderer.clone(),
        })
    }

    fn probe_rendering(&self) -> Result<(), EngineError> {
        let banner = self.renderer.probe()?;
        debug!("renderer: {banner}");
        Ok(())
    }
}

pub struct PdfDocument {
    inner: lopdf::Document,
    source: Option<PathBuf>,
    /// 1-based source page number for each current page. Empty for created documents.
    source_pages: Vec<u32>,
    renderer: PopplerRenderer,
}

impl PdfDocument {
    fn page_number(&self, index: usize) -> Result<u32, EngineError> {
        if index >= self.page_count() {
            return Err(EngineError::Malformed(format!(
                "page index {index} out of range ({} pages)",
                self.page_count()
            )));
        }
        Ok(index as u32 + 1)
    }

    fn pages_root(&self) -> Result<ObjectId, EngineError> {
        self.inner
            .catalog()
            .and_then(|c| c.get(b"Pages"))
            .and_then(Object::as_reference)
            .map_err(|e| EngineError::Malformed(format!("missing page tree: {e}")))
    }
}

impl Document for PdfDocument {
    fn page_count(&self) -> usize {
        self.inner.get_pages().len()
    }

    fn page_has_text(&self, index: usize) -> Result<bool, EngineError> {
        let page = self.page_number(index)?;
        let text = self
            .inner
            .extract_text(&[page])
            .map_err(|e| EngineError::Malformed(format!("text extraction on page {page}: {e}")))?;
        Ok(!text.trim().is_empty())
    }

    fn delete_page(&mut self, index: usize) -> Result<(), EngineError> {
        let page = self.page_number(index)?;
        self.inner.delete_pages(&[page]);
        if index < self.source_pages.len() {
            self.source_pages.remove(index);
        }
        Ok(())
    }

    fn render_page(&self, index: usize, dpi: u32) -> Result<Raster, EngineError> {
        let (Some(source), Some(&page)) = (self.source.as_deref(), self.source_pages.get(index))
        else {
            return Err(EngineError::RenderFailed {
                page: index,
                reason: "page has no backing source file".into(),
            });
        };
        self.renderer.render(source, page, dpi)
    }

    fn append_pdf_page(&mut self, pdf: &[u8]) -> Result<(), EngineError> {
        let malformed = |e: lopdf::Error| EngineError::Malformed(format!("recognized page: {e}"));

        let page_doc = lopdf::Document::load_mem(pdf).map_err(malformed)?;
        let src_root = page_doc
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .map_err(malformed)?;
        let src_pages = page_doc
            .catalog()
            .and_then(|c| c.get(b"Pages"))
            .and_then(Object::as_reference)
            .map_err(malformed)?;
        let mut inherited = Dictionary::new();
        if let Ok(node) = page_doc.get_dictionary(src_pages) {
            for key in INHERITABLE {
                if let Ok(value) = node.get(key) {
                    inherited.set(key.to_vec(), value.clone());
                }
            }
        }
        let src_page_ids: Vec<ObjectId> = page_doc.get_pages().into_values().collect();
        let pages_id = self.pages_root()?;

        let mut mapping = BTreeMap::new();
        let mut next = self.inner.max_id;
        for id in page_doc.objects.keys() {
            if *id == src_root || *id == src_pages {
                continue;
            }
            next += 1;
            mapping.insert(*id, (next, 0));
        }
        self.inner.max_id = next;

        for (id, mut obj) in page_doc.objects {
            let Some(&new_id) = mapping.get(&id) else {
                continue;
            };
            remap_references(&mut obj, &mapping);
            self.inner.objects.insert(new_id, obj);
        }
        for (_, value) in inherited.iter_mut() {
            remap_references(value, &mapping);
        }

        let mut appended = Vec::with_capacity(src_page_ids.len());
        for src_id in src_page_ids {
            let new_id = *mapping
                .get(&src_id)
                .ok_or_else(|| EngineError::Malformed("page object missing".into()))?;
            let page = self
                .inner
                .get_object_mut(new_id)
                .and_then(Object::as_dict_mut)
                .map_err(malformed)?;
            for (key, value) in inherited.iter() {
                if !page.has(key) {
                    page.set(key.clone(), value.clone());
                }
            }
            page.set("Parent", pages_id);
            appended.push(Object::Reference(new_id));
        }

        let added = appended.len() as i64;
        let pages = self
            .inner
            .get_object_mut(pages_id)
            .and_then(Object::as_dict_mut)
            .map_err(malformed)?;
        let count = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
        pages
            .get_mut(b"Kids")
            .and_then(Object::as_array_mut)
            .map_err(malformed)?
            .extend(appended);
        pages.set("Count", count + added);
        Ok(())
    }

    fn save(&mut self, path: &Path) -> Result<(), EngineError> {
        self.inner
            .save(path)
            .map(|_| ())
            .map_err(|e| EngineError::SaveFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }
}

fn remap_references(obj: &mut Object, mapping: &BTreeMap<ObjectId, ObjectId>) {
    match obj {
        Object::Reference(id) => {
            if let Some(new_id) = mapping.get(id) {
                *id = *new_id;
            }
        }
        Object::Array(items) => {
            for item in items {
                remap_references(item, mapping);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                remap_references(value, mapping);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                remap_references(value, mapping);
            }
        }
        _ => {}
    }
}
