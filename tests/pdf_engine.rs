use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};
use pdf_batch::engine::pdf::PdfEngine;
use pdf_batch::engine::render::PopplerRenderer;
use pdf_batch::engine::{Document, DocumentEngine, EngineError};
use std::path::Path;

/// One page per entry, each showing its text in Courier. An empty entry
/// yields a page with an empty content stream.
fn build_pdf(texts: &[&str]) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in texts {
        let operations = if text.is_empty() {
            Vec::new()
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations }.encode().unwrap();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn write_pdf(path: &Path, texts: &[&str]) {
    std::fs::write(path, build_pdf(texts)).unwrap();
}

/// An engine whose renderer cannot run, so `render_page` fails with the page
/// it was asked for.
fn engine() -> PdfEngine {
    PdfEngine::new(PopplerRenderer::new("pdf-batch-no-such-renderer"))
}

fn rendered_source_index(doc: &impl Document, index: usize) -> usize {
    match doc.render_page(index, 72) {
        Err(EngineError::RenderFailed { page, .. }) => page,
        other => panic!("expected a render failure, got {:?}", other.map(|r| r.dpi)),
    }
}

#[test]
fn text_layer_is_detected_per_page() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("mixed.pdf");
    write_pdf(&input, &["Hello", ""]);

    let doc = engine().open(&input).unwrap();
    assert_eq!(doc.page_count(), 2);
    assert!(doc.page_has_text(0).unwrap());
    assert!(!doc.page_has_text(1).unwrap());
    assert!(doc.page_has_text(2).is_err());
}

#[test]
fn deleted_first_page_is_gone_after_save() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("book.pdf");
    let output = dir.path().join("out.pdf");
    write_pdf(&input, &["cover", "body"]);

    let engine = engine();
    let mut doc = engine.open(&input).unwrap();
    doc.delete_page(0).unwrap();
    assert_eq!(doc.page_count(), 1);
    doc.save(&output).unwrap();

    let reloaded = engine.open(&output).unwrap();
    assert_eq!(reloaded.page_count(), 1);
    assert!(reloaded.page_has_text(0).unwrap());
    let text = lopdf::Document::load(&output).unwrap().extract_text(&[1]).unwrap();
    assert!(text.contains("body"), "{text:?}");
    assert!(!text.contains("cover"), "{text:?}");
    assert_eq!(engine.open(&input).unwrap().page_count(), 2, "source untouched");
}

#[test]
fn rendering_after_deletion_targets_the_original_page() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.pdf");
    write_pdf(&input, &["", "", ""]);

    let mut doc = engine().open(&input).unwrap();
    assert_eq!(rendered_source_index(&doc, 0), 0);

    doc.delete_page(0).unwrap();
    assert_eq!(rendered_source_index(&doc, 0), 1);
    assert_eq!(rendered_source_index(&doc, 1), 2);
}

#[test]
fn created_document_has_no_source_to_render() {
    let doc = engine().create().unwrap();
    assert_eq!(doc.page_count(), 0);
    match doc.render_page(0, 72) {
        Err(EngineError::RenderFailed { page, reason }) => {
            assert_eq!(page, 0);
            assert!(reason.contains("no backing source"), "{reason}");
        }
        other => panic!("unexpected {:?}", other.map(|r| r.dpi)),
    }
}

#[test]
fn appended_pages_keep_their_order_and_text() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("merged.pdf");

    let engine = engine();
    let mut doc = engine.create().unwrap();
    doc.append_pdf_page(&build_pdf(&["one"])).unwrap();
    doc.append_pdf_page(&build_pdf(&["two"])).unwrap();
    assert_eq!(doc.page_count(), 2);
    assert!(doc.page_has_text(1).unwrap());
    doc.save(&output).unwrap();

    let reloaded = lopdf::Document::load(&output).unwrap();
    assert_eq!(reloaded.get_pages().len(), 2);
    let text = reloaded.extract_text(&[1, 2]).unwrap();
    let (one, two) = (text.find("one").unwrap(), text.find("two").unwrap());
    assert!(one < two, "{text:?}");
    assert_eq!(engine.open(&output).unwrap().page_count(), 2);
}

#[test]
fn garbage_input_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.pdf");
    std::fs::write(&input, b"not a pdf").unwrap();
    assert!(matches!(
        engine().open(&input),
        Err(EngineError::OpenFailed { .. })
    ));
}

#[test]
fn missing_renderer_fails_the_probe() {
    assert!(engine().probe_rendering().is_err());
}
