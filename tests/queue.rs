use pdf_batch::queue::FileQueue;
use std::path::PathBuf;

#[test]
fn directories_contribute_their_pdfs_sorted_and_deduplicated() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["b.pdf", "a.PDF", "notes.txt", ".tmp_123.pdf"] {
        std::fs::write(dir.path().join(name), b"x").unwrap();
    }
    std::fs::create_dir(dir.path().join("nested.pdf")).unwrap();

    let explicit = dir.path().join("b.pdf");
    let q = FileQueue::from_inputs(&[dir.path().to_path_buf(), explicit]).unwrap();

    let expected: Vec<PathBuf> = vec![dir.path().join("a.PDF"), dir.path().join("b.pdf")];
    assert_eq!(q.paths(), expected.as_slice());
    assert_eq!(q.len(), 2);
}

#[test]
fn missing_input_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = FileQueue::from_inputs(&[dir.path().join("gone.pdf")]).unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}

#[test]
fn explicit_files_are_kept_even_without_pdf_extension() {
    let dir = tempfile::tempdir().unwrap();
    let odd = dir.path().join("scan.bin");
    std::fs::write(&odd, b"x").unwrap();
    let q = FileQueue::from_inputs(&[odd.clone()]).unwrap();
    assert_eq!(q.iter().collect::<Vec<_>>(), vec![odd.as_path()]);
}

#[test]
fn empty_queue() {
    let q = FileQueue::from_paths(Vec::new());
    assert!(q.is_empty());
}
