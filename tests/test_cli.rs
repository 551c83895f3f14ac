//! Runs the `pdf_forge` binary against files in a temporary directory.

mod common;

use common::{page_text, page_texts, rotations, simple_pdf};
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pdf_forge"))
        .current_dir(dir)
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn test_cli_operations() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.pdf"), simple_pdf(4)).unwrap();
    fs::write(dir.path().join("b.pdf"), simple_pdf(2)).unwrap();

    let out = run(dir.path(), &["merge", "m.pdf", "a.pdf", "b.pdf"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let merged = fs::read(dir.path().join("m.pdf")).unwrap();
    assert_eq!(page_texts(&merged).len(), 6);

    let out = run(dir.path(), &["split", "m.pdf", "2", "3", "s.pdf"]);
    assert!(out.status.success());
    assert_eq!(page_texts(&fs::read(dir.path().join("s.pdf")).unwrap()), vec![page_text(2), page_text(3)]);

    let out = run(dir.path(), &["rotate", "s.pdf", "all", "-90", "r.pdf"]);
    assert!(out.status.success());
    assert_eq!(rotations(&fs::read(dir.path().join("r.pdf")).unwrap()), vec![270, 270]);

    let out = run(dir.path(), &["extract", "a.pdf", "4,1-2,1", "e.pdf", "--compress"]);
    assert!(out.status.success());
    let extracted = fs::read(dir.path().join("e.pdf")).unwrap();
    assert!(extracted.starts_with(b"%PDF-1.5"));
    assert_eq!(page_texts(&extracted), vec![page_text(1), page_text(2), page_text(4)]);

    let out = run(dir.path(), &["info", "a.pdf"]);
    assert!(out.status.success());
    let info: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(info["page_count"], 4);
    assert_eq!(info["pages"][0]["rotation"], 0);
}

#[test]
fn test_cli_failures() {
    let dir = tempdir().unwrap();
    let pdf = simple_pdf(2);
    fs::write(dir.path().join("a.pdf"), &pdf).unwrap();
    fs::write(dir.path().join("broken.pdf"), &pdf[..100]).unwrap();

    let out = run(dir.path(), &["split", "a.pdf", "2", "1", "x.pdf"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("InvalidRange"));
    assert!(!dir.path().join("x.pdf").exists());

    let out = run(dir.path(), &["compress", "broken.pdf", "y.pdf"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("MalformedDocument"));

    let out = run(dir.path(), &["frobnicate"]);
    assert_eq!(out.status.code(), Some(2));
    let out = run(dir.path(), &["rotate", "a.pdf", "sideways", "90", "z.pdf"]);
    assert_eq!(out.status.code(), Some(2));
}
