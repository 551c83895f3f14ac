//! Loading documents: cross-reference forms, incremental updates, page trees
//! and the failure kinds.

mod common;

use common::{PdfBuilder, append_update, last_startxref, nested_pdf, page_text, page_texts, simple_pdf, xref_stream_pdf, zlib};
use pdf_forge::error::{Error, ErrorKind};
use pdf_forge::{Document, Object, ObjectRef, ParseOptions};

// ============================================================================
// Cross-reference forms
// ============================================================================

#[test]
fn test_classic_table() {
    let pdf = simple_pdf(3);
    let doc = Document::parse(&pdf).unwrap();
    assert_eq!(doc.version(), "1.4");
    assert_eq!(doc.page_count(), 3);
    assert_eq!(doc.root().unwrap(), ObjectRef::new(1, 0));
    assert_eq!(page_texts(&pdf), vec![page_text(1), page_text(2), page_text(3)]);

    let info = doc.resolve(&doc.info().unwrap()).unwrap().as_dict().unwrap();
    assert_eq!(info.get("Title").and_then(Object::as_string), Some(&b"Fixture"[..]));
}

#[test]
fn test_xref_stream_and_object_stream() {
    let pdf = xref_stream_pdf();
    let doc = Document::parse(&pdf).unwrap();
    assert_eq!(doc.version(), "1.5");
    assert_eq!(doc.page_count(), 3);
    assert_eq!(doc.pages()[2], ObjectRef::new(5, 0));
    assert_eq!(doc.media_box(&doc.pages()[0]).unwrap(), Some([0.0, 0.0, 300.0, 300.0]));
    assert_eq!(page_texts(&pdf)[1], page_text(2));
}

#[test]
fn test_incremental_update_overrides() {
    let base = simple_pdf(2);
    let updated = append_update(
        &base,
        &[
            (12, "<< /Type /Page /Parent 2 0 R /Contents 13 0 R /Rotate 180 >>"),
            (4, "<< /Title (Updated) >>"),
        ],
        "/Size 16 /Root 1 0 R /Info 4 0 R",
    );
    let doc = Document::parse(&updated).unwrap();
    assert_eq!(doc.page_count(), 2);
    assert_eq!(doc.page_rotation(&doc.pages()[0]).unwrap(), 180);
    assert_eq!(doc.page_rotation(&doc.pages()[1]).unwrap(), 0);
    let info = doc.resolve(&ObjectRef::new(4, 0)).unwrap().as_dict().unwrap();
    assert_eq!(info.get("Title"), Some(&Object::String(b"Updated".to_vec())));
    // Objects only in the older section are still there
    assert!(doc.get(&ObjectRef::new(3, 0)).is_some());
}

#[test]
fn test_update_can_drop_pages() {
    let base = simple_pdf(3);
    let updated = append_update(
        &base,
        &[(2, "<< /Type /Pages /Kids [16 0 R] /Count 1 /MediaBox [0 0 612 792] >>")],
        "/Size 18 /Root 1 0 R",
    );
    assert_eq!(page_texts(&updated), vec![page_text(3)]);
}

#[test]
fn test_prev_loop_is_malformed() {
    let base = simple_pdf(1);
    let mut pdf = base.clone();
    let xref = pdf.len();
    pdf.extend_from_slice(
        format!("xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 14 /Root 1 0 R /Prev {} >>\nstartxref\n{}\n%%EOF\n", xref, xref)
            .as_bytes(),
    );
    assert_eq!(Document::parse(&pdf).unwrap_err().kind(), ErrorKind::MalformedDocument);
}

#[test]
fn test_xref_chain_limit() {
    let mut pdf = simple_pdf(1);
    for _ in 0..4 {
        pdf = append_update(&pdf, &[(3, "<< /Type /Font /Subtype /Type1 /BaseFont /Courier >>")], "/Size 14 /Root 1 0 R");
    }
    assert!(Document::parse(&pdf).is_ok());
    let options = ParseOptions {
        max_xref_chain: 3,
        ..ParseOptions::default()
    };
    assert!(matches!(
        Document::parse_with_options(&pdf, &options),
        Err(Error::MalformedDocument(_))
    ));
}

// ============================================================================
// Page tree
// ============================================================================

#[test]
fn test_nested_tree_order_and_inheritance() {
    let pdf = nested_pdf();
    let doc = Document::parse(&pdf).unwrap();
    assert_eq!(doc.version(), "1.6");
    assert_eq!(doc.page_count(), 6);
    assert_eq!(page_texts(&pdf), (1..=6).map(page_text).collect::<Vec<_>>());

    let rotations: Vec<i32> = doc.pages().iter().map(|p| doc.page_rotation(p).unwrap()).collect();
    assert_eq!(rotations, vec![90, 90, 90, 0, 0, 0]);
    assert_eq!(doc.media_box(&doc.pages()[0]).unwrap(), Some([0.0, 0.0, 612.0, 792.0]));
    assert_eq!(doc.media_box(&doc.pages()[5]).unwrap(), Some([0.0, 0.0, 595.0, 842.0]));
}

#[test]
fn test_walk_reachable_from_page() {
    let doc = Document::parse(&simple_pdf(2)).unwrap();
    let reached = doc.walk_reachable(&ObjectRef::new(14, 0)).unwrap();
    // The page reaches its contents and, through /Parent, the whole tree
    assert_eq!(reached.get_index(0), Some(&ObjectRef::new(14, 0)));
    assert!(reached.contains(&ObjectRef::new(15, 0)));
    assert!(reached.contains(&ObjectRef::new(3, 0)));
    assert!(reached.contains(&ObjectRef::new(13, 0)));
    assert!(!reached.contains(&ObjectRef::new(4, 0)));
    assert!(matches!(
        doc.walk_reachable(&ObjectRef::new(99, 0)),
        Err(Error::DanglingReference(_))
    ));
}

#[test]
fn test_resolve_missing_and_cyclic() {
    let mut b = PdfBuilder::new("1.4");
    b.object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [] /Count 0 >>")
        .object(5, "6 0 R")
        .object(6, "5 0 R");
    let doc = Document::parse(&b.build("/Root 1 0 R")).unwrap();
    assert!(matches!(doc.resolve(&ObjectRef::new(9, 0)), Err(Error::DanglingReference(_))));
    let err = doc.resolve(&ObjectRef::new(5, 0)).unwrap_err();
    assert!(matches!(err, Error::CircularReference(_)));
    assert_eq!(err.kind(), ErrorKind::MalformedDocument);
}

// ============================================================================
// Streams and filters
// ============================================================================

#[test]
fn test_filter_chain_decoded_on_request() {
    let mut b = PdfBuilder::new("1.4");
    // ASCIIHex over Flate: the outer filter is listed first
    let flate = zlib(b"q 1 0 0 1 0 0 cm Q");
    let hex: String = flate.iter().map(|byte| format!("{:02x}", byte)).collect::<String>() + ">";
    b.object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(3, "<< /Type /Page /Parent 2 0 R /Contents [4 0 R 5 0 R] >>")
        .stream(4, "/Filter [/ASCIIHexDecode /FlateDecode]", hex.as_bytes())
        .stream(5, "/Filter /RunLengthDecode", &[2, b'a', b'b', b'c', 254, b'!', 128]);
    let doc = Document::parse(&b.build("/Root 1 0 R")).unwrap();
    assert_eq!(doc.page_content(0).unwrap(), b"q 1 0 0 1 0 0 cm Q\nabc!!!");
}

#[test]
fn test_image_codecs_carried_through() {
    let mut b = PdfBuilder::new("1.4");
    b.object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [] /Count 0 >>")
        .stream(3, "/Type /XObject /Subtype /Image /Filter /DCTDecode", b"\xFF\xD8\xFF\xE0 not really a jpeg");
    let doc = Document::parse(&b.build("/Root 1 0 R")).unwrap();
    let image = doc.get(&ObjectRef::new(3, 0)).unwrap();
    assert_eq!(image.decode_stream_data().unwrap(), b"\xFF\xD8\xFF\xE0 not really a jpeg");
}

#[test]
fn test_unknown_filter_is_unsupported() {
    let mut b = PdfBuilder::new("1.4");
    b.object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [] /Count 0 >>")
        .stream(3, "/Filter /BrotliDecode", b"xyz");
    let err = Document::parse(&b.build("/Root 1 0 R")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFilter);
}

#[test]
fn test_wrong_direct_length() {
    let mut pdf = simple_pdf(1);
    let pos = pdf.windows(11).position(|w| w == b"/Length 37 ").unwrap();
    pdf[pos + 8..pos + 10].copy_from_slice(b"30");

    // Recovered by scanning for endstream unless strict
    assert_eq!(page_texts(&pdf), vec![page_text(1)]);
    assert!(Document::parse_with_options(&pdf, &ParseOptions::strict()).is_err());
}

// ============================================================================
// Malformed input
// ============================================================================

#[test]
fn test_prefixes_fail_cleanly() {
    for pdf in [simple_pdf(4), nested_pdf(), xref_stream_pdf()] {
        for len in [0, 1, 8, 50, 100, pdf.len() / 3, pdf.len() - 10] {
            let err = Document::parse(&pdf[..len]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedDocument, "prefix {} gave {:?}", len, err);
        }
    }
}

#[test]
fn test_bad_startxref() {
    let mut pdf = simple_pdf(1);
    let offset = last_startxref(&pdf).to_string();
    let pos = pdf.len() - "\n%%EOF\n".len() - offset.len();
    pdf.splice(pos..pos + offset.len(), b"99999999".iter().copied());
    assert_eq!(Document::parse(&pdf).unwrap_err().kind(), ErrorKind::MalformedDocument);
}

#[test]
fn test_not_a_pdf() {
    for input in [&b""[..], b"hello world", b"%PDF-1.4\n", b"%!PS-Adobe-3.0\nstartxref\n0\n%%EOF"] {
        assert_eq!(Document::parse(input).unwrap_err().kind(), ErrorKind::MalformedDocument);
    }
}
