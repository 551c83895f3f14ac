//! Hand-assembled PDF fixtures with exact byte offsets.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::collections::BTreeMap;
use std::io::Write;

/// Builds PDF files object by object.
#[derive(Debug, Clone)]
pub struct PdfBuilder {
    version: String,
    objects: BTreeMap<u32, Vec<u8>>,
}

impl PdfBuilder {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            objects: BTreeMap::new(),
        }
    }

    /// Add object `id` with body `body` (everything between `obj` and `endobj`).
    pub fn object(&mut self, id: u32, body: &str) -> &mut Self {
        self.objects.insert(id, body.as_bytes().to_vec());
        self
    }

    /// Add a stream object. `/Length` is appended to `dict_entries`.
    pub fn stream(&mut self, id: u32, dict_entries: &str, data: &[u8]) -> &mut Self {
        let mut body = format!("<< {} /Length {} >>\nstream\n", dict_entries, data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.objects.insert(id, body);
        self
    }

    fn max_id(&self) -> u32 {
        self.objects.keys().next_back().copied().unwrap_or(0)
    }

    fn header(&self) -> Vec<u8> {
        let mut out = format!("%PDF-{}\n", self.version).into_bytes();
        out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");
        out
    }

    fn write_objects(&self, out: &mut Vec<u8>, skip: &[u32]) -> BTreeMap<u32, usize> {
        let mut offsets = BTreeMap::new();
        for (id, body) in &self.objects {
            if skip.contains(id) {
                continue;
            }
            offsets.insert(*id, out.len());
            out.extend_from_slice(format!("{} 0 obj\n", id).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }
        offsets
    }

    /// Classic single-section file. `trailer` is added to `/Size`.
    pub fn build(&self, trailer: &str) -> Vec<u8> {
        let mut out = self.header();
        let offsets = self.write_objects(&mut out, &[]);
        let size = self.max_id() + 1;

        let xref = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
        for id in 0..size {
            match offsets.get(&id) {
                Some(offset) => out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes()),
                None => out.extend_from_slice(b"0000000000 65535 f \n"),
            }
        }
        out.extend_from_slice(
            format!("trailer\n<< /Size {} {} >>\nstartxref\n{}\n%%EOF\n", size, trailer, xref).as_bytes(),
        );
        out
    }

    /// File whose objects in `packed` live in one Flate-compressed object
    /// stream and whose table is a cross-reference stream with a PNG Up
    /// predictor. `trailer` entries go into the xref stream dictionary.
    pub fn build_with_xref_stream(&self, packed: &[u32], trailer: &str) -> Vec<u8> {
        let objstm_id = self.max_id() + 1;
        let xref_id = objstm_id + 1;
        let size = xref_id + 1;

        let mut out = self.header();
        let mut offsets = self.write_objects(&mut out, packed);

        let mut header = String::new();
        let mut body = Vec::new();
        for id in packed {
            header.push_str(&format!("{} {} ", id, body.len()));
            body.extend_from_slice(&self.objects[id]);
            body.push(b'\n');
        }
        let first = header.len();
        let mut data = header.into_bytes();
        data.extend_from_slice(&body);
        let compressed = zlib(&data);
        offsets.insert(objstm_id, out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj\n<< /Type /ObjStm /N {} /First {} /Filter /FlateDecode /Length {} >>\nstream\n",
                objstm_id,
                packed.len(),
                first,
                compressed.len()
            )
            .as_bytes(),
        );
        out.extend_from_slice(&compressed);
        out.extend_from_slice(b"\nendstream\nendobj\n");

        let xref_offset = out.len();
        offsets.insert(xref_id, xref_offset);

        // /W [1 4 2]
        let mut rows = Vec::new();
        for id in 0..size {
            let mut row = [0u8; 7];
            if let Some(index) = packed.iter().position(|p| *p == id) {
                row[0] = 2;
                row[1..5].copy_from_slice(&objstm_id.to_be_bytes());
                row[5..7].copy_from_slice(&(index as u16).to_be_bytes());
            } else if let Some(offset) = offsets.get(&id) {
                row[0] = 1;
                row[1..5].copy_from_slice(&(*offset as u32).to_be_bytes());
            } else {
                row[5..7].copy_from_slice(&0xFFFFu16.to_be_bytes());
            }
            rows.push(row);
        }
        let mut predicted = Vec::new();
        let mut prior = [0u8; 7];
        for row in &rows {
            predicted.push(2);
            for i in 0..7 {
                predicted.push(row[i].wrapping_sub(prior[i]));
            }
            prior = *row;
        }
        let compressed = zlib(&predicted);
        out.extend_from_slice(
            format!(
                "{} 0 obj\n<< /Type /XRef /Size {} /W [1 4 2] /Filter /FlateDecode \
                 /DecodeParms << /Predictor 12 /Columns 7 >> {} /Length {} >>\nstream\n",
                xref_id,
                size,
                trailer,
                compressed.len()
            )
            .as_bytes(),
        );
        out.extend_from_slice(&compressed);
        out.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());
        out
    }
}

/// Append an incremental update replacing or adding `objects`.
pub fn append_update(base: &[u8], objects: &[(u32, &str)], trailer: &str) -> Vec<u8> {
    let prev = last_startxref(base);
    let mut out = base.to_vec();
    let mut offsets = Vec::new();
    for (id, body) in objects {
        offsets.push((*id, out.len()));
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", id, body).as_bytes());
    }
    let xref = out.len();
    out.extend_from_slice(b"xref\n");
    for (id, offset) in &offsets {
        out.extend_from_slice(format!("{} 1\n{:010} 00000 n \n", id, offset).as_bytes());
    }
    out.extend_from_slice(
        format!("trailer\n<< {} /Prev {} >>\nstartxref\n{}\n%%EOF\n", trailer, prev, xref).as_bytes(),
    );
    out
}

/// Offset named by the last `startxref`.
pub fn last_startxref(pdf: &[u8]) -> usize {
    let marker = b"startxref";
    let at = pdf.windows(marker.len()).rposition(|w| w == marker).unwrap();
    let tail = std::str::from_utf8(&pdf[at + marker.len()..]).unwrap();
    tail.split_whitespace().next().unwrap().parse().unwrap()
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Content stream text of page `k` (1-based) in the fixtures below.
pub fn page_text(k: usize) -> String {
    format!("BT /F1 12 Tf 72 720 Td (Page {}) Tj ET", k)
}

/// `n` pages under one `/Pages` node that carries `/MediaBox` and shared
/// `/Resources` (font 3). Page k is object `10 + 2k`, its content `11 + 2k`.
/// `/Info` is object 4.
pub fn simple_pdf(n: usize) -> Vec<u8> {
    let mut b = PdfBuilder::new("1.4");
    let kids: Vec<String> = (1..=n).map(|k| format!("{} 0 R", 10 + 2 * k)).collect();
    b.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    b.object(
        2,
        &format!(
            "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 612 792] /Resources << /Font << /F1 3 0 R >> >> >>",
            kids.join(" "),
            n
        ),
    );
    b.object(3, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>");
    b.object(4, "<< /Title (Fixture) /Producer (tests) >>");
    for k in 1..=n {
        let page = 10 + 2 * k as u32;
        b.object(
            page,
            &format!("<< /Type /Page /Parent 2 0 R /Contents {} 0 R >>", page + 1),
        );
        b.stream(page + 1, "", page_text(k).as_bytes());
    }
    b.build("/Root 1 0 R /Info 4 0 R")
}

/// Six pages in a two-level tree: node 3 (Rotate 90) holds pages 1-3, node 4
/// holds pages 4-6 and overrides `/MediaBox`.
pub fn nested_pdf() -> Vec<u8> {
    let mut b = PdfBuilder::new("1.6");
    b.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    b.object(2, "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 6 /MediaBox [0 0 612 792] >>");
    b.object(3, "<< /Type /Pages /Parent 2 0 R /Kids [10 0 R 12 0 R 14 0 R] /Count 3 /Rotate 90 >>");
    b.object(4, "<< /Type /Pages /Parent 2 0 R /Kids [16 0 R 18 0 R 20 0 R] /Count 3 /MediaBox [0 0 595 842] >>");
    for k in 1..=6u32 {
        let page = 8 + 2 * k;
        let parent = if k <= 3 { 3 } else { 4 };
        b.object(
            page,
            &format!("<< /Type /Page /Parent {} 0 R /Contents {} 0 R >>", parent, page + 1),
        );
        b.stream(page + 1, "/Filter /FlateDecode", &zlib(page_text(k as usize).as_bytes()));
    }
    b.build("/Root 1 0 R")
}

/// Three pages whose dictionaries live in an object stream and whose table
/// is a cross-reference stream.
pub fn xref_stream_pdf() -> Vec<u8> {
    let mut b = PdfBuilder::new("1.5");
    b.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    b.object(2, "<< /Type /Pages /Kids [3 0 R 4 0 R 5 0 R] /Count 3 /MediaBox [0 0 300 300] >>");
    for k in 1..=3u32 {
        b.object(2 + k, &format!("<< /Type /Page /Parent 2 0 R /Contents {} 0 R >>", 5 + k));
        b.stream(5 + k, "", page_text(k as usize).as_bytes());
    }
    b.build_with_xref_stream(&[1, 2, 3, 4, 5], "/Root 1 0 R")
}

/// Decoded content of every page, in order.
pub fn page_texts(pdf: &[u8]) -> Vec<String> {
    let doc = pdf_forge::Document::parse(pdf).unwrap();
    (0..doc.page_count())
        .map(|i| String::from_utf8(doc.page_content(i).unwrap()).unwrap())
        .collect()
}

/// Effective rotation of every page, in order.
pub fn rotations(pdf: &[u8]) -> Vec<i32> {
    pdf_forge::api::inspect(pdf)
        .unwrap()
        .pages
        .iter()
        .map(|p| p.rotation)
        .collect()
}
