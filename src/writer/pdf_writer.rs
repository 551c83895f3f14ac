//! Classic cross-reference table output.
//!
//! Assembles header, body, `xref` table and trailer:
//!
//! ```text
//! %PDF-1.7
//! %âãÏÓ
//! 1 0 obj ... endobj
//! xref
//! 0 n
//! 0000000000 65535 f
//! ...
//! trailer
//! << /Root 1 0 R /Size n >>
//! startxref
//! offset
//! %%EOF
//! ```

use super::object_serializer::ObjectSerializer;
use super::{BINARY_MARKER, Renumbered};
use crate::error::Result;
use crate::object::{Dictionary, Object};
use std::io::Write;

/// Writes a document with a classic cross-reference table.
#[derive(Debug, Clone)]
pub struct PdfWriter {
    version: String,
    serializer: ObjectSerializer,
}

impl PdfWriter {
    /// Writer emitting `%PDF-{version}`.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            serializer: ObjectSerializer::compact(),
        }
    }

    /// Build the complete file.
    pub fn write(&self, doc: &Renumbered) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        writeln!(output, "%PDF-{}", self.version)?;
        output.extend_from_slice(BINARY_MARKER);

        let mut offsets = Vec::with_capacity(doc.objects.len());
        for (i, object) in doc.objects.iter().enumerate() {
            offsets.push(output.len());
            self.serializer.write_indirect(&mut output, i as u32 + 1, 0, object)?;
        }

        let xref_start = output.len();
        let size = doc.objects.len() + 1;
        writeln!(output, "xref")?;
        writeln!(output, "0 {}", size)?;
        // Each entry is exactly 20 bytes including the two-byte line end
        output.extend_from_slice(b"0000000000 65535 f\r\n");
        for offset in &offsets {
            write!(output, "{:010} 00000 n\r\n", offset)?;
        }

        let trailer: Dictionary = doc.trailer_entries(size).into_iter().collect();
        writeln!(output, "trailer")?;
        self.serializer.write_object(&mut output, &Object::Dictionary(trailer))?;
        writeln!(output)?;
        writeln!(output, "startxref")?;
        writeln!(output, "{}", xref_start)?;
        writeln!(output, "%%EOF")?;

        Ok(output)
    }
}
