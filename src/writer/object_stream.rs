//! Object-stream output (PDF 1.5+).
//!
//! Non-stream objects are packed, `objects_per_stream` at a time, into
//! Flate-compressed `/ObjStm` streams. Streams stay top-level objects. The
//! file ends with a cross-reference stream instead of a classic table:
//!
//! ```text
//! objects 1..=n            (streams written in place)
//! n+1 ..= n+k              object streams
//! n+k+1                    /Type /XRef, /W [1 w 2]
//! ```

use super::object_serializer::ObjectSerializer;
use super::{BINARY_MARKER, Renumbered};
use crate::decoders::flate_encode;
use crate::error::Result;
use crate::object::{Dictionary, Object};
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use std::io::Write;

#[derive(Debug, Clone, Copy)]
enum Entry {
    Free,
    InUse(usize),
    Packed { stream: u32, index: u32 },
}

/// Writes a document using object streams and a cross-reference stream.
#[derive(Debug, Clone)]
pub struct ObjectStreamWriter {
    version: String,
    per_stream: usize,
    serializer: ObjectSerializer,
}

impl ObjectStreamWriter {
    /// Writer emitting `%PDF-{version}` and at most `per_stream` objects per
    /// object stream.
    pub fn new(version: impl Into<String>, per_stream: usize) -> Self {
        Self {
            version: version.into(),
            per_stream: per_stream.max(1),
            serializer: ObjectSerializer::compact(),
        }
    }

    /// Build the complete file.
    pub fn write(&self, doc: &Renumbered) -> Result<Vec<u8>> {
        let count = doc.objects.len();
        let packable: Vec<u32> = doc
            .objects
            .iter()
            .enumerate()
            .filter(|(_, o)| !matches!(o, Object::Stream { .. }))
            .map(|(i, _)| i as u32 + 1)
            .collect();
        let groups: Vec<&[u32]> = packable.chunks(self.per_stream).collect();

        let xref_id = (count + groups.len() + 1) as u32;
        let size = xref_id as usize + 1;
        let mut entries = vec![Entry::Free; size];

        let mut output = Vec::new();
        writeln!(output, "%PDF-{}", self.version)?;
        output.extend_from_slice(BINARY_MARKER);

        for (i, object) in doc.objects.iter().enumerate() {
            if let Object::Stream { .. } = object {
                let id = i as u32 + 1;
                entries[id as usize] = Entry::InUse(output.len());
                self.serializer.write_indirect(&mut output, id, 0, object)?;
            }
        }

        for (g, members) in groups.iter().enumerate() {
            let stream_id = (count + g + 1) as u32;
            let stream = self.pack(doc, members)?;
            entries[stream_id as usize] = Entry::InUse(output.len());
            self.serializer.write_indirect(&mut output, stream_id, 0, &stream)?;
            for (index, id) in members.iter().enumerate() {
                entries[*id as usize] = Entry::Packed {
                    stream: stream_id,
                    index: index as u32,
                };
            }
        }

        let xref_offset = output.len();
        entries[xref_id as usize] = Entry::InUse(xref_offset);
        let xref_stream = self.xref_stream(doc, &entries, size)?;
        self.serializer.write_indirect(&mut output, xref_id, 0, &xref_stream)?;

        writeln!(output, "startxref")?;
        writeln!(output, "{}", xref_offset)?;
        writeln!(output, "%%EOF")?;

        log::debug!(
            "Packed {} objects into {} object streams",
            packable.len(),
            groups.len()
        );
        Ok(output)
    }

    /// One `/ObjStm` holding `members`.
    fn pack(&self, doc: &Renumbered, members: &[u32]) -> Result<Object> {
        let mut header = Vec::new();
        let mut body = Vec::new();
        for id in members {
            if !header.is_empty() {
                header.push(b' ');
            }
            write!(header, "{} {}", id, body.len())?;
            self.serializer.write_object(&mut body, &doc.objects[*id as usize - 1])?;
            body.push(b'\n');
        }
        header.push(b'\n');

        let first = header.len();
        header.extend_from_slice(&body);
        let data = flate_encode(&header)?;

        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::name("ObjStm"));
        dict.insert("N".to_string(), Object::Integer(members.len() as i64));
        dict.insert("First".to_string(), Object::Integer(first as i64));
        dict.insert("Filter".to_string(), Object::name("FlateDecode"));
        Ok(Object::Stream {
            dict,
            data: Bytes::from(data),
        })
    }

    fn xref_stream(&self, doc: &Renumbered, entries: &[Entry], size: usize) -> Result<Object> {
        let max_offset = entries
            .iter()
            .map(|e| match e {
                Entry::InUse(offset) => *offset as u64,
                Entry::Packed { stream, .. } => u64::from(*stream),
                Entry::Free => 0,
            })
            .max()
            .unwrap_or(0);
        let max_third = entries
            .iter()
            .map(|e| match e {
                Entry::Packed { index, .. } => u64::from(*index),
                _ => 0xFFFF,
            })
            .max()
            .unwrap_or(0xFFFF);
        let widths = [1, byte_width(max_offset).max(4), byte_width(max_third).max(2)];

        let row = widths.iter().sum::<usize>();
        let mut data = vec![0u8; row * entries.len()];
        for (chunk, entry) in data.chunks_exact_mut(row).zip(entries) {
            let (kind, second, third) = match *entry {
                Entry::Free => (0, 0, 0xFFFF),
                Entry::InUse(offset) => (1, offset as u64, 0),
                Entry::Packed { stream, index } => (2, u64::from(stream), u64::from(index)),
            };
            chunk[0] = kind;
            BigEndian::write_uint(&mut chunk[1..1 + widths[1]], second, widths[1]);
            BigEndian::write_uint(&mut chunk[1 + widths[1]..], third, widths[2]);
        }

        let mut dict: Dictionary = doc.trailer_entries(size).into_iter().collect();
        dict.insert("Type".to_string(), Object::name("XRef"));
        dict.insert(
            "W".to_string(),
            Object::Array(widths.iter().map(|w| Object::Integer(*w as i64)).collect()),
        );
        dict.insert("Filter".to_string(), Object::name("FlateDecode"));
        Ok(Object::Stream {
            dict,
            data: Bytes::from(flate_encode(&data)?),
        })
    }
}

/// Bytes needed to hold `value` big-endian, at least 1.
fn byte_width(value: u64) -> usize {
    (8 - value.leading_zeros() as usize / 8).max(1)
}
