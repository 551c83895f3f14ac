//! PDF serialization.
//!
//! ## Architecture
//!
//! ```text
//! Document
//!     ↓
//! [Renumbered] (reachable objects, numbered 1..=n in walk order)
//!     ↓
//! [PdfWriter] classic xref table   |   [ObjectStreamWriter] /ObjStm + xref stream
//!     ↓
//! [ObjectSerializer] (object syntax)
//!     ↓
//! PDF bytes
//! ```
//!
//! Only objects reachable from `/Root` (then `/Info`) are written, so pages
//! dropped by an edit, together with everything only they used, disappear from
//! the output.

mod object_serializer;
mod object_stream;
mod pdf_writer;

pub use object_serializer::ObjectSerializer;
pub use object_stream::ObjectStreamWriter;
pub use pdf_writer::PdfWriter;

use crate::decoders::flate_encode;
use crate::document::Document;
use crate::error::Result;
use crate::object::{Object, ObjectRef};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lowest version that allows object and cross-reference streams.
const OBJECT_STREAM_VERSION: &str = "1.5";

/// Binary marker comment written after the header line.
pub(crate) const BINARY_MARKER: &[u8] = b"%\xE2\xE3\xCF\xD3\n";

/// Output options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    /// Pack non-stream objects into object streams and write an xref stream
    pub object_streams: bool,
    /// Maximum objects per object stream
    pub objects_per_stream: usize,
    /// Flate-encode streams that carry no filter
    pub compress_streams: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            object_streams: false,
            objects_per_stream: 100,
            compress_streams: false,
        }
    }
}

impl WriteOptions {
    /// Object streams and stream compression both on.
    pub fn compressed() -> Self {
        Self {
            object_streams: true,
            compress_streams: true,
            ..Self::default()
        }
    }

    /// Enable or disable object streams.
    pub fn with_object_streams(mut self, enabled: bool) -> Self {
        self.object_streams = enabled;
        self
    }

    /// Set how many objects go into one object stream (at least 1).
    pub fn with_objects_per_stream(mut self, count: usize) -> Self {
        self.objects_per_stream = count.max(1);
        self
    }

    /// Enable or disable stream compression.
    pub fn with_compress_streams(mut self, enabled: bool) -> Self {
        self.compress_streams = enabled;
        self
    }
}

/// Serialize `doc`.
///
/// The output is byte-identical for identical input and options.
pub fn serialize(doc: &Document, options: &WriteOptions) -> Result<Vec<u8>> {
    let mut renumbered = Renumbered::from_document(doc)?;
    if options.compress_streams {
        renumbered.compress_streams()?;
    }

    let output = if options.object_streams {
        let version = max_version(doc.version(), OBJECT_STREAM_VERSION);
        ObjectStreamWriter::new(version, options.objects_per_stream).write(&renumbered)?
    } else {
        PdfWriter::new(doc.version()).write(&renumbered)?
    };

    log::debug!(
        "Serialized {} objects into {} bytes",
        renumbered.objects.len(),
        output.len()
    );
    Ok(output)
}

fn max_version<'a>(a: &'a str, b: &'a str) -> &'a str {
    let key = |v: &str| {
        let mut parts = v.split('.').map(|p| p.parse::<u32>().unwrap_or(0));
        (parts.next().unwrap_or(0), parts.next().unwrap_or(0))
    };
    if key(a) >= key(b) {
        a
    } else {
        b
    }
}

/// The objects to write, renumbered densely.
///
/// `objects[i]` is object `i + 1`, generation 0. References inside the
/// objects already use the new numbers.
#[derive(Debug, Clone)]
pub struct Renumbered {
    /// Objects in output order
    pub objects: Vec<Object>,
    /// New number of the catalog
    pub root: ObjectRef,
    /// New number of the document information dictionary
    pub info: Option<ObjectRef>,
}

impl Renumbered {
    /// Collect and renumber everything reachable from the catalog and `/Info`.
    pub fn from_document(doc: &Document) -> Result<Self> {
        let root = doc.root()?;
        let mut starts = vec![root];
        starts.extend(doc.info());

        let order = doc.walk_reachable_from(&starts)?;
        let numbers: HashMap<ObjectRef, ObjectRef> = order
            .iter()
            .enumerate()
            .map(|(i, old)| (*old, ObjectRef::new(i as u32 + 1, 0)))
            .collect();

        let mut objects = Vec::with_capacity(order.len());
        for old in &order {
            let Some(object) = doc.get(old) else {
                continue;
            };
            let object = object.clone().map_references(&mut |r| match numbers.get(&r) {
                Some(new) => Object::Reference(*new),
                None => {
                    log::warn!("Reference from {} to missing object {} written as null", old, r);
                    Object::Null
                },
            });
            objects.push(object);
        }

        let lookup = |old: &ObjectRef| {
            numbers
                .get(old)
                .copied()
                .ok_or(crate::error::Error::DanglingReference(*old))
        };
        Ok(Self {
            root: lookup(&root)?,
            info: doc.info().map(|i| lookup(&i)).transpose()?,
            objects,
        })
    }

    /// Flate-encode unfiltered streams where that makes them smaller.
    fn compress_streams(&mut self) -> Result<()> {
        for object in &mut self.objects {
            if let Object::Stream { dict, data } = object {
                if dict.contains_key("Filter") || data.is_empty() {
                    continue;
                }
                let encoded = flate_encode(data)?;
                if encoded.len() < data.len() {
                    dict.insert("Filter".to_string(), Object::name("FlateDecode"));
                    dict.remove("DecodeParms");
                    *data = Bytes::from(encoded);
                }
            }
        }
        Ok(())
    }

    /// Trailer entries shared by both table forms.
    pub(crate) fn trailer_entries(&self, size: usize) -> Vec<(String, Object)> {
        let mut entries = vec![
            ("Size".to_string(), Object::Integer(size as i64)),
            ("Root".to_string(), Object::Reference(self.root)),
        ];
        if let Some(info) = self.info {
            entries.push(("Info".to_string(), Object::Reference(info)));
        }
        entries
    }
}
