//! Object streams (`/Type /ObjStm`).
//!
//! An object stream packs several non-stream objects into one (usually
//! compressed) stream:
//!
//! ```text
//! 12 0 obj
//! << /Type /ObjStm /N 2 /First 9 /Filter /FlateDecode /Length ... >>
//! stream
//! 3 0 4 11 << /Type /Page ... >> [0 0 612 792]
//! endstream
//! ```
//!
//! The header before `/First` holds `/N` pairs of (object number, offset from
//! `/First`); the objects follow without `obj`/`endobj` wrappers.

use crate::error::{Error, Result};
use crate::lexer::{Token, token};
use crate::object::{Dictionary, Object};
use crate::parser::parse_object_limited;
use crate::parser_config::ParseOptions;

/// Objects unpacked from one object stream, in header order.
#[derive(Debug, Clone, Default)]
pub struct ObjectStreamContents {
    /// (object number, object) for every member that parsed
    pub members: Vec<(u32, Object)>,
}

impl ObjectStreamContents {
    /// Member stored at header position `index`.
    pub fn get_index(&self, index: usize) -> Option<&(u32, Object)> {
        self.members.get(index)
    }
}

/// Decode and unpack `stream`, an object stream.
///
/// A member whose offset or body is unreadable is skipped with a warning; the
/// stream as a whole fails only when its dictionary or header is unusable.
pub fn parse_object_stream(stream: &Object, options: &ParseOptions) -> Result<ObjectStreamContents> {
    let dict = match stream {
        Object::Stream { dict, .. } => dict,
        other => {
            return Err(Error::malformed(format!(
                "object stream is a {}, not a stream",
                other.type_name()
            )));
        },
    };
    if let Some(kind) = stream.dict_type() {
        if kind != "ObjStm" {
            return Err(Error::malformed(format!("expected /Type /ObjStm, found /Type /{}", kind)));
        }
    }

    let (count, first) = header_params(dict, options)?;
    let decoded = stream.decode_stream_data_with_options(options)?;
    if decoded.len() < first {
        return Err(Error::malformed(format!(
            "object stream holds {} bytes but /First is {}",
            decoded.len(),
            first
        )));
    }

    let (header, body) = decoded.split_at(first);
    let pairs = read_header_pairs(header, count)?;

    let mut members = Vec::with_capacity(pairs.len());
    for (id, offset) in pairs {
        let Some(member) = body.get(offset..) else {
            log::warn!("Object {} offset {} is beyond object stream data", id, offset);
            continue;
        };
        match parse_object_limited(member, options.max_nesting) {
            Ok((_, object)) => members.push((id, object)),
            Err(e) => log::warn!("Skipping unreadable object {} in object stream: {:?}", id, e),
        }
    }

    Ok(ObjectStreamContents { members })
}

fn header_params(dict: &Dictionary, options: &ParseOptions) -> Result<(usize, usize)> {
    let count = dict
        .get("N")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::malformed("object stream has no /N"))?;
    let first = dict
        .get("First")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::malformed("object stream has no /First"))?;

    let count = usize::try_from(count)
        .ok()
        .filter(|n| *n <= options.max_objects_per_stream)
        .ok_or_else(|| Error::malformed(format!("object stream /N {} out of range", count)))?;
    let first = usize::try_from(first)
        .map_err(|_| Error::malformed(format!("object stream /First {} is negative", first)))?;
    Ok((count, first))
}

/// Read `count` (object number, offset) pairs.
fn read_header_pairs(header: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut pairs = Vec::with_capacity(count.min(header.len() / 4 + 1));
    let mut input = header;

    for i in 0..count {
        let (rest, id) = header_integer(input)
            .ok_or_else(|| Error::malformed(format!("object stream pair {} has no object number", i)))?;
        let (rest, offset) = header_integer(rest)
            .ok_or_else(|| Error::malformed(format!("object stream pair {} has no offset", i)))?;
        let id = u32::try_from(id)
            .map_err(|_| Error::malformed(format!("object number {} out of range", id)))?;
        pairs.push((id, offset as usize));
        input = rest;
    }

    Ok(pairs)
}

fn header_integer(input: &[u8]) -> Option<(&[u8], u64)> {
    match token(input).ok()? {
        (rest, Token::Integer(v)) if v >= 0 => Some((rest, v as u64)),
        _ => None,
    }
}
