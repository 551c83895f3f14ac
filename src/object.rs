//! PDF object types.
//!
//! Values of the indirect-object graph. A [`Reference`](Object::Reference) is
//! only meaningful relative to the [`Document`](crate::document::Document) whose
//! table it was read from; moving an object into another document means
//! rewriting every reference reachable from it (see [`Object::map_references`]).

use crate::decoders::DecodeParams;
use crate::error::{Error, Result};
use crate::parser_config::ParseOptions;
use std::collections::HashMap;

/// Dictionary payload shared by dictionaries and stream headers.
pub type Dictionary = HashMap<String, Object>;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String (byte array)
    String(Vec<u8>),
    /// Name (starting with /)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs)
    Dictionary(Dictionary),
    /// Stream (dictionary + still-encoded data)
    Stream {
        /// Stream dictionary
        dict: Dictionary,
        /// Stream data exactly as stored in the file
        data: bytes::Bytes,
    },
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Identity of an indirect object: object number and generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

impl From<ObjectRef> for Object {
    fn from(r: ObjectRef) -> Self {
        Object::Reference(r)
    }
}

impl Object {
    /// Build a name object.
    pub fn name(name: &str) -> Self {
        Object::Name(name.to_string())
    }

    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream { .. } => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value of an integer or real.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Mutable dictionary access. Works for both Dictionary and Stream objects.
    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to cast to string (bytes).
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// `/Type` of a dictionary or stream, if present.
    pub fn dict_type(&self) -> Option<&str> {
        self.as_dict()?.get("Type")?.as_name()
    }

    /// Push every reference directly contained in this object onto `out`.
    ///
    /// Dictionary entries are visited in sorted key order and array elements in
    /// order, so the sequence is stable for a given object.
    pub fn collect_references(&self, out: &mut Vec<ObjectRef>) {
        match self {
            Object::Reference(r) => out.push(*r),
            Object::Array(items) => {
                for item in items {
                    item.collect_references(out);
                }
            },
            Object::Dictionary(dict) | Object::Stream { dict, .. } => {
                let mut keys: Vec<&String> = dict.keys().collect();
                keys.sort();
                for key in keys {
                    if let Some(value) = dict.get(key) {
                        value.collect_references(out);
                    }
                }
            },
            _ => {},
        }
    }

    /// Replace every reference inside this object with whatever `f` returns.
    ///
    /// `f` may return another reference (renumbering) or any direct object
    /// (for example `Null` for a reference that must not survive).
    pub fn map_references<F>(self, f: &mut F) -> Object
    where
        F: FnMut(ObjectRef) -> Object,
    {
        match self {
            Object::Reference(r) => f(r),
            Object::Array(items) => {
                Object::Array(items.into_iter().map(|item| item.map_references(f)).collect())
            },
            Object::Dictionary(dict) => Object::Dictionary(map_dict_references(dict, f)),
            Object::Stream { dict, data } => Object::Stream {
                dict: map_dict_references(dict, f),
                data,
            },
            other => other,
        }
    }

    /// Filter names declared by a stream, in application order.
    pub fn stream_filters(&self) -> Vec<String> {
        self.as_dict()
            .and_then(|d| d.get("Filter"))
            .map(extract_filter_names)
            .unwrap_or_default()
    }

    /// Decode stream data using filters specified in the stream dictionary.
    pub fn decode_stream_data(&self) -> Result<Vec<u8>> {
        self.decode_stream_data_with_options(&ParseOptions::default())
    }

    /// Decode stream data, applying the decompression limits in `options`.
    pub fn decode_stream_data_with_options(&self, options: &ParseOptions) -> Result<Vec<u8>> {
        match self {
            Object::Stream { dict, data } => {
                let filters = self.stream_filters();
                if filters.is_empty() {
                    return Ok(data.to_vec());
                }
                let params = extract_decode_params(dict.get("DecodeParms"), filters.len());
                crate::decoders::decode_stream_with_options(data, &filters, &params, options)
            },
            _ => Err(Error::Decode(format!("expected Stream, found {}", self.type_name()))),
        }
    }
}

fn map_dict_references<F>(dict: Dictionary, f: &mut F) -> Dictionary
where
    F: FnMut(ObjectRef) -> Object,
{
    dict.into_iter()
        .map(|(key, value)| (key, value.map_references(f)))
        .collect()
}

/// Extract filter names from a Filter object.
///
/// The Filter entry can be either a single Name or an Array of Names.
fn extract_filter_names(filter_obj: &Object) -> Vec<String> {
    match filter_obj {
        Object::Name(name) => vec![name.clone()],
        Object::Array(arr) => arr
            .iter()
            .filter_map(|obj| obj.as_name().map(|s| s.to_string()))
            .collect(),
        _ => vec![],
    }
}

/// Per-filter decode parameters.
///
/// `/DecodeParms` is a dictionary for a single filter, or an array parallel to
/// the `/Filter` array where `null` marks a filter without parameters.
pub(crate) fn extract_decode_params(
    params_obj: Option<&Object>,
    filter_count: usize,
) -> Vec<Option<DecodeParams>> {
    let mut params = match params_obj {
        Some(Object::Dictionary(d)) => vec![Some(DecodeParams::from_dict(d))],
        Some(Object::Array(arr)) => arr
            .iter()
            .map(|obj| match obj {
                Object::Dictionary(d) => Some(DecodeParams::from_dict(d)),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    params.resize(filter_count, None);
    params
}
