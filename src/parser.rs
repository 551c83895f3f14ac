//! PDF object parser.
//!
//! Combines lexer tokens into objects. Two entry points:
//!
//! - [`parse_object`] parses one direct object (nom style, used for object
//!   stream members, trailers and everything nested).
//! - [`parse_indirect_object`] parses `n g obj ... endobj` at a byte offset of
//!   the whole file, including a stream body when the object has one.
//!
//! Stream bodies are read outside nom because the outcome depends on the
//! buffer as a whole: a `/Length` that runs past the end of the file is a
//! [`TruncatedStream`](crate::error::Error::TruncatedStream), not a syntax error.

use crate::error::{Error, Result};
use crate::lexer::{Token, token};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::parser_config::ParseOptions;
use nom::IResult;

/// Default array/dictionary nesting limit for [`parse_object`].
pub const DEFAULT_MAX_NESTING: usize = 256;

/// Decode escape sequences in PDF literal strings (ISO 32000-1, 7.3.4.2).
///
/// ```
/// # use pdf_forge::parser::decode_literal_string_escapes;
/// let decoded = decode_literal_string_escapes(b"Section \\247 (a\\)b)");
/// assert_eq!(decoded, b"Section \xa7 (a)b)");
/// ```
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 >= raw.len() {
            result.push(raw[i]);
            i += 1;
            continue;
        }

        let escaped = raw[i + 1];
        i += 2;
        match escaped {
            b'n' => result.push(b'\n'),
            b'r' => result.push(b'\r'),
            b't' => result.push(b'\t'),
            b'b' => result.push(0x08),
            b'f' => result.push(0x0C),
            b'(' | b')' | b'\\' => result.push(escaped),
            // Line continuation
            b'\n' => {},
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut code = u32::from(escaped - b'0');
                let mut digits = 1;
                while digits < 3 {
                    match raw.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            code = code * 8 + u32::from(d - b'0');
                            i += 1;
                            digits += 1;
                        },
                        _ => break,
                    }
                }
                result.push((code & 0xFF) as u8);
            },
            // Unknown escape: the backslash is dropped
            other => result.push(other),
        }
    }

    result
}

/// Decode a hex string body to bytes.
///
/// Whitespace is ignored and an odd final digit is padded with 0.
///
/// ```
/// # use pdf_forge::parser::decode_hex;
/// assert_eq!(decode_hex(b"48 65 6C 6C 6F"), b"Hello");
/// assert_eq!(decode_hex(b"901FA"), vec![0x90, 0x1F, 0xA0]);
/// ```
pub fn decode_hex(hex_bytes: &[u8]) -> Vec<u8> {
    let digits: Vec<u8> = hex_bytes
        .iter()
        .filter_map(|&c| (c as char).to_digit(16).map(|d| d as u8))
        .collect();

    digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

/// Parse a direct PDF object from input bytes.
///
/// Handles every object type. `<int> <int> R` is read as a reference.
/// A dictionary followed by `stream` is returned as a plain dictionary with
/// the input positioned at the `stream` keyword; stream bodies belong to
/// [`parse_indirect_object`].
///
/// ```
/// use pdf_forge::object::Object;
/// use pdf_forge::parser::parse_object;
///
/// let (_, obj) = parse_object(b"[ 1 2 /Name 4 0 R ]").unwrap();
/// assert_eq!(obj.as_array().unwrap().len(), 4);
/// ```
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    parse_nested(input, DEFAULT_MAX_NESTING)
}

/// [`parse_object`] with an explicit nesting limit.
pub fn parse_object_limited(input: &[u8], max_nesting: usize) -> IResult<&[u8], Object> {
    parse_nested(input, max_nesting)
}

fn parse_nested(input: &[u8], depth_left: usize) -> IResult<&[u8], Object> {
    let (rest, tok) = token(input)?;

    match tok {
        Token::Null => Ok((rest, Object::Null)),
        Token::True => Ok((rest, Object::Boolean(true))),
        Token::False => Ok((rest, Object::Boolean(false))),
        Token::Integer(i) => {
            if let Ok((after_gen, Token::Integer(gen))) = token(rest) {
                if let Ok((after_r, Token::R)) = token(after_gen) {
                    if let (Ok(id), Ok(gen)) = (u32::try_from(i), u16::try_from(gen)) {
                        return Ok((after_r, Object::Reference(ObjectRef::new(id, gen))));
                    }
                }
            }
            Ok((rest, Object::Integer(i)))
        },
        Token::Real(r) => Ok((rest, Object::Real(r))),
        Token::LiteralString(raw) => Ok((rest, Object::String(decode_literal_string_escapes(raw)))),
        Token::HexString(raw) => Ok((rest, Object::String(decode_hex(raw)))),
        Token::Name(name) => Ok((rest, Object::Name(name))),
        Token::ArrayStart | Token::DictStart if depth_left == 0 => Err(nom::Err::Failure(
            nom::error::Error::new(input, nom::error::ErrorKind::TooLarge),
        )),
        Token::ArrayStart => parse_array(rest, depth_left - 1),
        Token::DictStart => {
            let (rest, dict) = parse_dictionary(rest, depth_left - 1)?;
            Ok((rest, Object::Dictionary(dict)))
        },
        _ => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))),
    }
}

/// Parse array elements up to the closing `]`.
fn parse_array(input: &[u8], depth_left: usize) -> IResult<&[u8], Object> {
    let mut items = Vec::new();
    let mut remaining = input;

    loop {
        if let Ok((rest, Token::ArrayEnd)) = token(remaining) {
            return Ok((rest, Object::Array(items)));
        }
        let (rest, item) = parse_nested(remaining, depth_left)?;
        items.push(item);
        remaining = rest;
    }
}

/// Parse `/Key value` pairs up to the closing `>>`.
fn parse_dictionary(input: &[u8], depth_left: usize) -> IResult<&[u8], Dictionary> {
    let mut dict = Dictionary::new();
    let mut remaining = input;

    loop {
        let (rest, tok) = token(remaining)?;
        match tok {
            Token::DictEnd => return Ok((rest, dict)),
            Token::Name(key) => {
                let (rest, value) = parse_nested(rest, depth_left)?;
                // A null value is equivalent to an absent key
                if !value.is_null() {
                    dict.insert(key, value);
                }
                remaining = rest;
            },
            _ => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    remaining,
                    nom::error::ErrorKind::Tag,
                )));
            },
        }
    }
}

/// An indirect object as read from the file.
#[derive(Debug, Clone)]
pub struct ParsedObject {
    /// Identity from the `n g obj` header
    pub id: ObjectRef,
    /// The object; stream data is still encoded
    pub object: Object,
    /// Stream whose `/Length` is an indirect reference: the body was found by
    /// scanning for `endstream` and must be trimmed once the length is known.
    pub deferred_length: Option<DeferredLength>,
}

/// Stream body whose length could not be read from the stream dictionary.
#[derive(Debug, Clone, Copy)]
pub struct DeferredLength {
    /// Object holding the length
    pub length_ref: ObjectRef,
    /// Bytes between the start of the body and the end of the file
    pub available: usize,
}

/// Parse the indirect object starting at `offset` in `buffer`.
///
/// # Errors
///
/// - `MalformedDocument` if the bytes at `offset` are not `n g obj <object>`
/// - `TruncatedStream` if a direct `/Length` runs past the end of `buffer`
pub fn parse_indirect_object(
    buffer: &[u8],
    offset: usize,
    options: &ParseOptions,
) -> Result<ParsedObject> {
    let input = buffer
        .get(offset..)
        .ok_or_else(|| Error::malformed(format!("object offset {} is past end of file", offset)))?;

    let (body, id) = parse_object_header(input)
        .map_err(|_| Error::malformed(format!("no object header at byte {}", offset)))?;

    let (rest, object) = parse_object_limited(body, options.max_nesting)
        .map_err(|e| nom_to_error(buffer, e, &format!("object {}", id)))?;

    let (rest, object, deferred_length) = match (object, token(rest)) {
        (Object::Dictionary(dict), Ok((after_kw, Token::StreamStart))) => {
            let body = read_stream_body(buffer, after_kw, &dict, id, options)?;
            let object = Object::Stream {
                dict,
                data: bytes::Bytes::copy_from_slice(body.data),
            };
            (body.rest, object, body.deferred)
        },
        (object, _) => (rest, object, None),
    };

    if !matches!(token(rest), Ok((_, Token::ObjEnd))) {
        log::warn!("Object {} at byte {} is missing endobj", id, offset);
    }

    Ok(ParsedObject {
        id,
        object,
        deferred_length,
    })
}

/// Parse `n g obj`.
fn parse_object_header(input: &[u8]) -> IResult<&[u8], ObjectRef> {
    let bad = |i| nom::Err::Error(nom::error::Error::new(i, nom::error::ErrorKind::Tag));

    let (rest, id) = match token(input)? {
        (rest, Token::Integer(id)) => (rest, id),
        _ => return Err(bad(input)),
    };
    let (rest, gen) = match token(rest)? {
        (rest, Token::Integer(gen)) => (rest, gen),
        _ => return Err(bad(input)),
    };
    let (rest, _) = match token(rest)? {
        (rest, Token::ObjStart) => (rest, ()),
        _ => return Err(bad(input)),
    };
    match (u32::try_from(id), u16::try_from(gen)) {
        (Ok(id), Ok(gen)) => Ok((rest, ObjectRef::new(id, gen))),
        _ => Err(bad(input)),
    }
}

struct StreamBody<'a> {
    data: &'a [u8],
    rest: &'a [u8],
    deferred: Option<DeferredLength>,
}

/// Read the bytes between `stream<EOL>` and `endstream`.
fn read_stream_body<'a>(
    buffer: &'a [u8],
    after_keyword: &'a [u8],
    dict: &Dictionary,
    id: ObjectRef,
    options: &ParseOptions,
) -> Result<StreamBody<'a>> {
    // ISO 32000-1, 7.3.8.1: `stream` is followed by CRLF or LF. A lone CR is
    // tolerated.
    let input = if let Some(rest) = after_keyword.strip_prefix(b"\r\n") {
        rest
    } else if let Some(rest) = after_keyword.strip_prefix(b"\n") {
        rest
    } else if let Some(rest) = after_keyword.strip_prefix(b"\r") {
        log::warn!("Stream {} keyword followed by CR alone", id);
        rest
    } else {
        log::warn!("Stream {} has no end-of-line after the stream keyword", id);
        after_keyword
    };

    match dict.get("Length") {
        Some(Object::Integer(length)) if *length >= 0 => {
            let length = *length as usize;
            if length > input.len() {
                return Err(Error::TruncatedStream {
                    object: id,
                    declared: length,
                    available: input.len(),
                });
            }
            if let Ok((rest, Token::StreamEnd)) = token(&input[length..]) {
                return Ok(StreamBody {
                    data: &input[..length],
                    rest,
                    deferred: None,
                });
            }
            if options.strict {
                return Err(Error::malformed(format!(
                    "stream {} /Length {} does not end at endstream",
                    id, length
                )));
            }
            log::warn!("Stream {} /Length {} is wrong, scanning for endstream", id, length);
            scan_stream_body(buffer, input, id, None)
        },
        Some(Object::Reference(length_ref)) => {
            let deferred = DeferredLength {
                length_ref: *length_ref,
                available: input.len(),
            };
            scan_stream_body(buffer, input, id, Some(deferred))
        },
        _ => {
            if options.strict {
                return Err(Error::malformed(format!("stream {} has no usable /Length", id)));
            }
            log::warn!("Stream {} has no usable /Length, scanning for endstream", id);
            scan_stream_body(buffer, input, id, None)
        },
    }
}

/// Find the body by locating the next `endstream` keyword.
fn scan_stream_body<'a>(
    buffer: &'a [u8],
    input: &'a [u8],
    id: ObjectRef,
    deferred: Option<DeferredLength>,
) -> Result<StreamBody<'a>> {
    const KEYWORD: &[u8] = b"endstream";

    let pos = input
        .windows(KEYWORD.len())
        .position(|window| window == KEYWORD)
        .ok_or_else(|| {
            Error::malformed(format!(
                "stream {} at byte {} has no endstream",
                id,
                buffer.len() - input.len()
            ))
        })?;

    // The EOL before endstream is not part of the data
    let mut data = &input[..pos];
    if let Some(stripped) = data.strip_suffix(b"\r\n") {
        data = stripped;
    } else if let Some(stripped) = data.strip_suffix(b"\n").or_else(|| data.strip_suffix(b"\r")) {
        data = stripped;
    }

    Ok(StreamBody {
        data,
        rest: &input[pos + KEYWORD.len()..],
        deferred,
    })
}

/// Convert a nom failure into `MalformedDocument` with the failing byte offset.
pub(crate) fn nom_to_error(buffer: &[u8], err: nom::Err<nom::error::Error<&[u8]>>, what: &str) -> Error {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let offset = buffer.len().saturating_sub(e.input.len());
            if e.code == nom::error::ErrorKind::TooLarge {
                Error::malformed(format!("{} nests too deeply (byte {})", what, offset))
            } else {
                Error::malformed(format!("cannot parse {} at byte {}", what, offset))
            }
        },
        nom::Err::Incomplete(_) => Error::malformed(format!("{} ends unexpectedly", what)),
    }
}
