//! Cross-reference data.
//!
//! The cross-reference data maps object numbers to where the object lives: a
//! byte offset for a plain indirect object, or (object stream, index) for an
//! object packed into an object stream. Both forms are read here:
//!
//! - classic tables (`xref` keyword, 20-byte entries, `trailer` dictionary)
//! - cross-reference streams (`/Type /XRef`, binary rows described by `/W`)
//!
//! Incremental updates chain sections through `/Prev`; hybrid files point from a
//! classic trailer to a stream through `/XRefStm`. The newest section wins for
//! any object number listed in more than one.

use crate::error::{Error, Result};
use crate::lexer::{Token, skip_ws, token};
use crate::object::{Dictionary, Object};
use crate::parser::{nom_to_error, parse_indirect_object, parse_object_limited};
use crate::parser_config::ParseOptions;
use byteorder::{BigEndian, ByteOrder};
use nom::IResult;
use nom::bytes::complete::take_while1;
use nom::character::complete::{one_of, space1};
use nom::combinator::map_res;
use nom::sequence::tuple;
use std::collections::{HashMap, HashSet};

/// How far back from the end of the file `startxref` is searched for.
const STARTXREF_WINDOW: usize = 2048;

/// Where an object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Unused object number
    Free,
    /// Indirect object at a byte offset
    InUse {
        /// Byte offset of `n g obj`
        offset: usize,
        /// Generation number
        generation: u16,
    },
    /// Object packed into an object stream (generation is always 0)
    Compressed {
        /// Object number of the containing `/Type /ObjStm` stream
        stream_id: u32,
        /// Position within the stream
        index: u32,
    },
}

impl XRefEntry {
    /// True for entries that locate an object.
    pub fn is_in_use(&self) -> bool {
        !matches!(self, XRefEntry::Free)
    }
}

/// Merged view over every cross-reference section of a file.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    pub(crate) entries: HashMap<u32, XRefEntry>,
    trailer: Dictionary,
}

impl CrossRefTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trailer dictionary of the newest section, completed with keys only
    /// older sections carry.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Entry for `id`.
    pub fn get(&self, id: u32) -> Option<&XRefEntry> {
        self.entries.get(&id)
    }

    /// Record `entry` for `id`, replacing any existing entry.
    pub fn insert(&mut self, id: u32, entry: XRefEntry) {
        self.entries.insert(id, entry);
    }

    /// Object numbers with an in-use entry, ascending.
    pub fn in_use_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_in_use())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Number of entries, free ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no entries were read.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold in an older section: its entries only fill object numbers this
    /// table does not list, and its trailer only fills absent keys.
    pub fn merge_older(&mut self, older: CrossRefTable) {
        for (id, entry) in older.entries {
            self.entries.entry(id).or_insert(entry);
        }
        for (key, value) in older.trailer {
            if key != "Prev" && key != "XRefStm" {
                self.trailer.entry(key).or_insert(value);
            }
        }
    }

    /// Fold in the stream section of a hybrid file. Its entries take the place
    /// of free or missing entries in the classic table.
    fn merge_hybrid(&mut self, stream: CrossRefTable) {
        for (id, entry) in stream.entries {
            match self.entries.get(&id) {
                Some(existing) if existing.is_in_use() => {},
                _ => {
                    self.entries.insert(id, entry);
                },
            }
        }
    }
}

/// Byte offset named by the last `startxref` in the final 2 KiB of `buffer`.
pub fn find_xref_offset(buffer: &[u8]) -> Result<usize> {
    const KEYWORD: &[u8] = b"startxref";

    let tail_start = buffer.len().saturating_sub(STARTXREF_WINDOW);
    let tail = &buffer[tail_start..];
    let pos = tail
        .windows(KEYWORD.len())
        .rposition(|window| window == KEYWORD)
        .ok_or_else(|| Error::malformed("startxref not found near end of file"))?;

    match token(&tail[pos + KEYWORD.len()..]) {
        Ok((_, Token::Integer(offset))) if offset >= 0 => Ok(offset as usize),
        _ => Err(Error::malformed("startxref is not followed by a byte offset")),
    }
}

/// Read the section at `offset` and every older section reachable through
/// `/Prev` and `/XRefStm`.
pub fn parse_xref(buffer: &[u8], offset: usize, options: &ParseOptions) -> Result<CrossRefTable> {
    let mut visited = HashSet::new();
    let mut merged: Option<CrossRefTable> = None;
    let mut next = Some(offset);

    while let Some(section_offset) = next.take() {
        if !visited.insert(section_offset) {
            return Err(Error::malformed(format!(
                "cross-reference /Prev chain loops back to byte {}",
                section_offset
            )));
        }
        if visited.len() > options.max_xref_chain {
            return Err(Error::malformed(format!(
                "more than {} cross-reference sections",
                options.max_xref_chain
            )));
        }

        let mut section = parse_section(buffer, section_offset, options)?;

        if let Some(stm_offset) = offset_entry(&section.trailer, "XRefStm") {
            if visited.insert(stm_offset) {
                log::debug!("Hybrid file: reading /XRefStm at byte {}", stm_offset);
                let stream = parse_xref_stream(buffer, stm_offset, options)?;
                section.merge_hybrid(stream);
            }
        }

        next = offset_entry(&section.trailer, "Prev");

        match merged.as_mut() {
            Some(newer) => newer.merge_older(section),
            None => merged = Some(section),
        }
    }

    let mut table = merged.ok_or_else(|| Error::malformed("no cross-reference section"))?;
    // Chain links are consumed here
    table.trailer.remove("Prev");
    table.trailer.remove("XRefStm");
    Ok(table)
}

fn offset_entry(trailer: &Dictionary, key: &str) -> Option<usize> {
    trailer
        .get(key)
        .and_then(Object::as_integer)
        .and_then(|v| usize::try_from(v).ok())
}

/// Read one section, classic or stream, without following `/Prev`.
fn parse_section(buffer: &[u8], offset: usize, options: &ParseOptions) -> Result<CrossRefTable> {
    let input = buffer.get(offset..).ok_or_else(|| {
        Error::malformed(format!("cross-reference offset {} is past end of file", offset))
    })?;

    if skip_ws(input).starts_with(b"xref") {
        log::debug!("Classic cross-reference table at byte {}", offset);
        parse_classic_table(buffer, offset, options)
    } else {
        log::debug!("Cross-reference stream at byte {}", offset);
        parse_xref_stream(buffer, offset, options)
    }
}

/// Parse a classic table:
///
/// ```text
/// xref
/// 0 3
/// 0000000000 65535 f
/// 0000000017 00000 n
/// 0000000081 00000 n
/// trailer
/// << /Size 3 /Root 1 0 R >>
/// ```
fn parse_classic_table(buffer: &[u8], offset: usize, options: &ParseOptions) -> Result<CrossRefTable> {
    let mut input = skip_ws(&buffer[offset..]);
    input = input
        .strip_prefix(b"xref")
        .ok_or_else(|| Error::malformed(format!("expected xref keyword at byte {}", offset)))?;

    let mut table = CrossRefTable::new();

    loop {
        input = skip_ws(input);

        if let Some(rest) = input.strip_prefix(b"trailer") {
            let (_, trailer) = parse_object_limited(rest, options.max_nesting)
                .map_err(|e| nom_to_error(buffer, e, "trailer"))?;
            table.trailer = match trailer {
                Object::Dictionary(dict) => dict,
                other => {
                    return Err(Error::malformed(format!(
                        "trailer is a {}, not a dictionary",
                        other.type_name()
                    )));
                },
            };
            return Ok(table);
        }

        let (rest, start, count) = subsection_header(input).ok_or_else(|| {
            Error::malformed(format!(
                "bad cross-reference subsection at byte {}",
                buffer.len() - input.len()
            ))
        })?;
        // A classic entry is at least 18 bytes
        if count > rest.len() / 18 + 1 {
            return Err(Error::malformed(format!(
                "cross-reference subsection claims {} entries",
                count
            )));
        }
        input = rest;

        for i in 0..count {
            let (rest, (entry_offset, generation, flag)) = classic_entry(skip_ws(input))
                .map_err(|e| nom_to_error(buffer, e, "cross-reference entry"))?;
            input = rest;

            let id = u32::try_from(start + i)
                .map_err(|_| Error::malformed("object number out of range in xref"))?;
            let entry = match flag {
                'n' => XRefEntry::InUse {
                    offset: entry_offset,
                    generation,
                },
                _ => XRefEntry::Free,
            };
            // First occurrence within a section wins
            table.entries.entry(id).or_insert(entry);
        }
    }
}

fn subsection_header(input: &[u8]) -> Option<(&[u8], usize, usize)> {
    let (rest, start) = match token(input).ok()? {
        (rest, Token::Integer(v)) if v >= 0 => (rest, v as usize),
        _ => return None,
    };
    match token(rest).ok()? {
        (rest, Token::Integer(v)) if v >= 0 => Some((rest, start, v as usize)),
        _ => None,
    }
}

/// `oooooooooo ggggg n|f`, tolerant of entry widths other than 10/5.
fn classic_entry(input: &[u8]) -> IResult<&[u8], (usize, u16, char)> {
    let (rest, (offset, _, generation, _, flag)) = tuple((
        map_res(take_while1(|c: u8| c.is_ascii_digit()), ascii_number::<usize>),
        space1,
        map_res(take_while1(|c: u8| c.is_ascii_digit()), ascii_number::<u16>),
        space1,
        one_of("nf"),
    ))(input)?;
    Ok((rest, (offset, generation, flag)))
}

fn ascii_number<T: std::str::FromStr>(digits: &[u8]) -> std::result::Result<T, ()> {
    std::str::from_utf8(digits)
        .map_err(|_| ())?
        .parse()
        .map_err(|_| ())
}

/// Parse a cross-reference stream. The stream dictionary doubles as the
/// trailer.
fn parse_xref_stream(buffer: &[u8], offset: usize, options: &ParseOptions) -> Result<CrossRefTable> {
    let parsed = parse_indirect_object(buffer, offset, options)?;
    let stream = parsed.object;
    let dict = match &stream {
        Object::Stream { dict, .. } => dict,
        other => {
            return Err(Error::malformed(format!(
                "cross-reference at byte {} is a {}, not a stream",
                offset,
                other.type_name()
            )));
        },
    };
    if let Some(kind) = stream.dict_type() {
        if kind != "XRef" {
            return Err(Error::malformed(format!("expected /Type /XRef, found /Type /{}", kind)));
        }
    }

    let widths = field_widths(dict)?;
    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(Error::malformed("cross-reference stream /W describes empty rows"));
    }

    let ranges = index_ranges(dict)?;
    let data = stream.decode_stream_data_with_options(options)?;

    let rows_needed: usize = ranges.iter().map(|(_, count)| *count).sum();
    if rows_needed.saturating_mul(row_len) > data.len() {
        return Err(Error::malformed(format!(
            "cross-reference stream holds {} bytes, /Index needs {} rows of {}",
            data.len(),
            rows_needed,
            row_len
        )));
    }

    let mut table = CrossRefTable::new();
    let mut rows = data.chunks_exact(row_len);
    for (start, count) in ranges {
        for (i, row) in rows.by_ref().take(count).enumerate() {
            let id = u32::try_from(start + i)
                .map_err(|_| Error::malformed("object number out of range in xref stream"))?;
            let (kind, rest) = read_field(row, widths[0], 1);
            let (second, rest) = read_field(rest, widths[1], 0);
            let (third, _) = read_field(rest, widths[2], 0);

            let entry = match kind {
                0 => XRefEntry::Free,
                1 => XRefEntry::InUse {
                    offset: usize::try_from(second)
                        .map_err(|_| Error::malformed("xref stream offset out of range"))?,
                    generation: u16::try_from(third).unwrap_or(u16::MAX),
                },
                2 => XRefEntry::Compressed {
                    stream_id: u32::try_from(second)
                        .map_err(|_| Error::malformed("object stream number out of range"))?,
                    index: u32::try_from(third)
                        .map_err(|_| Error::malformed("object stream index out of range"))?,
                },
                other => {
                    log::debug!("Object {} has xref entry type {}, treating as free", id, other);
                    XRefEntry::Free
                },
            };
            table.entries.entry(id).or_insert(entry);
        }
    }

    table.trailer = dict.clone();
    table.trailer.remove("Length");
    table.trailer.remove("Filter");
    table.trailer.remove("DecodeParms");
    Ok(table)
}

fn field_widths(dict: &Dictionary) -> Result<[usize; 3]> {
    let w = dict
        .get("W")
        .and_then(Object::as_array)
        .ok_or_else(|| Error::malformed("cross-reference stream has no /W"))?;
    if w.len() != 3 {
        return Err(Error::malformed(format!("/W has {} entries, expected 3", w.len())));
    }
    let mut widths = [0usize; 3];
    for (slot, value) in widths.iter_mut().zip(w) {
        *slot = match value.as_integer() {
            Some(v @ 0..=8) => v as usize,
            _ => return Err(Error::malformed("/W field width must be 0 to 8 bytes")),
        };
    }
    Ok(widths)
}

/// `/Index [start count ...]`, defaulting to `[0 /Size]`.
fn index_ranges(dict: &Dictionary) -> Result<Vec<(usize, usize)>> {
    let non_negative = |obj: &Object| {
        obj.as_integer()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| Error::malformed("/Index entries must be non-negative integers"))
    };

    match dict.get("Index") {
        Some(Object::Array(items)) => {
            if items.len() % 2 != 0 {
                return Err(Error::malformed("/Index has an odd number of entries"));
            }
            items
                .chunks_exact(2)
                .map(|pair| Ok((non_negative(&pair[0])?, non_negative(&pair[1])?)))
                .collect()
        },
        Some(_) => Err(Error::malformed("/Index is not an array")),
        None => {
            let size = dict
                .get("Size")
                .ok_or_else(|| Error::malformed("cross-reference stream has no /Size"))?;
            Ok(vec![(0, non_negative(size)?)])
        },
    }
}

/// Read a big-endian field of `width` bytes; a zero-width field takes `default`.
fn read_field(row: &[u8], width: usize, default: u64) -> (u64, &[u8]) {
    if width == 0 {
        (default, row)
    } else {
        (BigEndian::read_uint(&row[..width], width), &row[width..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::flate_encode;

    // ========================================================================
    // Locating startxref
    // ========================================================================

    #[test]
    fn test_find_xref_offset() {
        let pdf = b"%PDF-1.4\nxref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 >>\nstartxref\n9\n%%EOF\n";
        assert_eq!(find_xref_offset(pdf).unwrap(), 9);
    }

    #[test]
    fn test_find_xref_offset_uses_last_occurrence() {
        let pdf = b"startxref\n1\n%%EOF\nstartxref\n\r\n  42\n%%EOF";
        assert_eq!(find_xref_offset(pdf).unwrap(), 42);
    }

    #[test]
    fn test_find_xref_offset_missing() {
        assert!(matches!(find_xref_offset(b"%PDF-1.4\n"), Err(Error::MalformedDocument(_))));
        assert!(matches!(find_xref_offset(b"startxref\n%%EOF"), Err(Error::MalformedDocument(_))));
    }

    // ========================================================================
    // Classic tables
    // ========================================================================

    #[test]
    fn test_classic_table_subsections() {
        let data = b"xref\n0 2\n0000000000 65535 f\r\n0000000015 00000 n\r\n5 1\n0000000200 00002 n \ntrailer\n<< /Size 6 /Root 1 0 R >>\n";
        let table = parse_xref(data, 0, &ParseOptions::default()).unwrap();
        assert_eq!(table.get(0), Some(&XRefEntry::Free));
        assert_eq!(table.get(1), Some(&XRefEntry::InUse { offset: 15, generation: 0 }));
        assert_eq!(table.get(5), Some(&XRefEntry::InUse { offset: 200, generation: 2 }));
        assert_eq!(table.in_use_ids(), vec![1, 5]);
        assert_eq!(table.trailer().get("Size").and_then(Object::as_integer), Some(6));
    }

    #[test]
    fn test_classic_table_bad_entry() {
        let data = b"xref\n0 2\n0000000000 65535 f\n00000000x5 00000 n\ntrailer\n<<>>\n";
        assert!(matches!(
            parse_xref(data, 0, &ParseOptions::default()),
            Err(Error::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_classic_table_missing_trailer() {
        let data = b"xref\n0 1\n0000000000 65535 f\n";
        assert!(parse_xref(data, 0, &ParseOptions::default()).is_err());
    }

    #[test]
    fn test_classic_table_absurd_count() {
        let data = b"xref\n0 99999999\n0000000000 65535 f\ntrailer\n<<>>\n";
        assert!(parse_xref(data, 0, &ParseOptions::default()).is_err());
    }

    #[test]
    fn test_prev_chain_newest_wins() {
        let mut data = b"xref\n0 3\n0000000000 65535 f\n0000000100 00000 n\n0000000200 00000 n\ntrailer\n<< /Size 3 /Root 1 0 R /Info 9 0 R >>\n".to_vec();
        let second = data.len();
        data.extend_from_slice(b"xref\n2 1\n0000000300 00000 n\ntrailer\n<< /Size 3 /Root 1 0 R /Prev 0 >>\n");
        let table = parse_xref(&data, second, &ParseOptions::default()).unwrap();
        assert_eq!(table.get(1), Some(&XRefEntry::InUse { offset: 100, generation: 0 }));
        assert_eq!(table.get(2), Some(&XRefEntry::InUse { offset: 300, generation: 0 }));
        // Keys missing from the newest trailer come from older ones
        assert!(table.trailer().contains_key("Info"));
        assert!(!table.trailer().contains_key("Prev"));
    }

    #[test]
    fn test_prev_loop_rejected() {
        let data = b"xref\n0 1\n0000000000 65535 f\ntrailer\n<< /Size 1 /Prev 0 >>\n";
        assert!(matches!(
            parse_xref(data, 0, &ParseOptions::default()),
            Err(Error::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_chain_limit() {
        let mut data = Vec::new();
        let mut prev: Option<usize> = None;
        for _ in 0..5 {
            let start = data.len();
            let trailer = match prev {
                Some(p) => format!("<< /Size 1 /Prev {} >>", p),
                None => "<< /Size 1 >>".to_string(),
            };
            data.extend_from_slice(format!("xref\n0 1\n0000000000 65535 f\ntrailer\n{}\n", trailer).as_bytes());
            prev = Some(start);
        }
        let options = ParseOptions {
            max_xref_chain: 3,
            ..ParseOptions::default()
        };
        assert!(parse_xref(&data, prev.unwrap(), &options).is_err());
        assert!(parse_xref(&data, prev.unwrap(), &ParseOptions::default()).is_ok());
    }

    // ========================================================================
    // Cross-reference streams
    // ========================================================================

    fn xref_stream(rows: &[u8], extra: &str, compress: bool) -> Vec<u8> {
        let (body, filter) = if compress {
            (flate_encode(rows).unwrap(), "/Filter /FlateDecode")
        } else {
            (rows.to_vec(), "")
        };
        let mut out = format!(
            "7 0 obj\n<< /Type /XRef /W [1 2 1] /Size 4 /Length {} {} {} >>\nstream\n",
            body.len(),
            filter,
            extra
        )
        .into_bytes();
        out.extend_from_slice(&body);
        out.extend_from_slice(b"\nendstream\nendobj\n");
        out
    }

    #[test]
    fn test_xref_stream_entry_types() {
        let rows = [0, 0, 0, 255, 1, 0, 15, 0, 2, 0, 6, 3, 1, 1, 0, 0];
        let data = xref_stream(&rows, "/Root 1 0 R", true);
        let table = parse_xref(&data, 0, &ParseOptions::default()).unwrap();
        assert_eq!(table.get(0), Some(&XRefEntry::Free));
        assert_eq!(table.get(1), Some(&XRefEntry::InUse { offset: 15, generation: 0 }));
        assert_eq!(table.get(2), Some(&XRefEntry::Compressed { stream_id: 6, index: 3 }));
        assert_eq!(table.get(3), Some(&XRefEntry::InUse { offset: 256, generation: 0 }));
        assert!(table.trailer().contains_key("Root"));
        assert!(!table.trailer().contains_key("Filter"));
    }

    #[test]
    fn test_xref_stream_index_ranges() {
        let rows = [1, 0, 40, 0, 1, 0, 80, 0];
        let data = xref_stream(&rows, "/Index [10 1 20 1]", false);
        let table = parse_xref(&data, 0, &ParseOptions::default()).unwrap();
        assert_eq!(table.in_use_ids(), vec![10, 20]);
    }

    #[test]
    fn test_xref_stream_short_data() {
        let rows = [1, 0, 40, 0];
        let data = xref_stream(&rows, "", false);
        assert!(matches!(
            parse_xref(&data, 0, &ParseOptions::default()),
            Err(Error::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_zero_width_type_defaults_to_in_use() {
        let mut dict = Dictionary::new();
        dict.insert(
            "W".to_string(),
            Object::Array(vec![Object::Integer(0), Object::Integer(2), Object::Integer(0)]),
        );
        assert_eq!(field_widths(&dict).unwrap(), [0, 2, 0]);
        let (kind, rest) = read_field(&[0, 9], 0, 1);
        assert_eq!(kind, 1);
        assert_eq!(read_field(rest, 2, 0).0, 9);
    }

    #[test]
    fn test_field_width_limits() {
        let mut dict = Dictionary::new();
        dict.insert(
            "W".to_string(),
            Object::Array(vec![Object::Integer(1), Object::Integer(9), Object::Integer(1)]),
        );
        assert!(field_widths(&dict).is_err());
        dict.insert("W".to_string(), Object::Array(vec![Object::Integer(1)]));
        assert!(field_widths(&dict).is_err());
    }

    #[test]
    fn test_hybrid_stream_fills_free_entries() {
        let stream = xref_stream(&[1, 0, 0, 0, 2, 0, 9, 0, 2, 0, 9, 1, 0, 0, 0, 0], "", false);
        let table_offset = stream.len();
        let mut data = stream;
        data.extend_from_slice(
            b"xref\n0 3\n0000000000 65535 f\n0000000500 00000 n\n0000000000 65535 f\ntrailer\n<< /Size 4 /XRefStm 0 >>\n",
        );
        let table = parse_xref(&data, table_offset, &ParseOptions::default()).unwrap();
        // The classic entry for 1 stays; 2 comes from the stream
        assert_eq!(table.get(1), Some(&XRefEntry::InUse { offset: 500, generation: 0 }));
        assert_eq!(table.get(2), Some(&XRefEntry::Compressed { stream_id: 9, index: 1 }));
        assert_eq!(table.trailer().get("Size"), Some(&Object::Integer(4)));
        assert!(!table.trailer().contains_key("XRefStm"));
    }

    #[test]
    fn test_offset_past_end() {
        assert!(matches!(
            parse_xref(b"xref", 100, &ParseOptions::default()),
            Err(Error::MalformedDocument(_))
        ));
    }
}
