//! PDF lexer (tokenizer).
//!
//! Splits raw PDF bytes into tokens: numbers, literal and hex strings, names,
//! keywords, and delimiters. Whitespace (space, \t, \r, \n, \0, \f) and
//! comments (`%` to end of line) between tokens are skipped.
//!
//! The lexer never interprets structure; `10 0 R` comes out as three tokens
//! and the parser decides it is a reference.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_till, take_while},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, recognize, value},
    sequence::{delimited, pair, preceded},
};

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),
    /// Real number (e.g., 3.14, -2.5, .5)
    Real(f64),
    /// Literal string body, escapes not yet decoded
    LiteralString(&'a [u8]),
    /// Hexadecimal string body, whitespace still present
    HexString(&'a [u8]),
    /// Name with `#XX` escapes decoded (e.g., "Type" from "/Type")
    Name(String),
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// `obj`
    ObjStart,
    /// `endobj`
    ObjEnd,
    /// `stream`
    StreamStart,
    /// `endstream`
    StreamEnd,
    /// `R` in `10 0 R`
    R,
}

/// PDF whitespace characters (ISO 32000-1, Table 1).
pub(crate) fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// PDF delimiter characters (ISO 32000-1, Table 2).
pub(crate) fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

fn fail<T>(input: &[u8], kind: nom::error::ErrorKind) -> IResult<&[u8], T> {
    Err(nom::Err::Error(nom::error::Error::new(input, kind)))
}

/// Parse a comment (% to end of line).
fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip all whitespace and comments. Always succeeds.
pub(crate) fn skip_ws(input: &[u8]) -> &[u8] {
    let mut remaining = input;
    loop {
        let start = remaining.iter().position(|&c| !is_whitespace(c)).unwrap_or(remaining.len());
        remaining = &remaining[start..];
        match comment(remaining) {
            Ok((rest, _)) => remaining = rest,
            Err(_) => return remaining,
        }
    }
}

/// Parse an integer or real number.
///
/// Accepts a leading sign and reals written without an integer part (`.5`)
/// or without a fraction (`5.`).
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, text) = recognize(pair(
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), opt(digit1))))),
            recognize(pair(char('.'), digit1)),
        )),
    ))(input)?;

    // Digits, sign and '.' are ASCII, so this cannot fail
    let text = std::str::from_utf8(text).unwrap_or("0");

    if text.contains('.') {
        match text.parse::<f64>() {
            Ok(r) => Ok((rest, Token::Real(r))),
            Err(_) => fail(input, nom::error::ErrorKind::Float),
        }
    } else {
        match text.parse::<i64>() {
            Ok(i) => Ok((rest, Token::Integer(i))),
            Err(_) => fail(input, nom::error::ErrorKind::Digit),
        }
    }
}

/// Parse a literal string enclosed in parentheses.
///
/// Balanced inner parentheses are part of the string; `\(` and `\)` do not
/// count toward the balance. The raw bytes between the outer parentheses are
/// returned, escapes intact.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (body, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut pos = 0;

    while pos < body.len() {
        match body[pos] {
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&body[pos + 1..], Token::LiteralString(&body[..pos])));
                }
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    // Ran off the end before the closing parenthesis
    fail(input, nom::error::ErrorKind::Eof)
}

/// Parse a hexadecimal string enclosed in angle brackets.
fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return fail(input, nom::error::ErrorKind::Tag);
    }
    delimited(
        char('<'),
        map(take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)), Token::HexString),
        char('>'),
    )(input)
}

/// Decode `#XX` escape sequences in PDF names.
///
/// Invalid sequences are kept literally.
///
/// ```
/// # use pdf_forge::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes(b"A#20B#23C"), "A B#C");
/// assert_eq!(decode_name_escapes(b"Type"), "Type");
/// assert_eq!(decode_name_escapes(b"A#"), "A#");
/// ```
pub fn decode_name_escapes(raw: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            let hex = &raw[i + 1..i + 3];
            let decoded = std::str::from_utf8(hex)
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(byte) = decoded {
                bytes.push(byte);
                i += 3;
                continue;
            }
        }
        bytes.push(raw[i]);
        i += 1;
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Parse a name starting with `/`.
fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(take_while(is_regular), |raw: &[u8]| Token::Name(decode_name_escapes(raw))),
    )(input)
}

/// Parse PDF keywords and delimiters.
///
/// Alphabetic keywords must end at a non-regular character, so `nullify` or
/// `Rx` never lex as `null` or `R`.
fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let delimiter: IResult<&[u8], Token<'_>> = alt((
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
    ))(input);
    if let Ok(result) = delimiter {
        return Ok(result);
    }

    let (rest, word) = take_while(|c: u8| c.is_ascii_alphabetic())(input)?;
    if rest.first().is_some_and(|&c| is_regular(c)) {
        return fail(input, nom::error::ErrorKind::Tag);
    }
    let tok = match word {
        b"true" => Token::True,
        b"false" => Token::False,
        b"null" => Token::Null,
        b"obj" => Token::ObjStart,
        b"endobj" => Token::ObjEnd,
        b"stream" => Token::StreamStart,
        b"endstream" => Token::StreamEnd,
        b"R" => Token::R,
        _ => return fail(input, nom::error::ErrorKind::Tag),
    };
    Ok((rest, tok))
}

/// Parse a single PDF token, skipping leading whitespace and comments.
///
/// # Errors
///
/// Returns `Err` if the input is exhausted or doesn't start with a valid token.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let input = skip_ws(input);
    alt((parse_keyword, parse_name, parse_number, parse_literal_string, parse_hex_string))(input)
}
