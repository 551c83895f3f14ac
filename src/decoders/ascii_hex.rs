//! ASCIIHexDecode: pairs of hex digits, whitespace ignored, `>` ends the data.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// ASCIIHexDecode filter implementation.
pub struct AsciiHexDecoder;

impl StreamDecoder for AsciiHexDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() / 2);
        let mut high: Option<u8> = None;

        for &c in input {
            if c == b'>' {
                break;
            }
            if crate::lexer::is_whitespace(c) {
                continue;
            }
            let nibble = (c as char).to_digit(16).ok_or_else(|| {
                Error::Decode(format!("ASCIIHexDecode: invalid hex digit '{}'", c as char))
            })? as u8;
            match high.take() {
                Some(h) => output.push((h << 4) | nibble),
                None => high = Some(nibble),
            }
        }

        // Odd digit count: the last digit is followed by an implicit 0
        if let Some(h) = high {
            output.push(h << 4);
        }
        Ok(output)
    }

    fn name(&self) -> &str {
        "ASCIIHexDecode"
    }
}
