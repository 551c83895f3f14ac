//! ASCII85Decode (base-85): five characters `!`..`u` per four bytes, `z` for
//! four zero bytes, `~>` ends the data.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// ASCII85Decode filter implementation.
pub struct Ascii85Decoder;

impl StreamDecoder for Ascii85Decoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() * 4 / 5);
        let mut group = [0u8; 5];
        let mut filled = 0;

        let body = input.strip_prefix(b"<~").unwrap_or(input);
        for &c in body {
            match c {
                b'~' => break,
                b'z' if filled == 0 => output.extend_from_slice(&[0; 4]),
                b'z' => return Err(Error::Decode("ASCII85Decode: 'z' inside a group".to_string())),
                b'!'..=b'u' => {
                    group[filled] = c - b'!';
                    filled += 1;
                    if filled == 5 {
                        output.extend_from_slice(&group_value(&group)?.to_be_bytes());
                        filled = 0;
                    }
                },
                _ if crate::lexer::is_whitespace(c) => {},
                _ => {
                    return Err(Error::Decode(format!(
                        "ASCII85Decode: invalid character '{}'",
                        c as char
                    )));
                },
            }
        }

        match filled {
            0 => {},
            1 => return Err(Error::Decode("ASCII85Decode: lone final character".to_string())),
            n => {
                // Pad with 'u' and keep n - 1 bytes
                group[n..].fill(84);
                output.extend_from_slice(&group_value(&group)?.to_be_bytes()[..n - 1]);
            },
        }
        Ok(output)
    }

    fn name(&self) -> &str {
        "ASCII85Decode"
    }
}

fn group_value(group: &[u8; 5]) -> Result<u32> {
    let value = group
        .iter()
        .fold(0u64, |acc, &digit| acc * 85 + u64::from(digit));
    u32::try_from(value).map_err(|_| Error::Decode("ASCII85Decode: group overflows".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii85_full_group() {
        assert_eq!(Ascii85Decoder.decode(b"<+U,m~>").unwrap(), b"Test");
    }

    #[test]
    fn test_ascii85_partial_group() {
        assert_eq!(Ascii85Decoder.decode(b"88/~>").unwrap(), b"Hi");
    }

    #[test]
    fn test_ascii85_z_and_whitespace() {
        assert_eq!(Ascii85Decoder.decode(b"z\n<+U,m~>").unwrap(), b"\0\0\0\0Test");
    }

    #[test]
    fn test_ascii85_errors() {
        assert!(Ascii85Decoder.decode(b"<+zU,m~>").is_err());
        assert!(Ascii85Decoder.decode(b"<~").is_ok());
        assert_eq!(Ascii85Decoder.decode(b"s8W-!~>").unwrap(), vec![0xFF; 4]);
        assert!(Ascii85Decoder.decode(b"uuuuu~>").is_err());
        assert!(Ascii85Decoder.decode(b"A~>").is_err());
    }
}
