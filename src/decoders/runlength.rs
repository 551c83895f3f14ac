//! RunLengthDecode.
//!
//! Length byte 0..=127 copies the next n + 1 bytes, 129..=255 repeats the next
//! byte 257 - n times, 128 ends the data.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// RunLengthDecode filter implementation.
pub struct RunLengthDecoder;

impl StreamDecoder for RunLengthDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut rest = input;

        while let Some((&length, tail)) = rest.split_first() {
            match length {
                128 => break,
                0..=127 => {
                    let count = usize::from(length) + 1;
                    let literal = tail.get(..count).ok_or_else(|| {
                        Error::Decode(format!(
                            "RunLengthDecode: literal run of {} with {} bytes left",
                            count,
                            tail.len()
                        ))
                    })?;
                    output.extend_from_slice(literal);
                    rest = &tail[count..];
                },
                _ => {
                    let (&byte, after) = tail.split_first().ok_or_else(|| {
                        Error::Decode("RunLengthDecode: repeat run without a byte".to_string())
                    })?;
                    output.resize(output.len() + 257 - usize::from(length), byte);
                    rest = after;
                },
            }
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        "RunLengthDecode"
    }
}
