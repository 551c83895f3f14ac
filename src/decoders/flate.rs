//! FlateDecode (zlib/deflate).

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::Compression;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

/// FlateDecode filter implementation.
///
/// Reads a zlib stream. If the zlib wrapper is damaged the payload is retried
/// as raw deflate, and a stream that breaks part-way keeps what was inflated
/// before the break.
///
/// With a nonzero `max_output`, inflation stops one byte past the limit and
/// the stream fails, so an oversized payload is never fully materialized.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlateDecoder {
    /// Largest accepted decoded size in bytes, 0 for no limit
    pub max_output: usize,
}

impl FlateDecoder {
    /// Decoder that fails once output exceeds `max_output` bytes.
    pub fn with_limit(max_output: usize) -> Self {
        Self { max_output }
    }

    fn inflate<R: Read>(&self, reader: R, output: &mut Vec<u8>) -> std::io::Result<usize> {
        let cap = match self.max_output {
            0 => u64::MAX,
            limit => limit as u64 + 1,
        };
        reader.take(cap).read_to_end(output)
    }

    fn check_size(&self, output: &[u8]) -> Result<()> {
        if self.max_output > 0 && output.len() > self.max_output {
            return Err(Error::Decode(format!(
                "FlateDecode output exceeds limit of {} bytes",
                self.max_output
            )));
        }
        Ok(())
    }
}

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let zlib = self.inflate(ZlibDecoder::new(input), &mut output);
        self.check_size(&output)?;
        let zlib_err = match zlib {
            Ok(_) => return Ok(output),
            Err(e) => e,
        };

        if !output.is_empty() {
            log::warn!(
                "FlateDecode recovered {} bytes before corruption: {}",
                output.len(),
                zlib_err
            );
            return Ok(output);
        }

        log::debug!("Zlib decode failed ({}), retrying as raw deflate", zlib_err);
        output.clear();
        let raw = self.inflate(DeflateDecoder::new(input), &mut output);
        self.check_size(&output)?;
        match raw {
            Ok(_) => Ok(output),
            Err(_) if !output.is_empty() => {
                log::warn!("Raw deflate recovered {} bytes before corruption", output.len());
                Ok(output)
            },
            Err(_) => Err(Error::Decode(format!("FlateDecode: {}", zlib_err))),
        }
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

/// Compress `data` as a zlib stream suitable for `/Filter /FlateDecode`.
pub fn flate_encode(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
