//! Image codecs (DCT, JPX, CCITTFax, JBIG2).
//!
//! Pages are copied structurally, so image payloads never need decoding; the
//! bytes are carried through as they are.

use crate::decoders::StreamDecoder;
use crate::error::Result;

/// Returns its input unchanged.
pub struct PassThroughDecoder {
    /// Filter name
    pub name: &'static str,
}

impl StreamDecoder for PassThroughDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(input.to_vec())
    }

    fn name(&self) -> &str {
        self.name
    }
}
