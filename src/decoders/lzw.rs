//! LZWDecode via `weezl`.
//!
//! PDF LZW is MSB-first with 9-bit initial codes. With `/EarlyChange 1` (the
//! default) the code width grows one code early, which is the TIFF variant in
//! weezl.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use weezl::{BitOrder, decode::Decoder};

/// LZWDecode filter implementation.
pub struct LzwDecoder {
    /// `/EarlyChange` from the decode parameters
    pub early_change: bool,
}

impl StreamDecoder for LzwDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = if self.early_change {
            Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
        } else {
            Decoder::new(BitOrder::Msb, 8)
        };
        decoder
            .decode(input)
            .map_err(|e| Error::Decode(format!("LZWDecode: {:?}", e)))
    }

    fn name(&self) -> &str {
        "LZWDecode"
    }
}
