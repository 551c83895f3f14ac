//! Stream filters.
//!
//! Streams are kept encoded in the object table and copied byte-for-byte; a
//! filter chain only has to be *run* for structural streams (object streams,
//! cross-reference streams) and when a caller asks for decoded content. Every
//! filter name is still checked when a document is loaded so an unknown filter
//! fails the load with [`Error::UnsupportedFilter`] instead of travelling into
//! the output.
//!
//! Supported:
//! - FlateDecode (zlib/deflate), the one nearly every PDF uses
//! - LZWDecode, ASCIIHexDecode, ASCII85Decode, RunLengthDecode
//! - PNG and TIFF predictors via `/DecodeParms`
//! - DCTDecode, JPXDecode, CCITTFaxDecode, JBIG2Decode: image codecs, carried
//!   through untouched
//!
//! `/Crypt` is rejected; this crate does not handle encrypted documents.

use crate::error::{Error, Result};
use crate::parser_config::ParseOptions;

mod ascii85;
mod ascii_hex;
mod flate;
mod image;
mod lzw;
mod predictor;
mod runlength;

pub use ascii_hex::AsciiHexDecoder;
pub use ascii85::Ascii85Decoder;
pub use flate::{FlateDecoder, flate_encode};
pub use image::PassThroughDecoder;
pub use lzw::LzwDecoder;
pub use predictor::{DecodeParams, decode_predictor};
pub use runlength::RunLengthDecoder;

/// A filter this crate recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// FlateDecode (zlib/deflate)
    Flate,
    /// LZWDecode
    Lzw,
    /// ASCIIHexDecode
    AsciiHex,
    /// ASCII85Decode
    Ascii85,
    /// RunLengthDecode
    RunLength,
    /// Image codec whose payload is kept encoded (DCT, JPX, CCITTFax, JBIG2)
    Image(&'static str),
}

impl Filter {
    /// Look up a filter by its `/Filter` name, including the abbreviated forms
    /// allowed in inline images.
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(match name {
            "FlateDecode" | "Fl" => Filter::Flate,
            "LZWDecode" | "LZW" => Filter::Lzw,
            "ASCIIHexDecode" | "AHx" => Filter::AsciiHex,
            "ASCII85Decode" | "A85" => Filter::Ascii85,
            "RunLengthDecode" | "RL" => Filter::RunLength,
            "DCTDecode" | "DCT" => Filter::Image("DCTDecode"),
            "JPXDecode" => Filter::Image("JPXDecode"),
            "CCITTFaxDecode" | "CCF" => Filter::Image("CCITTFaxDecode"),
            "JBIG2Decode" => Filter::Image("JBIG2Decode"),
            other => return Err(Error::UnsupportedFilter(other.to_string())),
        })
    }

    fn decoder(self, params: Option<&DecodeParams>, max_output: usize) -> Box<dyn StreamDecoder> {
        match self {
            Filter::Flate => Box::new(FlateDecoder::with_limit(max_output)),
            Filter::Lzw => Box::new(LzwDecoder {
                early_change: params.map_or(true, |p| p.early_change),
            }),
            Filter::AsciiHex => Box::new(AsciiHexDecoder),
            Filter::Ascii85 => Box::new(Ascii85Decoder),
            Filter::RunLength => Box::new(RunLengthDecoder),
            Filter::Image(name) => Box::new(PassThroughDecoder { name }),
        }
    }
}

/// A single filter algorithm.
pub trait StreamDecoder {
    /// Decode `input`.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Filter name as written in `/Filter` (e.g. "FlateDecode").
    fn name(&self) -> &str;
}

/// Fail with `UnsupportedFilter` if any name in the chain is unknown.
pub fn check_filters(filters: &[String]) -> Result<()> {
    filters.iter().try_for_each(|name| Filter::from_name(name).map(|_| ()))
}

/// Decode `data` through `filters` without decode parameters.
///
/// ```
/// use pdf_forge::decoders::{decode_stream, flate_encode};
///
/// let compressed = flate_encode(b"BT /F1 12 Tf (Hi) Tj ET").unwrap();
/// let decoded = decode_stream(&compressed, &["FlateDecode".to_string()]).unwrap();
/// assert_eq!(decoded, b"BT /F1 12 Tf (Hi) Tj ET");
/// ```
pub fn decode_stream(data: &[u8], filters: &[String]) -> Result<Vec<u8>> {
    decode_stream_with_options(data, filters, &[], &ParseOptions::default())
}

/// Decode `data` through `filters`, applying per-filter predictor parameters
/// and the decompression limits in `options`.
///
/// `params[i]` belongs to `filters[i]`; a short slice means no parameters for
/// the remaining filters. Decoding stops at an image codec, whose payload is
/// returned still encoded.
pub fn decode_stream_with_options(
    data: &[u8],
    filters: &[String],
    params: &[Option<DecodeParams>],
    options: &ParseOptions,
) -> Result<Vec<u8>> {
    let mut current = data.to_vec();
    let max_output = output_limit(data.len(), options);

    for (i, name) in filters.iter().enumerate() {
        let filter = Filter::from_name(name)?;
        let filter_params = params.get(i).and_then(Option::as_ref);

        if let Filter::Image(codec) = filter {
            log::debug!("Stopping filter chain at image codec {}", codec);
            break;
        }

        current = filter.decoder(filter_params, max_output).decode(&current)?;

        if let Some(p) = filter_params {
            if matches!(filter, Filter::Flate | Filter::Lzw) && p.predictor > 1 {
                current = decode_predictor(&current, p)?;
            }
        }

        check_limits(data.len(), current.len(), options)?;
    }

    Ok(current)
}

/// Decoded size past which [`check_limits`] must fail, 0 when unbounded.
/// Passed to inflating decoders so they stop early.
fn output_limit(encoded: usize, options: &ParseOptions) -> usize {
    let by_size = match options.max_decompressed_size {
        0 => usize::MAX,
        size => size,
    };
    let by_ratio = if options.max_decompression_ratio > 0 && encoded > 0 {
        let ratio = options.max_decompression_ratio as usize + 1;
        encoded.saturating_mul(ratio).max(RATIO_FLOOR)
    } else {
        usize::MAX
    };
    match by_size.min(by_ratio) {
        usize::MAX => 0,
        limit => limit,
    }
}

/// Streams decoding to at most this many bytes are exempt from the ratio limit.
const RATIO_FLOOR: usize = 1024 * 1024;

fn check_limits(encoded: usize, decoded: usize, options: &ParseOptions) -> Result<()> {
    if options.max_decompression_ratio > 0 && encoded > 0 {
        let ratio = decoded as u64 / encoded as u64;
        // Tiny streams legitimately exceed the ratio (a few bytes of zlib
        // expanding a blank page), so only enforce it past 1 MiB.
        if ratio > u64::from(options.max_decompression_ratio) && decoded > RATIO_FLOOR {
            return Err(Error::Decode(format!(
                "decompression ratio {}:1 exceeds limit {}:1",
                ratio, options.max_decompression_ratio
            )));
        }
    }
    if options.max_decompressed_size > 0 && decoded > options.max_decompressed_size {
        return Err(Error::Decode(format!(
            "decoded size {} bytes exceeds limit {} bytes",
            decoded, options.max_decompressed_size
        )));
    }
    Ok(())
}
