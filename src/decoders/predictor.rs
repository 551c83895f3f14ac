//! PNG and TIFF predictors (`/DecodeParms /Predictor`).
//!
//! Cross-reference streams written by most producers use PNG Up (12) with
//! `/Columns` equal to the entry width, so that case matters most.

use crate::error::{Error, Result};
use crate::object::Dictionary;

/// Decode parameters for Flate and LZW.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeParams {
    /// 1 = none, 2 = TIFF, 10-15 = PNG
    pub predictor: i64,
    /// Samples per row
    pub columns: usize,
    /// Color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
    /// LZW code-width switch one code early (PDF default)
    pub early_change: bool,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
            early_change: true,
        }
    }
}

impl DecodeParams {
    /// Read parameters from a `/DecodeParms` dictionary, defaulting absent keys.
    pub fn from_dict(dict: &Dictionary) -> Self {
        let int = |key: &str, default: i64| {
            dict.get(key)
                .and_then(|o| o.as_integer())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        };
        Self {
            predictor: int("Predictor", 1),
            columns: int("Columns", 1) as usize,
            colors: int("Colors", 1) as usize,
            bits_per_component: int("BitsPerComponent", 8) as usize,
            early_change: dict.get("EarlyChange").and_then(|o| o.as_integer()) != Some(0),
        }
    }

    /// Bytes of sample data per row.
    fn row_bytes(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Bytes per complete pixel, at least 1.
    fn pixel_bytes(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }
}

/// Undo the predictor described by `params`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff(data, params),
        10..=15 => decode_png(data, params),
        other => Err(Error::Decode(format!("unsupported predictor {}", other))),
    }
}

/// TIFF predictor 2 for 8-bit components.
fn decode_tiff(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    if params.bits_per_component != 8 {
        return Err(Error::Decode(format!(
            "TIFF predictor with {} bits per component",
            params.bits_per_component
        )));
    }
    let row_len = params.row_bytes();
    let bpp = params.colors;
    let mut output = data.to_vec();
    for row in output.chunks_mut(row_len) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    Ok(output)
}

/// PNG predictors: every row starts with a tag byte selecting the algorithm.
fn decode_png(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.row_bytes();
    let bpp = params.pixel_bytes();
    let stride = row_len + 1;

    if data.len() % stride != 0 {
        log::warn!(
            "PNG predictor data length {} is not a multiple of row size {}, dropping partial row",
            data.len(),
            stride
        );
    }

    let mut output: Vec<u8> = Vec::with_capacity(data.len() / stride * row_len);
    let mut prior = vec![0u8; row_len];

    for encoded in data.chunks_exact(stride) {
        let tag = encoded[0];
        let mut row = encoded[1..].to_vec();

        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = prior[i];
            let up_left = if i >= bpp { prior[i - bpp] } else { 0 };
            let predicted = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => return Err(Error::Decode(format!("invalid PNG predictor tag {}", other))),
            };
            row[i] = row[i].wrapping_add(predicted);
        }

        output.extend_from_slice(&row);
        prior = row;
    }

    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
