//! Parser configuration.

use serde::{Deserialize, Serialize};

/// Options controlling how strictly input is parsed and which resource limits
/// apply.
///
/// # Example
///
/// ```
/// use pdf_forge::parser_config::ParseOptions;
///
/// let strict = ParseOptions::strict();
/// assert!(strict.strict);
///
/// let custom = ParseOptions {
///     max_xref_chain: 16,
///     ..ParseOptions::default()
/// };
/// assert!(!custom.strict);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Reject streams whose `/Length` is missing or wrong instead of locating
    /// the body by scanning for `endstream`.
    pub strict: bool,

    /// Maximum array/dictionary nesting depth.
    pub max_nesting: usize,

    /// Maximum number of cross-reference sections followed through `/Prev`
    /// and `/XRefStm`.
    pub max_xref_chain: usize,

    /// Maximum `/N` accepted for an object stream.
    pub max_objects_per_stream: usize,

    /// Maximum decompression ratio (decoded:encoded). 0 disables the check.
    pub max_decompression_ratio: u32,

    /// Maximum decoded stream size in bytes. 0 disables the check.
    pub max_decompressed_size: usize,

    /// Maximum input size in bytes. 0 disables the check.
    pub max_file_size: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::lenient()
    }
}

impl ParseOptions {
    /// Strict mode: stream bodies must match their declared `/Length`.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::lenient()
        }
    }

    /// Lenient mode: recover from wrong stream lengths, missing `endobj`, and
    /// a lone CR after the `stream` keyword.
    pub fn lenient() -> Self {
        Self {
            strict: false,
            max_nesting: crate::parser::DEFAULT_MAX_NESTING,
            max_xref_chain: 100,
            max_objects_per_stream: 1_000_000,
            max_decompression_ratio: 100,
            max_decompressed_size: 100 * 1024 * 1024,
            max_file_size: 0,
        }
    }
}
