//! Error types for structural PDF editing.
//!
//! Every public operation returns [`Result`]. Failures are terminal for the call
//! that raised them; nothing is retried internally. Hosts that need to branch on
//! the failure (show a "pick another file" prompt, map to an exit code) should
//! use [`Error::kind`] rather than matching on message text.

use crate::object::ObjectRef;
use serde::{Deserialize, Serialize};

/// Result type alias for pdf_forge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while parsing, editing, or writing a PDF.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The container structure (header, trailer, cross-reference data, page tree)
    /// is missing or cannot be understood.
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// A stream declares a filter this crate cannot decode or copy.
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// A stream declares more bytes than the buffer holds.
    #[error("Truncated stream in object {object}: declared {declared} bytes, {available} available")]
    TruncatedStream {
        /// Object whose stream body is short
        object: ObjectRef,
        /// Value of the stream's /Length
        declared: usize,
        /// Bytes actually present
        available: usize,
    },

    /// A reference points at an object absent from the document's table.
    #[error("Dangling reference: {0}")]
    DanglingReference(ObjectRef),

    /// A chain of references loops back on itself.
    #[error("Circular reference detected: object {0}")]
    CircularReference(ObjectRef),

    /// A page number is outside the document.
    #[error("Page {index} is out of range (document has {page_count} pages)")]
    IndexOutOfRange {
        /// Requested 1-based page number
        index: i64,
        /// Number of pages in the source document
        page_count: usize,
    },

    /// A page selection contained no pages.
    #[error("No pages selected")]
    EmptySelection,

    /// A page range whose start comes after its end.
    #[error("Invalid page range: start {start} is after end {end}")]
    InvalidRange {
        /// 1-based first page
        start: u32,
        /// 1-based last page
        end: u32,
    },

    /// Rotation delta that is not a multiple of 90 degrees.
    #[error("Invalid rotation: {0} degrees is not a multiple of 90")]
    InvalidRotation(i32),

    /// The document is encrypted.
    #[error("Encrypted documents are not supported")]
    Encrypted,

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`].
///
/// This is what crosses host boundaries (worker messages, wasm, process exit
/// codes): it is `Copy` and serializes as its variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Structurally invalid or unreadable input
    MalformedDocument,
    /// Filter that cannot be handled
    UnsupportedFilter,
    /// Stream shorter than declared
    TruncatedStream,
    /// Reference to a missing object
    DanglingReference,
    /// Page number outside the document
    IndexOutOfRange,
    /// Nothing selected
    EmptySelection,
    /// start > end
    InvalidRange,
    /// Rotation not a multiple of 90
    InvalidRotation,
    /// Encrypted input
    Encrypted,
    /// Host I/O failure
    Io,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedDocument(_) | Error::CircularReference(_) | Error::Decode(_) => {
                ErrorKind::MalformedDocument
            },
            Error::UnsupportedFilter(_) => ErrorKind::UnsupportedFilter,
            Error::TruncatedStream { .. } => ErrorKind::TruncatedStream,
            Error::DanglingReference(_) => ErrorKind::DanglingReference,
            Error::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            Error::EmptySelection => ErrorKind::EmptySelection,
            Error::InvalidRange { .. } => ErrorKind::InvalidRange,
            Error::InvalidRotation(_) => ErrorKind::InvalidRotation,
            Error::Encrypted => ErrorKind::Encrypted,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedDocument(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_document_error() {
        let err = Error::malformed("startxref not found");
        let msg = format!("{}", err);
        assert!(msg.contains("Malformed document"));
        assert!(msg.contains("startxref"));
        assert_eq!(err.kind(), ErrorKind::MalformedDocument);
    }

    #[test]
    fn test_truncated_stream_error() {
        let err = Error::TruncatedStream {
            object: ObjectRef::new(7, 0),
            declared: 500,
            available: 12,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("7 0 R"));
        assert!(msg.contains("500"));
        assert!(msg.contains("12"));
    }

    #[test]
    fn test_dangling_reference_error() {
        let err = Error::DanglingReference(ObjectRef::new(10, 0));
        assert!(format!("{}", err).contains("10 0 R"));
        assert_eq!(err.kind(), ErrorKind::DanglingReference);
    }

    #[test]
    fn test_index_out_of_range_error() {
        let err = Error::IndexOutOfRange {
            index: 11,
            page_count: 10,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("11"));
        assert!(msg.contains("10 pages"));
    }

    #[test]
    fn test_circular_reference_reports_as_malformed() {
        let err = Error::CircularReference(ObjectRef::new(3, 0));
        assert_eq!(err.kind(), ErrorKind::MalformedDocument);
    }

    #[test]
    fn test_error_kind_serializes_as_name() {
        let json = serde_json::to_string(&ErrorKind::InvalidRange).unwrap();
        assert_eq!(json, "\"InvalidRange\"");
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
