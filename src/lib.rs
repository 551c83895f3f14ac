// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::needless_range_loop)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::should_implement_trait)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # PDF Forge
//!
//! Structural PDF editing in Rust: merge, split, rotate and extract pages
//! without touching page content.
//!
//! ## Core Features
//!
//! - **Parsing**: classic cross-reference tables, cross-reference streams,
//!   hybrid files, incremental updates through `/Prev`, object streams
//! - **Filters**: Flate, LZW, ASCIIHex, ASCII85, RunLength, PNG/TIFF
//!   predictors; image codecs are carried through untouched
//! - **Page graph**: page-tree traversal with inherited attributes, page
//!   copying across documents with fresh object identities
//! - **Output**: only objects reachable from the catalog are written,
//!   renumbered densely from 1, with either a classic table or object streams
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdf_forge::api;
//! use pdf_forge::editor::PageTarget;
//!
//! # fn main() -> pdf_forge::Result<()> {
//! let a = std::fs::read("a.pdf")?;
//! let b = std::fs::read("b.pdf")?;
//!
//! let merged = api::merge(&[a, b])?;
//! let first_three = api::split(&merged, 1, 3)?;
//! let turned = api::rotate(&first_three, PageTarget::All, 90)?;
//! std::fs::write("out.pdf", turned)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Lower-level use
//!
//! ```ignore
//! use pdf_forge::{Document, editor, writer};
//!
//! let doc = Document::parse(&bytes)?;
//! let picked = editor::select_pages(&doc, &[4, 0])?;
//! let out = writer::serialize(&picked, &writer::WriteOptions::compressed())?;
//! ```

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Error handling
pub mod error;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
/// Parser configuration options
pub mod parser_config;
pub mod xref;

// Stream decoders
pub mod decoders;

// Page-graph editing
pub mod editor;

// PDF writing
pub mod writer;

// Byte-buffer operations
pub mod api;

// WASM bindings (optional)
#[cfg(target_arch = "wasm32")]
#[cfg(feature = "wasm")]
pub mod wasm;

// Re-exports
pub use document::Document;
pub use editor::PageTarget;
pub use error::{Error, ErrorKind, Result};
pub use object::{Object, ObjectRef};
pub use parser_config::ParseOptions;
pub use writer::WriteOptions;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
