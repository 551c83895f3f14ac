//! Byte-buffer operations.
//!
//! Every function here is a self-contained unit: parse the input buffers,
//! edit, serialize, return the new file. Inputs are never modified and no
//! state survives between calls, so independent calls can run on separate
//! threads freely.
//!
//! ```ignore
//! use pdf_forge::api;
//! use pdf_forge::editor::PageTarget;
//!
//! let merged = api::merge(&[first, second])?;
//! let middle = api::split(&merged, 3, 5)?;
//! let turned = api::rotate(&middle, PageTarget::All, 90)?;
//! let picked = api::extract(&turned, &[3, 1, 3])?;
//! ```

use crate::document::Document;
use crate::editor::{PageTarget, merge_documents, rotate_pages, select_pages};
use crate::error::{Error, Result};
use crate::parser_config::ParseOptions;
use crate::writer::{WriteOptions, serialize};
use serde::{Deserialize, Serialize};

/// Options shared by every operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationOptions {
    /// How inputs are parsed
    pub parse: ParseOptions,
    /// How the output is written
    pub write: WriteOptions,
    /// Clamp a split `end` past the last page instead of rejecting it
    pub clamp_split_end: bool,
}

/// Summary of one page, as reported by [`inspect`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    /// 1-based page number
    pub number: u32,
    /// Effective rotation in degrees (0, 90, 180 or 270)
    pub rotation: i32,
    /// Effective media box, if the page has one
    pub media_box: Option<[f64; 4]>,
}

/// Summary of a document, as reported by [`inspect`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// Header version, possibly raised by the catalog
    pub version: String,
    /// Number of pages
    pub page_count: usize,
    /// Number of objects in the file
    pub object_count: usize,
    /// Per-page details in reading order
    pub pages: Vec<PageInfo>,
}

/// Concatenate the pages of `inputs`, in order.
pub fn merge<B: AsRef<[u8]>>(inputs: &[B]) -> Result<Vec<u8>> {
    merge_with_options(inputs, &OperationOptions::default())
}

/// [`merge`] with explicit options.
///
/// A single input that parses is returned byte-for-byte unless `options.write`
/// asks for a different output layout.
pub fn merge_with_options<B: AsRef<[u8]>>(inputs: &[B], options: &OperationOptions) -> Result<Vec<u8>> {
    if inputs.is_empty() {
        return Err(Error::EmptySelection);
    }
    let documents = inputs
        .iter()
        .map(|bytes| Document::parse_with_options(bytes.as_ref(), &options.parse))
        .collect::<Result<Vec<_>>>()?;

    if let [single] = inputs {
        if options.write == WriteOptions::default() {
            log::info!("Merge of one document passes it through unchanged");
            return Ok(single.as_ref().to_vec());
        }
    }

    let merged = merge_documents(&documents)?;
    let output = serialize(&merged, &options.write)?;
    log::info!(
        "Merged {} documents into {} pages ({} bytes)",
        documents.len(),
        merged.page_count(),
        output.len()
    );
    Ok(output)
}

/// Keep pages `start..=end` (1-based).
pub fn split(input: &[u8], start: u32, end: u32) -> Result<Vec<u8>> {
    split_with_options(input, start, end, &OperationOptions::default())
}

/// [`split`] with explicit options.
///
/// # Errors
///
/// - `InvalidRange` if `start` is greater than `end`
/// - `IndexOutOfRange` if `start` is 0 or past the last page, or `end` is
///   past the last page and `clamp_split_end` is off
pub fn split_with_options(
    input: &[u8],
    start: u32,
    end: u32,
    options: &OperationOptions,
) -> Result<Vec<u8>> {
    if start > end {
        return Err(Error::InvalidRange { start, end });
    }
    let doc = Document::parse_with_options(input, &options.parse)?;
    let page_count = doc.page_count();

    if start == 0 || start as usize > page_count {
        return Err(Error::IndexOutOfRange {
            index: i64::from(start),
            page_count,
        });
    }
    let last = if end as usize > page_count {
        if !options.clamp_split_end {
            return Err(Error::IndexOutOfRange {
                index: i64::from(end),
                page_count,
            });
        }
        log::debug!("Clamping split end {} to {}", end, page_count);
        page_count
    } else {
        end as usize
    };

    let indices: Vec<usize> = (start as usize - 1..last).collect();
    let output = serialize(&select_pages(&doc, &indices)?, &options.write)?;
    log::info!("Split pages {}-{} of {} ({} bytes)", start, last, page_count, output.len());
    Ok(output)
}

/// Rotate one page or all pages by `degrees` (a multiple of 90, either sign).
pub fn rotate(input: &[u8], target: PageTarget, degrees: i32) -> Result<Vec<u8>> {
    rotate_with_options(input, target, degrees, &OperationOptions::default())
}

/// [`rotate`] with explicit options.
pub fn rotate_with_options(
    input: &[u8],
    target: PageTarget,
    degrees: i32,
    options: &OperationOptions,
) -> Result<Vec<u8>> {
    let mut doc = Document::parse_with_options(input, &options.parse)?;
    rotate_pages(&mut doc, target, degrees)?;
    let output = serialize(&doc, &options.write)?;
    log::info!("Rotated {:?} by {} degrees ({} bytes)", target, degrees, output.len());
    Ok(output)
}

/// Keep the listed 1-based pages. Order and repeats in `pages` are ignored:
/// the result holds each listed page once, in document order.
pub fn extract(input: &[u8], pages: &[u32]) -> Result<Vec<u8>> {
    extract_with_options(input, pages, &OperationOptions::default())
}

/// [`extract`] with explicit options.
pub fn extract_with_options(input: &[u8], pages: &[u32], options: &OperationOptions) -> Result<Vec<u8>> {
    if pages.is_empty() {
        return Err(Error::EmptySelection);
    }
    let doc = Document::parse_with_options(input, &options.parse)?;
    let page_count = doc.page_count();

    let mut numbers = pages.to_vec();
    numbers.sort_unstable();
    numbers.dedup();
    if let Some(bad) = numbers.iter().find(|&&n| n == 0 || n as usize > page_count) {
        return Err(Error::IndexOutOfRange {
            index: i64::from(*bad),
            page_count,
        });
    }

    let indices: Vec<usize> = numbers.iter().map(|n| *n as usize - 1).collect();
    let output = serialize(&select_pages(&doc, &indices)?, &options.write)?;
    log::info!("Extracted {} of {} pages ({} bytes)", indices.len(), page_count, output.len());
    Ok(output)
}

/// Rewrite the file with object streams and compressed streams, dropping
/// unreachable objects.
pub fn compress(input: &[u8]) -> Result<Vec<u8>> {
    compress_with_options(
        input,
        &OperationOptions {
            write: WriteOptions::compressed(),
            ..OperationOptions::default()
        },
    )
}

/// Parse and re-serialize `input` with `options.write`.
pub fn compress_with_options(input: &[u8], options: &OperationOptions) -> Result<Vec<u8>> {
    let doc = Document::parse_with_options(input, &options.parse)?;
    let output = serialize(&doc, &options.write)?;
    log::info!("Rewrote {} bytes as {} bytes", input.len(), output.len());
    Ok(output)
}

/// Number of pages in `input`.
pub fn page_count(input: &[u8]) -> Result<usize> {
    Ok(Document::parse(input)?.page_count())
}

/// Version, page count and per-page rotation and media box.
pub fn inspect(input: &[u8]) -> Result<DocumentInfo> {
    inspect_with_options(input, &ParseOptions::default())
}

/// [`inspect`] with explicit parse options.
pub fn inspect_with_options(input: &[u8], options: &ParseOptions) -> Result<DocumentInfo> {
    let doc = Document::parse_with_options(input, options)?;
    let pages = doc
        .pages()
        .iter()
        .enumerate()
        .map(|(i, page)| {
            Ok(PageInfo {
                number: i as u32 + 1,
                rotation: doc.page_rotation(page)?,
                media_box: doc.media_box(page)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DocumentInfo {
        version: doc.version().to_string(),
        page_count: doc.page_count(),
        object_count: doc.object_count(),
        pages,
    })
}
