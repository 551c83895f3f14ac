//! WebAssembly bindings.
//!
//! Every function takes and returns plain byte arrays. Failures reject with a
//! string of the form `"<Kind>: <message>"`, so callers can branch on the
//! kind prefix. An argument that does not parse rejects as `InvalidArgument`.

use crate::api;
use crate::editor::PageTarget;
use crate::error::Error;
use js_sys::{Array, Uint8Array};
use wasm_bindgen::prelude::*;

/// Install the panic hook.
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}

fn to_js(e: Error) -> JsValue {
    JsValue::from_str(&format!("{:?}: {}", e.kind(), e))
}

/// Merge an array of `Uint8Array` PDFs, in order.
#[wasm_bindgen(js_name = mergePdfs)]
pub fn merge_pdfs(files: Array) -> Result<Vec<u8>, JsValue> {
    let inputs: Vec<Vec<u8>> = files.iter().map(|file| Uint8Array::new(&file).to_vec()).collect();
    api::merge(&inputs).map_err(to_js)
}

/// Keep pages `start..=end` (1-based).
#[wasm_bindgen(js_name = splitPdf)]
pub fn split_pdf(file: &[u8], start: u32, end: u32) -> Result<Vec<u8>, JsValue> {
    api::split(file, start, end).map_err(to_js)
}

/// Rotate `target`: `"all"` or a 1-based page number.
#[wasm_bindgen(js_name = rotatePdf)]
pub fn rotate_pdf(file: &[u8], target: &str, degrees: i32) -> Result<Vec<u8>, JsValue> {
    let target: PageTarget = target
        .parse()
        .map_err(|msg| JsValue::from_str(&format!("InvalidArgument: {}", msg)))?;
    api::rotate(file, target, degrees).map_err(to_js)
}

/// Keep the listed 1-based pages, once each, in document order.
#[wasm_bindgen(js_name = extractPages)]
pub fn extract_pages(file: &[u8], pages: Vec<u32>) -> Result<Vec<u8>, JsValue> {
    api::extract(file, &pages).map_err(to_js)
}

/// Rewrite with object streams and compressed streams.
#[wasm_bindgen(js_name = compressPdf)]
pub fn compress_pdf(file: &[u8]) -> Result<Vec<u8>, JsValue> {
    api::compress(file).map_err(to_js)
}

/// Number of pages.
#[wasm_bindgen(js_name = pageCount)]
pub fn page_count(file: &[u8]) -> Result<u32, JsValue> {
    api::page_count(file).map(|n| n as u32).map_err(to_js)
}
