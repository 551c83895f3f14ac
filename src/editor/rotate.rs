//! Page rotation.

use crate::document::Document;
use crate::editor::{PageTarget, normalize_rotation};
use crate::error::{Error, Result};
use crate::object::Object;

/// Add `degrees` to the effective rotation of the targeted pages.
///
/// The result is written as the page's own `/Rotate`, so an inherited value
/// stops applying to that page. Nothing else on the page changes.
///
/// # Errors
///
/// - `InvalidRotation` if `degrees` is not a multiple of 90
/// - `IndexOutOfRange` if a single target page is not in the document
pub fn rotate_pages(doc: &mut Document, target: PageTarget, degrees: i32) -> Result<()> {
    if degrees % 90 != 0 {
        return Err(Error::InvalidRotation(degrees));
    }

    let pages = match target {
        PageTarget::All => doc.pages().to_vec(),
        PageTarget::Page(number) => {
            let page_count = doc.page_count();
            let index = (number as usize)
                .checked_sub(1)
                .filter(|i| *i < page_count)
                .ok_or(Error::IndexOutOfRange {
                    index: i64::from(number),
                    page_count,
                })?;
            vec![doc.page(index)?]
        },
    };

    for page in pages {
        let current = doc.page_rotation(&page)?;
        let rotated = normalize_rotation(i64::from(current) + i64::from(degrees));
        let dict = doc
            .get_mut(&page)
            .and_then(Object::as_dict_mut)
            .ok_or_else(|| Error::malformed(format!("page {} is not a dictionary", page)))?;
        dict.insert("Rotate".to_string(), Object::Integer(i64::from(rotated)));
        log::debug!("Page {} rotation {} -> {}", page, current, rotated);
    }

    Ok(())
}
