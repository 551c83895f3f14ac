//! Structural page operations.
//!
//! Every operation works on [`Document`](crate::document::Document) values:
//!
//! ```text
//! source Document(s) (read-only)
//!     ↓
//! [PageCopier] per source: page + reachable closure, fresh identities
//!     ↓
//! destination Document (new Catalog and flat Pages node)
//! ```
//!
//! Merge, split and extract never touch their sources. Rotation is the one
//! in-place edit: it rewrites `/Rotate` on the targeted page dictionaries.

mod copier;
mod pages;
mod rotate;

pub use copier::PageCopier;
pub use pages::{merge_documents, select_pages};
pub use rotate::rotate_pages;

use serde::{Deserialize, Serialize};

/// Pages a rotation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageTarget {
    /// One page, 1-based
    Page(u32),
    /// Every page
    All,
}

impl std::str::FromStr for PageTarget {
    type Err = String;

    /// Parses `all` or a 1-based page number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(PageTarget::All);
        }
        s.parse::<u32>()
            .map(PageTarget::Page)
            .map_err(|_| format!("expected a page number or 'all', got '{}'", s))
    }
}

/// Fold an angle into 0..360.
///
/// ```
/// use pdf_forge::editor::normalize_rotation;
///
/// assert_eq!(normalize_rotation(-90), 270);
/// assert_eq!(normalize_rotation(450), 90);
/// ```
pub fn normalize_rotation(degrees: i64) -> i32 {
    (((degrees % 360) + 360) % 360) as i32
}
