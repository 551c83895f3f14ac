//! Merge and page selection.

use crate::document::Document;
use crate::editor::PageCopier;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use indexmap::IndexSet;

/// Concatenate the pages of `sources`, in order, into a new document.
///
/// Each source gets its own copier, so resources that look alike in two
/// sources stay separate objects. The first source's `/Info` is carried over.
///
/// # Errors
///
/// `EmptySelection` if `sources` is empty.
pub fn merge_documents(sources: &[Document]) -> Result<Document> {
    let first = sources.first().ok_or(Error::EmptySelection)?;

    let version = sources
        .iter()
        .map(Document::version)
        .max()
        .unwrap_or("1.7")
        .to_string();
    let mut dest = Destination::new(version);

    for (n, source) in sources.iter().enumerate() {
        let mut copier = PageCopier::new(source);
        let all: Vec<usize> = (0..source.page_count()).collect();
        let kids = copier.copy_pages(&mut dest.doc, &all, dest.pages)?;
        dest.kids.extend(kids);

        if n == 0 {
            if let Some(info) = first.info() {
                let copied = copier.copy_object(&mut dest.doc, info)?;
                dest.doc.set_info(Some(copied));
            }
        }
        log::debug!("Merged {} pages from source {}", source.page_count(), n + 1);
    }

    dest.finish()
}

/// Copy the pages at 0-based `indices` of `source`, in the order given, into
/// a new document. Repeated indices keep their first position.
///
/// # Errors
///
/// - `EmptySelection` if `indices` is empty
/// - `IndexOutOfRange` if an index is not a page of `source`
pub fn select_pages(source: &Document, indices: &[usize]) -> Result<Document> {
    if indices.is_empty() {
        return Err(Error::EmptySelection);
    }
    let page_count = source.page_count();
    if let Some(bad) = indices.iter().find(|&&i| i >= page_count) {
        return Err(Error::IndexOutOfRange {
            index: *bad as i64 + 1,
            page_count,
        });
    }
    let unique: Vec<usize> = indices.iter().copied().collect::<IndexSet<_>>().into_iter().collect();

    let mut dest = Destination::new(source.version().to_string());
    let mut copier = PageCopier::new(source);
    dest.kids = copier.copy_pages(&mut dest.doc, &unique, dest.pages)?;

    if let Some(info) = source.info() {
        let copied = copier.copy_object(&mut dest.doc, info)?;
        dest.doc.set_info(Some(copied));
    }

    dest.finish()
}

/// A fresh document whose catalog and single `/Pages` node are filled in by
/// [`finish`](Destination::finish).
struct Destination {
    doc: Document,
    catalog: ObjectRef,
    pages: ObjectRef,
    kids: Vec<ObjectRef>,
}

impl Destination {
    fn new(version: String) -> Self {
        let mut doc = Document::new();
        doc.set_version(version);
        let catalog = doc.reserve();
        let pages = doc.reserve();
        Self {
            doc,
            catalog,
            pages,
            kids: Vec::new(),
        }
    }

    fn finish(mut self) -> Result<Document> {
        let mut pages = Dictionary::new();
        pages.insert("Type".to_string(), Object::name("Pages"));
        pages.insert("Count".to_string(), Object::Integer(self.kids.len() as i64));
        pages.insert(
            "Kids".to_string(),
            Object::Array(self.kids.iter().map(|k| Object::Reference(*k)).collect()),
        );
        self.doc.insert(self.pages, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.insert("Type".to_string(), Object::name("Catalog"));
        catalog.insert("Pages".to_string(), Object::Reference(self.pages));
        self.doc.insert(self.catalog, Object::Dictionary(catalog));

        self.doc.set_root(self.catalog);
        self.doc.rebuild_page_list()?;
        Ok(self.doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A document with `n` pages, page k carrying `/Label k`, plus an /Info.
    fn labelled(n: usize) -> Document {
        let mut doc = Document::new();
        let catalog = doc.reserve();
        let tree = doc.reserve();
        let mut kids = Vec::new();
        for k in 1..=n {
            let mut page = Dictionary::new();
            page.insert("Type".to_string(), Object::name("Page"));
            page.insert("Parent".to_string(), tree.into());
            page.insert("Label".to_string(), Object::Integer(k as i64));
            kids.push(Object::Reference(doc.add_object(Object::Dictionary(page))));
        }
        let mut pages = Dictionary::new();
        pages.insert("Type".to_string(), Object::name("Pages"));
        pages.insert("Count".to_string(), Object::Integer(n as i64));
        pages.insert("Kids".to_string(), Object::Array(kids));
        doc.insert(tree, Object::Dictionary(pages));
        let mut cat = Dictionary::new();
        cat.insert("Type".to_string(), Object::name("Catalog"));
        cat.insert("Pages".to_string(), tree.into());
        doc.insert(catalog, Object::Dictionary(cat));
        let mut info = Dictionary::new();
        info.insert("Title".to_string(), Object::String(b"labelled".to_vec()));
        let info = doc.add_object(Object::Dictionary(info));
        doc.set_root(catalog);
        doc.set_info(Some(info));
        doc.rebuild_page_list().unwrap();
        doc
    }

    fn labels(doc: &Document) -> Vec<i64> {
        doc.pages()
            .iter()
            .map(|p| {
                doc.resolve(p).unwrap().as_dict().unwrap().get("Label").unwrap().as_integer().unwrap()
            })
            .collect()
    }

    #[test]
    fn test_merge_preserves_order() {
        let merged = merge_documents(&[labelled(2), labelled(3)]).unwrap();
        assert_eq!(labels(&merged), vec![1, 2, 1, 2, 3]);
        assert!(merged.info().is_some());
    }

    #[test]
    fn test_merge_empty_list() {
        assert!(matches!(merge_documents(&[]), Err(Error::EmptySelection)));
    }

    #[test]
    fn test_select_in_given_order() {
        let doc = labelled(5);
        let picked = select_pages(&doc, &[3, 0, 3]).unwrap();
        assert_eq!(labels(&picked), vec![4, 1]);
        let title = picked.resolve(&picked.info().unwrap()).unwrap().as_dict().unwrap().get("Title");
        assert_eq!(title, Some(&Object::String(b"labelled".to_vec())));
    }

    #[test]
    fn test_select_rejects_bad_input() {
        let doc = labelled(2);
        assert!(matches!(select_pages(&doc, &[]), Err(Error::EmptySelection)));
        match select_pages(&doc, &[0, 2]) {
            Err(Error::IndexOutOfRange { index, page_count }) => {
                assert_eq!(index, 3);
                assert_eq!(page_count, 2);
            },
            other => panic!("expected IndexOutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn test_source_untouched() {
        let doc = labelled(3);
        let before = doc.object_count();
        let _ = select_pages(&doc, &[1]).unwrap();
        assert_eq!(doc.object_count(), before);
        assert_eq!(labels(&doc), vec![1, 2, 3]);
    }
}
