//! Copying pages between object spaces.

use crate::document::{Document, INHERITABLE_PAGE_ATTRIBUTES};
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};

/// Copies pages of one source document into a destination document.
///
/// Every copied object gets a fresh identity in the destination and every
/// reference inside it is rewritten, so nothing in the destination points into
/// the source's object space. Objects shared by several copied pages (a font
/// used on every page, say) are copied once per copier.
///
/// Page-tree nodes are never followed: the copied page's `/Parent` is replaced
/// by the destination's page-tree node, inheritable attributes are written
/// onto the page itself, and other references to source pages resolve to the
/// copy when that page is part of the same copy and to `null` otherwise.
pub struct PageCopier<'a> {
    source: &'a Document,
    page_tree: HashSet<ObjectRef>,
    copied: IndexMap<ObjectRef, ObjectRef>,
    pending: VecDeque<ObjectRef>,
}

impl<'a> PageCopier<'a> {
    /// Prepare a copier over `source`.
    pub fn new(source: &'a Document) -> Self {
        let mut page_tree = HashSet::new();
        for page in source.pages() {
            let mut current = Some(*page);
            while let Some(node) = current {
                if !page_tree.insert(node) {
                    break;
                }
                current = source
                    .get(&node)
                    .and_then(Object::as_dict)
                    .and_then(|d| d.get("Parent"))
                    .and_then(Object::as_reference);
            }
        }
        Self {
            source,
            page_tree,
            copied: IndexMap::new(),
            pending: VecDeque::new(),
        }
    }

    /// Number of source objects copied so far.
    pub fn copied_count(&self) -> usize {
        self.copied.len()
    }

    /// Copy the pages at 0-based `indices` under the destination page-tree
    /// node `parent`, returning the new page references in the same order.
    pub fn copy_pages(
        &mut self,
        dest: &mut Document,
        indices: &[usize],
        parent: ObjectRef,
    ) -> Result<Vec<ObjectRef>> {
        let sources = indices
            .iter()
            .map(|&i| self.source.page(i))
            .collect::<Result<Vec<_>>>()?;

        // Reserve every selected page first so links between them resolve to
        // the copies.
        let mut targets = Vec::with_capacity(sources.len());
        for page in &sources {
            let target = match self.copied.get(page) {
                Some(existing) => *existing,
                None => {
                    let fresh = dest.reserve();
                    self.copied.insert(*page, fresh);
                    fresh
                },
            };
            targets.push(target);
        }

        for (page, target) in sources.iter().zip(&targets) {
            let flattened = self.flattened_page(page)?;
            let mut rewritten = self.rewrite(flattened, dest);
            if let Some(dict) = rewritten.as_dict_mut() {
                dict.insert("Parent".to_string(), Object::Reference(parent));
            }
            dest.insert(*target, rewritten);
        }

        self.drain(dest)?;
        log::debug!(
            "Copied {} pages ({} objects so far)",
            targets.len(),
            self.copied.len()
        );
        Ok(targets)
    }

    /// Copy `id` and everything it reaches that is not part of the page tree.
    pub fn copy_object(&mut self, dest: &mut Document, id: ObjectRef) -> Result<ObjectRef> {
        if let Some(existing) = self.copied.get(&id) {
            return Ok(*existing);
        }
        if self.source.get(&id).is_none() {
            return Err(Error::DanglingReference(id));
        }
        let target = self.assign(id, dest);
        self.drain(dest)?;
        Ok(target)
    }

    /// The page dictionary with inherited attributes made explicit and no
    /// `/Parent`. References are still source references.
    fn flattened_page(&self, page: &ObjectRef) -> Result<Object> {
        let mut dict = self
            .source
            .resolve(page)?
            .as_dict()
            .cloned()
            .ok_or_else(|| Error::malformed(format!("page {} is not a dictionary", page)))?;

        dict.remove("Parent");
        for key in INHERITABLE_PAGE_ATTRIBUTES {
            if dict.contains_key(key) {
                continue;
            }
            if let Some(value) = self.source.inherited_attribute(page, key)? {
                dict.insert(key.to_string(), value.clone());
            }
        }
        if !dict.contains_key("Resources") {
            // Required on every page; an empty dictionary keeps readers happy
            dict.insert("Resources".to_string(), Object::Dictionary(Default::default()));
        }

        Ok(self.rewrite_page_tree_links(Object::Dictionary(dict)))
    }

    /// Replace references to page-tree nodes that are not being copied with
    /// `null`, leaving the rest for [`rewrite`](Self::rewrite).
    fn rewrite_page_tree_links(&self, object: Object) -> Object {
        object.map_references(&mut |r| {
            if self.page_tree.contains(&r) && !self.copied.contains_key(&r) {
                Object::Null
            } else {
                Object::Reference(r)
            }
        })
    }

    /// Give `id` a destination identity and queue it for copying.
    fn assign(&mut self, id: ObjectRef, dest: &mut Document) -> ObjectRef {
        let target = dest.reserve();
        self.copied.insert(id, target);
        self.pending.push_back(id);
        target
    }

    /// Map every source reference inside `object` to its destination identity,
    /// assigning identities (in sorted-key order) to objects not seen yet.
    fn rewrite(&mut self, object: Object, dest: &mut Document) -> Object {
        let mut refs = Vec::new();
        object.collect_references(&mut refs);
        for r in refs {
            if self.copied.contains_key(&r) || self.page_tree.contains(&r) {
                continue;
            }
            if self.source.get(&r).is_some() {
                self.assign(r, dest);
            }
        }

        let source = self.source;
        let copied = &self.copied;
        object.map_references(&mut |r| match copied.get(&r) {
            Some(target) => Object::Reference(*target),
            None => {
                if source.get(&r).is_none() {
                    log::warn!("Reference to missing object {} replaced with null", r);
                }
                Object::Null
            },
        })
    }

    /// Copy every queued object.
    fn drain(&mut self, dest: &mut Document) -> Result<()> {
        while let Some(id) = self.pending.pop_front() {
            let object = self
                .source
                .get(&id)
                .cloned()
                .ok_or(Error::DanglingReference(id))?;
            let object = self.rewrite_page_tree_links(object);
            let rewritten = self.rewrite(object, dest);
            let target = self.copied.get(&id).copied().ok_or(Error::DanglingReference(id))?;
            dest.insert(target, rewritten);
        }
        Ok(())
    }
}
