//! PDF document model.
//!
//! A [`Document`] owns every indirect object of one file in a table keyed by
//! [`ObjectRef`], the trailer dictionary, and the Page List derived from the
//! page tree. Objects refer to each other only through `ObjectRef`s, so the
//! table is the single owner of the graph and cycles in the PDF (a page's
//! `/Parent` pointing back up the tree) are just integers.
//!
//! Loading is eager: [`Document::parse`] reads the cross-reference chain,
//! materializes every in-use object (unpacking object streams), fixes up
//! streams whose `/Length` is indirect, and checks every stream's filter
//! chain. Stream payloads stay encoded until someone asks for them.

use crate::decoders::check_filters;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::parser::{DeferredLength, parse_indirect_object};
use crate::parser_config::ParseOptions;
use crate::xref::{CrossRefTable, XRefEntry, find_xref_offset, parse_xref};
use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};

/// The `%PDF-` marker must start within this many bytes.
const HEADER_WINDOW: usize = 1024;

/// Page attributes a page may inherit from its ancestors in the page tree.
pub const INHERITABLE_PAGE_ATTRIBUTES: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// A PDF document: object table, trailer and Page List.
///
/// # Example
///
/// ```
/// use pdf_forge::document::Document;
///
/// let doc = Document::new();
/// assert_eq!(doc.page_count(), 0);
/// assert!(doc.root().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    objects: HashMap<ObjectRef, Object>,
    trailer: Dictionary,
    version: String,
    pages: Vec<ObjectRef>,
    max_id: u32,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document with no catalog.
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            trailer: Dictionary::new(),
            version: "1.7".to_string(),
            pages: Vec::new(),
            max_id: 0,
        }
    }

    /// Parse `bytes` with default (lenient) options.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Self::parse_with_options(bytes, &ParseOptions::default())
    }

    /// Parse `bytes`.
    ///
    /// # Errors
    ///
    /// - `MalformedDocument` for a missing header, `startxref`, cross-reference
    ///   data, catalog or page tree, or an object that is not where the
    ///   cross-reference data says it is
    /// - `TruncatedStream` when a stream's `/Length` runs past the buffer
    /// - `UnsupportedFilter` when any stream names a filter outside the
    ///   supported set
    /// - `Encrypted` when the trailer has `/Encrypt`
    pub fn parse_with_options(bytes: &[u8], options: &ParseOptions) -> Result<Self> {
        if options.max_file_size > 0 && bytes.len() > options.max_file_size {
            return Err(Error::malformed(format!(
                "input is {} bytes, limit is {}",
                bytes.len(),
                options.max_file_size
            )));
        }

        let header_version = parse_header(bytes)?;
        let xref_offset = find_xref_offset(bytes)?;
        let table = parse_xref(bytes, xref_offset, options)?;
        log::debug!("Cross-reference data lists {} objects", table.len());

        let trailer = table.trailer().clone();
        if trailer.contains_key("Encrypt") {
            return Err(Error::Encrypted);
        }

        let objects = Loader::new(bytes, options).load(&table)?;
        let max_id = objects.keys().map(|r| r.id).max().unwrap_or(0);

        let mut doc = Self {
            objects,
            trailer,
            version: header_version,
            pages: Vec::new(),
            max_id,
        };

        let catalog_version = doc
            .catalog()?
            .get("Version")
            .and_then(Object::as_name)
            .map(str::to_string);
        if let Some(catalog_version) = catalog_version {
            if catalog_version > doc.version {
                doc.version = catalog_version;
            }
        }

        doc.rebuild_page_list()?;
        log::debug!(
            "Loaded PDF {} with {} objects and {} pages",
            doc.version,
            doc.objects.len(),
            doc.pages.len()
        );
        Ok(doc)
    }

    /// Header version, raised to the catalog's `/Version` when that is newer.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Set the version written by the serializer.
    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    /// Trailer dictionary.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// The `/Root` reference from the trailer.
    pub fn root(&self) -> Result<ObjectRef> {
        self.trailer
            .get("Root")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::malformed("trailer has no /Root reference"))
    }

    /// Point the trailer's `/Root` at `catalog`.
    pub fn set_root(&mut self, catalog: ObjectRef) {
        self.trailer.insert("Root".to_string(), catalog.into());
    }

    /// The `/Info` reference, if the trailer has one that resolves.
    pub fn info(&self) -> Option<ObjectRef> {
        self.trailer
            .get("Info")
            .and_then(Object::as_reference)
            .filter(|r| self.objects.contains_key(r))
    }

    /// Set or clear the trailer's `/Info`.
    pub fn set_info(&mut self, info: Option<ObjectRef>) {
        match info {
            Some(r) => self.trailer.insert("Info".to_string(), r.into()),
            None => self.trailer.remove("Info"),
        };
    }

    /// The document catalog.
    pub fn catalog(&self) -> Result<&Dictionary> {
        let root = self.root()?;
        self.resolve(&root)?
            .as_dict()
            .ok_or_else(|| Error::malformed(format!("catalog {} is not a dictionary", root)))
    }

    /// Number of objects in the table.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Object stored under `id`, without following references.
    pub fn get(&self, id: &ObjectRef) -> Option<&Object> {
        self.objects.get(id)
    }

    /// Mutable access to the object stored under `id`.
    pub fn get_mut(&mut self, id: &ObjectRef) -> Option<&mut Object> {
        self.objects.get_mut(id)
    }

    /// Store `object` under `id`, replacing any previous object.
    pub fn insert(&mut self, id: ObjectRef, object: Object) {
        self.max_id = self.max_id.max(id.id);
        self.objects.insert(id, object);
    }

    /// Store `object` under a fresh object number and return its reference.
    pub fn add_object(&mut self, object: Object) -> ObjectRef {
        let id = self.reserve();
        self.objects.insert(id, object);
        id
    }

    /// Allocate a fresh object number without storing anything yet.
    pub fn reserve(&mut self) -> ObjectRef {
        self.max_id += 1;
        ObjectRef::new(self.max_id, 0)
    }

    /// Follow `id` to a non-reference object.
    ///
    /// # Errors
    ///
    /// - `DanglingReference` if any identity on the chain is absent
    /// - `CircularReference` if the chain revisits an identity
    pub fn resolve(&self, id: &ObjectRef) -> Result<&Object> {
        let mut current = *id;
        let mut chain: Vec<ObjectRef> = Vec::new();

        loop {
            let object = self
                .objects
                .get(&current)
                .ok_or(Error::DanglingReference(current))?;
            match object {
                Object::Reference(next) => {
                    chain.push(current);
                    if chain.contains(next) {
                        return Err(Error::CircularReference(*next));
                    }
                    current = *next;
                },
                other => return Ok(other),
            }
        }
    }

    /// `object` itself, or what it refers to.
    pub fn resolve_value<'a>(&'a self, object: &'a Object) -> Result<&'a Object> {
        match object {
            Object::Reference(r) => self.resolve(r),
            other => Ok(other),
        }
    }

    /// Every identity reachable from `start`, `start` first.
    ///
    /// Breadth-first; dictionary entries are followed in sorted key order and
    /// array elements in order, so the result is stable for a given document.
    /// References to identities absent from the table are skipped.
    ///
    /// # Errors
    ///
    /// `DanglingReference` if `start` itself is absent.
    pub fn walk_reachable(&self, start: &ObjectRef) -> Result<IndexSet<ObjectRef>> {
        self.walk_reachable_from(&[*start])
    }

    /// Breadth-first closure over several starting identities, in order.
    pub fn walk_reachable_from(&self, starts: &[ObjectRef]) -> Result<IndexSet<ObjectRef>> {
        let mut seen: IndexSet<ObjectRef> = IndexSet::new();
        for start in starts {
            if !self.objects.contains_key(start) {
                return Err(Error::DanglingReference(*start));
            }
            seen.insert(*start);
        }

        let mut next = 0;
        let mut refs = Vec::new();
        while let Some(current) = seen.get_index(next).copied() {
            next += 1;
            let Some(object) = self.objects.get(&current) else {
                continue;
            };
            refs.clear();
            object.collect_references(&mut refs);
            for r in refs.drain(..) {
                if self.objects.contains_key(&r) {
                    seen.insert(r);
                } else {
                    log::debug!("Object {} refers to missing object {}", current, r);
                }
            }
        }

        Ok(seen)
    }

    /// Pages in reading order.
    pub fn pages(&self) -> &[ObjectRef] {
        &self.pages
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page at 0-based `index`.
    pub fn page(&self, index: usize) -> Result<ObjectRef> {
        self.pages.get(index).copied().ok_or(Error::IndexOutOfRange {
            index: index as i64 + 1,
            page_count: self.pages.len(),
        })
    }

    /// Recompute the Page List by walking the page tree from the catalog.
    ///
    /// # Errors
    ///
    /// `MalformedDocument` if the catalog has no `/Pages` or the tree loops.
    pub fn rebuild_page_list(&mut self) -> Result<()> {
        self.pages = self.collect_pages()?;
        Ok(())
    }

    fn collect_pages(&self) -> Result<Vec<ObjectRef>> {
        let tree_root = self
            .catalog()?
            .get("Pages")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::malformed("catalog has no /Pages reference"))?;

        let mut pages = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![tree_root];

        while let Some(node_ref) = stack.pop() {
            if !visited.insert(node_ref) {
                return Err(Error::malformed(format!("page tree visits {} twice", node_ref)));
            }
            let node = match self.resolve(&node_ref) {
                Ok(Object::Dictionary(dict)) => dict,
                Ok(other) => {
                    return Err(Error::malformed(format!(
                        "page tree node {} is a {}",
                        node_ref,
                        other.type_name()
                    )));
                },
                Err(Error::DanglingReference(_)) => {
                    log::warn!("Page tree refers to missing object {}, skipping", node_ref);
                    continue;
                },
                Err(e) => return Err(e),
            };

            let kind = node.get("Type").and_then(Object::as_name);
            match (kind, node.get("Kids")) {
                (Some("Page"), _) | (None, None) => pages.push(node_ref),
                (_, Some(kids)) => {
                    let kids = self.resolve_value(kids)?.as_array().ok_or_else(|| {
                        Error::malformed(format!("/Kids of {} is not an array", node_ref))
                    })?;
                    // Reverse so the first kid is popped first
                    for kid in kids.iter().rev() {
                        match kid.as_reference() {
                            Some(kid_ref) => stack.push(kid_ref),
                            None => log::warn!("Ignoring direct object in /Kids of {}", node_ref),
                        }
                    }
                },
                (Some(other), None) => {
                    log::warn!("Page tree node {} has /Type /{} and no /Kids", node_ref, other);
                },
            }
        }

        Ok(pages)
    }

    /// Value of `key` on `page` or the nearest ancestor that defines it.
    pub fn inherited_attribute(&self, page: &ObjectRef, key: &str) -> Result<Option<&Object>> {
        let mut visited = HashSet::new();
        let mut current = *page;

        loop {
            if !visited.insert(current) {
                return Err(Error::malformed(format!("/Parent chain of {} loops", page)));
            }
            let dict = self
                .resolve(&current)?
                .as_dict()
                .ok_or_else(|| Error::malformed(format!("page tree node {} is not a dictionary", current)))?;
            if let Some(value) = dict.get(key) {
                return Ok(Some(value));
            }
            match dict.get("Parent").and_then(Object::as_reference) {
                Some(parent) if self.objects.contains_key(&parent) => current = parent,
                _ => return Ok(None),
            }
        }
    }

    /// Effective `/Rotate` of `page`, normalized to 0, 90, 180 or 270.
    pub fn page_rotation(&self, page: &ObjectRef) -> Result<i32> {
        let rotate = match self.inherited_attribute(page, "Rotate")? {
            Some(value) => self.resolve_value(value)?.as_integer().unwrap_or(0),
            None => 0,
        };
        Ok(crate::editor::normalize_rotation(rotate))
    }

    /// Effective `/MediaBox` of `page` as `[llx, lly, urx, ury]`.
    pub fn media_box(&self, page: &ObjectRef) -> Result<Option<[f64; 4]>> {
        let Some(value) = self.inherited_attribute(page, "MediaBox")? else {
            return Ok(None);
        };
        let Some(items) = self.resolve_value(value)?.as_array() else {
            return Ok(None);
        };
        if items.len() != 4 {
            return Ok(None);
        }
        let mut rect = [0.0; 4];
        for (slot, item) in rect.iter_mut().zip(items) {
            match self.resolve_value(item)?.as_number() {
                Some(v) => *slot = v,
                None => return Ok(None),
            }
        }
        Ok(Some(rect))
    }

    /// Decoded content of the page at 0-based `index`. Multiple content
    /// streams are joined with a newline.
    pub fn page_content(&self, index: usize) -> Result<Vec<u8>> {
        let page = self.page(index)?;
        let dict = self
            .resolve(&page)?
            .as_dict()
            .ok_or_else(|| Error::malformed(format!("page {} is not a dictionary", page)))?;

        let streams: Vec<&Object> = match dict.get("Contents") {
            None => return Ok(Vec::new()),
            Some(contents) => match self.resolve_value(contents)? {
                Object::Array(parts) => parts.iter().collect(),
                stream => vec![stream],
            },
        };

        let mut content = Vec::new();
        for (i, part) in streams.into_iter().enumerate() {
            if i > 0 {
                content.push(b'\n');
            }
            let stream = self.resolve_value(part)?;
            if !stream.is_null() {
                content.extend_from_slice(&stream.decode_stream_data()?);
            }
        }
        Ok(content)
    }
}

/// Read `%PDF-x.y` from the start of the buffer.
fn parse_header(bytes: &[u8]) -> Result<String> {
    const MARKER: &[u8] = b"%PDF-";

    let window = &bytes[..bytes.len().min(HEADER_WINDOW)];
    let start = window
        .windows(MARKER.len())
        .position(|w| w == MARKER)
        .ok_or_else(|| Error::malformed("no %PDF- header"))?;
    if start > 0 {
        log::warn!("{} bytes of junk before the %PDF- header", start);
    }

    let after = &bytes[start + MARKER.len()..];
    let len = after
        .iter()
        .take_while(|c| c.is_ascii_digit() || **c == b'.')
        .count();
    let version = std::str::from_utf8(&after[..len]).map_err(|_| Error::malformed("bad header"))?;

    match version.split_once('.') {
        Some((major, minor))
            if !major.is_empty()
                && !minor.is_empty()
                && !minor.contains('.') =>
        {
            Ok(version.to_string())
        },
        _ => Err(Error::malformed(format!("bad PDF version '{}'", version))),
    }
}

/// Materializes the object table from cross-reference data.
struct Loader<'a> {
    bytes: &'a [u8],
    options: &'a ParseOptions,
    objects: HashMap<ObjectRef, Object>,
    deferred: Vec<(ObjectRef, DeferredLength)>,
}

impl<'a> Loader<'a> {
    fn new(bytes: &'a [u8], options: &'a ParseOptions) -> Self {
        Self {
            bytes,
            options,
            objects: HashMap::new(),
            deferred: Vec::new(),
        }
    }

    fn load(mut self, table: &CrossRefTable) -> Result<HashMap<ObjectRef, Object>> {
        let mut compressed: Vec<(u32, u32, u32)> = Vec::new();

        for id in table.in_use_ids() {
            match table.get(id) {
                Some(XRefEntry::InUse { offset, .. }) => self.load_plain(id, *offset)?,
                Some(XRefEntry::Compressed { stream_id, index }) => {
                    compressed.push((id, *stream_id, *index))
                },
                _ => {},
            }
        }

        // Lengths stored as plain objects are known now; object streams need
        // theirs before they can be unpacked.
        self.resolve_deferred_lengths(false)?;
        self.unpack_object_streams(&compressed)?;
        self.resolve_deferred_lengths(true)?;

        for (id, object) in &self.objects {
            if let Object::Stream { .. } = object {
                check_filters(&object.stream_filters()).map_err(|e| {
                    log::debug!("Stream {} uses an unsupported filter", id);
                    e
                })?;
            }
        }

        Ok(self.objects)
    }

    fn load_plain(&mut self, id: u32, offset: usize) -> Result<()> {
        let parsed = parse_indirect_object(self.bytes, offset, self.options)?;
        if parsed.id.id != id {
            return Err(Error::malformed(format!(
                "cross-reference entry for object {} points at object {}",
                id, parsed.id
            )));
        }
        if let Some(deferred) = parsed.deferred_length {
            self.deferred.push((parsed.id, deferred));
        }
        self.objects.insert(parsed.id, parsed.object);
        Ok(())
    }

    fn unpack_object_streams(&mut self, compressed: &[(u32, u32, u32)]) -> Result<()> {
        let mut by_stream: HashMap<u32, Vec<(u32, u32)>> = HashMap::new();
        for &(id, stream_id, index) in compressed {
            by_stream.entry(stream_id).or_default().push((id, index));
        }
        let mut stream_ids: Vec<u32> = by_stream.keys().copied().collect();
        stream_ids.sort_unstable();

        for stream_id in stream_ids {
            let stream_ref = ObjectRef::new(stream_id, 0);
            let stream = self.objects.get(&stream_ref).ok_or_else(|| {
                Error::malformed(format!("object stream {} is not in the file", stream_ref))
            })?;
            let contents = parse_object_stream(stream, self.options)?;
            log::debug!(
                "Object stream {} holds {} objects",
                stream_ref,
                contents.members.len()
            );

            for &(id, index) in by_stream.get(&stream_id).into_iter().flatten() {
                // The xref index normally matches the header position; fall
                // back to a search by number when it does not.
                let member = contents
                    .get_index(index as usize)
                    .filter(|(member_id, _)| *member_id == id)
                    .or_else(|| contents.members.iter().find(|(member_id, _)| *member_id == id));

                match member {
                    Some((_, object)) => {
                        self.objects.insert(ObjectRef::new(id, 0), object.clone());
                    },
                    None if self.options.strict => {
                        return Err(Error::malformed(format!(
                            "object {} is missing from object stream {}",
                            id, stream_ref
                        )));
                    },
                    None => log::warn!("Object {} is missing from object stream {}", id, stream_ref),
                }
            }
        }
        Ok(())
    }

    /// Trim scanned stream bodies to their indirect `/Length`. With `finish`
    /// unset, streams whose length object is not loaded yet are left for a
    /// later pass.
    fn resolve_deferred_lengths(&mut self, finish: bool) -> Result<()> {
        let pending = std::mem::take(&mut self.deferred);

        for (stream_ref, deferred) in pending {
            let declared = match self.objects.get(&deferred.length_ref) {
                Some(Object::Integer(n)) if *n >= 0 => Some(*n as usize),
                Some(other) => {
                    log::warn!(
                        "/Length {} of stream {} is a {}",
                        deferred.length_ref,
                        stream_ref,
                        other.type_name()
                    );
                    None
                },
                None if !finish => {
                    self.deferred.push((stream_ref, deferred));
                    continue;
                },
                None => None,
            };

            let Some(Object::Stream { dict, data }) = self.objects.get_mut(&stream_ref) else {
                continue;
            };

            match declared {
                Some(length) if length > deferred.available => {
                    return Err(Error::TruncatedStream {
                        object: stream_ref,
                        declared: length,
                        available: deferred.available,
                    });
                },
                Some(length) if length <= data.len() => {
                    *data = data.slice(..length);
                },
                Some(length) if self.options.strict => {
                    return Err(Error::malformed(format!(
                        "stream {} /Length {} runs past endstream",
                        stream_ref, length
                    )));
                },
                Some(length) => log::warn!(
                    "Stream {} /Length {} runs past endstream, keeping {} bytes",
                    stream_ref,
                    length,
                    data.len()
                ),
                None if self.options.strict => {
                    return Err(Error::malformed(format!(
                        "stream {} has an unusable /Length",
                        stream_ref
                    )));
                },
                None => {},
            }
            dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
        }
        Ok(())
    }
}
