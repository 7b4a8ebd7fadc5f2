// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! The merged document: every input's pages concatenated under one page tree.

use crate::annotation::AnnotationHandle;
use crate::destinations::{deref, DestinationTable};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, HashSet};

// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Where one input document ended up in the merged document.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub first_page: usize,
    pub page_count: usize,
    pub destinations: DestinationTable,
    root: ObjectId,
    outline: Option<ObjectId>,
}

impl SourceDocument {
    pub fn pages(&self) -> std::ops::Range<usize> {
        self.first_page..self.first_page + self.page_count
    }
}

/// Collects the objects of each appended document. Nothing is resolved while
/// appending, so links can only be rewritten once every document has landed.
#[derive(Debug)]
pub struct MergeBuilder {
    objects: BTreeMap<ObjectId, Object>,
    // Keeps the order pages were appended in, which is the merged page order.
    pages: IndexMap<ObjectId, Dictionary>,
    sources: Vec<SourceDocument>,
    starting_id: u32,
    version: String,
}

impl Default for MergeBuilder {
    fn default() -> Self {
        MergeBuilder::new()
    }
}

impl MergeBuilder {
    pub fn new() -> Self {
        MergeBuilder {
            objects: BTreeMap::new(),
            pages: IndexMap::new(),
            sources: vec![],
            starting_id: 1,
            version: "1.5".to_string(),
        }
    }

    /// Appends the pages of `doc`, in their existing order, after the pages
    /// appended so far.
    pub fn append(&mut self, mut doc: Document) -> Result<&SourceDocument> {
        // Object IDs are indexes not UUIDs so we need to renumber them
        // before inserting them into a unified collection.
        doc.renumber_objects_with(self.starting_id);
        self.starting_id = doc.max_id + 1;

        if doc.version > self.version {
            self.version = doc.version.clone();
        }

        let root = doc
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .map_err(|_| Error::MissingCatalog)?;
        let outline = doc
            .get_dictionary(root)
            .map_err(|_| Error::MissingCatalog)?
            .get(b"Outlines")
            .and_then(Object::as_reference)
            .ok();
        let destinations = DestinationTable::read(&doc)?;

        let first_page = self.pages.len();
        for page_id in doc.get_pages().into_values() {
            let page = flatten_page(&doc, page_id)?;
            self.pages.insert(page_id, page);
        }
        let page_count = self.pages.len() - first_page;

        log::debug!(
            "Appended document #{} at page index {first_page}: {page_count} pages, {} named destinations",
            self.sources.len(),
            destinations.len()
        );

        self.objects.extend(doc.objects);
        self.sources.push(SourceDocument {
            first_page,
            page_count,
            destinations,
            root,
            outline,
        });
        Ok(&self.sources[self.sources.len() - 1])
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Builds one page tree, one catalog and one outline out of everything
    /// appended.
    pub fn finish(self) -> Result<MergedDocument> {
        let MergeBuilder {
            objects,
            pages,
            sources,
            version,
            ..
        } = self;

        // The first document's catalog becomes the catalog of the merged
        // document, every other catalog is dropped.
        let catalog_id = sources.first().map(|s| s.root).ok_or(Error::MissingCatalog)?;
        let roots: HashSet<ObjectId> = sources.iter().map(|s| s.root).collect();
        let mut catalog: Option<Dictionary> = None;
        let mut pages_id: Option<ObjectId> = None;

        let mut document = Document::with_version(version);
        for (object_id, object) in objects {
            if roots.contains(&object_id) {
                if object_id == catalog_id {
                    catalog = object.as_dict().ok().cloned();
                }
                continue;
            }
            let type_name = object.type_name().map(str::to_owned).unwrap_or_default();
            match type_name.as_str() {
                "Pages" => {
                    // Reuse the first "Pages" ID for the merged page tree, every
                    // other page tree node is dropped.
                    if pages_id.is_none() {
                        pages_id = Some(object_id);
                    }
                }
                "Page" => {} // Inserted below, in merge order
                "ObjStm" | "XRef" => {}
                _ => {
                    document.objects.insert(object_id, object);
                }
            }
        }

        let mut catalog = catalog.ok_or(Error::MissingCatalog)?;
        let pages_id = pages_id.ok_or(Error::NoPages)?;

        let page_ids: Vec<ObjectId> = pages.keys().copied().collect();
        for (page_id, mut page) in pages {
            page.set("Parent", pages_id);
            document.objects.insert(page_id, Object::Dictionary(page));
        }
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => page_ids.iter().copied().map(Object::Reference).collect::<Vec<_>>(),
                "Count" => page_ids.len() as i64,
            }),
        );

        let outlines: Vec<ObjectId> = sources.iter().filter_map(|s| s.outline).collect();
        match merge_outlines(&mut document, &outlines)? {
            Some(outlines_id) => catalog.set("Outlines", outlines_id),
            None => {
                catalog.remove(b"Outlines");
            }
        }

        // Every input's destinations live in the catalog's /Dests from now on.
        let mut destinations = Dictionary::new();
        for source in &sources {
            for (name, value) in source.destinations.iter() {
                if !destinations.has(name) {
                    destinations.set(name.clone(), value.clone());
                }
            }
        }
        strip_name_tree_dests(&mut document, &mut catalog);
        if destinations.is_empty() {
            catalog.remove(b"Dests");
        } else {
            catalog.set("Dests", destinations);
        }

        catalog.set("Pages", pages_id);
        document
            .objects
            .insert(catalog_id, Object::Dictionary(catalog));
        document.trailer.set("Root", catalog_id);

        // Objects were inserted directly so max_id was never updated.
        document.max_id = document.objects.keys().map(|(id, _)| *id).max().unwrap_or(0);

        log::info!(
            "Merged {} documents into {} pages",
            sources.len(),
            page_ids.len()
        );

        Ok(MergedDocument {
            document,
            pages: page_ids,
            sources,
        })
    }
}

/// Copies attributes the page inherits from its page tree ancestors onto the
/// page itself, since the ancestors are replaced by the merged page tree.
fn flatten_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut page = doc.get_dictionary(page_id)?.clone();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut seen = HashSet::new();

    while let Some(node_id) = parent {
        if !seen.insert(node_id) {
            break;
        }
        let Ok(node) = doc.get_dictionary(node_id) else {
            break;
        };
        for key in INHERITABLE {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key, value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    Ok(page)
}

fn strip_name_tree_dests(document: &mut Document, catalog: &mut Dictionary) {
    let names_id = match catalog.get(b"Names") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    };
    let names = match names_id {
        Some(id) => document.get_dictionary_mut(id).ok(),
        None => catalog.get_mut(b"Names").and_then(Object::as_dict_mut).ok(),
    };
    if let Some(names) = names {
        names.remove(b"Dests");
    }
}

/// Chains the outline items of every root, in order, under the first root.
fn merge_outlines(document: &mut Document, roots: &[ObjectId]) -> Result<Option<ObjectId>> {
    // (root, last top level item)
    let mut merged: Option<(ObjectId, ObjectId)> = None;
    let mut count = 0;

    for &root_id in roots {
        let Ok(root) = document.get_dictionary(root_id) else {
            continue;
        };
        let (Ok(first), Ok(last)) = (
            root.get(b"First").and_then(Object::as_reference),
            root.get(b"Last").and_then(Object::as_reference),
        ) else {
            continue;
        };
        count += root.get(b"Count").and_then(Object::as_i64).unwrap_or(0);

        merged = match merged {
            None => Some((root_id, last)),
            Some((parent_id, last_item_id)) => {
                document.get_dictionary_mut(last_item_id)?.set("Next", first);
                document.get_dictionary_mut(first)?.set("Prev", last_item_id);

                let mut item = Some(first);
                let mut seen = HashSet::new();
                while let Some(item_id) = item {
                    if !seen.insert(item_id) {
                        break;
                    }
                    let dictionary = document.get_dictionary_mut(item_id)?;
                    dictionary.set("Parent", parent_id);
                    item = dictionary.get(b"Next").and_then(Object::as_reference).ok();
                }

                document.objects.remove(&root_id);
                Some((parent_id, last))
            }
        };
    }

    let Some((root_id, last_item_id)) = merged else {
        return Ok(None);
    };
    let root = document.get_dictionary_mut(root_id)?;
    root.set("Count", count);
    root.set("Last", last_item_id);
    Ok(Some(root_id))
}

/// The merged document, owned by one merge from append until it is saved.
///
/// A page's index is its position in `pages`.
#[derive(Debug)]
pub struct MergedDocument {
    document: Document,
    pages: Vec<ObjectId>,
    sources: Vec<SourceDocument>,
}

impl MergedDocument {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_ids(&self) -> &[ObjectId] {
        &self.pages
    }

    pub fn page_id(&self, index: usize) -> Option<ObjectId> {
        self.pages.get(index).copied()
    }

    pub fn page_index(&self, id: ObjectId) -> Option<usize> {
        self.pages.iter().position(|page| *page == id)
    }

    pub fn sources(&self) -> &[SourceDocument] {
        &self.sources
    }

    /// Looks a named destination up in one source document, or in all of them
    /// in merge order when `scope` is `None`.
    pub fn find_destination(&self, scope: Option<usize>, name: &[u8]) -> Option<&Object> {
        match scope {
            Some(index) => self.sources.get(index)?.destinations.get(name),
            None => self
                .sources
                .iter()
                .find_map(|source| source.destinations.get(name)),
        }
    }

    fn checked_page_id(&self, page: usize) -> Result<ObjectId> {
        self.page_id(page).ok_or(Error::InvalidTarget {
            page,
            pages: self.pages.len(),
        })
    }

    /// IDs of the indirect annotations on a page, in `/Annots` order.
    pub fn annotation_ids(&self, page: usize) -> Result<Vec<ObjectId>> {
        let page = self.document.get_dictionary(self.checked_page_id(page)?)?;
        let annots = match page.get(b"Annots") {
            Ok(annots) => deref(&self.document, annots)?.as_array()?,
            Err(_) => return Ok(vec![]),
        };
        Ok(annots
            .iter()
            .filter_map(|annot| annot.as_reference().ok())
            .collect())
    }

    fn annotations_mut(&mut self, page: usize, create: bool) -> Result<Option<&mut Vec<Object>>> {
        let page_id = self.checked_page_id(page)?;
        // None when missing, Some(None) for a direct array.
        let annots = self
            .document
            .get_dictionary(page_id)?
            .get(b"Annots")
            .ok()
            .map(|annots| annots.as_reference().ok());

        match annots {
            Some(Some(array_id)) => Ok(Some(self.document.get_object_mut(array_id)?.as_array_mut()?)),
            Some(None) => Ok(Some(
                self.document
                    .get_dictionary_mut(page_id)?
                    .get_mut(b"Annots")?
                    .as_array_mut()?,
            )),
            None if create => {
                let page = self.document.get_dictionary_mut(page_id)?;
                page.set("Annots", Vec::<Object>::new());
                Ok(Some(page.get_mut(b"Annots")?.as_array_mut()?))
            }
            None => Ok(None),
        }
    }

    /// Moves annotation dictionaries stored directly in `/Annots` into their
    /// own objects so every annotation can be addressed by object ID.
    pub fn promote_inline_annotations(&mut self) -> Result<usize> {
        let mut promoted = 0;
        for page in 0..self.pages.len() {
            let inline: Vec<(usize, Dictionary)> = match self.annotations_mut(page, false)? {
                Some(annots) => annots
                    .iter()
                    .enumerate()
                    .filter_map(|(i, annot)| annot.as_dict().ok().map(|dict| (i, dict.clone())))
                    .collect(),
                None => continue,
            };

            for (position, annotation) in inline {
                let id = self.document.add_object(annotation);
                if let Some(annots) = self.annotations_mut(page, false)? {
                    annots[position] = Object::Reference(id);
                    promoted += 1;
                }
            }
        }

        if promoted > 0 {
            log::debug!("Promoted {promoted} inline annotations to indirect objects");
        }
        Ok(promoted)
    }

    /// Removes the annotation from its page's `/Annots`, matching by object ID.
    /// Returns false when it was not there.
    pub fn remove_annotation(&mut self, handle: AnnotationHandle) -> Result<bool> {
        let Some(annots) = self.annotations_mut(handle.page, false)? else {
            return Ok(false);
        };
        let before = annots.len();
        annots.retain(|annot| annot.as_reference().map_or(true, |id| id != handle.id));
        Ok(annots.len() != before)
    }

    pub fn add_annotation(&mut self, page: usize, annotation: Dictionary) -> Result<AnnotationHandle> {
        self.checked_page_id(page)?;
        let id = self.document.add_object(annotation);
        if let Some(annots) = self.annotations_mut(page, true)? {
            annots.push(Object::Reference(id));
        }
        Ok(AnnotationHandle { page, id })
    }

    /// Replaces the document information dictionary.
    pub fn set_info(&mut self, info: Dictionary) {
        let info_id = self.document.add_object(info);
        self.document.trailer.set("Info", info_id);
    }

    /// Drops unreferenced objects, compacts object IDs and serialises the
    /// document.
    pub fn save_to_vec(mut self) -> Result<Vec<u8>> {
        self.document.prune_objects();
        self.document.renumber_objects();
        self.document.compress();

        let mut buffer = Vec::new();
        self.document.save_to(&mut buffer)?;
        Ok(buffer)
    }
}
