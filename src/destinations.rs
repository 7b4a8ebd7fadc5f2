// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! Named destinations and view fits.
//!
//! HTML anchors are compiled to PDF named destinations, so a link to
//! `page.html#section` can be mapped back onto a page of the merged document
//! by looking `section` up in the destination table of the document that was
//! published at `page.html`.

use crate::error::Result;
use indexmap::IndexMap;
use lopdf::{Dictionary, Document, Object, ObjectId};

// Name trees produced by real writers are shallow, this only guards against cycles.
const MAX_NAME_TREE_DEPTH: usize = 32;
const MAX_REFERENCE_CHAIN: usize = 8;

/// Follows references until a direct object is reached. A chain longer than
/// `MAX_REFERENCE_CHAIN` is returned as the reference it stopped at.
pub(crate) fn deref<'a>(doc: &'a Document, mut object: &'a Object) -> lopdf::Result<&'a Object> {
    for _ in 0..MAX_REFERENCE_CHAIN {
        match object {
            Object::Reference(id) => object = doc.get_object(*id)?,
            _ => break,
        }
    }
    Ok(object)
}

/// The view types a destination can request, see section 12.3.2.2 of the PDF
/// reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitKind {
    Xyz,
    Fit,
    FitH,
    FitV,
    FitR,
    FitB,
    FitBH,
    FitBV,
}

impl FitKind {
    pub fn from_name(name: &[u8]) -> Option<Self> {
        Some(match name {
            b"XYZ" => FitKind::Xyz,
            b"Fit" => FitKind::Fit,
            b"FitH" => FitKind::FitH,
            b"FitV" => FitKind::FitV,
            b"FitR" => FitKind::FitR,
            b"FitB" => FitKind::FitB,
            b"FitBH" => FitKind::FitBH,
            b"FitBV" => FitKind::FitBV,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            FitKind::Xyz => "XYZ",
            FitKind::Fit => "Fit",
            FitKind::FitH => "FitH",
            FitKind::FitV => "FitV",
            FitKind::FitR => "FitR",
            FitKind::FitB => "FitB",
            FitKind::FitBH => "FitBH",
            FitKind::FitBV => "FitBV",
        }
    }

    /// Number of numeric operands that follow the type in a destination array.
    pub fn arity(self) -> usize {
        match self {
            FitKind::Fit | FitKind::FitB => 0,
            FitKind::FitH | FitKind::FitV | FitKind::FitBH | FitKind::FitBV => 1,
            FitKind::Xyz => 3,
            FitKind::FitR => 4,
        }
    }
}

/// How a viewer should display the page it jumps to.
///
/// `args` always has exactly [`FitKind::arity`] entries. `None` is written as
/// `null`, meaning the viewer keeps its current value. For `XYZ` the entries
/// are left, top and zoom.
#[derive(Debug, Clone, PartialEq)]
pub struct Fit {
    pub kind: FitKind,
    pub args: Vec<Option<f32>>,
}

impl Default for Fit {
    fn default() -> Self {
        Fit::fit()
    }
}

impl Fit {
    /// Fit the whole page in the window.
    pub fn fit() -> Self {
        Fit {
            kind: FitKind::Fit,
            args: vec![],
        }
    }

    pub fn xyz(left: Option<f32>, top: Option<f32>, zoom: Option<f32>) -> Self {
        Fit {
            kind: FitKind::Xyz,
            args: vec![left, top, zoom],
        }
    }

    /// Builds an explicit destination array pointing at `page`.
    pub fn to_destination(&self, page: ObjectId) -> Object {
        let mut array = Vec::with_capacity(2 + self.args.len());
        array.push(Object::Reference(page));
        array.push(Object::Name(self.kind.name().as_bytes().to_vec()));
        array.extend(self.args.iter().map(|arg| match arg {
            Some(value) => Object::from(*value),
            None => Object::Null,
        }));
        Object::Array(array)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DestinationError {
    #[error("destination is not an array")]
    NotAnArray,
    #[error("destination does not reference a page")]
    MissingPage,
    #[error("unknown destination type {0}")]
    UnknownFit(String),
    #[error(transparent)]
    Pdf(#[from] lopdf::Error),
}

/// A named destination with its page reference still unresolved.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedDestination {
    pub page: ObjectId,
    pub fit: Fit,
}

impl NamedDestination {
    /// Reads a destination value, either `[page /Type args...]` or a
    /// dictionary whose `/D` entry holds such an array.
    pub fn from_object(doc: &Document, object: &Object) -> Result<Self, DestinationError> {
        let array = match deref(doc, object)? {
            Object::Array(array) => array,
            Object::Dictionary(dict) => deref(doc, dict.get(b"D")?)?
                .as_array()
                .map_err(|_| DestinationError::NotAnArray)?,
            _ => return Err(DestinationError::NotAnArray),
        };

        let page = array
            .first()
            .and_then(|page| page.as_reference().ok())
            .ok_or(DestinationError::MissingPage)?;

        let kind = match array.get(1) {
            Some(name) => {
                let name = deref(doc, name)?.as_name()?;
                FitKind::from_name(name)
                    .ok_or_else(|| DestinationError::UnknownFit(String::from_utf8_lossy(name).into()))?
            }
            None => FitKind::Fit,
        };

        let args = (0..kind.arity())
            .map(|i| array.get(2 + i).and_then(|arg| arg.as_float().ok()))
            .collect();

        Ok(NamedDestination {
            page,
            fit: Fit { kind, args },
        })
    }
}

/// The named destinations of one document, keyed by name without the leading
/// `/` of the PDF name syntax. Values are kept as found so that the page
/// reference is followed at resolution time, against the merged object graph.
#[derive(Debug, Clone, Default)]
pub struct DestinationTable {
    entries: IndexMap<Vec<u8>, Object>,
}

impl DestinationTable {
    /// Collects the catalog's `/Dests` dictionary and the `/Names` → `/Dests`
    /// name tree. The first definition of a name wins.
    pub fn read(doc: &Document) -> Result<Self> {
        let mut table = DestinationTable::default();
        let catalog = doc.catalog()?;

        if let Ok(dests) = catalog.get(b"Dests") {
            if let Ok(dests) = deref(doc, dests).and_then(Object::as_dict) {
                for (name, value) in dests.iter() {
                    table.insert(name.clone(), value.clone());
                }
            }
        }

        let tree = catalog
            .get(b"Names")
            .and_then(|names| deref(doc, names))
            .and_then(Object::as_dict)
            .and_then(|names| names.get(b"Dests"))
            .and_then(|dests| deref(doc, dests))
            .and_then(Object::as_dict);
        if let Ok(tree) = tree {
            table.read_name_tree(doc, tree, 0);
        }

        Ok(table)
    }

    fn read_name_tree(&mut self, doc: &Document, node: &Dictionary, depth: usize) {
        if depth > MAX_NAME_TREE_DEPTH {
            log::warn!("Named destination tree is nested too deep, ignoring the rest");
            return;
        }

        if let Ok(names) = node
            .get(b"Names")
            .and_then(|names| deref(doc, names))
            .and_then(Object::as_array)
        {
            // [key1 value1 key2 value2 ...]
            for pair in names.chunks_exact(2) {
                match deref(doc, &pair[0]).and_then(lopdf::decode_text_string) {
                    Ok(key) => self.insert(key.into_bytes(), pair[1].clone()),
                    Err(err) => log::debug!("Skipping named destination with an unreadable key: {err}"),
                }
            }
        }

        if let Ok(kids) = node
            .get(b"Kids")
            .and_then(|kids| deref(doc, kids))
            .and_then(Object::as_array)
        {
            for kid in kids {
                if let Ok(kid) = deref(doc, kid).and_then(Object::as_dict) {
                    self.read_name_tree(doc, kid, depth + 1);
                }
            }
        }
    }

    fn insert(&mut self, name: Vec<u8>, value: Object) {
        self.entries.entry(name).or_insert(value);
    }

    pub fn get(&self, name: &[u8]) -> Option<&Object> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &Object)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
