// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! In-memory PDFs for tests.

use crate::annotation::{Border, LinkAnnotation, LinkTarget, Rect};
use crate::destinations::{deref, Fit};
use lopdf::{
    content::{Content, Operation},
    dictionary, Document, Object, ObjectId, Stream, StringFormat,
};

/// Describes a small PDF: `pages` pages, each showing `"<label>-<index>"`.
pub struct Fixture {
    label: String,
    pages: Vec<Vec<String>>,
    destinations: Vec<(String, usize, Fit)>,
    name_tree: bool,
    outline: Vec<String>,
}

pub fn fixture(label: &str, pages: usize) -> Fixture {
    Fixture {
        label: label.to_string(),
        pages: vec![vec![]; pages],
        destinations: vec![],
        name_tree: false,
        outline: vec![],
    }
}

impl Fixture {
    /// Adds one URI link annotation per entry to `page`.
    pub fn links(mut self, page: usize, uris: &[&str]) -> Self {
        self.pages[page].extend(uris.iter().map(|uri| uri.to_string()));
        self
    }

    pub fn destination(self, name: &str, page: usize) -> Self {
        self.destination_with(name, page, Fit::fit())
    }

    pub fn destination_with(mut self, name: &str, page: usize, fit: Fit) -> Self {
        self.destinations.push((name.to_string(), page, fit));
        self
    }

    /// Store destinations in a `/Names` tree instead of the catalog `/Dests`.
    pub fn name_tree(mut self) -> Self {
        self.name_tree = true;
        self
    }

    pub fn outline(mut self, titles: &[&str]) -> Self {
        self.outline = titles.iter().map(|title| title.to_string()).collect();
        self
    }

    pub fn build(self) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut page_ids = vec![];
        for (i, links) in self.pages.iter().enumerate() {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 48.into()]),
                    Operation::new("Td", vec![100.into(), 600.into()]),
                    Operation::new(
                        "Tj",
                        vec![Object::string_literal(format!("{}-{i}", self.label))],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));

            let annots: Vec<Object> = links
                .iter()
                .map(|uri| doc.add_object(uri_link(uri)).into())
                .collect();

            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            };
            if !annots.is_empty() {
                page.set("Annots", annots);
            }
            page_ids.push(doc.add_object(page));
        }

        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().copied().map(Object::Reference).collect::<Vec<_>>(),
            "Count" => page_ids.len() as i64,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        };

        if !self.destinations.is_empty() {
            let dests = self
                .destinations
                .iter()
                .map(|(name, page, fit)| (name.clone(), fit.to_destination(page_ids[*page])));
            if self.name_tree {
                let names: Vec<Object> = dests
                    .flat_map(|(name, dest)| {
                        [Object::String(name.into_bytes(), StringFormat::Literal), dest]
                    })
                    .collect();
                let tree_id = doc.add_object(dictionary! { "Names" => names });
                catalog.set("Names", dictionary! { "Dests" => tree_id });
            } else {
                let mut table = lopdf::Dictionary::new();
                for (name, dest) in dests {
                    table.set(name.into_bytes(), dest);
                }
                catalog.set("Dests", table);
            }
        }

        if !self.outline.is_empty() {
            let root_id = doc.new_object_id();
            let item_ids: Vec<ObjectId> = self.outline.iter().map(|_| doc.new_object_id()).collect();
            for (i, title) in self.outline.iter().enumerate() {
                let mut item = dictionary! {
                    "Title" => Object::string_literal(title.as_str()),
                    "Parent" => root_id,
                    "Dest" => Fit::fit().to_destination(page_ids[0]),
                };
                if i > 0 {
                    item.set("Prev", item_ids[i - 1]);
                }
                if i + 1 < item_ids.len() {
                    item.set("Next", item_ids[i + 1]);
                }
                doc.objects.insert(item_ids[i], Object::Dictionary(item));
            }
            doc.objects.insert(
                root_id,
                Object::Dictionary(dictionary! {
                    "Type" => "Outlines",
                    "First" => item_ids[0],
                    "Last" => item_ids[item_ids.len() - 1],
                    "Count" => item_ids.len() as i64,
                }),
            );
            catalog.set("Outlines", root_id);
        }

        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", catalog_id);

        doc
    }

    pub fn to_bytes(self) -> Vec<u8> {
        let mut doc = self.build();
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }
}

pub fn uri_link(uri: &str) -> lopdf::Dictionary {
    LinkAnnotation {
        border: Some(Border {
            radii: (0.0, 0.0),
            width: 1.0,
            dash: None,
        }),
        rect: Rect {
            x0: 72.0,
            y0: 700.0,
            x1: 272.0,
            y1: 720.0,
        },
        target: LinkTarget::ExternalUri(uri.to_string()),
    }
    .to_dictionary(&[])
    .unwrap()
}

pub fn string(object: &Object) -> String {
    match object {
        Object::String(bytes, _) => String::from_utf8_lossy(bytes).into_owned(),
        other => panic!("expected a string, got {other:?}"),
    }
}

/// The text each page shows, which for fixtures is `"<label>-<index>"`.
pub fn page_labels(doc: &Document, page_ids: &[ObjectId]) -> Vec<String> {
    page_ids
        .iter()
        .map(|page_id| {
            let content = Content::decode(&doc.get_page_content(*page_id).unwrap()).unwrap();
            content
                .operations
                .iter()
                .find(|op| op.operator == "Tj")
                .map(|op| string(&op.operands[0]))
                .unwrap()
        })
        .collect()
}

/// Where a link annotation on a page points.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Uri(String),
    /// 0-based page index and fit type
    Page(usize, String),
    Other,
}

/// The targets of every annotation on a page, in `/Annots` order.
pub fn targets(doc: &Document, page: usize) -> Vec<Target> {
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    let page_dict = doc.get_dictionary(page_ids[page]).unwrap();
    let Ok(annots) = page_dict.get(b"Annots") else {
        return vec![];
    };

    deref(doc, annots)
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|annot| {
            let annot = deref(doc, annot).unwrap().as_dict().unwrap();
            if let Ok(dest) = annot.get_deref(b"Dest", doc).and_then(Object::as_array) {
                let page_ref = dest[0].as_reference().unwrap();
                let index = page_ids.iter().position(|id| *id == page_ref).unwrap();
                let fit = String::from_utf8_lossy(dest[1].as_name().unwrap()).into_owned();
                Target::Page(index, fit)
            } else if let Ok(action) = annot.get_deref(b"A", doc).and_then(Object::as_dict) {
                Target::Uri(string(action.get_deref(b"URI", doc).unwrap()))
            } else {
                Target::Other
            }
        })
        .collect()
}
