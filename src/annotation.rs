// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

use crate::destinations::{deref, Fit};
use crate::error::{Error, Result};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};

/// Identifies one annotation instance on one page of a merged document.
///
/// The object ID stays the same while other annotations are added to or
/// removed from the page, unlike the annotation's position in `/Annots`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnnotationHandle {
    pub page: usize,
    pub id: ObjectId,
}

/// An annotation rectangle in default user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn from_object(doc: &Document, object: &Object) -> Option<Self> {
        let coords = deref(doc, object).ok()?.as_array().ok()?;
        let [x0, y0, x1, y1] = coords.as_slice() else {
            return None;
        };
        Some(Rect {
            x0: x0.as_float().ok()?,
            y0: y0.as_float().ok()?,
            x1: x1.as_float().ok()?,
            y1: y1.as_float().ok()?,
        })
    }

    pub fn to_object(self) -> Object {
        Object::Array(vec![
            self.x0.into(),
            self.y0.into(),
            self.x1.into(),
            self.y1.into(),
        ])
    }
}

/// The `/Border` array: corner radii, width and an optional dash pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Border {
    pub radii: (f32, f32),
    pub width: f32,
    pub dash: Option<Vec<f32>>,
}

impl Border {
    pub fn from_object(doc: &Document, object: &Object) -> Option<Self> {
        let values = deref(doc, object).ok()?.as_array().ok()?;
        let number = |i: usize| values.get(i).and_then(|v| v.as_float().ok());
        let dash = match values.get(3) {
            Some(dash) => Some(
                deref(doc, dash)
                    .ok()?
                    .as_array()
                    .ok()?
                    .iter()
                    .filter_map(|v| v.as_float().ok())
                    .collect(),
            ),
            None => None,
        };
        Some(Border {
            radii: (number(0)?, number(1)?),
            width: number(2)?,
            dash,
        })
    }

    pub fn to_object(&self) -> Object {
        let mut values: Vec<Object> = vec![self.radii.0.into(), self.radii.1.into(), self.width.into()];
        if let Some(dash) = &self.dash {
            values.push(Object::Array(dash.iter().map(|&d| d.into()).collect()));
        }
        Object::Array(values)
    }
}

/// The URI of a `/Link` annotation with a URI action.
pub fn link_uri(doc: &Document, annotation: &Dictionary) -> Option<String> {
    let subtype = annotation
        .get_deref(b"Subtype", doc)
        .and_then(Object::as_name)
        .ok()?;
    if subtype != b"Link" {
        return None;
    }

    let action = annotation.get_deref(b"A", doc).and_then(Object::as_dict).ok()?;
    action
        .get_deref(b"URI", doc)
        .and_then(lopdf::decode_text_string)
        .ok()
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget {
    /// A `/URI` action, the form links have when they come out of a browser.
    ExternalUri(String),
    /// A GoTo destination inside the merged document. Without a fit the whole
    /// page is shown.
    InternalPage { page: usize, fit: Option<Fit> },
}

/// A `/Link` annotation. Only the parts the merge touches are modelled; any
/// other annotation passes through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkAnnotation {
    pub border: Option<Border>,
    pub rect: Rect,
    pub target: LinkTarget,
}

impl LinkAnnotation {
    /// Reads a link annotation whose action carries a URI. Returns `None` for
    /// every other kind of annotation, including links that already jump to a
    /// destination.
    pub fn from_dict(doc: &Document, annotation: &Dictionary) -> Option<Self> {
        let uri = link_uri(doc, annotation)?;

        let rect = match annotation.get(b"Rect") {
            Ok(rect) => Rect::from_object(doc, rect)?,
            Err(_) => {
                log::debug!("Ignoring link to {uri} without a usable /Rect");
                return None;
            }
        };
        let border = annotation
            .get(b"Border")
            .ok()
            .and_then(|border| Border::from_object(doc, border));

        Some(LinkAnnotation {
            border,
            rect,
            target: LinkTarget::ExternalUri(uri),
        })
    }

    /// The same link, pointing somewhere else.
    pub fn retarget(&self, target: LinkTarget) -> Self {
        LinkAnnotation {
            target,
            ..self.clone()
        }
    }

    /// Builds the annotation dictionary. `pages` maps page indices of the
    /// merged document to page objects.
    pub fn to_dictionary(&self, pages: &[ObjectId]) -> Result<Dictionary> {
        let mut annotation = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => self.rect.to_object(),
        };
        if let Some(border) = &self.border {
            annotation.set("Border", border.to_object());
        }

        match &self.target {
            LinkTarget::ExternalUri(uri) => {
                annotation.set(
                    "A",
                    dictionary! {
                        "Type" => "Action",
                        "S" => "URI",
                        "URI" => Object::string_literal(uri.as_str()),
                    },
                );
            }
            LinkTarget::InternalPage { page, fit } => {
                let page_id = pages.get(*page).ok_or(Error::InvalidTarget {
                    page: *page,
                    pages: pages.len(),
                })?;
                let dest = fit.clone().unwrap_or_default().to_destination(*page_id);
                annotation.set("Dest", dest);
            }
        }

        Ok(annotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link_dict(uri: &str) -> Dictionary {
        dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => vec![10.into(), 20.into(), 110.5.into(), 40.into()],
            "Border" => vec![0.into(), 0.into(), 1.into(), Object::Array(vec![3.into(), 2.into()])],
            "A" => dictionary! {
                "S" => "URI",
                "URI" => Object::string_literal(uri),
            },
        }
    }

    #[test]
    fn test_read_uri_link() {
        let doc = Document::with_version("1.5");
        let link = LinkAnnotation::from_dict(&doc, &link_dict("http://example.com/a.html")).unwrap();

        assert_eq!(
            link.target,
            LinkTarget::ExternalUri("http://example.com/a.html".to_string())
        );
        assert_eq!(
            link.rect,
            Rect {
                x0: 10.0,
                y0: 20.0,
                x1: 110.5,
                y1: 40.0
            }
        );
        assert_eq!(
            link.border,
            Some(Border {
                radii: (0.0, 0.0),
                width: 1.0,
                dash: Some(vec![3.0, 2.0]),
            })
        );
    }

    #[test]
    fn test_action_through_reference() {
        let mut doc = Document::with_version("1.5");
        let action_id = doc.add_object(dictionary! {
            "S" => "URI",
            "URI" => Object::string_literal("http://example.com/"),
        });
        let annotation = dictionary! {
            "Subtype" => "Link",
            "Rect" => vec![0.into(), 0.into(), 1.into(), 1.into()],
            "A" => action_id,
        };

        let link = LinkAnnotation::from_dict(&doc, &annotation).unwrap();
        assert_eq!(link.target, LinkTarget::ExternalUri("http://example.com/".to_string()));
        assert_eq!(link.border, None);
    }

    #[test]
    fn test_other_annotations_are_ignored() {
        let doc = Document::with_version("1.5");
        let text = dictionary! { "Subtype" => "Text", "Rect" => vec![0.into(), 0.into(), 1.into(), 1.into()] };
        let goto = dictionary! {
            "Subtype" => "Link",
            "Rect" => vec![0.into(), 0.into(), 1.into(), 1.into()],
            "Dest" => "intro",
        };
        let mut no_rect = link_dict("http://example.com/");
        no_rect.remove(b"Rect");

        assert_eq!(LinkAnnotation::from_dict(&doc, &text), None);
        assert_eq!(LinkAnnotation::from_dict(&doc, &goto), None);
        assert_eq!(LinkAnnotation::from_dict(&doc, &no_rect), None);
        // The URI is still readable without a /Rect
        assert_eq!(
            link_uri(&doc, &no_rect),
            Some("http://example.com/".to_string())
        );
        assert_eq!(link_uri(&doc, &goto), None);
    }

    #[test]
    fn test_internal_link_dictionary() {
        let doc = Document::with_version("1.5");
        let link = LinkAnnotation::from_dict(&doc, &link_dict("http://example.com/a.html"))
            .unwrap()
            .retarget(LinkTarget::InternalPage { page: 1, fit: None });

        let dict = link.to_dictionary(&[(4, 0), (9, 0)]).unwrap();

        assert!(!dict.has(b"A"));
        let dest = dict.get(b"Dest").unwrap().as_array().unwrap();
        assert_eq!(dest[0].as_reference().unwrap(), (9, 0));
        assert_eq!(dest[1].as_name().unwrap(), b"Fit");
        assert_eq!(
            Border::from_object(&doc, dict.get(b"Border").unwrap()),
            link.border
        );
        assert_eq!(Rect::from_object(&doc, dict.get(b"Rect").unwrap()), Some(link.rect));
    }

    #[test]
    fn test_internal_link_outside_document() {
        let doc = Document::with_version("1.5");
        let link = LinkAnnotation::from_dict(&doc, &link_dict("http://example.com/a.html"))
            .unwrap()
            .retarget(LinkTarget::InternalPage { page: 2, fit: None });

        assert!(matches!(
            link.to_dictionary(&[(4, 0), (9, 0)]),
            Err(Error::InvalidTarget { page: 2, pages: 2 })
        ));
    }
}
