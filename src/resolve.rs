// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! Turns links to the site the documents were published on into links to the
//! pages they now occupy in the merged document.

use crate::annotation::{link_uri, AnnotationHandle, LinkAnnotation, LinkTarget};
use crate::destinations::NamedDestination;
use crate::document::MergedDocument;
use crate::error::Result;
use crate::mutate::ChangeSet;
use crate::url_index::UrlIndex;
use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::fmt;

/// What a URL refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference<'a> {
    /// `document#anchor`, a heading or other named position in a page.
    Anchor { document: Cow<'a, str>, anchor: &'a str },
    /// A whole page.
    Page { url: Cow<'a, str> },
}

/// Pages published at a directory root are served as its `index.html`.
fn with_index_page(url: &str) -> Cow<'_, str> {
    if url.ends_with('/') {
        Cow::Owned(format!("{url}index.html"))
    } else {
        Cow::Borrowed(url)
    }
}

/// Splits a URL at its last `#`. An empty fragment refers to the whole page.
pub fn classify(uri: &str) -> Reference<'_> {
    match uri.rsplit_once('#') {
        Some((document, anchor)) if !anchor.is_empty() => Reference::Anchor {
            document: with_index_page(document),
            anchor,
        },
        Some((document, _)) => Reference::Page {
            url: with_index_page(document),
        },
        None => Reference::Page {
            url: with_index_page(uri),
        },
    }
}

/// A link that matched the base URL but could not be rewritten. The link is
/// left pointing at its original URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// No named destination matches the anchor.
    UnresolvedAnchor { page: usize, uri: String },
    /// The URL is not one of the declared source URLs.
    UnresolvedLink { page: usize, uri: String },
    /// The link has no usable `/Rect`, so it cannot be rebuilt.
    MalformedLink { page: usize, uri: String },
    /// The named destination exists but its page could not be followed.
    BrokenDestination {
        page: usize,
        uri: String,
        reason: String,
    },
}

impl Diagnostic {
    /// 0-based index of the page the link is on.
    pub fn page(&self) -> usize {
        match self {
            Diagnostic::UnresolvedAnchor { page, .. }
            | Diagnostic::UnresolvedLink { page, .. }
            | Diagnostic::MalformedLink { page, .. }
            | Diagnostic::BrokenDestination { page, .. } => *page,
        }
    }

    pub fn uri(&self) -> &str {
        match self {
            Diagnostic::UnresolvedAnchor { uri, .. }
            | Diagnostic::UnresolvedLink { uri, .. }
            | Diagnostic::MalformedLink { uri, .. }
            | Diagnostic::BrokenDestination { uri, .. } => uri,
        }
    }

    pub fn is_anchor(&self) -> bool {
        !matches!(
            self,
            Diagnostic::UnresolvedLink { .. } | Diagnostic::MalformedLink { .. }
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // +1 because pages are zero indexed but humans are one indexed.
        write!(f, "Page No. {}: {}", self.page() + 1, self.uri())?;
        match self {
            Diagnostic::BrokenDestination { reason, .. } => write!(f, " ({reason})")?,
            Diagnostic::MalformedLink { .. } => write!(f, " (link has no usable /Rect)")?,
            _ => {}
        }
        Ok(())
    }
}

/// The outcome of reading every link of a merged document.
#[derive(Debug, Default)]
pub struct Resolution {
    pub changes: ChangeSet,
    pub diagnostics: Vec<Diagnostic>,
}

/// Classifies and resolves every URI link starting with `base_url`, on every
/// page. The document is only read, the replacements are queued in
/// [`Resolution::changes`].
pub fn resolve_links(merged: &MergedDocument, index: &UrlIndex, base_url: &str) -> Result<Resolution> {
    let mut resolution = Resolution::default();
    if base_url.is_empty() {
        return Ok(resolution);
    }

    let doc = merged.document();
    for page in 0..merged.page_count() {
        for id in merged.annotation_ids(page)? {
            let Ok(annotation) = doc.get_dictionary(id) else {
                log::debug!("Skipping annotation {id:?} on page {page}, it is not a dictionary");
                continue;
            };
            let Some(uri) = link_uri(doc, annotation) else {
                continue;
            };
            // We only care about URLs that are part of the published site.
            if !uri.starts_with(base_url) {
                continue;
            }
            let Some(link) = LinkAnnotation::from_dict(doc, annotation) else {
                let diagnostic = Diagnostic::MalformedLink { page, uri };
                log::warn!("Unable to remap {diagnostic}");
                resolution.diagnostics.push(diagnostic);
                continue;
            };

            match resolve_uri(merged, index, page, &uri) {
                Ok(target) => {
                    log::debug!("Page {page}: {uri} -> {target:?}");
                    resolution
                        .changes
                        .replace(AnnotationHandle { page, id }, link.retarget(target));
                }
                Err(diagnostic) => {
                    log::warn!("Unable to remap {diagnostic}");
                    resolution.diagnostics.push(diagnostic);
                }
            }
        }
    }

    Ok(resolution)
}

fn resolve_uri(
    merged: &MergedDocument,
    index: &UrlIndex,
    page: usize,
    uri: &str,
) -> Result<LinkTarget, Diagnostic> {
    match classify(uri) {
        Reference::Anchor { document, anchor } => {
            // Anchors of a declared page only match that page's destinations.
            let scope = index.get(&document).map(|binding| binding.document);
            let value = merged
                .find_destination(scope, anchor.as_bytes())
                .or_else(|| {
                    let decoded = percent_decode_str(anchor).collect::<Vec<u8>>();
                    merged.find_destination(scope, &decoded)
                })
                .ok_or_else(|| Diagnostic::UnresolvedAnchor {
                    page,
                    uri: uri.to_string(),
                })?;

            let broken = |reason: String| Diagnostic::BrokenDestination {
                page,
                uri: uri.to_string(),
                reason,
            };
            let destination = NamedDestination::from_object(merged.document(), value)
                .map_err(|err| broken(err.to_string()))?;
            let target_page = merged
                .page_index(destination.page)
                .ok_or_else(|| broken("destination page is not part of the merged document".to_string()))?;

            Ok(LinkTarget::InternalPage {
                page: target_page,
                fit: Some(destination.fit),
            })
        }
        Reference::Page { url } => match index.first_page(&url) {
            Some(first_page) if first_page < merged.page_count() => Ok(LinkTarget::InternalPage {
                page: first_page,
                fit: None,
            }),
            _ => Err(Diagnostic::UnresolvedLink {
                page,
                uri: uri.to_string(),
            }),
        },
    }
}
