// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

use crate::document::{MergeBuilder, MergedDocument};
use crate::error::{Error, Result};
use crate::mutate::AppliedChanges;
use crate::resolve::{resolve_links, Diagnostic};
use crate::url_index::UrlIndex;
use chrono::{DateTime, FixedOffset, Local};
use lopdf::{dictionary, Document, Object};
use serde::Deserialize;

/// Written to the Info dictionary of the merged PDF.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub creator: String,
    pub producer: String,
}

impl Default for Metadata {
    fn default() -> Self {
        Metadata {
            creator: env!("CARGO_PKG_NAME").to_string(),
            producer: concat!("lopdf - ", env!("CARGO_PKG_NAME")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// The URL each input was published at, in input order. Empty disables
    /// link rewriting.
    pub urls: Vec<String>,
    /// Only links starting with this prefix are rewritten. Empty disables
    /// link rewriting.
    pub base_url: String,
    pub metadata: Metadata,
    /// Creation and modification date. Defaults to now.
    pub timestamp: Option<DateTime<FixedOffset>>,
}

#[derive(Debug)]
pub struct MergeOutput {
    /// The serialised merged PDF.
    pub pdf: Vec<u8>,
    pub page_count: usize,
    /// Links now pointing inside the merged PDF.
    pub rewritten: usize,
    /// Links that matched the base URL but were left pointing at the site.
    pub diagnostics: Vec<Diagnostic>,
}

impl MergeOutput {
    pub fn unresolved_links(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_anchor())
    }

    pub fn unresolved_anchors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_anchor())
    }
}

/// Checks the inputs before any document is parsed.
pub fn validate(documents: usize, urls: &[String]) -> Result<()> {
    if documents < 2 {
        return Err(Error::TooFewDocuments { found: documents });
    }
    if !urls.is_empty() && urls.len() != documents {
        return Err(Error::UrlCountMismatch {
            documents,
            urls: urls.len(),
        });
    }
    Ok(())
}

fn load(index: usize, bytes: &[u8]) -> Result<Document> {
    let doc = Document::load_mem(bytes).map_err(|source| Error::Load { index, source })?;
    if doc.trailer.has(b"Encrypt") {
        return Err(Error::Encrypted { index });
    }
    Ok(doc)
}

/// Merges serialised PDFs, in order, into one PDF.
pub fn merge_pdfs<B: AsRef<[u8]>>(inputs: &[B], options: &MergeOptions) -> Result<MergeOutput> {
    validate(inputs.len(), &options.urls)?;

    let documents = inputs
        .iter()
        .enumerate()
        .map(|(index, bytes)| load(index, bytes.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    merge_documents(documents, options)
}

/// Merges already parsed documents, in order, into one PDF.
pub fn merge_documents(documents: Vec<Document>, options: &MergeOptions) -> Result<MergeOutput> {
    validate(documents.len(), &options.urls)?;

    let mut builder = MergeBuilder::new();
    for doc in documents {
        builder.append(doc)?;
    }
    let mut merged = builder.finish()?;

    let (applied, diagnostics) = rewrite_links(&mut merged, &options.urls, &options.base_url)?;

    let timestamp = options
        .timestamp
        .unwrap_or_else(|| Local::now().fixed_offset());
    let date = pdf_date(&timestamp);
    merged.set_info(dictionary! {
        "CreationDate" => Object::string_literal(date.as_str()),
        "ModDate" => Object::string_literal(date.as_str()),
        "Creator" => Object::string_literal(options.metadata.creator.as_str()),
        "Producer" => Object::string_literal(options.metadata.producer.as_str()),
    });

    let page_count = merged.page_count();
    let pdf = merged.save_to_vec()?;

    Ok(MergeOutput {
        pdf,
        page_count,
        rewritten: applied.added,
        diagnostics,
    })
}

/// Rewrites links to the published site into links inside the merged
/// document. Does nothing without URLs or a base URL.
pub fn rewrite_links(
    merged: &mut MergedDocument,
    urls: &[String],
    base_url: &str,
) -> Result<(AppliedChanges, Vec<Diagnostic>)> {
    if urls.is_empty() || base_url.is_empty() {
        log::debug!("No URLs or base URL given, links are left as they are");
        return Ok((AppliedChanges::default(), vec![]));
    }

    merged.promote_inline_annotations()?;
    let index = UrlIndex::build(merged.sources(), urls)?;
    let mut resolution = resolve_links(merged, &index, base_url)?;
    let applied = resolution.changes.apply(merged)?;

    log::info!(
        "Rewrote {} links, {} could not be remapped",
        applied.added,
        resolution.diagnostics.len()
    );
    Ok((applied, resolution.diagnostics))
}

/// Formats a date the way PDF date strings are written, e.g.
/// `D:20240801123000+02'00'`.
pub fn pdf_date(timestamp: &DateTime<FixedOffset>) -> String {
    let offset = timestamp.offset().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let offset = offset.abs();
    format!(
        "D:{}{sign}{:02}'{:02}'",
        timestamp.format("%Y%m%d%H%M%S"),
        offset / 3600,
        offset % 3600 / 60
    )
}
