// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

/// Result type used throughout the merge engine.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that abort a merge. Resolution misses are not errors, see
/// [`Diagnostic`](crate::Diagnostic).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Merging needs at least two documents.
    #[error("At least two PDF files are required, found {found}.")]
    TooFewDocuments { found: usize },

    /// A non-empty URL list must have one URL per document.
    #[error("Each PDF must have a URL: got {urls} URLs for {documents} PDFs.")]
    UrlCountMismatch { documents: usize, urls: usize },

    /// An input could not be parsed as a PDF.
    #[error("Unable to load PDF #{index}: {source}")]
    Load {
        index: usize,
        #[source]
        source: lopdf::Error,
    },

    #[error("PDF #{index} is encrypted, merging encrypted documents is not supported.")]
    Encrypted { index: usize },

    #[error("Catalog root not found.")]
    MissingCatalog,

    #[error("No Pages found.")]
    NoPages,

    /// A queued link points outside the merged page sequence.
    #[error("Link on page index {page} targets a page outside the document ({pages} pages).")]
    InvalidTarget { page: usize, pages: usize },

    #[error(transparent)]
    Pdf(#[from] lopdf::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
