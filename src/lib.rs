// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! Merges PDFs rendered from the pages of a web site into one PDF and turns
//! links between those pages into links inside the merged PDF.

pub mod annotation;
pub mod config;
pub mod destinations;
pub mod document;
mod error;
pub mod merge;
pub mod mutate;
pub mod resolve;
pub mod url_index;

#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use error::{Error, Result};
pub use merge::{merge_documents, merge_pdfs, validate, MergeOptions, MergeOutput, Metadata};
pub use resolve::Diagnostic;
