// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

use crate::document::SourceDocument;
use crate::error::{Error, Result};
use indexmap::IndexMap;

/// Where the document published at a URL begins in the merged document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceBinding {
    /// Position of the document in merge order.
    pub document: usize,
    pub first_page: usize,
}

/// Maps each declared source URL to its [`SourceBinding`]. Built once all
/// documents are appended and only read afterwards.
#[derive(Debug, Clone, Default)]
pub struct UrlIndex {
    bindings: IndexMap<String, SourceBinding>,
}

impl UrlIndex {
    /// `urls` is parallel to `sources`. An empty list gives an empty index.
    ///
    /// When the same URL is declared twice the later document wins.
    pub fn build(sources: &[SourceDocument], urls: &[String]) -> Result<Self> {
        if !urls.is_empty() && urls.len() != sources.len() {
            return Err(Error::UrlCountMismatch {
                documents: sources.len(),
                urls: urls.len(),
            });
        }

        let mut bindings = IndexMap::new();
        for (document, (url, source)) in urls.iter().zip(sources).enumerate() {
            let binding = SourceBinding {
                document,
                first_page: source.first_page,
            };
            if let Some(previous) = bindings.insert(url.clone(), binding) {
                log::warn!(
                    "{url} is declared for PDF #{} and PDF #{document}, links will go to the latter",
                    previous.document
                );
            }
        }

        Ok(UrlIndex { bindings })
    }

    pub fn get(&self, url: &str) -> Option<SourceBinding> {
        self.bindings.get(url).copied()
    }

    pub fn first_page(&self, url: &str) -> Option<usize> {
        self.get(url).map(|binding| binding.first_page)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SourceBinding)> {
        self.bindings.iter().map(|(url, binding)| (url.as_str(), *binding))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MergeBuilder;
    use crate::test_utils::fixture;

    fn sources(page_counts: &[usize]) -> Vec<SourceDocument> {
        let mut builder = MergeBuilder::new();
        for (i, pages) in page_counts.iter().enumerate() {
            builder.append(fixture(&i.to_string(), *pages).build()).unwrap();
        }
        builder.finish().unwrap().sources().to_vec()
    }

    fn urls(urls: &[&str]) -> Vec<String> {
        urls.iter().map(|url| url.to_string()).collect()
    }

    #[test]
    fn test_first_pages_follow_merge_order() {
        let index = UrlIndex::build(
            &sources(&[3, 1, 2]),
            &urls(&["http://x/index.html", "http://x/a.html", "http://x/b.html"]),
        )
        .unwrap();

        let pages: Vec<(&str, usize)> = index
            .iter()
            .map(|(url, binding)| (url, binding.first_page))
            .collect();
        assert_eq!(
            pages,
            vec![
                ("http://x/index.html", 0),
                ("http://x/a.html", 3),
                ("http://x/b.html", 4)
            ]
        );
        assert_eq!(
            index.get("http://x/b.html"),
            Some(SourceBinding {
                document: 2,
                first_page: 4
            })
        );
        assert_eq!(index.first_page("http://x/c.html"), None);
    }

    #[test]
    fn test_empty_url_list() {
        let index = UrlIndex::build(&sources(&[1, 1]), &[]).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_url_count_mismatch() {
        assert!(matches!(
            UrlIndex::build(&sources(&[1, 1]), &urls(&["http://x/a.html"])),
            Err(Error::UrlCountMismatch {
                documents: 2,
                urls: 1
            })
        ));
    }

    #[test]
    fn test_duplicate_url_keeps_later_document() {
        let index = UrlIndex::build(
            &sources(&[2, 2]),
            &urls(&["http://x/a.html", "http://x/a.html"]),
        )
        .unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.first_page("http://x/a.html"), Some(2));
    }
}
