// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

use crate::annotation::{AnnotationHandle, LinkAnnotation, LinkTarget};
use crate::document::MergedDocument;
use crate::error::{Error, Result};

/// One queued edit of a page's annotations.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingChange {
    Remove(AnnotationHandle),
    Add {
        page: usize,
        annotation: LinkAnnotation,
    },
}

#[derive(Debug)]
struct Queued {
    change: PendingChange,
    applied: bool,
}

/// Edits collected while the merged document is being read, applied in one go
/// afterwards.
#[derive(Debug, Default)]
pub struct ChangeSet {
    changes: Vec<Queued>,
}

/// What [`ChangeSet::apply`] did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AppliedChanges {
    pub removed: usize,
    pub added: usize,
}

impl ChangeSet {
    pub fn push(&mut self, change: PendingChange) {
        self.changes.push(Queued {
            change,
            applied: false,
        });
    }

    /// Queues swapping the annotation behind `handle` for `annotation` on the
    /// same page.
    pub fn replace(&mut self, handle: AnnotationHandle, annotation: LinkAnnotation) {
        self.push(PendingChange::Remove(handle));
        self.push(PendingChange::Add {
            page: handle.page,
            annotation,
        });
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Changes not applied yet.
    pub fn pending(&self) -> usize {
        self.changes.iter().filter(|queued| !queued.applied).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingChange> {
        self.changes.iter().map(|queued| &queued.change)
    }

    /// Applies every pending change: all removals first, then all additions.
    /// Changes that were applied before are skipped, so applying twice is a
    /// no-op.
    ///
    /// Every addition is checked before anything is touched, an invalid one
    /// fails the whole set.
    pub fn apply(&mut self, merged: &mut MergedDocument) -> Result<AppliedChanges> {
        let pages = merged.page_count();
        for queued in self.changes.iter().filter(|queued| !queued.applied) {
            if let PendingChange::Add { page, annotation } = &queued.change {
                let target = match annotation.target {
                    LinkTarget::InternalPage { page, .. } => page,
                    LinkTarget::ExternalUri(_) => *page,
                };
                if *page >= pages || target >= pages {
                    return Err(Error::InvalidTarget {
                        page: (*page).max(target),
                        pages,
                    });
                }
            }
        }

        let mut applied = AppliedChanges::default();

        for queued in self.changes.iter_mut().filter(|queued| !queued.applied) {
            if let PendingChange::Remove(handle) = queued.change {
                if merged.remove_annotation(handle)? {
                    applied.removed += 1;
                } else {
                    log::debug!("Annotation {:?} was already gone from page {}", handle.id, handle.page);
                }
                queued.applied = true;
            }
        }

        for queued in self.changes.iter_mut().filter(|queued| !queued.applied) {
            if let PendingChange::Add { page, annotation } = &queued.change {
                let dictionary = annotation.to_dictionary(merged.page_ids())?;
                merged.add_annotation(*page, dictionary)?;
                applied.added += 1;
                queued.applied = true;
            }
        }

        Ok(applied)
    }
}
