//! Forward copy relation extracted from the cached log.
//!
//! Every change record with a copy source becomes one [`CopyInfo`]. The
//! crawl consumes the relation twice, in different orders: once by source
//! revision (to record which tracked paths depart through the copy) and
//! once by target revision (to materialize the arriving paths). Both views
//! are stably sorted index vectors over the same storage, so a copy's
//! target list is shared between the two passes.
//!
//! A copy always satisfies `from_revision < to_revision`, which guarantees
//! the departure pass has filled `targets` before the arrival pass reads
//! them.

use derive_new::new;

use crate::graph::entry::EntryHandle;
use crate::log::cache::CachedLog;
use crate::log::dictionary::{PathIndex, TempPath};
use crate::log::record::{ChangeMask, Revision};

/// One tracked path leaving through a copy: the graph node that represents
/// the source state and the path it will have on the target side.
#[derive(Debug, Clone, new)]
pub struct CopyTarget {
    pub source: EntryHandle,
    pub path: TempPath,
}

#[derive(Debug, Clone)]
pub struct CopyInfo {
    pub from_revision: Revision,
    pub from_path: PathIndex,
    pub to_revision: Revision,
    pub to_path: PathIndex,
    /// Filled at `from_revision`, consumed at `to_revision`.
    pub targets: Vec<CopyTarget>,
}

#[derive(Debug, Default)]
pub struct CopyIndex {
    copies: Vec<CopyInfo>,
    by_from: Vec<usize>,
    by_to: Vec<usize>,
}

impl CopyIndex {
    pub fn build(log: &CachedLog) -> Self {
        let mut copies = Vec::new();
        for revision in 0..=log.max_revision() {
            let Some(data) = log.revision(revision) else {
                continue;
            };
            if !data.mask.contains(ChangeMask::HAS_COPY_FROM) {
                continue;
            }
            for record in &data.records {
                if let Some((from_path, from_revision)) = record.copy_from {
                    copies.push(CopyInfo {
                        from_revision,
                        from_path,
                        to_revision: revision,
                        to_path: record.path,
                        targets: Vec::new(),
                    });
                }
            }
        }

        // built in target-revision order already
        let by_to: Vec<usize> = (0..copies.len()).collect();
        let mut by_from = by_to.clone();
        by_from.sort_by_key(|&i| copies[i].from_revision);

        Self {
            copies,
            by_from,
            by_to,
        }
    }

    pub fn get(&self, index: usize) -> &CopyInfo {
        &self.copies[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut CopyInfo {
        &mut self.copies[index]
    }

    /// Copy indices ordered by source revision.
    pub fn by_from(&self) -> &[usize] {
        &self.by_from
    }

    /// Copy indices ordered by target revision.
    pub fn by_to(&self) -> &[usize] {
        &self.by_to
    }

    pub fn len(&self) -> usize {
        self.copies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }
}
