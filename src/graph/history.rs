//! Backward walk that finds a path's earliest name.
//!
//! The crawl runs from low to high revisions, but the query path is given
//! at the peg revision. If the path was renamed or branched somewhere in
//! its past it had a different name back then; this walk follows copy
//! sources downward until it reaches the revision where the line of
//! history begins.

use crate::log::cache::CachedLog;
use crate::log::dictionary::TempPath;
use crate::log::record::{ChangeAction, Revision};

/// Resolves `path`@`peg` to its original name and the revision where that
/// history starts.
pub fn find_start_path(log: &CachedLog, peg: Revision, path: &TempPath) -> (TempPath, Revision) {
    let dictionary = log.dictionary();
    let mut current = path.clone();
    let mut revision = peg;
    let mut initial = peg;

    while revision > 0 {
        if let Some(data) = log.revision(revision) {
            initial = revision;

            // deepest add/replace that covers the current path wins
            let mut creation = None;
            for record in &data.records {
                if !matches!(record.action, ChangeAction::Added | ChangeAction::Replaced) {
                    continue;
                }
                if !current.is_same_or_child_of(dictionary, record.path) {
                    continue;
                }
                let depth = dictionary.depth(record.path);
                if creation.is_none_or(|(best, _)| depth > best) {
                    creation = Some((depth, record));
                }
            }

            if let Some((_, record)) = creation {
                match record.copy_from {
                    Some((from_path, from_revision)) => {
                        // renamed or branched: continue under the old name
                        current = current.replace_parent(dictionary, record.path, from_path);
                        revision = from_revision;
                        continue;
                    }
                    None => break, // added from scratch: history starts here
                }
            }
        }
        revision -= 1;
    }

    (current, initial)
}
