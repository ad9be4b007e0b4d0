//! Graph optimization passes.
//!
//! Runs over the revision-ordered node list in a fixed sequence: fold
//! delete+copy pairs into renames, classify nodes, propagate
//! classification backwards along copy history, prune deleted subtrees,
//! apply the user filter, fold tags and finally compact the node list.
//! Passes communicate through node state only; a node scheduled for
//! removal gets action [`EntryAction::Nothing`] and is dropped by the
//! compaction step at the end.

use crate::graph::GraphFilter;
use crate::graph::GraphOptions;
use crate::graph::classify::{Classification, PathClassifier};
use crate::graph::entry::{EntryAction, EntryHandle, EntryStore, FoldedTag};
use crate::log::dictionary::PathDictionary;

pub fn optimize(
    store: &mut EntryStore,
    dictionary: &PathDictionary,
    classifier: &PathClassifier,
    filter: &GraphFilter,
    options: &GraphOptions,
) {
    find_replacements(store);

    forward_classification(store, dictionary, classifier);
    backward_classification(store, options);

    if options.remove_deleted_ones {
        remove_deleted_ones(store);
    }

    apply_filter(store, dictionary, filter);

    if options.fold_tags {
        fold_tags(store, dictionary);
    }

    compact(store);
}

/// A line that ends in a deletion and is continued by exactly one copy in
/// the deleting revision was renamed, not deleted.
fn find_replacements(store: &mut EntryStore) {
    for i in 0..store.len() {
        let entry = store.entries()[i];
        let Some(next) = store.get(entry).next else {
            continue;
        };
        if store.get(next).action != EntryAction::Deleted {
            continue;
        }

        let delete_revision = store.get(next).revision;
        let mut rename_target: Option<(usize, EntryHandle)> = None;
        let mut ambiguous = false;
        for (k, &copy) in store.get(entry).copy_targets.iter().enumerate().rev() {
            if store.get(copy).revision == delete_revision {
                if rename_target.is_some() {
                    // more than one copy target: show them individually
                    ambiguous = true;
                    break;
                }
                rename_target = Some((k, copy));
            }
        }

        if ambiguous {
            continue;
        }
        if let Some((k, target)) = rename_target {
            store.get_mut(target).action = EntryAction::Renamed;

            // continue the line instead of branching
            store.get_mut(entry).next = Some(target);
            store.get_mut(target).prev = Some(entry);
            store.get_mut(target).copy_source = None;
            store.get_mut(entry).copy_targets.swap_remove(k);

            store.get_mut(next).action = EntryAction::Nothing;
        }
    }
}

fn forward_classification(
    store: &mut EntryStore,
    dictionary: &PathDictionary,
    classifier: &PathClassifier,
) {
    for i in 0..store.len() {
        let handle = store.entries()[i];
        let mut classification = classifier.classify(&store.get(handle).path, dictionary);

        match store.get(handle).action {
            EntryAction::Deleted => classification |= Classification::SUBTREE_DELETED,
            EntryAction::Modified | EntryAction::Source | EntryAction::LastCommit => {
                classification |= Classification::IS_MODIFIED
            }
            _ => {}
        }

        store.get_mut(handle).classification = classification;
    }
}

/// Propagates deletion / modification / copy-target info backwards, from
/// newest to oldest node.
fn backward_classification(store: &mut EntryStore, options: &GraphOptions) {
    for i in (0..store.len()).rev() {
        let handle = store.entries()[i];
        let mut classification = store.get(handle).classification;

        // along the own line
        if let Some(next) = store.get(handle).next {
            let mask = Classification::SUBTREE_DELETED | Classification::IS_MODIFIED;
            classification |= store.get(next).classification & mask;
        }

        // along copy history
        let targets = store.get(handle).copy_targets.clone();
        for target in targets {
            let target_classification = store.get(target).classification;
            let subtree_deleted =
                target_classification.contains(Classification::SUBTREE_DELETED);

            // at least one surviving copy keeps the line alive
            if !subtree_deleted {
                classification.remove(Classification::ALL_COPIES_DELETED);
            }

            // no point propagating info of targets that get removed anyway
            if !subtree_deleted || !options.remove_deleted_ones {
                let transitive =
                    Classification::COPIES_TO_MASK | Classification::IS_MODIFIED;
                classification |= (target_classification & transitive)
                    | target_classification.as_copy_target_bits();
            }
        }

        store.get_mut(handle).classification = classification;
    }
}

/// Unlinks and marks every node whose whole subtree (own line and all
/// copies) was deleted.
fn remove_deleted_ones(store: &mut EntryStore) {
    for i in 0..store.len() {
        let handle = store.entries()[i];
        if !store
            .get(handle)
            .classification
            .contains(Classification::SUBTREE_DELETED)
        {
            continue;
        }

        store.get_mut(handle).action = EntryAction::Nothing;

        let prev = store.get(handle).prev.or(store.get(handle).copy_source);
        let Some(prev) = prev else {
            continue;
        };
        // inside a deleted subtree the predecessor is gone as well
        if store.get(prev).action == EntryAction::Nothing {
            continue;
        }

        if store.get(handle).prev.is_none() {
            // root of the deleted subtree arrived through a copy
            let targets = &mut store.get_mut(prev).copy_targets;
            if let Some(pos) = targets.iter().position(|&t| t == handle) {
                targets.remove(pos);
            }
            store.get_mut(handle).copy_source = None;
        } else {
            store.get_mut(prev).next = None;
            store.get_mut(handle).prev = None;
        }

        // a source node that fed only this copy is no longer needed
        if store.get(prev).action == EntryAction::Source
            && store.get(prev).copy_targets.is_empty()
        {
            let before = store.get(prev).prev;
            let after = store.get(prev).next;
            if let Some(before) = before {
                store.get_mut(before).next = after;
            }
            if let Some(after) = after {
                store.get_mut(after).prev = before;
            }
            store.get_mut(prev).action = EntryAction::Nothing;
        }
    }
}

/// Removes nodes outside the revision window or whose real path matches
/// one of the filter strings.
fn apply_filter(store: &mut EntryStore, dictionary: &PathDictionary, filter: &GraphFilter) {
    for i in 0..store.len() {
        let handle = store.entries()[i];

        let matches_path = if filter.paths.is_empty() {
            false
        } else {
            let real_path = dictionary.path(store.get(handle).real_path);
            filter.paths.iter().any(|p| real_path.contains(p.as_str()))
        };

        let revision = store.get(handle).revision;
        if revision >= filter.min_revision && revision <= filter.max_revision && !matches_path {
            continue;
        }

        if let Some(source) = store.get(handle).copy_source {
            let targets = &mut store.get_mut(source).copy_targets;
            if let Some(pos) = targets.iter().position(|&t| t == handle) {
                targets.remove(pos);
            }
        }
        let prev = store.get(handle).prev;
        let next = store.get(handle).next;
        if let Some(prev) = prev {
            store.get_mut(prev).next = next;
        }
        if let Some(next) = next {
            store.get_mut(next).prev = prev;
        }

        // targets of a filtered source start lines of their own
        let targets = std::mem::take(&mut store.get_mut(handle).copy_targets);
        for target in targets {
            store.get_mut(target).copy_source = None;
        }

        store.get_mut(handle).action = EntryAction::Nothing;
    }
}

/// Collapses pure tag branches into an annotation on the node they were
/// copied from.
fn fold_tags(store: &mut EntryStore, dictionary: &PathDictionary) {
    // anything but "is/copies-to a tag, unmodified" disqualifies a node
    let non_tag_mask = Classification::from_bits_truncate(
        Classification::IS_MASK.bits() - Classification::IS_TAG.bits()
            + Classification::COPIES_TO_MASK.bits()
            - Classification::COPIES_TO_TAG.bits()
            + Classification::IS_MODIFIED.bits(),
    );

    for i in 0..store.len() {
        let handle = store.entries()[i];
        if store.get(handle).action == EntryAction::Nothing {
            continue;
        }
        if !(store.get(handle).classification & non_tag_mask).is_empty() {
            continue;
        }

        let collector = store
            .get(handle)
            .prev
            .or(store.get(handle).copy_source)
            .unwrap_or(handle);
        fold_tags_into(store, dictionary, collector, handle, 0);
    }
}

fn fold_tags_into(
    store: &mut EntryStore,
    dictionary: &PathDictionary,
    collector: EntryHandle,
    start: EntryHandle,
    depth: u32,
) {
    let mut first_run = true;
    let mut current = Some(start);
    while let Some(entry) = current {
        if entry != collector {
            if matches!(
                store.get(entry).action,
                EntryAction::AddedWithHistory | EntryAction::Renamed
            ) {
                let tag = FoldedTag {
                    path: store.get(entry).path.to_path_string(dictionary),
                    // later nodes on the same line re-tagged the same state
                    alias: !first_run,
                    deleted: store
                        .get(entry)
                        .classification
                        .contains(Classification::IS_DELETED),
                    depth,
                };
                store.get_mut(collector).tags.push(tag);
            }

            store.get_mut(entry).action = EntryAction::Nothing;

            // detach the folded line from the collector
            if depth == 0 {
                match store.get(entry).prev {
                    None => {
                        if store.get(entry).copy_source.is_some() {
                            let targets = &mut store.get_mut(collector).copy_targets;
                            if let Some(pos) = targets.iter().position(|&t| t == entry) {
                                targets.remove(pos);
                            }
                        }
                    }
                    Some(prev) => store.get_mut(prev).next = None,
                }
            }
        }

        let targets = store.get(entry).copy_targets.clone();
        for target in targets {
            fold_tags_into(store, dictionary, collector, target, depth + 1);
        }

        first_run = false;
        current = store.get(entry).next;
    }
}

fn compact(store: &mut EntryStore) {
    for i in 0..store.len() {
        let handle = store.entries()[i];
        if store.get(handle).action == EntryAction::Nothing {
            store.destroy(handle);
        }
    }
    store.compact();
}
