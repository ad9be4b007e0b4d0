//! The revision crawl.
//!
//! Walks the cached log from the start revision up to head, keeps the
//! frontier of tracked paths in a [`SearchTree`] and emits one graph node
//! per structural event (add, delete, replace, copy arrival, copy
//! departure). Copy departures are recorded when the source revision is
//! processed and consumed when the target revision arrives, so the whole
//! crawl stays a single forward pass.

use crate::debug_log;
use crate::error::GraphError;
use crate::graph::GraphOptions;
use crate::graph::copies::{CopyIndex, CopyTarget};
use crate::graph::entry::{EntryAction, EntryHandle, EntryStore};
use crate::graph::search_tree::{SearchTree, TreeHandle};
use crate::log::cache::{CachedLog, ProgressMonitor, RevisionData};
use crate::log::dictionary::{PathIndex, TempPath};
use crate::log::record::{ChangeAction, ChangeMask, ChangeRecord, Revision};

fn entry_action(record: &ChangeRecord) -> EntryAction {
    match record.action {
        ChangeAction::Added if record.copy_from.is_some() => EntryAction::AddedWithHistory,
        ChangeAction::Added => EntryAction::Added,
        ChangeAction::Modified => EntryAction::Modified,
        ChangeAction::Deleted => EntryAction::Deleted,
        ChangeAction::Replaced => EntryAction::Replaced,
    }
}

pub struct Crawler<'a> {
    log: &'a CachedLog,
    copies: &'a mut CopyIndex,
    store: &'a mut EntryStore,
    options: GraphOptions,
    head: Revision,
    tree: SearchTree,
    to_cursor: usize,
    from_cursor: usize,
}

impl<'a> Crawler<'a> {
    pub fn new(
        log: &'a CachedLog,
        copies: &'a mut CopyIndex,
        store: &'a mut EntryStore,
        options: GraphOptions,
        head: Revision,
    ) -> Self {
        Self {
            log,
            copies,
            store,
            options,
            head,
            tree: SearchTree::new(),
            to_cursor: 0,
            from_cursor: 0,
        }
    }

    /// Runs the crawl and the post passes (missing heads, working copy
    /// marker, head marking).
    pub fn run(
        &mut self,
        monitor: &mut ProgressMonitor,
        start_path: &TempPath,
        start_revision: Revision,
        wc_path: &TempPath,
        wc_revision: Option<Revision>,
    ) -> Result<(), GraphError> {
        let dictionary = self.log.dictionary();
        self.tree.insert(dictionary, start_path, start_revision);

        debug_log!(
            "crawl: start {} @r{} up to r{}",
            start_path.to_path_string(dictionary),
            start_revision,
            self.head
        );

        for revision in start_revision..=self.head {
            monitor.check(revision, self.head)?;

            let Some(data) = self.log.revision(revision) else {
                continue;
            };

            // copies arriving in this revision open new search paths
            self.add_copied_paths(revision);

            // deletions deactivate paths, but only after the traversal
            let mut to_remove: Vec<TreeHandle> = Vec::new();

            if !data.records.is_empty() {
                self.match_changes(revision, data, &mut to_remove);
            }

            // copies departing from this revision record their sources
            self.fill_copy_targets(revision);

            for handle in to_remove {
                self.tree.remove(handle);
            }
        }

        if self.options.show_head && !self.options.include_sub_path_changes {
            self.add_missing_heads();
        }

        // synthetic nodes (heads, out-of-band copy sources) may have been
        // pushed out of revision order
        self.store.sort_by_revision();

        if let Some(revision) = wc_revision {
            self.insert_wc_revision(wc_path, revision);
        }

        if self.options.show_head {
            self.mark_heads();
        }

        Ok(())
    }

    /// Matches one revision's change records against the search tree.
    fn match_changes(
        &mut self,
        revision: Revision,
        data: &RevisionData,
        to_remove: &mut Vec<TreeHandle>,
    ) {
        let dictionary = self.log.dictionary();
        let base_path = data.root_path;

        let start = self.tree.find_common_parent(dictionary, base_path);
        let chain_start = if self.tree.path(start).is_same_or_child_of(dictionary, base_path) {
            // the revision root lies on or above a tracked subtree
            if self.options.include_sub_path_changes || data.mask != ChangeMask::MODIFIED {
                self.analyze_changes(
                    revision,
                    data,
                    start,
                    self.options.include_sub_path_changes,
                    to_remove,
                );
            } else {
                // nothing but modifications: just stamp last-change info
                self.analyze_changes_only(revision, data, start);
            }
            self.tree.parent(start)
        } else {
            let common = dictionary.common_root(base_path, self.tree.path(start).base());
            Some(self.tree.find_common_parent(dictionary, common))
        };

        // the revision touched something below these nodes
        let mut node = chain_start;
        while let Some(handle) = node {
            if self.tree.is_active(handle) {
                if self.options.include_sub_path_changes {
                    self.analyze_changes(revision, data, handle, true, to_remove);
                } else {
                    self.tree.set_start_revision(handle, revision);
                }
            }
            node = self.tree.parent(handle);
        }
    }

    fn analyze_changes(
        &mut self,
        revision: Revision,
        data: &RevisionData,
        start: TreeHandle,
        show_all: bool,
        to_remove: &mut Vec<TreeHandle>,
    ) {
        let dictionary = self.log.dictionary();

        let mut node = Some(start);
        while let Some(handle) = node {
            let mut skip_subtree = true;
            let path = self.tree.path(handle).clone();

            if self.tree.is_active(handle) {
                for record in &data.records {
                    let hit = (show_all && path.is_same_or_parent_of(dictionary, record.path))
                        || (record.action != ChangeAction::Modified
                            && path.is_same_or_child_of(dictionary, record.path));

                    if hit {
                        skip_subtree = false;

                        let mut action = entry_action(record);

                        // changes deeper inside the tracked path show up as
                        // plain modifications, otherwise a deletion of some
                        // sub-path would terminate the whole line
                        if show_all && path.base() < record.path {
                            action = EntryAction::Modified;
                        }

                        // a path that already exists cannot be added:
                        //   D /trunk/OldSub
                        //   A /trunk/New
                        //   A /trunk/New/OldSub  (from /trunk/OldSub@r-1)
                        if action == EntryAction::Added && self.tree.last_entry(handle).is_some()
                        {
                            continue;
                        }

                        // at most one node per path and revision
                        if self
                            .tree
                            .last_entry(handle)
                            .is_some_and(|last| self.store.get(last).revision == revision)
                        {
                            break;
                        }

                        let entry = self.store.create(path.clone(), revision, action);
                        self.store.get_mut(entry).real_path = record.path;
                        self.store.push(entry);
                        self.tree.chain_entries(self.store, handle, entry);

                        if action == EntryAction::Deleted {
                            to_remove.push(handle);
                        }
                        break;
                    } else if !show_all && path.is_same_or_parent_of(dictionary, record.path) {
                        // only a sub-path was touched
                        self.tree.set_start_revision(handle, revision);
                        skip_subtree = false;
                    }
                }
            } else {
                // connector node: only decide whether the subtree matters
                for record in &data.records {
                    if path.is_same_or_parent_of(dictionary, record.path)
                        || (record.action != ChangeAction::Modified
                            && path.is_same_or_child_of(dictionary, record.path))
                    {
                        skip_subtree = false;
                        break;
                    }
                }
            }

            node = if skip_subtree {
                self.tree.skip_subtree_next(handle, start)
            } else {
                self.tree.pre_order_next(handle, start)
            };
        }
    }

    /// Fast path for modification-only revisions: no nodes are created,
    /// only the last-change stamps are updated.
    fn analyze_changes_only(&mut self, revision: Revision, data: &RevisionData, start: TreeHandle) {
        let dictionary = self.log.dictionary();

        let mut node = Some(start);
        while let Some(handle) = node {
            let mut skip_subtree = true;

            // a path the log never names cannot be modified
            if self.tree.path(handle).is_fully_cached() {
                let base = self.tree.path(handle).base();
                for record in &data.records {
                    if dictionary.is_same_or_parent_of(base, record.path) {
                        if self.tree.is_active(handle) {
                            self.tree.set_start_revision(handle, revision);
                        }
                        skip_subtree = false;
                        break;
                    }
                }
            }

            node = if skip_subtree {
                self.tree.skip_subtree_next(handle, start)
            } else {
                self.tree.pre_order_next(handle, start)
            };
        }
    }

    /// Opens search paths for copies whose target revision is `revision`.
    fn add_copied_paths(&mut self, revision: Revision) {
        let dictionary = self.log.dictionary();

        let by_to = self.copies.by_to();
        while self.to_cursor < by_to.len()
            && self.copies.get(by_to[self.to_cursor]).to_revision < revision
        {
            self.to_cursor += 1;
        }

        let mut index = self.to_cursor;
        while index < self.copies.by_to().len() {
            let copy_index = self.copies.by_to()[index];
            if self.copies.get(copy_index).to_revision != revision {
                break;
            }

            let targets: Vec<CopyTarget> = self.copies.get(copy_index).targets.clone();
            for target in targets {
                debug_log!(
                    "  r{revision}: copy target {}",
                    target.path.to_path_string(dictionary)
                );
                let node = self.tree.insert(dictionary, &target.path, revision);
                self.tree.chain_entries(self.store, node, target.source);
            }
            index += 1;
        }
        self.to_cursor = index;
    }

    /// Records copy sources for copies departing from `revision`.
    fn fill_copy_targets(&mut self, revision: Revision) {
        let dictionary = self.log.dictionary();

        while self.from_cursor < self.copies.by_from().len()
            && self.copies.get(self.copies.by_from()[self.from_cursor]).from_revision < revision
        {
            self.from_cursor += 1;
        }

        let mut index = self.from_cursor;
        while index < self.copies.by_from().len() {
            let copy_index = self.copies.by_from()[index];
            let (from_path, to_path, to_revision) = {
                let copy = self.copies.get(copy_index);
                if copy.from_revision != revision {
                    break;
                }
                (copy.from_path, copy.to_path, copy.to_revision)
            };
            index += 1;

            let start = self.tree.find_common_parent(dictionary, from_path);
            if !self.tree.path(start).is_same_or_child_of(dictionary, from_path) {
                continue;
            }

            let mut new_targets: Vec<CopyTarget> = Vec::new();
            let mut node = Some(start);
            while let Some(handle) = node {
                if self.tree.is_active(handle) {
                    let path = self.tree.path(handle).clone();

                    if is_latest_copy_source(
                        self.log,
                        revision,
                        to_revision,
                        from_path,
                        &path,
                    ) {
                        let source_revision = if self.options.exact_copy_sources {
                            revision
                        } else {
                            self.tree.start_revision(handle)
                        };

                        let entry = match self.tree.last_entry(handle) {
                            Some(last) if self.store.get(last).revision >= source_revision => {
                                last
                            }
                            _ => {
                                // the copy source state has no node yet
                                let entry = self.store.create(
                                    path.clone(),
                                    source_revision,
                                    EntryAction::Source,
                                );
                                self.store.get_mut(entry).real_path = from_path;
                                self.store.push(entry);
                                self.tree.chain_entries(self.store, handle, entry);
                                entry
                            }
                        };

                        new_targets.push(CopyTarget::new(
                            entry,
                            path.replace_parent(dictionary, from_path, to_path),
                        ));
                    }
                }
                node = self.tree.pre_order_next(handle, start);
            }

            self.copies.get_mut(copy_index).targets.extend(new_targets);
        }
        self.from_cursor = index;
    }

    /// Walks from head downwards and creates a synthetic "last commit"
    /// node for every still-tracked path whose newest node is older than
    /// its actual newest change.
    fn add_missing_heads(&mut self) {
        let dictionary = self.log.dictionary();
        let root = self.tree.root();

        // paths the log never names cannot have a head commit
        let mut to_remove: Vec<TreeHandle> = Vec::new();
        let mut node = Some(root);
        while let Some(handle) = node {
            if self.tree.is_active(handle) && !self.tree.path(handle).is_fully_cached() {
                to_remove.push(handle);
            }
            node = self.tree.pre_order_next(handle, root);
        }

        let mut revision = self.head;
        while revision > 0 && !self.tree.is_exhausted() {
            for handle in to_remove.drain(..) {
                self.tree.remove(handle);
            }

            let Some(data) = self.log.revision(revision) else {
                revision -= 1;
                continue;
            };
            if data.records.is_empty() {
                revision -= 1;
                continue;
            }

            let base_path = data.root_path;
            let mut node = Some(root);
            while let Some(handle) = node {
                let path = self.tree.path(handle);
                let subtree_touched = path.is_same_or_parent_of(dictionary, base_path);
                let parent_touched = path.is_same_or_child_of(dictionary, base_path);

                if subtree_touched || parent_touched {
                    self.analyze_head_revision(revision, data, handle, &mut to_remove);

                    if let Some(child) = self.tree.first_child(handle) {
                        node = Some(child);
                        continue;
                    }
                }
                node = self.tree.skip_subtree_next(handle, root);
            }

            revision -= 1;
        }
    }

    fn analyze_head_revision(
        &mut self,
        revision: Revision,
        data: &RevisionData,
        handle: TreeHandle,
        to_remove: &mut Vec<TreeHandle>,
    ) {
        if !self.tree.is_active(handle) {
            return;
        }

        // newest node already at or beyond this revision: head is known
        if !self.tree.yet_to_cover(self.store, handle, revision) {
            to_remove.push(handle);
            return;
        }

        let dictionary = self.log.dictionary();
        let path = self.tree.path(handle).clone();
        let base = path.base();
        for record in &data.records {
            if dictionary.is_same_or_parent_of(base, record.path) {
                let entry = self.store.create(path, revision, EntryAction::LastCommit);
                self.store.get_mut(entry).real_path = record.path;
                self.store.push(entry);
                self.tree.chain_entries(self.store, handle, entry);

                to_remove.push(handle);
                break;
            }
        }
    }

    /// Splices a synthetic node for the working copy revision into the
    /// chain of the checked-out path, unless a node for that revision
    /// already exists.
    fn insert_wc_revision(&mut self, wc_path: &TempPath, wc_revision: Revision) {
        let entries: Vec<EntryHandle> = self.store.entries().to_vec();
        let lower = entries.partition_point(|h| self.store.get(*h).revision < wc_revision);
        let upper = entries.partition_point(|h| self.store.get(*h).revision <= wc_revision);

        // node for that revision already present?
        for &handle in &entries[lower..upper] {
            if self.store.get(handle).path == *wc_path {
                self.store.get_mut(handle).working_copy = true;
                return;
            }
        }

        // splice behind the newest older node of the same path
        for &handle in entries[..lower].iter().rev() {
            if self.store.get(handle).path != *wc_path {
                continue;
            }

            let entry = self
                .store
                .create(wc_path.clone(), wc_revision, EntryAction::Modified);
            self.store.get_mut(entry).working_copy = true;

            let old_next = self.store.get(handle).next;
            self.store.get_mut(entry).next = old_next;
            self.store.get_mut(entry).prev = Some(handle);
            self.store.get_mut(handle).next = Some(entry);
            if let Some(next) = old_next {
                self.store.get_mut(next).prev = Some(entry);
            }

            self.store.insert_at(upper, entry);
            return;
        }

        // the working copy is not part of the graph (e.g. stale cache)
        debug_log!("wc marker dropped: no node for the checked-out path");
    }

    /// Upgrades the newest node of every still-live path to a head marker
    /// unless it is already something more specific.
    fn mark_heads(&mut self) {
        let root = self.tree.root();
        let mut node = Some(root);
        while let Some(handle) = node {
            if self.tree.is_active(handle)
                && let Some(last) = self.tree.last_entry(handle)
            {
                let entry = self.store.get_mut(last);
                if matches!(entry.action, EntryAction::Nothing | EntryAction::Modified) {
                    entry.action = EntryAction::LastCommit;
                }
            }
            node = self.tree.pre_order_next(handle, root);
        }
    }
}

/// Decides whether (`from_path`@`from_revision`) really is the copy source
/// for `current_path` in `to_revision`, or whether that revision contains
/// a later or more specific copy that supersedes it:
///
/// ```text
/// A /trunk/F    (from /branches/b/F:100)
/// R /trunk/F/a  (from /branches/b/F/a:105)
/// ```
///
/// Here `/branches/b/F/a` must branch from r105, not r100.
fn is_latest_copy_source(
    log: &CachedLog,
    from_revision: Revision,
    to_revision: Revision,
    from_path: PathIndex,
    current_path: &TempPath,
) -> bool {
    let dictionary = log.dictionary();
    let Some(data) = log.revision(to_revision) else {
        return true;
    };

    for record in &data.records {
        if let Some((record_from, record_revision)) = record.copy_from
            && current_path.is_same_or_child_of(dictionary, record_from)
        {
            if record_revision > from_revision {
                return false;
            }
            if record_from > from_path {
                return false;
            }
        }
    }

    true
}
