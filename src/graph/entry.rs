//! Revision entries and the arena that owns them.
//!
//! Graph nodes reference each other through [`EntryHandle`] indices into a
//! single arena. Deleting a node marks its slot free; the optimizer's
//! compaction step later drops freed slots from the ordered entry list.

use crate::graph::classify::Classification;
use crate::log::dictionary::{PathIndex, TempPath};
use crate::log::record::Revision;

/// Index of an entry slot in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryHandle(u32);

impl EntryHandle {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// What happened to the tracked path at this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAction {
    /// Placeholder without an own change (pruned or structural).
    Nothing,
    Added,
    AddedWithHistory,
    /// A delete folded together with the copy that re-created the path.
    Renamed,
    Deleted,
    Replaced,
    Modified,
    /// Synthetic head marker for a still-live branch.
    LastCommit,
    /// Synthetic node standing in for the source of a copy when the source
    /// path saw no change in that revision.
    Source,
}

impl EntryAction {
    pub fn letter(self) -> char {
        match self {
            EntryAction::Nothing => ' ',
            EntryAction::Added => 'A',
            EntryAction::AddedWithHistory => '+',
            EntryAction::Renamed => 'V',
            EntryAction::Deleted => 'D',
            EntryAction::Replaced => 'R',
            EntryAction::Modified => 'M',
            EntryAction::LastCommit => 'H',
            EntryAction::Source => 'S',
        }
    }
}

/// A tag branch folded into the node it was copied from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldedTag {
    pub path: String,
    /// Later tags of the same unchanged state are aliases of the first.
    pub alias: bool,
    pub deleted: bool,
    /// How many copy steps away from the annotated node the tag was found.
    pub depth: u32,
}

/// One node of the revision graph.
#[derive(Debug, Clone)]
pub struct RevisionEntry {
    pub path: TempPath,
    /// The changed path that produced this node; for source nodes this is
    /// the copy source, which may differ from `path`.
    pub real_path: PathIndex,
    pub revision: Revision,
    pub action: EntryAction,
    pub classification: Classification,
    /// Set on the synthetic node representing the working copy revision.
    pub working_copy: bool,

    pub prev: Option<EntryHandle>,
    pub next: Option<EntryHandle>,
    pub copy_source: Option<EntryHandle>,
    pub copy_targets: Vec<EntryHandle>,
    pub tags: Vec<FoldedTag>,

    pub row: i32,
    pub column: i32,

    freed: bool,
}

impl RevisionEntry {
    fn new(path: TempPath, revision: Revision, action: EntryAction) -> Self {
        let real_path = path.base();
        Self {
            path,
            real_path,
            revision,
            action,
            classification: Classification::empty(),
            working_copy: false,
            prev: None,
            next: None,
            copy_source: None,
            copy_targets: Vec::new(),
            tags: Vec::new(),
            row: 0,
            column: 0,
            freed: false,
        }
    }
}

/// Arena of entries plus the revision-ordered node list.
///
/// `create` only allocates; callers append the handle to the ordered list
/// separately because synthetic nodes (heads, the working copy) are spliced
/// in out of creation order.
#[derive(Debug, Default)]
pub struct EntryStore {
    arena: Vec<RevisionEntry>,
    entries: Vec<EntryHandle>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        path: TempPath,
        revision: Revision,
        action: EntryAction,
    ) -> EntryHandle {
        let handle = EntryHandle(self.arena.len() as u32);
        self.arena.push(RevisionEntry::new(path, revision, action));
        handle
    }

    /// Appends to the ordered list; the caller keeps it sorted by revision.
    pub fn push(&mut self, handle: EntryHandle) {
        self.entries.push(handle);
    }

    pub fn insert_at(&mut self, index: usize, handle: EntryHandle) {
        self.entries.insert(index, handle);
    }

    /// Marks the slot free. The handle stays valid (the slot is not
    /// reused) until `clear`; compaction removes it from the list.
    pub fn destroy(&mut self, handle: EntryHandle) {
        self.arena[handle.as_usize()].freed = true;
    }

    pub fn is_freed(&self, handle: EntryHandle) -> bool {
        self.arena[handle.as_usize()].freed
    }

    pub fn get(&self, handle: EntryHandle) -> &RevisionEntry {
        &self.arena[handle.as_usize()]
    }

    pub fn get_mut(&mut self, handle: EntryHandle) -> &mut RevisionEntry {
        &mut self.arena[handle.as_usize()]
    }

    pub fn entries(&self) -> &[EntryHandle] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut Vec<EntryHandle> {
        &mut self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Links `prev -> next` in the same-path chain.
    pub fn link_next(&mut self, prev: EntryHandle, next: EntryHandle) {
        self.arena[prev.as_usize()].next = Some(next);
        self.arena[next.as_usize()].prev = Some(prev);
    }

    /// Links `source -> target` as a copy edge.
    pub fn link_copy(&mut self, source: EntryHandle, target: EntryHandle) {
        self.arena[source.as_usize()].copy_targets.push(target);
        self.arena[target.as_usize()].copy_source = Some(source);
    }

    /// Stable sort of the ordered list; nodes of one revision keep their
    /// creation order.
    pub fn sort_by_revision(&mut self) {
        let arena = &self.arena;
        self.entries.sort_by_key(|h| arena[h.as_usize()].revision);
    }

    /// Drops freed slots from the ordered list, keeping relative order.
    pub fn compact(&mut self) {
        let arena = &self.arena;
        self.entries.retain(|h| !arena[h.as_usize()].freed);
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::dictionary::{PathDictionary, TempPath};

    fn path(dict: &mut PathDictionary, p: &str) -> TempPath {
        TempPath::from_index(dict.intern(p))
    }

    #[test]
    fn links_are_symmetric() {
        let mut dict = PathDictionary::new();
        let mut store = EntryStore::new();
        let a = store.create(path(&mut dict, "/trunk"), 1, EntryAction::Added);
        let b = store.create(path(&mut dict, "/trunk"), 3, EntryAction::Modified);
        let c = store.create(path(&mut dict, "/branches/b"), 4, EntryAction::AddedWithHistory);

        store.link_next(a, b);
        store.link_copy(b, c);

        assert_eq!(store.get(a).next, Some(b));
        assert_eq!(store.get(b).prev, Some(a));
        assert_eq!(store.get(b).copy_targets, vec![c]);
        assert_eq!(store.get(c).copy_source, Some(b));
    }

    #[test]
    fn compaction_drops_freed_slots_in_order() {
        let mut dict = PathDictionary::new();
        let mut store = EntryStore::new();
        let handles: Vec<_> = (1..=4)
            .map(|rev| {
                let h = store.create(path(&mut dict, "/trunk"), rev, EntryAction::Modified);
                store.push(h);
                h
            })
            .collect();

        store.destroy(handles[1]);
        store.destroy(handles[3]);
        store.compact();

        assert_eq!(store.entries(), &[handles[0], handles[2]]);
        // handles stay resolvable even after compaction
        assert_eq!(store.get(handles[1]).revision, 2);
        assert!(store.is_freed(handles[1]));
    }
}
