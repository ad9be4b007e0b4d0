//! The frontier of tracked paths.
//!
//! During the crawl every path whose history is still being followed is an
//! active node in this tree; ancestors that only exist to connect them are
//! inactive. The tree is an element trie: inserting `/branches/b/sub`
//! materializes `/branches` and `/branches/b` as inactive nodes, so a
//! change at any prefix of a tracked path always has a tree node to land
//! on.
//!
//! Nodes live in an arena addressed by [`TreeHandle`]; removal deactivates
//! a node and prunes childless inactive ancestors but never invalidates
//! handles. Traversal is cursor-based: `pre_order_next` and
//! `skip_subtree_next` step through the subtree under an explicit stop
//! node and return `None` when the walk is complete.

use crate::graph::entry::{EntryHandle, EntryStore};
use crate::log::dictionary::{PathDictionary, PathIndex, TempPath};
use crate::log::record::Revision;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeHandle(u32);

impl TreeHandle {
    const ROOT: TreeHandle = TreeHandle(0);

    fn as_usize(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct SearchNode {
    path: TempPath,
    element: String,
    active: bool,
    /// Last revision that modified this path (used to pick copy sources).
    start_revision: Revision,
    last_entry: Option<EntryHandle>,

    parent: Option<TreeHandle>,
    first_child: Option<TreeHandle>,
    next_sibling: Option<TreeHandle>,
}

#[derive(Debug)]
pub struct SearchTree {
    arena: Vec<SearchNode>,
    active_count: usize,
}

impl SearchTree {
    pub fn new() -> Self {
        let root = SearchNode {
            path: TempPath::from_index(PathIndex::ROOT),
            element: String::new(),
            active: false,
            start_revision: 0,
            last_entry: None,
            parent: None,
            first_child: None,
            next_sibling: None,
        };
        Self {
            arena: vec![root],
            active_count: 0,
        }
    }

    pub fn root(&self) -> TreeHandle {
        TreeHandle::ROOT
    }

    fn node(&self, handle: TreeHandle) -> &SearchNode {
        &self.arena[handle.as_usize()]
    }

    fn node_mut(&mut self, handle: TreeHandle) -> &mut SearchNode {
        &mut self.arena[handle.as_usize()]
    }

    pub fn path(&self, handle: TreeHandle) -> &TempPath {
        &self.node(handle).path
    }

    pub fn is_active(&self, handle: TreeHandle) -> bool {
        self.node(handle).active
    }

    pub fn parent(&self, handle: TreeHandle) -> Option<TreeHandle> {
        self.node(handle).parent
    }

    pub fn first_child(&self, handle: TreeHandle) -> Option<TreeHandle> {
        self.node(handle).first_child
    }

    pub fn start_revision(&self, handle: TreeHandle) -> Revision {
        self.node(handle).start_revision
    }

    pub fn set_start_revision(&mut self, handle: TreeHandle, revision: Revision) {
        self.node_mut(handle).start_revision = revision;
    }

    pub fn last_entry(&self, handle: TreeHandle) -> Option<EntryHandle> {
        self.node(handle).last_entry
    }

    /// True while no graph node at or after `revision` exists for this path.
    pub fn yet_to_cover(&self, store: &EntryStore, handle: TreeHandle, revision: Revision) -> bool {
        match self.node(handle).last_entry {
            Some(entry) => store.get(entry).revision < revision,
            None => true,
        }
    }

    /// True when no path is tracked anymore.
    pub fn is_exhausted(&self) -> bool {
        self.active_count == 0
    }

    fn find_child(&self, parent: TreeHandle, element: &str) -> Option<TreeHandle> {
        let mut child = self.node(parent).first_child;
        while let Some(handle) = child {
            if self.node(handle).element == element {
                return Some(handle);
            }
            child = self.node(handle).next_sibling;
        }
        None
    }

    fn add_child(&mut self, parent: TreeHandle, path: TempPath, element: String) -> TreeHandle {
        let handle = TreeHandle(self.arena.len() as u32);
        self.arena.push(SearchNode {
            path,
            element,
            active: false,
            start_revision: 0,
            last_entry: None,
            parent: Some(parent),
            first_child: None,
            next_sibling: None,
        });

        // append to keep sibling order deterministic
        match self.node(parent).first_child {
            None => self.node_mut(parent).first_child = Some(handle),
            Some(first) => {
                let mut last = first;
                while let Some(next) = self.node(last).next_sibling {
                    last = next;
                }
                self.node_mut(last).next_sibling = Some(handle);
            }
        }
        handle
    }

    /// Inserts (or reactivates) a tracked path. Missing intermediate
    /// elements become inactive connector nodes.
    pub fn insert(
        &mut self,
        dictionary: &PathDictionary,
        path: &TempPath,
        revision: Revision,
    ) -> TreeHandle {
        let elements: Vec<String> = path
            .elements(dictionary)
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut current = TreeHandle::ROOT;
        for element in elements {
            current = match self.find_child(current, &element) {
                Some(child) => child,
                None => {
                    let child_path = self.node(current).path.join(dictionary, &element);
                    self.add_child(current, child_path, element)
                }
            };
        }

        let node = self.node_mut(current);
        if !node.active {
            node.active = true;
            self.active_count += 1;
        }
        self.node_mut(current).start_revision = revision;
        current
    }

    /// Deepest node whose path is the query or one of its ancestors.
    pub fn find_common_parent(&self, dictionary: &PathDictionary, query: PathIndex) -> TreeHandle {
        let mut current = TreeHandle::ROOT;
        for element in dictionary.elements(query) {
            match self.find_child(current, element) {
                Some(child) => current = child,
                None => break,
            }
        }
        current
    }

    /// Deactivates a node and prunes connector nodes that no longer lead
    /// to any active path.
    pub fn remove(&mut self, handle: TreeHandle) {
        if self.node(handle).active {
            self.node_mut(handle).active = false;
            self.active_count -= 1;
        }

        let mut current = handle;
        while current != TreeHandle::ROOT {
            let node = self.node(current);
            if node.active || node.first_child.is_some() {
                break;
            }
            let Some(parent) = node.parent else { break };
            self.detach(parent, current);
            current = parent;
        }
    }

    fn detach(&mut self, parent: TreeHandle, child: TreeHandle) {
        let sibling = self.node(child).next_sibling;
        if self.node(parent).first_child == Some(child) {
            self.node_mut(parent).first_child = sibling;
        } else {
            let mut prev = self.node(parent).first_child;
            while let Some(handle) = prev {
                if self.node(handle).next_sibling == Some(child) {
                    self.node_mut(handle).next_sibling = sibling;
                    break;
                }
                prev = self.node(handle).next_sibling;
            }
        }
        self.node_mut(child).next_sibling = None;
    }

    /// Next node in pre-order within the subtree rooted at `stop`, or
    /// `None` once the subtree is exhausted.
    pub fn pre_order_next(&self, handle: TreeHandle, stop: TreeHandle) -> Option<TreeHandle> {
        if let Some(child) = self.node(handle).first_child {
            return Some(child);
        }
        self.skip_subtree_next(handle, stop)
    }

    /// Like `pre_order_next` but does not descend into `handle`'s children.
    pub fn skip_subtree_next(&self, handle: TreeHandle, stop: TreeHandle) -> Option<TreeHandle> {
        let mut current = handle;
        loop {
            if current == stop {
                return None;
            }
            if let Some(sibling) = self.node(current).next_sibling {
                return Some(sibling);
            }
            current = self.node(current).parent?;
        }
    }

    /// Records a graph node for this path and links it to the previous one:
    /// same path means the line continues, a different path means the new
    /// entry arrived through a copy.
    pub fn chain_entries(&mut self, store: &mut EntryStore, node: TreeHandle, entry: EntryHandle) {
        if let Some(last) = self.node(node).last_entry {
            if store.get(last).path == store.get(entry).path {
                store.link_next(last, entry);
            } else {
                store.link_copy(last, entry);
            }
        }
        self.node_mut(node).last_entry = Some(entry);
    }
}

impl Default for SearchTree {
    fn default() -> Self {
        Self::new()
    }
}
