//! Interned repository paths.
//!
//! Every path that appears in a change log is interned into a
//! [`PathDictionary`] exactly once and referred to by its [`PathIndex`]
//! afterwards. Ancestor/descendant questions then become short walks over
//! parent links instead of repeated string comparisons.
//!
//! Interning a path interns all of its ancestors first, so a parent's index
//! is always smaller than the index of any of its descendants. The
//! tie-breaks in the crawl ("which change record is the more specific
//! match") compare raw indices and rely on that ordering.
//!
//! The dictionary is append-only: once a log snapshot has been loaded it is
//! never mutated during analysis.

use std::collections::HashMap;

/// Stable identifier of an interned path. Index 0 is the repository root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathIndex(u32);

impl PathIndex {
    pub const ROOT: PathIndex = PathIndex(0);

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct PathNode {
    parent: Option<PathIndex>,
    element: String,
    /// Canonical form without leading or trailing separator ("" for root).
    canon: String,
}

#[derive(Debug)]
pub struct PathDictionary {
    nodes: Vec<PathNode>,
    lookup: HashMap<String, PathIndex>,
}

impl Default for PathDictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl PathDictionary {
    pub fn new() -> Self {
        let root = PathNode {
            parent: None,
            element: String::new(),
            canon: String::new(),
        };
        let mut lookup = HashMap::new();
        lookup.insert(String::new(), PathIndex::ROOT);
        Self {
            nodes: vec![root],
            lookup,
        }
    }

    fn canonical(path: &str) -> &str {
        path.trim_matches('/')
    }

    /// Interns `path` (and all its ancestors) and returns its index.
    /// Idempotent: interning the same path twice returns the same index.
    pub fn intern(&mut self, path: &str) -> PathIndex {
        let canon = Self::canonical(path);
        if let Some(&index) = self.lookup.get(canon) {
            return index;
        }

        let (parent_str, element) = match canon.rfind('/') {
            Some(pos) => (&canon[..pos], &canon[pos + 1..]),
            None => ("", canon),
        };
        let element = element.to_string();
        let parent = self.intern(parent_str);

        let index = PathIndex(self.nodes.len() as u32);
        self.nodes.push(PathNode {
            parent: Some(parent),
            element,
            canon: canon.to_string(),
        });
        self.lookup.insert(canon.to_string(), index);
        index
    }

    /// Looks a path up without interning it.
    pub fn find(&self, path: &str) -> Option<PathIndex> {
        self.lookup.get(Self::canonical(path)).copied()
    }

    fn node(&self, index: PathIndex) -> &PathNode {
        &self.nodes[index.as_usize()]
    }

    pub fn parent(&self, index: PathIndex) -> Option<PathIndex> {
        self.node(index).parent
    }

    pub fn element(&self, index: PathIndex) -> &str {
        &self.node(index).element
    }

    /// Renders the path with a leading separator; the root renders as "/".
    pub fn path(&self, index: PathIndex) -> String {
        format!("/{}", self.node(index).canon)
    }

    /// Path elements from the root down (empty for the root itself).
    pub fn elements(&self, index: PathIndex) -> Vec<&str> {
        let mut elements = Vec::new();
        let mut current = Some(index);
        while let Some(idx) = current {
            if idx != PathIndex::ROOT {
                elements.push(self.element(idx));
            }
            current = self.parent(idx);
        }
        elements.reverse();
        elements
    }

    pub fn depth(&self, index: PathIndex) -> usize {
        let mut depth = 0;
        let mut current = index;
        while let Some(parent) = self.parent(current) {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// True iff `parent` equals `child` or is one of its ancestors.
    ///
    /// A parent is always interned before its children, so the walk only
    /// ever has to move upwards from the larger index.
    pub fn is_same_or_parent_of(&self, parent: PathIndex, child: PathIndex) -> bool {
        let mut current = child;
        while current > parent {
            match self.parent(current) {
                Some(up) => current = up,
                None => return false,
            }
        }
        current == parent
    }

    pub fn is_same_or_child_of(&self, child: PathIndex, parent: PathIndex) -> bool {
        self.is_same_or_parent_of(parent, child)
    }

    /// Deepest path that is an ancestor of (or equal to) both arguments.
    pub fn common_root(&self, a: PathIndex, b: PathIndex) -> PathIndex {
        let (mut a, mut b) = (a, b);
        while a != b {
            if a > b {
                a = self.parent(a).unwrap_or(PathIndex::ROOT);
            } else {
                b = self.parent(b).unwrap_or(PathIndex::ROOT);
            }
        }
        a
    }

    fn find_child(&self, parent: PathIndex, element: &str) -> Option<PathIndex> {
        let parent_canon = &self.node(parent).canon;
        let canon = if parent_canon.is_empty() {
            element.to_string()
        } else {
            format!("{parent_canon}/{element}")
        };
        self.lookup.get(&canon).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // the root is always present
        self.nodes.len() <= 1
    }
}

/// A path that may extend beyond the dictionary.
///
/// Copy targets can name paths the change log has never mentioned on their
/// own (copying `/trunk` to `/branches/b` implies `/branches/b/sub` for
/// every tracked `/trunk/sub`). Such paths are held as the deepest interned
/// ancestor plus an uninterned relative suffix. A `TempPath` with an empty
/// suffix is "fully cached": every comparison against it can stay in index
/// space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempPath {
    base: PathIndex,
    relative: Vec<String>,
}

impl TempPath {
    pub fn from_index(index: PathIndex) -> Self {
        Self {
            base: index,
            relative: Vec::new(),
        }
    }

    /// Builds a temp path from a string, factoring out the deepest interned
    /// ancestor so that equal paths always factor identically.
    pub fn new(dictionary: &PathDictionary, path: &str) -> Self {
        if let Some(index) = dictionary.find(path) {
            return Self::from_index(index);
        }

        let canon = PathDictionary::canonical(path);
        let mut base = PathIndex::ROOT;
        let mut relative = Vec::new();
        for element in canon.split('/').filter(|e| !e.is_empty()) {
            if relative.is_empty() {
                if let Some(child) = dictionary.find_child(base, element) {
                    base = child;
                    continue;
                }
            }
            relative.push(element.to_string());
        }
        Self { base, relative }
    }

    fn normalized(dictionary: &PathDictionary, base: PathIndex, relative: Vec<String>) -> Self {
        let mut base = base;
        let mut rest = relative.into_iter();
        let mut relative = Vec::new();
        for element in rest.by_ref() {
            match dictionary.find_child(base, &element) {
                Some(child) => base = child,
                None => {
                    relative.push(element);
                    break;
                }
            }
        }
        relative.extend(rest);
        Self { base, relative }
    }

    pub fn base(&self) -> PathIndex {
        self.base
    }

    /// True iff the whole path is known to the dictionary.
    pub fn is_fully_cached(&self) -> bool {
        self.relative.is_empty()
    }

    pub fn elements<'a>(&'a self, dictionary: &'a PathDictionary) -> Vec<&'a str> {
        let mut elements = dictionary.elements(self.base);
        elements.extend(self.relative.iter().map(String::as_str));
        elements
    }

    pub fn depth(&self, dictionary: &PathDictionary) -> usize {
        dictionary.depth(self.base) + self.relative.len()
    }

    /// True iff this path equals `other` or is one of its ancestors.
    pub fn is_same_or_parent_of(&self, dictionary: &PathDictionary, other: PathIndex) -> bool {
        if self.relative.is_empty() {
            return dictionary.is_same_or_parent_of(self.base, other);
        }
        let own = self.elements(dictionary);
        let other = dictionary.elements(other);
        own.len() <= other.len() && own == other[..own.len()]
    }

    /// True iff this path equals `other` or is one of its descendants.
    pub fn is_same_or_child_of(&self, dictionary: &PathDictionary, other: PathIndex) -> bool {
        // the suffix only makes this path deeper, never shallower
        dictionary.is_same_or_parent_of(other, self.base)
            || (self.relative.is_empty() && self.base == other)
    }

    /// Replaces the `from` prefix with `to`; `self` must be the same as or
    /// a descendant of `from`.
    pub fn replace_parent(
        &self,
        dictionary: &PathDictionary,
        from: PathIndex,
        to: PathIndex,
    ) -> TempPath {
        debug_assert!(self.is_same_or_child_of(dictionary, from));
        let own = self.elements(dictionary);
        let skip = dictionary.depth(from);
        let relative = own[skip..].iter().map(|e| e.to_string()).collect();
        Self::normalized(dictionary, to, relative)
    }

    /// Appends one element, keeping the factoring normalized.
    pub fn join(&self, dictionary: &PathDictionary, element: &str) -> TempPath {
        let mut relative = self.relative.clone();
        relative.push(element.to_string());
        Self::normalized(dictionary, self.base, relative)
    }

    pub fn to_path_string(&self, dictionary: &PathDictionary) -> String {
        let mut path = dictionary.path(self.base);
        for element in &self.relative {
            if !path.ends_with('/') {
                path.push('/');
            }
            path.push_str(element);
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn intern_is_idempotent() {
        let mut dict = PathDictionary::new();
        let a = dict.intern("/trunk/src/main.rs");
        let b = dict.intern("/trunk/src/main.rs");
        assert_eq!(a, b);
        assert_eq!(dict.path(a), "/trunk/src/main.rs");
    }

    #[test]
    fn intern_creates_ancestors_first() {
        let mut dict = PathDictionary::new();
        let deep = dict.intern("/trunk/src/main.rs");
        let trunk = dict.find("/trunk").expect("ancestor interned");
        let src = dict.find("/trunk/src").expect("ancestor interned");
        assert!(trunk < src);
        assert!(src < deep);
    }

    #[test]
    fn ancestor_checks_follow_separator_boundaries() {
        let mut dict = PathDictionary::new();
        let trunk = dict.intern("/trunk");
        let trunk_sub = dict.intern("/trunk/sub");
        let trunknew = dict.intern("/trunknew");

        assert!(dict.is_same_or_parent_of(trunk, trunk_sub));
        assert!(dict.is_same_or_child_of(trunk_sub, trunk));
        // "/trunknew" is not under "/trunk"
        assert!(!dict.is_same_or_parent_of(trunk, trunknew));
    }

    #[test]
    fn root_is_ancestor_of_everything() {
        let mut dict = PathDictionary::new();
        let any = dict.intern("/a/b/c");
        assert!(dict.is_same_or_parent_of(PathIndex::ROOT, any));
        assert_eq!(dict.path(PathIndex::ROOT), "/");
    }

    #[test]
    fn common_root_of_siblings_is_their_parent() {
        let mut dict = PathDictionary::new();
        let a = dict.intern("/trunk/a");
        let b = dict.intern("/trunk/b");
        let trunk = dict.find("/trunk").unwrap();
        assert_eq!(dict.common_root(a, b), trunk);
        assert_eq!(dict.common_root(a, a), a);
    }

    #[test]
    fn temp_path_factors_out_interned_prefix() {
        let mut dict = PathDictionary::new();
        let branches = dict.intern("/branches");
        let path = TempPath::new(&dict, "/branches/b/sub");
        assert_eq!(path.base(), branches);
        assert!(!path.is_fully_cached());
        assert_eq!(path.to_path_string(&dict), "/branches/b/sub");
    }

    #[test]
    fn temp_path_comparisons_cross_the_suffix() {
        let mut dict = PathDictionary::new();
        dict.intern("/branches");
        let temp = TempPath::new(&dict, "/branches/b");
        // interned later, after the temp path was created
        let exact = dict.intern("/branches/b");
        let deeper = dict.intern("/branches/b/file");

        assert!(temp.is_same_or_parent_of(&dict, exact));
        assert!(temp.is_same_or_parent_of(&dict, deeper));
        assert!(temp.is_same_or_child_of(&dict, dict.find("/branches").unwrap()));
        assert!(!temp.is_same_or_child_of(&dict, deeper));
    }

    #[test]
    fn replace_parent_rebases_the_suffix() {
        let mut dict = PathDictionary::new();
        let trunk = dict.intern("/trunk");
        dict.intern("/trunk/src/lib.rs");
        let branch = dict.intern("/branches/b");

        let tracked = TempPath::new(&dict, "/trunk/src/lib.rs");
        let copied = tracked.replace_parent(&dict, trunk, branch);
        assert_eq!(copied.to_path_string(&dict), "/branches/b/src/lib.rs");
        assert_eq!(copied.base(), branch);
    }

    #[test]
    fn replace_parent_normalizes_against_interned_children() {
        let mut dict = PathDictionary::new();
        let trunk = dict.intern("/trunk");
        dict.intern("/trunk/file");
        let branch = dict.intern("/branches/b");
        let branch_file = dict.intern("/branches/b/file");

        let tracked = TempPath::new(&dict, "/trunk/file");
        let copied = tracked.replace_parent(&dict, trunk, branch);
        // both factorings of "/branches/b/file" must compare equal
        assert_eq!(copied, TempPath::from_index(branch_file));
    }

    fn path_strategy() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-z]{1,6}", 1..5)
    }

    proptest! {
        #[test]
        fn prop_parent_index_smaller_than_child(elements in path_strategy()) {
            let mut dict = PathDictionary::new();
            let path = format!("/{}", elements.join("/"));
            let index = dict.intern(&path);

            let mut current = index;
            while let Some(parent) = dict.parent(current) {
                prop_assert!(parent < current);
                current = parent;
            }
        }

        #[test]
        fn prop_ancestor_agrees_with_string_prefix(
            a in path_strategy(),
            b in path_strategy(),
        ) {
            let mut dict = PathDictionary::new();
            let pa = format!("/{}", a.join("/"));
            let pb = format!("/{}", b.join("/"));
            let ia = dict.intern(&pa);
            let ib = dict.intern(&pb);

            let by_string = pb == pa || pb.starts_with(&format!("{pa}/"));
            prop_assert_eq!(dict.is_same_or_parent_of(ia, ib), by_string);
        }

        #[test]
        fn prop_render_round_trips(elements in path_strategy()) {
            let mut dict = PathDictionary::new();
            let path = format!("/{}", elements.join("/"));
            let index = dict.intern(&path);
            prop_assert_eq!(dict.path(index), path.clone());
            prop_assert_eq!(dict.find(&path), Some(index));
        }
    }
}
