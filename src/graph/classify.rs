//! Trunk / branch / tag classification.
//!
//! Paths are classified by matching their individual elements against
//! user-configurable wildcard patterns ("tags;releases"). The optimizer
//! additionally tracks derived state (deleted subtrees, copy targets) in
//! the same flag word; the `COPIES_TO_*` bits are the `IS_*` bits shifted
//! left by four, which lets a node inherit its targets' classification
//! with a single shift.

use bitflags::bitflags;

use crate::log::dictionary::{PathDictionary, TempPath};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Classification: u16 {
        const IS_TRUNK = 0x0001;
        const IS_BRANCH = 0x0002;
        const IS_TAG = 0x0004;
        const IS_MASK = 0x000f;

        const COPIES_TO_TRUNK = 0x0010;
        const COPIES_TO_BRANCH = 0x0020;
        const COPIES_TO_TAG = 0x0040;
        const COPIES_TO_MASK = 0x00f0;

        const IS_DELETED = 0x0100;
        const ALL_COPIES_DELETED = 0x0200;
        /// Deleted and all copies made from it deleted as well.
        const SUBTREE_DELETED = 0x0300;

        const IS_MODIFIED = 0x0400;
    }
}

impl Classification {
    /// Maps the `IS_*` bits onto the corresponding `COPIES_TO_*` bits.
    pub fn as_copy_target_bits(self) -> Classification {
        Classification::from_bits_truncate((self & Classification::IS_MASK).bits() << 4)
    }
}

/// Case-insensitive glob over a single path element (`*` and `?`).
fn element_matches(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().flat_map(char::to_lowercase).collect();

    let (mut p, mut t) = (0usize, 0usize);
    let (mut star_p, mut star_t) = (usize::MAX, 0usize);
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star_p = p;
            star_t = t;
            p += 1;
        } else if star_p != usize::MAX {
            p = star_p + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

#[derive(Debug)]
struct PatternSet {
    patterns: Vec<String>,
    class: Classification,
}

impl PatternSet {
    fn new(spec: &str, class: Classification) -> Self {
        let patterns = spec
            .split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_lowercase)
            .collect();
        Self { patterns, class }
    }

    fn matches(&self, element: &str) -> bool {
        self.patterns.iter().any(|p| element_matches(p, element))
    }
}

/// Classifies paths by their elements.
#[derive(Debug)]
pub struct PathClassifier {
    sets: [PatternSet; 3],
}

impl Default for PathClassifier {
    fn default() -> Self {
        Self::new("trunk", "branches", "tags")
    }
}

impl PathClassifier {
    pub fn new(trunk: &str, branches: &str, tags: &str) -> Self {
        Self {
            sets: [
                PatternSet::new(trunk, Classification::IS_TRUNK),
                PatternSet::new(branches, Classification::IS_BRANCH),
                PatternSet::new(tags, Classification::IS_TAG),
            ],
        }
    }

    pub fn classify_elements(&self, elements: &[&str]) -> Classification {
        let mut result = Classification::empty();
        for element in elements {
            for set in &self.sets {
                if set.matches(element) {
                    result |= set.class;
                }
            }
        }
        result
    }

    pub fn classify(&self, path: &TempPath, dictionary: &PathDictionary) -> Classification {
        self.classify_elements(&path.elements(dictionary))
    }
}
