//! Change records and revision properties.

use bitflags::bitflags;
use chrono::{DateTime, FixedOffset};
use derive_new::new;
use phf::phf_map;

use crate::log::dictionary::PathIndex;

/// Revision numbers are dense and start at 1; 0 never names a revision.
pub type Revision = u32;

pub const NO_REVISION: Revision = 0;

/// What a single change record did to its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Added,
    Modified,
    Deleted,
    Replaced,
}

/// Action letters as they appear in a verbose change log.
pub static ACTION_LETTERS: phf::Map<char, ChangeAction> = phf_map! {
    'A' => ChangeAction::Added,
    'M' => ChangeAction::Modified,
    'D' => ChangeAction::Deleted,
    'R' => ChangeAction::Replaced,
};

impl ChangeAction {
    pub fn letter(self) -> char {
        match self {
            ChangeAction::Added => 'A',
            ChangeAction::Modified => 'M',
            ChangeAction::Deleted => 'D',
            ChangeAction::Replaced => 'R',
        }
    }

    pub fn as_mask(self) -> ChangeMask {
        match self {
            ChangeAction::Added => ChangeMask::ADDED,
            ChangeAction::Modified => ChangeMask::MODIFIED,
            ChangeAction::Deleted => ChangeMask::DELETED,
            ChangeAction::Replaced => ChangeMask::REPLACED,
        }
    }
}

bitflags! {
    /// Union of the change kinds a revision contains. Lets the crawl skip
    /// whole revisions (e.g. modification-only ones) without touching the
    /// individual records.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ChangeMask: u8 {
        const ADDED = 0x01;
        const MODIFIED = 0x02;
        const DELETED = 0x04;
        const REPLACED = 0x08;
        const HAS_COPY_FROM = 0x10;
    }
}

/// One changed path within a revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct ChangeRecord {
    pub path: PathIndex,
    pub action: ChangeAction,
    pub copy_from: Option<(PathIndex, Revision)>,
}

impl ChangeRecord {
    pub fn mask(&self) -> ChangeMask {
        let mut mask = self.action.as_mask();
        if self.copy_from.is_some() {
            mask |= ChangeMask::HAS_COPY_FROM;
        }
        mask
    }
}

/// Author, timestamp and message of a revision.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct StandardRevProps {
    pub author: String,
    pub date: DateTime<FixedOffset>,
    pub message: String,
}
