//! Cached change logs.
//!
//! A [`LogSource`] abstracts over where revision data comes from (a parsed
//! log file, an in-memory fixture, a live repository connection). Whatever
//! the source, the data ends up in a [`CachedLog`]: one dense slot per
//! revision, all paths interned into a shared [`PathDictionary`], plus the
//! per-revision change mask and common root that let the crawl skip
//! irrelevant revisions quickly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use derive_new::new;

use crate::error::GraphError;
use crate::log::dictionary::{PathDictionary, PathIndex};
use crate::log::record::{ChangeAction, ChangeMask, ChangeRecord, Revision, StandardRevProps};

/// A change line as delivered by a log source, before interning.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct RawChange {
    pub action: ChangeAction,
    pub path: String,
    pub copy_from: Option<(String, Revision)>,
}

/// Sink for revisions streamed out of a [`LogSource`].
pub trait LogReceiver {
    fn receive_log(
        &mut self,
        changes: &[RawChange],
        revision: Revision,
        props: &StandardRevProps,
    ) -> Result<()>;
}

/// Status of a checked-out working copy, if the source has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct WcStatus {
    pub revision: Revision,
    pub modified: bool,
}

/// Where revision data comes from.
pub trait LogSource {
    fn repository_root(&self) -> &str;

    fn head_revision(&self) -> Revision;

    /// Streams the log for `path` from `start` down to `end` (inclusive)
    /// into `receiver`. Revisions may arrive in any order; the cache sorts
    /// by construction since slots are addressed by revision number.
    fn fetch_log(
        &self,
        path: &str,
        start: Revision,
        end: Revision,
        receiver: &mut dyn LogReceiver,
    ) -> Result<()>;

    /// Offline sources have no working copy.
    fn wc_status(&self) -> Option<WcStatus> {
        None
    }
}

/// All change records of one revision, interned.
#[derive(Debug, Clone)]
pub struct RevisionData {
    pub records: Vec<ChangeRecord>,
    /// Deepest common ancestor of all changed paths.
    pub root_path: PathIndex,
    pub mask: ChangeMask,
    pub props: StandardRevProps,
}

/// Dense per-revision store of interned change data.
#[derive(Debug)]
pub struct CachedLog {
    dictionary: PathDictionary,
    revisions: Vec<Option<RevisionData>>,
}

impl Default for CachedLog {
    fn default() -> Self {
        Self::new()
    }
}

impl CachedLog {
    pub fn new() -> Self {
        Self {
            dictionary: PathDictionary::new(),
            revisions: Vec::new(),
        }
    }

    pub fn dictionary(&self) -> &PathDictionary {
        &self.dictionary
    }

    /// Highest revision with a slot (fetched or not).
    pub fn max_revision(&self) -> Revision {
        self.revisions.len().saturating_sub(1) as Revision
    }

    /// Lowest fetched revision, if any.
    pub fn first_revision(&self) -> Option<Revision> {
        self.revisions
            .iter()
            .position(Option::is_some)
            .map(|slot| slot as Revision)
    }

    pub fn revision(&self, revision: Revision) -> Option<&RevisionData> {
        self.revisions.get(revision as usize)?.as_ref()
    }

    pub fn insert(
        &mut self,
        revision: Revision,
        changes: &[RawChange],
        props: StandardRevProps,
    ) {
        let mut records = Vec::with_capacity(changes.len());
        let mut mask = ChangeMask::empty();
        let mut root_path: Option<PathIndex> = None;

        for change in changes {
            let path = self.dictionary.intern(&change.path);
            let copy_from = change
                .copy_from
                .as_ref()
                .map(|(from, rev)| (self.dictionary.intern(from), *rev));
            let record = ChangeRecord::new(path, change.action, copy_from);
            mask |= record.mask();
            root_path = Some(match root_path {
                Some(root) => self.dictionary.common_root(root, path),
                None => path,
            });
            records.push(record);
        }

        let slot = revision as usize;
        if self.revisions.len() <= slot {
            self.revisions.resize_with(slot + 1, || None);
        }
        self.revisions[slot] = Some(RevisionData {
            records,
            root_path: root_path.unwrap_or(PathIndex::ROOT),
            mask,
            props,
        });
    }
}

impl LogReceiver for CachedLog {
    fn receive_log(
        &mut self,
        changes: &[RawChange],
        revision: Revision,
        props: &StandardRevProps,
    ) -> Result<()> {
        self.insert(revision, changes, props.clone());
        Ok(())
    }
}

/// Cancellation flag plus a rate-limited progress callback.
///
/// `check` is cheap enough to call once per revision; the callback fires at
/// most every [`REPORT_INTERVAL`] so UI updates never dominate the crawl.
pub struct ProgressMonitor {
    cancel: Arc<AtomicBool>,
    callback: Option<Box<dyn FnMut(Revision, Revision)>>,
    last_report: Instant,
}

pub const REPORT_INTERVAL: Duration = Duration::from_millis(200);

impl Default for ProgressMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressMonitor {
    pub fn new() -> Self {
        Self {
            cancel: Arc::new(AtomicBool::new(false)),
            callback: None,
            last_report: Instant::now(),
        }
    }

    /// Shared flag a UI thread can set to abort the run.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn set_callback(&mut self, callback: impl FnMut(Revision, Revision) + 'static) {
        self.callback = Some(Box::new(callback));
    }

    pub fn check(&mut self, revision: Revision, total: Revision) -> Result<(), GraphError> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(GraphError::Cancelled);
        }
        if let Some(callback) = self.callback.as_mut()
            && self.last_report.elapsed() >= REPORT_INTERVAL
        {
            callback(revision, total);
            self.last_report = Instant::now();
        }
        Ok(())
    }
}

/// Receiver wrapper that polls a monitor between revisions, so a fetch can
/// be cancelled mid-stream.
pub struct MonitoredReceiver<'a> {
    pub inner: &'a mut CachedLog,
    pub monitor: &'a mut ProgressMonitor,
    pub total: Revision,
}

impl LogReceiver for MonitoredReceiver<'_> {
    fn receive_log(
        &mut self,
        changes: &[RawChange],
        revision: Revision,
        props: &StandardRevProps,
    ) -> Result<()> {
        self.monitor.check(revision, self.total)?;
        self.inner.receive_log(changes, revision, props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn props() -> StandardRevProps {
        StandardRevProps::new(
            "alice".into(),
            DateTime::parse_from_rfc3339("2024-03-01T12:00:00+00:00").unwrap(),
            "a change".into(),
        )
    }

    #[test]
    fn insert_interns_paths_and_unions_masks() {
        let mut log = CachedLog::new();
        log.insert(
            1,
            &[
                RawChange::new(ChangeAction::Added, "/trunk".into(), None),
                RawChange::new(ChangeAction::Added, "/trunk/file".into(), None),
            ],
            props(),
        );
        log.insert(
            2,
            &[RawChange::new(
                ChangeAction::Added,
                "/branches/b".into(),
                Some(("/trunk".into(), 1)),
            )],
            props(),
        );

        let r1 = log.revision(1).unwrap();
        assert_eq!(r1.mask, ChangeMask::ADDED);
        assert_eq!(log.dictionary().path(r1.root_path), "/trunk");

        let r2 = log.revision(2).unwrap();
        assert!(r2.mask.contains(ChangeMask::HAS_COPY_FROM));
        let copy = r2.records[0].copy_from.unwrap();
        assert_eq!(log.dictionary().path(copy.0), "/trunk");
        assert_eq!(copy.1, 1);
    }

    #[test]
    fn unfetched_revisions_stay_empty() {
        let mut log = CachedLog::new();
        log.insert(5, &[], props());
        assert_eq!(log.max_revision(), 5);
        assert!(log.revision(3).is_none());
        assert!(log.revision(5).is_some());
    }

    #[test]
    fn cancelled_monitor_stops_the_check() {
        let mut monitor = ProgressMonitor::new();
        assert!(monitor.check(1, 10).is_ok());
        monitor.cancel_flag().store(true, Ordering::Relaxed);
        assert!(monitor.check(2, 10).unwrap_err().is_cancelled());
    }
}
