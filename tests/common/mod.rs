#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset};
use revgraph::graph::{EntryHandle, RevisionGraph};
use revgraph::log::cache::{LogReceiver, LogSource, RawChange, WcStatus};
use revgraph::log::record::{ChangeAction, Revision, StandardRevProps};

/// In-memory log source scripted revision by revision, so graph scenarios
/// can be written without a repository or a log file on disk.
pub struct ScriptedRepo {
    root: String,
    revisions: Vec<(Revision, Vec<RawChange>)>,
    wc: Option<WcStatus>,
}

impl ScriptedRepo {
    pub fn new() -> Self {
        Self {
            root: "file:///repo".to_string(),
            revisions: Vec::new(),
            wc: None,
        }
    }

    pub fn commit(mut self, revision: Revision, changes: Vec<RawChange>) -> Self {
        self.revisions.push((revision, changes));
        self
    }

    pub fn checked_out(mut self, revision: Revision, modified: bool) -> Self {
        self.wc = Some(WcStatus::new(revision, modified));
        self
    }

    fn props(&self, revision: Revision) -> StandardRevProps {
        let base: DateTime<FixedOffset> =
            DateTime::parse_from_rfc3339("2024-03-01T09:00:00+00:00").unwrap();
        StandardRevProps::new(
            "alice".to_string(),
            base + Duration::minutes(revision as i64),
            format!("change {revision}"),
        )
    }
}

impl LogSource for ScriptedRepo {
    fn repository_root(&self) -> &str {
        &self.root
    }

    fn head_revision(&self) -> Revision {
        self.revisions.iter().map(|(r, _)| *r).max().unwrap_or(0)
    }

    fn fetch_log(
        &self,
        _path: &str,
        start: Revision,
        end: Revision,
        receiver: &mut dyn LogReceiver,
    ) -> Result<()> {
        let (low, high) = (start.min(end), start.max(end));
        for (revision, changes) in &self.revisions {
            if (low..=high).contains(revision) {
                receiver.receive_log(changes, *revision, &self.props(*revision))?;
            }
        }
        Ok(())
    }

    fn wc_status(&self) -> Option<WcStatus> {
        self.wc
    }
}

pub fn add(path: &str) -> RawChange {
    RawChange::new(ChangeAction::Added, path.to_string(), None)
}

pub fn add_from(path: &str, from: &str, revision: Revision) -> RawChange {
    RawChange::new(
        ChangeAction::Added,
        path.to_string(),
        Some((from.to_string(), revision)),
    )
}

pub fn modify(path: &str) -> RawChange {
    RawChange::new(ChangeAction::Modified, path.to_string(), None)
}

pub fn delete(path: &str) -> RawChange {
    RawChange::new(ChangeAction::Deleted, path.to_string(), None)
}

pub fn replace_from(path: &str, from: &str, revision: Revision) -> RawChange {
    RawChange::new(
        ChangeAction::Replaced,
        path.to_string(),
        Some((from.to_string(), revision)),
    )
}

/// Flattens the graph into `(revision, action letter, path)` triples, in
/// node order.
pub fn rendered<S: LogSource>(graph: &RevisionGraph<S>) -> Vec<(Revision, char, String)> {
    let store = graph.entries();
    let dictionary = graph.log().dictionary();
    store
        .entries()
        .iter()
        .map(|&h| {
            let entry = store.get(h);
            (
                entry.revision,
                entry.action.letter(),
                entry.path.to_path_string(dictionary),
            )
        })
        .collect()
}

pub fn find<S: LogSource>(
    graph: &RevisionGraph<S>,
    revision: Revision,
    path: &str,
) -> Option<EntryHandle> {
    let store = graph.entries();
    let dictionary = graph.log().dictionary();
    store.entries().iter().copied().find(|&h| {
        let entry = store.get(h);
        entry.revision == revision && entry.path.to_path_string(dictionary) == path
    })
}
