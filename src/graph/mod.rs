//! Revision graph construction.
//!
//! [`RevisionGraph`] is the facade: fetch the log once, then analyze it as
//! often as the options change. Analysis runs the forward crawl over the
//! cached log, the optimizer pass chain and the grid layout; the result is
//! the ordered node list with row/column coordinates.

pub mod builder;
pub mod classify;
pub mod copies;
pub mod entry;
pub mod history;
pub mod layout;
pub mod optimize;
pub mod search_tree;

pub use classify::{Classification, PathClassifier};
pub use entry::{EntryAction, EntryHandle, EntryStore, FoldedTag, RevisionEntry};

use crate::error::GraphError;
use crate::graph::builder::Crawler;
use crate::graph::copies::CopyIndex;
use crate::graph::history::find_start_path;
use crate::log::cache::{CachedLog, LogSource, MonitoredReceiver, ProgressMonitor, WcStatus};
use crate::log::dictionary::TempPath;
use crate::log::record::Revision;

/// What the graph should show.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphOptions {
    /// Show changes to sub-paths of tracked paths as nodes of their own.
    pub include_sub_path_changes: bool,
    /// Mark the node the working copy is checked out at.
    pub show_wc_rev: bool,
    /// Add head markers for paths that still exist.
    pub show_head: bool,
    /// Oldest revision in the first row instead of the newest.
    pub oldest_at_top: bool,
    /// One row per node, branch subtrees grouped below their source.
    pub group_branches: bool,
    /// Keep a spacer row between branches stacked in one column.
    pub reduce_cross_lines: bool,
    /// Drop lines whose whole subtree was deleted.
    pub remove_deleted_ones: bool,
    /// Collapse unmodified tag copies into annotations.
    pub fold_tags: bool,
    /// Use the copy revision itself as source instead of the last change.
    pub exact_copy_sources: bool,
}

/// Node filter applied between optimization and layout.
#[derive(Debug, Clone)]
pub struct GraphFilter {
    pub min_revision: Revision,
    pub max_revision: Revision,
    /// Nodes whose real path contains one of these strings are dropped.
    pub paths: Vec<String>,
}

impl Default for GraphFilter {
    fn default() -> Self {
        Self {
            min_revision: 0,
            max_revision: Revision::MAX,
            paths: Vec::new(),
        }
    }
}

pub struct RevisionGraph<S> {
    source: S,
    log: CachedLog,
    store: EntryStore,
    classifier: PathClassifier,
    filter: GraphFilter,
    monitor: ProgressMonitor,

    repos_root: String,
    head: Revision,
    peg: Option<Revision>,
    wc_status: Option<WcStatus>,
    last_error: Option<String>,
    max_row: i32,
    max_column: i32,
}

impl<S: LogSource> RevisionGraph<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            log: CachedLog::new(),
            store: EntryStore::new(),
            classifier: PathClassifier::default(),
            filter: GraphFilter::default(),
            monitor: ProgressMonitor::new(),
            repos_root: String::new(),
            head: 0,
            peg: None,
            wc_status: None,
            last_error: None,
            max_row: 0,
            max_column: 0,
        }
    }

    pub fn set_classifier(&mut self, classifier: PathClassifier) {
        self.classifier = classifier;
    }

    /// Restricts the graph to a revision window and drops nodes whose path
    /// contains one of the `'*'`-separated filter strings ('*' cannot occur
    /// in a path, so it is safe as a separator).
    pub fn set_filter(&mut self, min_revision: Revision, max_revision: Revision, paths: &str) {
        self.filter = GraphFilter {
            min_revision,
            max_revision,
            paths: paths
                .split('*')
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
        };
    }

    pub fn monitor_mut(&mut self) -> &mut ProgressMonitor {
        &mut self.monitor
    }

    /// Loads the whole log into the cache. Must be called before
    /// [`Self::analyze_revision_data`]; analysis can then be re-run with
    /// different options without fetching again.
    pub fn fetch_revision_data(
        &mut self,
        path: &str,
        peg: Option<Revision>,
    ) -> Result<(), GraphError> {
        self.last_error = None;
        let result = self.do_fetch(path, peg);
        if let Err(error) = &result {
            self.last_error = Some(error.to_string());
        }
        result
    }

    fn do_fetch(&mut self, path: &str, peg: Option<Revision>) -> Result<(), GraphError> {
        self.repos_root = self.source.repository_root().to_string();
        self.head = self.source.head_revision();
        self.wc_status = self.source.wc_status();
        // checked-out revision doubles as the peg when none was given
        self.peg = peg.or(self.wc_status.map(|wc| wc.revision));

        if self.head == 0 {
            return Ok(());
        }

        let mut receiver = MonitoredReceiver {
            inner: &mut self.log,
            monitor: &mut self.monitor,
            total: self.head,
        };
        self.source
            .fetch_log(path, 1, self.head, &mut receiver)
            .map_err(|error| match error.downcast::<GraphError>() {
                Ok(graph_error) => graph_error,
                Err(other) => GraphError::Repository(format!("{other:#}")),
            })
    }

    /// Builds the graph for `path` from the cached log.
    pub fn analyze_revision_data(
        &mut self,
        path: &str,
        options: GraphOptions,
    ) -> Result<(), GraphError> {
        self.last_error = None;
        let result = self.do_analyze(path, options);
        if let Err(error) = &result {
            self.last_error = Some(error.to_string());
        }
        result
    }

    fn do_analyze(&mut self, path: &str, options: GraphOptions) -> Result<(), GraphError> {
        self.store.clear();
        self.max_row = 0;
        self.max_column = 0;

        let wc_revision = if options.show_wc_rev {
            self.wc_status.map(|wc| wc.revision)
        } else {
            None
        };

        // empty repository: nothing to draw
        if self.head == 0 {
            return Ok(());
        }

        let peg = self.peg.unwrap_or(self.head);

        // a stale cache cannot answer queries beyond its head
        if peg > self.head {
            return Err(GraphError::Inconsistency(format!(
                "peg revision r{peg} is newer than head r{}",
                self.head
            )));
        }

        // the path may have had a different name in its past
        let log = &self.log;
        let query_path = TempPath::new(log.dictionary(), path);
        let (start_path, initial_revision) = find_start_path(log, peg, &query_path);

        let mut copies = CopyIndex::build(log);
        Crawler::new(log, &mut copies, &mut self.store, options, self.head).run(
            &mut self.monitor,
            &start_path,
            initial_revision,
            &query_path,
            wc_revision,
        )?;

        optimize::optimize(
            &mut self.store,
            self.log.dictionary(),
            &self.classifier,
            &self.filter,
            &options,
        );

        layout::assign_coordinates(&mut self.store, &options);
        layout::cleanup(&mut self.store);
        let (max_row, max_column) = layout::extent(&self.store);
        self.max_row = max_row;
        self.max_column = max_column;

        Ok(())
    }

    /// The analyzed nodes, ordered by revision.
    pub fn entries(&self) -> &EntryStore {
        &self.store
    }

    pub fn log(&self) -> &CachedLog {
        &self.log
    }

    pub fn repos_root(&self) -> &str {
        &self.repos_root
    }

    pub fn head_revision(&self) -> Revision {
        self.head
    }

    pub fn last_error_message(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn max_row(&self) -> i32 {
        self.max_row
    }

    pub fn max_column(&self) -> i32 {
        self.max_column
    }
}
