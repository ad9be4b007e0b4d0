use pretty_assertions::assert_eq;
use revgraph::error::GraphError;
use revgraph::graph::{Classification, GraphOptions, RevisionGraph};

mod common;

use common::{ScriptedRepo, add, add_from, delete, find, modify, rendered};

/// trunk gets created, modified, branched and modified again
fn branched_trunk() -> ScriptedRepo {
    ScriptedRepo::new()
        .commit(1, vec![add("/trunk"), add("/trunk/file.c")])
        .commit(2, vec![modify("/trunk/file.c")])
        .commit(3, vec![add_from("/branches/b", "/trunk", 2)])
        .commit(4, vec![modify("/branches/b/file.c")])
        .commit(5, vec![modify("/trunk/file.c")])
}

#[test]
fn copies_show_up_as_source_and_target_nodes() {
    let mut graph = RevisionGraph::new(branched_trunk());
    graph.fetch_revision_data("/trunk", None).unwrap();
    graph
        .analyze_revision_data("/trunk", GraphOptions::default())
        .unwrap();

    // plain modifications do not get nodes of their own, but the state the
    // branch was copied from does
    assert_eq!(
        rendered(&graph),
        vec![
            (1, 'A', "/trunk".to_string()),
            (2, 'S', "/trunk".to_string()),
            (3, '+', "/branches/b".to_string()),
        ]
    );

    let store = graph.entries();
    let trunk = find(&graph, 1, "/trunk").unwrap();
    let source = find(&graph, 2, "/trunk").unwrap();
    let branch = find(&graph, 3, "/branches/b").unwrap();

    assert_eq!(store.get(trunk).next, Some(source));
    assert_eq!(store.get(source).copy_targets, vec![branch]);
    assert_eq!(store.get(branch).copy_source, Some(source));

    assert!(store.get(branch).classification.contains(Classification::IS_BRANCH));
    assert!(
        store
            .get(source)
            .classification
            .contains(Classification::COPIES_TO_BRANCH)
    );
}

#[test]
fn sub_path_changes_become_nodes_when_requested() {
    let mut graph = RevisionGraph::new(branched_trunk());
    graph.fetch_revision_data("/trunk", None).unwrap();
    graph
        .analyze_revision_data(
            "/trunk",
            GraphOptions {
                include_sub_path_changes: true,
                ..GraphOptions::default()
            },
        )
        .unwrap();

    assert_eq!(
        rendered(&graph),
        vec![
            (1, 'A', "/trunk".to_string()),
            (2, 'M', "/trunk".to_string()),
            (3, '+', "/branches/b".to_string()),
            (4, 'M', "/branches/b".to_string()),
            (5, 'M', "/trunk".to_string()),
        ]
    );

    // the node records which change produced it
    let store = graph.entries();
    let modified = find(&graph, 2, "/trunk").unwrap();
    let real_path = graph.log().dictionary().path(store.get(modified).real_path);
    assert_eq!(real_path, "/trunk/file.c");

    // the copy departs from the newest trunk node instead of a synthetic one
    let branch = find(&graph, 3, "/branches/b").unwrap();
    assert_eq!(store.get(branch).copy_source, Some(modified));
}

#[test]
fn a_delete_plus_copy_pair_becomes_a_rename() {
    let repo = ScriptedRepo::new()
        .commit(1, vec![add("/trunk/old")])
        .commit(
            2,
            vec![delete("/trunk/old"), add_from("/trunk/new", "/trunk/old", 1)],
        );

    let mut graph = RevisionGraph::new(repo);
    graph.fetch_revision_data("/trunk/new", None).unwrap();
    graph
        .analyze_revision_data("/trunk/new", GraphOptions::default())
        .unwrap();

    // history is followed through the rename; the delete node disappears
    assert_eq!(
        rendered(&graph),
        vec![
            (1, 'A', "/trunk/old".to_string()),
            (2, 'V', "/trunk/new".to_string()),
        ]
    );

    let store = graph.entries();
    let old = find(&graph, 1, "/trunk/old").unwrap();
    let new = find(&graph, 2, "/trunk/new").unwrap();
    assert_eq!(store.get(old).next, Some(new));
    assert_eq!(store.get(new).copy_source, None);
}

#[test]
fn deleted_branches_can_be_removed_entirely() {
    let repo = ScriptedRepo::new()
        .commit(1, vec![add("/trunk")])
        .commit(3, vec![add_from("/branches/dead", "/trunk", 1)])
        .commit(4, vec![delete("/branches/dead")]);

    let mut graph = RevisionGraph::new(repo);
    graph.fetch_revision_data("/trunk", None).unwrap();
    graph
        .analyze_revision_data(
            "/trunk",
            GraphOptions {
                remove_deleted_ones: true,
                ..GraphOptions::default()
            },
        )
        .unwrap();

    assert_eq!(rendered(&graph), vec![(1, 'A', "/trunk".to_string())]);
    let trunk = find(&graph, 1, "/trunk").unwrap();
    assert!(graph.entries().get(trunk).copy_targets.is_empty());
}

#[test]
fn unmodified_tags_fold_into_their_source_node() {
    let repo = ScriptedRepo::new()
        .commit(1, vec![add("/trunk")])
        .commit(2, vec![add_from("/tags/v1", "/trunk", 1)]);

    let mut graph = RevisionGraph::new(repo);
    graph.fetch_revision_data("/trunk", None).unwrap();
    graph
        .analyze_revision_data(
            "/trunk",
            GraphOptions {
                fold_tags: true,
                ..GraphOptions::default()
            },
        )
        .unwrap();

    assert_eq!(rendered(&graph), vec![(1, 'A', "/trunk".to_string())]);

    let trunk = find(&graph, 1, "/trunk").unwrap();
    let tags = &graph.entries().get(trunk).tags;
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].path, "/tags/v1");
    assert!(!tags[0].alias);
    assert!(!tags[0].deleted);
}

#[test]
fn still_live_lines_get_a_head_marker() {
    let repo = ScriptedRepo::new()
        .commit(1, vec![add("/trunk")])
        .commit(2, vec![modify("/trunk/file.c")]);

    let mut graph = RevisionGraph::new(repo);
    graph.fetch_revision_data("/trunk", None).unwrap();
    graph
        .analyze_revision_data(
            "/trunk",
            GraphOptions {
                show_head: true,
                ..GraphOptions::default()
            },
        )
        .unwrap();

    assert_eq!(
        rendered(&graph),
        vec![
            (1, 'A', "/trunk".to_string()),
            (2, 'H', "/trunk".to_string()),
        ]
    );
    let head = find(&graph, 2, "/trunk").unwrap();
    let real_path = graph.log().dictionary().path(graph.entries().get(head).real_path);
    assert_eq!(real_path, "/trunk/file.c");
}

#[test]
fn the_working_copy_revision_is_spliced_into_the_chain() {
    let repo = ScriptedRepo::new()
        .commit(1, vec![add("/trunk")])
        .commit(3, vec![modify("/trunk/file.c")])
        .checked_out(2, false);

    let mut graph = RevisionGraph::new(repo);
    graph.fetch_revision_data("/trunk", None).unwrap();
    graph
        .analyze_revision_data(
            "/trunk",
            GraphOptions {
                include_sub_path_changes: true,
                show_wc_rev: true,
                ..GraphOptions::default()
            },
        )
        .unwrap();

    assert_eq!(
        rendered(&graph),
        vec![
            (1, 'A', "/trunk".to_string()),
            (2, 'M', "/trunk".to_string()),
            (3, 'M', "/trunk".to_string()),
        ]
    );

    let store = graph.entries();
    let wc = find(&graph, 2, "/trunk").unwrap();
    assert!(store.get(wc).working_copy);
    assert_eq!(store.get(find(&graph, 1, "/trunk").unwrap()).next, Some(wc));
    assert_eq!(store.get(wc).next, find(&graph, 3, "/trunk"));
}

#[test]
fn the_revision_window_filters_nodes() {
    let repo = ScriptedRepo::new()
        .commit(1, vec![add("/trunk")])
        .commit(2, vec![modify("/trunk/file.c")])
        .commit(3, vec![modify("/trunk/file.c")])
        .commit(5, vec![modify("/trunk/file.c")]);

    let mut graph = RevisionGraph::new(repo);
    graph.set_filter(2, 4, "");
    graph.fetch_revision_data("/trunk", None).unwrap();
    graph
        .analyze_revision_data(
            "/trunk",
            GraphOptions {
                include_sub_path_changes: true,
                ..GraphOptions::default()
            },
        )
        .unwrap();

    assert_eq!(
        rendered(&graph),
        vec![
            (2, 'M', "/trunk".to_string()),
            (3, 'M', "/trunk".to_string()),
        ]
    );

    // the chain was relinked around the dropped nodes
    let store = graph.entries();
    let first = find(&graph, 2, "/trunk").unwrap();
    let second = find(&graph, 3, "/trunk").unwrap();
    assert_eq!(store.get(first).prev, None);
    assert_eq!(store.get(first).next, Some(second));
    assert_eq!(store.get(second).next, None);
}

#[test]
fn a_pinpoint_revision_window_keeps_only_that_revision() {
    let mut graph = RevisionGraph::new(branched_trunk());
    graph.set_filter(3, 3, "");
    graph.fetch_revision_data("/trunk", None).unwrap();
    graph
        .analyze_revision_data("/trunk", GraphOptions::default())
        .unwrap();

    assert_eq!(rendered(&graph), vec![(3, '+', "/branches/b".to_string())]);

    // the branch lost its source but still gets laid out as its own root
    let branch = find(&graph, 3, "/branches/b").unwrap();
    let store = graph.entries();
    assert_eq!(store.get(branch).copy_source, None);
    assert_eq!((store.get(branch).row, store.get(branch).column), (1, 1));
}

#[test]
fn exact_copy_sources_sit_at_the_copy_revision() {
    let repo = ScriptedRepo::new()
        .commit(1, vec![add("/trunk")])
        .commit(2, vec![modify("/trunk/file.c")])
        .commit(3, vec![modify("/other/file.c")])
        .commit(4, vec![add_from("/branches/b", "/trunk", 3)]);

    let mut graph = RevisionGraph::new(repo);
    graph.fetch_revision_data("/trunk", None).unwrap();

    // by default the source node sits at the last change of the path
    graph
        .analyze_revision_data("/trunk", GraphOptions::default())
        .unwrap();
    assert_eq!(
        rendered(&graph),
        vec![
            (1, 'A', "/trunk".to_string()),
            (2, 'S', "/trunk".to_string()),
            (4, '+', "/branches/b".to_string()),
        ]
    );

    graph
        .analyze_revision_data(
            "/trunk",
            GraphOptions {
                exact_copy_sources: true,
                ..GraphOptions::default()
            },
        )
        .unwrap();
    assert_eq!(
        rendered(&graph),
        vec![
            (1, 'A', "/trunk".to_string()),
            (3, 'S', "/trunk".to_string()),
            (4, '+', "/branches/b".to_string()),
        ]
    );
}

#[test]
fn a_peg_newer_than_head_is_an_inconsistency() {
    let mut graph = RevisionGraph::new(branched_trunk());
    graph.fetch_revision_data("/trunk", Some(99)).unwrap();

    let error = graph
        .analyze_revision_data("/trunk", GraphOptions::default())
        .unwrap_err();
    assert!(matches!(error, GraphError::Inconsistency(_)));
    assert_eq!(
        graph.last_error_message(),
        Some("inconsistent change log: peg revision r99 is newer than head r5")
    );
}

#[test]
fn cancellation_aborts_the_analysis() {
    let mut graph = RevisionGraph::new(branched_trunk());
    graph.fetch_revision_data("/trunk", None).unwrap();

    graph
        .monitor_mut()
        .cancel_flag()
        .store(true, std::sync::atomic::Ordering::Relaxed);

    let error = graph
        .analyze_revision_data("/trunk", GraphOptions::default())
        .unwrap_err();
    assert!(error.is_cancelled());
    assert_eq!(graph.last_error_message(), Some("operation cancelled"));
}

#[test]
fn layout_places_the_branch_next_to_the_trunk() {
    let mut graph = RevisionGraph::new(branched_trunk());
    graph.fetch_revision_data("/trunk", None).unwrap();
    graph
        .analyze_revision_data(
            "/trunk",
            GraphOptions {
                oldest_at_top: true,
                ..GraphOptions::default()
            },
        )
        .unwrap();

    let store = graph.entries();
    let trunk = find(&graph, 1, "/trunk").unwrap();
    let source = find(&graph, 2, "/trunk").unwrap();
    let branch = find(&graph, 3, "/branches/b").unwrap();

    assert_eq!(store.get(trunk).column, 1);
    assert_eq!(store.get(source).column, 1);
    assert_eq!(store.get(branch).column, 2);
    assert!(store.get(trunk).row < store.get(source).row);
    assert_eq!((graph.max_row(), graph.max_column()), (3, 2));
}
