//! Row / column placement of the finished graph.
//!
//! Rows are assigned first, either one row per revision or one row per
//! node with branches grouped together. Columns are then assigned
//! recursively from left to right, one branch level per recursion step,
//! with a per-row occupancy table preventing overlaps.

use crate::graph::GraphOptions;
use crate::graph::entry::{EntryHandle, EntryStore};

pub fn assign_coordinates(store: &mut EntryStore, options: &GraphOptions) {
    // pathological but not impossible
    if store.is_empty() {
        return;
    }

    // filtering can leave several disconnected lines
    let roots: Vec<EntryHandle> = store
        .entries()
        .iter()
        .copied()
        .filter(|&h| store.get(h).prev.is_none() && store.get(h).copy_source.is_none())
        .collect();

    let first_unused_row = if options.group_branches {
        let mut row = 1;
        for &root in &roots {
            row = row.max(assign_one_row_per_branch_node(store, root, row));
        }
        row
    } else {
        assign_one_row_per_revision(store)
    };

    // highest used column per row
    let mut column_by_row = vec![0i32; (first_unused_row + 1) as usize];
    for &root in &roots {
        assign_columns(store, root, &mut column_by_row, 1, options);
    }

    // newest revision in the first row unless requested otherwise
    if !options.oldest_at_top {
        reverse_row_order(store, first_unused_row);
    }
}

/// Nodes of the same revision share a row. Returns the first unused row.
fn assign_one_row_per_revision(store: &mut EntryStore) -> i32 {
    let mut row = 0;
    let mut last_revision = 0;
    for i in 0..store.len() {
        let handle = store.entries()[i];
        let revision = store.get(handle).revision;
        if revision > last_revision {
            last_revision = revision;
            row += 1;
        }
        store.get_mut(handle).row = row;
    }
    row + 1
}

/// Every node gets its own row; a branch point pushes its targets below
/// everything the earlier part of the line produced. Returns the first
/// unused row.
fn assign_one_row_per_branch_node(store: &mut EntryStore, start: EntryHandle, row: i32) -> i32 {
    let mut row = row;
    let mut max_row = row;
    let mut node = Some(start);
    while let Some(handle) = node {
        let targets = store.get(handle).copy_targets.clone();
        if targets.is_empty() {
            store.get_mut(handle).row = row;
            row += 1;
            max_row = max_row.max(row);
        } else {
            row = max_row;
            store.get_mut(handle).row = row;
            row += 1;

            for target in targets {
                max_row = max_row.max(assign_one_row_per_branch_node(store, target, row));
            }
        }
        node = store.get(handle).next;
    }
    max_row
}

/// Assigns columns to one line and recurses into its branches, left to
/// right, one branch level per step.
fn assign_columns(
    store: &mut EntryStore,
    start: EntryHandle,
    column_by_row: &mut [i32],
    column: i32,
    options: &GraphOptions,
) {
    let mut start_row = store.get(start).row;
    if options.reduce_cross_lines && start_row > 0 {
        // most crossings happen when one branch ends exactly one row above
        // the next one in the same column; claiming one extra row keeps a
        // spacer row between them
        start_row -= 1;
    }

    // smallest free column over the whole line, skipping split sections
    let mut column = column;
    let mut last_row = start_row;
    let mut node = Some(start);
    while let Some(handle) = node {
        let row = store.get(handle).row;
        for r in last_row..=row {
            column = column.max(column_by_row[r as usize] + 1);
        }
        last_row = row;
        node = store.get(handle).next;
    }

    // assign it and collect the branch points
    let mut branches: Vec<EntryHandle> = Vec::new();
    node = Some(start);
    while let Some(handle) = node {
        store.get_mut(handle).column = column;
        if !store.get(handle).copy_targets.is_empty() {
            branches.push(handle);
        }
        node = store.get(handle).next;
    }

    // block the column for the whole line
    last_row = start_row;
    node = Some(start);
    while let Some(handle) = node {
        let row = store.get(handle).row;
        for r in last_row..=row {
            column_by_row[r as usize] = column;
        }
        last_row = row;
        node = store.get(handle).next;
    }

    // newest branch points first keeps short-lived branches close
    for &branch in branches.iter().rev() {
        let targets = store.get(branch).copy_targets.clone();
        for target in targets {
            assign_columns(store, target, column_by_row, column + 1, options);
        }
    }
}

fn reverse_row_order(store: &mut EntryStore, first_unused_row: i32) {
    for i in 0..store.len() {
        let handle = store.entries()[i];
        let row = store.get(handle).row;
        store.get_mut(handle).row = first_unused_row - row;
    }
}

/// Orders every node's copy targets by (column, row) so that outgoing
/// edges can be drawn without crossing each other.
pub fn cleanup(store: &mut EntryStore) {
    for i in 0..store.len() {
        let handle = store.entries()[i];
        if store.get(handle).copy_targets.len() < 2 {
            continue;
        }
        let mut targets = store.get(handle).copy_targets.clone();
        targets.sort_by_key(|&t| (store.get(t).column, store.get(t).row));
        store.get_mut(handle).copy_targets = targets;
    }
}

/// Extent of the laid-out grid.
pub fn extent(store: &EntryStore) -> (i32, i32) {
    let mut max_row = 0;
    let mut max_column = 0;
    for &handle in store.entries() {
        max_row = max_row.max(store.get(handle).row);
        max_column = max_column.max(store.get(handle).column);
    }
    (max_row, max_column)
}
