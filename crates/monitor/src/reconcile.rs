//! Recursive tree reconciliation
//!
//! Raw backend notifications are approximate: duplicated, reordered,
//! coalesced, or missing entirely. Reconciliation is the corrective
//! step: rescan the affected directory from disk, diff it against the
//! snapshot tree, mutate the tree, and emit only the events that
//! describe a real divergence. All tree mutation for a registration
//! happens here, on the session thread.

use tracing::warn;

use filemon_core::{
    collect_file_change_events, scan_files, EntryFilter, FileChangeEvent, FileInfo, FileTree,
    NodeId, Result,
};

/// Rescan `target` and reconcile the snapshot tree against it, emitting
/// the corrected event batch through `on_changed` (at most one call, and
/// only when the batch is non-empty).
///
/// `full_rescan` compares and atomically replaces the entire subtree;
/// otherwise only the immediate children level is diffed and each
/// divergence is applied individually. `recursive` is the registration's
/// mode: it governs whether added directories are expanded into
/// per-descendant events and whether removed directories contract the
/// same way, independent of the per-call scan depth.
///
/// A `target` absent from the tree (excluded by the filter, or a stale
/// notification for an already-removed path) succeeds with no effect.
pub fn discover_and_process_file_changes(
    target: &FileInfo,
    full_rescan: bool,
    recursive: bool,
    filter: Option<&EntryFilter>,
    tree: &mut FileTree,
    on_changed: &mut dyn FnMut(Vec<FileChangeEvent>),
) -> Result<()> {
    let Some(node) = tree.find(target.path()) else {
        return Ok(());
    };

    let scan_recursive = full_rescan && recursive;
    let candidate = scan_files(target, scan_recursive, filter)?;

    let mut events = Vec::new();
    if full_rescan {
        let previous = tree.flatten(node);
        let current = candidate.flatten_tree();
        collect_file_change_events(&previous, &current, None, &mut events);
        tree.replace_subtree(node, &candidate);
    } else {
        let previous: Vec<FileInfo> = tree
            .children(node)
            .iter()
            .map(|&child| tree.info(child).clone())
            .collect();
        let current: Vec<FileInfo> = candidate
            .children(candidate.root())
            .iter()
            .map(|&child| candidate.info(child).clone())
            .collect();

        let mut child_events = Vec::new();
        collect_file_change_events(&previous, &current, None, &mut child_events);

        for child_event in child_events {
            use filemon_core::ChangeKind::*;
            match child_event.kind {
                Added => {
                    if let Err(e) =
                        process_file_added(tree, node, &child_event.info, recursive, filter, &mut events)
                    {
                        // One unreadable new entry must not abort the batch.
                        warn!(
                            "failed to expand added entry {}: {}",
                            child_event.info.path().display(),
                            e
                        );
                    }
                }
                Modified => process_file_modified(tree, node, &child_event.info, &mut events),
                Removed => {
                    process_file_removed(tree, node, &child_event.info, recursive, &mut events)
                }
            }
        }
    }

    if !events.is_empty() {
        on_changed(events);
    }
    Ok(())
}

/// Apply an Added divergence under `parent`.
///
/// Duplicate notifications (the entry already exists in the tree) are
/// ignored. A new directory under a recursive registration is scanned
/// whole and produces one Added event per descendant, so consumers
/// always observe fully populated subtrees.
pub fn process_file_added(
    tree: &mut FileTree,
    parent: NodeId,
    info: &FileInfo,
    recursive: bool,
    filter: Option<&EntryFilter>,
    events: &mut Vec<FileChangeEvent>,
) -> Result<()> {
    if tree.find_child(parent, info.path()).is_some() {
        return Ok(());
    }

    if info.is_directory() && recursive {
        let subtree = scan_files(info, true, filter)?;
        let id = tree.graft(parent, &subtree);
        events.extend(tree.flatten(id).into_iter().map(FileChangeEvent::added));
    } else {
        tree.insert_child(parent, info.clone());
        events.push(FileChangeEvent::added(info.clone()));
    }
    Ok(())
}

/// Apply a Modified divergence under `parent`.
///
/// Ignored unless the entry exists and its attributes actually differ
/// from the stored record; some backends emit redundant modify
/// notifications on save and copy operations.
pub fn process_file_modified(
    tree: &mut FileTree,
    parent: NodeId,
    info: &FileInfo,
    events: &mut Vec<FileChangeEvent>,
) {
    if let Some(id) = tree.find_child(parent, info.path()) {
        if tree.info(id) != info {
            tree.set_info(id, info.clone());
            events.push(FileChangeEvent::modified(info.clone()));
        }
    }
}

/// Apply a Removed divergence under `parent`.
///
/// Ignored when the entry is absent. A directory removed under a
/// recursive registration emits one Removed event per stored descendant
/// before its subtree is erased.
pub fn process_file_removed(
    tree: &mut FileTree,
    parent: NodeId,
    info: &FileInfo,
    recursive: bool,
    events: &mut Vec<FileChangeEvent>,
) {
    let Some(id) = tree.find_child(parent, info.path()) else {
        return;
    };

    if tree.info(id).is_directory() && recursive {
        events.extend(tree.flatten(id).into_iter().map(FileChangeEvent::removed));
    } else {
        events.push(FileChangeEvent::removed(info.clone()));
    }
    tree.remove(id);
}
