//! Ordered snapshot diffing
//!
//! The diff is a single linear merge over two sequences that are both
//! sorted by [`FileInfo::path_cmp`]. Entries present only in `prev`
//! become `Removed`, only in `curr` become `Added`, present in both with
//! differing attributes become `Modified`. Correctness depends on the
//! inputs honoring the sort order; callers own that invariant.

use std::cmp::Ordering;

use crate::events::FileChangeEvent;
use crate::file_info::FileInfo;
use crate::filter::EntryFilter;

/// Diff two path-ordered snapshots into `events`.
///
/// When `filter` is supplied it gates emission per entry: a filtered-out
/// entry produces no event even if it changed. O(|prev| + |curr|).
pub fn collect_file_change_events(
    prev: &[FileInfo],
    curr: &[FileInfo],
    filter: Option<&EntryFilter>,
    events: &mut Vec<FileChangeEvent>,
) {
    debug_assert!(is_path_sorted(prev), "prev snapshot out of order");
    debug_assert!(is_path_sorted(curr), "curr snapshot out of order");

    let mut emit = |event: FileChangeEvent| {
        if filter.map_or(true, |f| f(&event.info)) {
            events.push(event);
        }
    };

    let mut p = prev.iter().peekable();
    let mut c = curr.iter().peekable();

    loop {
        match (p.peek(), c.peek()) {
            (Some(old), Some(new)) => match old.path_cmp(new) {
                Ordering::Less => {
                    emit(FileChangeEvent::removed((*old).clone()));
                    p.next();
                }
                Ordering::Greater => {
                    emit(FileChangeEvent::added((*new).clone()));
                    c.next();
                }
                Ordering::Equal => {
                    if old != new {
                        emit(FileChangeEvent::modified((*new).clone()));
                    }
                    p.next();
                    c.next();
                }
            },
            (Some(old), None) => {
                emit(FileChangeEvent::removed((*old).clone()));
                p.next();
            }
            (None, Some(new)) => {
                emit(FileChangeEvent::added((*new).clone()));
                c.next();
            }
            (None, None) => break,
        }
    }
}

fn is_path_sorted(infos: &[FileInfo]) -> bool {
    infos
        .windows(2)
        .all(|w| w[0].path_cmp(&w[1]) == Ordering::Less)
}
