//! Flat polling monitor for a single directory
//!
//! Non-recursive and fully synchronous: the caller invokes
//! [`DirectoryMonitor::check_for_events`] on whatever interval it likes,
//! and each check re-lists the directory's immediate children and diffs
//! the sorted listing against the previous one. Robust on platforms
//! without native change notifications.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use filemon_core::{
    collect_file_change_events, EntryFilter, Error, FileChangeEvent, FileInfo, Result,
};

/// Sorted listing of a directory's immediate children. Entries that fail
/// to stat are logged and skipped.
fn file_listing(dir: &Path) -> Result<Vec<FileInfo>> {
    let mut listing = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        match entry.metadata() {
            Ok(metadata) => listing.push(FileInfo::from_metadata(&entry.path(), &metadata)),
            Err(e) => warn!(
                "skipping entry with unreadable metadata: {}: {}",
                entry.path().display(),
                e
            ),
        }
    }
    listing.sort_by(FileInfo::path_cmp);
    Ok(listing)
}

struct ActiveState {
    directory: PathBuf,
    previous_listing: Vec<FileInfo>,
    filter: Option<EntryFilter>,
}

/// Polling monitor over one directory's immediate children.
///
/// Idle until [`start`](Self::start) succeeds; returns to idle on
/// [`stop`](Self::stop) or when the watched directory disappears.
#[derive(Default)]
pub struct DirectoryMonitor {
    state: Option<ActiveState>,
}

impl DirectoryMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin monitoring `path`, replacing any prior session on this
    /// instance. Fails with [`Error::NotADirectory`] when `path` is not a
    /// directory and leaves the monitor idle on any listing failure.
    pub fn start(&mut self, path: &Path, filter: Option<EntryFilter>) -> Result<()> {
        self.stop();

        if !path.is_dir() {
            return Err(Error::NotADirectory(path.to_path_buf()));
        }

        let previous_listing = file_listing(path)?;
        debug!(
            "directory monitor started on {} ({} entries)",
            path.display(),
            previous_listing.len()
        );
        self.state = Some(ActiveState {
            directory: path.to_path_buf(),
            previous_listing,
            filter,
        });
        Ok(())
    }

    /// Diff the directory against the stored snapshot and return the
    /// resulting events, replacing the snapshot.
    ///
    /// Returns empty when idle. If the watched directory no longer
    /// exists the monitor stops implicitly and returns empty without an
    /// error; a transient listing failure is returned and leaves the
    /// previous snapshot in place.
    pub fn check_for_events(&mut self) -> Result<Vec<FileChangeEvent>> {
        let Some(mut state) = self.state.take() else {
            return Ok(Vec::new());
        };

        if !state.directory.exists() {
            debug!(
                "watched directory {} is gone, stopping",
                state.directory.display()
            );
            return Ok(Vec::new());
        }

        let current_listing = match file_listing(&state.directory) {
            Ok(listing) => listing,
            Err(e) => {
                self.state = Some(state);
                return Err(e);
            }
        };

        let mut events = Vec::new();
        collect_file_change_events(
            &state.previous_listing,
            &current_listing,
            state.filter.as_ref(),
            &mut events,
        );

        state.previous_listing = current_listing;
        self.state = Some(state);
        Ok(events)
    }

    /// Clear all session state. Idempotent.
    pub fn stop(&mut self) {
        self.state = None;
    }

    /// The watched directory, or `None` when idle.
    pub fn path(&self) -> Option<&Path> {
        self.state.as_ref().map(|s| s.directory.as_path())
    }
}
