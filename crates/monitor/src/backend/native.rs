//! Native notification backend on top of the `notify` crate
//!
//! Raw notifications arrive on notify's own watcher thread and are
//! bridged through a crossbeam channel onto the session thread, where
//! `poll_events` drains them. Notifications are approximate by design:
//! they are deduplicated to their containing directories and handed to
//! the reconciler, which derives the corrected events from a fresh scan
//! rather than trusting the notification contents.
//!
//! Registrations may share or nest roots, so native watches are
//! refcounted per path: a watch is established on first use and torn
//! down only when the last registration using it goes away. Each
//! notification is routed to every registration whose root contains the
//! notified path.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use filemon_core::{EntryFilter, Error};

use crate::backend::MonitorBackend;
use crate::queue::{CallbackQueue, Callbacks};
use crate::registry::{Handle, Registry};

struct WatchEntry {
    count: usize,
    recursive: bool,
}

/// Backend driven by operating-system change notifications.
pub struct NativeBackend {
    registry: Registry,
    watcher: Option<RecommendedWatcher>,
    raw_events: Receiver<notify::Result<notify::Event>>,
    watches: HashMap<PathBuf, WatchEntry>,
}

impl NativeBackend {
    /// Create the backend. If the platform watcher cannot be created at
    /// all, the backend stays alive but every registration fails with a
    /// registration error.
    pub fn new(queue: CallbackQueue) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        let watcher = match notify::recommended_watcher(move |result| {
            let _ = tx.send(result);
        }) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!("native watcher unavailable: {}", e);
                None
            }
        };
        Self {
            registry: Registry::new(queue),
            watcher,
            raw_events: rx,
            watches: HashMap::new(),
        }
    }

    /// The directory to reconcile for a notification about `path`:
    /// the registration root itself, or the notified entry's parent
    /// clamped to the root.
    fn reconcile_target(root: &Path, path: &Path) -> PathBuf {
        if path == root {
            return root.to_path_buf();
        }
        match path.parent() {
            Some(parent) if parent.starts_with(root) => parent.to_path_buf(),
            _ => root.to_path_buf(),
        }
    }

    /// Take a refcounted share of the native watch on `path`, creating
    /// it on first use. An existing non-recursive watch is upgraded in
    /// place when a recursive registration joins it.
    fn acquire_watch(&mut self, path: &Path, recursive: bool) -> notify::Result<()> {
        let NativeBackend {
            watcher, watches, ..
        } = self;
        let Some(watcher) = watcher.as_mut() else {
            return Ok(());
        };
        match watches.get_mut(path) {
            Some(entry) => {
                if recursive && !entry.recursive {
                    watcher.unwatch(path)?;
                    watcher.watch(path, RecursiveMode::Recursive)?;
                    entry.recursive = true;
                }
                entry.count += 1;
                Ok(())
            }
            None => {
                let mode = if recursive {
                    RecursiveMode::Recursive
                } else {
                    RecursiveMode::NonRecursive
                };
                watcher.watch(path, mode)?;
                watches.insert(
                    path.to_path_buf(),
                    WatchEntry {
                        count: 1,
                        recursive,
                    },
                );
                Ok(())
            }
        }
    }

    /// Drop one share of the native watch on `path`, unwatching only
    /// when no registration uses it any longer.
    fn release_watch(&mut self, path: &Path) {
        let Some(entry) = self.watches.get_mut(path) else {
            return;
        };
        entry.count -= 1;
        if entry.count == 0 {
            self.watches.remove(path);
            if let Some(watcher) = self.watcher.as_mut() {
                if let Err(e) = watcher.unwatch(path) {
                    debug!("unwatch of {} failed: {}", path.display(), e);
                }
            }
        }
    }

    /// Classify one raw notification into pending reconciliation work.
    /// Watch errors that name paths tear down every owning registration
    /// and release each one's watch share.
    fn route_notification(
        &mut self,
        result: notify::Result<notify::Event>,
        rescans: &mut BTreeSet<Handle>,
        targets: &mut BTreeSet<(Handle, PathBuf)>,
    ) {
        match result {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                if event.need_rescan() {
                    debug!("notification overflow, rescanning all registrations");
                    rescans.extend(self.registry.handles());
                    return;
                }
                for path in &event.paths {
                    for handle in self.registry.find_owners(path) {
                        let Some(root) = self.registry.root_path(handle) else {
                            continue;
                        };
                        targets.insert((handle, Self::reconcile_target(&root, path)));
                    }
                }
            }
            Err(e) => {
                if e.paths.is_empty() {
                    warn!("native watch error: {}", e);
                    return;
                }
                let mut failed = BTreeSet::new();
                for path in &e.paths {
                    failed.extend(self.registry.find_owners(path));
                }
                for handle in failed {
                    let Some(root) = self.registry.root_path(handle) else {
                        continue;
                    };
                    self.registry.fail(handle, Error::Monitoring(e.to_string()));
                    self.release_watch(&root);
                }
            }
        }
    }
}

impl MonitorBackend for NativeBackend {
    fn register(
        &mut self,
        path: &Path,
        recursive: bool,
        filter: Option<EntryFilter>,
        callbacks: Arc<Callbacks>,
    ) {
        if self.watcher.is_none() {
            self.registry.queue().enqueue_registration_error(
                &callbacks,
                Error::Registration("native watcher unavailable".into()),
            );
            return;
        }
        if !path.is_dir() {
            self.registry
                .queue()
                .enqueue_registration_error(&callbacks, Error::NotADirectory(path.to_path_buf()));
            return;
        }

        // Native watch goes up before the initial scan so no change can
        // slip between the two.
        if let Err(e) = self.acquire_watch(path, recursive) {
            self.registry
                .queue()
                .enqueue_registration_error(&callbacks, Error::Registration(e.to_string()));
            return;
        }

        if self.registry.register(path, recursive, filter, callbacks).is_none() {
            // Initial scan failed; the error is already queued.
            self.release_watch(path);
        }
    }

    fn unregister(&mut self, handle: Handle) {
        let Some(root) = self.registry.root_path(handle) else {
            return;
        };
        if self.registry.unregister(handle) {
            self.release_watch(&root);
        }
    }

    fn poll_events(&mut self) {
        let mut rescans: BTreeSet<Handle> = BTreeSet::new();
        let mut targets: BTreeSet<(Handle, PathBuf)> = BTreeSet::new();

        while let Ok(result) = self.raw_events.try_recv() {
            self.route_notification(result, &mut rescans, &mut targets);
        }

        // Full rescans supersede targeted reconciliation for the same
        // registration.
        for handle in &rescans {
            if let Some(root) = self.registry.root_path(*handle) {
                self.registry.reconcile(*handle, &root, true);
            }
        }
        for (handle, target) in targets {
            if !rescans.contains(&handle) {
                self.registry.reconcile(handle, &target, false);
            }
        }
    }

    fn unregister_all(&mut self) {
        for handle in self.registry.handles() {
            self.unregister(handle);
        }
    }

    fn stop(&mut self) {
        // Dropping the watcher tears down all remaining native state.
        self.watches.clear();
        self.watcher = None;
    }
}
