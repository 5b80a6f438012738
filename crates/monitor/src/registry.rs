//! Per-registration state shared by every backend
//!
//! A backend owns one [`Registry`]: the set of active registrations,
//! each with its exclusively-owned snapshot tree. The registry performs
//! the initial scan, routes reconciliation, and is the single place
//! where lifecycle callbacks are enqueued, which is what makes
//! unregistration idempotent (a handle can be torn down at most once).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use filemon_core::{scan_files, EntryFilter, Error, FileInfo, FileTree};

use crate::queue::{CallbackQueue, Callbacks};
use crate::reconcile::discover_and_process_file_changes;

/// Opaque, comparable identifier of one active registration. Unique for
/// the lifetime of the service that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u64);

/// One active monitoring registration. Immutable after creation except
/// for its snapshot tree, which only reconciliation mutates.
pub struct Registration {
    pub root: FileInfo,
    pub recursive: bool,
    pub filter: Option<EntryFilter>,
    pub callbacks: Arc<Callbacks>,
    pub tree: FileTree,
}

/// Active registrations keyed by handle.
pub struct Registry {
    active: HashMap<Handle, Registration>,
    next_handle: u64,
    queue: CallbackQueue,
}

impl Registry {
    pub fn new(queue: CallbackQueue) -> Self {
        Self {
            active: HashMap::new(),
            next_handle: 1,
            queue,
        }
    }

    pub fn queue(&self) -> &CallbackQueue {
        &self.queue
    }

    /// Validate `path`, seed the snapshot tree with an initial scan, and
    /// activate the registration. The outcome reaches the caller through
    /// `on_registered` or `on_registration_error`; the returned handle
    /// lets the backend correlate native watch state.
    pub fn register(
        &mut self,
        path: &Path,
        recursive: bool,
        filter: Option<EntryFilter>,
        callbacks: Arc<Callbacks>,
    ) -> Option<Handle> {
        let outcome = Self::seed(path, recursive, filter.as_ref());
        match outcome {
            Ok((root, tree)) => {
                let handle = Handle(self.next_handle);
                self.next_handle += 1;
                info!(
                    "registered monitor {:?} on {} ({} entries)",
                    handle,
                    path.display(),
                    tree.len()
                );
                self.queue.enqueue_registered(&callbacks, handle, &tree);
                self.active.insert(
                    handle,
                    Registration {
                        root,
                        recursive,
                        filter,
                        callbacks,
                        tree,
                    },
                );
                Some(handle)
            }
            Err(e) => {
                warn!("registration on {} failed: {}", path.display(), e);
                self.queue.enqueue_registration_error(&callbacks, e);
                None
            }
        }
    }

    fn seed(
        path: &Path,
        recursive: bool,
        filter: Option<&EntryFilter>,
    ) -> filemon_core::Result<(FileInfo, FileTree)> {
        if !path.is_dir() {
            return Err(Error::NotADirectory(path.to_path_buf()));
        }
        let root = FileInfo::for_path(path)?;
        let tree = scan_files(&root, recursive, filter)?;
        Ok((root, tree))
    }

    /// Deactivate `handle` and deliver `on_unregistered`. A handle that
    /// is not active (already unregistered, or torn down after a
    /// monitoring error) is silently ignored, so the callback fires at
    /// most once per registration.
    pub fn unregister(&mut self, handle: Handle) -> bool {
        match self.active.remove(&handle) {
            Some(registration) => {
                info!("unregistered monitor {:?}", handle);
                self.queue.enqueue_unregistered(&registration.callbacks);
                true
            }
            None => {
                debug!("ignoring unregister of inactive handle {:?}", handle);
                false
            }
        }
    }

    /// Tear down every active registration (shutdown path).
    pub fn unregister_all(&mut self) {
        let handles: Vec<Handle> = self.active.keys().copied().collect();
        for handle in handles {
            self.unregister(handle);
        }
    }

    /// Deactivate `handle` after a backend error: the consumer sees
    /// `on_monitoring_error` followed by `on_unregistered`.
    pub fn fail(&mut self, handle: Handle, error: Error) {
        if let Some(registration) = self.active.remove(&handle) {
            warn!("monitor {:?} failed: {}", handle, error);
            self.queue
                .enqueue_monitoring_error(&registration.callbacks, error);
            self.queue.enqueue_unregistered(&registration.callbacks);
        }
    }

    /// Reconcile one registration against the filesystem at `target`
    /// (a directory inside its subtree). Failures are logged and the
    /// registration continues best-effort.
    pub fn reconcile(&mut self, handle: Handle, target: &Path, full_rescan: bool) {
        let Registry { active, queue, .. } = self;
        let Some(registration) = active.get_mut(&handle) else {
            return;
        };

        let target_info = FileInfo::directory(target);
        let callbacks = &registration.callbacks;
        let result = discover_and_process_file_changes(
            &target_info,
            full_rescan,
            registration.recursive,
            registration.filter.as_ref(),
            &mut registration.tree,
            &mut |events| queue.enqueue_files_changed(callbacks, events),
        );
        if let Err(e) = result {
            warn!(
                "reconciliation of {} for {:?} failed: {}",
                target.display(),
                handle,
                e
            );
        }
    }

    pub fn get(&self, handle: Handle) -> Option<&Registration> {
        self.active.get(&handle)
    }

    pub fn handles(&self) -> Vec<Handle> {
        self.active.keys().copied().collect()
    }

    pub fn root_path(&self, handle: Handle) -> Option<PathBuf> {
        self.active
            .get(&handle)
            .map(|r| r.root.path().to_path_buf())
    }

    /// Every registration whose root contains `path`. Registrations may
    /// nest or share roots, and each one maintains its own snapshot
    /// tree, so a notification must reach all of them.
    pub fn find_owners(&self, path: &Path) -> Vec<Handle> {
        let mut owners: Vec<Handle> = self
            .active
            .iter()
            .filter(|(_, r)| path.starts_with(r.root.path()))
            .map(|(&handle, _)| handle)
            .collect();
        owners.sort();
        owners
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueuedCallback;
    use anyhow::Result;
    use crossbeam_channel::Receiver;
    use parking_lot::Mutex;
    use std::fs;
    use tempfile::TempDir;

    fn drain(rx: &Receiver<QueuedCallback>) {
        while let Ok(cb) = rx.try_recv() {
            cb();
        }
    }

    fn recording_callbacks(log: &Arc<Mutex<Vec<String>>>) -> Arc<Callbacks> {
        let on_reg = Arc::clone(log);
        let on_reg_err = Arc::clone(log);
        let on_mon_err = Arc::clone(log);
        let on_changed = Arc::clone(log);
        let on_unreg = Arc::clone(log);
        Arc::new(
            Callbacks::new()
                .on_registered(move |_, tree| {
                    on_reg.lock().push(format!("registered:{}", tree.len()));
                })
                .on_registration_error(move |e| {
                    on_reg_err.lock().push(format!("registration_error:{}", e));
                })
                .on_monitoring_error(move |e| {
                    on_mon_err.lock().push(format!("monitoring_error:{}", e));
                })
                .on_files_changed(move |events| {
                    on_changed.lock().push(format!("changed:{}", events.len()));
                })
                .on_unregistered(move || on_unreg.lock().push("unregistered".into())),
        )
    }

    #[test]
    fn test_register_seeds_tree_and_reports_handle() -> Result<()> {
        let temp_dir = TempDir::new()?;
        fs::write(temp_dir.path().join("a.txt"), b"a")?;

        let (queue, rx) = CallbackQueue::new();
        let mut registry = Registry::new(queue);
        let log = Arc::new(Mutex::new(Vec::new()));

        let handle = registry
            .register(temp_dir.path(), true, None, recording_callbacks(&log))
            .unwrap();
        drain(&rx);

        assert_eq!(*log.lock(), ["registered:2"]); // root + a.txt
        assert!(registry.get(handle).is_some());
        Ok(())
    }

    #[test]
    fn test_register_non_directory_reports_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let file = temp_dir.path().join("plain.txt");
        fs::write(&file, b"x")?;

        let (queue, rx) = CallbackQueue::new();
        let mut registry = Registry::new(queue);
        let log = Arc::new(Mutex::new(Vec::new()));

        assert!(registry
            .register(&file, true, None, recording_callbacks(&log))
            .is_none());
        drain(&rx);

        let entries = log.lock();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].starts_with("registration_error:not a directory"));
        Ok(())
    }

    #[test]
    fn test_double_unregister_delivers_once() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let (queue, rx) = CallbackQueue::new();
        let mut registry = Registry::new(queue);
        let log = Arc::new(Mutex::new(Vec::new()));

        let handle = registry
            .register(temp_dir.path(), true, None, recording_callbacks(&log))
            .unwrap();
        assert!(registry.unregister(handle));
        assert!(!registry.unregister(handle));
        drain(&rx);

        let unregistered = log.lock().iter().filter(|e| *e == "unregistered").count();
        assert_eq!(unregistered, 1);
        Ok(())
    }

    #[test]
    fn test_fail_emits_error_then_unregistered_once() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let (queue, rx) = CallbackQueue::new();
        let mut registry = Registry::new(queue);
        let log = Arc::new(Mutex::new(Vec::new()));

        let handle = registry
            .register(temp_dir.path(), true, None, recording_callbacks(&log))
            .unwrap();
        registry.fail(handle, Error::Monitoring("watch lost".into()));
        // Cleanup after the error must not re-deliver.
        assert!(!registry.unregister(handle));
        drain(&rx);

        assert_eq!(
            *log.lock(),
            [
                "registered:1",
                "monitoring_error:monitoring failed: watch lost",
                "unregistered"
            ]
        );
        Ok(())
    }

    #[test]
    fn test_reconcile_routes_events_to_registration() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let (queue, rx) = CallbackQueue::new();
        let mut registry = Registry::new(queue);
        let log = Arc::new(Mutex::new(Vec::new()));

        let handle = registry
            .register(temp_dir.path(), true, None, recording_callbacks(&log))
            .unwrap();

        fs::write(temp_dir.path().join("new.txt"), b"n")?;
        registry.reconcile(handle, temp_dir.path(), false);
        drain(&rx);

        assert_eq!(*log.lock(), ["registered:1", "changed:1"]);
        Ok(())
    }

    #[test]
    fn test_handles_are_unique_across_registrations() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let (queue, _rx) = CallbackQueue::new();
        let mut registry = Registry::new(queue);

        let a = registry
            .register(temp_dir.path(), true, None, Arc::new(Callbacks::new()))
            .unwrap();
        let b = registry
            .register(temp_dir.path(), true, None, Arc::new(Callbacks::new()))
            .unwrap();
        registry.unregister(a);
        let c = registry
            .register(temp_dir.path(), true, None, Arc::new(Callbacks::new()))
            .unwrap();

        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
        Ok(())
    }

    #[test]
    fn test_find_owners_returns_every_containing_registration() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let nested = temp_dir.path().join("nested");
        fs::create_dir(&nested)?;

        let (queue, _rx) = CallbackQueue::new();
        let mut registry = Registry::new(queue);
        let outer = registry
            .register(temp_dir.path(), true, None, Arc::new(Callbacks::new()))
            .unwrap();
        let inner = registry
            .register(&nested, true, None, Arc::new(Callbacks::new()))
            .unwrap();

        // A path under the nested root belongs to both registrations.
        assert_eq!(registry.find_owners(&nested.join("file")), [outer, inner]);
        assert_eq!(
            registry.find_owners(&temp_dir.path().join("other")),
            [outer]
        );
        assert!(registry.find_owners(Path::new("/outside")).is_empty());
        Ok(())
    }
}
