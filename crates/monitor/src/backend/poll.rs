//! Scheduled full-rescan backend
//!
//! For platforms without reliable native notifications, and for tests
//! that need deterministic behavior: every registration is fully
//! reconciled against the filesystem on a fixed interval. No native
//! state exists, so registration can never fail beyond validation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use filemon_core::EntryFilter;

use crate::backend::MonitorBackend;
use crate::queue::{CallbackQueue, Callbacks};
use crate::registry::{Handle, Registry};

/// Backend that detects changes purely by periodic rescans.
pub struct PollBackend {
    registry: Registry,
    interval: Duration,
    next_scan: HashMap<Handle, Instant>,
}

impl PollBackend {
    pub fn new(queue: CallbackQueue, interval: Duration) -> Self {
        Self {
            registry: Registry::new(queue),
            interval,
            next_scan: HashMap::new(),
        }
    }
}

impl MonitorBackend for PollBackend {
    fn register(
        &mut self,
        path: &Path,
        recursive: bool,
        filter: Option<EntryFilter>,
        callbacks: Arc<Callbacks>,
    ) {
        if let Some(handle) = self.registry.register(path, recursive, filter, callbacks) {
            self.next_scan.insert(handle, Instant::now() + self.interval);
        }
    }

    fn unregister(&mut self, handle: Handle) {
        self.next_scan.remove(&handle);
        self.registry.unregister(handle);
    }

    fn poll_events(&mut self) {
        let now = Instant::now();
        let due: Vec<Handle> = self
            .next_scan
            .iter()
            .filter(|(_, &deadline)| deadline <= now)
            .map(|(&handle, _)| handle)
            .collect();

        for handle in due {
            if let Some(root) = self.registry.root_path(handle) {
                self.registry.reconcile(handle, &root, true);
                self.next_scan.insert(handle, now + self.interval);
            } else {
                self.next_scan.remove(&handle);
            }
        }
    }

    fn unregister_all(&mut self) {
        self.next_scan.clear();
        self.registry.unregister_all();
    }

    fn stop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueuedCallback;
    use anyhow::Result;
    use crossbeam_channel::Receiver;
    use filemon_core::{ChangeKind, FileChangeEvent};
    use parking_lot::Mutex;
    use std::fs;
    use tempfile::TempDir;

    fn drain(rx: &Receiver<QueuedCallback>) {
        while let Ok(cb) = rx.try_recv() {
            cb();
        }
    }

    #[test]
    fn test_scan_fires_only_after_interval() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let (queue, rx) = CallbackQueue::new();
        let mut backend = PollBackend::new(queue, Duration::from_millis(10));

        let events = Arc::new(Mutex::new(Vec::<FileChangeEvent>::new()));
        let sink = Arc::clone(&events);
        backend.register(
            temp_dir.path(),
            true,
            None,
            Arc::new(Callbacks::new().on_files_changed(move |batch| {
                sink.lock().extend(batch.iter().cloned());
            })),
        );
        drain(&rx);

        fs::write(temp_dir.path().join("new.txt"), b"n")?;

        // Immediately after registration the deadline has not passed.
        backend.poll_events();
        drain(&rx);
        assert!(events.lock().is_empty());

        std::thread::sleep(Duration::from_millis(20));
        backend.poll_events();
        drain(&rx);

        let collected = events.lock();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].kind, ChangeKind::Added);
        assert_eq!(collected[0].info.path(), temp_dir.path().join("new.txt"));
        Ok(())
    }

    #[test]
    fn test_unregister_stops_scanning() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let (queue, rx) = CallbackQueue::new();
        let mut backend = PollBackend::new(queue, Duration::from_millis(1));

        let handle = Arc::new(Mutex::new(None));
        let handle_sink = Arc::clone(&handle);
        let events = Arc::new(Mutex::new(Vec::<FileChangeEvent>::new()));
        let sink = Arc::clone(&events);
        backend.register(
            temp_dir.path(),
            true,
            None,
            Arc::new(
                Callbacks::new()
                    .on_registered(move |h, _| *handle_sink.lock() = Some(h))
                    .on_files_changed(move |batch| sink.lock().extend(batch.iter().cloned())),
            ),
        );
        drain(&rx);
        let handle = handle.lock().take().unwrap();

        backend.unregister(handle);
        fs::write(temp_dir.path().join("late.txt"), b"l")?;
        std::thread::sleep(Duration::from_millis(5));
        backend.poll_events();
        drain(&rx);

        assert!(events.lock().is_empty());
        Ok(())
    }
}
