//! Cross-thread marshaling between callers and the session thread
//!
//! Two queues, one per direction, both `crossbeam-channel` FIFOs:
//! commands (register/unregister) flow in, callback invocations flow
//! out. User callbacks are never invoked on the session thread; every
//! invocation is wrapped into a [`QueuedCallback`] and executed only
//! when a caller drains the outbound queue. That separation is what
//! keeps consumer code from ever interleaving with reconciliation.

use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use filemon_core::{EntryFilter, Error, FileChangeEvent, FileTree};

use crate::registry::Handle;

/// A pending registration change, applied in enqueue order by the
/// session thread.
pub enum Command {
    Register {
        path: PathBuf,
        recursive: bool,
        filter: Option<EntryFilter>,
        callbacks: Arc<Callbacks>,
    },
    Unregister(Handle),
}

/// Consumer callback set for one registration. All fields are optional;
/// every invocation is delivered through
/// [`MonitorService::check_for_changes`](crate::MonitorService::check_for_changes),
/// never directly from the session thread.
#[derive(Default)]
pub struct Callbacks {
    pub on_registered: Option<Box<dyn Fn(Handle, &FileTree) + Send + Sync>>,
    pub on_registration_error: Option<Box<dyn Fn(&Error) + Send + Sync>>,
    pub on_monitoring_error: Option<Box<dyn Fn(&Error) + Send + Sync>>,
    pub on_files_changed: Option<Box<dyn Fn(&[FileChangeEvent]) + Send + Sync>>,
    pub on_unregistered: Option<Box<dyn Fn() + Send + Sync>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_registered(mut self, f: impl Fn(Handle, &FileTree) + Send + Sync + 'static) -> Self {
        self.on_registered = Some(Box::new(f));
        self
    }

    pub fn on_registration_error(mut self, f: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.on_registration_error = Some(Box::new(f));
        self
    }

    pub fn on_monitoring_error(mut self, f: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.on_monitoring_error = Some(Box::new(f));
        self
    }

    pub fn on_files_changed(
        mut self,
        f: impl Fn(&[FileChangeEvent]) + Send + Sync + 'static,
    ) -> Self {
        self.on_files_changed = Some(Box::new(f));
        self
    }

    pub fn on_unregistered(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_unregistered = Some(Box::new(f));
        self
    }
}

/// A deferred callback invocation, executed on whichever thread drains
/// the outbound queue.
pub type QueuedCallback = Box<dyn FnOnce() + Send>;

/// Sender side of the outbound queue. Cloneable; backends hold one and
/// enqueue typed invocations through it.
#[derive(Clone)]
pub struct CallbackQueue {
    tx: Sender<QueuedCallback>,
}

impl CallbackQueue {
    pub fn new() -> (Self, Receiver<QueuedCallback>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }

    pub fn enqueue_registered(&self, callbacks: &Arc<Callbacks>, handle: Handle, tree: &FileTree) {
        if callbacks.on_registered.is_some() {
            let callbacks = Arc::clone(callbacks);
            let tree = tree.clone();
            self.push(Box::new(move || {
                if let Some(cb) = &callbacks.on_registered {
                    cb(handle, &tree);
                }
            }));
        }
    }

    pub fn enqueue_registration_error(&self, callbacks: &Arc<Callbacks>, error: Error) {
        if callbacks.on_registration_error.is_some() {
            let callbacks = Arc::clone(callbacks);
            self.push(Box::new(move || {
                if let Some(cb) = &callbacks.on_registration_error {
                    cb(&error);
                }
            }));
        }
    }

    pub fn enqueue_monitoring_error(&self, callbacks: &Arc<Callbacks>, error: Error) {
        if callbacks.on_monitoring_error.is_some() {
            let callbacks = Arc::clone(callbacks);
            self.push(Box::new(move || {
                if let Some(cb) = &callbacks.on_monitoring_error {
                    cb(&error);
                }
            }));
        }
    }

    pub fn enqueue_files_changed(&self, callbacks: &Arc<Callbacks>, events: Vec<FileChangeEvent>) {
        if callbacks.on_files_changed.is_some() {
            let callbacks = Arc::clone(callbacks);
            self.push(Box::new(move || {
                if let Some(cb) = &callbacks.on_files_changed {
                    cb(&events);
                }
            }));
        }
    }

    pub fn enqueue_unregistered(&self, callbacks: &Arc<Callbacks>) {
        if callbacks.on_unregistered.is_some() {
            let callbacks = Arc::clone(callbacks);
            self.push(Box::new(move || {
                if let Some(cb) = &callbacks.on_unregistered {
                    cb();
                }
            }));
        }
    }

    fn push(&self, callback: QueuedCallback) {
        // The receiver disappears only during service teardown; late
        // callbacks are dropped deliberately.
        let _ = self.tx.send(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filemon_core::FileInfo;
    use parking_lot::Mutex;

    #[test]
    fn test_queued_callbacks_run_only_when_drained() {
        let (queue, rx) = CallbackQueue::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = Arc::clone(&seen);
        let callbacks = Arc::new(Callbacks::new().on_unregistered(move || {
            seen_clone.lock().push("unregistered");
        }));

        queue.enqueue_unregistered(&callbacks);
        assert!(seen.lock().is_empty());

        while let Ok(cb) = rx.try_recv() {
            cb();
        }
        assert_eq!(*seen.lock(), ["unregistered"]);
    }

    #[test]
    fn test_delivery_preserves_enqueue_order() {
        let (queue, rx) = CallbackQueue::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_events = Arc::clone(&seen);
        let seen_done = Arc::clone(&seen);
        let callbacks = Arc::new(
            Callbacks::new()
                .on_files_changed(move |events| {
                    seen_events.lock().push(format!("changed:{}", events.len()));
                })
                .on_unregistered(move || seen_done.lock().push("unregistered".into())),
        );

        let event = FileChangeEvent::added(FileInfo::directory("/w/d"));
        queue.enqueue_files_changed(&callbacks, vec![event.clone()]);
        queue.enqueue_files_changed(&callbacks, vec![event.clone(), event]);
        queue.enqueue_unregistered(&callbacks);

        while let Ok(cb) = rx.try_recv() {
            cb();
        }
        assert_eq!(*seen.lock(), ["changed:1", "changed:2", "unregistered"]);
    }

    #[test]
    fn test_unset_callbacks_enqueue_nothing() {
        let (queue, rx) = CallbackQueue::new();
        let callbacks = Arc::new(Callbacks::new());
        queue.enqueue_unregistered(&callbacks);
        queue.enqueue_files_changed(&callbacks, Vec::new());
        assert!(rx.try_recv().is_err());
    }
}
