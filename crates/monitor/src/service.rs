//! Process-wide monitoring service
//!
//! One [`MonitorService`] owns the single background session thread on
//! which all backend interaction and tree reconciliation happen. Public
//! entry points only enqueue: registration commands flow in through the
//! command queue, results flow back through the outbound callback queue,
//! and [`check_for_changes`](MonitorService::check_for_changes) is the
//! only place consumer callbacks ever execute.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{error, info, warn};

use filemon_core::{EntryFilter, Error, Result};

use crate::backend::{MonitorBackend, NativeBackend, PollBackend};
use crate::queue::{CallbackQueue, Callbacks, Command, QueuedCallback};
use crate::registry::Handle;

/// How long the session loop waits on the command queue each iteration.
/// Doubles as the loop's pacing interval and its interruption point.
const COMMAND_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long `stop` waits for the session thread before abandoning it.
const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(3);

/// Handle to the monitoring engine. Construct once, share by reference;
/// dropping it stops the session thread.
pub struct MonitorService {
    commands: Sender<Command>,
    pending: Receiver<QueuedCallback>,
    finished: Receiver<()>,
    thread: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl MonitorService {
    /// Start the session thread with the backend produced by
    /// `make_backend` (constructed on the session thread itself, so
    /// backends need not be `Send` once running).
    pub fn start<B, F>(make_backend: F) -> Result<Self>
    where
        B: MonitorBackend,
        F: FnOnce(CallbackQueue) -> B + Send + 'static,
    {
        let (commands, commands_rx) = unbounded();
        let (queue, pending) = CallbackQueue::new();
        let (finished_tx, finished) = unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));

        let thread_shutdown = Arc::clone(&shutdown);
        let thread = std::thread::Builder::new()
            .name("file-monitor".into())
            .spawn(move || {
                let backend = make_backend(queue);
                session_thread_main(backend, commands_rx, thread_shutdown);
                let _ = finished_tx.send(());
            })
            .map_err(|e| Error::Monitoring(format!("failed to spawn session thread: {e}")))?;

        Ok(Self {
            commands,
            pending,
            finished,
            thread: Some(thread),
            shutdown,
        })
    }

    /// Start with the native notification backend.
    pub fn with_native_backend() -> Result<Self> {
        Self::start(NativeBackend::new)
    }

    /// Start with the scheduled-rescan backend.
    pub fn with_poll_backend(interval: Duration) -> Result<Self> {
        Self::start(move |queue| PollBackend::new(queue, interval))
    }

    /// Request monitoring of `path`. Returns immediately; the outcome
    /// arrives later through `on_registered` or `on_registration_error`
    /// when [`check_for_changes`](Self::check_for_changes) is drained.
    pub fn register_monitor(
        &self,
        path: &Path,
        recursive: bool,
        filter: Option<EntryFilter>,
        callbacks: Callbacks,
    ) {
        let command = Command::Register {
            path: path.to_path_buf(),
            recursive,
            filter,
            callbacks: Arc::new(callbacks),
        };
        if self.commands.send(command).is_err() {
            warn!("register ignored: monitoring service is stopped");
        }
    }

    /// Request teardown of one registration. Unknown or already-inactive
    /// handles are silently ignored when the command is processed.
    pub fn unregister_monitor(&self, handle: Handle) {
        if self.commands.send(Command::Unregister(handle)).is_err() {
            warn!("unregister ignored: monitoring service is stopped");
        }
    }

    /// Drain and invoke every pending consumer callback, in enqueue
    /// order, on the calling thread.
    pub fn check_for_changes(&self) {
        while let Ok(callback) = self.pending.try_recv() {
            callback();
        }
    }

    /// Stop the session thread: signal shutdown, let it unregister all
    /// handles and stop the backend, then join with a bounded timeout.
    /// On overrun the thread is abandoned with a warning rather than
    /// blocking the process. Idempotent.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.shutdown.store(true, Ordering::Relaxed);

        match self.finished.recv_timeout(SHUTDOWN_JOIN_TIMEOUT) {
            Ok(()) => {
                if thread.join().is_err() {
                    error!("session thread panicked during shutdown");
                }
                info!("monitoring service stopped");
            }
            Err(_) => {
                // Abandon rather than hang; the thread keeps no shared
                // mutable state beyond the queues.
                warn!("session thread did not stop within {:?}, abandoning it", SHUTDOWN_JOIN_TIMEOUT);
            }
        }
    }
}

impl Drop for MonitorService {
    fn drop(&mut self) {
        self.stop();
    }
}

fn session_thread_main<B: MonitorBackend>(
    mut backend: B,
    commands: Receiver<Command>,
    shutdown: Arc<AtomicBool>,
) {
    let run = catch_unwind(AssertUnwindSafe(|| {
        while !shutdown.load(Ordering::Relaxed) {
            backend.poll_events();
            check_for_input(&mut backend, &commands);
        }
    }));
    if run.is_err() {
        error!("session loop terminated unexpectedly, cleaning up");
    }

    // Always clean up, even after a panic: no native watch may outlive
    // the session thread.
    let cleanup = catch_unwind(AssertUnwindSafe(|| {
        backend.unregister_all();
        backend.stop();
    }));
    if cleanup.is_err() {
        error!("backend cleanup failed during shutdown");
    }
}

/// Drain pending registration commands, waiting up to
/// [`COMMAND_POLL_INTERVAL`] for the first one so the loop neither spins
/// nor sleeps past a shutdown signal.
fn check_for_input<B: MonitorBackend>(backend: &mut B, commands: &Receiver<Command>) {
    match commands.recv_timeout(COMMAND_POLL_INTERVAL) {
        Ok(command) => {
            apply_command(backend, command);
            while let Ok(command) = commands.try_recv() {
                apply_command(backend, command);
            }
        }
        Err(RecvTimeoutError::Timeout) => {}
        Err(RecvTimeoutError::Disconnected) => {
            // Service handle is gone; the shutdown flag will end the loop.
            std::thread::sleep(COMMAND_POLL_INTERVAL);
        }
    }
}

fn apply_command<B: MonitorBackend>(backend: &mut B, command: Command) {
    match command {
        Command::Register {
            path,
            recursive,
            filter,
            callbacks,
        } => backend.register(&path, recursive, filter, callbacks),
        Command::Unregister(handle) => backend.unregister(handle),
    }
}
