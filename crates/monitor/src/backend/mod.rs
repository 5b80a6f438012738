//! Platform notification backends
//!
//! A backend supplies raw change notifications and owns the per-handle
//! native watch state. The session manager and reconciler depend only on
//! this trait; which implementation runs is chosen at service start.

use std::path::Path;
use std::sync::Arc;

use filemon_core::EntryFilter;

use crate::queue::Callbacks;
use crate::registry::Handle;

pub mod native;
pub mod poll;

pub use native::NativeBackend;
pub use poll::PollBackend;

/// Capability interface every notification backend implements.
///
/// All methods run on the session thread; a backend never touches its
/// registrations from anywhere else.
pub trait MonitorBackend: Send {
    /// Set up a watch on `path` and seed its snapshot tree. The outcome
    /// is delivered through the callbacks (`on_registered` or
    /// `on_registration_error`), never returned.
    fn register(
        &mut self,
        path: &Path,
        recursive: bool,
        filter: Option<EntryFilter>,
        callbacks: Arc<Callbacks>,
    );

    /// Tear down one watch. Inactive handles are ignored, so calling
    /// this twice delivers `on_unregistered` only once.
    fn unregister(&mut self, handle: Handle);

    /// Deliver pending raw notifications, reconciling snapshot trees and
    /// enqueueing outbound events. Invoked every session-loop iteration.
    fn poll_events(&mut self);

    /// Tear down every active watch (shutdown path).
    fn unregister_all(&mut self);

    /// Final global cleanup after all watches are gone, e.g. waiting out
    /// in-flight native operations.
    fn stop(&mut self);
}
