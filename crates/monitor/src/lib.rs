//! Filesystem change monitoring
//!
//! Two layers share one event vocabulary from `filemon-core`:
//!
//! - [`DirectoryMonitor`]: a synchronous, poll-driven snapshot of a
//!   single directory level. The caller owns the cadence.
//! - [`MonitorService`]: a background session thread that watches whole
//!   directory trees through a pluggable [`MonitorBackend`], reconciles
//!   snapshot trees against the filesystem, and marshals change events
//!   back to the consumer thread via
//!   [`check_for_changes`](MonitorService::check_for_changes).

pub mod backend;
pub mod dir_monitor;
pub mod queue;
pub mod reconcile;
pub mod registry;
pub mod service;

pub use backend::{MonitorBackend, NativeBackend, PollBackend};
pub use dir_monitor::DirectoryMonitor;
pub use queue::{CallbackQueue, Callbacks, Command, QueuedCallback};
pub use reconcile::discover_and_process_file_changes;
pub use registry::{Handle, Registration, Registry};
pub use service::MonitorService;
