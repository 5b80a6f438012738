//! Core value types and algorithms for filesystem change monitoring
//!
//! This crate holds everything the monitors share:
//! - [`FileInfo`] / [`FileChangeEvent`]: a filesystem entry and a tagged
//!   add/modify/remove event carrying one
//! - [`collect_file_change_events`]: the ordered snapshot diff
//! - [`FileTree`]: an arena-backed snapshot tree mirroring a watched subtree
//! - [`scan_files`]: fresh (optionally recursive) scans from disk
//! - filter combinators for excluding directories and hidden entries

pub mod diff;
pub mod error;
pub mod events;
pub mod file_info;
pub mod filter;
pub mod scan;
pub mod tree;

pub use diff::collect_file_change_events;
pub use error::{Error, Result};
pub use events::{ChangeKind, FileChangeEvent};
pub use file_info::FileInfo;
pub use filter::{
    exclude_directories_filter, exclude_directory_filter, exclude_hidden_filter, EntryFilter,
};
pub use scan::scan_files;
pub use tree::{FileTree, NodeId};
