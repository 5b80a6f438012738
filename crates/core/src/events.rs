//! Change events emitted by the monitors

use serde::{Deserialize, Serialize};

use crate::file_info::FileInfo;

/// What happened to an entry between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One change to one filesystem entry.
///
/// Events are always delivered in the same total order their snapshots
/// are kept in (component-wise path order within one batch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChangeEvent {
    pub kind: ChangeKind,
    pub info: FileInfo,
}

impl FileChangeEvent {
    pub fn added(info: FileInfo) -> Self {
        Self {
            kind: ChangeKind::Added,
            info,
        }
    }

    pub fn modified(info: FileInfo) -> Self {
        Self {
            kind: ChangeKind::Modified,
            info,
        }
    }

    pub fn removed(info: FileInfo) -> Self {
        Self {
            kind: ChangeKind::Removed,
            info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    #[test]
    fn test_event_constructors_tag_kind() {
        let info = FileInfo::new("/tmp/f", false, SystemTime::UNIX_EPOCH, 0);
        assert_eq!(FileChangeEvent::added(info.clone()).kind, ChangeKind::Added);
        assert_eq!(
            FileChangeEvent::modified(info.clone()).kind,
            ChangeKind::Modified
        );
        assert_eq!(FileChangeEvent::removed(info).kind, ChangeKind::Removed);
    }

    #[test]
    fn test_event_serializes_with_snake_case_kind() {
        let event = FileChangeEvent::added(FileInfo::directory("/tmp/d"));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"added\""));

        let back: FileChangeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
