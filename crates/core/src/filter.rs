//! Filter combinators for gating which entries produce events
//!
//! Filters are pure predicates over a [`FileInfo`]; an entry for which
//! the predicate returns `false` is invisible to monitoring. Callers
//! that need more than one filter compose them by conjunction.

use std::sync::Arc;

use crate::file_info::FileInfo;

/// Shared predicate deciding whether an entry participates in monitoring.
pub type EntryFilter = Arc<dyn Fn(&FileInfo) -> bool + Send + Sync>;

/// Exclude directories carrying any of the given names (the directory
/// and, structurally, everything beneath it).
pub fn exclude_directories_filter(names: &[&str]) -> EntryFilter {
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    Arc::new(move |info: &FileInfo| {
        if !info.is_directory() {
            return true;
        }
        match info.file_name().and_then(|n| n.to_str()) {
            Some(name) => !names.iter().any(|excluded| excluded == name),
            None => true,
        }
    })
}

/// Exclude directories named `name`.
pub fn exclude_directory_filter(name: &str) -> EntryFilter {
    exclude_directories_filter(&[name])
}

/// Exclude hidden entries (leading-dot convention).
pub fn exclude_hidden_filter() -> EntryFilter {
    Arc::new(|info: &FileInfo| {
        !matches!(
            info.file_name().and_then(|n| n.to_str()),
            Some(name) if name.starts_with('.')
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn file(path: &str) -> FileInfo {
        FileInfo::new(path, false, SystemTime::UNIX_EPOCH, 0)
    }

    #[test]
    fn test_exclude_directories_matches_directories_only() {
        let filter = exclude_directories_filter(&["target", "node_modules"]);

        assert!(!filter(&FileInfo::directory("/repo/target")));
        assert!(!filter(&FileInfo::directory("/repo/sub/node_modules")));
        assert!(filter(&FileInfo::directory("/repo/src")));

        // A plain file named like an excluded directory passes.
        assert!(filter(&file("/repo/target")));
    }

    #[test]
    fn test_exclude_single_directory() {
        let filter = exclude_directory_filter(".git");
        assert!(!filter(&FileInfo::directory("/repo/.git")));
        assert!(filter(&FileInfo::directory("/repo/.github-like"))); // name must match exactly
    }

    #[test]
    fn test_exclude_hidden() {
        let filter = exclude_hidden_filter();
        assert!(!filter(&file("/repo/.env")));
        assert!(!filter(&FileInfo::directory("/repo/.cache")));
        assert!(filter(&file("/repo/visible.txt")));
    }
}
