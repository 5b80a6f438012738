//! Fresh filesystem scans into snapshot trees

use tracing::warn;
use walkdir::WalkDir;

use crate::error::Result;
use crate::file_info::FileInfo;
use crate::filter::EntryFilter;
use crate::tree::{FileTree, NodeId};

/// Scan `root` from the live filesystem into a standalone [`FileTree`].
///
/// `recursive` selects a full-subtree walk versus immediate children
/// only. The filter is applied during the scan itself: a filtered-out
/// directory is never descended into, so excluded subtrees are invisible
/// rather than merely event-silent.
///
/// Individual unreadable entries are logged and skipped; only a failure
/// to produce the root record at all is an error, which the caller sees
/// before invoking this function (the root is passed in pre-built).
pub fn scan_files(
    root: &FileInfo,
    recursive: bool,
    filter: Option<&EntryFilter>,
) -> Result<FileTree> {
    let mut tree = FileTree::new(root.clone());
    if !root.is_directory() {
        return Ok(tree);
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut walker = WalkDir::new(root.path())
        .follow_links(false)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| match entry.metadata() {
            Ok(metadata) => {
                let info = FileInfo::from_metadata(entry.path(), &metadata);
                filter.map_or(true, |f| f(&info))
            }
            // Keep it; the failure is reported once when the entry is read.
            Err(_) => true,
        });

    // Parent node per depth; index 0 is the scan root. Skipped directories
    // must not be descended into or the stack desynchronizes.
    let mut parents: Vec<NodeId> = vec![tree.root()];

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry during scan: {}", e);
                continue;
            }
        };
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(
                    "skipping entry with unreadable metadata: {}: {}",
                    entry.path().display(),
                    e
                );
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            }
        };

        let depth = entry.depth();
        let info = FileInfo::from_metadata(entry.path(), &metadata);
        let is_directory = info.is_directory();
        let id = tree.insert_child(parents[depth - 1], info);

        if is_directory {
            parents.truncate(depth);
            parents.push(id);
        }
    }

    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{exclude_directory_filter, exclude_hidden_filter};
    use anyhow::Result;
    use std::fs;
    use tempfile::TempDir;

    fn relative_paths(tree: &FileTree, root: &std::path::Path) -> Vec<String> {
        tree.flatten_tree()
            .iter()
            .skip(1) // the root itself
            .map(|i| {
                i.path()
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    #[test]
    fn test_recursive_scan_captures_subtree_in_order() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::create_dir(root.join("sub"))?;
        fs::write(root.join("sub/inner.txt"), b"i")?;
        fs::write(root.join("b.txt"), b"b")?;
        fs::write(root.join("a.txt"), b"a")?;

        let root_info = FileInfo::for_path(root)?;
        let tree = scan_files(&root_info, true, None)?;

        assert_eq!(
            relative_paths(&tree, root),
            ["a.txt", "b.txt", "sub", "sub/inner.txt"]
        );
        Ok(())
    }

    #[test]
    fn test_single_level_scan_stops_at_children() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::create_dir(root.join("sub"))?;
        fs::write(root.join("sub/inner.txt"), b"i")?;

        let root_info = FileInfo::for_path(root)?;
        let tree = scan_files(&root_info, false, None)?;

        assert_eq!(relative_paths(&tree, root), ["sub"]);
        Ok(())
    }

    #[test]
    fn test_filtered_directory_is_structurally_invisible() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::create_dir(root.join("target"))?;
        fs::write(root.join("target/artifact.bin"), b"x")?;
        fs::write(root.join("main.rs"), b"fn main() {}")?;

        let filter = exclude_directory_filter("target");
        let root_info = FileInfo::for_path(root)?;
        let tree = scan_files(&root_info, true, Some(&filter))?;

        // Neither the directory nor its descendants appear.
        assert_eq!(relative_paths(&tree, root), ["main.rs"]);
        Ok(())
    }

    #[test]
    fn test_hidden_filter_applies_during_scan() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::create_dir(root.join(".git"))?;
        fs::write(root.join(".git/config"), b"x")?;
        fs::write(root.join(".env"), b"x")?;
        fs::write(root.join("visible.txt"), b"x")?;

        let filter = exclude_hidden_filter();
        let root_info = FileInfo::for_path(root)?;
        let tree = scan_files(&root_info, true, Some(&filter))?;

        assert_eq!(relative_paths(&tree, root), ["visible.txt"]);
        Ok(())
    }

    #[test]
    fn test_scan_of_file_root_yields_single_node() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let file = temp_dir.path().join("plain.txt");
        fs::write(&file, b"x")?;

        let info = FileInfo::for_path(&file)?;
        let tree = scan_files(&info, true, None)?;
        assert_eq!(tree.len(), 1);
        Ok(())
    }
}
