//! Arena-backed snapshot tree
//!
//! A [`FileTree`] mirrors one watched directory subtree: every node holds
//! one [`FileInfo`], only directory nodes have children, and siblings are
//! kept sorted by path at all times. Nodes are arena slots addressed by
//! [`NodeId`] with parent/child links stored as ids, so subtrees can be
//! grafted, replaced and extracted without reference juggling.
//!
//! Because siblings are sorted and the order is component-wise
//! ([`FileInfo::path_cmp`]), a pre-order traversal yields a sequence
//! sorted under the same total order the diff expects.

use crate::file_info::FileInfo;

/// Identifier of one node within its [`FileTree`].
///
/// An id stays valid until its node leaves the tree: [`FileTree::remove`]
/// invalidates the ids of the removed node and all its descendants, and
/// [`FileTree::replace_subtree`] invalidates the ids of the replaced
/// node's former descendants (the node itself keeps its id). Accessing
/// the tree through an invalidated id panics; ids must not be held
/// across these operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Node {
    info: FileInfo,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Ordered, hierarchical snapshot of a directory subtree.
#[derive(Debug, Clone)]
pub struct FileTree {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    root: NodeId,
    len: usize,
}

impl FileTree {
    /// Create a tree whose root represents the watched directory itself.
    pub fn new(root_info: FileInfo) -> Self {
        Self {
            nodes: vec![Some(Node {
                info: root_info,
                parent: None,
                children: Vec::new(),
            })],
            free: Vec::new(),
            root: NodeId(0),
            len: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn info(&self, id: NodeId) -> &FileInfo {
        &self.node(id).info
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Replace one node's record in place (attribute modification).
    pub fn set_info(&mut self, id: NodeId, info: FileInfo) {
        self.node_mut(id).info = info;
    }

    /// Find the child of `parent` whose path equals `path`.
    pub fn find_child(&self, parent: NodeId, path: &std::path::Path) -> Option<NodeId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|&child| self.node(child).info.path() == path)
    }

    /// Find the node for `path` by descending one component at a time.
    /// Returns `None` when the path lies outside the tree or was excluded
    /// from it (e.g. by a scan filter).
    pub fn find(&self, path: &std::path::Path) -> Option<NodeId> {
        let root_path = self.node(self.root).info.path();
        if path == root_path {
            return Some(self.root);
        }
        let relative = path.strip_prefix(root_path).ok()?;

        let mut current = self.root;
        let mut current_path = root_path.to_path_buf();
        for component in relative.components() {
            current_path.push(component);
            current = self.find_child(current, &current_path)?;
        }
        Some(current)
    }

    /// Insert a new child under `parent` at its sorted sibling position.
    pub fn insert_child(&mut self, parent: NodeId, info: FileInfo) -> NodeId {
        let id = self.alloc(Node {
            info,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.link_sorted(parent, id);
        id
    }

    /// Deep-copy `subtree` (a standalone scanned tree) under `parent`,
    /// keeping sibling order. Returns the id of the copied root.
    pub fn graft(&mut self, parent: NodeId, subtree: &FileTree) -> NodeId {
        let id = self.copy_from(subtree, subtree.root(), Some(parent));
        self.link_sorted(parent, id);
        id
    }

    /// Atomically replace the subtree rooted at `id` with `subtree`:
    /// the node keeps its identity but takes the candidate's record and
    /// entire descendant set. Ids of the former descendants are
    /// invalidated.
    pub fn replace_subtree(&mut self, id: NodeId, subtree: &FileTree) {
        let old_children: Vec<NodeId> = self.node(id).children.clone();
        for child in old_children {
            self.free_subtree(child);
        }
        self.node_mut(id).children.clear();
        self.node_mut(id).info = subtree.info(subtree.root()).clone();

        let new_children: Vec<NodeId> = subtree.children(subtree.root()).to_vec();
        for src_child in new_children {
            let copied = self.copy_from(subtree, src_child, Some(id));
            self.node_mut(id).children.push(copied);
        }
    }

    /// Detach and discard the subtree rooted at `id`, invalidating the
    /// ids of every discarded node. Removing the root id clears the tree
    /// down to the bare root node.
    pub fn remove(&mut self, id: NodeId) {
        if id == self.root {
            let children: Vec<NodeId> = self.node(id).children.clone();
            for child in children {
                self.free_subtree(child);
            }
            self.node_mut(id).children.clear();
            return;
        }
        if let Some(parent) = self.node(id).parent {
            self.node_mut(parent).children.retain(|&c| c != id);
        }
        self.free_subtree(id);
    }

    /// Pre-order records of the subtree rooted at `id`, including `id`
    /// itself. Sorted under [`FileInfo::path_cmp`].
    pub fn flatten(&self, id: NodeId) -> Vec<FileInfo> {
        let mut out = Vec::new();
        self.collect(id, &mut out);
        out
    }

    /// Pre-order records of the whole tree.
    pub fn flatten_tree(&self) -> Vec<FileInfo> {
        self.flatten(self.root)
    }

    fn collect(&self, id: NodeId, out: &mut Vec<FileInfo>) {
        let node = self.node(id);
        out.push(node.info.clone());
        for &child in &node.children {
            self.collect(child, out);
        }
    }

    fn copy_from(&mut self, src: &FileTree, src_id: NodeId, parent: Option<NodeId>) -> NodeId {
        let id = self.alloc(Node {
            info: src.info(src_id).clone(),
            parent,
            children: Vec::new(),
        });
        let src_children: Vec<NodeId> = src.children(src_id).to_vec();
        for src_child in src_children {
            let copied = self.copy_from(src, src_child, Some(id));
            self.node_mut(id).children.push(copied);
        }
        id
    }

    fn link_sorted(&mut self, parent: NodeId, id: NodeId) {
        let path = self.node(id).info.path().to_path_buf();
        let position = self
            .node(parent)
            .children
            .iter()
            .position(|&c| self.node(c).info.path() > path.as_path())
            .unwrap_or_else(|| self.node(parent).children.len());
        self.node_mut(parent).children.insert(position, id);
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.len += 1;
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    fn free_subtree(&mut self, id: NodeId) {
        let children: Vec<NodeId> = self.node(id).children.clone();
        for child in children {
            self.free_subtree(child);
        }
        self.nodes[id.0] = None;
        self.free.push(id.0);
        self.len -= 1;
    }

    fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.0].as_ref().expect("stale node id")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.0].as_mut().expect("stale node id")
    }
}
