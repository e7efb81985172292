//! Arena-backed directory tree.
//!
//! Nodes live in a slot vector addressed by [`NodeId`]. Directories map child
//! names to ids, and every node records its parent id so it can be detached
//! from the owning map on delete or move. Freeing a slot bumps its
//! generation, which is how stale [`FileHandle`]s are detected.
//!
//! The tree itself is not synchronised; `MemoryStorage` wraps it in a
//! `RwLock`.

use mountdrive_contract::{FileAttributes, FileHandle, PathHierarchy};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::trace;

use super::stream::Stream;

/// Trees smaller than this are walked on the calling thread.
const PARALLEL_WALK_THRESHOLD: usize = 4096;

/// Upper bound on space-accounting workers.
const MAX_WALK_WORKERS: usize = 4;

/// Index into the node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

/// Structural failure, without path context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TreeError {
    /// A component is missing, or an intermediate component is a file.
    PathNotFound,
    /// The final component exists but is a file.
    NotADirectory,
    /// The final component exists but is a directory.
    IsDirectory,
    AlreadyExists,
    DirectoryNotEmpty,
    /// Move source does not resolve.
    SourceNotFound,
    /// Move destination is taken and may not be replaced.
    NameCollision,
    /// Move of the root, or of a directory into its own subtree.
    InvalidMove,
}

#[derive(Debug)]
pub(crate) enum NodeBody {
    File(Arc<Stream>),
    Directory(BTreeMap<String, NodeId>),
}

#[derive(Debug)]
pub(crate) struct Node {
    pub name: String,
    pub parent: Option<NodeId>,
    pub attributes: FileAttributes,
    pub created: SystemTime,
    /// Access and write times for directories. Files keep theirs on the
    /// stream so I/O can update them without the tree lock.
    pub accessed: SystemTime,
    pub written: SystemTime,
    pub body: NodeBody,
}

impl Node {
    fn new(name: &str, parent: NodeId, attributes: FileAttributes, body: NodeBody) -> Self {
        let now = SystemTime::now();
        Self {
            name: name.to_string(),
            parent: Some(parent),
            attributes,
            created: now,
            accessed: now,
            written: now,
            body,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.body, NodeBody::Directory(_))
    }

    pub fn stream(&self) -> Option<&Arc<Stream>> {
        match &self.body {
            NodeBody::File(stream) => Some(stream),
            NodeBody::Directory(_) => None,
        }
    }

    pub fn children(&self) -> Option<&BTreeMap<String, NodeId>> {
        match &self.body {
            NodeBody::Directory(children) => Some(children),
            NodeBody::File(_) => None,
        }
    }

    fn touch_written(&mut self) {
        match &self.body {
            NodeBody::File(stream) => stream.touch_written(),
            NodeBody::Directory(_) => self.written = SystemTime::now(),
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    node: Option<Node>,
}

#[derive(Debug)]
pub(crate) struct Tree {
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
}

impl Tree {
    /// A tree holding only the root directory.
    pub fn new() -> Self {
        let now = SystemTime::now();
        let root = Node {
            name: String::new(),
            parent: None,
            attributes: FileAttributes::DEVICE | FileAttributes::DIRECTORY,
            created: now,
            accessed: now,
            written: now,
            body: NodeBody::Directory(BTreeMap::new()),
        };
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(root),
            }],
            free: Vec::new(),
            live: 1,
        }
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.0).and_then(|slot| slot.node.as_ref())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots.get_mut(id.0).and_then(|slot| slot.node.as_mut())
    }

    // ========================================================================
    // Handles
    // ========================================================================

    /// Handle for a live node.
    pub fn handle(&self, id: NodeId) -> Option<FileHandle> {
        let slot = self.slots.get(id.0)?;
        slot.node.as_ref()?;
        Some(FileHandle::new(id.0 as u64, slot.generation))
    }

    /// Resolve a handle, rejecting it when its slot has since been freed.
    pub fn resolve_handle(&self, handle: FileHandle) -> Option<NodeId> {
        let index = usize::try_from(handle.id()).ok()?;
        let slot = self.slots.get(index)?;
        if slot.generation != handle.generation() || slot.node.is_none() {
            return None;
        }
        Some(NodeId(index))
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Resolve a path to a node of any kind.
    pub fn lookup(&self, path: &PathHierarchy) -> Result<NodeId, TreeError> {
        let mut current = NodeId::ROOT;
        for component in path.iter() {
            let children = self
                .node(current)
                .and_then(Node::children)
                .ok_or(TreeError::PathNotFound)?;
            current = *children.get(component).ok_or(TreeError::PathNotFound)?;
        }
        Ok(current)
    }

    /// Resolve a path that must name a directory.
    pub fn lookup_directory(&self, path: &PathHierarchy) -> Result<NodeId, TreeError> {
        let id = self.lookup(path)?;
        match self.node(id) {
            Some(node) if node.is_directory() => Ok(id),
            Some(_) => Err(TreeError::NotADirectory),
            None => Err(TreeError::PathNotFound),
        }
    }

    fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.node(parent)?.children()?.get(name).copied()
    }

    /// True when `ancestor` lies on the parent chain of `id` (or is `id`).
    fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(next) = current {
            if next == ancestor {
                return true;
            }
            current = self.node(next).and_then(|node| node.parent);
        }
        false
    }

    // ========================================================================
    // Structural mutation
    // ========================================================================

    pub fn add_file(
        &mut self,
        path: &PathHierarchy,
        attributes: FileAttributes,
    ) -> Result<NodeId, TreeError> {
        let body = NodeBody::File(Arc::new(Stream::new()));
        self.add(path, attributes, body)
    }

    pub fn add_directory(&mut self, path: &PathHierarchy) -> Result<NodeId, TreeError> {
        let body = NodeBody::Directory(BTreeMap::new());
        self.add(path, FileAttributes::DIRECTORY, body)
    }

    fn add(
        &mut self,
        path: &PathHierarchy,
        attributes: FileAttributes,
        body: NodeBody,
    ) -> Result<NodeId, TreeError> {
        let name = path.file_name().ok_or(TreeError::AlreadyExists)?;
        let parent = self
            .lookup_directory(&path.parent())
            .map_err(|_| TreeError::PathNotFound)?;
        if self.child(parent, name).is_some() {
            return Err(TreeError::AlreadyExists);
        }

        let id = self.alloc(Node::new(name, parent, attributes, body));
        self.attach(parent, name, id);
        trace!(path = %path, id = id.0, "node created");
        Ok(id)
    }

    /// Return the file at `path`, creating it when missing. With `overwrite`
    /// an existing file is disposed and replaced by a fresh node.
    ///
    /// Returns the node and whether the path was unoccupied.
    pub fn get_or_add_file(
        &mut self,
        path: &PathHierarchy,
        attributes: FileAttributes,
        overwrite: bool,
    ) -> Result<(NodeId, bool), TreeError> {
        let name = path.file_name().ok_or(TreeError::IsDirectory)?;
        let parent = self
            .lookup_directory(&path.parent())
            .map_err(|_| TreeError::PathNotFound)?;

        let existing = self.child(parent, name);
        if let Some(existing) = existing {
            if self.node(existing).is_some_and(Node::is_directory) {
                return Err(TreeError::IsDirectory);
            }
            if !overwrite {
                return Ok((existing, false));
            }
            self.detach(existing);
            self.release(existing);
            trace!(path = %path, "file overwritten");
        }
        let created = existing.is_none();

        let body = NodeBody::File(Arc::new(Stream::new()));
        let id = self.alloc(Node::new(name, parent, attributes, body));
        self.attach(parent, name, id);
        trace!(path = %path, id = id.0, "node created");
        Ok((id, created))
    }

    /// Return the directory at `path`, creating it when missing.
    pub fn get_or_add_directory(
        &mut self,
        path: &PathHierarchy,
    ) -> Result<(NodeId, bool), TreeError> {
        match self.lookup_directory(path) {
            Ok(id) => Ok((id, false)),
            Err(TreeError::PathNotFound) => self.add_directory(path).map(|id| (id, true)),
            Err(err) => Err(err),
        }
    }

    /// Remove a file or empty directory, disposing its stream.
    pub fn delete(&mut self, id: NodeId) -> Result<(), TreeError> {
        if id == NodeId::ROOT {
            return Err(TreeError::InvalidMove);
        }
        let node = self.node(id).ok_or(TreeError::PathNotFound)?;
        if node.children().is_some_and(|children| !children.is_empty()) {
            return Err(TreeError::DirectoryNotEmpty);
        }

        self.detach(id);
        self.release(id);
        trace!(id = id.0, "node deleted");
        Ok(())
    }

    /// Re-parent `source` under the name and parent given by `to`.
    ///
    /// Identity is preserved, so handles to `source` stay valid.
    pub fn move_node(
        &mut self,
        source: NodeId,
        to: &PathHierarchy,
        replace: bool,
    ) -> Result<(), TreeError> {
        let source_is_dir = self
            .node(source)
            .ok_or(TreeError::SourceNotFound)?
            .is_directory();
        let Some(name) = to.file_name() else {
            return Err(TreeError::InvalidMove);
        };
        if source == NodeId::ROOT {
            return Err(TreeError::InvalidMove);
        }
        let dest_parent = self.lookup_directory(&to.parent())?;

        if let Some(existing) = self.child(dest_parent, name) {
            if existing == source {
                return Ok(());
            }
            let existing_is_dir = self.node(existing).is_some_and(Node::is_directory);
            if !replace || source_is_dir || existing_is_dir {
                return Err(TreeError::NameCollision);
            }
        }
        if source_is_dir && self.is_ancestor(source, dest_parent) {
            return Err(TreeError::InvalidMove);
        }

        if let Some(existing) = self.child(dest_parent, name) {
            self.detach(existing);
            self.release(existing);
            trace!(to = %to, "move replaced file");
        }

        self.detach(source);
        if let Some(node) = self.node_mut(source) {
            node.name = name.to_string();
            node.parent = Some(dest_parent);
            node.touch_written();
        }
        self.attach(dest_parent, name, source);
        trace!(id = source.0, to = %to, "node moved");
        Ok(())
    }

    fn attach(&mut self, parent: NodeId, name: &str, id: NodeId) {
        if let Some(parent) = self.node_mut(parent) {
            if let NodeBody::Directory(children) = &mut parent.body {
                children.insert(name.to_string(), id);
            }
            parent.written = SystemTime::now();
        }
    }

    fn detach(&mut self, id: NodeId) {
        let Some((parent, name)) = self
            .node(id)
            .and_then(|node| node.parent.map(|parent| (parent, node.name.clone())))
        else {
            return;
        };
        if let Some(parent) = self.node_mut(parent) {
            if let NodeBody::Directory(children) = &mut parent.body {
                children.remove(&name);
            }
            parent.written = SystemTime::now();
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                self.slots[index].node = Some(node);
                NodeId(index)
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId(self.slots.len() - 1)
            }
        }
    }

    /// Free a detached node's slot and dispose its stream.
    fn release(&mut self, id: NodeId) {
        let Some(slot) = self.slots.get_mut(id.0) else {
            return;
        };
        let Some(node) = slot.node.take() else {
            return;
        };
        slot.generation += 1;
        self.free.push(id.0);
        self.live -= 1;
        if let NodeBody::File(stream) = node.body {
            stream.dispose();
        }
    }

    // ========================================================================
    // Whole-tree walks
    // ========================================================================

    /// Sum of every stream's buffer capacity.
    ///
    /// Large trees are split across scoped workers by root subtree. Each
    /// worker owns its stack and accumulator; results are summed after join.
    pub fn used_bytes(&self) -> u64 {
        let roots: Vec<NodeId> = self
            .node(NodeId::ROOT)
            .and_then(Node::children)
            .map(|children| children.values().copied().collect())
            .unwrap_or_default();

        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(MAX_WALK_WORKERS);
        if self.live < PARALLEL_WALK_THRESHOLD || workers < 2 || roots.len() < 2 {
            return self.subtree_bytes(&roots);
        }

        let chunk = roots.len().div_ceil(workers);
        std::thread::scope(|scope| {
            let handles: Vec<_> = roots
                .chunks(chunk)
                .map(|starts| scope.spawn(move || self.subtree_bytes(starts)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .sum()
        })
    }

    fn subtree_bytes(&self, starts: &[NodeId]) -> u64 {
        let mut stack = starts.to_vec();
        let mut total = 0u64;
        while let Some(id) = stack.pop() {
            match self.node(id).map(|node| &node.body) {
                Some(NodeBody::File(stream)) => total += stream.capacity(),
                Some(NodeBody::Directory(children)) => stack.extend(children.values().copied()),
                None => {}
            }
        }
        total
    }

    /// Release every file buffer, iteratively.
    pub fn dispose(&mut self) {
        let mut stack = vec![NodeId::ROOT];
        while let Some(id) = stack.pop() {
            match self.node(id).map(|node| &node.body) {
                Some(NodeBody::File(stream)) => stream.dispose(),
                Some(NodeBody::Directory(children)) => stack.extend(children.values().copied()),
                None => {}
            }
        }
    }
}

impl Drop for Tree {
    fn drop(&mut self) {
        self.dispose();
    }
}
