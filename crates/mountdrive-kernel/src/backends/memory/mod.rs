//! In-memory storage backend.
//!
//! A volatile hierarchical store: everything is lost when the store is
//! dropped. Structure lives in an arena [`tree`] behind one `RwLock`; file
//! content lives in per-file [`stream`]s with their own mutex.

mod stream;
mod tree;

use mountdrive_contract::{
    EntryType, FileAttributes, FileInformation, FileMode, FileOptions, OpenedFile, PathHierarchy,
    RequestMeta, StorageError, StorageFeatures, StorageOps, StorageResult, WriteOffset,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::config::MemoryStorageConfig;
use stream::{Disposed, Stream, StreamError};
use tree::{Node, NodeId, Tree, TreeError};

/// Bytes per configured megabyte.
const BYTES_PER_MB: u64 = 1_000_000;

/// In-memory storage backend.
///
/// Thread-safe: lookups share the tree lock, structural changes take it
/// exclusively, and file I/O holds only the file's stream lock.
#[derive(Debug)]
pub struct MemoryStorage {
    tree: RwLock<Tree>,
    config: MemoryStorageConfig,
    total_bytes: u64,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// Create an empty store with default volume settings.
    pub fn new() -> Self {
        Self::from_config(MemoryStorageConfig::default())
    }

    /// Create an empty store with the given volume settings.
    pub fn from_config(config: MemoryStorageConfig) -> Self {
        let total_bytes = config.volume_size_mb.saturating_mul(BYTES_PER_MB);
        Self {
            tree: RwLock::new(Tree::new()),
            config,
            total_bytes,
        }
    }

    pub fn config(&self) -> &MemoryStorageConfig {
        &self.config
    }

    /// Release every file buffer. The structure stays in place, but
    /// subsequent I/O on any file reports not-found.
    pub fn dispose(&self) {
        self.tree.write().dispose();
        debug!("memory storage disposed");
    }

    /// Number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.tree.read().len()
    }

    /// Find the node a request refers to, preferring its handle.
    fn locate(tree: &Tree, meta: &RequestMeta) -> StorageResult<NodeId> {
        match meta.handle {
            Some(handle) => tree.resolve_handle(handle).ok_or_else(|| {
                debug!(path = %meta.path, "stale handle");
                StorageError::file_not_found(&meta.path)
            }),
            None => tree
                .lookup(&meta.path)
                .map_err(|_| StorageError::file_not_found(&meta.path)),
        }
    }

    fn node<'t>(tree: &'t Tree, id: NodeId, meta: &RequestMeta) -> StorageResult<&'t Node> {
        tree.node(id)
            .ok_or_else(|| StorageError::fault(format!("node vanished: {}", meta.path)))
    }

    /// Clone the stream for a file request so the tree lock can be dropped
    /// before any I/O.
    fn stream(&self, meta: &RequestMeta) -> StorageResult<Arc<Stream>> {
        let tree = self.tree.read();
        let id = Self::locate(&tree, meta)?;
        match Self::node(&tree, id, meta)?.stream() {
            Some(stream) => Ok(Arc::clone(stream)),
            None => Err(StorageError::is_directory(&meta.path)),
        }
    }

    /// Reject sizes the volume could never hold before allocating them.
    fn check_extent(&self, meta: &RequestMeta, end: Option<u64>) -> StorageResult<()> {
        match end {
            Some(end) if end <= self.total_bytes => Ok(()),
            _ => Err(StorageError::fault(format!(
                "extent exceeds volume size: {}",
                meta.path
            ))),
        }
    }

    fn info(node: &Node, meta: &RequestMeta) -> StorageResult<FileInformation> {
        let (length, accessed, written) = match node.stream() {
            Some(stream) => {
                let stat = stream.stat().map_err(|Disposed| StorageError::file_not_found(&meta.path))?;
                (stat.len, stat.accessed, stat.written)
            }
            None => (0, node.accessed, node.written),
        };
        Ok(FileInformation {
            file_name: node.name.clone(),
            attributes: node.attributes,
            creation_time: Some(node.created),
            last_access_time: Some(accessed),
            last_write_time: Some(written),
            length,
        })
    }

    fn create_file_entry(
        &self,
        meta: &RequestMeta,
        mode: FileMode,
        attributes: FileAttributes,
    ) -> StorageResult<OpenedFile> {
        let path = &meta.path;
        let attributes = file_attributes(attributes);

        match mode {
            FileMode::Open | FileMode::Append | FileMode::Truncate => {
                let tree = self.tree.read();
                let id = tree
                    .lookup(path)
                    .map_err(|_| StorageError::file_not_found(path))?;
                let node = Self::node(&tree, id, meta)?;
                let Some(stream) = node.stream() else {
                    return Err(StorageError::is_directory(path));
                };
                if mode == FileMode::Truncate {
                    stream.set_len(0).map_err(|err| stream_error(err, meta))?;
                }
                let handle = tree
                    .handle(id)
                    .map(|handle| handle.with_append(mode == FileMode::Append));
                Ok(OpenedFile::opened(handle))
            }
            FileMode::OpenOrCreate | FileMode::Create => {
                let mut tree = self.tree.write();
                let overwrite = mode == FileMode::Create;
                let (id, created) = tree
                    .get_or_add_file(path, attributes, overwrite)
                    .map_err(|err| match err {
                        TreeError::IsDirectory => StorageError::is_directory(path),
                        _ => StorageError::file_not_found(path),
                    })?;
                let handle = tree.handle(id);
                Ok(if created {
                    OpenedFile::created(handle)
                } else {
                    OpenedFile::opened(handle)
                })
            }
            FileMode::CreateNew => {
                let mut tree = self.tree.write();
                let id = tree.add_file(path, attributes).map_err(|err| match err {
                    TreeError::AlreadyExists => StorageError::already_exists(path),
                    _ => StorageError::file_not_found(path),
                })?;
                Ok(OpenedFile::created(tree.handle(id)))
            }
        }
    }

    fn create_directory_entry(&self, path: &PathHierarchy, mode: FileMode) -> StorageResult<OpenedFile> {
        let directory_error = |err: TreeError| match err {
            TreeError::NotADirectory => StorageError::not_a_directory(path),
            TreeError::AlreadyExists => StorageError::already_exists(path),
            _ => StorageError::directory_not_found(path),
        };

        match mode {
            FileMode::Open | FileMode::Append | FileMode::Truncate => {
                self.tree
                    .read()
                    .lookup_directory(path)
                    .map_err(directory_error)?;
                Ok(OpenedFile::opened(None))
            }
            FileMode::Create | FileMode::CreateNew => {
                self.tree
                    .write()
                    .add_directory(path)
                    .map_err(directory_error)?;
                Ok(OpenedFile::created(None))
            }
            FileMode::OpenOrCreate => {
                let (_, created) = self
                    .tree
                    .write()
                    .get_or_add_directory(path)
                    .map_err(directory_error)?;
                Ok(if created {
                    OpenedFile::created(None)
                } else {
                    OpenedFile::opened(None)
                })
            }
        }
    }
}

fn stream_error(err: StreamError, meta: &RequestMeta) -> StorageError {
    match err {
        StreamError::Disposed => StorageError::file_not_found(&meta.path),
        StreamError::OutOfMemory => {
            StorageError::fault(format!("allocation refused: {}", meta.path))
        }
    }
}

/// Attributes stored on a new or updated file. `NORMAL` only stands alone.
fn file_attributes(requested: FileAttributes) -> FileAttributes {
    let attributes = requested - FileAttributes::DIRECTORY - FileAttributes::DEVICE;
    if attributes.is_empty() || attributes == FileAttributes::NORMAL {
        FileAttributes::NORMAL
    } else {
        attributes - FileAttributes::NORMAL
    }
}

/// Attributes stored on a directory. The DIRECTORY bit (and DEVICE on the
/// root) always survive.
fn directory_attributes(requested: FileAttributes, current: FileAttributes) -> FileAttributes {
    (requested - FileAttributes::NORMAL)
        | FileAttributes::DIRECTORY
        | (current & FileAttributes::DEVICE)
}

impl StorageOps for MemoryStorage {
    fn volume_label(&self) -> &str {
        &self.config.volume_label
    }

    fn features(&self) -> StorageFeatures {
        StorageFeatures::CASE_SENSITIVE_SEARCH
            | StorageFeatures::CASE_PRESERVED_NAMES
            | StorageFeatures::SUPPORTS_OBJECT_IDS
    }

    fn max_component_length(&self) -> u32 {
        self.config.max_component_length
    }

    fn file_system_name(&self) -> &str {
        &self.config.file_system_name
    }

    fn can_delete_directory(&self, meta: &RequestMeta) -> StorageResult<()> {
        let tree = self.tree.read();
        let id = tree
            .lookup_directory(&meta.path)
            .map_err(|err| match err {
                TreeError::NotADirectory => StorageError::not_a_directory(&meta.path),
                _ => StorageError::directory_not_found(&meta.path),
            })?;
        let empty = Self::node(&tree, id, meta)?
            .children()
            .is_none_or(|children| children.is_empty());
        if empty {
            Ok(())
        } else {
            Err(StorageError::directory_not_empty(&meta.path))
        }
    }

    fn can_delete_file(&self, meta: &RequestMeta) -> StorageResult<()> {
        let tree = self.tree.read();
        let id = Self::locate(&tree, meta)?;
        if Self::node(&tree, id, meta)?.is_directory() {
            return Err(StorageError::file_not_found(&meta.path));
        }
        Ok(())
    }

    fn create_file(
        &self,
        meta: &RequestMeta,
        mode: FileMode,
        _options: FileOptions,
        attributes: FileAttributes,
    ) -> StorageResult<OpenedFile> {
        let opened = match meta.entry_type {
            EntryType::File => self.create_file_entry(meta, mode, attributes)?,
            EntryType::Directory | EntryType::Device => {
                self.create_directory_entry(&meta.path, mode)?
            }
        };
        trace!(path = %meta.path, %mode, created = opened.created, "create_file");
        Ok(opened)
    }

    fn close_file(&self, meta: &RequestMeta) {
        trace!(path = %meta.path, "close_file");
    }

    fn cleanup(&self, meta: &RequestMeta, delete_on_close: bool) {
        if !delete_on_close {
            return;
        }
        let mut tree = self.tree.write();
        let result = Self::locate(&tree, meta).and_then(|id| {
            tree.delete(id).map_err(|err| match err {
                TreeError::DirectoryNotEmpty => StorageError::directory_not_empty(&meta.path),
                _ => StorageError::file_not_found(&meta.path),
            })
        });
        if let Err(err) = result {
            warn!(path = %meta.path, error = %err, "delete on close failed");
        }
    }

    fn get_file_list(&self, meta: &RequestMeta) -> StorageResult<Vec<FileInformation>> {
        let tree = self.tree.read();
        let id = tree
            .lookup_directory(&meta.path)
            .map_err(|err| match err {
                TreeError::NotADirectory => StorageError::not_a_directory(&meta.path),
                _ => StorageError::directory_not_found(&meta.path),
            })?;
        let Some(children) = Self::node(&tree, id, meta)?.children() else {
            return Err(StorageError::not_a_directory(&meta.path));
        };

        let mut entries = Vec::with_capacity(children.len());
        for &child in children.values() {
            let node = Self::node(&tree, child, meta)?;
            match Self::info(node, meta) {
                Ok(info) => entries.push(info),
                // Buffers already released by dispose().
                Err(StorageError::FileNotFound(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(entries)
    }

    fn get_file_info(&self, meta: &RequestMeta) -> StorageResult<FileInformation> {
        let tree = self.tree.read();
        let id = Self::locate(&tree, meta)?;
        Self::info(Self::node(&tree, id, meta)?, meta)
    }

    fn flush_file_buffers(&self, _meta: &RequestMeta) -> StorageResult<()> {
        Ok(())
    }

    fn free_space(&self) -> u64 {
        let used = self.tree.read().used_bytes();
        self.total_bytes.saturating_sub(used)
    }

    fn total_space(&self) -> u64 {
        self.total_bytes
    }

    fn move_file(&self, from: &RequestMeta, to: &RequestMeta, replace: bool) -> StorageResult<()> {
        let mut tree = self.tree.write();
        let source = Self::locate(&tree, from)?;
        tree.move_node(source, &to.path, replace)
            .map_err(|err| match err {
                TreeError::SourceNotFound => StorageError::file_not_found(&from.path),
                TreeError::NotADirectory => StorageError::not_a_directory(&to.path.parent()),
                TreeError::NameCollision => StorageError::name_collision(&to.path),
                TreeError::InvalidMove => StorageError::path_not_found(&to.path),
                _ => StorageError::directory_not_found(&to.path.parent()),
            })
    }

    fn read_file(&self, meta: &RequestMeta, buffer: &mut [u8], offset: u64) -> StorageResult<usize> {
        self.stream(meta)?
            .read_at(buffer, offset)
            .map_err(|Disposed| StorageError::file_not_found(&meta.path))
    }

    fn write_file(
        &self,
        meta: &RequestMeta,
        data: &[u8],
        offset: WriteOffset,
    ) -> StorageResult<usize> {
        let stream = self.stream(meta)?;
        let offset = match offset {
            WriteOffset::At(_) if meta.handle.is_some_and(|h| h.is_append()) => WriteOffset::End,
            offset => offset,
        };
        if let WriteOffset::At(at) = offset {
            self.check_extent(meta, at.checked_add(data.len() as u64))?;
        }
        stream
            .write_at(data, offset)
            .map_err(|err| stream_error(err, meta))
    }

    fn set_file_size(&self, meta: &RequestMeta, length: u64) -> StorageResult<()> {
        let stream = self.stream(meta)?;
        self.check_extent(meta, Some(length))?;
        let length = usize::try_from(length)
            .map_err(|_| StorageError::fault(format!("length overflows: {}", meta.path)))?;
        stream
            .set_len(length)
            .map_err(|err| stream_error(err, meta))
    }

    fn set_file_attributes(
        &self,
        meta: &RequestMeta,
        attributes: FileAttributes,
    ) -> StorageResult<()> {
        let mut tree = self.tree.write();
        let id = Self::locate(&tree, meta)?;
        let node = tree
            .node_mut(id)
            .ok_or_else(|| StorageError::fault(format!("node vanished: {}", meta.path)))?;
        node.attributes = if node.is_directory() {
            directory_attributes(attributes, node.attributes)
        } else {
            file_attributes(attributes)
        };
        trace!(path = %meta.path, attributes = ?node.attributes, "attributes set");
        Ok(())
    }
}
