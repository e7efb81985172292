//! Storage operations trait.
//!
//! This is the boundary every backend implements. The driver adapter holds
//! one `Arc<dyn StorageOps>` chosen at mount time and never inspects the
//! concrete type.

use crate::error::StorageResult;
use crate::path::RequestMeta;
use crate::types::{
    FileAttributes, FileInformation, FileMode, FileOptions, OpenedFile, StorageFeatures,
    WriteOffset,
};

/// Core storage operations trait.
///
/// Calls are synchronous and may arrive concurrently from many driver
/// worker threads. Requests carrying a handle from a previous
/// [`create_file`](StorageOps::create_file) should be served through that
/// handle rather than by re-resolving the path.
pub trait StorageOps: Send + Sync {
    // ========================================================================
    // Volume properties
    // ========================================================================

    /// Label shown for the mounted volume.
    fn volume_label(&self) -> &str;

    /// Capability flags reported to the driver.
    fn features(&self) -> StorageFeatures;

    /// Maximum length of a single path component.
    fn max_component_length(&self) -> u32;

    /// Filesystem name tag.
    fn file_system_name(&self) -> &str;

    // ========================================================================
    // Deletion checks
    // ========================================================================

    /// Check that the directory exists, is a directory, and is empty.
    ///
    /// Never mutates. The actual removal happens in
    /// [`cleanup`](StorageOps::cleanup).
    fn can_delete_directory(&self, meta: &RequestMeta) -> StorageResult<()>;

    /// Check that the file exists and is not a directory.
    fn can_delete_file(&self, meta: &RequestMeta) -> StorageResult<()>;

    // ========================================================================
    // Open / close
    // ========================================================================

    /// Open or create the entry according to `mode`.
    fn create_file(
        &self,
        meta: &RequestMeta,
        mode: FileMode,
        options: FileOptions,
        attributes: FileAttributes,
    ) -> StorageResult<OpenedFile>;

    /// Release backend resources tied to the request's handle. Idempotent.
    fn close_file(&self, meta: &RequestMeta);

    /// Last-handle cleanup; deletes the entry when `delete_on_close` is set.
    ///
    /// Deletion failures are logged by the backend, never returned.
    fn cleanup(&self, meta: &RequestMeta, delete_on_close: bool);

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Immediate children of a directory.
    fn get_file_list(&self, meta: &RequestMeta) -> StorageResult<Vec<FileInformation>>;

    /// Information about a single entry.
    fn get_file_info(&self, meta: &RequestMeta) -> StorageResult<FileInformation>;

    fn flush_file_buffers(&self, meta: &RequestMeta) -> StorageResult<()>;

    /// Free bytes across the whole volume.
    fn free_space(&self) -> u64;

    /// Total bytes of the volume.
    fn total_space(&self) -> u64;

    // ========================================================================
    // Structure
    // ========================================================================

    /// Move or rename an entry.
    ///
    /// Directories are never overwritten, even with `replace` set.
    fn move_file(&self, from: &RequestMeta, to: &RequestMeta, replace: bool)
    -> StorageResult<()>;

    // ========================================================================
    // Content
    // ========================================================================

    /// Read into `buffer` starting at `offset`. Returns the byte count,
    /// which is short at end of file.
    fn read_file(&self, meta: &RequestMeta, buffer: &mut [u8], offset: u64)
    -> StorageResult<usize>;

    /// Write `data` at `offset`, zero-filling any gap. Returns the byte count.
    fn write_file(&self, meta: &RequestMeta, data: &[u8], offset: WriteOffset)
    -> StorageResult<usize>;

    /// Truncate or extend to `length`.
    fn set_file_size(&self, meta: &RequestMeta, length: u64) -> StorageResult<()>;

    fn set_file_attributes(
        &self,
        meta: &RequestMeta,
        attributes: FileAttributes,
    ) -> StorageResult<()>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check if a path resolves.
    fn exists(&self, meta: &RequestMeta) -> bool {
        self.get_file_info(meta).is_ok()
    }

    /// Used bytes, derived from total and free.
    fn used_space(&self) -> u64 {
        self.total_space().saturating_sub(self.free_space())
    }
}
