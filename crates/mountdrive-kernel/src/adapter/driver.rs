//! Driver callback surface.
//!
//! Mirrors the callback set a user-mode filesystem driver invokes. Paths
//! arrive as driver-native strings (`\dir\file`), and every call carries a
//! [`DriverFileInfo`] describing the open instance.

use mountdrive_contract::{
    FileAttributes, FileHandle, FileInformation, FileMode, FileOptions, StorageFeatures,
};
use std::time::SystemTime;

use super::status::NtStatus;

/// Result of a callback that produces a value.
pub type DriverResult<T> = Result<T, NtStatus>;

/// Per-open context the driver threads through every callback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverFileInfo {
    /// Process that issued the request.
    pub process_id: u32,
    pub is_directory: bool,
    /// Delete the entry when the last handle is cleaned up.
    pub delete_on_close: bool,
    /// Writes ignore their offset and land at end of file.
    pub write_to_end_of_file: bool,
    /// Backend handle stored by `create_file`.
    pub context: Option<FileHandle>,
}

impl DriverFileInfo {
    pub fn new(process_id: u32) -> Self {
        Self {
            process_id,
            ..Self::default()
        }
    }

    pub fn directory(process_id: u32) -> Self {
        Self {
            process_id,
            is_directory: true,
            ..Self::default()
        }
    }
}

/// Answer to a volume information query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInformation {
    pub volume_label: String,
    pub features: StorageFeatures,
    pub file_system_name: String,
    pub max_component_length: u32,
}

/// Answer to a free space query, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskFreeSpace {
    pub free_bytes_available: u64,
    pub total_bytes: u64,
    pub total_free_bytes: u64,
}

/// Alternate data stream entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInformation {
    pub name: String,
    pub length: u64,
}

/// Callbacks invoked by the filesystem driver.
///
/// Each call runs on a driver worker thread and must return before the
/// driver completes the request.
pub trait DriverOperations: Send + Sync {
    // ========================================================================
    // Open / close
    // ========================================================================

    fn create_file(
        &self,
        file_name: &str,
        mode: FileMode,
        options: FileOptions,
        attributes: FileAttributes,
        info: &mut DriverFileInfo,
    ) -> NtStatus;

    /// Last handle to the open instance closed.
    fn cleanup(&self, file_name: &str, info: &mut DriverFileInfo) -> NtStatus;

    /// Open instance released.
    fn close_file(&self, file_name: &str, info: &mut DriverFileInfo) -> NtStatus;

    // ========================================================================
    // Content
    // ========================================================================

    fn read_file(
        &self,
        file_name: &str,
        buffer: &mut [u8],
        offset: u64,
        info: &mut DriverFileInfo,
    ) -> DriverResult<usize>;

    fn write_file(
        &self,
        file_name: &str,
        data: &[u8],
        offset: u64,
        info: &mut DriverFileInfo,
    ) -> DriverResult<usize>;

    fn flush_file_buffers(&self, file_name: &str, info: &mut DriverFileInfo) -> NtStatus;

    fn set_end_of_file(&self, file_name: &str, length: u64, info: &mut DriverFileInfo)
    -> NtStatus;

    fn set_allocation_size(
        &self,
        file_name: &str,
        length: u64,
        info: &mut DriverFileInfo,
    ) -> NtStatus;

    // ========================================================================
    // Metadata
    // ========================================================================

    fn get_file_information(
        &self,
        file_name: &str,
        info: &mut DriverFileInfo,
    ) -> DriverResult<FileInformation>;

    fn find_files(
        &self,
        file_name: &str,
        info: &mut DriverFileInfo,
    ) -> DriverResult<Vec<FileInformation>>;

    fn find_files_with_pattern(
        &self,
        file_name: &str,
        pattern: &str,
        info: &mut DriverFileInfo,
    ) -> DriverResult<Vec<FileInformation>>;

    fn set_file_attributes(
        &self,
        file_name: &str,
        attributes: FileAttributes,
        info: &mut DriverFileInfo,
    ) -> NtStatus;

    fn set_file_time(
        &self,
        file_name: &str,
        creation_time: Option<SystemTime>,
        last_access_time: Option<SystemTime>,
        last_write_time: Option<SystemTime>,
        info: &mut DriverFileInfo,
    ) -> NtStatus;

    // ========================================================================
    // Structure
    // ========================================================================

    /// Check whether the file may be deleted. Removal happens in cleanup.
    fn delete_file(&self, file_name: &str, info: &mut DriverFileInfo) -> NtStatus;

    /// Check whether the directory may be deleted. Removal happens in cleanup.
    fn delete_directory(&self, file_name: &str, info: &mut DriverFileInfo) -> NtStatus;

    fn move_file(
        &self,
        old_name: &str,
        new_name: &str,
        replace: bool,
        info: &mut DriverFileInfo,
    ) -> NtStatus;

    // ========================================================================
    // Locking, security, streams
    // ========================================================================

    fn lock_file(
        &self,
        file_name: &str,
        offset: u64,
        length: u64,
        info: &mut DriverFileInfo,
    ) -> NtStatus;

    fn unlock_file(
        &self,
        file_name: &str,
        offset: u64,
        length: u64,
        info: &mut DriverFileInfo,
    ) -> NtStatus;

    /// Self-relative security descriptor bytes.
    fn get_file_security(&self, file_name: &str, info: &mut DriverFileInfo)
    -> DriverResult<Vec<u8>>;

    fn set_file_security(
        &self,
        file_name: &str,
        descriptor: &[u8],
        info: &mut DriverFileInfo,
    ) -> NtStatus;

    fn find_streams(
        &self,
        file_name: &str,
        info: &mut DriverFileInfo,
    ) -> DriverResult<Vec<StreamInformation>>;

    // ========================================================================
    // Volume
    // ========================================================================

    fn get_disk_free_space(&self, info: &mut DriverFileInfo) -> DriverResult<DiskFreeSpace>;

    fn get_volume_information(
        &self,
        info: &mut DriverFileInfo,
    ) -> DriverResult<VolumeInformation>;

    fn mounted(&self, info: &mut DriverFileInfo) -> NtStatus;

    fn unmounted(&self, info: &mut DriverFileInfo) -> NtStatus;
}
