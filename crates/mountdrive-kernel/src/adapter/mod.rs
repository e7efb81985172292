//! Driver adapter.
//!
//! Translates [`DriverOperations`] callbacks into [`StorageOps`] calls on
//! whichever backend was chosen at mount time, and maps the outcomes back
//! to [`NtStatus`] codes.
//!
//! ```text
//! driver callback ──► DriverAdapter ──► Arc<dyn StorageOps>
//!                       │                 (MemoryStorage, ...)
//!                       └── HandleRefTable (path → owning pids)
//! ```
//!
//! Backend calls run under `catch_unwind`: a panic or a
//! [`StorageError::Fault`](mountdrive_contract::StorageError::Fault) fails
//! the one request with `STATUS_IO_DEVICE_ERROR` and leaves the mount up.

mod driver;
mod handles;
mod status;

pub use driver::{
    DiskFreeSpace, DriverFileInfo, DriverOperations, DriverResult, StreamInformation,
    VolumeInformation,
};
pub use handles::HandleRefTable;
pub use status::NtStatus;

use mountdrive_contract::{
    EntryType, FileAttributes, FileInformation, FileMode, FileOptions, PathHierarchy, RequestMeta,
    StorageOps, StorageResult, WriteOffset,
};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, info};

/// Serves driver callbacks from a storage backend.
pub struct DriverAdapter {
    storage: Arc<dyn StorageOps>,
    handles: HandleRefTable,
}

impl std::fmt::Debug for DriverAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverAdapter")
            .field("storage", &self.storage.file_system_name())
            .field("open_paths", &self.handles.len())
            .finish()
    }
}

impl DriverAdapter {
    pub fn new(storage: Arc<dyn StorageOps>) -> Self {
        Self {
            storage,
            handles: HandleRefTable::new(),
        }
    }

    pub fn storage(&self) -> &Arc<dyn StorageOps> {
        &self.storage
    }

    pub fn handles(&self) -> &HandleRefTable {
        &self.handles
    }

    /// Build the request envelope for a driver path.
    fn request(file_name: &str, info: &DriverFileInfo) -> RequestMeta {
        let path = PathHierarchy::parse(file_name);
        let entry_type = if info.is_directory {
            EntryType::Directory
        } else if path.is_root() {
            EntryType::Device
        } else {
            EntryType::File
        };
        RequestMeta::new(path, entry_type).with_handle(info.context)
    }

    /// Run a backend call, converting errors, faults and panics to status.
    fn call<T>(
        &self,
        op: &'static str,
        path: &PathHierarchy,
        f: impl FnOnce(&dyn StorageOps) -> StorageResult<T>,
    ) -> DriverResult<T> {
        match catch_unwind(AssertUnwindSafe(|| f(&*self.storage))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                if err.is_fault() {
                    error!(op, path = %path, error = %err, "storage fault");
                }
                Err(NtStatus::from_error(&err))
            }
            Err(panic) => {
                error!(op, path = %path, panic = panic_message(&*panic), "storage panicked");
                Err(NtStatus::IO_DEVICE_ERROR)
            }
        }
    }

    fn finish(op: &'static str, path: &PathHierarchy, pid: u32, result: DriverResult<()>) -> NtStatus {
        let status = result.err().unwrap_or(NtStatus::SUCCESS);
        debug!(op, path = %path, pid, %status);
        status
    }

    fn logged<T>(
        op: &'static str,
        path: &PathHierarchy,
        pid: u32,
        result: DriverResult<T>,
    ) -> DriverResult<T> {
        let status = result.as_ref().err().copied().unwrap_or(NtStatus::SUCCESS);
        debug!(op, path = %path, pid, %status);
        result
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}

impl DriverOperations for DriverAdapter {
    fn create_file(
        &self,
        file_name: &str,
        mode: FileMode,
        options: FileOptions,
        attributes: FileAttributes,
        info: &mut DriverFileInfo,
    ) -> NtStatus {
        let meta = Self::request(file_name, info);
        let pid = info.process_id;
        if meta.path.is_root() {
            info.is_directory = true;
            return Self::finish("create_file", &meta.path, pid, Ok(()));
        }

        let result = self.call("create_file", &meta.path, |storage| {
            storage.create_file(&meta, mode, options, attributes)
        });
        let status = match result {
            Ok(opened) => {
                info.context = opened.handle;
                self.handles.open(&meta.path.to_string(), pid);
                let reused = !opened.created
                    && matches!(mode, FileMode::OpenOrCreate | FileMode::Create);
                if reused {
                    NtStatus::OBJECT_NAME_COLLISION
                } else {
                    NtStatus::SUCCESS
                }
            }
            Err(NtStatus::FILE_IS_A_DIRECTORY) if !info.is_directory => {
                info.is_directory = true;
                self.handles.open(&meta.path.to_string(), pid);
                NtStatus::SUCCESS
            }
            Err(status) => status,
        };
        debug!(op = "create_file", path = %meta.path, pid, %mode, %status);
        status
    }

    fn cleanup(&self, file_name: &str, info: &mut DriverFileInfo) -> NtStatus {
        let meta = Self::request(file_name, info);
        if meta.path.is_root() {
            return Self::finish("cleanup", &meta.path, info.process_id, Ok(()));
        }
        let delete_on_close = info.delete_on_close;
        let result = self.call("cleanup", &meta.path, |storage| {
            storage.cleanup(&meta, delete_on_close);
            Ok(())
        });
        Self::finish("cleanup", &meta.path, info.process_id, result)
    }

    fn close_file(&self, file_name: &str, info: &mut DriverFileInfo) -> NtStatus {
        let meta = Self::request(file_name, info);
        info.context = None;
        if meta.path.is_root() {
            return Self::finish("close_file", &meta.path, info.process_id, Ok(()));
        }

        let result = if self.handles.close(&meta.path.to_string(), info.process_id) {
            self.call("close_file", &meta.path, |storage| {
                storage.close_file(&meta);
                Ok(())
            })
        } else {
            Ok(())
        };
        Self::finish("close_file", &meta.path, info.process_id, result)
    }

    fn read_file(
        &self,
        file_name: &str,
        buffer: &mut [u8],
        offset: u64,
        info: &mut DriverFileInfo,
    ) -> DriverResult<usize> {
        let meta = Self::request(file_name, info);
        let result = self.call("read_file", &meta.path, |storage| {
            storage.read_file(&meta, buffer, offset)
        });
        Self::logged("read_file", &meta.path, info.process_id, result)
    }

    fn write_file(
        &self,
        file_name: &str,
        data: &[u8],
        offset: u64,
        info: &mut DriverFileInfo,
    ) -> DriverResult<usize> {
        let meta = Self::request(file_name, info);
        let offset = if info.write_to_end_of_file {
            WriteOffset::End
        } else {
            WriteOffset::At(offset)
        };
        let result = self.call("write_file", &meta.path, |storage| {
            storage.write_file(&meta, data, offset)
        });
        Self::logged("write_file", &meta.path, info.process_id, result)
    }

    fn flush_file_buffers(&self, file_name: &str, info: &mut DriverFileInfo) -> NtStatus {
        let meta = Self::request(file_name, info);
        let result = if meta.path.is_root() {
            Ok(())
        } else {
            self.call("flush_file_buffers", &meta.path, |storage| {
                storage.flush_file_buffers(&meta)
            })
        };
        Self::finish("flush_file_buffers", &meta.path, info.process_id, result)
    }

    fn set_end_of_file(
        &self,
        file_name: &str,
        length: u64,
        info: &mut DriverFileInfo,
    ) -> NtStatus {
        let meta = Self::request(file_name, info);
        let result = self.call("set_end_of_file", &meta.path, |storage| {
            storage.set_file_size(&meta, length)
        });
        Self::finish("set_end_of_file", &meta.path, info.process_id, result)
    }

    fn set_allocation_size(
        &self,
        file_name: &str,
        length: u64,
        info: &mut DriverFileInfo,
    ) -> NtStatus {
        self.set_end_of_file(file_name, length, info)
    }

    fn get_file_information(
        &self,
        file_name: &str,
        info: &mut DriverFileInfo,
    ) -> DriverResult<FileInformation> {
        let meta = Self::request(file_name, info);
        let result = self.call("get_file_information", &meta.path, |storage| {
            storage.get_file_info(&meta)
        });
        Self::logged("get_file_information", &meta.path, info.process_id, result)
    }

    fn find_files(
        &self,
        file_name: &str,
        info: &mut DriverFileInfo,
    ) -> DriverResult<Vec<FileInformation>> {
        let meta = Self::request(file_name, info);
        let result = self.call("find_files", &meta.path, |storage| {
            storage.get_file_list(&meta)
        });
        Self::logged("find_files", &meta.path, info.process_id, result)
    }

    fn find_files_with_pattern(
        &self,
        file_name: &str,
        _pattern: &str,
        _info: &mut DriverFileInfo,
    ) -> DriverResult<Vec<FileInformation>> {
        debug!(op = "find_files_with_pattern", path = file_name, "not implemented");
        Err(NtStatus::NOT_IMPLEMENTED)
    }

    fn set_file_attributes(
        &self,
        file_name: &str,
        attributes: FileAttributes,
        info: &mut DriverFileInfo,
    ) -> NtStatus {
        let meta = Self::request(file_name, info);
        let result = if meta.path.is_root() {
            Ok(())
        } else {
            self.call("set_file_attributes", &meta.path, |storage| {
                storage.set_file_attributes(&meta, attributes)
            })
        };
        Self::finish("set_file_attributes", &meta.path, info.process_id, result)
    }

    fn set_file_time(
        &self,
        _file_name: &str,
        _creation_time: Option<SystemTime>,
        _last_access_time: Option<SystemTime>,
        _last_write_time: Option<SystemTime>,
        _info: &mut DriverFileInfo,
    ) -> NtStatus {
        NtStatus::SUCCESS
    }

    fn delete_file(&self, file_name: &str, info: &mut DriverFileInfo) -> NtStatus {
        let meta = Self::request(file_name, info);
        let result = if meta.path.is_root() {
            Err(NtStatus::ACCESS_DENIED)
        } else {
            self.call("delete_file", &meta.path, |storage| {
                storage.can_delete_file(&meta)
            })
        };
        Self::finish("delete_file", &meta.path, info.process_id, result)
    }

    fn delete_directory(&self, file_name: &str, info: &mut DriverFileInfo) -> NtStatus {
        let meta = Self::request(file_name, info);
        let result = if meta.path.is_root() {
            Err(NtStatus::ACCESS_DENIED)
        } else {
            self.call("delete_directory", &meta.path, |storage| {
                storage.can_delete_directory(&meta)
            })
        };
        Self::finish("delete_directory", &meta.path, info.process_id, result)
    }

    fn move_file(
        &self,
        old_name: &str,
        new_name: &str,
        replace: bool,
        info: &mut DriverFileInfo,
    ) -> NtStatus {
        let from = Self::request(old_name, info);
        let to = RequestMeta::new(PathHierarchy::parse(new_name), from.entry_type);
        if from.path.is_root() || to.path.is_root() {
            let denied = Err(NtStatus::ACCESS_DENIED);
            return Self::finish("move_file", &from.path, info.process_id, denied);
        }

        let result = self.call("move_file", &from.path, |storage| {
            storage.move_file(&from, &to, replace)
        });
        if result.is_ok() {
            self.handles
                .rename(&from.path.to_string(), &to.path.to_string());
        }
        Self::finish("move_file", &from.path, info.process_id, result)
    }

    fn lock_file(
        &self,
        _file_name: &str,
        _offset: u64,
        _length: u64,
        _info: &mut DriverFileInfo,
    ) -> NtStatus {
        NtStatus::NOT_IMPLEMENTED
    }

    fn unlock_file(
        &self,
        _file_name: &str,
        _offset: u64,
        _length: u64,
        _info: &mut DriverFileInfo,
    ) -> NtStatus {
        NtStatus::NOT_IMPLEMENTED
    }

    fn get_file_security(
        &self,
        _file_name: &str,
        _info: &mut DriverFileInfo,
    ) -> DriverResult<Vec<u8>> {
        Err(NtStatus::NOT_IMPLEMENTED)
    }

    fn set_file_security(
        &self,
        _file_name: &str,
        _descriptor: &[u8],
        _info: &mut DriverFileInfo,
    ) -> NtStatus {
        NtStatus::SUCCESS
    }

    fn find_streams(
        &self,
        _file_name: &str,
        _info: &mut DriverFileInfo,
    ) -> DriverResult<Vec<StreamInformation>> {
        Err(NtStatus::NOT_IMPLEMENTED)
    }

    fn get_disk_free_space(&self, info: &mut DriverFileInfo) -> DriverResult<DiskFreeSpace> {
        let root = PathHierarchy::root();
        let result = self.call("get_disk_free_space", &root, |storage| {
            Ok((storage.free_space(), storage.total_space()))
        });
        Self::logged("get_disk_free_space", &root, info.process_id, result).map(|(free, total)| {
            DiskFreeSpace {
                free_bytes_available: free,
                total_bytes: total,
                total_free_bytes: free,
            }
        })
    }

    fn get_volume_information(
        &self,
        info: &mut DriverFileInfo,
    ) -> DriverResult<VolumeInformation> {
        let root = PathHierarchy::root();
        let result = self.call("get_volume_information", &root, |storage| {
            Ok(VolumeInformation {
                volume_label: storage.volume_label().to_string(),
                features: storage.features(),
                file_system_name: storage.file_system_name().to_string(),
                max_component_length: storage.max_component_length(),
            })
        });
        Self::logged("get_volume_information", &root, info.process_id, result)
    }

    fn mounted(&self, _info: &mut DriverFileInfo) -> NtStatus {
        info!(file_system = self.storage.file_system_name(), "volume mounted");
        NtStatus::SUCCESS
    }

    fn unmounted(&self, _info: &mut DriverFileInfo) -> NtStatus {
        info!(file_system = self.storage.file_system_name(), "volume unmounted");
        NtStatus::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;

    fn adapter() -> DriverAdapter {
        DriverAdapter::new(Arc::new(MemoryStorage::new()))
    }

    fn create(adapter: &DriverAdapter, path: &str, mode: FileMode, info: &mut DriverFileInfo) -> NtStatus {
        adapter.create_file(path, mode, FileOptions::empty(), FileAttributes::NORMAL, info)
    }

    #[test]
    fn test_request_entry_type() {
        let file = DriverAdapter::request("\\docs\\a.txt", &DriverFileInfo::new(1));
        assert_eq!(file.entry_type, EntryType::File);
        assert_eq!(file.path, PathHierarchy::from(["docs", "a.txt"]));

        let root = DriverAdapter::request("\\", &DriverFileInfo::new(1));
        assert_eq!(root.entry_type, EntryType::Device);
        assert!(root.path.is_root());

        let dir = DriverAdapter::request("\\\\docs\\", &DriverFileInfo::directory(1));
        assert_eq!(dir.entry_type, EntryType::Directory);
        assert_eq!(dir.path, PathHierarchy::from(["docs"]));
    }

    #[test]
    fn test_root_create_marks_directory() {
        let adapter = adapter();
        let mut info = DriverFileInfo::new(1);
        assert_eq!(create(&adapter, "\\", FileMode::Open, &mut info), NtStatus::SUCCESS);
        assert!(info.is_directory);
        assert!(adapter.handles().is_empty());
    }

    #[test]
    fn test_open_or_create_collision() {
        let adapter = adapter();
        let mut info = DriverFileInfo::new(1);
        assert_eq!(
            create(&adapter, "\\a.txt", FileMode::OpenOrCreate, &mut info),
            NtStatus::SUCCESS
        );
        assert!(info.context.is_some());

        let mut again = DriverFileInfo::new(2);
        assert_eq!(
            create(&adapter, "\\a.txt", FileMode::OpenOrCreate, &mut again),
            NtStatus::OBJECT_NAME_COLLISION
        );
        assert!(again.context.is_some());
        assert_eq!(adapter.handles().owner_count("\\a.txt"), 2);
    }

    #[test]
    fn test_directory_without_hint() {
        let adapter = adapter();
        let mut dir = DriverFileInfo::directory(1);
        assert_eq!(create(&adapter, "\\docs", FileMode::CreateNew, &mut dir), NtStatus::SUCCESS);

        let mut info = DriverFileInfo::new(1);
        assert_eq!(create(&adapter, "\\docs", FileMode::Open, &mut info), NtStatus::SUCCESS);
        assert!(info.is_directory);
        assert!(info.context.is_none());
    }

    #[test]
    fn test_failed_open_not_registered() {
        let adapter = adapter();
        let mut info = DriverFileInfo::new(1);
        assert_eq!(
            create(&adapter, "\\missing", FileMode::Open, &mut info),
            NtStatus::OBJECT_NAME_NOT_FOUND
        );
        assert!(adapter.handles().is_empty());
    }

    #[test]
    fn test_unsupported_operations() {
        let adapter = adapter();
        let mut info = DriverFileInfo::new(1);
        assert_eq!(adapter.lock_file("\\a", 0, 1, &mut info), NtStatus::NOT_IMPLEMENTED);
        assert_eq!(adapter.unlock_file("\\a", 0, 1, &mut info), NtStatus::NOT_IMPLEMENTED);
        assert_eq!(
            adapter.get_file_security("\\a", &mut info),
            Err(NtStatus::NOT_IMPLEMENTED)
        );
        assert_eq!(adapter.find_streams("\\a", &mut info), Err(NtStatus::NOT_IMPLEMENTED));
        assert_eq!(
            adapter.find_files_with_pattern("\\", "*", &mut info),
            Err(NtStatus::NOT_IMPLEMENTED)
        );
        assert_eq!(adapter.set_file_security("\\a", &[], &mut info), NtStatus::SUCCESS);
        assert_eq!(
            adapter.set_file_time("\\a", None, None, None, &mut info),
            NtStatus::SUCCESS
        );
        assert_eq!(adapter.mounted(&mut info), NtStatus::SUCCESS);
        assert_eq!(adapter.unmounted(&mut info), NtStatus::SUCCESS);
    }

    #[test]
    fn test_root_is_protected() {
        let adapter = adapter();
        let mut info = DriverFileInfo::new(1);
        assert_eq!(adapter.delete_directory("\\", &mut info), NtStatus::ACCESS_DENIED);
        assert_eq!(adapter.delete_file("\\", &mut info), NtStatus::ACCESS_DENIED);
        assert_eq!(adapter.move_file("\\", "\\x", false, &mut info), NtStatus::ACCESS_DENIED);
        assert_eq!(adapter.flush_file_buffers("\\", &mut info), NtStatus::SUCCESS);
        assert_eq!(
            adapter.set_file_attributes("\\", FileAttributes::HIDDEN, &mut info),
            NtStatus::SUCCESS
        );
        assert!(adapter.find_files("\\", &mut info).unwrap().is_empty());
    }

    #[test]
    fn test_free_space_triple() {
        let adapter = adapter();
        let mut info = DriverFileInfo::new(1);
        create(&adapter, "\\a", FileMode::Create, &mut info);
        adapter.write_file("\\a", b"12345", 0, &mut info).unwrap();

        let space = adapter.get_disk_free_space(&mut info).unwrap();
        assert_eq!(space.total_bytes - space.free_bytes_available, 5);
        assert_eq!(space.total_free_bytes, space.free_bytes_available);
    }

    #[test]
    fn test_volume_information() {
        let adapter = adapter();
        let volume = adapter
            .get_volume_information(&mut DriverFileInfo::new(1))
            .unwrap();
        assert_eq!(volume.volume_label, "memStorage");
        assert_eq!(volume.file_system_name, "MemoryStorage");
        assert_eq!(volume.max_component_length, 255);
    }

    #[test]
    fn test_write_to_end_of_file() {
        let adapter = adapter();
        let mut info = DriverFileInfo::new(1);
        create(&adapter, "\\log", FileMode::Create, &mut info);
        adapter.write_file("\\log", b"abc", 0, &mut info).unwrap();

        info.write_to_end_of_file = true;
        adapter.write_file("\\log", b"def", 0, &mut info).unwrap();

        let mut buf = [0u8; 6];
        assert_eq!(adapter.read_file("\\log", &mut buf, 0, &mut info), Ok(6));
        assert_eq!(&buf, b"abcdef");
    }

    #[test]
    fn test_allocation_size_delegates() {
        let adapter = adapter();
        let mut info = DriverFileInfo::new(1);
        create(&adapter, "\\f", FileMode::Create, &mut info);
        assert_eq!(adapter.set_allocation_size("\\f", 3, &mut info), NtStatus::SUCCESS);
        assert_eq!(adapter.get_file_information("\\f", &mut info).unwrap().length, 3);
    }

    #[test]
    fn test_panic_message() {
        let text: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*text), "boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*owned), "bang");
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*other), "<non-string panic>");
    }
}
