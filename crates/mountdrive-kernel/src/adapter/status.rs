//! Driver status codes.

use mountdrive_contract::{OperationResult, StorageError};
use std::fmt;

/// NTSTATUS value returned to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NtStatus(pub u32);

impl NtStatus {
    pub const SUCCESS: NtStatus = NtStatus(0x0000_0000);
    pub const OBJECT_NAME_EXISTS: NtStatus = NtStatus(0x4000_0000);
    pub const NOT_IMPLEMENTED: NtStatus = NtStatus(0xC000_0002);
    pub const ACCESS_DENIED: NtStatus = NtStatus(0xC000_0022);
    pub const OBJECT_NAME_NOT_FOUND: NtStatus = NtStatus(0xC000_0034);
    pub const OBJECT_NAME_COLLISION: NtStatus = NtStatus(0xC000_0035);
    pub const OBJECT_PATH_INVALID: NtStatus = NtStatus(0xC000_0039);
    pub const OBJECT_PATH_NOT_FOUND: NtStatus = NtStatus(0xC000_003A);
    pub const FILE_IS_A_DIRECTORY: NtStatus = NtStatus(0xC000_00BA);
    pub const DIRECTORY_NOT_EMPTY: NtStatus = NtStatus(0xC000_0101);
    pub const NOT_A_DIRECTORY: NtStatus = NtStatus(0xC000_0103);
    pub const IO_DEVICE_ERROR: NtStatus = NtStatus(0xC000_0185);

    pub fn is_success(&self) -> bool {
        *self == NtStatus::SUCCESS
    }

    /// Status for a backend error. Faults have no outcome code and surface
    /// as a device error.
    pub fn from_error(err: &StorageError) -> NtStatus {
        err.result()
            .map(NtStatus::from)
            .unwrap_or(NtStatus::IO_DEVICE_ERROR)
    }
}

impl From<OperationResult> for NtStatus {
    fn from(result: OperationResult) -> Self {
        match result {
            OperationResult::Success => NtStatus::SUCCESS,
            OperationResult::AlreadyExists => NtStatus::OBJECT_NAME_EXISTS,
            OperationResult::FileNotFound => NtStatus::OBJECT_NAME_NOT_FOUND,
            OperationResult::ObjectNameCollision => NtStatus::OBJECT_NAME_COLLISION,
            OperationResult::PathNotFound => NtStatus::OBJECT_PATH_INVALID,
            OperationResult::DirectoryNotFound => NtStatus::OBJECT_PATH_NOT_FOUND,
            OperationResult::IsDirectoryNotFile => NtStatus::FILE_IS_A_DIRECTORY,
            OperationResult::DirectoryNotEmpty => NtStatus::DIRECTORY_NOT_EMPTY,
            OperationResult::NotADirectory => NtStatus::NOT_A_DIRECTORY,
        }
    }
}

impl fmt::Display for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}", self.0)
    }
}
