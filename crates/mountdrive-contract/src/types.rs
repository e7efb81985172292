//! Core contract types.
//!
//! Flag values match the driver protocol's numeric encodings so they can be
//! passed through without translation.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use strum::{Display, EnumString};

use crate::path::FileHandle;

bitflags! {
    /// Per-entry attribute flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct FileAttributes: u32 {
        const READONLY = 0x0000_0001;
        const HIDDEN = 0x0000_0002;
        const SYSTEM = 0x0000_0004;
        const DIRECTORY = 0x0000_0010;
        const ARCHIVE = 0x0000_0020;
        const DEVICE = 0x0000_0040;
        const NORMAL = 0x0000_0080;
        const TEMPORARY = 0x0000_0100;
        const SPARSE_FILE = 0x0000_0200;
        const REPARSE_POINT = 0x0000_0400;
        const COMPRESSED = 0x0000_0800;
        const OFFLINE = 0x0000_1000;
        const NOT_CONTENT_INDEXED = 0x0000_2000;
        const ENCRYPTED = 0x0000_4000;
    }
}

impl FileAttributes {
    pub fn is_directory(&self) -> bool {
        self.contains(FileAttributes::DIRECTORY)
    }
}

bitflags! {
    /// Open options passed through from the driver.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct FileOptions: u32 {
        const ENCRYPTED = 0x0000_4000;
        const DELETE_ON_CLOSE = 0x0400_0000;
        const SEQUENTIAL_SCAN = 0x0800_0000;
        const RANDOM_ACCESS = 0x1000_0000;
        const ASYNCHRONOUS = 0x4000_0000;
        const WRITE_THROUGH = 0x8000_0000;
    }
}

bitflags! {
    /// Capability flags a backend advertises in its volume information.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct StorageFeatures: u32 {
        const CASE_SENSITIVE_SEARCH = 0x0000_0001;
        const CASE_PRESERVED_NAMES = 0x0000_0002;
        const UNICODE_ON_DISK = 0x0000_0004;
        const PERSISTENT_ACLS = 0x0000_0008;
        const VOLUME_QUOTAS = 0x0000_0020;
        const SUPPORTS_SPARSE_FILES = 0x0000_0040;
        const SUPPORTS_REPARSE_POINTS = 0x0000_0080;
        const SUPPORTS_REMOTE_STORAGE = 0x0000_0100;
        const VOLUME_IS_COMPRESSED = 0x0000_8000;
        const SUPPORTS_OBJECT_IDS = 0x0001_0000;
        const SUPPORTS_ENCRYPTION = 0x0002_0000;
        const NAMED_STREAMS = 0x0004_0000;
        const READ_ONLY_VOLUME = 0x0008_0000;
        const SEQUENTIAL_WRITE_ONCE = 0x0010_0000;
        const SUPPORTS_TRANSACTIONS = 0x0020_0000;
    }
}

/// How `create_file` treats existing and missing entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum FileMode {
    /// Fail unless the entry exists.
    Open,
    /// Open the entry, creating it when missing.
    OpenOrCreate,
    /// Create the entry, replacing any existing file.
    Create,
    /// Create the entry, failing when it exists.
    CreateNew,
    /// Open an existing file with writes positioned at its end.
    Append,
    /// Open an existing file and discard its content.
    Truncate,
}

/// Where a write lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOffset {
    At(u64),
    End,
}

/// Metadata returned for listings and info queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInformation {
    pub file_name: String,
    pub attributes: FileAttributes,
    pub creation_time: Option<SystemTime>,
    pub last_access_time: Option<SystemTime>,
    pub last_write_time: Option<SystemTime>,
    pub length: u64,
}

impl FileInformation {
    /// Information for a file entry with every timestamp set to now.
    pub fn file(name: impl Into<String>, length: u64) -> Self {
        let now = SystemTime::now();
        Self {
            file_name: name.into(),
            attributes: FileAttributes::NORMAL,
            creation_time: Some(now),
            last_access_time: Some(now),
            last_write_time: Some(now),
            length,
        }
    }

    /// Information for a directory entry with every timestamp set to now.
    pub fn directory(name: impl Into<String>) -> Self {
        let now = SystemTime::now();
        Self {
            file_name: name.into(),
            attributes: FileAttributes::DIRECTORY,
            creation_time: Some(now),
            last_access_time: Some(now),
            last_write_time: Some(now),
            length: 0,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.attributes.is_directory()
    }
}

/// Result of a successful `create_file`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenedFile {
    /// Handle for subsequent calls. Directories carry none.
    pub handle: Option<FileHandle>,
    /// True when nothing occupied the path before the call. An overwrite
    /// reports `false`.
    pub created: bool,
}

impl OpenedFile {
    pub fn created(handle: Option<FileHandle>) -> Self {
        Self {
            handle,
            created: true,
        }
    }

    pub fn opened(handle: Option<FileHandle>) -> Self {
        Self {
            handle,
            created: false,
        }
    }
}
