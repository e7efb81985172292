//! # mountdrive-kernel
//!
//! Storage backends and the driver adapter for mountdrive.
//!
//! - [`MemoryStorage`] - volatile hierarchical store implementing
//!   [`StorageOps`](mountdrive_contract::StorageOps)
//! - [`DriverAdapter`] - serves filesystem driver callbacks from any backend
//! - [`MemoryStorageConfig`] - TOML volume settings
//!
//! ```
//! use std::sync::Arc;
//! use mountdrive_contract::{FileAttributes, FileMode, FileOptions};
//! use mountdrive_kernel::{DriverAdapter, DriverFileInfo, DriverOperations, MemoryStorage, NtStatus};
//!
//! let adapter = DriverAdapter::new(Arc::new(MemoryStorage::new()));
//! let mut info = DriverFileInfo::new(42);
//! let status = adapter.create_file(
//!     "\\hello.txt",
//!     FileMode::CreateNew,
//!     FileOptions::empty(),
//!     FileAttributes::NORMAL,
//!     &mut info,
//! );
//! assert_eq!(status, NtStatus::SUCCESS);
//! assert_eq!(adapter.write_file("\\hello.txt", b"hi", 0, &mut info), Ok(2));
//! ```

pub mod adapter;
pub mod backends;
pub mod config;

pub use adapter::{
    DiskFreeSpace, DriverAdapter, DriverFileInfo, DriverOperations, DriverResult, HandleRefTable,
    NtStatus, StreamInformation, VolumeInformation,
};
pub use backends::MemoryStorage;
pub use config::{ConfigError, MemoryStorageConfig};
