//! Storage contract for mountdrive.
//!
//! Everything a storage backend needs to plug into the driver adapter:
//!
//! - [`StorageOps`] - the operation set every backend implements
//! - [`PathHierarchy`] / [`RequestMeta`] - the per-call request envelope
//! - [`OperationResult`] / [`StorageError`] - the closed outcome vocabulary
//! - [`FileInformation`] and the flag sets ([`FileAttributes`],
//!   [`FileOptions`], [`StorageFeatures`])
//!
//! ## Design Decisions
//!
//! - **Synchronous**: the driver dispatches each callback on its own worker
//!   thread, so operations block until complete. There is no event loop.
//! - **Outcomes are values**: not-found, conflict and type-mismatch are
//!   ordinary `Err` values with a fixed [`OperationResult`]. Only
//!   [`StorageError::Fault`] signals something the caller did not expect.
//! - **Typed handles**: backends hand out [`FileHandle`]s carrying a
//!   generation so a handle to a deleted node can never resolve to whatever
//!   reused its slot.

mod error;
mod ops;
mod path;
mod result;
mod types;

pub use error::{StorageError, StorageResult};
pub use ops::StorageOps;
pub use path::{EntryType, FileHandle, PathHierarchy, RequestMeta};
pub use result::{FailureClass, OperationResult};
pub use types::{
    FileAttributes, FileInformation, FileMode, FileOptions, OpenedFile, StorageFeatures,
    WriteOffset,
};
