//! Storage backends.
//!
//! Each backend implements [`StorageOps`](mountdrive_contract::StorageOps)
//! and is chosen once at mount time.

pub mod memory;

pub use memory::MemoryStorage;
