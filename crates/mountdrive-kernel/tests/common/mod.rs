//! Shared integration test setup.

#![allow(dead_code)]

use mountdrive_contract::{
    FileAttributes, FileInformation, FileMode, FileOptions, OpenedFile, PathHierarchy,
    RequestMeta, StorageError, StorageFeatures, StorageOps, StorageResult, WriteOffset,
};
use mountdrive_kernel::MemoryStorage;
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

/// Route `tracing` output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Open (or create) a file and return a request carrying its handle.
pub fn open_file(store: &dyn StorageOps, components: &[&str], mode: FileMode) -> RequestMeta {
    let meta = RequestMeta::file(PathHierarchy::from_components(
        components.iter().copied(),
    ));
    let opened = store
        .create_file(&meta, mode, FileOptions::empty(), FileAttributes::NORMAL)
        .unwrap();
    meta.with_handle(opened.handle)
}

pub fn make_dir(store: &dyn StorageOps, components: &[&str]) {
    let meta = RequestMeta::directory(PathHierarchy::from_components(
        components.iter().copied(),
    ));
    store
        .create_file(
            &meta,
            FileMode::CreateNew,
            FileOptions::empty(),
            FileAttributes::DIRECTORY,
        )
        .unwrap();
}

pub fn read_all(store: &dyn StorageOps, meta: &RequestMeta) -> Vec<u8> {
    let length = store.get_file_info(meta).unwrap().length as usize;
    let mut buf = vec![0u8; length];
    let n = store.read_file(meta, &mut buf, 0).unwrap();
    buf.truncate(n);
    buf
}

/// How a [`RecordingStorage`] misbehaves on one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Panic,
    Fault,
}

/// Memory-backed storage that records every call it receives and can be
/// told to fail one operation.
#[derive(Debug, Default)]
pub struct RecordingStorage {
    inner: MemoryStorage,
    calls: Mutex<Vec<&'static str>>,
    failure: Mutex<Option<(&'static str, Failure)>>,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, op: &'static str, failure: Failure) {
        *self.failure.lock() = Some((op, failure));
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().iter().filter(|call| **call == op).count()
    }

    fn record(&self, op: &'static str) -> StorageResult<()> {
        self.calls.lock().push(op);
        match *self.failure.lock() {
            Some((target, Failure::Panic)) if target == op => panic!("injected panic in {op}"),
            Some((target, Failure::Fault)) if target == op => {
                Err(StorageError::fault(format!("injected fault in {op}")))
            }
            _ => Ok(()),
        }
    }
}

impl StorageOps for RecordingStorage {
    fn volume_label(&self) -> &str {
        self.inner.volume_label()
    }

    fn features(&self) -> StorageFeatures {
        self.inner.features()
    }

    fn max_component_length(&self) -> u32 {
        self.inner.max_component_length()
    }

    fn file_system_name(&self) -> &str {
        "RecordingStorage"
    }

    fn can_delete_directory(&self, meta: &RequestMeta) -> StorageResult<()> {
        self.record("can_delete_directory")?;
        self.inner.can_delete_directory(meta)
    }

    fn can_delete_file(&self, meta: &RequestMeta) -> StorageResult<()> {
        self.record("can_delete_file")?;
        self.inner.can_delete_file(meta)
    }

    fn create_file(
        &self,
        meta: &RequestMeta,
        mode: FileMode,
        options: FileOptions,
        attributes: FileAttributes,
    ) -> StorageResult<OpenedFile> {
        self.record("create_file")?;
        self.inner.create_file(meta, mode, options, attributes)
    }

    fn close_file(&self, meta: &RequestMeta) {
        let _ = self.record("close_file");
        self.inner.close_file(meta)
    }

    fn cleanup(&self, meta: &RequestMeta, delete_on_close: bool) {
        let _ = self.record("cleanup");
        self.inner.cleanup(meta, delete_on_close)
    }

    fn get_file_list(&self, meta: &RequestMeta) -> StorageResult<Vec<FileInformation>> {
        self.record("get_file_list")?;
        self.inner.get_file_list(meta)
    }

    fn get_file_info(&self, meta: &RequestMeta) -> StorageResult<FileInformation> {
        self.record("get_file_info")?;
        self.inner.get_file_info(meta)
    }

    fn flush_file_buffers(&self, meta: &RequestMeta) -> StorageResult<()> {
        self.record("flush_file_buffers")?;
        self.inner.flush_file_buffers(meta)
    }

    fn free_space(&self) -> u64 {
        let _ = self.record("free_space");
        self.inner.free_space()
    }

    fn total_space(&self) -> u64 {
        let _ = self.record("total_space");
        self.inner.total_space()
    }

    fn move_file(&self, from: &RequestMeta, to: &RequestMeta, replace: bool) -> StorageResult<()> {
        self.record("move_file")?;
        self.inner.move_file(from, to, replace)
    }

    fn read_file(&self, meta: &RequestMeta, buffer: &mut [u8], offset: u64) -> StorageResult<usize> {
        self.record("read_file")?;
        self.inner.read_file(meta, buffer, offset)
    }

    fn write_file(&self, meta: &RequestMeta, data: &[u8], offset: WriteOffset) -> StorageResult<usize> {
        self.record("write_file")?;
        self.inner.write_file(meta, data, offset)
    }

    fn set_file_size(&self, meta: &RequestMeta, length: u64) -> StorageResult<()> {
        self.record("set_file_size")?;
        self.inner.set_file_size(meta, length)
    }

    fn set_file_attributes(&self, meta: &RequestMeta, attributes: FileAttributes) -> StorageResult<()> {
        self.record("set_file_attributes")?;
        self.inner.set_file_attributes(meta, attributes)
    }
}
