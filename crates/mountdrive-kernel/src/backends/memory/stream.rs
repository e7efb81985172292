//! Per-file byte stream.
//!
//! Each file node owns one `Stream` behind an `Arc`. Readers and writers
//! clone the `Arc` under the tree lock, release the tree, then take the
//! stream's own mutex, so I/O on different files never contends.

use mountdrive_contract::WriteOffset;
use parking_lot::Mutex;
use std::time::SystemTime;

/// The stream was disposed by a delete or overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Disposed;

/// Why a write or resize failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamError {
    Disposed,
    /// The allocator refused the new length.
    OutOfMemory,
}

#[derive(Debug)]
struct StreamState {
    bytes: Vec<u8>,
    accessed: SystemTime,
    written: SystemTime,
    disposed: bool,
}

/// Snapshot of the stream's metadata.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StreamStat {
    pub len: u64,
    pub accessed: SystemTime,
    pub written: SystemTime,
}

#[derive(Debug)]
pub(crate) struct Stream {
    state: Mutex<StreamState>,
}

impl Stream {
    pub fn new() -> Self {
        let now = SystemTime::now();
        Self {
            state: Mutex::new(StreamState {
                bytes: Vec::new(),
                accessed: now,
                written: now,
                disposed: false,
            }),
        }
    }

    /// Copy bytes starting at `offset` into `buf`.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, Disposed> {
        let mut state = self.state.lock();
        if state.disposed {
            return Err(Disposed);
        }
        state.accessed = SystemTime::now();

        let len = state.bytes.len();
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(len);
        let end = start.saturating_add(buf.len()).min(len);
        let count = end - start;
        buf[..count].copy_from_slice(&state.bytes[start..end]);
        Ok(count)
    }

    /// Write `data`, zero-filling any gap between the current end and the
    /// write position.
    pub fn write_at(&self, data: &[u8], offset: WriteOffset) -> Result<usize, StreamError> {
        let mut state = self.state.lock();
        if state.disposed {
            return Err(StreamError::Disposed);
        }
        if data.is_empty() {
            return Ok(0);
        }

        let start = match offset {
            WriteOffset::At(at) => usize::try_from(at).unwrap_or(usize::MAX),
            WriteOffset::End => state.bytes.len(),
        };
        let end = start.saturating_add(data.len());
        grow_exact(&mut state.bytes, end)?;
        state.bytes[start..end].copy_from_slice(data);

        let now = SystemTime::now();
        state.written = now;
        state.accessed = now;
        Ok(data.len())
    }

    /// Truncate or zero-extend to `len`.
    pub fn set_len(&self, len: usize) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        if state.disposed {
            return Err(StreamError::Disposed);
        }
        if len > state.bytes.len() {
            grow_exact(&mut state.bytes, len)?;
        } else {
            state.bytes.truncate(len);
            state.bytes.shrink_to_fit();
        }
        state.written = SystemTime::now();
        Ok(())
    }

    pub fn stat(&self) -> Result<StreamStat, Disposed> {
        let state = self.state.lock();
        if state.disposed {
            return Err(Disposed);
        }
        Ok(StreamStat {
            len: state.bytes.len() as u64,
            accessed: state.accessed,
            written: state.written,
        })
    }

    /// Bytes allocated for the buffer.
    pub fn capacity(&self) -> u64 {
        self.state.lock().bytes.capacity() as u64
    }

    pub fn touch_written(&self) {
        self.state.lock().written = SystemTime::now();
    }

    /// Release the buffer. Waits for in-flight I/O to drop the lock; later
    /// calls observe [`Disposed`].
    pub fn dispose(&self) {
        let mut state = self.state.lock();
        state.bytes = Vec::new();
        state.disposed = true;
    }

    #[cfg(test)]
    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }
}

/// Grow to `len` without the amortised over-allocation of `resize`, so the
/// capacity tracks the logical length.
fn grow_exact(bytes: &mut Vec<u8>, len: usize) -> Result<(), StreamError> {
    if len > bytes.len() {
        bytes
            .try_reserve_exact(len - bytes.len())
            .map_err(|_| StreamError::OutOfMemory)?;
        bytes.resize(len, 0);
    }
    Ok(())
}
