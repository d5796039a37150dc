//! Storage abstractions:
//! - `FileHandle`: a random-access file with append-only writes and a zero-copy
//!   windowed read protocol (`window` / `release_window`).
//! - `InStream` / `OutStream`: buffered cursors over a `FileHandle` that encode and
//!   decode primitive values, including the compact C32/C64 integer format.
//!
//! Provides two handle implementations: memory-based (`RamFileHandle`) and
//! file-based (`FsFileHandle`).

use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;
use lumen_common::{Result, error::Error, verify_arg};

pub mod compact;
pub mod config;
pub mod file;
pub mod instream;
pub mod outstream;
pub mod ram;
pub mod window;

pub use config::StreamConfig;
pub use file::FsFileHandle;
pub use instream::InStream;
pub use outstream::OutStream;
pub use ram::{RamFile, RamFileHandle};
pub use window::FileWindow;

bitflags! {
    /// Open mode of a [`FileHandle`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u32 {
        /// The handle may be read from, never written to.
        const READ_ONLY = 0x01;
        /// The handle may be written to, never read from.
        const WRITE_ONLY = 0x02;
        /// Writes are appended to existing content instead of replacing it.
        const APPEND = 0x04;
        /// Backing storage is created when none exists.
        const CREATE = 0x08;
    }
}

impl OpenFlags {
    /// Returns `true` if a handle opened with these flags accepts reads.
    pub fn is_readable(&self) -> bool {
        self.contains(OpenFlags::READ_ONLY)
    }

    /// Returns `true` if a handle opened with these flags accepts writes.
    pub fn is_writable(&self) -> bool {
        self.intersects(OpenFlags::WRITE_ONLY | OpenFlags::APPEND)
    }

    /// Checks that the flag combination is meaningful: at least one access mode,
    /// no read/write mix, and `CREATE` only together with a writing mode.
    pub fn validate(&self) -> Result<()> {
        verify_arg!(flags, self.is_readable() || self.is_writable());
        verify_arg!(flags, !(self.is_readable() && self.is_writable()));
        verify_arg!(
            flags,
            !self.contains(OpenFlags::CREATE) || self.is_writable()
        );
        Ok(())
    }
}

/// A conceptual file: a contiguous sequence of committed bytes plus an open mode.
///
/// Writes always append at the current end; there are no random-offset writes.
/// Reads and windows address any committed byte range.
///
/// Offsets are signed so that a negative offset can be passed in and rejected
/// with an `OutOfRange` error rather than being unrepresentable.
///
/// A handle hands out at most one live [`FileWindow`] at a time. The window must be
/// returned via [`release_window`](FileHandle::release_window) before another one
/// is acquired or the handle is closed.
pub trait FileHandle: Send {
    /// Path identity of the handle. In-memory handles opened without a path
    /// report an empty string.
    fn path(&self) -> &str;

    /// Flags the handle was opened with.
    fn flags(&self) -> OpenFlags;

    /// Number of committed bytes. Never includes capacity reserved by `grow`.
    fn length(&self) -> u64;

    /// Copies `dst.len()` bytes starting at `offset` into `dst`.
    ///
    /// # Errors
    ///
    /// * `AccessDenied` if the handle was not opened for reading.
    /// * `OutOfRange` if `offset` is negative or `offset + dst.len()` exceeds
    ///   [`length`](FileHandle::length).
    fn read(&self, dst: &mut [u8], offset: i64) -> Result<()>;

    /// Appends `src` at the end of the file. On success the committed length grows
    /// by `src.len()`; on failure nothing is committed.
    ///
    /// # Errors
    ///
    /// * `AccessDenied` if the handle (or its shared backing storage) is read-only.
    fn write(&mut self, src: &[u8]) -> Result<()>;

    /// Points `window` at `len` bytes starting at `offset`. Backends that can expose
    /// their memory directly do so without copying.
    ///
    /// # Errors
    ///
    /// * `OutOfRange` if `offset` is negative or `offset + len` exceeds the length.
    /// * `InvalidOperation` if a window from this handle is already live.
    fn window(&mut self, window: &mut FileWindow, offset: i64, len: usize) -> Result<()>;

    /// Releases a window previously acquired from this handle and resets it to the
    /// empty state. Releasing an empty window is a successful no-op.
    ///
    /// # Errors
    ///
    /// * `InvalidOperation` if `window` was filled by a different handle. The window
    ///   and both handles are left unchanged.
    fn release_window(&mut self, window: &mut FileWindow) -> Result<()>;

    /// Ensures the backing storage can hold at least `min_len` bytes without
    /// reallocating. Never shrinks and never changes the committed length.
    fn grow(&mut self, min_len: u64) -> Result<()>;

    /// Flushes pending state and releases the backing storage.
    /// Closing an already closed handle is a successful no-op.
    fn close(&mut self) -> Result<()>;

    /// Returns `true` once [`close`](FileHandle::close) has succeeded.
    fn is_closed(&self) -> bool;
}

impl<T> FileHandle for Box<T>
where
    T: FileHandle + ?Sized,
{
    fn path(&self) -> &str {
        self.as_ref().path()
    }

    fn flags(&self) -> OpenFlags {
        self.as_ref().flags()
    }

    fn length(&self) -> u64 {
        self.as_ref().length()
    }

    fn read(&self, dst: &mut [u8], offset: i64) -> Result<()> {
        self.as_ref().read(dst, offset)
    }

    fn write(&mut self, src: &[u8]) -> Result<()> {
        self.as_mut().write(src)
    }

    fn window(&mut self, window: &mut FileWindow, offset: i64, len: usize) -> Result<()> {
        self.as_mut().window(window, offset, len)
    }

    fn release_window(&mut self, window: &mut FileWindow) -> Result<()> {
        self.as_mut().release_window(window)
    }

    fn grow(&mut self, min_len: u64) -> Result<()> {
        self.as_mut().grow(min_len)
    }

    fn close(&mut self) -> Result<()> {
        self.as_mut().close()
    }

    fn is_closed(&self) -> bool {
        self.as_ref().is_closed()
    }
}

/// Allocates a process-unique handle id, used to tag the windows a handle fills.
/// Zero is never returned.
pub(crate) fn next_handle_id() -> u64 {
    static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);
    NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Validates a byte range against a file length and returns its start as `u64`.
///
/// Fails with `OutOfRange` when `offset` is negative or the range ends past
/// `file_len`.
pub fn check_range(offset: i64, len: usize, file_len: u64) -> Result<u64> {
    if offset < 0 {
        return Err(Error::out_of_range(offset, len as u64, file_len));
    }
    let start = offset as u64;
    match start.checked_add(len as u64) {
        Some(end) if end <= file_len => Ok(start),
        _ => Err(Error::out_of_range(offset, len as u64, file_len)),
    }
}
