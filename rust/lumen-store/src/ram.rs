use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use lumen_common::{Result, error::Error};

use crate::{FileHandle, FileWindow, OpenFlags, check_range, next_handle_id};

/// In-memory backing storage for [`RamFileHandle`].
///
/// Cloning a `RamFile` yields another reference to the same logical file: handles
/// opened against clones observe each other's committed bytes. The bytes are kept
/// behind an `Arc` so that windows can view them without copying; a write while a
/// window is outstanding copies the buffer first, leaving the window intact.
#[derive(Clone, Default)]
pub struct RamFile(Arc<RwLock<RamFileState>>);

#[derive(Default)]
struct RamFileState {
    contents: Arc<Vec<u8>>,
    read_only: bool,
}

impl RamFile {
    /// Creates a new in-memory file with optional initial contents.
    pub fn new(contents: Option<Vec<u8>>, read_only: bool) -> RamFile {
        RamFile(Arc::new(RwLock::new(RamFileState {
            contents: Arc::new(contents.unwrap_or_default()),
            read_only,
        })))
    }

    /// Number of bytes stored in the file.
    pub fn len(&self) -> u64 {
        self.state().contents.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of bytes the file can hold before its buffer reallocates.
    pub fn capacity(&self) -> usize {
        self.state().contents.capacity()
    }

    /// Copy of the current contents.
    pub fn contents(&self) -> Vec<u8> {
        self.state().contents.as_ref().clone()
    }

    pub fn is_read_only(&self) -> bool {
        self.state().read_only
    }

    /// Marks the file read-only (or writable again). While set, every write through
    /// any handle fails with `AccessDenied`.
    pub fn set_read_only(&self, read_only: bool) {
        self.state_mut().read_only = read_only;
    }

    fn state(&self) -> RwLockReadGuard<'_, RamFileState> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, RamFileState> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn append(&self, path: &str, buf: &[u8]) -> Result<u64> {
        let mut state = self.state_mut();
        if state.read_only {
            return Err(Error::access_denied("write to read-only file", path));
        }
        let contents = Arc::make_mut(&mut state.contents);
        contents.extend_from_slice(buf);
        Ok(contents.len() as u64)
    }

    fn reserve(&self, min_len: usize) {
        let mut state = self.state_mut();
        if state.contents.capacity() < min_len {
            let contents = Arc::make_mut(&mut state.contents);
            let additional = min_len - contents.len();
            contents.reserve(additional);
        }
    }

    fn snapshot(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.state().contents)
    }
}

impl std::fmt::Debug for RamFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("RamFile")
            .field("len", &state.contents.len())
            .field("read_only", &state.read_only)
            .finish()
    }
}

/// A [`FileHandle`] over a [`RamFile`].
///
/// This is the reference backend: it has no filesystem path and is fully
/// deterministic, which makes it the handle of choice for tests.
pub struct RamFileHandle {
    id: u64,
    path: String,
    flags: OpenFlags,
    file: RamFile,
    window_live: bool,
    closed: bool,
}

impl RamFileHandle {
    /// Opens a handle over `file`, or over a fresh empty file when `file` is `None`
    /// and `flags` contain `CREATE`.
    ///
    /// Opening with `READ_ONLY` marks the shared `RamFile` read-only as well.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the flags are inconsistent, or if neither a file nor the
    /// `CREATE` flag was supplied.
    pub fn open(path: Option<&str>, flags: OpenFlags, file: Option<RamFile>) -> Result<RamFileHandle> {
        flags.validate()?;
        let file = match file {
            Some(file) => file,
            None if flags.contains(OpenFlags::CREATE) => RamFile::default(),
            None => {
                return Err(Error::invalid_arg(
                    "file",
                    "must supply either a RamFile or the CREATE flag",
                ));
            }
        };
        if flags.is_readable() {
            file.set_read_only(true);
        }
        let path = path.unwrap_or_default().to_string();
        log::debug!(
            "opened in-memory handle '{path}' ({flags:?}), length {}",
            file.len()
        );
        Ok(RamFileHandle {
            id: next_handle_id(),
            path,
            flags,
            file,
            window_live: false,
            closed: false,
        })
    }

    /// The backing storage of this handle.
    pub fn file(&self) -> &RamFile {
        &self.file
    }

    fn verify_open(&self, operation: &str) -> Result<()> {
        if self.closed {
            Err(Error::invalid_operation(format!("{operation} on closed handle")))
        } else {
            Ok(())
        }
    }

    fn verify_readable(&self) -> Result<()> {
        if self.flags.is_readable() {
            Ok(())
        } else {
            Err(Error::access_denied("read from write-only handle", &self.path))
        }
    }
}

impl FileHandle for RamFileHandle {
    fn path(&self) -> &str {
        &self.path
    }

    fn flags(&self) -> OpenFlags {
        self.flags
    }

    fn length(&self) -> u64 {
        self.file.len()
    }

    fn read(&self, dst: &mut [u8], offset: i64) -> Result<()> {
        self.verify_open("read")?;
        self.verify_readable()?;
        let contents = self.file.snapshot();
        let start = check_range(offset, dst.len(), contents.len() as u64)? as usize;
        dst.copy_from_slice(&contents[start..start + dst.len()]);
        Ok(())
    }

    fn write(&mut self, src: &[u8]) -> Result<()> {
        self.verify_open("write")?;
        if !self.flags.is_writable() {
            return Err(Error::access_denied("write to read-only handle", &self.path));
        }
        self.file.append(&self.path, src)?;
        Ok(())
    }

    fn window(&mut self, window: &mut FileWindow, offset: i64, len: usize) -> Result<()> {
        self.verify_open("window")?;
        self.verify_readable()?;
        if self.window_live || !window.is_empty() {
            return Err(Error::invalid_operation(
                "window requested while another window is live",
            ));
        }
        let contents = self.file.snapshot();
        let start = check_range(offset, len, contents.len() as u64)?;
        window.set(self.id, contents, start as usize, start, len);
        self.window_live = true;
        Ok(())
    }

    fn release_window(&mut self, window: &mut FileWindow) -> Result<()> {
        match window.owner() {
            None => Ok(()),
            Some(owner) if owner == self.id => {
                window.reset();
                self.window_live = false;
                Ok(())
            }
            Some(_) => Err(Error::invalid_operation(
                "release of a window owned by another handle",
            )),
        }
    }

    fn grow(&mut self, min_len: u64) -> Result<()> {
        self.verify_open("grow")?;
        let min_len = usize::try_from(min_len)
            .map_err(|_| Error::invalid_arg("min_len", "exceeds addressable memory"))?;
        self.file.reserve(min_len);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.window_live {
            return Err(Error::invalid_operation("close while a window is live"));
        }
        self.closed = true;
        log::debug!("closed in-memory handle '{}'", self.path);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
