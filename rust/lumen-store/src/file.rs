use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::Arc,
};

use lumen_common::{Result, error::Error};

use crate::{FileHandle, FileWindow, OpenFlags, check_range, next_handle_id};

/// A [`FileHandle`] backed by an operating-system file.
///
/// Reads are positional and never move a shared cursor. Writes are appended at the
/// handle's committed length. Windows are filled with a private copy of the range.
pub struct FsFileHandle {
    id: u64,
    path: String,
    flags: OpenFlags,
    file: Option<File>,
    len: u64,
    window_live: bool,
}

impl FsFileHandle {
    /// Opens `path` with the given flags.
    ///
    /// `CREATE` creates the file when missing. `WRITE_ONLY` without `APPEND`
    /// truncates existing content.
    pub fn open<P: AsRef<Path>>(path: P, flags: OpenFlags) -> Result<FsFileHandle> {
        flags.validate()?;
        let path = path.as_ref();
        let display = path.to_string_lossy().into_owned();
        let file = OpenOptions::new()
            .read(flags.is_readable())
            .write(flags.is_writable())
            .create(flags.contains(OpenFlags::CREATE))
            .truncate(flags.contains(OpenFlags::WRITE_ONLY) && !flags.contains(OpenFlags::APPEND))
            .open(path)
            .map_err(|e| Error::io(format!("open {display}"), e))?;
        let len = file
            .metadata()
            .map_err(|e| Error::io(format!("stat {display}"), e))?
            .len();
        log::debug!("opened file handle '{display}' ({flags:?}), length {len}");
        Ok(FsFileHandle {
            id: next_handle_id(),
            path: display,
            flags,
            file: Some(file),
            len,
            window_live: false,
        })
    }

    fn get_file(&self, operation: &str) -> Result<&File> {
        self.file
            .as_ref()
            .ok_or_else(|| Error::invalid_operation(format!("{operation} on closed handle")))
    }

    fn verify_readable(&self) -> Result<()> {
        if self.flags.is_readable() {
            Ok(())
        } else {
            Err(Error::access_denied("read from write-only handle", &self.path))
        }
    }
}

impl FileHandle for FsFileHandle {
    fn path(&self) -> &str {
        &self.path
    }

    fn flags(&self) -> OpenFlags {
        self.flags
    }

    fn length(&self) -> u64 {
        self.len
    }

    fn read(&self, dst: &mut [u8], offset: i64) -> Result<()> {
        let file = self.get_file("read")?;
        self.verify_readable()?;
        let pos = check_range(offset, dst.len(), self.len)?;
        positional::read_exact_at(file, dst, pos).map_err(|e| Error::io(&self.path, e))
    }

    fn write(&mut self, src: &[u8]) -> Result<()> {
        let file = self.get_file("write")?;
        if !self.flags.is_writable() {
            return Err(Error::access_denied("write to read-only handle", &self.path));
        }
        positional::write_all_at(file, src, self.len).map_err(|e| Error::io(&self.path, e))?;
        self.len += src.len() as u64;
        Ok(())
    }

    fn window(&mut self, window: &mut FileWindow, offset: i64, len: usize) -> Result<()> {
        let file = self.get_file("window")?;
        self.verify_readable()?;
        if self.window_live || !window.is_empty() {
            return Err(Error::invalid_operation(
                "window requested while another window is live",
            ));
        }
        let pos = check_range(offset, len, self.len)?;
        let mut buf = vec![0u8; len];
        positional::read_exact_at(file, &mut buf, pos).map_err(|e| Error::io(&self.path, e))?;
        window.set(self.id, Arc::new(buf), 0, pos, len);
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

    fn grow(&mut self, _min_len: u64) -> Result<()> {
        self.get_file("grow")?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.window_live {
            return Err(Error::invalid_operation("close while a window is live"));
        }
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };
        if self.flags.is_writable() {
            file.flush().map_err(|e| Error::io(&self.path, e))?;
            file.sync_all().map_err(|e| Error::io(&self.path, e))?;
        }
        log::debug!("closed file handle '{}', length {}", self.path, self.len);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.file.is_none()
    }
}

impl Drop for FsFileHandle {
    fn drop(&mut self) {
        if self.file.is_some() {
            self.window_live = false;
            if let Err(e) = self.close() {
                log::warn!("failed to close '{}' on drop: {e}", self.path);
            }
        }
    }
}

/// Positional IO that leaves the file cursor alone.
#[cfg(unix)]
mod positional {
    use std::{fs::File, io, os::unix::fs::FileExt};

    pub(super) fn read_exact_at(file: &File, buf: &mut [u8], pos: u64) -> io::Result<()> {
        file.read_exact_at(buf, pos)
    }

    pub(super) fn write_all_at(file: &File, buf: &[u8], pos: u64) -> io::Result<()> {
        file.write_all_at(buf, pos)
    }
}

#[cfg(windows)]
mod positional {
    use std::{fs::File, io, os::windows::fs::FileExt};

    pub(super) fn read_exact_at(file: &File, mut buf: &mut [u8], mut pos: u64) -> io::Result<()> {
        while !buf.is_empty() {
            let n = file.seek_read(buf, pos)?;
            if n == 0 {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            buf = &mut buf[n..];
            pos += n as u64;
        }
        Ok(())
    }

    pub(super) fn write_all_at(file: &File, mut buf: &[u8], mut pos: u64) -> io::Result<()> {
        while !buf.is_empty() {
            let n = file.seek_write(buf, pos)?;
            if n == 0 {
                return Err(io::ErrorKind::WriteZero.into());
            }
            buf = &buf[n..];
            pos += n as u64;
        }
        Ok(())
    }
}
