use byteorder::{BigEndian, ByteOrder};
use lumen_common::{Result, error::Error};

use crate::{
    FileHandle, FileWindow, StreamConfig,
    compact::CompactDecoder,
};

/// Buffered reader over a [`FileHandle`].
///
/// The stream pulls bytes through the handle's window protocol and keeps at most
/// one window live at a time. Fixed-width values are big-endian; C32/C64 values use
/// the [`compact`](crate::compact) format.
///
/// The stream length is captured when the stream is opened.
pub struct InStream {
    handle: Box<dyn FileHandle>,
    window: FileWindow,
    pos: u64,
    len: u64,
    buffer_size: usize,
}

impl InStream {
    /// Opens a stream positioned at the start of `handle`.
    pub fn open(handle: impl FileHandle + 'static) -> Result<InStream> {
        Self::with_config(handle, StreamConfig::default())
    }

    pub fn with_config(handle: impl FileHandle + 'static, config: StreamConfig) -> Result<InStream> {
        let buffer_size = config.buffer_size()?;
        if !handle.flags().is_readable() {
            return Err(Error::access_denied(
                "open input stream on write-only handle",
                handle.path(),
            ));
        }
        let len = handle.length();
        Ok(InStream {
            handle: Box::new(handle),
            window: FileWindow::new(),
            pos: 0,
            len,
            buffer_size,
        })
    }

    /// Path identity of the underlying handle.
    pub fn path(&self) -> &str {
        self.handle.path()
    }

    pub fn length(&self) -> u64 {
        self.len
    }

    /// Current read position.
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// Number of bytes between the read position and the end of the stream.
    pub fn remaining(&self) -> u64 {
        self.len - self.pos
    }

    /// Fails with `EndOfStream` unless `len` more bytes can be read. Lets callers
    /// reject a corrupt length prefix before sizing a buffer from it.
    pub fn verify_available(&self, len: u64) -> Result<()> {
        if len > self.remaining() {
            return Err(Error::end_of_stream(self.pos, len, self.len));
        }
        Ok(())
    }

    /// Moves the read position to `target`. Seeking to exactly `length()` is allowed;
    /// seeking beyond it fails with `OutOfRange`.
    pub fn seek(&mut self, target: u64) -> Result<()> {
        if target > self.len {
            return Err(Error::out_of_range(
                target.min(i64::MAX as u64) as i64,
                0,
                self.len,
            ));
        }
        self.pos = target;
        Ok(())
    }

    /// Fills `dst` from the current position and advances past it.
    pub fn read_bytes(&mut self, dst: &mut [u8]) -> Result<()> {
        if dst.is_empty() {
            return Ok(());
        }
        let bytes = self.fill(dst.len())?;
        dst.copy_from_slice(bytes);
        self.pos += dst.len() as u64;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let byte = self.fill(1)?[0];
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let value = BigEndian::read_u32(self.fill(4)?);
        self.pos += 4;
        Ok(value)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_u32().map(|v| v as i32)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let value = BigEndian::read_u64(self.fill(8)?);
        self.pos += 8;
        Ok(value)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.read_u64().map(|v| v as i64)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let value = BigEndian::read_f32(self.fill(4)?);
        self.pos += 4;
        Ok(value)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let value = BigEndian::read_f64(self.fill(8)?);
        self.pos += 8;
        Ok(value)
    }

    pub fn read_c32(&mut self) -> Result<u32> {
        self.read_compact(CompactDecoder::c32()).map(|v| v as u32)
    }

    pub fn read_c64(&mut self) -> Result<u64> {
        self.read_compact(CompactDecoder::c64())
    }

    /// Reads a C32 byte count followed by that many bytes.
    ///
    /// On failure the read position is left where it was.
    pub fn read_counted_bytes(&mut self) -> Result<Vec<u8>> {
        let start = self.pos;
        let result = self.read_c32().and_then(|len| {
            self.verify_available(len as u64)?;
            let mut buf = vec![0u8; len as usize];
            self.read_bytes(&mut buf)?;
            Ok(buf)
        });
        if result.is_err() {
            self.pos = start;
        }
        result
    }

    /// Reads a C32 byte count followed by that many bytes of UTF-8 text.
    pub fn read_string(&mut self) -> Result<String> {
        let start = self.pos;
        let buf = self.read_counted_bytes()?;
        String::from_utf8(buf).map_err(|e| {
            self.pos = start;
            Error::invalid_format("string", e.to_string())
        })
    }

    /// Releases the live window and closes the handle.
    pub fn close(&mut self) -> Result<()> {
        self.handle.release_window(&mut self.window)?;
        self.handle.close()
    }

    fn read_compact(&mut self, mut decoder: CompactDecoder) -> Result<u64> {
        let start = self.pos;
        loop {
            match self.read_u8().and_then(|byte| decoder.push(byte)) {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(e) => {
                    self.pos = start;
                    return Err(e);
                }
            }
        }
    }

    /// Makes `[pos, pos + needed)` visible through the window and returns it.
    fn fill(&mut self, needed: usize) -> Result<&[u8]> {
        if !self.window.covers(self.pos, needed) {
            let available = self.len.saturating_sub(self.pos);
            if (needed as u64) > available {
                return Err(Error::end_of_stream(self.pos, needed as u64, self.len));
            }
            self.handle.release_window(&mut self.window)?;
            let amount = (needed.max(self.buffer_size) as u64).min(available) as usize;
            self.handle
                .window(&mut self.window, self.pos as i64, amount)?;
        }
        let start = (self.pos - self.window.offset()) as usize;
        Ok(&self.window.as_bytes()[start..start + needed])
    }
}
