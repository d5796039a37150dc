use std::borrow::Cow;

use byteorder::{BigEndian, ByteOrder};
use lumen_common::{Result, error::Error, verify_arg};

use crate::{
    FileHandle, StreamConfig,
    compact::{C32_MAX_BYTES, C64_MAX_BYTES, encode_c32, encode_c64},
};

/// Buffered writer over a [`FileHandle`].
///
/// Bytes accumulate in an internal buffer and reach the handle on
/// [`flush`](OutStream::flush), when the buffer fills up, or on
/// [`close`](OutStream::close). Dropping an unclosed stream flushes it.
pub struct OutStream {
    handle: Box<dyn FileHandle>,
    buf: Vec<u8>,
    buf_start: u64,
    buffer_size: usize,
    closed: bool,
}

impl OutStream {
    /// Opens a stream positioned at the end of `handle`.
    pub fn open(handle: impl FileHandle + 'static) -> Result<OutStream> {
        Self::with_config(handle, StreamConfig::default())
    }

    pub fn with_config(handle: impl FileHandle + 'static, config: StreamConfig) -> Result<OutStream> {
        let buffer_size = config.buffer_size()?;
        if !handle.flags().is_writable() {
            return Err(Error::access_denied(
                "open output stream on read-only handle",
                handle.path(),
            ));
        }
        let buf_start = handle.length();
        Ok(OutStream {
            handle: Box::new(handle),
            buf: Vec::with_capacity(buffer_size),
            buf_start,
            buffer_size,
            closed: false,
        })
    }

    /// Path identity of the underlying handle.
    pub fn path(&self) -> &str {
        self.handle.path()
    }

    /// Current write position: committed bytes plus buffered bytes.
    pub fn tell(&self) -> u64 {
        self.buf_start + self.buf.len() as u64
    }

    /// Logical length of the stream, including bytes not yet flushed.
    pub fn length(&self) -> u64 {
        self.tell()
    }

    /// Number of bytes buffered but not yet written to the handle.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn write_bytes(&mut self, src: &[u8]) -> Result<()> {
        self.verify_open()?;
        if self.buf.len() + src.len() > self.buffer_size {
            self.flush()?;
            if src.len() >= self.buffer_size {
                self.handle.write(src)?;
                self.buf_start += src.len() as u64;
                return Ok(());
            }
        }
        self.buf.extend_from_slice(src);
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        let mut buf = [0u8; 4];
        BigEndian::write_u32(&mut buf, value);
        self.write_bytes(&buf)
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_u32(value as u32)
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        let mut buf = [0u8; 8];
        BigEndian::write_u64(&mut buf, value);
        self.write_bytes(&buf)
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_u64(value as u64)
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        let mut buf = [0u8; 4];
        BigEndian::write_f32(&mut buf, value);
        self.write_bytes(&buf)
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        let mut buf = [0u8; 8];
        BigEndian::write_f64(&mut buf, value);
        self.write_bytes(&buf)
    }

    pub fn write_c32(&mut self, value: u32) -> Result<()> {
        let mut buf = [0u8; C32_MAX_BYTES];
        self.write_bytes(encode_c32(value, &mut buf))
    }

    pub fn write_c64(&mut self, value: u64) -> Result<()> {
        let mut buf = [0u8; C64_MAX_BYTES];
        self.write_bytes(encode_c64(value, &mut buf))
    }

    /// Writes a C32 byte count followed by the UTF-8 bytes of `value`.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let len = u32::try_from(value.len())
            .map_err(|_| Error::invalid_arg("value", "string longer than u32::MAX bytes"))?;
        self.write_c32(len)?;
        self.write_bytes(value.as_bytes())
    }

    /// Pads the stream with zeros up to the next multiple of `modulus` (a power of two)
    /// and returns the new position.
    pub fn align(&mut self, modulus: usize) -> Result<u64> {
        verify_arg!(modulus, modulus.is_power_of_two());
        let padding = get_padding(self.tell(), modulus);
        self.write_bytes(&padding)?;
        Ok(self.tell())
    }

    /// Asks the handle to reserve room for at least `min_len` bytes.
    pub fn grow(&mut self, min_len: u64) -> Result<()> {
        self.verify_open()?;
        self.handle.grow(min_len)
    }

    /// Writes buffered bytes to the handle.
    pub fn flush(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        self.handle.write(&self.buf)?;
        self.buf_start += self.buf.len() as u64;
        self.buf.clear();
        Ok(())
    }

    /// Flushes and closes the handle. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.flush()?;
        self.handle.close()?;
        self.closed = true;
        Ok(())
    }

    fn verify_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::invalid_operation("write to closed output stream"))
        } else {
            Ok(())
        }
    }
}

impl Drop for OutStream {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.flush() {
                log::warn!("failed to flush output stream '{}' on drop: {e}", self.path());
            }
        }
    }
}

/// Returns a slice of zero bytes that advances `pos` to the next multiple of
/// `alignment`. Small paddings borrow from a static buffer.
pub fn get_padding(pos: u64, alignment: usize) -> Cow<'static, [u8]> {
    const BUF: [u8; 128] = [0u8; 128];
    let size = get_padding_size(pos, alignment);
    if size <= BUF.len() {
        Cow::Borrowed(&BUF[..size])
    } else {
        Cow::Owned(vec![0u8; size])
    }
}

/// Number of zero bytes needed to align `pos` to `alignment` (a power of two).
pub fn get_padding_size(pos: u64, alignment: usize) -> usize {
    let mask = alignment.max(1) as u64 - 1;
    ((pos.wrapping_neg()) & mask) as usize
}
