use lumen_common::{Result, verify_arg};

/// Configuration parameters for [`InStream`](crate::InStream) and
/// [`OutStream`](crate::OutStream).
#[derive(Debug, Clone, Default)]
pub struct StreamConfig {
    /// Number of bytes buffered by an output stream before it writes to the handle,
    /// and the preferred window size requested by an input stream.
    pub buffer_size: Option<usize>,
}

impl StreamConfig {
    pub const DEFAULT_BUFFER_SIZE: usize = 1024;

    pub fn with_buffer_size(buffer_size: usize) -> StreamConfig {
        StreamConfig {
            buffer_size: Some(buffer_size),
        }
    }

    /// Resolves the effective buffer size.
    pub fn buffer_size(&self) -> Result<usize> {
        let buffer_size = self.buffer_size.unwrap_or(Self::DEFAULT_BUFFER_SIZE);
        verify_arg!(buffer_size, buffer_size > 0);
        Ok(buffer_size)
    }
}
