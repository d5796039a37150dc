use std::sync::Arc;

/// A borrowed view of `len` bytes at `offset` inside a [`FileHandle`](crate::FileHandle).
///
/// A window is filled by [`FileHandle::window`](crate::FileHandle::window) and emptied by
/// [`FileHandle::release_window`](crate::FileHandle::release_window). In-memory handles
/// share their backing buffer with the window; other handles fill it with a private copy.
///
/// When windows are used to walk fixed-size records, callers keep `offset` a multiple
/// of the record size. The handle does not check this.
#[derive(Default)]
pub struct FileWindow {
    offset: u64,
    len: usize,
    buf: Option<Arc<Vec<u8>>>,
    start: usize,
    owner: u64,
}

impl FileWindow {
    /// Creates an empty window.
    pub fn new() -> FileWindow {
        Default::default()
    }

    /// File offset of the first byte in the window.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of bytes visible through the window.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the window does not currently view any storage.
    pub fn is_empty(&self) -> bool {
        self.buf.is_none()
    }

    /// The bytes visible through the window; empty when released.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.buf {
            Some(buf) => &buf[self.start..self.start + self.len],
            None => &[],
        }
    }

    /// Returns `true` if the window is live and covers `[pos, pos + len)` of the file.
    pub fn covers(&self, pos: u64, len: usize) -> bool {
        !self.is_empty()
            && pos >= self.offset
            && pos + len as u64 <= self.offset + self.len as u64
    }

    /// Id of the handle that filled the window, or `None` when the window is empty.
    pub fn owner(&self) -> Option<u64> {
        (!self.is_empty()).then_some(self.owner)
    }

    /// Points the window at `buf[start..start + len]`, which holds the file bytes
    /// beginning at `offset`, on behalf of the handle identified by `owner`.
    ///
    /// Intended for [`FileHandle`](crate::FileHandle) implementations.
    pub fn set(&mut self, owner: u64, buf: Arc<Vec<u8>>, start: usize, offset: u64, len: usize) {
        assert!(start + len <= buf.len());
        self.buf = Some(buf);
        self.start = start;
        self.offset = offset;
        self.len = len;
        self.owner = owner;
    }

    /// Resets the window to the empty `{0, 0, none}` state, dropping its view of the
    /// backing storage.
    pub fn reset(&mut self) {
        self.buf = None;
        self.start = 0;
        self.offset = 0;
        self.len = 0;
        self.owner = 0;
    }
}

impl std::fmt::Debug for FileWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWindow")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("live", &!self.is_empty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::FileWindow;

    #[test]
    fn test_set_and_reset() {
        let mut window = FileWindow::new();
        assert!(window.is_empty());
        assert_eq!(window.as_bytes(), b"");

        assert_eq!(window.owner(), None);
        window.set(7, Arc::new(b"foo bar baz".to_vec()), 4, 104, 3);
        assert!(!window.is_empty());
        assert_eq!(window.owner(), Some(7));
        assert_eq!(window.offset(), 104);
        assert_eq!(window.len(), 3);
        assert_eq!(window.as_bytes(), b"bar");
        assert!(window.covers(104, 3));
        assert!(window.covers(105, 1));
        assert!(!window.covers(103, 1));
        assert!(!window.covers(106, 2));

        window.reset();
        assert!(window.is_empty());
        assert_eq!(window.offset(), 0);
        assert_eq!(window.len(), 0);
        assert_eq!(window.owner(), None);
        assert!(!window.covers(0, 0));
    }
}
