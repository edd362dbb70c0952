//! Pluggable random-access byte stores backing a [`Buffer`](crate::Buffer).
//!
//! The buffer never assumes anything about the store beyond positioned
//! reads and writes, so tests can substitute a deterministic in-memory
//! store (or a failing one) without touching the block logic.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Positioned byte I/O for a buffer's backing storage.
///
/// Reads and writes are exact: a short read or write is an error. Offsets
/// may lie beyond the current end of the store; writes extend it and the
/// gap reads back as zero where the platform supports sparse files.
pub trait RandomAccess: Send {
    fn read_at(&mut self, buf: &mut [u8], off: u64) -> io::Result<()>;
    fn write_at(&mut self, buf: &[u8], off: u64) -> io::Result<()>;
    /// Release the underlying resource. Called once by `Buffer::close`.
    fn close(&mut self) -> io::Result<()>;
}

/// Anonymous-file store. The temporary file is created lazily on first
/// access, so constructing a buffer performs no I/O and small buffers
/// that never spill a block still touch the filesystem exactly once.
#[derive(Debug, Default)]
pub struct FileStore {
    file: Option<File>,
}

impl FileStore {
    pub fn new() -> Self {
        Self { file: None }
    }

    fn file(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            let f = tempfile::tempfile()?;
            tracing::debug!(target: "buffer.io", "anonymous backing file created");
            self.file = Some(f);
        }
        Ok(self.file.as_mut().expect("backing file just created"))
    }
}

impl RandomAccess for FileStore {
    fn read_at(&mut self, buf: &mut [u8], off: u64) -> io::Result<()> {
        let f = self.file()?;
        f.seek(SeekFrom::Start(off))?;
        f.read_exact(buf)
    }

    fn write_at(&mut self, buf: &[u8], off: u64) -> io::Result<()> {
        let f = self.file()?;
        f.seek(SeekFrom::Start(off))?;
        f.write_all(buf)
    }

    fn close(&mut self) -> io::Result<()> {
        self.file = None;
        Ok(())
    }
}

/// In-memory store, grown on demand. Useful for tests and for buffers
/// known to stay small.
#[derive(Debug, Default)]
pub struct MemStore {
    data: Vec<u8>,
}

impl MemStore {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }
}

impl RandomAccess for MemStore {
    fn read_at(&mut self, buf: &mut [u8], off: u64) -> io::Result<()> {
        let off = off as usize;
        let end = off + buf.len();
        if end > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of store",
            ));
        }
        buf.copy_from_slice(&self.data[off..end]);
        Ok(())
    }

    fn write_at(&mut self, buf: &[u8], off: u64) -> io::Result<()> {
        let off = off as usize;
        let end = off + buf.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[off..end].copy_from_slice(buf);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}
