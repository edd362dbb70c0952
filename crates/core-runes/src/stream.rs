//! Streaming views over a [`Buffer`](crate::Buffer): a rune iterator and
//! a UTF-8 decoding insertion sink.

use std::collections::VecDeque;
use std::io;

use crate::{Buffer, BufferError, Result};

const READ_CHUNK: usize = 512;

/// Iterator over the runes of a buffer starting at a fixed position.
/// Runes are fetched in chunks; a backing-store failure surfaces as an
/// `Err` item and ends iteration.
pub struct Reader<'a> {
    buf: &'a mut Buffer,
    at: usize,
    pending: VecDeque<char>,
    failed: bool,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a mut Buffer, at: usize) -> Self {
        Self {
            buf,
            at,
            pending: VecDeque::new(),
            failed: false,
        }
    }

    /// Drain the remaining runes into a `String`.
    pub fn read_all(self) -> Result<String> {
        let mut out = String::new();
        for r in self {
            out.push(r?);
        }
        Ok(out)
    }
}

impl Iterator for Reader<'_> {
    type Item = Result<char>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if self.pending.is_empty() {
            if self.at >= self.buf.size() {
                return None;
            }
            match self.buf.read(READ_CHUNK, self.at) {
                Ok(rs) => {
                    if rs.is_empty() {
                        return None;
                    }
                    self.at += rs.len();
                    self.pending = rs.into();
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
        self.pending.pop_front().map(Ok)
    }
}

/// UTF-8 decoding insertion sink. Bytes written are decoded incrementally
/// (sequences may split across `write` calls; invalid sequences decode to
/// U+FFFD) and inserted at a moving offset. `finish` reports the number
/// of runes inserted; dropping the writer discards at most one incomplete
/// trailing sequence.
pub struct Writer<'a> {
    buf: &'a mut Buffer,
    at: usize,
    written: usize,
    pending: [u8; 4],
    pending_len: usize,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(buf: &'a mut Buffer, at: usize) -> Self {
        Self {
            buf,
            at,
            written: 0,
            pending: [0; 4],
            pending_len: 0,
        }
    }

    /// Complete the stream. An incomplete trailing sequence becomes
    /// U+FFFD. Returns the total runes inserted.
    pub fn finish(mut self) -> io::Result<usize> {
        if self.pending_len > 0 {
            self.pending_len = 0;
            self.insert(&['\u{FFFD}'])?;
        }
        Ok(self.written)
    }

    fn insert(&mut self, runes: &[char]) -> io::Result<()> {
        if runes.is_empty() {
            return Ok(());
        }
        self.buf
            .insert(runes, self.at + self.written)
            .map_err(wrap_io)?;
        self.written += runes.len();
        Ok(())
    }

    fn expected_len(lead: u8) -> usize {
        match lead {
            0x00..=0x7F => 1,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1, // invalid lead byte decodes alone (to U+FFFD)
        }
    }

    fn decode_pending(&mut self, out: &mut Vec<char>) {
        let bytes = &self.pending[..self.pending_len];
        match std::str::from_utf8(bytes) {
            Ok(s) => out.extend(s.chars()),
            Err(_) => out.push('\u{FFFD}'),
        }
        self.pending_len = 0;
    }
}

impl io::Write for Writer<'_> {
    fn write(&mut self, mut bytes: &[u8]) -> io::Result<usize> {
        let total = bytes.len();
        let mut runes: Vec<char> = Vec::new();

        // Complete a sequence held over from the previous call.
        while self.pending_len > 0 && !bytes.is_empty() {
            let want = Self::expected_len(self.pending[0]);
            let b = bytes[0];
            if self.pending_len < want && (0x80..=0xBF).contains(&b) {
                self.pending[self.pending_len] = b;
                self.pending_len += 1;
                bytes = &bytes[1..];
                if self.pending_len == want {
                    self.decode_pending(&mut runes);
                }
            } else {
                // Sequence cut short by a non-continuation byte.
                self.pending_len = 0;
                runes.push('\u{FFFD}');
            }
        }

        // Decode the maximal valid prefix of what remains.
        while !bytes.is_empty() {
            match std::str::from_utf8(bytes) {
                Ok(s) => {
                    runes.extend(s.chars());
                    bytes = &[];
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    let s = std::str::from_utf8(&bytes[..valid]).expect("validated prefix");
                    runes.extend(s.chars());
                    match e.error_len() {
                        Some(bad) => {
                            runes.push('\u{FFFD}');
                            bytes = &bytes[valid + bad..];
                        }
                        None => {
                            // Incomplete trailing sequence: hold for later.
                            let tail = &bytes[valid..];
                            self.pending[..tail.len()].copy_from_slice(tail);
                            self.pending_len = tail.len();
                            bytes = &[];
                        }
                    }
                }
            }
        }

        self.insert(&runes)?;
        Ok(total)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Carry a `BufferError` across an `io::Write` boundary.
pub(crate) fn wrap_io(e: BufferError) -> io::Error {
    match e {
        BufferError::Io(io) => io,
        other => io::Error::new(io::ErrorKind::InvalidInput, other.to_string()),
    }
}

/// Recover a `BufferError` from the `io::Write` boundary. Offsets are
/// validated before streaming starts, so anything surfacing mid-stream is
/// genuine store I/O.
pub(crate) fn unwrap_io(e: io::Error) -> BufferError {
    BufferError::Io(e)
}
