//! The editor façade: a buffer, its marks, a regex cache, and the edit
//! executor.
//!
//! Application order inside one edit: resolve every address first, then
//! mutate the buffer, then shift marks and set dot. If a mutation fails,
//! later mutations are not attempted and marks are left untouched; the
//! error surfaces verbatim through [`Editor::apply`].

use std::io::Write;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

use tracing::debug;

use core_address::{AddrError, Address, RegexCache, Span, eval};
use core_runes::{Buffer, DEFAULT_BLOCK_SIZE};

use crate::marks::{MarkTable, shift_span};
use crate::{Edit, EditError, Result};

pub struct Editor {
    buf: Buffer,
    marks: MarkTable,
    cache: RegexCache,
    watchers: Vec<SyncSender<()>>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    /// Editor over an anonymous-file buffer with the production block
    /// size.
    pub fn new() -> Self {
        Self::with_buffer(Buffer::new(DEFAULT_BLOCK_SIZE))
    }

    pub fn with_block_size(block_size: usize) -> Self {
        Self::with_buffer(Buffer::new(block_size))
    }

    /// Editor over a caller-built buffer (tests use in-memory stores).
    pub fn with_buffer(buf: Buffer) -> Self {
        Self {
            buf,
            marks: MarkTable::new(),
            cache: RegexCache::new(),
            watchers: Vec::new(),
        }
    }

    /// Rune count of the buffer.
    pub fn len(&self) -> usize {
        self.buf.size()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn dot(&self) -> Span {
        self.marks.dot()
    }

    /// Current value of a mark; unset marks read as `(0,0)`.
    pub fn mark(&self, r: char) -> Span {
        self.marks.get(r)
    }

    /// Set a mark directly, bypassing address resolution. View
    /// collaborators use this to track their own cursors.
    pub fn set_mark(&mut self, r: char, s: Span) {
        self.marks.set(r, s);
    }

    /// The whole buffer as a `String`.
    pub fn contents(&mut self) -> Result<String> {
        Ok(self.buf.reader(0).read_all()?)
    }

    /// The addressed runes as a `String`.
    pub fn read_span(&mut self, s: Span) -> Result<String> {
        Ok(self.buf.read(s.len(), s.from)?.into_iter().collect())
    }

    /// Resolve an address against the current buffer and dot without
    /// moving dot.
    pub fn where_of(&mut self, a: &Address) -> Result<Span> {
        Ok(self.eval_addr(a)?)
    }

    /// Load UTF-8 bytes from `r`, inserting before `at`. Returns runes
    /// inserted; marks shift as for any insertion.
    pub fn load<R: std::io::Read>(&mut self, r: R, at: usize) -> Result<usize> {
        let n = self.buf.insert_from(r, at)?;
        self.marks.update(at, at, n);
        self.changed();
        Ok(n)
    }

    /// Receive one coalesced pulse per buffer-changing edit.
    pub fn subscribe(&mut self) -> Receiver<()> {
        let (tx, rx) = mpsc::sync_channel(1);
        self.watchers.push(tx);
        rx
    }

    /// Release the buffer's backing store.
    pub fn close(&mut self) -> Result<()> {
        Ok(self.buf.close()?)
    }

    /// Apply one edit, writing any print/where output to `out`.
    pub fn apply(&mut self, e: &Edit, out: &mut dyn Write) -> Result<()> {
        debug!(target: "edit.apply", edit = %e, "apply");
        let changed = match e {
            Edit::Change { a, text } => {
                let s = self.eval_addr(a)?;
                self.splice(s, text)?;
                true
            }
            Edit::Append { a, text } => {
                let s = self.eval_addr(a)?;
                self.splice(Span::point(s.to), text)?;
                true
            }
            Edit::Insert { a, text } => {
                let s = self.eval_addr(a)?;
                self.splice(Span::point(s.from), text)?;
                true
            }
            Edit::Delete { a } => {
                let s = self.eval_addr(a)?;
                self.splice(s, "")?;
                true
            }
            Edit::Move { a, b } => {
                let s = self.eval_addr(a)?;
                let d = self.eval_addr(b)?;
                self.do_move(s, d)?;
                true
            }
            Edit::Copy { a, b } => {
                let s = self.eval_addr(a)?;
                let d = self.eval_addr(b)?;
                let content = self.buf.read(s.len(), s.from)?;
                self.buf.insert(&content, d.to)?;
                self.marks.update(d.to, d.to, content.len());
                self.marks.set_dot(Span::new(d.to, d.to + content.len()));
                true
            }
            Edit::Set { a, mark } => {
                let s = self.eval_addr(a)?;
                self.marks.set(*mark, s);
                false
            }
            Edit::Print { a } => {
                let s = self.eval_addr(a)?;
                let text = self.read_span(s)?;
                out.write_all(text.as_bytes())?;
                self.marks.set_dot(s);
                false
            }
            Edit::Where { a } => {
                let s = self.eval_addr(a)?;
                write!(out, "{s}")?;
                self.marks.set_dot(s);
                false
            }
            Edit::WhereLine { a } => {
                let s = self.eval_addr(a)?;
                let l1 = 1 + self.count_newlines(s.from)?;
                let l2 = if s.to == s.from {
                    l1
                } else {
                    1 + self.count_newlines(s.to - 1)?
                };
                if l1 == l2 {
                    write!(out, "{l1}")?;
                } else {
                    write!(out, "{l1},{l2}")?;
                }
                self.marks.set_dot(s);
                false
            }
            Edit::Substitute {
                a,
                re,
                with,
                global,
                from,
            } => {
                let s = self.eval_addr(a)?;
                self.substitute(s, re, with, *global, *from)?;
                true
            }
        };
        if changed {
            self.changed();
        }
        Ok(())
    }

    fn eval_addr(&mut self, a: &Address) -> std::result::Result<Span, AddrError> {
        let dot = self.marks.dot();
        eval(a, &mut self.buf, dot, &self.marks, &mut self.cache)
    }

    /// Replace `s` with `text`; marks shift, dot covers the new text.
    fn splice(&mut self, s: Span, text: &str) -> Result<()> {
        let rs: Vec<char> = text.chars().collect();
        if !s.is_empty() {
            self.buf.delete(s.len(), s.from)?;
        }
        if !rs.is_empty() {
            self.buf.insert(&rs, s.from)?;
        }
        self.marks.update(s.from, s.to, rs.len());
        self.marks.set_dot(Span::new(s.from, s.from + rs.len()));
        Ok(())
    }

    fn do_move(&mut self, s: Span, d: Span) -> Result<()> {
        if d.to > s.from && d.to < s.to {
            return Err(EditError::Overlap);
        }
        let content = self.buf.read(s.len(), s.from)?;
        let k = content.len();
        if d.to >= s.to {
            self.buf.insert(&content, d.to)?;
            self.marks.update(d.to, d.to, k);
            self.buf.delete(k, s.from)?;
            self.marks.update(s.from, s.to, 0);
            let ins = shift_span(Span::new(d.to, d.to + k), s.from, s.to, 0);
            self.marks.set_dot(ins);
        } else {
            // Destination before the source; the insertion shifts the
            // source right by k.
            self.buf.insert(&content, d.to)?;
            self.marks.update(d.to, d.to, k);
            self.buf.delete(k, s.from + k)?;
            self.marks.update(s.from + k, s.to + k, 0);
            self.marks.set_dot(Span::new(d.to, d.to + k));
        }
        Ok(())
    }

    fn substitute(
        &mut self,
        s: Span,
        re: &str,
        with: &str,
        global: bool,
        from: usize,
    ) -> Result<()> {
        let search = self.cache.get(re).map_err(AddrError::BadRegex)?;
        let hay = self.read_span(s)?;
        let first = from.max(1);
        let mut delta: isize = 0;
        for (idx, (byte_from, byte_to, rep)) in search.replacements(&hay, with).iter().enumerate() {
            let nth = idx + 1;
            if nth < first {
                continue;
            }
            if nth > first && !global {
                break;
            }
            let m_from = s.from + hay[..*byte_from].chars().count();
            let m_len = hay[*byte_from..*byte_to].chars().count();
            let rs: Vec<char> = rep.chars().collect();
            let at = (m_from as isize + delta) as usize;
            if m_len > 0 {
                self.buf.delete(m_len, at)?;
            }
            if !rs.is_empty() {
                self.buf.insert(&rs, at)?;
            }
            self.marks.update(at, at + m_len, rs.len());
            delta += rs.len() as isize - m_len as isize;
        }
        let to = (s.to as isize + delta) as usize;
        self.marks.set_dot(Span::new(s.from, to));
        Ok(())
    }

    /// Newlines strictly before rune position `upto`.
    fn count_newlines(&mut self, upto: usize) -> Result<usize> {
        let mut n = 0;
        for r in self.buf.reader(0).take(upto) {
            if r? == '\n' {
                n += 1;
            }
        }
        Ok(n)
    }

    fn changed(&mut self) {
        self.watchers.retain(|tx| match tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Disconnected(())) => false,
        });
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("buf", &self.buf)
            .field("dot", &self.marks.dot())
            .finish()
    }
}
