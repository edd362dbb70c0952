//! Block-paged rune buffer.
//!
//! A [`Buffer`] holds a sequence of runes (Unicode scalar values) indexed
//! by rune position, never by byte. Content is partitioned into blocks of
//! at most `block_size` runes; each block lives in a fixed-size slot of a
//! [`RandomAccess`] byte store (an anonymous temp file by default), so a
//! buffer can grow well past available memory. Only a single block is
//! resident at a time, plus a free-slot list for reuse.
//!
//! Mutation protocol: new block content is always written to *staged*
//! slots (free-list tail first, then fresh slots past the high-water
//! mark) and the descriptor state (block list, free list, size) is
//! committed only after every store write has succeeded. Live slots are
//! never rewritten in place; a shrinking block keeps its slot because the
//! surviving prefix bytes are unchanged. A failed mutation therefore
//! leaves the buffer exactly as it was.

use std::io;

use thiserror::Error;
use tracing::trace;

mod store;
mod stream;

pub use store::{FileStore, MemStore, RandomAccess};
pub use stream::{Reader, Writer};

/// Runes per block for production buffers.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

const BYTES_PER_RUNE: usize = 4;

#[derive(Debug, Error)]
pub enum BufferError {
    /// An offset or count lies outside `[0, size]`.
    #[error("invalid offset {at}")]
    InvalidOffset { at: usize },
    /// An error surfaced verbatim from the backing store.
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, BufferError>;

/// Descriptor of one block: which slot holds it and how many runes it has.
#[derive(Debug, Clone, Copy)]
struct Block {
    slot: usize,
    n: usize,
}

/// A paged, rune-indexed sequence.
pub struct Buffer {
    block_size: usize,
    store: Box<dyn RandomAccess>,
    /// Ordered block descriptors; the rune at index i lives in the block
    /// where the running sum of `n` first exceeds i.
    blocks: Vec<Block>,
    /// Reusable slots, in no particular order. Staging allocates from the
    /// tail so an aborted mutation needs no rollback.
    free: Vec<usize>,
    /// High-water slot count; fresh slots are handed out past it.
    slots: usize,
    size: usize,
    cache_slot: Option<usize>,
    cache: Vec<char>,
}

impl Buffer {
    /// New buffer over an anonymous temp file, created lazily on first
    /// spill.
    pub fn new(block_size: usize) -> Self {
        Self::with_store(block_size, FileStore::new())
    }

    /// New buffer over a caller-supplied store.
    pub fn with_store(block_size: usize, store: impl RandomAccess + 'static) -> Self {
        assert!(block_size > 0, "block size must be positive");
        Self {
            block_size,
            store: Box::new(store),
            blocks: Vec::new(),
            free: Vec::new(),
            slots: 0,
            size: 0,
            cache_slot: None,
            cache: Vec::new(),
        }
    }

    /// Current rune count.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Rune counts of the live blocks, in order. Diagnostic surface; the
    /// sum always equals [`size`](Self::size).
    pub fn block_sizes(&self) -> impl Iterator<Item = usize> + '_ {
        self.blocks.iter().map(|b| b.n)
    }

    /// Number of reusable slots currently on the free list.
    pub fn free_slots(&self) -> usize {
        self.free.len()
    }

    /// Insert `rs` before rune position `at`.
    pub fn insert(&mut self, rs: &[char], at: usize) -> Result<()> {
        if at > self.size {
            return Err(BufferError::InvalidOffset { at });
        }
        if rs.is_empty() {
            return Ok(());
        }
        let bs = self.block_size;

        if self.blocks.is_empty() {
            let mut staged = 0;
            let mut fresh: Vec<Block> = Vec::new();
            for chunk in rs.chunks(bs) {
                let slot = self.stage(staged);
                self.write_slot(slot, chunk)?;
                fresh.push(Block {
                    slot,
                    n: chunk.len(),
                });
                staged += 1;
            }
            self.commit_alloc(staged);
            self.blocks = fresh;
            self.size = rs.len();
            trace!(target: "buffer.alloc", blocks = self.blocks.len(), runes = rs.len(), "initial fill");
            return Ok(());
        }

        let (bi, off) = self.find(at);
        let bn = self.blocks[bi].n;

        if bn + rs.len() <= bs {
            // Extend in place: splice into the resident copy, land it in a
            // staged slot, swap descriptors on commit.
            let mut runes = self.block_runes(bi)?;
            runes.splice(off..off, rs.iter().copied());
            let slot = self.stage(0);
            self.write_slot(slot, &runes)?;
            self.commit_alloc(1);
            let old = self.blocks[bi].slot;
            self.blocks[bi] = Block {
                slot,
                n: runes.len(),
            };
            self.release(old);
            self.size += rs.len();
            return Ok(());
        }

        // The run does not fit alongside the block's content: the new
        // runes become whole blocks of their own, placed at the insertion
        // point. A mid-block insertion splits the host block; its prefix
        // keeps the old slot (those bytes are unchanged) and its suffix
        // moves to a staged slot.
        let mut staged = 0;
        let mut mids: Vec<Block> = Vec::new();
        for chunk in rs.chunks(bs) {
            let slot = self.stage(staged);
            staged += 1;
            self.write_slot(slot, chunk)?;
            mids.push(Block {
                slot,
                n: chunk.len(),
            });
        }

        if off == 0 {
            self.commit_alloc(staged);
            self.blocks.splice(bi..bi, mids);
        } else if off == bn {
            self.commit_alloc(staged);
            self.blocks.splice(bi + 1..bi + 1, mids);
        } else {
            let runes = self.block_runes(bi)?;
            let suffix: Vec<char> = runes[off..].to_vec();
            let slot = self.stage(staged);
            staged += 1;
            self.write_slot(slot, &suffix)?;
            mids.push(Block {
                slot,
                n: suffix.len(),
            });
            self.commit_alloc(staged);
            self.blocks[bi].n = off;
            self.blocks.splice(bi + 1..bi + 1, mids);
        }
        self.size += rs.len();
        trace!(target: "buffer.alloc", at, runes = rs.len(), blocks = self.blocks.len(), "insert split");
        Ok(())
    }

    /// Remove `n` runes starting at `at`.
    pub fn delete(&mut self, n: usize, at: usize) -> Result<()> {
        let end = at
            .checked_add(n)
            .ok_or(BufferError::InvalidOffset { at })?;
        if end > self.size {
            return Err(BufferError::InvalidOffset { at: end });
        }
        if n == 0 {
            return Ok(());
        }

        let (mut bi, mut off) = self.find(at);
        if off == self.blocks[bi].n {
            bi += 1;
            off = 0;
        }

        // Affected region spans blocks [bi, bj); `tail_keep` runes at the
        // end of block bj-1 survive.
        let mut covered = 0;
        let mut bj = bi;
        while covered < off + n {
            covered += self.blocks[bj].n;
            bj += 1;
        }
        let tail_keep = covered - (off + n);

        let mut replacement: Vec<Block> = Vec::new();
        let mut keep_slot: Option<usize> = None;
        if off > 0 && tail_keep > 0 && bj - bi == 1 {
            // Interior cut of a single block: rebuild it whole in one
            // staged slot rather than fragmenting into two.
            let runes = self.block_runes(bi)?;
            let mut kept: Vec<char> = Vec::with_capacity(off + tail_keep);
            kept.extend_from_slice(&runes[..off]);
            kept.extend_from_slice(&runes[runes.len() - tail_keep..]);
            let slot = self.stage(0);
            self.write_slot(slot, &kept)?;
            self.commit_alloc(1);
            replacement.push(Block {
                slot,
                n: kept.len(),
            });
        } else {
            let suffix = if tail_keep > 0 {
                let runes = self.block_runes(bj - 1)?;
                let kept: Vec<char> = runes[runes.len() - tail_keep..].to_vec();
                let slot = self.stage(0);
                self.write_slot(slot, &kept)?;
                Some(Block { slot, n: tail_keep })
            } else {
                None
            };
            if suffix.is_some() {
                self.commit_alloc(1);
            }
            if off > 0 {
                // Shrinking prefix keeps its slot; the bytes are unchanged.
                let slot = self.blocks[bi].slot;
                keep_slot = Some(slot);
                replacement.push(Block { slot, n: off });
            }
            if let Some(b) = suffix {
                replacement.push(b);
            }
        }

        let removed: Vec<Block> = self.blocks.splice(bi..bj, replacement).collect();
        for b in removed {
            if keep_slot != Some(b.slot) {
                self.release(b.slot);
            }
        }
        self.size -= n;
        trace!(target: "buffer.alloc", at, n, blocks = self.blocks.len(), free = self.free.len(), "delete");
        Ok(())
    }

    /// Read up to `n` runes starting at `at`. Returning fewer runes than
    /// requested means end of buffer; reading zero runes never does.
    pub fn read(&mut self, n: usize, at: usize) -> Result<Vec<char>> {
        if at > self.size {
            return Err(BufferError::InvalidOffset { at });
        }
        let n = n.min(self.size - at);
        let mut out = Vec::with_capacity(n);
        if n == 0 {
            return Ok(out);
        }
        let (mut bi, mut off) = self.find(at);
        if off == self.blocks[bi].n {
            bi += 1;
            off = 0;
        }
        while out.len() < n {
            let Block { slot, n: bn } = self.blocks[bi];
            let take = (n - out.len()).min(bn - off);
            let runes = self.load(slot, bn)?;
            out.extend_from_slice(&runes[off..off + take]);
            bi += 1;
            off = 0;
        }
        Ok(out)
    }

    /// The single rune at index `i`.
    pub fn rune(&mut self, i: usize) -> Result<char> {
        if i >= self.size {
            return Err(BufferError::InvalidOffset { at: i });
        }
        let (mut bi, mut off) = self.find(i);
        if off == self.blocks[bi].n {
            bi += 1;
            off = 0;
        }
        let Block { slot, n } = self.blocks[bi];
        let runes = self.load(slot, n)?;
        Ok(runes[off])
    }

    /// Drop all content but keep slot allocations for reuse.
    pub fn reset(&mut self) {
        for b in self.blocks.drain(..) {
            self.free.push(b.slot);
        }
        self.size = 0;
        self.cache_slot = None;
        self.cache.clear();
    }

    /// Release the backing store. The buffer must not be used afterwards.
    pub fn close(&mut self) -> Result<()> {
        self.blocks.clear();
        self.free.clear();
        self.size = 0;
        self.cache_slot = None;
        self.cache.clear();
        self.store.close()?;
        Ok(())
    }

    /// Streaming rune view starting at `at`.
    pub fn reader(&mut self, at: usize) -> Reader<'_> {
        Reader::new(self, at)
    }

    /// Streaming insertion point at `at`: bytes written are decoded as
    /// UTF-8 and inserted as runes, advancing past what was written.
    pub fn writer(&mut self, at: usize) -> Writer<'_> {
        Writer::new(self, at)
    }

    /// Insert the whole of `r` (UTF-8 bytes) before `at`, returning the
    /// number of runes inserted.
    pub fn insert_from<R: io::Read>(&mut self, mut r: R, at: usize) -> Result<usize> {
        if at > self.size {
            return Err(BufferError::InvalidOffset { at });
        }
        let mut w = self.writer(at);
        let mut chunk = [0u8; 8192];
        loop {
            let k = r.read(&mut chunk).map_err(BufferError::Io)?;
            if k == 0 {
                break;
            }
            io::Write::write_all(&mut w, &chunk[..k]).map_err(stream::unwrap_io)?;
        }
        w.finish().map_err(stream::unwrap_io)
    }

    // ---------------------------------------------------------------------
    // Block internals
    // ---------------------------------------------------------------------

    /// Locate `at`: returns `(block index, offset within block)`. A
    /// position on a block boundary resolves to the end of the earlier
    /// block; callers that need a strict interior position normalise.
    fn find(&self, at: usize) -> (usize, usize) {
        let mut acc = 0;
        for (i, b) in self.blocks.iter().enumerate() {
            if at <= acc + b.n {
                return (i, at - acc);
            }
            acc += b.n;
        }
        (self.blocks.len(), 0)
    }

    /// The slot a staged allocation number `idx` will land in, without
    /// committing anything.
    fn stage(&self, idx: usize) -> usize {
        let nfree = self.free.len();
        if idx < nfree {
            self.free[nfree - 1 - idx]
        } else {
            self.slots + (idx - nfree)
        }
    }

    /// Commit `count` staged allocations: pop them off the free list and
    /// advance the high-water mark for the remainder.
    fn commit_alloc(&mut self, count: usize) {
        let from_free = count.min(self.free.len());
        let keep = self.free.len() - from_free;
        self.free.truncate(keep);
        self.slots += count - from_free;
    }

    fn release(&mut self, slot: usize) {
        if self.cache_slot == Some(slot) {
            self.cache_slot = None;
        }
        self.free.push(slot);
    }

    fn slot_off(&self, slot: usize) -> u64 {
        (slot * self.block_size * BYTES_PER_RUNE) as u64
    }

    /// Resident runes of the block in `slot` (loads through the one-block
    /// cache).
    fn load(&mut self, slot: usize, n: usize) -> Result<&[char]> {
        if self.cache_slot != Some(slot) {
            let mut bytes = vec![0u8; n * BYTES_PER_RUNE];
            let off = self.slot_off(slot);
            self.store.read_at(&mut bytes, off)?;
            let mut runes = Vec::with_capacity(n);
            for quad in bytes.chunks_exact(BYTES_PER_RUNE) {
                let v = u32::from_le_bytes(quad.try_into().expect("4-byte chunk"));
                let c = char::from_u32(v).ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("invalid rune 0x{v:x} in backing store"),
                    )
                })?;
                runes.push(c);
            }
            self.cache = runes;
            self.cache_slot = Some(slot);
        }
        Ok(&self.cache)
    }

    fn block_runes(&mut self, bi: usize) -> Result<Vec<char>> {
        let Block { slot, n } = self.blocks[bi];
        Ok(self.load(slot, n)?.to_vec())
    }

    /// Write block content to `slot` and make it the resident block.
    fn write_slot(&mut self, slot: usize, runes: &[char]) -> Result<()> {
        debug_assert!(runes.len() <= self.block_size);
        let mut bytes = Vec::with_capacity(runes.len() * BYTES_PER_RUNE);
        for &r in runes {
            bytes.extend_from_slice(&(r as u32).to_le_bytes());
        }
        let off = self.slot_off(slot);
        self.store.write_at(&bytes, off)?;
        self.cache_slot = Some(slot);
        self.cache.clear();
        self.cache.extend_from_slice(runes);
        Ok(())
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("block_size", &self.block_size)
            .field("size", &self.size)
            .field("blocks", &self.blocks.len())
            .field("free", &self.free.len())
            .finish()
    }
}
