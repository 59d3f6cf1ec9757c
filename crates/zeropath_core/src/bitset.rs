//! # Segment Bit Sets
//!
//! Fixed-capacity bit vectors over segment indices, 64 indices per block.
//!
//! Two concrete types share one read interface ([`SetBits`]):
//! - [`BitSet`]: plain, single-owner. Used for the enabled-segment mask and
//!   the candidate set, both rebuilt on the render thread.
//! - [`AtomicBitSet`]: relaxed `fetch_or`/`fetch_and` per block. Used while a
//!   canonicalization task marks visible segments from several threads.
//!
//! ```text
//! index 131 -> block 2, offset 3
//! ┌────────────┬────────────┬────────────┐
//! │  block 0   │  block 1   │  block 2   │
//! │ bits 0..64 │ 64..128    │ 128..192   │
//! └────────────┴────────────┴────────────┘
//! ```
//!
//! Bits past `bit_len()` in the last block are always zero, so enumeration
//! never yields an out-of-range index.

use std::ops::{BitAnd, BitOr};
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of indices stored per block.
pub const BLOCK_BITS: usize = 64;

#[inline]
const fn block_count_for(bits: usize) -> usize {
    (bits + BLOCK_BITS - 1) / BLOCK_BITS
}

#[inline]
const fn split(index: usize) -> (usize, u64) {
    (index / BLOCK_BITS, 1u64 << (index % BLOCK_BITS))
}

/// Mask of the valid bits in the last block.
#[inline]
const fn tail_mask(bits: usize) -> u64 {
    match bits % BLOCK_BITS {
        0 => u64::MAX,
        rem => (1u64 << rem) - 1,
    }
}

/// Read access shared by both bit-set flavours.
pub trait SetBits {
    /// Capacity in bits.
    fn bit_len(&self) -> usize;

    /// Number of storage blocks.
    fn block_count(&self) -> usize;

    /// Snapshot of one storage block.
    fn block(&self, block: usize) -> u64;

    /// Returns whether the bit at `index` is set. Out-of-range reads are `false`.
    fn test(&self, index: usize) -> bool {
        if index >= self.bit_len() {
            return false;
        }
        let (block, mask) = split(index);
        self.block(block) & mask != 0
    }

    /// Number of set bits.
    fn count_ones(&self) -> usize {
        (0..self.block_count())
            .map(|b| self.block(b).count_ones() as usize)
            .sum()
    }

    /// Returns `true` if no bit is set.
    fn none(&self) -> bool {
        (0..self.block_count()).all(|b| self.block(b) == 0)
    }

    /// Writes the indices of all set bits into `out`, ascending.
    ///
    /// `out` is cleared first. Runs in O(set bits + blocks): each block is
    /// consumed lowest-bit-first with `trailing_zeros`.
    #[allow(clippy::cast_possible_truncation)]
    fn enumerate_set_indices(&self, out: &mut Vec<u32>) {
        out.clear();
        for b in 0..self.block_count() {
            let mut word = self.block(b);
            let base = b * BLOCK_BITS;
            while word != 0 {
                let bit = word.trailing_zeros() as usize;
                out.push((base + bit) as u32);
                word &= word - 1;
            }
        }
    }

    /// Iterates over set indices, ascending.
    fn iter_ones(&self) -> SetBitIter<'_, Self>
    where
        Self: Sized,
    {
        SetBitIter {
            set: self,
            next_block: 0,
            base: 0,
            word: 0,
        }
    }
}

/// Iterator over the set indices of a [`SetBits`] implementation.
///
/// Atomic sets are read one block at a time; a block is snapshotted when the
/// iterator reaches it.
pub struct SetBitIter<'a, S: SetBits> {
    set: &'a S,
    next_block: usize,
    base: usize,
    word: u64,
}

impl<'a, S: SetBits> Iterator for SetBitIter<'a, S> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        loop {
            if self.word != 0 {
                let bit = self.word.trailing_zeros() as usize;
                self.word &= self.word - 1;
                return Some(self.base + bit);
            }
            if self.next_block >= self.set.block_count() {
                return None;
            }
            self.word = self.set.block(self.next_block);
            self.base = self.next_block * BLOCK_BITS;
            self.next_block += 1;
        }
    }
}

// =============================================================================
// BitSet
// =============================================================================

/// Plain fixed-capacity bit set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BitSet {
    blocks: Vec<u64>,
    bits: usize,
}

impl BitSet {
    /// Creates a bit set of `bits` capacity with every bit cleared.
    #[must_use]
    pub fn new(bits: usize) -> Self {
        Self {
            blocks: vec![0; block_count_for(bits)],
            bits,
        }
    }

    /// Creates a bit set of `bits` capacity with every bit set.
    #[must_use]
    pub fn full(bits: usize) -> Self {
        let mut set = Self::new(bits);
        set.set_all();
        set
    }

    /// Builds a bit set from a list of indices.
    ///
    /// # Panics
    ///
    /// Panics if an index is `>= bits`.
    #[must_use]
    pub fn from_indices(bits: usize, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut set = Self::new(bits);
        for index in indices {
            set.set(index);
        }
        set
    }

    /// Sets the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= bit_len()`.
    #[inline]
    #[track_caller]
    pub fn set(&mut self, index: usize) {
        assert!(index < self.bits, "bit {index} out of range ({})", self.bits);
        let (block, mask) = split(index);
        self.blocks[block] |= mask;
    }

    /// Clears the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= bit_len()`.
    #[inline]
    #[track_caller]
    pub fn reset(&mut self, index: usize) {
        assert!(index < self.bits, "bit {index} out of range ({})", self.bits);
        let (block, mask) = split(index);
        self.blocks[block] &= !mask;
    }

    /// Clears every bit.
    pub fn clear(&mut self) {
        self.blocks.fill(0);
    }

    /// Sets every bit below `bit_len()`.
    pub fn set_all(&mut self) {
        self.blocks.fill(u64::MAX);
        if let Some(last) = self.blocks.last_mut() {
            *last &= tail_mask(self.bits);
        }
    }

    /// Keeps only the bits also set in `other`.
    ///
    /// # Panics
    ///
    /// Panics if the capacities differ.
    #[track_caller]
    pub fn intersect_with(&mut self, other: &impl SetBits) {
        assert_eq!(self.bits, other.bit_len(), "bit set capacity mismatch");
        for (b, word) in self.blocks.iter_mut().enumerate() {
            *word &= other.block(b);
        }
    }

    /// Adds every bit set in `other`.
    ///
    /// # Panics
    ///
    /// Panics if the capacities differ.
    #[track_caller]
    pub fn union_with(&mut self, other: &impl SetBits) {
        assert_eq!(self.bits, other.bit_len(), "bit set capacity mismatch");
        for (b, word) in self.blocks.iter_mut().enumerate() {
            *word |= other.block(b);
        }
    }
}

impl SetBits for BitSet {
    #[inline]
    fn bit_len(&self) -> usize {
        self.bits
    }

    #[inline]
    fn block_count(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    fn block(&self, block: usize) -> u64 {
        self.blocks[block]
    }
}

impl BitAnd for &BitSet {
    type Output = BitSet;

    fn bitand(self, rhs: Self) -> BitSet {
        let mut out = self.clone();
        out.intersect_with(rhs);
        out
    }
}

impl BitOr for &BitSet {
    type Output = BitSet;

    fn bitor(self, rhs: Self) -> BitSet {
        let mut out = self.clone();
        out.union_with(rhs);
        out
    }
}

// =============================================================================
// AtomicBitSet
// =============================================================================

/// Fixed-capacity bit set with per-block atomic updates.
///
/// All operations use `Ordering::Relaxed`: marking is idempotent and the
/// result is only read after the marking threads have been joined.
#[derive(Debug, Default)]
pub struct AtomicBitSet {
    blocks: Vec<AtomicU64>,
    bits: usize,
}

impl AtomicBitSet {
    /// Creates an atomic bit set of `bits` capacity with every bit cleared.
    #[must_use]
    pub fn new(bits: usize) -> Self {
        Self {
            blocks: (0..block_count_for(bits)).map(|_| AtomicU64::new(0)).collect(),
            bits,
        }
    }

    /// Sets the bit at `index`. Returns `true` if this call flipped it.
    ///
    /// # Panics
    ///
    /// Panics if `index >= bit_len()`.
    #[inline]
    #[track_caller]
    pub fn set_atomic(&self, index: usize) -> bool {
        assert!(index < self.bits, "bit {index} out of range ({})", self.bits);
        let (block, mask) = split(index);
        self.blocks[block].fetch_or(mask, Ordering::Relaxed) & mask == 0
    }

    /// Clears the bit at `index`. Returns `true` if this call flipped it.
    ///
    /// # Panics
    ///
    /// Panics if `index >= bit_len()`.
    #[inline]
    #[track_caller]
    pub fn reset_atomic(&self, index: usize) -> bool {
        assert!(index < self.bits, "bit {index} out of range ({})", self.bits);
        let (block, mask) = split(index);
        self.blocks[block].fetch_and(!mask, Ordering::Relaxed) & mask != 0
    }

    /// Clears every bit.
    pub fn clear(&self) {
        for block in &self.blocks {
            block.store(0, Ordering::Relaxed);
        }
    }

    /// Consumes the atomic set, returning a plain one without copying blocks
    /// through atomics.
    #[must_use]
    pub fn into_bitset(self) -> BitSet {
        BitSet {
            blocks: self.blocks.into_iter().map(AtomicU64::into_inner).collect(),
            bits: self.bits,
        }
    }
}

impl SetBits for AtomicBitSet {
    #[inline]
    fn bit_len(&self) -> usize {
        self.bits
    }

    #[inline]
    fn block_count(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    fn block(&self, block: usize) -> u64 {
        self.blocks[block].load(Ordering::Relaxed)
    }
}

impl From<BitSet> for AtomicBitSet {
    fn from(set: BitSet) -> Self {
        Self {
            blocks: set.blocks.into_iter().map(AtomicU64::new).collect(),
            bits: set.bits,
        }
    }
}
