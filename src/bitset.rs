//! Fixed size bitset
//!
//! Used for row membership (rows holding a nominal value, rows with a set fingerprint bit, the
//! rows of a tree node) and for category subsets of nominal splits.

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

const WORD_BITS: usize = 64;

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BitSet {
    words: Vec<u64>,
    len: usize,
}

impl BitSet {
    /// Creates a bitset able to hold `len` bits, all cleared
    pub fn new(len: usize) -> Self {
        BitSet {
            words: vec![0; (len + WORD_BITS - 1) / WORD_BITS],
            len,
        }
    }

    pub fn from_indices<I: IntoIterator<Item = usize>>(len: usize, indices: I) -> Self {
        let mut set = BitSet::new(len);
        for idx in indices {
            set.insert(idx);
        }
        set
    }

    /// Number of addressable bits
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// ### Panics
    ///
    /// If `idx` is out of bounds
    pub fn insert(&mut self, idx: usize) {
        assert!(idx < self.len, "bit {} out of bounds ({})", idx, self.len);
        self.words[idx / WORD_BITS] |= 1 << (idx % WORD_BITS);
    }

    pub fn remove(&mut self, idx: usize) {
        if idx < self.len {
            self.words[idx / WORD_BITS] &= !(1 << (idx % WORD_BITS));
        }
    }

    pub fn contains(&self, idx: usize) -> bool {
        idx < self.len && (self.words[idx / WORD_BITS] >> (idx % WORD_BITS)) & 1 == 1
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterates the set bits in ascending order
    pub fn ones(&self) -> Ones<'_> {
        Ones::new(&self.words, None)
    }

    /// Iterates the bits set in both `self` and `other` in ascending order
    pub fn intersection<'a>(&'a self, other: &'a BitSet) -> Ones<'a> {
        Ones::new(&self.words, Some(&other.words))
    }
}

/// Iterator over set bits, optionally masked by a second word slice
pub struct Ones<'a> {
    words: &'a [u64],
    mask: Option<&'a [u64]>,
    word_idx: usize,
    current: u64,
}

impl<'a> Ones<'a> {
    fn new(words: &'a [u64], mask: Option<&'a [u64]>) -> Self {
        let mut ones = Ones {
            words,
            mask,
            word_idx: 0,
            current: 0,
        };
        ones.current = ones.word(0);
        ones
    }

    fn word(&self, idx: usize) -> u64 {
        let word = self.words.get(idx).copied().unwrap_or(0);
        match self.mask {
            Some(mask) => word & mask.get(idx).copied().unwrap_or(0),
            None => word,
        }
    }
}

impl<'a> Iterator for Ones<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.current == 0 {
            self.word_idx += 1;
            if self.word_idx >= self.words.len() {
                return None;
            }
            self.current = self.word(self.word_idx);
        }
        let bit = self.current.trailing_zeros() as usize;
        // clear lowest set bit
        self.current &= self.current - 1;
        Some(self.word_idx * WORD_BITS + bit)
    }
}
