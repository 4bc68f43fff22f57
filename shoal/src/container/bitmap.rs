//! A container encoding that stores members in a fixed-size bitset.

use crate::container::array::ArrayContainer;
use crate::container::run::{Run, RunContainer};
use crate::container::Container;
use crate::words;

/// A container encoding that stores members in a fixed-size bitset.
///
/// `BitmapContainer` represents a bucket as one bit per possible low-order
/// value: exactly [`WORDS`](Self::WORDS) `u64` words (65536 bits). It is
/// the dense encoding, efficient when many values are present or when
/// arbitrary point updates dominate.
///
/// The cardinality is cached and maintained incrementally by every
/// mutation; it is never recomputed by a full scan on the hot path. The
/// cache is always valid; the transiently-dirty state used by the
/// parallel OR reducer lives in the separate [`LazyBitmap`] type, which
/// carries no cardinality at all until repaired.
#[derive(Clone)]
pub struct BitmapContainer {
    /// One bit per value, LSB-first, exactly `WORDS` words.
    words: Box<[u64]>,
    /// Always equals the population count of `words`.
    cardinality: u32,
}

impl BitmapContainer {
    /// Number of 64-bit words backing a bitmap container.
    pub const WORDS: usize = 1024;

    /// Creates an empty bitmap container.
    ///
    /// An empty (or merely small) bitmap is not a canonical encoding; it
    /// exists transiently while an operation or conversion is in flight.
    pub fn empty() -> BitmapContainer {
        BitmapContainer {
            words: vec![0u64; Self::WORDS].into_boxed_slice(),
            cardinality: 0,
        }
    }

    /// Creates a bitmap container from a slice of sorted, unique values.
    pub fn from_sorted_slice(values: &[u16]) -> BitmapContainer {
        let mut bitmap = Self::empty();
        for &v in values {
            bitmap.words[v as usize / 64] |= 1u64 << (v % 64);
        }
        bitmap.cardinality = values.len() as u32;
        bitmap
    }

    /// Creates a bitmap container covering the closed range `[first, last]`.
    pub fn from_range(first: u16, last: u16) -> BitmapContainer {
        let mut bitmap = Self::empty();
        bitmap.insert_range(first, last);
        bitmap
    }

    /// Returns the backing words.
    #[inline]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Returns the cached cardinality.
    #[inline]
    pub fn cardinality(&self) -> u32 {
        self.cardinality
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cardinality == 0
    }

    /// Single-word membership test.
    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        self.words[value as usize / 64] & (1u64 << (value % 64)) != 0
    }

    /// Sets the bit for `value`. Returns whether it was newly set.
    ///
    /// The cardinality delta is the XOR of the before/after word shifted
    /// back down: 0 or 1, no recount and no branch.
    #[inline]
    pub fn insert(&mut self, value: u16) -> bool {
        let idx = value as usize / 64;
        let bit = value % 64;
        let old = self.words[idx];
        let new = old | (1u64 << bit);
        self.words[idx] = new;
        let delta = ((old ^ new) >> bit) as u32;
        self.cardinality += delta;
        delta != 0
    }

    /// Clears the bit for `value`. Returns whether it was present.
    #[inline]
    pub fn remove(&mut self, value: u16) -> bool {
        let idx = value as usize / 64;
        let bit = value % 64;
        let old = self.words[idx];
        let new = old & !(1u64 << bit);
        self.words[idx] = new;
        let delta = ((old ^ new) >> bit) as u32;
        self.cardinality -= delta;
        delta != 0
    }

    /// Sets every bit in the closed range `[first, last]`, one masked word
    /// at a time.
    pub fn insert_range(&mut self, first: u16, last: u16) {
        debug_assert!(first <= last);
        let first_word = first as usize / 64;
        let last_word = last as usize / 64;
        for w in first_word..=last_word {
            let lo = if w == first_word { first as u32 % 64 } else { 0 };
            let hi = if w == last_word { last as u32 % 64 } else { 63 };
            let mask = words::range_mask(lo, hi);
            let old = self.words[w];
            let new = old | mask;
            self.words[w] = new;
            self.cardinality += (old ^ new).count_ones();
        }
    }

    /// Computes the union of two bitmap containers, word-wise. The result
    /// cardinality comes from the fused popcount primitive over the
    /// inputs, not from re-scanning the result.
    pub fn union(&self, other: &BitmapContainer) -> BitmapContainer {
        let cardinality = words::or_cardinality(&self.words, &other.words);
        let words: Box<[u64]> = self
            .words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| a | b)
            .collect();
        BitmapContainer { words, cardinality }
    }

    /// Computes the intersection of two bitmap containers.
    pub fn intersect(&self, other: &BitmapContainer) -> BitmapContainer {
        let cardinality = words::and_cardinality(&self.words, &other.words);
        let words: Box<[u64]> = self
            .words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| a & b)
            .collect();
        BitmapContainer { words, cardinality }
    }

    /// Computes `self ∖ other`.
    pub fn difference(&self, other: &BitmapContainer) -> BitmapContainer {
        let cardinality = words::and_not_cardinality(&self.words, &other.words);
        let words: Box<[u64]> = self
            .words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| a & !b)
            .collect();
        BitmapContainer { words, cardinality }
    }

    /// Computes the symmetric difference of two bitmap containers.
    pub fn symmetric_difference(&self, other: &BitmapContainer) -> BitmapContainer {
        let cardinality = words::xor_cardinality(&self.words, &other.words);
        let words: Box<[u64]> = self
            .words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| a ^ b)
            .collect();
        BitmapContainer { words, cardinality }
    }

    /// In-place union with another bitmap.
    pub fn union_with(&mut self, other: &BitmapContainer) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a |= b;
        }
        self.cardinality = words::count_ones(&self.words);
    }

    /// In-place intersection with another bitmap.
    pub fn intersect_with(&mut self, other: &BitmapContainer) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a &= b;
        }
        self.cardinality = words::count_ones(&self.words);
    }

    /// In-place difference with another bitmap.
    pub fn difference_with(&mut self, other: &BitmapContainer) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a &= !b;
        }
        self.cardinality = words::count_ones(&self.words);
    }

    /// In-place symmetric difference with another bitmap.
    pub fn symmetric_difference_with(&mut self, other: &BitmapContainer) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a ^= b;
        }
        self.cardinality = words::count_ones(&self.words);
    }

    /// In-place union with an array: iterate the array, set bits, maintain
    /// the cardinality incrementally.
    pub fn union_with_array(&mut self, array: &ArrayContainer) {
        for &v in array.values() {
            self.insert(v);
        }
    }

    /// In-place difference with an array: clear each listed bit.
    pub fn difference_with_array(&mut self, array: &ArrayContainer) {
        for &v in array.values() {
            self.remove(v);
        }
    }

    /// In-place symmetric difference with an array: flip each listed bit
    /// with a signed cardinality delta.
    pub fn symmetric_difference_with_array(&mut self, array: &ArrayContainer) {
        for &v in array.values() {
            let idx = v as usize / 64;
            let bit = v % 64;
            let old = self.words[idx];
            let new = old ^ (1u64 << bit);
            self.words[idx] = new;
            if new & (1u64 << bit) != 0 {
                self.cardinality += 1;
            } else {
                self.cardinality -= 1;
            }
        }
    }

    /// Returns true if the two bitmaps share at least one member.
    pub fn intersects(&self, other: &BitmapContainer) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// Complements the closed range `[first, last]` in place.
    ///
    /// The full universe takes the word-wise path; otherwise only the
    /// touched words are rewritten, boundary words under a closed-form
    /// mask and interior words in full. The cardinality delta is
    /// accumulated from per-word before/after popcounts. `range_mask`
    /// owns the `hi == 63` case where the naive mask formula would shift
    /// by 64.
    pub fn complement_range_in_place(&mut self, first: u16, last: u16) {
        debug_assert!(first <= last);
        if first == 0 && last == u16::MAX {
            for w in self.words.iter_mut() {
                *w = !*w;
            }
            self.cardinality = (1 << 16) - self.cardinality;
            return;
        }

        let first_word = first as usize / 64;
        let last_word = last as usize / 64;
        for w in first_word..=last_word {
            let lo = if w == first_word { first as u32 % 64 } else { 0 };
            let hi = if w == last_word { last as u32 % 64 } else { 63 };
            let mask = words::range_mask(lo, hi);
            let old = self.words[w];
            let new = old ^ mask;
            self.words[w] = new;
            self.cardinality -= (old & mask).count_ones();
            self.cardinality += (new & mask).count_ones();
        }
    }

    /// Position of the first set bit at or after `from`, the basis of the
    /// ascending iterator.
    #[inline]
    pub fn next_set_bit(&self, from: u32) -> Option<u16> {
        if from >= 1 << 16 {
            return None;
        }
        words::next_set_bit(&self.words, from as usize).map(|pos| pos as u16)
    }

    /// Smallest member, if any.
    pub fn min(&self) -> Option<u16> {
        self.next_set_bit(0)
    }

    /// Largest member, if any.
    pub fn max(&self) -> Option<u16> {
        for (i, &w) in self.words.iter().enumerate().rev() {
            if w != 0 {
                let bit = 63 - w.leading_zeros();
                return Some((i as u32 * 64 + bit) as u16);
            }
        }
        None
    }

    /// Number of members less than or equal to `value`.
    pub fn rank(&self, value: u16) -> usize {
        let idx = value as usize / 64;
        let bit = value as u32 % 64;
        let prefix = words::count_ones(&self.words[..idx]) as usize;
        prefix + (self.words[idx] & words::range_mask(0, bit)).count_ones() as usize
    }

    /// The `n`-th (0-based) smallest member.
    pub fn select(&self, n: usize) -> Option<u16> {
        if n >= self.cardinality as usize {
            return None;
        }
        let mut n = n as u32;
        for (i, &w) in self.words.iter().enumerate() {
            let ones = w.count_ones();
            if n < ones {
                return Some((i as u32 * 64 + words::select_in_word(w, n)) as u16);
            }
            n -= ones;
        }
        None
    }

    /// Counts the runs of consecutive members.
    pub fn count_runs(&self) -> usize {
        words::count_runs(&self.words)
    }

    /// Converts this bitmap into the sorted-array encoding.
    pub fn to_array(&self) -> ArrayContainer {
        words_to_array(&self.words, self.cardinality)
    }

    /// Converts this bitmap into the run-length encoding.
    pub fn to_runs(&self) -> RunContainer {
        let mut runs = Vec::with_capacity(self.count_runs());
        let mut from = 0usize;
        while let Some(start) = words::next_set_bit(&self.words, from) {
            let end = words::next_clear_bit(&self.words, start);
            runs.push(Run {
                first: start as u16,
                last: (end - 1) as u16,
            });
            if end >= 1 << 16 {
                break;
            }
            from = end;
        }
        RunContainer::new(runs)
    }

    /// Verifies the representation invariants, reporting the first
    /// violation as an error. Intended for integrity checks and test
    /// harnesses, not for the hot path.
    pub fn validate(&self) -> crate::Result<()> {
        if self.words.len() != Self::WORDS {
            return Err(crate::Error::storage_bound(format!(
                "bitmap holds {} words, expected {}",
                self.words.len(),
                Self::WORDS
            )));
        }
        let actual = words::count_ones(&self.words);
        if actual != self.cardinality {
            return Err(crate::Error::cardinality_mismatch(self.cardinality, actual));
        }
        Ok(())
    }
}

/// Collects the set bits of a word array into a sorted array container.
fn words_to_array(word_slice: &[u64], cardinality: u32) -> ArrayContainer {
    let mut out = Vec::with_capacity(cardinality as usize);
    for (i, &w0) in word_slice.iter().enumerate() {
        let mut w = w0;
        let base = i as u32 * 64;
        while w != 0 {
            out.push((base + w.trailing_zeros()) as u16);
            w &= w - 1;
        }
    }
    debug_assert_eq!(out.len(), cardinality as usize);
    ArrayContainer::new(out)
}

/// A deferred-cardinality bitmap accumulator for the parallel OR reducer.
///
/// `LazyBitmap` is the dirty intermediate state of a multi-way union:
/// a word array with no cardinality cache at all, so none can go
/// stale. Unions fold into it without counting; [`repair`](Self::repair)
/// consumes the accumulator and produces a canonical [`Container`],
/// recounting, demoting an undersized result to an array, and
/// special-casing a provably-full result. The type system keeps a dirty
/// accumulator from escaping into general-purpose code.
pub struct LazyBitmap {
    words: Box<[u64]>,
}

impl LazyBitmap {
    /// Starts an accumulator holding the contents of `container`.
    pub fn from_container(container: &Container) -> LazyBitmap {
        let mut lazy = LazyBitmap {
            words: vec![0u64; BitmapContainer::WORDS].into_boxed_slice(),
        };
        lazy.union_with(container);
        lazy
    }

    /// Folds one more container into the accumulator. No cardinality is
    /// maintained.
    pub fn union_with(&mut self, container: &Container) {
        match container {
            Container::Array(array) => {
                for &v in array.values() {
                    self.words[v as usize / 64] |= 1u64 << (v % 64);
                }
            }
            Container::Bitmap(bitmap) => {
                for (a, b) in self.words.iter_mut().zip(bitmap.words.iter()) {
                    *a |= b;
                }
            }
            Container::Run(run) => {
                for r in run.runs() {
                    let first_word = r.first as usize / 64;
                    let last_word = r.last as usize / 64;
                    for w in first_word..=last_word {
                        let lo = if w == first_word { r.first as u32 % 64 } else { 0 };
                        let hi = if w == last_word { r.last as u32 % 64 } else { 63 };
                        self.words[w] |= words::range_mask(lo, hi);
                    }
                }
            }
        }
    }

    /// Repairs the accumulator into a canonical container.
    ///
    /// Recomputes the cardinality, demotes to an array at or below the
    /// promotion threshold, and recognizes the full bucket as a single
    /// run.
    pub fn repair(self) -> Container {
        let cardinality = words::count_ones(&self.words);
        if cardinality == 1 << 16 {
            return Container::Run(RunContainer::full());
        }
        if cardinality as usize <= Container::MAX_ARRAY_LEN {
            return Container::Array(words_to_array(&self.words, cardinality));
        }
        Container::Bitmap(BitmapContainer {
            words: self.words,
            cardinality,
        })
    }
}
