//! Per-bucket containers and the polymorphic container algebra.
//!
//! - A container holds a subset of the 65536 possible low-order values of
//!   one bucket, in one of three encodings: sorted array, dense bitmap, or
//!   run list.
//! - Encodings trade space for speed: Array for sparse buckets, Bitmap for
//!   dense ones, Run when values cluster into long stretches.
//! - Binary operations dispatch on the pair of encodings; each pair either
//!   has a bespoke algorithm or converts the cheaper side and recurses.
//! - Results always come back in an encoding that is valid for their shape
//!   (see the size-class thresholds on [`Container`]); the only sanctioned
//!   exception is the [`LazyBitmap`] accumulator, which must be repaired
//!   before re-entering general-purpose code.

use std::ops::Range;

pub mod array;
pub mod bitmap;
pub mod iter;
pub mod run;

pub use array::ArrayContainer;
pub use bitmap::{BitmapContainer, LazyBitmap};
pub use iter::ValueIter;
pub use run::{Run, RunContainer};

/// The per-bucket value container, stored in one of three encodings.
///
/// Overview
/// - Represents a subset of `[0, 65536)` as 16-bit members.
/// - Membership, ascending iteration order, and cardinality are
///   encoding-independent observables; every operation preserves them.
/// - Mutating operations may swap the encoding in place by reassigning the
///   enum value wholesale; non-mutating operations return a new container
///   and leave the receiver untouched.
///
/// Size classes
/// - An array holds at most [`MAX_ARRAY_LEN`](Self::MAX_ARRAY_LEN) members;
///   the insert that would exceed it promotes to a bitmap.
/// - A bitmap whose cardinality drops to the threshold or below demotes
///   back to an array.
/// - [`optimize`](Self::optimize) re-encodes as a run list when
///   `2 + 4 × run_count` bytes undercuts both the bitmap (8192 bytes) and
///   the array (`2 × cardinality` bytes).
#[derive(Clone)]
pub enum Container {
    Array(ArrayContainer),
    Bitmap(BitmapContainer),
    Run(RunContainer),
}

/// Identifies the physical encoding used by a [`Container`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Sorted array of u16 members. Best for sparse buckets.
    Array,
    /// Fixed 1024-word bitset plus cached cardinality. Best for dense
    /// buckets.
    Bitmap,
    /// Disjoint ascending closed intervals. Best for long consecutive
    /// stretches.
    Run,
}

impl Container {
    /// Maximum cardinality stored in the array encoding. Inserting past
    /// this promotes to a bitmap; operation results at or below it demote
    /// back.
    pub const MAX_ARRAY_LEN: usize = 4096;

    /// The size of the logical value range represented by one container.
    pub const SPAN: u32 = 1 << 16;

    /// Serialized size of the bitmap encoding, the fixed yardstick of the
    /// canonicalization rule.
    pub const BITMAP_BYTES: usize = BitmapContainer::WORDS * 8;

    /// Creates an empty container (array-encoded, the canonical empty).
    pub fn empty() -> Container {
        Container::Array(ArrayContainer::empty())
    }

    /// Builds a container from sorted, unique values, choosing array or
    /// bitmap by cardinality. Call [`optimize`](Self::optimize) afterwards
    /// when a run encoding may win.
    pub fn from_sorted_values(values: impl Iterator<Item = u16>) -> Container {
        let values: Vec<u16> = values.collect();
        if values.len() <= Self::MAX_ARRAY_LEN {
            Container::Array(ArrayContainer::new(values))
        } else {
            Container::Bitmap(BitmapContainer::from_sorted_slice(&values))
        }
    }

    /// Builds a canonical container covering the closed range
    /// `[first, last]`.
    pub fn from_range(first: u16, last: u16) -> Container {
        let mut container = Container::Run(RunContainer::from_run(first, last));
        container.optimize();
        container
    }

    /// Returns the discriminant of this container as a [`ContainerKind`].
    #[inline]
    pub fn kind(&self) -> ContainerKind {
        match self {
            Container::Array(_) => ContainerKind::Array,
            Container::Bitmap(_) => ContainerKind::Bitmap,
            Container::Run(_) => ContainerKind::Run,
        }
    }

    /// Number of members.
    pub fn cardinality(&self) -> usize {
        match self {
            Container::Array(a) => a.cardinality(),
            Container::Bitmap(b) => b.cardinality() as usize,
            Container::Run(r) => r.cardinality(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        match self {
            Container::Array(a) => a.is_empty(),
            Container::Bitmap(b) => b.is_empty(),
            Container::Run(r) => r.is_empty(),
        }
    }

    /// Membership test.
    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        match self {
            Container::Array(a) => a.contains(value),
            Container::Bitmap(b) => b.contains(value),
            Container::Run(r) => r.contains(value),
        }
    }

    /// Inserts a value. An array at capacity converts to a bitmap first
    /// and delegates. Returns whether the value was newly added.
    pub fn insert(&mut self, value: u16) -> bool {
        match self {
            Container::Array(a) => {
                if a.cardinality() == Self::MAX_ARRAY_LEN && !a.contains(value) {
                    let mut bitmap = a.to_bitmap();
                    bitmap.insert(value);
                    *self = Container::Bitmap(bitmap);
                    true
                } else {
                    a.insert(value)
                }
            }
            Container::Bitmap(b) => b.insert(value),
            Container::Run(r) => r.insert(value),
        }
    }

    /// Removes a value. A bitmap dropping to the array threshold demotes.
    /// Returns whether the value was present.
    pub fn remove(&mut self, value: u16) -> bool {
        match self {
            Container::Array(a) => a.remove(value),
            Container::Bitmap(b) => {
                let removed = b.remove(value);
                if removed && b.cardinality() as usize <= Self::MAX_ARRAY_LEN {
                    let array = b.to_array();
                    *self = Container::Array(array);
                }
                removed
            }
            Container::Run(r) => r.remove(value),
        }
    }

    /// Unions the half-open range into this container and canonicalizes.
    pub fn insert_range(&mut self, range: Range<u32>) {
        let Some((first, last)) = closed_bounds(range) else {
            return;
        };
        self.union_with(&Container::Run(RunContainer::from_run(first, last)));
        self.optimize();
    }

    /// Returns a fresh ascending iterator over the members.
    pub fn iter(&self) -> ValueIter<'_> {
        ValueIter::over(self)
    }

    /// Smallest member, if any.
    pub fn min(&self) -> Option<u16> {
        match self {
            Container::Array(a) => a.min(),
            Container::Bitmap(b) => b.min(),
            Container::Run(r) => r.min(),
        }
    }

    /// Largest member, if any.
    pub fn max(&self) -> Option<u16> {
        match self {
            Container::Array(a) => a.max(),
            Container::Bitmap(b) => b.max(),
            Container::Run(r) => r.max(),
        }
    }

    /// Number of members less than or equal to `value`.
    pub fn rank(&self, value: u16) -> usize {
        match self {
            Container::Array(a) => a.rank(value),
            Container::Bitmap(b) => b.rank(value),
            Container::Run(r) => r.rank(value),
        }
    }

    /// The `n`-th (0-based) smallest member.
    pub fn select(&self, n: usize) -> Option<u16> {
        match self {
            Container::Array(a) => a.select(n),
            Container::Bitmap(b) => b.select(n),
            Container::Run(r) => r.select(n),
        }
    }

    /// Returns true if the two containers share at least one member,
    /// without materializing the intersection.
    pub fn intersects(&self, other: &Container) -> bool {
        match (self, other) {
            (Container::Array(a), Container::Array(b)) => a.intersects(b),
            (Container::Array(a), Container::Bitmap(b))
            | (Container::Bitmap(b), Container::Array(a)) => {
                a.values().iter().any(|&v| b.contains(v))
            }
            (Container::Bitmap(a), Container::Bitmap(b)) => a.intersects(b),
            (Container::Run(a), Container::Run(b)) => a.intersects(b),
            (Container::Run(r), Container::Array(a))
            | (Container::Array(a), Container::Run(r)) => {
                a.values().iter().any(|&v| r.contains(v))
            }
            (Container::Run(r), Container::Bitmap(b))
            | (Container::Bitmap(b), Container::Run(r)) => r.runs().iter().any(|run| {
                b.next_set_bit(run.first as u32)
                    .is_some_and(|v| v <= run.last)
            }),
        }
    }

    /// Computes the union of two containers.
    ///
    /// Same-encoding pairs use their bespoke merges, guarded so an array
    /// result cannot silently exceed the promotion threshold; a run
    /// operand routes through the bitmap algebra and the result is
    /// re-canonicalized.
    pub fn union(&self, other: &Container) -> Container {
        match (self, other) {
            (Container::Array(a), Container::Array(b)) => {
                if a.cardinality() + b.cardinality() <= Self::MAX_ARRAY_LEN {
                    Container::Array(a.union(b))
                } else {
                    let mut bitmap = a.to_bitmap();
                    bitmap.union_with_array(b);
                    demote_bitmap(bitmap)
                }
            }
            (Container::Array(a), Container::Bitmap(b))
            | (Container::Bitmap(b), Container::Array(a)) => {
                let mut bitmap = b.clone();
                bitmap.union_with_array(a);
                // Cardinality only grew; the bitmap stays above threshold.
                Container::Bitmap(bitmap)
            }
            (Container::Bitmap(a), Container::Bitmap(b)) => Container::Bitmap(a.union(b)),
            (Container::Run(a), Container::Run(b)) => {
                let mut result = Container::Run(a.union(b));
                result.optimize();
                result
            }
            (Container::Run(r), other) | (other, Container::Run(r)) => {
                let mut bitmap = r.to_bitmap();
                match other {
                    Container::Array(a) => bitmap.union_with_array(a),
                    Container::Bitmap(b) => bitmap.union_with(b),
                    Container::Run(_) => unreachable!("run/run union handled above"),
                }
                let mut result = demote_bitmap(bitmap);
                result.optimize();
                result
            }
        }
    }

    /// Computes the intersection of two containers.
    pub fn intersect(&self, other: &Container) -> Container {
        match (self, other) {
            (Container::Array(a), Container::Array(b)) => Container::Array(a.intersect(b)),
            (Container::Array(a), Container::Bitmap(b))
            | (Container::Bitmap(b), Container::Array(a)) => {
                // Probing the array's bits is cheaper than a word-wise AND.
                Container::Array(a.intersect_bitmap(b))
            }
            (Container::Bitmap(a), Container::Bitmap(b)) => demote_bitmap(a.intersect(b)),
            (Container::Run(a), Container::Run(b)) => {
                let mut result = Container::Run(a.intersect(b));
                result.optimize();
                result
            }
            (Container::Run(r), Container::Array(a))
            | (Container::Array(a), Container::Run(r)) => {
                let mut result = Container::Array(a.intersect_bitmap(&r.to_bitmap()));
                result.optimize();
                result
            }
            (Container::Run(r), Container::Bitmap(b))
            | (Container::Bitmap(b), Container::Run(r)) => {
                let mut result = demote_bitmap(r.to_bitmap().intersect(b));
                result.optimize();
                result
            }
        }
    }

    /// Computes `self ∖ other`.
    pub fn difference(&self, other: &Container) -> Container {
        match (self, other) {
            (Container::Array(a), Container::Array(b)) => Container::Array(a.difference(b)),
            (Container::Array(a), Container::Bitmap(b)) => {
                Container::Array(a.difference_bitmap(b))
            }
            (Container::Array(a), Container::Run(r)) => {
                let mut result = Container::Array(a.difference_bitmap(&r.to_bitmap()));
                result.optimize();
                result
            }
            (Container::Bitmap(b), Container::Array(a)) => {
                let mut bitmap = b.clone();
                bitmap.difference_with_array(a);
                demote_bitmap(bitmap)
            }
            (Container::Bitmap(a), Container::Bitmap(b)) => demote_bitmap(a.difference(b)),
            (Container::Bitmap(b), Container::Run(r)) => {
                let mut bitmap = b.clone();
                bitmap.difference_with(&r.to_bitmap());
                let mut result = demote_bitmap(bitmap);
                result.optimize();
                result
            }
            (Container::Run(a), Container::Run(b)) => {
                let mut result = Container::Run(a.difference(b));
                result.optimize();
                result
            }
            (Container::Run(r), Container::Array(a)) => {
                let mut bitmap = r.to_bitmap();
                bitmap.difference_with_array(a);
                let mut result = demote_bitmap(bitmap);
                result.optimize();
                result
            }
            (Container::Run(r), Container::Bitmap(b)) => {
                let mut result = demote_bitmap(r.to_bitmap().difference(b));
                result.optimize();
                result
            }
        }
    }

    /// Computes the symmetric difference of two containers.
    pub fn symmetric_difference(&self, other: &Container) -> Container {
        match (self, other) {
            (Container::Array(a), Container::Array(b)) => {
                if a.cardinality() + b.cardinality() <= Self::MAX_ARRAY_LEN {
                    Container::Array(a.symmetric_difference(b))
                } else {
                    let mut bitmap = a.to_bitmap();
                    bitmap.symmetric_difference_with_array(b);
                    demote_bitmap(bitmap)
                }
            }
            (Container::Array(a), Container::Bitmap(b))
            | (Container::Bitmap(b), Container::Array(a)) => {
                let mut bitmap = b.clone();
                bitmap.symmetric_difference_with_array(a);
                demote_bitmap(bitmap)
            }
            (Container::Bitmap(a), Container::Bitmap(b)) => {
                demote_bitmap(a.symmetric_difference(b))
            }
            (Container::Run(a), Container::Run(b)) => {
                let mut result = Container::Run(a.symmetric_difference(b));
                result.optimize();
                result
            }
            (Container::Run(r), other) | (other, Container::Run(r)) => {
                let mut bitmap = r.to_bitmap();
                match other {
                    Container::Array(a) => bitmap.symmetric_difference_with_array(a),
                    Container::Bitmap(b) => bitmap.symmetric_difference_with(b),
                    Container::Run(_) => unreachable!("run/run xor handled above"),
                }
                let mut result = demote_bitmap(bitmap);
                result.optimize();
                result
            }
        }
    }

    /// In-place union with `other`.
    pub fn union_with(&mut self, other: &Container) {
        if let (Container::Bitmap(a), Container::Bitmap(b)) = (&mut *self, other) {
            a.union_with(b);
            return;
        }
        if let (Container::Bitmap(a), Container::Array(b)) = (&mut *self, other) {
            a.union_with_array(b);
            return;
        }
        *self = self.union(other);
    }

    /// In-place intersection with `other`.
    pub fn intersect_with(&mut self, other: &Container) {
        if let (Container::Bitmap(a), Container::Bitmap(b)) = (&mut *self, other) {
            a.intersect_with(b);
            self.demote_in_place();
            return;
        }
        *self = self.intersect(other);
    }

    /// In-place difference with `other`.
    pub fn difference_with(&mut self, other: &Container) {
        if let (Container::Bitmap(a), Container::Bitmap(b)) = (&mut *self, other) {
            a.difference_with(b);
            self.demote_in_place();
            return;
        }
        if let (Container::Bitmap(a), Container::Array(b)) = (&mut *self, other) {
            a.difference_with_array(b);
            self.demote_in_place();
            return;
        }
        *self = self.difference(other);
    }

    /// In-place symmetric difference with `other`.
    pub fn symmetric_difference_with(&mut self, other: &Container) {
        if let (Container::Bitmap(a), Container::Bitmap(b)) = (&mut *self, other) {
            a.symmetric_difference_with(b);
            self.demote_in_place();
            return;
        }
        if let (Container::Bitmap(a), Container::Array(b)) = (&mut *self, other) {
            a.symmetric_difference_with_array(b);
            self.demote_in_place();
            return;
        }
        *self = self.symmetric_difference(other);
    }

    /// Complement restricted to the half-open range, as a new container.
    ///
    /// An empty or inverted range is identity: the result is a clone of
    /// the receiver, by policy rather than an error.
    pub fn complement_range(&self, range: Range<u32>) -> Container {
        let Some((first, last)) = closed_bounds(range) else {
            return self.clone();
        };
        match self {
            Container::Array(a) => {
                if projected_complement(a, first, last) > Self::MAX_ARRAY_LEN {
                    let mut bitmap = a.to_bitmap();
                    bitmap.complement_range_in_place(first, last);
                    Container::Bitmap(bitmap)
                } else {
                    Container::Array(a.complement_range(first, last))
                }
            }
            Container::Bitmap(b) => {
                let mut bitmap = b.clone();
                bitmap.complement_range_in_place(first, last);
                demote_bitmap(bitmap)
            }
            Container::Run(r) => {
                let mut result = Container::Run(r.complement_range(first, last));
                result.optimize();
                result
            }
        }
    }

    /// In-place variant of [`complement_range`](Self::complement_range).
    /// An empty or inverted range is a no-op.
    pub fn complement_range_in_place(&mut self, range: Range<u32>) {
        let Some((first, last)) = closed_bounds(range) else {
            return;
        };
        match self {
            Container::Array(a) => {
                if projected_complement(a, first, last) > Self::MAX_ARRAY_LEN {
                    let mut bitmap = a.to_bitmap();
                    bitmap.complement_range_in_place(first, last);
                    *self = Container::Bitmap(bitmap);
                } else {
                    a.complement_range_in_place(first, last);
                }
            }
            Container::Bitmap(b) => {
                b.complement_range_in_place(first, last);
                self.demote_in_place();
            }
            Container::Run(r) => {
                let mut result = Container::Run(r.complement_range(first, last));
                result.optimize();
                *self = result;
            }
        }
    }

    /// Starts a deferred-cardinality union of two containers. Used by the
    /// parallel OR reducer; the returned accumulator must be
    /// [`repair`](LazyBitmap::repair)ed before the result is used as a
    /// container.
    pub fn lazy_union(&self, other: &Container) -> LazyBitmap {
        let mut lazy = LazyBitmap::from_container(self);
        lazy.union_with(other);
        lazy
    }

    /// Appends every member, widened to `u32` and OR-ed with
    /// `high_bits`, onto `out`. This is how a bucket flattens back into
    /// full-width values; `high_bits` must have its low 16 bits clear.
    pub fn collect_into(&self, high_bits: u32, out: &mut Vec<u32>) {
        debug_assert_eq!(high_bits & 0xFFFF, 0);
        out.reserve(self.cardinality());
        match self {
            Container::Array(a) => {
                out.extend(a.values().iter().map(|&v| high_bits | v as u32));
            }
            Container::Bitmap(b) => {
                for (i, &w0) in b.words().iter().enumerate() {
                    let mut w = w0;
                    let base = i as u32 * 64;
                    while w != 0 {
                        out.push(high_bits | (base + w.trailing_zeros()));
                        w &= w - 1;
                    }
                }
            }
            Container::Run(r) => {
                for run in r.runs() {
                    out.extend((run.first as u32..=run.last as u32).map(|v| high_bits | v));
                }
            }
        }
    }

    /// Re-encodes this container in place into the smallest valid
    /// encoding for its current contents, per the size-class rule.
    /// Idempotent; returns the resulting kind.
    pub fn optimize(&mut self) -> ContainerKind {
        let kind = self.kind();
        let cardinality = self.cardinality();
        let run_count = match self {
            Container::Array(a) => a.count_runs(),
            Container::Bitmap(b) => b.count_runs(),
            Container::Run(r) => r.n_runs(),
        };
        let optimal = Self::infer_optimal_kind(cardinality, run_count);
        if optimal == kind {
            self.compact();
            return kind;
        }

        let replacement = match (&*self, optimal) {
            (Container::Array(a), ContainerKind::Bitmap) => Container::Bitmap(a.to_bitmap()),
            (Container::Array(a), ContainerKind::Run) => {
                Container::Run(RunContainer::from_sorted_values(a.values().iter().copied()))
            }
            (Container::Bitmap(b), ContainerKind::Array) => Container::Array(b.to_array()),
            (Container::Bitmap(b), ContainerKind::Run) => Container::Run(b.to_runs()),
            (Container::Run(r), ContainerKind::Array) => Container::Array(r.to_array()),
            (Container::Run(r), ContainerKind::Bitmap) => Container::Bitmap(r.to_bitmap()),
            _ => unreachable!("encoding switch {kind:?} -> {optimal:?}"),
        };
        *self = replacement;
        optimal
    }

    /// The smallest valid encoding for the given shape: run when its
    /// serialized size undercuts both alternatives, otherwise array or
    /// bitmap by the cardinality threshold.
    pub fn infer_optimal_kind(cardinality: usize, run_count: usize) -> ContainerKind {
        let run_bytes = RunContainer::serialized_size(run_count);
        let array_bytes = 2 * cardinality;
        if run_bytes <= Self::BITMAP_BYTES.min(array_bytes) {
            ContainerKind::Run
        } else if cardinality <= Self::MAX_ARRAY_LEN {
            ContainerKind::Array
        } else {
            ContainerKind::Bitmap
        }
    }

    /// Shrinks the current encoding's backing storage without changing
    /// contents or kind.
    pub fn compact(&mut self) {
        match self {
            Container::Array(a) => a.compact(),
            Container::Run(r) => r.compact(),
            Container::Bitmap(_) => (),
        }
    }

    /// Verifies the representation invariants of the current encoding,
    /// including the size-class rule (a bitmap at or below the array
    /// threshold is a representation violation). Never called on the hot
    /// path; intended for integrity checks and tests.
    pub fn validate(&self) -> crate::Result<()> {
        match self {
            Container::Array(a) => {
                a.check_invariants()?;
                if a.cardinality() > Self::MAX_ARRAY_LEN {
                    return Err(crate::Error::storage_bound(format!(
                        "array holds {} values, over the {} threshold",
                        a.cardinality(),
                        Self::MAX_ARRAY_LEN
                    )));
                }
                Ok(())
            }
            Container::Bitmap(b) => {
                b.validate()?;
                if b.cardinality() as usize <= Self::MAX_ARRAY_LEN {
                    return Err(crate::Error::under_threshold(b.cardinality()));
                }
                Ok(())
            }
            Container::Run(r) => r.check_invariants(),
        }
    }

    fn demote_in_place(&mut self) {
        if let Container::Bitmap(b) = self {
            if b.cardinality() as usize <= Self::MAX_ARRAY_LEN {
                let array = b.to_array();
                *self = Container::Array(array);
            }
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Container::empty()
    }
}

impl PartialEq for Container {
    /// Encoding-independent set equality.
    fn eq(&self, other: &Container) -> bool {
        self.cardinality() == other.cardinality() && self.iter().eq(other.iter())
    }
}

impl Eq for Container {}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self.kind(), self.cardinality())
    }
}

/// Wraps a bitmap as a container, demoting to an array when the
/// cardinality is at or below the promotion threshold.
fn demote_bitmap(bitmap: BitmapContainer) -> Container {
    if bitmap.cardinality() as usize <= Container::MAX_ARRAY_LEN {
        Container::Array(bitmap.to_array())
    } else {
        Container::Bitmap(bitmap)
    }
}

/// Cardinality of an array's range complement, computed analytically
/// before any storage is touched.
fn projected_complement(array: &ArrayContainer, first: u16, last: u16) -> usize {
    let range_len = last as usize - first as usize + 1;
    let in_range = array.count_in_range(first, last);
    array.cardinality() + range_len - 2 * in_range
}

/// Converts a half-open `u32` range into closed u16 bounds, clamped to
/// the container span. Empty and inverted ranges yield `None`.
fn closed_bounds(range: Range<u32>) -> Option<(u16, u16)> {
    if range.start >= range.end || range.start >= Container::SPAN {
        return None;
    }
    let first = range.start as u16;
    let last = (range.end.min(Container::SPAN) - 1) as u16;
    Some((first, last))
}
