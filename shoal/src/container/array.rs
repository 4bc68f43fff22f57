//! A container encoding that stores members as an explicit sorted list.

use crate::container::bitmap::BitmapContainer;

/// A container encoding that stores members as an explicit sorted list.
///
/// `ArrayContainer` is the sparse encoding of the container data structure,
/// optimized for buckets holding relatively few of the 65536 possible
/// low-order values. Members are stored as a strictly increasing `Vec<u16>`
/// with no duplicates; cardinality is the vector length.
///
/// # Memory efficiency
///
/// Each member costs 2 bytes. Once the cardinality exceeds
/// [`Container::MAX_ARRAY_LEN`] (4096), the dense bitmap encoding is
/// smaller and the enclosing [`Container`] promotes; the promotion itself
/// is driven by the dispatcher, never by this type.
///
/// [`Container`]: crate::container::Container
/// [`Container::MAX_ARRAY_LEN`]: crate::container::Container::MAX_ARRAY_LEN
#[derive(Clone)]
pub struct ArrayContainer {
    /// Strictly increasing member values, no duplicates.
    values: Vec<u16>,
}

/// Counts the number of runs (maximal sequences of consecutive values) in a
/// sorted, unique slice.
///
/// For example, `[0,1,2, 4,5, 9]` contains 3 runs: `[0-2]`, `[4-5]`, `[9]`.
pub(crate) fn count_runs(values: &[u16]) -> usize {
    let mut runs = 0usize;
    let mut prev = None::<u16>;
    for &v in values {
        if prev != v.checked_sub(1) {
            runs += 1;
        }
        prev = Some(v);
    }
    runs
}

impl ArrayContainer {
    pub(crate) fn new(values: Vec<u16>) -> ArrayContainer {
        let container = ArrayContainer { values };

        #[cfg(debug_assertions)]
        container
            .check_invariants()
            .expect("array container invariants");

        container
    }

    /// Creates a new empty `ArrayContainer`.
    pub fn empty() -> ArrayContainer {
        ArrayContainer { values: Vec::new() }
    }

    /// Creates a new empty `ArrayContainer` with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> ArrayContainer {
        ArrayContainer {
            values: Vec::with_capacity(capacity),
        }
    }

    /// Creates an `ArrayContainer` from a slice of sorted, unique values.
    pub fn from_sorted_slice(values: &[u16]) -> ArrayContainer {
        ArrayContainer::new(values.to_vec())
    }

    /// Creates an `ArrayContainer` from an iterator of sorted, unique values.
    pub fn from_sorted_values(values: impl Iterator<Item = u16>) -> ArrayContainer {
        ArrayContainer::new(values.collect())
    }

    /// Returns the member values, strictly increasing.
    #[inline]
    pub fn values(&self) -> &[u16] {
        &self.values
    }

    /// Returns the number of members.
    #[inline]
    pub fn cardinality(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Counts the runs of consecutive members.
    #[inline]
    pub fn count_runs(&self) -> usize {
        count_runs(&self.values)
    }

    /// Checks membership by binary search, O(log n).
    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        self.values.binary_search(&value).is_ok()
    }

    /// Inserts a value, keeping the list sorted. Returns whether the value
    /// was newly added.
    ///
    /// Promotion to a bitmap at the size threshold is the responsibility of
    /// the enclosing [`Container::insert`](crate::container::Container::insert).
    pub fn insert(&mut self, value: u16) -> bool {
        match self.values.binary_search(&value) {
            Ok(_) => false,
            Err(pos) => {
                self.values.insert(pos, value);
                true
            }
        }
    }

    /// Removes a value. Returns whether it was present.
    pub fn remove(&mut self, value: u16) -> bool {
        match self.values.binary_search(&value) {
            Ok(pos) => {
                self.values.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Smallest member, if any.
    #[inline]
    pub fn min(&self) -> Option<u16> {
        self.values.first().copied()
    }

    /// Largest member, if any.
    #[inline]
    pub fn max(&self) -> Option<u16> {
        self.values.last().copied()
    }

    /// Number of members less than or equal to `value`.
    #[inline]
    pub fn rank(&self, value: u16) -> usize {
        self.values.partition_point(|&v| v <= value)
    }

    /// The `n`-th (0-based) smallest member.
    #[inline]
    pub fn select(&self, n: usize) -> Option<u16> {
        self.values.get(n).copied()
    }

    /// Computes the union of two array containers as a two-pointer merge.
    ///
    /// The caller is responsible for routing unions whose upper-bound
    /// cardinality crosses the promotion threshold through the bitmap path
    /// instead; this method always materializes an array.
    pub fn union(&self, other: &ArrayContainer) -> ArrayContainer {
        let mut out = Vec::with_capacity(self.values.len() + other.values.len());
        let (a, b) = (&self.values, &other.values);
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                std::cmp::Ordering::Less => {
                    out.push(a[i]);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    out.push(b[j]);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    out.push(a[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&a[i..]);
        out.extend_from_slice(&b[j..]);
        ArrayContainer::new(out)
    }

    /// Computes the intersection of two array containers.
    pub fn intersect(&self, other: &ArrayContainer) -> ArrayContainer {
        let mut out = Vec::with_capacity(self.values.len().min(other.values.len()));
        let (a, b) = (&self.values, &other.values);
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    out.push(a[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        ArrayContainer::new(out)
    }

    /// Computes `self ∖ other`.
    pub fn difference(&self, other: &ArrayContainer) -> ArrayContainer {
        let mut out = Vec::with_capacity(self.values.len());
        let (a, b) = (&self.values, &other.values);
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                std::cmp::Ordering::Less => {
                    out.push(a[i]);
                    i += 1;
                }
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&a[i..]);
        ArrayContainer::new(out)
    }

    /// Computes the symmetric difference of two array containers.
    ///
    /// As with [`union`](Self::union), threshold routing is the caller's job.
    pub fn symmetric_difference(&self, other: &ArrayContainer) -> ArrayContainer {
        let mut out = Vec::with_capacity(self.values.len() + other.values.len());
        let (a, b) = (&self.values, &other.values);
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                std::cmp::Ordering::Less => {
                    out.push(a[i]);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    out.push(b[j]);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&a[i..]);
        out.extend_from_slice(&b[j..]);
        ArrayContainer::new(out)
    }

    /// Intersects with a bitmap by testing each member's bit.
    ///
    /// This is the one mixed-encoding algorithm implemented array-side:
    /// probing `|self|` bits is cheaper than materializing a second bitmap.
    pub fn intersect_bitmap(&self, bitmap: &BitmapContainer) -> ArrayContainer {
        let mut out = Vec::with_capacity(self.values.len());
        out.extend(self.values.iter().copied().filter(|&v| bitmap.contains(v)));
        ArrayContainer::new(out)
    }

    /// Computes `self ∖ bitmap` by testing each member's bit.
    pub fn difference_bitmap(&self, bitmap: &BitmapContainer) -> ArrayContainer {
        let mut out = Vec::with_capacity(self.values.len());
        out.extend(self.values.iter().copied().filter(|&v| !bitmap.contains(v)));
        ArrayContainer::new(out)
    }

    /// Returns true if the two arrays share at least one member.
    pub fn intersects(&self, other: &ArrayContainer) -> bool {
        let (a, b) = (&self.values, &other.values);
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => return true,
            }
        }
        false
    }

    /// Indices `(begin, end)` of the members falling within `[first, last]`.
    #[inline]
    pub(crate) fn range_bounds(&self, first: u16, last: u16) -> (usize, usize) {
        let begin = self.values.partition_point(|&v| v < first);
        let end = self.values.partition_point(|&v| v <= last);
        (begin, end)
    }

    /// Number of members within the closed range `[first, last]`.
    pub fn count_in_range(&self, first: u16, last: u16) -> usize {
        let (begin, end) = self.range_bounds(first, last);
        end - begin
    }

    /// Complement restricted to the closed range `[first, last]`, as a new
    /// array.
    ///
    /// Members below `first` and above `last` are untouched; inside the
    /// range, present values are dropped and absent values appear. The
    /// caller must have verified (analytically, via
    /// [`count_in_range`](Self::count_in_range)) that the result stays
    /// under the promotion threshold.
    pub fn complement_range(&self, first: u16, last: u16) -> ArrayContainer {
        let (begin, end) = self.range_bounds(first, last);
        let range_len = last as usize - first as usize + 1;
        let in_range = end - begin;
        let new_len = self.values.len() - in_range + (range_len - in_range);

        let mut out = Vec::with_capacity(new_len);
        out.extend_from_slice(&self.values[..begin]);
        let mut cursor = begin;
        for x in first..=last {
            if cursor < end && self.values[cursor] == x {
                cursor += 1;
            } else {
                out.push(x);
            }
        }
        out.extend_from_slice(&self.values[end..]);
        ArrayContainer::new(out)
    }

    /// In-place variant of [`complement_range`](Self::complement_range).
    ///
    /// The flipped middle section is staged in a buffer holding exactly the
    /// newly introduced values, then spliced over the old in-range region;
    /// the backing storage ends trimmed to the exact new cardinality.
    pub fn complement_range_in_place(&mut self, first: u16, last: u16) {
        let (begin, end) = self.range_bounds(first, last);
        let range_len = last as usize - first as usize + 1;
        let in_range = end - begin;

        let mut introduced = Vec::with_capacity(range_len - in_range);
        let mut cursor = begin;
        for x in first..=last {
            if cursor < end && self.values[cursor] == x {
                cursor += 1;
            } else {
                introduced.push(x);
            }
        }
        self.values.splice(begin..end, introduced);
        self.values.shrink_to_fit();

        #[cfg(debug_assertions)]
        self.check_invariants().expect("array container invariants");
    }

    /// Converts this array into the dense bitmap encoding.
    pub fn to_bitmap(&self) -> BitmapContainer {
        BitmapContainer::from_sorted_slice(&self.values)
    }

    /// Shrinks the backing storage to the current cardinality.
    pub fn compact(&mut self) {
        self.values.shrink_to_fit();
    }

    pub(crate) fn check_invariants(&self) -> crate::Result<()> {
        for pair in self.values.windows(2) {
            if pair[0] >= pair[1] {
                return Err(crate::Error::unordered(
                    "array",
                    format!("{} does not precede {}", pair[0], pair[1]),
                ));
            }
        }
        Ok(())
    }
}
