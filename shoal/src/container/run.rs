//! A container encoding that stores members as disjoint ascending
//! closed intervals.

use itertools::Itertools;

use crate::container::array::ArrayContainer;
use crate::container::bitmap::BitmapContainer;

/// A run of members `[first, last]` (both inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    /// Run start value
    pub first: u16,
    /// Inclusive run end value
    pub last: u16,
}

impl Run {
    #[inline]
    pub fn point(value: u16) -> Run {
        Run {
            first: value,
            last: value,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.last as usize - self.first as usize + 1
    }

    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        value >= self.first && value <= self.last
    }

    #[inline]
    pub fn is_adjacent_or_overlaps(&self, other: Run) -> bool {
        self.last >= other.first || other.first - self.last == 1
    }

    /// Merges `next` into `self` when the two runs overlap or touch,
    /// otherwise hands both back. `self.first <= next.first` is required.
    #[inline]
    pub fn coalesce(&self, next: Run) -> Result<Run, (Run, Run)> {
        if self.first <= next.first && self.is_adjacent_or_overlaps(next) {
            Ok(Run {
                first: self.first,
                last: self.last.max(next.last),
            })
        } else {
            Err((*self, next))
        }
    }
}

/// A container encoding that stores members as a set of disjoint,
/// non-adjacent, ascending closed intervals.
///
/// `RunContainer` wins when members cluster into long consecutive
/// stretches: each run costs 4 bytes regardless of how many values it
/// covers. Its serialized size is `2 + 4 × run_count` bytes, the quantity
/// the canonicalization rule compares against the array and bitmap sizes.
#[derive(Clone)]
pub struct RunContainer {
    /// Disjoint, non-adjacent runs, sorted by `first`.
    runs: Vec<Run>,
}

impl RunContainer {
    pub(crate) fn new(runs: Vec<Run>) -> RunContainer {
        let container = RunContainer { runs };

        #[cfg(debug_assertions)]
        container
            .check_invariants()
            .expect("run container invariants");

        container
    }

    /// Creates an empty `RunContainer`.
    pub fn empty() -> RunContainer {
        RunContainer { runs: Vec::new() }
    }

    /// Creates a `RunContainer` covering the whole bucket universe.
    pub fn full() -> RunContainer {
        RunContainer {
            runs: vec![Run {
                first: 0,
                last: u16::MAX,
            }],
        }
    }

    /// Creates a `RunContainer` holding the single run `[first, last]`.
    pub fn from_run(first: u16, last: u16) -> RunContainer {
        assert!(first <= last);
        RunContainer {
            runs: vec![Run { first, last }],
        }
    }

    /// Creates a `RunContainer` from sorted, unique values, coalescing
    /// consecutive values into runs.
    pub fn from_sorted_values(values: impl Iterator<Item = u16>) -> RunContainer {
        let runs = values
            .map(Run::point)
            .coalesce(|prev, next| prev.coalesce(next))
            .collect();
        RunContainer::new(runs)
    }

    /// Returns the run list, sorted and disjoint.
    #[inline]
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Number of runs.
    #[inline]
    pub fn n_runs(&self) -> usize {
        self.runs.len()
    }

    /// Serialized size in bytes of a run container with `run_count` runs:
    /// a 2-byte run count plus 4 bytes per run.
    #[inline]
    pub fn serialized_size(run_count: usize) -> usize {
        2 + 4 * run_count
    }

    /// Total number of members, the sum of the run lengths.
    pub fn cardinality(&self) -> usize {
        self.runs.iter().map(Run::len).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Locates the run containing `value` by binary search.
    pub fn contains(&self, value: u16) -> bool {
        let idx = self.runs.partition_point(|r| r.first <= value);
        idx > 0 && self.runs[idx - 1].last >= value
    }

    /// Inserts a single value: extends an existing run, bridges two runs
    /// that `value` joins, or inserts a new singleton run. Returns whether
    /// the value was newly added.
    pub fn insert(&mut self, value: u16) -> bool {
        let idx = self.runs.partition_point(|r| r.first <= value);
        if idx > 0 && self.runs[idx - 1].last >= value {
            return false;
        }
        let touches_prev = idx > 0 && self.runs[idx - 1].last as u32 + 1 == value as u32;
        let touches_next =
            idx < self.runs.len() && value as u32 + 1 == self.runs[idx].first as u32;
        match (touches_prev, touches_next) {
            (true, true) => {
                self.runs[idx - 1].last = self.runs[idx].last;
                self.runs.remove(idx);
            }
            (true, false) => self.runs[idx - 1].last = value,
            (false, true) => self.runs[idx].first = value,
            (false, false) => self.runs.insert(idx, Run::point(value)),
        }
        true
    }

    /// Removes a single value: shrinks or splits the containing run.
    /// Returns whether the value was present.
    pub fn remove(&mut self, value: u16) -> bool {
        let idx = self.runs.partition_point(|r| r.first <= value);
        if idx == 0 {
            return false;
        }
        let run = self.runs[idx - 1];
        if value > run.last {
            return false;
        }
        if run.first == run.last {
            self.runs.remove(idx - 1);
        } else if value == run.first {
            self.runs[idx - 1].first = value + 1;
        } else if value == run.last {
            self.runs[idx - 1].last = value - 1;
        } else {
            self.runs[idx - 1].last = value - 1;
            self.runs.insert(
                idx,
                Run {
                    first: value + 1,
                    last: run.last,
                },
            );
        }
        true
    }

    /// Unions the closed range `[first, last]` into the list, merging
    /// neighbors as needed.
    pub fn insert_range(&mut self, first: u16, last: u16) {
        assert!(first <= last);
        *self = self.union(&RunContainer::from_run(first, last));
    }

    /// Subtracts the closed range `[first, last]` from the list, splitting
    /// neighbors as needed.
    pub fn remove_range(&mut self, first: u16, last: u16) {
        assert!(first <= last);
        *self = self.difference(&RunContainer::from_run(first, last));
    }

    /// Computes the union of two run containers as an interval-merge walk,
    /// O(runs₁ + runs₂).
    pub fn union(&self, other: &RunContainer) -> RunContainer {
        let runs = self
            .runs
            .iter()
            .merge_by(other.runs.iter(), |a, b| a.first <= b.first)
            .copied()
            .coalesce(|prev, next| prev.coalesce(next))
            .collect();
        RunContainer::new(runs)
    }

    /// Computes the intersection of two run containers as an
    /// interval-intersect walk, O(runs₁ + runs₂).
    pub fn intersect(&self, other: &RunContainer) -> RunContainer {
        let mut out = Vec::new();
        let (a, b) = (&self.runs, &other.runs);
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            let lo = a[i].first.max(b[j].first);
            let hi = a[i].last.min(b[j].last);
            if lo <= hi {
                out.push(Run { first: lo, last: hi });
            }
            // Advance whichever run ends first; both when they end together.
            if a[i].last < b[j].last {
                i += 1;
            } else if b[j].last < a[i].last {
                j += 1;
            } else {
                i += 1;
                j += 1;
            }
        }
        RunContainer::new(out)
    }

    /// Computes `self ∖ other` as an interval-subtract walk.
    pub fn difference(&self, other: &RunContainer) -> RunContainer {
        let mut out = Vec::new();
        let b = &other.runs;
        let mut j = 0usize;
        for &r in &self.runs {
            let last = r.last as u32;
            let mut start = r.first as u32;
            // Skip subtrahend runs that end before this run begins.
            while j < b.len() && (b[j].last as u32) < start {
                j += 1;
            }
            let mut k = j;
            while start <= last {
                if k == b.len() || (b[k].first as u32) > last {
                    out.push(Run {
                        first: start as u16,
                        last: last as u16,
                    });
                    break;
                }
                let s = b[k];
                if (s.first as u32) > start {
                    out.push(Run {
                        first: start as u16,
                        last: (s.first - 1) as u16,
                    });
                }
                start = start.max(s.last as u32 + 1);
                k += 1;
            }
        }
        RunContainer::new(out)
    }

    /// Computes the symmetric difference as two subtractions and a union.
    pub fn symmetric_difference(&self, other: &RunContainer) -> RunContainer {
        self.difference(other).union(&other.difference(self))
    }

    /// Complement restricted to the closed range `[first, last]`.
    ///
    /// Computed as `(B ∖ A) ∪ (A ∖ B)` with `B` the range as a one-run
    /// container: two run subtractions plus one union rather than a
    /// single-pass walk. The extra passes are a known inefficiency kept
    /// deliberately; run containers are rare on the complement path and
    /// the single-pass variant has not been derived.
    pub fn complement_range(&self, first: u16, last: u16) -> RunContainer {
        let window = RunContainer::from_run(first, last);
        window.difference(self).union(&self.difference(&window))
    }

    /// Returns true if the two run lists share at least one value.
    pub fn intersects(&self, other: &RunContainer) -> bool {
        let (a, b) = (&self.runs, &other.runs);
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            if a[i].first.max(b[j].first) <= a[i].last.min(b[j].last) {
                return true;
            }
            if a[i].last < b[j].last {
                i += 1;
            } else {
                j += 1;
            }
        }
        false
    }

    /// Smallest member, if any.
    #[inline]
    pub fn min(&self) -> Option<u16> {
        self.runs.first().map(|r| r.first)
    }

    /// Largest member, if any.
    #[inline]
    pub fn max(&self) -> Option<u16> {
        self.runs.last().map(|r| r.last)
    }

    /// Number of members less than or equal to `value`.
    ///
    /// The containing run is located by binary search; the cumulative
    /// offset is the sum of the preceding run lengths.
    pub fn rank(&self, value: u16) -> usize {
        let idx = self.runs.partition_point(|r| r.first <= value);
        if idx == 0 {
            return 0;
        }
        let prefix: usize = self.runs[..idx - 1].iter().map(Run::len).sum();
        let run = self.runs[idx - 1];
        if value >= run.last {
            prefix + run.len()
        } else {
            prefix + (value - run.first) as usize + 1
        }
    }

    /// The `n`-th (0-based) smallest member.
    pub fn select(&self, n: usize) -> Option<u16> {
        let mut remaining = n;
        for run in &self.runs {
            if remaining < run.len() {
                return Some(run.first + remaining as u16);
            }
            remaining -= run.len();
        }
        None
    }

    /// Converts this run list into the dense bitmap encoding.
    pub fn to_bitmap(&self) -> BitmapContainer {
        let mut bitmap = BitmapContainer::empty();
        for run in &self.runs {
            bitmap.insert_range(run.first, run.last);
        }
        bitmap
    }

    /// Converts this run list into the sorted-array encoding.
    pub fn to_array(&self) -> ArrayContainer {
        let mut out = Vec::with_capacity(self.cardinality());
        for run in &self.runs {
            out.extend(run.first..=run.last);
        }
        ArrayContainer::new(out)
    }

    /// Shrinks the backing storage to the current run count.
    pub fn compact(&mut self) {
        self.runs.shrink_to_fit();
    }

    pub(crate) fn check_invariants(&self) -> crate::Result<()> {
        for pair in self.runs.windows(2) {
            if pair[0].first > pair[0].last || pair[1].first > pair[1].last {
                return Err(crate::Error::unordered("run", "inverted run bounds"));
            }
            if pair[0].last as u32 + 1 >= pair[1].first as u32 {
                return Err(crate::Error::unordered(
                    "run",
                    format!(
                        "runs [{},{}] and [{},{}] overlap or touch",
                        pair[0].first, pair[0].last, pair[1].first, pair[1].last
                    ),
                ));
            }
        }
        if let [only] = self.runs.as_slice() {
            if only.first > only.last {
                return Err(crate::Error::unordered("run", "inverted run bounds"));
            }
        }
        Ok(())
    }
}
