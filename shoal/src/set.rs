//! The top-level set of `u32` values: an ordered sequence of
//! (bucket key, container) pairs.

use crate::container::{Container, ValueIter};

/// A set of `u32` values stored two-level: the high 16 bits of a value
/// select a bucket, the low 16 bits live in that bucket's [`Container`].
///
/// Keys are strictly increasing and each key owns exactly one non-empty
/// container, held in parallel arrays with matching indices. This type is
/// the lean directory over the container algebra: point updates, ascending
/// iteration, and sequential set algebra. Multi-set reductions at scale go
/// through [`parallel_union`](crate::parallel::parallel_union) and
/// [`parallel_intersect`](crate::parallel::parallel_intersect).
#[derive(Clone, PartialEq)]
pub struct U32Set {
    keys: Vec<u16>,
    containers: Vec<Container>,
}

#[inline]
fn split(value: u32) -> (u16, u16) {
    ((value >> 16) as u16, value as u16)
}

impl U32Set {
    /// Creates an empty set.
    pub fn new() -> U32Set {
        U32Set {
            keys: Vec::new(),
            containers: Vec::new(),
        }
    }

    /// Creates a set from arbitrary values, in any order.
    pub fn from_values(values: impl IntoIterator<Item = u32>) -> U32Set {
        let mut set = U32Set::new();
        for value in values {
            set.insert(value);
        }
        set
    }

    /// Bucket keys in ascending order.
    #[inline]
    pub fn keys(&self) -> &[u16] {
        &self.keys
    }

    /// Containers, index-parallel with [`keys`](Self::keys).
    #[inline]
    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    /// Ascending `(key, container)` pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (u16, &Container)> {
        self.keys.iter().copied().zip(self.containers.iter())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Total number of values across all buckets.
    pub fn cardinality(&self) -> u64 {
        self.containers.iter().map(|c| c.cardinality() as u64).sum()
    }

    /// Membership test.
    pub fn contains(&self, value: u32) -> bool {
        let (key, low) = split(value);
        match self.keys.binary_search(&key) {
            Ok(i) => self.containers[i].contains(low),
            Err(_) => false,
        }
    }

    /// Inserts a value, creating its bucket when absent. Returns whether
    /// the value was newly added.
    pub fn insert(&mut self, value: u32) -> bool {
        let (key, low) = split(value);
        match self.keys.binary_search(&key) {
            Ok(i) => self.containers[i].insert(low),
            Err(i) => {
                self.keys.insert(i, key);
                self.containers
                    .insert(i, Container::from_sorted_values(std::iter::once(low)));
                true
            }
        }
    }

    /// Removes a value, dropping its bucket when it empties. Returns
    /// whether the value was present.
    pub fn remove(&mut self, value: u32) -> bool {
        let (key, low) = split(value);
        match self.keys.binary_search(&key) {
            Ok(i) => {
                let removed = self.containers[i].remove(low);
                if removed && self.containers[i].is_empty() {
                    self.keys.remove(i);
                    self.containers.remove(i);
                }
                removed
            }
            Err(_) => false,
        }
    }

    /// Appends a container at `key`, preserving ascending key order.
    ///
    /// This is the construction surface used by the parallel assembler,
    /// which produces buckets in final order.
    ///
    /// # Panics
    ///
    /// Panics if `key` does not exceed the current largest key, or if
    /// `container` is empty (empty buckets are represented by absence).
    pub fn push_container(&mut self, key: u16, container: Container) {
        assert!(
            self.keys.last().is_none_or(|&last| last < key),
            "bucket keys must be appended in ascending order"
        );
        assert!(!container.is_empty(), "empty buckets are stored as absent");
        self.keys.push(key);
        self.containers.push(container);
    }

    /// Returns an iterator over the values in ascending order.
    pub fn iter(&self) -> U32SetIter<'_> {
        U32SetIter {
            set: self,
            bucket: 0,
            inner: None,
        }
    }

    /// Collects all values in ascending order.
    pub fn to_vec(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.cardinality() as usize);
        for (key, container) in self.pairs() {
            container.collect_into((key as u32) << 16, &mut out);
        }
        out
    }

    /// Computes the union of two sets by a sequential merge of their
    /// bucket sequences. This is the reference fold the parallel reducer
    /// must agree with.
    pub fn union(&self, other: &U32Set) -> U32Set {
        let mut out = U32Set::new();
        let (mut i, mut j) = (0, 0);
        while i < self.keys.len() && j < other.keys.len() {
            match self.keys[i].cmp(&other.keys[j]) {
                std::cmp::Ordering::Less => {
                    out.push_container(self.keys[i], self.containers[i].clone());
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    out.push_container(other.keys[j], other.containers[j].clone());
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    out.push_container(self.keys[i], self.containers[i].union(&other.containers[j]));
                    i += 1;
                    j += 1;
                }
            }
        }
        for k in i..self.keys.len() {
            out.push_container(self.keys[k], self.containers[k].clone());
        }
        for k in j..other.keys.len() {
            out.push_container(other.keys[k], other.containers[k].clone());
        }
        out
    }

    /// Computes the intersection of two sets; buckets with an empty
    /// intersection are absent from the result.
    pub fn intersect(&self, other: &U32Set) -> U32Set {
        let mut out = U32Set::new();
        let (mut i, mut j) = (0, 0);
        while i < self.keys.len() && j < other.keys.len() {
            match self.keys[i].cmp(&other.keys[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    let container = self.containers[i].intersect(&other.containers[j]);
                    if !container.is_empty() {
                        out.push_container(self.keys[i], container);
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        out
    }

    /// In-place union with `other`.
    pub fn union_with(&mut self, other: &U32Set) {
        *self = self.union(other);
    }

    /// In-place intersection with `other`.
    pub fn intersect_with(&mut self, other: &U32Set) {
        *self = self.intersect(other);
    }

    /// Re-encodes every container into its smallest valid encoding.
    pub fn optimize(&mut self) {
        for container in &mut self.containers {
            container.optimize();
        }
    }

    /// Verifies the directory and every container, reporting the first
    /// violation.
    pub fn validate(&self) -> crate::Result<()> {
        for pair in self.keys.windows(2) {
            if pair[0] >= pair[1] {
                return Err(crate::Error::unordered(
                    "set",
                    format!("bucket key {} does not precede {}", pair[0], pair[1]),
                ));
            }
        }
        for container in &self.containers {
            if container.is_empty() {
                return Err(crate::Error::unordered(
                    "set",
                    "empty bucket stored explicitly",
                ));
            }
            container.validate()?;
        }
        Ok(())
    }
}

impl Default for U32Set {
    fn default() -> Self {
        U32Set::new()
    }
}

impl FromIterator<u32> for U32Set {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        U32Set::from_values(iter)
    }
}

impl std::fmt::Debug for U32Set {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "U32Set{{buckets: {}, cardinality: {}}}",
            self.keys.len(),
            self.cardinality()
        )
    }
}

/// Ascending iterator over a set's `u32` values.
pub struct U32SetIter<'a> {
    set: &'a U32Set,
    bucket: usize,
    inner: Option<ValueIter<'a>>,
}

impl<'a> Iterator for U32SetIter<'a> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        loop {
            if self.bucket >= self.set.keys.len() {
                return None;
            }
            let inner = self
                .inner
                .get_or_insert_with(|| self.set.containers[self.bucket].iter());
            match inner.next() {
                Some(low) => {
                    let high = (self.set.keys[self.bucket] as u32) << 16;
                    return Some(high | low as u32);
                }
                None => {
                    self.inner = None;
                    self.bucket += 1;
                }
            }
        }
    }
}
