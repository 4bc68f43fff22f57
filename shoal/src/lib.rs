//! Shoal is a compressed bitset engine for sets of `u32` values.
//!
//! Values are stored two-level: the high 16 bits select a bucket, the low
//! 16 bits live in the bucket's [`Container`]: a sorted array, a dense
//! bitmap, or a run list, chosen adaptively by density and run structure.
//! The container algebra (union, intersection, difference, symmetric
//! difference, range complement, rank/select, iteration) dispatches on the
//! pair of encodings and always returns a result in its smallest valid
//! encoding. Reductions over many sets run on the parallel engine in
//! [`parallel`], which preserves the sequential fold's result bit for bit.

pub mod container;
pub mod error;
pub mod parallel;
pub mod set;
pub mod words;

#[cfg(test)]
mod tests;

pub use container::{ArrayContainer, BitmapContainer, Container, ContainerKind, RunContainer};
pub use error::{Error, ErrorKind, Result};
pub use parallel::{parallel_intersect, parallel_union};
pub use set::U32Set;
