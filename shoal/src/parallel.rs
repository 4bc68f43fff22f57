//! Parallel reduction of many sets by union or intersection.
//!
//! The engine merges the input sets' bucket sequences through a
//! key-ordered min-heap, fans same-key container groups out to a fixed
//! pool of worker threads over a bounded work queue, and reassembles the
//! keyed results, which complete in arbitrary order, into index-addressed
//! slots, so the output bucket order is deterministic regardless of worker
//! scheduling. Union folds accumulate through [`LazyBitmap`] and repair
//! once per group; intersection folds are eager and short-circuit to an
//! absent result the moment they empty.
//!
//! The queues are bounded, so a slow stage backpressures its producers
//! instead of buffering without limit. There is no cancellation: the
//! engine runs to completion, and a worker panic is not isolated: it
//! propagates when the thread scope joins. A per-task result-or-error
//! channel would close that gap; the current design matches the
//! success-only channels described above.
//!
//! [`LazyBitmap`]: crate::container::LazyBitmap

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::thread;

use log::debug;

use crate::container::Container;
use crate::set::U32Set;

/// Capacity of the driver → workers group queue.
pub const WORK_QUEUE_CAPACITY: usize = 128;

/// Capacity of the workers → assembler result queue.
pub const RESULT_QUEUE_CAPACITY: usize = 32;

/// Computes the union of the given sets on `parallelism` worker threads.
///
/// A `parallelism` of 0 selects the default: the machine's available
/// parallelism, falling back to 8 when it cannot be determined. The
/// inputs are only read; the result is a newly constructed set equal to
/// the sequential left-to-right union fold.
pub fn parallel_union(parallelism: usize, sets: &[&U32Set]) -> U32Set {
    match sets.len() {
        0 => return U32Set::new(),
        1 => return sets[0].clone(),
        _ => (),
    }
    let workers = effective_parallelism(parallelism);
    debug!(
        "parallel union: {} sets across {} workers",
        sets.len(),
        workers
    );
    reduce(workers, sets, ReduceOp::Union)
}

/// Computes the intersection of the given sets on `parallelism` worker
/// threads.
///
/// Only bucket keys present in every input can contribute; groups missing
/// from any input are skipped before dispatch, so an empty input yields an
/// empty result without a single worker fold. Buckets whose intersection
/// empties are absent from the result rather than stored as empty
/// containers.
pub fn parallel_intersect(parallelism: usize, sets: &[&U32Set]) -> U32Set {
    match sets.len() {
        0 => return U32Set::new(),
        1 => return sets[0].clone(),
        _ => (),
    }
    let workers = effective_parallelism(parallelism);
    debug!(
        "parallel intersection: {} sets across {} workers",
        sets.len(),
        workers
    );
    reduce(workers, sets, ReduceOp::Intersection)
}

fn effective_parallelism(parallelism: usize) -> usize {
    if parallelism != 0 {
        parallelism
    } else {
        thread::available_parallelism().map(|n| n.get()).unwrap_or(8)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ReduceOp {
    Union,
    Intersection,
}

/// One same-key group of containers, tagged with its task index. Indices
/// are assigned by the single-threaded driver in increasing key order;
/// the assembler addresses its slots by them.
struct KeyGroup<'a> {
    index: usize,
    key: u16,
    members: Vec<&'a Container>,
}

enum AssemblerMsg {
    /// A completed task. `container` is `None` when an intersection
    /// emptied: the slot is filled, but the bucket is absent.
    Result {
        index: usize,
        key: u16,
        container: Option<Container>,
    },
    /// The total number of tasks, announced once the driver has dispatched
    /// everything.
    Total(usize),
}

fn reduce(workers: usize, sets: &[&U32Set], op: ReduceOp) -> U32Set {
    thread::scope(|scope| {
        let (work_tx, work_rx) = shoal_mpmc::sync_channel::<KeyGroup<'_>>(WORK_QUEUE_CAPACITY);
        let (result_tx, result_rx) =
            shoal_mpmc::sync_channel::<AssemblerMsg>(RESULT_QUEUE_CAPACITY);

        for _ in 0..workers {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                while let Ok(group) = work_rx.recv() {
                    let container = match op {
                        ReduceOp::Union => Some(fold_union(&group.members)),
                        ReduceOp::Intersection => fold_intersection(&group.members),
                    };
                    let msg = AssemblerMsg::Result {
                        index: group.index,
                        key: group.key,
                        container,
                    };
                    if result_tx.send(msg).is_err() {
                        break;
                    }
                }
            });
        }
        drop(work_rx);

        let assembler = scope.spawn(move || assemble(result_rx));

        // The caller's thread drives the heap merge and dispatches.
        let mut stream = GroupStream::new(sets);
        let mut task_count = 0usize;
        while let Some((key, members)) = stream.next_group() {
            if op == ReduceOp::Intersection && members.len() != sets.len() {
                // A key absent from any input cannot intersect.
                continue;
            }
            let index = task_count;
            task_count += 1;
            if op == ReduceOp::Union && members.len() == 1 {
                // Nothing to fold; forward the lone container verbatim.
                let msg = AssemblerMsg::Result {
                    index,
                    key,
                    container: Some(members[0].clone()),
                };
                result_tx.send(msg).expect("assembler alive");
            } else {
                work_tx
                    .send(KeyGroup {
                        index,
                        key,
                        members,
                    })
                    .expect("worker pool alive");
            }
        }
        drop(work_tx);
        result_tx
            .send(AssemblerMsg::Total(task_count))
            .expect("assembler alive");
        drop(result_tx);

        assembler.join().expect("assembler thread")
    })
}

/// Folds a union group through the lazy accumulator, repairing once at
/// the end: cardinality recount, demotion of a small result, and
/// recognition of a provably-full bucket.
fn fold_union(members: &[&Container]) -> Container {
    debug_assert!(members.len() >= 2);
    let mut lazy = members[0].lazy_union(members[1]);
    for member in &members[2..] {
        lazy.union_with(member);
    }
    lazy.repair()
}

/// Folds an intersection group eagerly, short-circuiting to `None` the
/// moment the accumulator empties.
fn fold_intersection(members: &[&Container]) -> Option<Container> {
    debug_assert!(members.len() >= 2);
    let mut acc = members[0].intersect(members[1]);
    for member in &members[2..] {
        if acc.is_empty() {
            break;
        }
        acc.intersect_with(member);
    }
    if acc.is_empty() { None } else { Some(acc) }
}

/// Collects keyed results into index-addressed slots, growing lazily to
/// the highest index seen, and materializes the ordered bucket sequence
/// once the announced total is reached. Absent slots (empty
/// intersections) are skipped.
fn assemble(result_rx: shoal_mpmc::Receiver<AssemblerMsg>) -> U32Set {
    let mut slots: Vec<Option<(u16, Option<Container>)>> = Vec::new();
    let mut filled = 0usize;
    let mut total: Option<usize> = None;
    while total != Some(filled) {
        let msg = result_rx
            .recv()
            .expect("result channel closed before completion");
        match msg {
            AssemblerMsg::Result {
                index,
                key,
                container,
            } => {
                if index >= slots.len() {
                    slots.resize_with(index + 1, || None);
                }
                debug_assert!(slots[index].is_none(), "task index {index} delivered twice");
                slots[index] = Some((key, container));
                filled += 1;
            }
            AssemblerMsg::Total(count) => total = Some(count),
        }
    }

    let mut out = U32Set::new();
    for slot in slots {
        let (key, container) = slot.expect("every task slot filled");
        if let Some(container) = container {
            out.push_container(key, container);
        }
    }
    out
}

/// Streams same-key groups of containers out of N bucket sequences via a
/// min-heap keyed by (bucket key, source index).
struct GroupStream<'a> {
    sets: &'a [&'a U32Set],
    positions: Vec<usize>,
    heap: BinaryHeap<Reverse<(u16, usize)>>,
}

impl<'a> GroupStream<'a> {
    fn new(sets: &'a [&'a U32Set]) -> GroupStream<'a> {
        let mut heap = BinaryHeap::with_capacity(sets.len());
        for (i, set) in sets.iter().enumerate() {
            // Empty sets contribute no cursor.
            if let Some(&key) = set.keys().first() {
                heap.push(Reverse((key, i)));
            }
        }
        GroupStream {
            sets,
            positions: vec![0; sets.len()],
            heap,
        }
    }

    /// Pops every heap entry at the current minimum key, advancing each
    /// popped set's cursor, and returns the group of containers at that
    /// key in source order.
    fn next_group(&mut self) -> Option<(u16, Vec<&'a Container>)> {
        let Reverse((key, _)) = *self.heap.peek()?;
        let mut members = Vec::new();
        while let Some(&Reverse((next_key, i))) = self.heap.peek() {
            if next_key != key {
                break;
            }
            self.heap.pop();
            let pos = self.positions[i];
            members.push(&self.sets[i].containers()[pos]);
            self.positions[i] = pos + 1;
            if let Some(&following) = self.sets[i].keys().get(pos + 1) {
                self.heap.push(Reverse((following, i)));
            }
        }
        Some((key, members))
    }
}
