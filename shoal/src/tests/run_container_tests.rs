use crate::container::run::{Run, RunContainer};

fn runs_of(container: &RunContainer) -> Vec<(u16, u16)> {
    container.runs().iter().map(|r| (r.first, r.last)).collect()
}

#[test]
fn insert_extends_bridges_and_creates_runs() {
    let mut run = RunContainer::empty();
    assert!(run.insert(10)); // new singleton
    assert!(run.insert(11)); // extend right
    assert!(run.insert(9)); // extend left
    assert_eq!(runs_of(&run), vec![(9, 11)]);

    assert!(run.insert(13)); // new singleton with a gap
    assert_eq!(runs_of(&run), vec![(9, 11), (13, 13)]);

    assert!(run.insert(12)); // bridges the two runs
    assert_eq!(runs_of(&run), vec![(9, 13)]);

    assert!(!run.insert(10)); // already present
    assert_eq!(run.cardinality(), 5);
    run.check_invariants().unwrap();
}

#[test]
fn remove_shrinks_and_splits_runs() {
    let mut run = RunContainer::from_run(10, 20);
    assert!(run.remove(10)); // shrink left
    assert_eq!(runs_of(&run), vec![(11, 20)]);

    assert!(run.remove(20)); // shrink right
    assert_eq!(runs_of(&run), vec![(11, 19)]);

    assert!(run.remove(15)); // split
    assert_eq!(runs_of(&run), vec![(11, 14), (16, 19)]);

    assert!(!run.remove(15));
    assert!(!run.remove(100));

    let mut singleton = RunContainer::from_run(5, 5);
    assert!(singleton.remove(5));
    assert!(singleton.is_empty());
}

#[test]
fn insert_range_merges_neighbors() {
    let mut run = RunContainer::from_run(0, 9);
    run.insert_range(20, 29);
    assert_eq!(runs_of(&run), vec![(0, 9), (20, 29)]);

    // Overlaps the first run and touches the second.
    run.insert_range(5, 19);
    assert_eq!(runs_of(&run), vec![(0, 29)]);
    run.check_invariants().unwrap();
}

#[test]
fn remove_range_splits_and_truncates() {
    let mut run = RunContainer::from_run(0, 99);
    run.remove_range(10, 19);
    assert_eq!(runs_of(&run), vec![(0, 9), (20, 99)]);

    run.remove_range(0, 4);
    assert_eq!(runs_of(&run), vec![(5, 9), (20, 99)]);

    run.remove_range(0, 65535);
    assert!(run.is_empty());
}

#[test]
fn union_is_an_interval_merge_walk() {
    let a = RunContainer::new(vec![
        Run { first: 0, last: 4 },
        Run { first: 10, last: 14 },
    ]);
    let b = RunContainer::new(vec![
        Run { first: 5, last: 8 },
        Run { first: 12, last: 20 },
        Run { first: 30, last: 30 },
    ]);
    let union = a.union(&b);
    assert_eq!(runs_of(&union), vec![(0, 8), (10, 20), (30, 30)]);
    assert_eq!(union.cardinality(), 9 + 11 + 1);
    union.check_invariants().unwrap();
}

#[test]
fn intersect_is_an_interval_intersect_walk() {
    let a = RunContainer::new(vec![
        Run { first: 0, last: 10 },
        Run { first: 20, last: 30 },
        Run { first: 50, last: 60 },
    ]);
    let b = RunContainer::new(vec![
        Run { first: 5, last: 25 },
        Run { first: 29, last: 55 },
    ]);
    let intersection = a.intersect(&b);
    assert_eq!(
        runs_of(&intersection),
        vec![(5, 10), (20, 25), (29, 30), (50, 55)]
    );
    intersection.check_invariants().unwrap();
}

#[test]
fn difference_subtracts_intervals() {
    let a = RunContainer::from_run(0, 100);
    let b = RunContainer::new(vec![
        Run { first: 10, last: 19 },
        Run { first: 50, last: 120 },
    ]);
    let difference = a.difference(&b);
    assert_eq!(runs_of(&difference), vec![(0, 9), (20, 49)]);

    // A subtrahend run spanning several minuend runs.
    let c = RunContainer::new(vec![
        Run { first: 0, last: 4 },
        Run { first: 8, last: 12 },
        Run { first: 30, last: 40 },
    ]);
    let d = RunContainer::from_run(2, 35);
    assert_eq!(runs_of(&c.difference(&d)), vec![(0, 1), (36, 40)]);
}

#[test]
fn symmetric_difference_via_two_subtractions() {
    let a = RunContainer::from_run(0, 10);
    let b = RunContainer::from_run(5, 15);
    let xor = a.symmetric_difference(&b);
    assert_eq!(runs_of(&xor), vec![(0, 4), (11, 15)]);
}

#[test]
fn complement_range_is_a_windowed_symmetric_difference() {
    let run = RunContainer::new(vec![
        Run { first: 5, last: 9 },
        Run { first: 20, last: 24 },
    ]);
    // Inside [0,29]: everything flips. Outside: untouched.
    let complement = run.complement_range(0, 29);
    assert_eq!(runs_of(&complement), vec![(0, 4), (10, 19), (25, 29)]);

    // A window covering only part of the container keeps the rest.
    let partial = run.complement_range(0, 9);
    assert_eq!(runs_of(&partial), vec![(0, 4), (20, 24)]);

    // Round trip over a covering window is identity.
    let round_trip = complement.complement_range(0, 29);
    assert_eq!(runs_of(&round_trip), runs_of(&run));
}

#[test]
fn contains_uses_run_binary_search() {
    let run = RunContainer::new(vec![
        Run { first: 10, last: 20 },
        Run { first: 40, last: 40 },
    ]);
    assert!(run.contains(10));
    assert!(run.contains(15));
    assert!(run.contains(20));
    assert!(!run.contains(21));
    assert!(!run.contains(9));
    assert!(run.contains(40));
    assert!(!run.contains(39));
}

#[test]
fn rank_select_over_cumulative_lengths() {
    let run = RunContainer::new(vec![
        Run { first: 10, last: 14 },
        Run { first: 100, last: 102 },
    ]);
    assert_eq!(run.rank(9), 0);
    assert_eq!(run.rank(10), 1);
    assert_eq!(run.rank(14), 5);
    assert_eq!(run.rank(99), 5);
    assert_eq!(run.rank(101), 7);
    assert_eq!(run.rank(u16::MAX), 8);

    assert_eq!(run.select(0), Some(10));
    assert_eq!(run.select(4), Some(14));
    assert_eq!(run.select(5), Some(100));
    assert_eq!(run.select(7), Some(102));
    assert_eq!(run.select(8), None);
}

#[test]
fn intersects_walks_without_materializing() {
    let a = RunContainer::from_run(0, 10);
    let b = RunContainer::from_run(10, 20);
    let c = RunContainer::from_run(11, 20);
    assert!(a.intersects(&b));
    assert!(!a.intersects(&c));
}

#[test]
fn full_container_covers_the_universe() {
    let full = RunContainer::full();
    assert_eq!(full.cardinality(), 65536);
    assert!(full.contains(0));
    assert!(full.contains(u16::MAX));
    assert_eq!(full.n_runs(), 1);
}

#[test]
fn from_sorted_values_coalesces_consecutive_values() {
    let run = RunContainer::from_sorted_values([0u16, 1, 2, 5, 6, 9].into_iter());
    assert_eq!(runs_of(&run), vec![(0, 2), (5, 6), (9, 9)]);
    assert_eq!(run.cardinality(), 6);
}

#[test]
fn conversions_preserve_membership() {
    let run = RunContainer::new(vec![
        Run { first: 0, last: 2 },
        Run {
            first: 65533,
            last: 65535,
        },
    ]);
    let array = run.to_array();
    assert_eq!(array.values(), &[0, 1, 2, 65533, 65534, 65535]);

    let bitmap = run.to_bitmap();
    assert_eq!(bitmap.cardinality(), 6);
    assert!(bitmap.contains(65535));
    assert!(!bitmap.contains(3));
}

#[test]
fn serialized_size_formula() {
    assert_eq!(RunContainer::serialized_size(0), 2);
    assert_eq!(RunContainer::serialized_size(1), 6);
    assert_eq!(RunContainer::serialized_size(100), 402);
}
