use std::collections::BTreeSet;

use crate::container::array::ArrayContainer;
use crate::container::bitmap::BitmapContainer;
use crate::container::run::RunContainer;
use crate::container::{Container, ContainerKind};

fn model(values: impl IntoIterator<Item = u16>) -> BTreeSet<u16> {
    values.into_iter().collect()
}

/// The same value set in all three physical encodings, canonical or not.
fn encodings_of(values: &BTreeSet<u16>) -> [Container; 3] {
    let sorted: Vec<u16> = values.iter().copied().collect();
    [
        Container::Array(ArrayContainer::from_sorted_slice(&sorted)),
        Container::Bitmap(BitmapContainer::from_sorted_slice(&sorted)),
        Container::Run(RunContainer::from_sorted_values(sorted.iter().copied())),
    ]
}

fn canonical(values: impl IntoIterator<Item = u16>) -> Container {
    let sorted: Vec<u16> = model(values).into_iter().collect();
    let mut container = Container::from_sorted_values(sorted.into_iter());
    container.optimize();
    container
}

fn random_values(rng: &mut fastrand::Rng, count: usize) -> BTreeSet<u16> {
    (0..count).map(|_| rng.u16(..)).collect()
}

fn clustered_values(rng: &mut fastrand::Rng, clusters: usize) -> BTreeSet<u16> {
    let mut values = BTreeSet::new();
    for _ in 0..clusters {
        let start = rng.u16(..60000);
        let len = rng.u16(1..500);
        values.extend(start..start.saturating_add(len));
    }
    values
}

#[test]
fn encoding_equivalence_across_all_three() {
    let values = model((0..300u32).map(|i| (i * 37) as u16).chain(1000u16..1100));
    let [array, bitmap, run] = encodings_of(&values);

    assert_eq!(array, bitmap);
    assert_eq!(bitmap, run);
    assert_eq!(run, array);

    let expected: Vec<u16> = values.iter().copied().collect();
    assert_eq!(array.iter().collect::<Vec<_>>(), expected);
    assert_eq!(bitmap.iter().collect::<Vec<_>>(), expected);
    assert_eq!(run.iter().collect::<Vec<_>>(), expected);
}

#[test]
fn every_dispatch_pair_matches_the_model() {
    let set_a = model((0..3000u32).map(|i| (i * 7 % 50000) as u16).chain(100u16..400));
    let set_b = model((0..2500u32).map(|i| (i * 11 % 50000) as u16).chain(350u16..700));

    let or_model = canonical(set_a.union(&set_b).copied());
    let and_model = canonical(set_a.intersection(&set_b).copied());
    let diff_model = canonical(set_a.difference(&set_b).copied());
    let xor_model = canonical(set_a.symmetric_difference(&set_b).copied());

    for a in encodings_of(&set_a) {
        for b in encodings_of(&set_b) {
            let pair = (a.kind(), b.kind());
            assert_eq!(a.union(&b), or_model, "union {pair:?}");
            assert_eq!(a.intersect(&b), and_model, "intersect {pair:?}");
            assert_eq!(a.difference(&b), diff_model, "difference {pair:?}");
            assert_eq!(
                a.symmetric_difference(&b),
                xor_model,
                "symmetric difference {pair:?}"
            );
            assert_eq!(
                a.intersects(&b),
                !and_model.is_empty(),
                "intersects {pair:?}"
            );
        }
    }
}

fn assert_algebra_laws(a: &Container, b: &Container) {
    let or = a.union(b);
    let and = a.intersect(b);
    let xor = a.symmetric_difference(b);
    let a_not_b = a.difference(b);
    let b_not_a = b.difference(a);

    // Inclusion-exclusion.
    assert_eq!(
        or.cardinality() + and.cardinality(),
        a.cardinality() + b.cardinality()
    );
    // Commutativity of intersection.
    assert_eq!(and, b.intersect(a));
    // xor == or minus and.
    assert_eq!(xor, or.difference(&and));
    // (a \ b) ∪ (b \ a) == a △ b.
    assert_eq!(a_not_b.union(&b_not_a), xor);

    // In-place variants agree with the owned ones.
    let mut c = a.clone();
    c.union_with(b);
    assert_eq!(c, or);
    let mut c = a.clone();
    c.intersect_with(b);
    assert_eq!(c, and);
    let mut c = a.clone();
    c.difference_with(b);
    assert_eq!(c, a_not_b);
    let mut c = a.clone();
    c.symmetric_difference_with(b);
    assert_eq!(c, xor);

    // Every completed operation returns a valid encoding.
    for result in [&or, &and, &xor, &a_not_b, &b_not_a] {
        result.validate().unwrap();
    }
}

#[test]
fn algebra_laws_hold_across_shapes() {
    let mut rng = fastrand::Rng::with_seed(0x5d0a_11ce);
    for _ in 0..20 {
        let sparse = canonical(random_values(&mut rng, 500));
        let dense = canonical(random_values(&mut rng, 12000));
        let runs = canonical(clustered_values(&mut rng, 30));

        let shapes = [&sparse, &dense, &runs];
        for a in shapes {
            for b in shapes {
                assert_algebra_laws(a, b);
            }
        }
    }
}

#[test]
fn complement_round_trip_over_covering_range() {
    let mut rng = fastrand::Rng::with_seed(0xc0fe);
    let fixtures = [
        canonical(random_values(&mut rng, 300)),
        canonical(random_values(&mut rng, 9000)),
        canonical(clustered_values(&mut rng, 20)),
    ];
    for container in &fixtures {
        let round_trip = container
            .complement_range(0..65536)
            .complement_range(0..65536);
        assert_eq!(&round_trip, container);
        round_trip.validate().unwrap();
    }
}

#[test]
fn complement_with_empty_or_inverted_range_is_identity() {
    let container = canonical([1u16, 5, 9]);
    assert_eq!(container.complement_range(7..7), container);
    assert_eq!(container.complement_range(9..3), container);

    let mut in_place = container.clone();
    in_place.complement_range_in_place(100..100);
    assert_eq!(in_place, container);
}

#[test]
fn array_complement_promotes_when_projected_large() {
    // Complementing an almost-empty array over the full range projects
    // ~65536 values: the result must come back as a bitmap.
    let container = canonical([0u16, 1]);
    let complement = container.complement_range(0..65536);
    assert_eq!(complement.kind(), ContainerKind::Bitmap);
    assert_eq!(complement.cardinality(), 65534);
    assert!(!complement.contains(0));
    assert!(complement.contains(2));
    complement.validate().unwrap();
}

#[test]
fn concrete_odd_pattern_complement_in_place() {
    let mut container = canonical([1u16, 3, 5, 7, 9]);
    container.complement_range_in_place(0..11);
    assert_eq!(container.cardinality(), 6);
    assert_eq!(container.iter().collect::<Vec<_>>(), vec![0, 2, 4, 6, 8, 10]);
}

#[test]
fn promotion_on_the_threshold_plus_first_insert() {
    let mut container = Container::empty();
    for v in (0..Container::MAX_ARRAY_LEN as u32).map(|i| (i * 2) as u16) {
        container.insert(v);
    }
    assert_eq!(container.kind(), ContainerKind::Array);
    assert_eq!(container.cardinality(), Container::MAX_ARRAY_LEN);

    // The (threshold + 1)-th distinct value converts to a bitmap with
    // identical membership.
    assert!(container.insert(60001));
    assert_eq!(container.kind(), ContainerKind::Bitmap);
    assert_eq!(container.cardinality(), Container::MAX_ARRAY_LEN + 1);
    assert!(container.contains(0));
    assert!(container.contains(8190));
    assert!(container.contains(60001));
    assert!(!container.contains(1));
    container.validate().unwrap();
}

#[test]
fn demotion_when_an_intersection_gets_small() {
    // Force the dense operands through the bitmap pair.
    fn as_bitmap(container: &Container) -> Container {
        match container {
            Container::Run(r) => Container::Bitmap(r.to_bitmap()),
            other => other.clone(),
        }
    }

    let a = canonical(0..10000u16);
    let b = canonical(9000..19000u16);
    assert_eq!(a.kind(), ContainerKind::Run);
    let a = as_bitmap(&a);
    let b = as_bitmap(&b);

    let and = a.intersect(&b);
    assert_eq!(and.kind(), ContainerKind::Array);
    assert_eq!(and.cardinality(), 1000);
    assert!(and.contains(9000));
    assert!(and.contains(9999));
    and.validate().unwrap();
}

#[test]
fn removal_demotes_a_threshold_bitmap() {
    let mut container = Container::empty();
    for v in 0..=(Container::MAX_ARRAY_LEN as u16) {
        // 4097 scattered values, stepping by 3 to keep runs expensive.
        container.insert(v * 3);
    }
    assert_eq!(container.kind(), ContainerKind::Bitmap);
    assert!(container.remove(0));
    assert_eq!(container.kind(), ContainerKind::Array);
    assert_eq!(container.cardinality(), Container::MAX_ARRAY_LEN);
}

#[test]
fn optimize_is_idempotent_and_exact_at_the_boundary() {
    // Scattered values make the run encoding hopeless, so the choice is
    // purely the array/bitmap cardinality threshold.
    for (count, expected) in [
        (Container::MAX_ARRAY_LEN - 1, ContainerKind::Array),
        (Container::MAX_ARRAY_LEN, ContainerKind::Array),
        (Container::MAX_ARRAY_LEN + 1, ContainerKind::Bitmap),
    ] {
        let values: Vec<u16> = (0..count as u32).map(|i| (i * 2) as u16).collect();
        let mut container = Container::Bitmap(BitmapContainer::from_sorted_slice(&values));
        let kind = container.optimize();
        assert_eq!(kind, expected, "cardinality {count}");
        assert_eq!(container.cardinality(), count);

        let again = container.clone();
        container.optimize();
        assert_eq!(container, again);
        assert_eq!(container.kind(), expected);
    }
}

#[test]
fn optimize_picks_runs_for_contiguous_spans() {
    let values: Vec<u16> = (0..5000).collect();
    let mut container = Container::from_sorted_values(values.into_iter());
    assert_eq!(container.kind(), ContainerKind::Bitmap);
    assert_eq!(container.optimize(), ContainerKind::Run);
    assert_eq!(container.cardinality(), 5000);
    container.validate().unwrap();

    // Three values in two runs: 14 bytes of runs loses to 6 bytes of
    // array; stays an array.
    let mut sparse = canonical([1u16, 2, 900]);
    assert_eq!(sparse.optimize(), ContainerKind::Array);
}

#[test]
fn lazy_union_repairs_to_the_right_encoding() {
    // Small result: repaired to an array.
    let a = canonical([1u16, 2, 3]);
    let b = canonical([3u16, 4]);
    let repaired = a.lazy_union(&b).repair();
    assert_eq!(repaired.kind(), ContainerKind::Array);
    assert_eq!(repaired.cardinality(), 4);
    repaired.validate().unwrap();

    // Provably-full result: repaired to the single-run container.
    let left = canonical(0..=40000u16);
    let right = Container::Run(RunContainer::from_run(39999, u16::MAX));
    let full = left.lazy_union(&right).repair();
    assert_eq!(full.kind(), ContainerKind::Run);
    assert_eq!(full.cardinality(), 65536);
    full.validate().unwrap();

    // Large scattered result: stays a bitmap.
    let mut rng = fastrand::Rng::with_seed(0xbeef);
    let dense_a = canonical(random_values(&mut rng, 9000));
    let dense_b = canonical(random_values(&mut rng, 9000));
    let big = dense_a.lazy_union(&dense_b).repair();
    assert_eq!(big.kind(), ContainerKind::Bitmap);
    assert_eq!(big, dense_a.union(&dense_b));
    big.validate().unwrap();
}

#[test]
fn value_iter_peek_and_skip_to() {
    let fixtures = [
        canonical([5u16, 9, 300, 301, 302, 40000]),
        Container::Bitmap(BitmapContainer::from_sorted_slice(&[
            5, 9, 300, 301, 302, 40000,
        ])),
        Container::Run(RunContainer::from_sorted_values(
            [5u16, 9, 300, 301, 302, 40000].into_iter(),
        )),
    ];
    for container in &fixtures {
        let mut iter = container.iter();
        assert_eq!(iter.peek(), Some(5));
        assert_eq!(iter.next(), Some(5));

        iter.advance_to(300);
        assert_eq!(iter.peek(), Some(300));

        // Advancing to a present value must not skip it; advancing
        // backwards must not rewind.
        iter.advance_to(10);
        assert_eq!(iter.next(), Some(300));

        iter.advance_to(302);
        assert_eq!(iter.next(), Some(302));
        iter.advance_to(50000);
        assert_eq!(iter.peek(), None);
        assert_eq!(iter.next(), None);
    }
}

#[test]
fn collect_into_fans_out_high_bits() {
    let container = canonical([0u16, 7, 65535]);
    let mut out = Vec::new();
    container.collect_into(0x0003_0000, &mut out);
    assert_eq!(out, vec![0x0003_0000, 0x0003_0007, 0x0003_FFFF]);

    // Appends after existing content.
    container.collect_into(0, &mut out);
    assert_eq!(out.len(), 6);
    assert_eq!(out[3..], [0, 7, 65535]);
}

#[test]
fn insert_range_canonicalizes() {
    let mut container = Container::empty();
    container.insert_range(100..5100);
    assert_eq!(container.kind(), ContainerKind::Run);
    assert_eq!(container.cardinality(), 5000);
    assert!(container.contains(100));
    assert!(container.contains(5099));
    assert!(!container.contains(5100));
    container.validate().unwrap();
}

#[test]
fn regression_bitmap_minus_step3_runs() {
    // Bitmap over [0,512) minus every third value up to 4096 leaves the
    // non-multiples of 3 below 512, an array of 341 values.
    let mut container = Container::Bitmap(BitmapContainer::from_range(0, 511));
    let step3 = Container::Run(RunContainer::from_sorted_values(
        (0u32..4096).step_by(3).map(|v| v as u16),
    ));
    container.difference_with(&step3);

    assert_eq!(container.kind(), ContainerKind::Array);
    assert_eq!(container.cardinality(), 341);
    let values: Vec<u16> = container.iter().collect();
    assert_eq!(&values[..8], &[1, 2, 4, 5, 7, 8, 10, 11]);
    assert_eq!(*values.last().unwrap(), 511);
    assert!(values.iter().all(|v| v % 3 != 0 && *v < 512));
    container.validate().unwrap();
}

#[test]
fn rank_and_select_agree_across_encodings() {
    let values = model((0..2000u32).map(|i| (i * 3) as u16));
    let sorted: Vec<u16> = values.iter().copied().collect();
    for container in encodings_of(&values) {
        for probe in [0usize, 1, 999, 1999] {
            assert_eq!(container.select(probe), Some(sorted[probe]));
            assert_eq!(container.rank(sorted[probe]), probe + 1);
        }
        assert_eq!(container.select(2000), None);
        assert_eq!(container.rank(u16::MAX), 2000);
        assert_eq!(container.min(), Some(sorted[0]));
        assert_eq!(container.max(), Some(*sorted.last().unwrap()));
    }
}
