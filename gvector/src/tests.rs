use super::*;
use dwmpi::{launch, SelfComm};
use std::sync::Arc;

fn cubic(a: f64) -> [[f64; 3]; 3] {
    let b = 2.0 * std::f64::consts::PI / a;

    [[b, 0.0, 0.0], [0.0, b, 0.0], [0.0, 0.0, b]]
}

#[test]
fn test_gvector_sorted_and_complete() {
    let comm = SelfComm::new();

    let gvec = GVector::new(&cubic(2.0 * std::f64::consts::PI), [0.0; 3], 2.5, &comm).unwrap();

    // integer points inside a sphere of radius 2.5
    let mut expected = 0;
    for i in -3i32..=3 {
        for j in -3i32..=3 {
            for k in -3i32..=3 {
                if ((i * i + j * j + k * k) as f64).sqrt() <= 2.5 {
                    expected += 1;
                }
            }
        }
    }

    assert_eq!(gvec.num_gvec(), expected);
    assert_eq!(gvec.miller(0), [0, 0, 0]);
    assert_eq!(gvec.miller(1), [-1, 0, 0]);

    for ig in 1..gvec.num_gvec() {
        assert!(gvec.length(ig) >= gvec.length(ig - 1));
    }

    // 1 + 6 + 12 + 8 + 6 + 24 + 24
    assert_eq!(gvec.num_shells(1e-10), 7);
}

#[test]
fn test_gvector_with_k_shift() {
    let comm = SelfComm::new();

    let gvec = GVector::new(&cubic(2.0 * std::f64::consts::PI), [0.5, 0.0, 0.0], 1.0, &comm).unwrap();

    // (-1,0,0) and (0,0,0) shifted by k are both at distance 0.5
    assert_eq!(gvec.miller(0), [-1, 0, 0]);
    assert_eq!(gvec.miller(1), [0, 0, 0]);
    assert!((gvec.length(0) - 0.5).abs() < 1e-14);
    assert_eq!(gvec.frac(0), [-0.5, 0.0, 0.0]);
}

#[test]
fn test_partition_covers_once() {
    let lattice = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

    let parts = launch(3, |comm| {
        let gvec = GVector::new(&lattice, [0.0; 3], 6.0, comm).unwrap();

        let gvp = GvecPartition::new(gvec, Arc::new(comm.clone())).unwrap();

        let counted: usize = (0..comm.size()).map(|rank| gvp.gvec_count(rank)).sum();
        assert_eq!(counted, gvp.num_gvec());
        assert_eq!(gvp.gvec_count(comm.rank()), gvp.count());

        (gvp.range(), gvp.num_gvec(), gvp.cart_local(0))
    });

    let num_gvec = parts[0].1;

    let mut next = 0;

    for (range, n, _) in parts.iter() {
        assert_eq!(*n, num_gvec);
        assert_eq!(range.start, next);
        assert!(range.len() + 1 >= num_gvec / 3);
        next = range.end;
    }

    assert_eq!(next, num_gvec);
    assert_eq!(parts[0].2, [0.0, 0.0, 0.0]);
}

#[test]
fn test_gk_cutoff_checks() {
    assert!(check_gk_cutoff(4.0, 8.0).is_ok());
    assert!(matches!(check_gk_cutoff(5.0, 8.0), Err(GvecError::GkCutoff { .. })));

    assert_eq!(suggest_lmax(7.0, 2.0, 10), Some(15));
    assert_eq!(suggest_lmax(4.0, 2.0, 10), None);
}

#[test]
fn test_invalid_cutoff() {
    let comm = SelfComm::new();

    assert!(matches!(
        GVector::new(&cubic(1.0), [0.0; 3], 0.0, &comm),
        Err(GvecError::InvalidCutoff(_))
    ));
}
