use super::*;
use dwmpi::{launch, SelfComm};
use gvector::GVector;

const LATTICE: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

fn partition(cutoff: f64, comm: Arc<dyn Communicator>) -> Arc<GvecPartition> {
    let gvec = GVector::new(&LATTICE, [0.0; 3], cutoff, comm.as_ref()).unwrap();

    Arc::new(GvecPartition::new(gvec, comm).unwrap())
}

#[test]
fn test_random_fill_independent_of_ranks() {
    launch(3, |comm| {
        let gvp = partition(5.0, Arc::new(comm.clone()));
        let full = partition(5.0, Arc::new(SelfComm::new()));

        let mt = MtBasis::from_fn(7, |_| 11, comm.rank(), comm.size());
        let mt_full = MtBasis::from_fn(7, |_| 11, 0, 1);

        let mut wf = WaveFunctions::<c64>::new(gvp.clone(), Some(mt), 6, 2);
        let mut wf_full = WaveFunctions::<c64>::new(full, Some(mt_full), 6, 2);

        wf.fill_random(17, SpinRange::new(2), 1, 4);
        wf_full.fill_random(17, SpinRange::new(2), 1, 4);

        let r = gvp.range();

        for ispn in 0..2 {
            for j in 0..6 {
                let a = wf.pw_coeffs(ispn).col(MemoryType::Host, j);
                let b = &wf_full.pw_coeffs(ispn).col(MemoryType::Host, j)[r.clone()];
                assert_eq!(a, b);
            }

            let rows = wf.mt_basis().unwrap().local_rows();
            let a = wf.mt_coeffs(ispn).col(MemoryType::Host, 3);
            let b = &wf_full.mt_coeffs(ispn).col(MemoryType::Host, 3)[rows];
            assert_eq!(a, b);
        }

        // untouched bands stay zero
        assert!(wf.pw_coeffs(0).col(MemoryType::Host, 0).iter().all(|x| *x == c64::new(0.0, 0.0)));
        assert!(wf.pw_coeffs(1).col(MemoryType::Host, 5).iter().all(|x| *x == c64::new(0.0, 0.0)));

        let cs = wf.checksum(ProcessingUnit::Cpu, SpinRange::new(2), 0, 6);
        let cs_full = wf_full.checksum(ProcessingUnit::Cpu, SpinRange::new(2), 0, 6);
        assert!((cs - cs_full).norm() < 1e-10);
    });
}

#[test]
fn test_device_residency() {
    let gvp = partition(4.0, Arc::new(SelfComm::new()));
    let pool = MemoryPool::new(MemoryType::Device, None);

    let mut wf = WaveFunctions::<c64>::new(gvp, None, 4, 1);
    wf.fill_random(3, SpinRange::new(0), 0, 4);

    let spins = SpinRange::new(0);

    wf.allocate(spins, MemoryType::Device, &pool).unwrap();
    assert_eq!(pool.stats().in_use, wf.num_pw_loc() * 4 * 16);

    wf.copy_to(spins, MemoryType::Device, 0, 4);

    let host = wf.checksum_pw(ProcessingUnit::Cpu, spins, 0, 4);
    let device = wf.checksum_pw(ProcessingUnit::Gpu, spins, 0, 4);
    assert_eq!(host, device);

    wf.zero(ProcessingUnit::Gpu, spins, 2, 2);
    assert_eq!(wf.checksum_pw(ProcessingUnit::Gpu, spins, 2, 2), c64::new(0.0, 0.0));
    assert!(wf.checksum_pw(ProcessingUnit::Cpu, spins, 2, 2) != c64::new(0.0, 0.0));

    wf.copy_to(spins, MemoryType::Host, 2, 2);
    assert_eq!(wf.checksum_pw(ProcessingUnit::Cpu, spins, 2, 2), c64::new(0.0, 0.0));

    wf.deallocate(spins, MemoryType::Device);
    assert_eq!(pool.stats().in_use, 0);
}

#[test]
fn test_copy_from() {
    let gvp = partition(4.0, Arc::new(SelfComm::new()));

    let mut src = WaveFunctions::<f64>::new(gvp.clone(), None, 5, 1);
    let mut dst = WaveFunctions::<f64>::new(gvp, None, 3, 1);

    src.fill_random(5, SpinRange::new(0), 0, 5);

    dst.copy_from(&src, 0, 3, 2, 1);

    assert_eq!(dst.pw_coeffs(0).col(MemoryType::Host, 1), src.pw_coeffs(0).col(MemoryType::Host, 3));
    assert_eq!(dst.pw_coeffs(0).col(MemoryType::Host, 2), src.pw_coeffs(0).col(MemoryType::Host, 4));
    assert!(dst.pw_coeffs(0).col(MemoryType::Host, 0).iter().all(|&x| x == 0.0));
}

#[test]
#[should_panic(expected = "bands 3..7 outside 6")]
fn test_band_range_checked() {
    let gvp = partition(3.0, Arc::new(SelfComm::new()));

    let mut wf = WaveFunctions::<c64>::new(gvp, None, 6, 1);

    wf.zero(ProcessingUnit::Cpu, SpinRange::new(0), 3, 4);
}

#[test]
#[should_panic(expected = "muffin-tin basis split for rank 0 of 2, G-vector communicator is rank 0 of 1")]
fn test_mt_basis_must_follow_communicator() {
    let gvp = partition(3.0, Arc::new(SelfComm::new()));

    let mt = MtBasis::from_fn(5, |_| 3, 0, 2);

    WaveFunctions::<c64>::new(gvp, Some(mt), 4, 1);
}
