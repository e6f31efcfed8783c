use context::SimulationContext;
use control::Control;
use dmatrix::{BlacsGrid, DMatrix};
use dwmpi::{launch, Communicator, LocalComm, SelfComm};
use gvector::{GVector, GvecPartition};
use linalg::LinalgType;
use matrix::Matrix;
use memory::{MemoryType, ProcessingUnit};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;
use types::c64;
use wavefunctions::{MtBasis, SpinRange, WaveFunctions};
use wftrans::{transform, transform_ab};

const LATTICE: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

struct Setup {
    ctx: SimulationContext,
    gvp: Arc<GvecPartition>,
}

fn setup(comm: &LocalComm, pu: ProcessingUnit, la: LinalgType, num_mag_dims: usize) -> Setup {
    let comm: Arc<dyn Communicator> = Arc::new(comm.clone());

    let mut control = Control::new();
    control.set_processing_unit(pu);
    control.set_memory_t(pu.memory_t());
    control.set_linalg_t(la);
    control.set_num_mag_dims(num_mag_dims);

    let ctx = SimulationContext::new(&control, Arc::clone(&comm)).unwrap();

    let gvec = GVector::new(&LATTICE, [0.0; 3], 4.0, comm.as_ref()).unwrap();
    let gvp = Arc::new(GvecPartition::new(gvec, comm).unwrap());

    Setup { ctx, gvp }
}

fn random_wf(s: &Setup, num_wf: usize, num_sc: usize, seed: u64) -> WaveFunctions<c64> {
    let comm = s.gvp.comm();

    let mt = MtBasis::from_fn(7, |ia| 5 + ia % 3, comm.rank(), comm.size());

    let mut wf = WaveFunctions::new(Arc::clone(&s.gvp), Some(mt), num_wf, num_sc);

    let spins = if num_sc == 2 { SpinRange::new(2) } else { SpinRange::new(0) };

    wf.fill_random(seed, spins, 0, num_wf);

    wf
}

fn random_matrix(n: usize, seed: u64) -> Matrix<f64> {
    let mut rng = StdRng::seed_from_u64(seed);

    Matrix::from_fn(n, n, |_, _| rng.gen_range(-1.0, 1.0))
}

fn grid(comm: Arc<dyn Communicator>, nrow: usize, ncol: usize) -> Arc<BlacsGrid> {
    Arc::new(BlacsGrid::new(comm, nrow, ncol).unwrap())
}

fn local_pw(wf: &WaveFunctions<c64>, ispn: usize) -> Vec<c64> {
    wf.pw_coeffs(ispn).at(MemoryType::Host).to_vec()
}

fn local_mt(wf: &WaveFunctions<c64>, ispn: usize) -> Vec<c64> {
    wf.mt_coeffs(ispn).at(MemoryType::Host).to_vec()
}

fn max_diff(a: &[c64], b: &[c64]) -> f64 {
    a.iter().zip(b.iter()).fold(0.0, |acc: f64, (x, y)| acc.max((x - y).norm()))
}

#[test]
fn test_identity_transform_reproduces_input() {
    for &(pr, pc) in [(1, 1), (2, 2), (1, 4), (4, 1)].iter() {
        launch(pr * pc, |comm| {
            let s = setup(comm, ProcessingUnit::Cpu, LinalgType::Scalapack, 0);

            let nb = 23;

            let phi = random_wf(&s, nb, 1, 1);
            let mut tmp = WaveFunctions::<c64>::new(Arc::clone(&s.gvp), phi.mt_basis().cloned(), nb, 1);

            let mut id = DMatrix::<f64>::new(nb, nb, &grid(s.ctx.comm_arc(), pr, pc), 4, 4).unwrap();
            id.set_identity();

            transform(&s.ctx, 0, &phi, 0, nb, &id, &mut tmp, 0, nb);

            assert!(max_diff(&local_pw(&phi, 0), &local_pw(&tmp, 0)) < 1e-15);
            assert!(max_diff(&local_mt(&phi, 0), &local_mt(&tmp, 0)) < 1e-15);
        });
    }
}

#[test]
fn test_result_independent_of_grid_shape() {
    let nb = 50;
    let m = random_matrix(2 * nb, 5);

    let results = launch(4, |comm| {
        let s = setup(comm, ProcessingUnit::Cpu, LinalgType::Blas, 0);

        let phi = random_wf(&s, 2 * nb, 1, 2);

        let mut out = Vec::new();

        for &(pr, pc) in [(1, 1), (2, 2), (4, 1)].iter() {
            let g = if pr * pc == 1 {
                grid(Arc::new(SelfComm::new()), 1, 1)
            } else {
                grid(s.ctx.comm_arc(), pr, pc)
            };

            let dm = DMatrix::from_global(&m, &g, 16, 16).unwrap();

            let mut tmp = WaveFunctions::<c64>::new(Arc::clone(&s.gvp), phi.mt_basis().cloned(), 2 * nb, 1);

            transform(&s.ctx, 0, &phi, 0, nb, &dm, &mut tmp, 0, nb);

            out.push((local_pw(&tmp, 0), local_mt(&tmp, 0)));
        }

        out
    });

    for per_rank in results.iter() {
        for other in per_rank.iter().skip(1) {
            assert!(max_diff(&per_rank[0].0, &other.0) < 1e-13);
            assert!(max_diff(&per_rank[0].1, &other.1) < 1e-13);
        }
    }
}

#[test]
fn test_transform_ab_on_windows() {
    let nb = 30;
    let m = random_matrix(nb + 7, 8);

    let (i0, nin, irow0, jcol0, j0, nout) = (3, 12, 5, 2, 4, 17);

    let alpha = c64::new(0.5, -0.25);
    let beta = c64::new(-1.0, 2.0);

    launch(4, |comm| {
        let s = setup(comm, ProcessingUnit::Cpu, LinalgType::Blas, 1);

        let phi = random_wf(&s, nb, 2, 3);
        let mut out = random_wf(&s, nb, 2, 4);

        let before = local_pw(&out, 1);

        let dm = DMatrix::from_global(&m, &grid(s.ctx.comm_arc(), 2, 2), 3, 5).unwrap();

        transform_ab(&s.ctx, 1, alpha, &phi, i0, nin, &dm, irow0, jcol0, beta, &mut out, j0, nout);

        let ngk = s.gvp.count();
        let a = local_pw(&phi, 1);
        let c = local_pw(&out, 1);

        let mut expected = before.clone();

        for j in 0..nout {
            for ig in 0..ngk {
                let mut v = c64::new(0.0, 0.0);

                for l in 0..nin {
                    v += a[(i0 + l) * ngk + ig] * m[[irow0 + l, jcol0 + j]];
                }

                let idx = (j0 + j) * ngk + ig;
                expected[idx] = alpha * v + beta * before[idx];
            }
        }

        assert!(max_diff(&c, &expected) < 1e-12);

        // spin 0 is not part of the spin range
        assert_eq!(local_pw(&out, 0), local_pw(&random_wf(&s, nb, 2, 4), 0));
    });
}

#[test]
fn test_host_and_device_backends_agree() {
    let nb = 40;
    let m = random_matrix(nb, 9);

    launch(4, |comm| {
        let host = setup(comm, ProcessingUnit::Cpu, LinalgType::Blas, 3);
        let gpu = setup(comm, ProcessingUnit::Gpu, LinalgType::GpuBlas, 3);

        let spins = SpinRange::new(2);

        let g = grid(host.ctx.comm_arc(), 2, 2);
        let dm = DMatrix::from_global(&m, &g, 8, 8).unwrap();

        let phi = random_wf(&host, nb, 2, 6);
        let mut out_host = WaveFunctions::<c64>::new(Arc::clone(&host.gvp), phi.mt_basis().cloned(), nb, 2);

        transform(&host.ctx, 2, &phi, 0, nb, &dm, &mut out_host, 0, nb);

        let pool = gpu.ctx.mem_pool(MemoryType::Device);

        let mut phi_dev = random_wf(&gpu, nb, 2, 6);
        phi_dev.allocate(spins, MemoryType::Device, pool).unwrap();
        phi_dev.copy_to(spins, MemoryType::Device, 0, nb);

        let mut out_dev = WaveFunctions::<c64>::new(Arc::clone(&gpu.gvp), phi_dev.mt_basis().cloned(), nb, 2);
        out_dev.allocate(spins, MemoryType::Device, pool).unwrap();

        transform(&gpu.ctx, 2, &phi_dev, 0, nb, &dm, &mut out_dev, 0, nb);

        out_dev.copy_to(spins, MemoryType::Host, 0, nb);

        for ispn in 0..2 {
            assert_eq!(local_pw(&out_host, ispn), local_pw(&out_dev, ispn));
            assert_eq!(local_mt(&out_host, ispn), local_mt(&out_dev, ispn));
        }

        assert!(pool.stats().high_water > 0);
    });
}

#[test]
#[should_panic(expected = "outside 10x10 matrix")]
fn test_window_outside_matrix_is_fatal() {
    let s = setup(&LocalComm::solo(), ProcessingUnit::Cpu, LinalgType::Blas, 0);

    let phi = random_wf(&s, 20, 1, 1);
    let mut tmp = WaveFunctions::<c64>::new(Arc::clone(&s.gvp), phi.mt_basis().cloned(), 20, 1);

    let dm = DMatrix::<f64>::new(10, 10, &grid(s.ctx.comm_arc(), 1, 1), 4, 4).unwrap();

    transform(&s.ctx, 0, &phi, 0, 12, &dm, &mut tmp, 0, 10);
}

#[test]
#[should_panic(expected = "cannot stage the 400x400 matrix window (1280000 bytes) on the device: device pool exhausted")]
fn test_staging_beyond_device_limit_is_fatal() {
    let comm: Arc<dyn Communicator> = Arc::new(SelfComm::new());

    let mut control = Control::new();
    control.set_processing_unit(ProcessingUnit::Gpu);
    control.set_memory_t(MemoryType::Device);
    control.set_linalg_t(LinalgType::GpuBlas);
    control.parse_str("device_memory_limit = 1").unwrap();

    let ctx = SimulationContext::new(&control, Arc::clone(&comm)).unwrap();

    let gvec = GVector::new(&LATTICE, [0.0; 3], 1.0, comm.as_ref()).unwrap();
    let gvp = Arc::new(GvecPartition::new(gvec, Arc::clone(&comm)).unwrap());

    let nb = 400;
    let pool = ctx.mem_pool(MemoryType::Device);

    let mut phi = WaveFunctions::<c64>::new(Arc::clone(&gvp), None, nb, 1);
    phi.fill_random(2, SpinRange::new(0), 0, nb);
    phi.allocate(SpinRange::new(0), MemoryType::Device, pool).unwrap();
    phi.copy_to(SpinRange::new(0), MemoryType::Device, 0, nb);

    let mut out = WaveFunctions::<c64>::new(gvp, None, nb, 1);
    out.allocate(SpinRange::new(0), MemoryType::Device, pool).unwrap();

    let dm = DMatrix::from_global(&random_matrix(nb, 4), &grid(comm, 1, 1), 16, 16).unwrap();

    transform(&ctx, 0, &phi, 0, nb, &dm, &mut out, 0, nb);
}
