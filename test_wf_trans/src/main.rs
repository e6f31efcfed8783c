use std::cell::Cell;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use context::SimulationContext;
use control::Control;
use dmatrix::{BlacsGrid, DMatrix};
use dwmpi::{Communicator, SelfComm};
use gvector::{GVector, GvecPartition};
use linalg::LinalgType;
use log::{info, LevelFilter, Log, Metadata, Record};
use memory::{MemoryType, ProcessingUnit};
use std::ops::Mul;
use types::{c32, c64, Scalar};
use wavefunctions::{MtBasis, SpinRange, WaveFunctions};
use wftrans::transform;

const NUM_ATOMS: usize = 31;
const NUM_MT_COEFFS: usize = 123;

type CliResult<T> = Result<T, String>;

#[derive(Clone, Debug, Parser)]
#[command(name = "test_wf_trans", about = "Times the wave-function transform on a block-cyclic grid")]
struct Cli {
    /// dimensions of the BLACS grid
    #[arg(long, num_args = 2, value_names = ["ROWS", "COLS"], default_values_t = [1, 1])]
    mpi_grid_dims: Vec<usize>,
    /// wave-function cutoff
    #[arg(long, default_value_t = 8.0)]
    cutoff: f64,
    /// block size of the transformation matrix
    #[arg(long, default_value_t = 32)]
    bs: usize,
    #[arg(long, default_value_t = 100)]
    num_bands: usize,
    #[arg(long, default_value_t = 0)]
    num_mag_dims: usize,
    #[arg(long, default_value = "blas")]
    linalg_t: LinalgType,
    #[arg(long, default_value = "host")]
    memory_t: MemoryType,
    /// single precision wave functions and matrix
    #[arg(long)]
    fp32: bool,
    /// ranks of the in-process world
    #[arg(long, default_value_t = 1)]
    num_ranks: usize,
    #[arg(long, default_value_t = 1)]
    repeat: usize,
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

thread_local! {
    static IS_ROOT: Cell<bool> = Cell::new(true);
}

/// Prints records of the root rank only.
struct RootLogger;

impl Log for RootLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) && IS_ROOT.with(|r| r.get()) {
            println!("[{:>5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

fn control_from(cli: &Cli) -> CliResult<Control> {
    if cli.mpi_grid_dims.len() != 2 {
        return Err(format!("--mpi-grid-dims takes two values, got {:?}", cli.mpi_grid_dims));
    }

    let pu = if cli.memory_t == MemoryType::Device || cli.linalg_t.is_device() {
        ProcessingUnit::Gpu
    } else {
        ProcessingUnit::Cpu
    };

    let mut control = Control::new();

    control.set_processing_unit(pu);
    control.set_memory_t(cli.memory_t);
    control.set_linalg_t(cli.linalg_t);
    control.set_mpi_grid_dims([cli.mpi_grid_dims[0], cli.mpi_grid_dims[1]]);
    control.set_cutoff(cli.cutoff);
    control.set_num_bands(cli.num_bands);
    control.set_bs(cli.bs);
    control.set_num_mag_dims(cli.num_mag_dims);

    Ok(control)
}

fn test_wf_trans<T, F>(ctx: &SimulationContext, grid: &Arc<BlacsGrid>, control: &Control) -> CliResult<f64>
where
    T: Scalar + Mul<F, Output = T>,
    F: Scalar,
{
    let comm = ctx.comm_arc();

    let nbnd = control.get_num_bands();
    let num_sc = if ctx.num_mag_dims() == 0 { 1 } else { 2 };
    let spins = if num_sc == 2 { SpinRange::new(2) } else { SpinRange::new(0) };

    let lattice = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

    let gvec = GVector::new(&lattice, [0.0; 3], ctx.pw_cutoff(), comm.as_ref()).map_err(|e| e.to_string())?;
    let gvp = Arc::new(GvecPartition::new(gvec, Arc::clone(&comm)).map_err(|e| e.to_string())?);

    info!("number of bands          : {}", nbnd);
    info!("number of spins          : {}", ctx.num_spins());
    info!("full spinors             : {}", ctx.full_spinors());
    info!("total number of G-vectors: {}", gvp.num_gvec());
    info!("local number of G-vectors: {}", gvp.count());

    let mt = MtBasis::from_fn(NUM_ATOMS, |_| NUM_MT_COEFFS, comm.rank(), comm.size());

    let mut phi = WaveFunctions::<T>::new(Arc::clone(&gvp), Some(mt.clone()), 2 * nbnd, num_sc);
    let mut tmp = WaveFunctions::<T>::new(Arc::clone(&gvp), Some(mt), 2 * nbnd, num_sc);

    phi.fill_random(1234, spins, 0, 2 * nbnd);

    let mem = ctx.preferred_memory_t();

    if mem == MemoryType::Device {
        let pool = ctx.mem_pool(MemoryType::Device);

        phi.allocate(spins, mem, pool).map_err(|e| e.to_string())?;
        tmp.allocate(spins, mem, pool).map_err(|e| e.to_string())?;

        phi.copy_to(spins, mem, 0, 2 * nbnd);
    }

    let bs = control.get_bs();

    let mut tmtrx = DMatrix::<F>::new(2 * nbnd, 2 * nbnd, grid, bs, bs).map_err(|e| e.to_string())?;

    tmtrx.fill_global(|i, j| F::from_re(((i * 7 + j * 13) % 17) as f64 / 17.0 - 0.5));

    comm.barrier();

    let t0 = Instant::now();

    transform(ctx, 0, &phi, 0, nbnd, &tmtrx, &mut tmp, 0, nbnd);

    comm.barrier();

    let elapsed = t0.elapsed().as_secs_f64();

    let cs = tmp.checksum(ctx.processing_unit(), SpinRange::new(0), 0, nbnd);

    info!("transform: {:.6} s, checksum ({:.12e}, {:.12e})", elapsed, cs.re, cs.im);

    Ok(elapsed)
}

fn run_rank(comm: Arc<dyn Communicator>, cli: &Cli, control: &Control) -> CliResult<Vec<f64>> {
    IS_ROOT.with(|r| r.set(comm.is_root()));

    let ctx = SimulationContext::new(control, Arc::clone(&comm)).map_err(|e| e.to_string())?;

    let [nrow, ncol] = control.get_mpi_grid_dims();

    let grid_comm: Arc<dyn Communicator> = if nrow * ncol == 1 {
        Arc::new(SelfComm::new())
    } else {
        Arc::clone(&comm)
    };

    let grid = Arc::new(BlacsGrid::new(grid_comm, nrow, ncol).map_err(|e| e.to_string())?);

    let mut timings = Vec::with_capacity(cli.repeat);

    for _ in 0..cli.repeat {
        let t = if cli.fp32 {
            test_wf_trans::<c32, f32>(&ctx, &grid, control)?
        } else {
            test_wf_trans::<c64, f64>(&ctx, &grid, control)?
        };

        timings.push(t);
    }

    Ok(timings)
}

#[cfg(not(feature = "mpi"))]
fn run(cli: &Cli, control: &Control) -> CliResult<Vec<f64>> {
    if cli.num_ranks == 0 {
        return Err("--num-ranks must be at least 1".to_string());
    }

    let results = dwmpi::launch(cli.num_ranks, |comm| {
        let comm: Arc<dyn Communicator> = Arc::new(comm.clone());
        run_rank(comm, cli, control)
    });

    let mut root = None;

    // the root's timings include the closing barrier of every rank
    for (rank, r) in results.into_iter().enumerate() {
        let timings = r.map_err(|e| format!("rank {}: {}", rank, e))?;

        if rank == 0 {
            root = Some(timings);
        }
    }

    root.ok_or_else(|| "no ranks".to_string())
}

#[cfg(feature = "mpi")]
fn run(cli: &Cli, control: &Control) -> CliResult<Vec<f64>> {
    if cli.num_ranks != 1 {
        return Err("--num-ranks is set by mpirun when built with MPI".to_string());
    }

    let world: Arc<dyn Communicator> = Arc::new(dwmpi::MpiWorld::init());

    run_rank(world, cli, control)
}

fn main() {
    let cli = Cli::parse();

    if log::set_logger(&RootLogger).is_ok() {
        log::set_max_level(cli.log_level);
    }

    let control = match control_from(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("test_wf_trans: {}", e);
            std::process::exit(1);
        }
    };

    control.display();

    match run(&cli, &control) {
        Ok(timings) => {
            let total: f64 = timings.iter().sum();

            info!(
                "{} repeats, total {:.6} s, average {:.6} s",
                timings.len(),
                total,
                total / timings.len().max(1) as f64
            );
        }
        Err(e) => {
            eprintln!("test_wf_trans: {}", e);
            std::process::exit(1);
        }
    }
}
