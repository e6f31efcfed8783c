use crate::chunk::{build_chunks, chunk_ranges, validate_ranges};
use crate::{BetaChunk, BetaChunking, BetaColumn, BetaError, UnitCell};

use context::SimulationContext;
use dwmpi::Communicator;
use gvector::GvecPartition;
use log::debug;
use memory::{DualArray, MemoryPool, MemoryType};
use rayon::prelude::*;
use std::f64::consts::PI;
use std::ops::Range;
use std::sync::Arc;
use types::{c64, Scalar};

/// Generator of the atomic projectors of one k-point, one chunk of atoms at
/// a time.
pub struct BetaProjectors {
    gvp: Arc<GvecPartition>,
    uc: Arc<UnitCell>,
    chunks: Vec<BetaChunk>,
    num_total_beta: usize,
    max_chunk_beta: usize,
    mem: MemoryType,
    pool: Arc<MemoryPool>,
}

/// Coefficient buffer shared by all chunks of a generator. Holds the chunk
/// produced by the last `generate`.
pub struct BetaCoeffs<T: Scalar> {
    data: DualArray<T>,
    chunk: Option<usize>,
}

impl<T: Scalar> BetaCoeffs<T> {
    /// Index of the chunk currently held, if any.
    pub fn chunk(&self) -> Option<usize> {
        self.chunk
    }

    pub fn nrow(&self) -> usize {
        self.data.nrow()
    }

    pub fn ncol(&self) -> usize {
        self.data.ncol()
    }

    pub fn at(&self, mem: MemoryType) -> &[T] {
        self.data.at(mem)
    }
}

/// Coefficients of one chunk. Borrows the shared buffer, so it has to be
/// consumed before the buffer is generated again.
pub struct ChunkCoeffs<'b, T: Scalar> {
    index: usize,
    chunk: &'b BetaChunk,
    data: &'b DualArray<T>,
    mem: MemoryType,
    pool: &'b Arc<MemoryPool>,
    comm: &'b dyn Communicator,
}

impl<'b, T: Scalar> ChunkCoeffs<'b, T> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn chunk(&self) -> &BetaChunk {
        self.chunk
    }

    pub fn num_beta(&self) -> usize {
        self.chunk.num_beta()
    }

    /// Offset of the chunk in the full projector set.
    pub fn offset(&self) -> usize {
        self.chunk.offset()
    }

    pub fn num_gkvec_loc(&self) -> usize {
        self.data.nrow()
    }

    pub fn mem(&self) -> MemoryType {
        self.mem
    }

    pub fn pool(&self) -> &Arc<MemoryPool> {
        self.pool
    }

    pub fn comm(&self) -> &dyn Communicator {
        self.comm
    }

    /// `num_gkvec_loc x num_beta` column-major block in memory `mem`.
    pub fn at(&self, mem: MemoryType) -> &[T] {
        &self.data.at(mem)[..self.data.nrow() * self.num_beta()]
    }
}

impl BetaProjectors {
    pub fn new(
        ctx: &SimulationContext,
        gvp: Arc<GvecPartition>,
        uc: Arc<UnitCell>,
        chunking: BetaChunking,
    ) -> Result<BetaProjectors, BetaError> {
        let ranges = chunk_ranges(&uc, chunking)?;

        BetaProjectors::with_chunks(ctx, gvp, uc, ranges)
    }

    /// Chunks from explicit atom ranges. The ranges must cover all atoms
    /// once, in order.
    pub fn with_chunks(
        ctx: &SimulationContext,
        gvp: Arc<GvecPartition>,
        uc: Arc<UnitCell>,
        ranges: Vec<Range<usize>>,
    ) -> Result<BetaProjectors, BetaError> {
        validate_ranges(&ranges, uc.num_atoms())?;

        let chunks = build_chunks(&uc, ranges);

        let num_total_beta = chunks.iter().map(|c| c.num_beta()).sum();
        let max_chunk_beta = chunks.iter().map(|c| c.num_beta()).max().unwrap_or(0);

        let mem = ctx.preferred_memory_t();

        debug!(
            "beta projectors: {} atoms, {} projectors in {} chunks, largest chunk {}, {} local G+k on {}",
            uc.num_atoms(),
            num_total_beta,
            chunks.len(),
            max_chunk_beta,
            gvp.count(),
            mem
        );

        Ok(BetaProjectors {
            gvp,
            uc,
            chunks,
            num_total_beta,
            max_chunk_beta,
            mem,
            pool: Arc::clone(ctx.mem_pool(mem)),
        })
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn num_total_beta(&self) -> usize {
        self.num_total_beta
    }

    pub fn max_chunk_beta(&self) -> usize {
        self.max_chunk_beta
    }

    pub fn chunk(&self, ichunk: usize) -> &BetaChunk {
        &self.chunks[ichunk]
    }

    pub fn chunks(&self) -> &[BetaChunk] {
        &self.chunks
    }

    pub fn gvec_partition(&self) -> &GvecPartition {
        &self.gvp
    }

    pub fn unit_cell(&self) -> &UnitCell {
        &self.uc
    }

    pub fn comm(&self) -> &dyn Communicator {
        self.gvp.comm()
    }

    /// Residency of the generated coefficients.
    pub fn mem(&self) -> MemoryType {
        self.mem
    }

    pub fn pool(&self) -> &Arc<MemoryPool> {
        &self.pool
    }

    /// Buffer large enough for the largest chunk, resident where the context
    /// prefers.
    pub fn prepare<T: Scalar>(&self) -> Result<BetaCoeffs<T>, BetaError> {
        let mut data = DualArray::new(self.gvp.count(), self.max_chunk_beta);

        data.allocate(self.mem, &self.pool)?;

        Ok(BetaCoeffs { data, chunk: None })
    }

    /// Overwrites `coeffs` with the projectors of chunk `ichunk`. Columns
    /// past the chunk are zeroed.
    pub fn generate<'b, T: Scalar>(&'b self, coeffs: &'b mut BetaCoeffs<T>, ichunk: usize) -> ChunkCoeffs<'b, T> {
        assert!(
            ichunk < self.num_chunks(),
            "beta projectors: chunk {} requested, only {} chunks",
            ichunk,
            self.num_chunks()
        );

        let ngk = self.gvp.count();

        assert!(
            coeffs.nrow() == ngk && coeffs.ncol() == self.max_chunk_beta,
            "beta projectors: buffer of {}x{} does not belong to a generator of {}x{}",
            coeffs.nrow(),
            coeffs.ncol(),
            ngk,
            self.max_chunk_beta
        );

        let chunk = &self.chunks[ichunk];

        if ngk > 0 {
            let host = coeffs.data.at_mut(MemoryType::Host);

            let (used, tail) = host.split_at_mut(ngk * chunk.num_beta());

            used.par_chunks_mut(ngk)
                .zip(chunk.columns().par_iter())
                .for_each(|(col, c)| self.fill_column(col, c));

            tail.iter_mut().for_each(|x| *x = T::zero());

            if self.mem == MemoryType::Device {
                coeffs.data.copy_to(MemoryType::Device);
            }
        }

        coeffs.chunk = Some(ichunk);

        ChunkCoeffs {
            index: ichunk,
            chunk,
            data: &coeffs.data,
            mem: self.mem,
            pool: &self.pool,
            comm: self.gvp.comm(),
        }
    }

    // f(q) * exp(-i (G+k) r) / sqrt(omega), f = exp(-sigma q^2) for s and
    // i q_m exp(-sigma q^2) for p projectors
    fn fill_column<T: Scalar>(&self, col: &mut [T], c: &BetaColumn) {
        let pos = self.uc.atom(c.atom).position;

        let norm = 1.0 / self.uc.omega().sqrt();

        for (igloc, x) in col.iter_mut().enumerate() {
            let q = self.gvp.cart_local(igloc);
            let f = self.gvp.frac_local(igloc);

            let q2 = q[0] * q[0] + q[1] * q[1] + q[2] * q[2];

            let radial = (-c.sigma * q2).exp() * norm;

            let angular = match c.l {
                0 => c64::new(1.0, 0.0),
                _ => c64::new(0.0, q[c.m]),
            };

            let phase = -2.0 * PI * (f[0] * pos[0] + f[1] * pos[1] + f[2] * pos[2]);

            let v = angular * c64::from_polar(radial, phase);

            *x = T::from_parts(v.re, v.im);
        }
    }
}
