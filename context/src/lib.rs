use control::Control;
use dwmpi::Communicator;
use linalg::LinalgType;
use log::info;
use memory::{MemoryPool, MemoryType, ProcessingUnit};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("memory_t = {mem} is not reachable from processing_unit = {pu}")]
    MemoryUnreachable { pu: ProcessingUnit, mem: MemoryType },

    #[error("linalg_t = {la} needs processing_unit = gpu, got {pu}")]
    LinalgUnreachable { pu: ProcessingUnit, la: LinalgType },

    #[error("num_mag_dims = {0} must be 0, 1 or 3")]
    MagneticDims(usize),
}

/// Run-wide settings and resources handed explicitly to every constructor
/// and operation of the wave-function core.
pub struct SimulationContext {
    comm: Arc<dyn Communicator>,

    processing_unit: ProcessingUnit,
    preferred_memory: MemoryType,
    blas_linalg_t: LinalgType,

    num_mag_dims: usize,

    cutoff: f64,
    gk_cutoff: f64,

    beta_chunk_size: usize,
    num_beta_chunks: usize,

    host_pool: Arc<MemoryPool>,
    device_pool: Arc<MemoryPool>,
}

impl SimulationContext {
    pub fn new(control: &Control, comm: Arc<dyn Communicator>) -> Result<SimulationContext, ContextError> {
        let pu = control.get_processing_unit();
        let mem = control.get_memory_t();
        let la = control.get_linalg_t();

        if pu == ProcessingUnit::Cpu && mem == MemoryType::Device {
            return Err(ContextError::MemoryUnreachable { pu, mem });
        }

        if pu == ProcessingUnit::Cpu && la.is_device() {
            return Err(ContextError::LinalgUnreachable { pu, la });
        }

        let num_mag_dims = control.get_num_mag_dims();

        if num_mag_dims != 0 && num_mag_dims != 1 && num_mag_dims != 3 {
            return Err(ContextError::MagneticDims(num_mag_dims));
        }

        let ctx = SimulationContext {
            comm,
            processing_unit: pu,
            preferred_memory: mem,
            blas_linalg_t: la,
            num_mag_dims,
            cutoff: control.get_cutoff(),
            gk_cutoff: control.get_gk_cutoff(),
            beta_chunk_size: control.get_beta_chunk_size(),
            num_beta_chunks: control.get_num_beta_chunks(),
            host_pool: MemoryPool::new(MemoryType::Host, None),
            device_pool: MemoryPool::new(MemoryType::Device, control.get_device_memory_limit()),
        };

        if ctx.comm.is_root() {
            info!(
                "context: {} ranks, processing unit {}, memory {}, linalg {}, {} spin(s)",
                ctx.comm.size(),
                pu,
                mem,
                la,
                ctx.num_spins()
            );
        }

        Ok(ctx)
    }

    pub fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    pub fn comm_arc(&self) -> Arc<dyn Communicator> {
        Arc::clone(&self.comm)
    }

    pub fn processing_unit(&self) -> ProcessingUnit {
        self.processing_unit
    }

    pub fn preferred_memory_t(&self) -> MemoryType {
        self.preferred_memory
    }

    pub fn blas_linalg_t(&self) -> LinalgType {
        self.blas_linalg_t
    }

    /// Backend matching the processing unit, regardless of `linalg_t`.
    pub fn pu_linalg_t(&self) -> LinalgType {
        match self.processing_unit {
            ProcessingUnit::Cpu => LinalgType::Blas,
            ProcessingUnit::Gpu => LinalgType::GpuBlas,
        }
    }

    pub fn num_mag_dims(&self) -> usize {
        self.num_mag_dims
    }

    pub fn num_spins(&self) -> usize {
        if self.num_mag_dims == 0 {
            1
        } else {
            2
        }
    }

    pub fn full_spinors(&self) -> bool {
        self.num_mag_dims == 3
    }

    pub fn pw_cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn gk_cutoff(&self) -> f64 {
        self.gk_cutoff
    }

    pub fn beta_chunk_size(&self) -> usize {
        self.beta_chunk_size
    }

    pub fn num_beta_chunks(&self) -> usize {
        self.num_beta_chunks
    }

    pub fn mem_pool(&self, kind: MemoryType) -> &Arc<MemoryPool> {
        match kind {
            MemoryType::Host => &self.host_pool,
            MemoryType::Device => &self.device_pool,
        }
    }
}
