use memory::MemoryError;
use thiserror::Error;

mod cell;
pub use cell::*;

mod chunk;
pub use chunk::*;

mod projectors;
pub use projectors::*;

mod inner;
pub use inner::*;

#[derive(Debug, Error)]
pub enum BetaError {
    #[error("lattice vectors span no volume")]
    DegenerateLattice,

    #[error("atom {atom} refers to atom type {itype}, only {num_types} defined")]
    UnknownAtomType {
        atom: usize,
        itype: usize,
        num_types: usize,
    },

    #[error("atom type {label}: angular momentum {l} is not supported (0 or 1)")]
    UnsupportedChannel { label: String, l: usize },

    #[error("chunk {chunk}: {reason}")]
    ChunkPartition { chunk: usize, reason: String },

    #[error("cannot split {num_atoms} atoms into {count} chunks")]
    ChunkCount { count: usize, num_atoms: usize },

    #[error(transparent)]
    Memory(#[from] MemoryError),
}
