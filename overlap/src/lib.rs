use beta::BetaError;
use linalg::LinalgError;
use thiserror::Error;

mod qop;
pub use qop::*;

mod operator;
pub use operator::*;

mod arena;
pub use arena::*;

#[derive(Debug, Error)]
pub enum OverlapError {
    #[error("k-point {ik}, spin {ispn}: I + B*Q ({n}x{n}) is singular, pivots in [{min_pivot:.3e}, {max_pivot:.3e}]")]
    Singular {
        ik: usize,
        ispn: usize,
        n: usize,
        min_pivot: f64,
        max_pivot: f64,
    },

    #[error("atom type {itype}, spin {ispn}: Q block is {nrow}x{ncol}, expected {expected}x{expected}")]
    QBlock {
        itype: usize,
        ispn: usize,
        nrow: usize,
        ncol: usize,
        expected: usize,
    },

    #[error("Q operator has {0} spin blocks, expected 1 or 2")]
    QSpins(usize),

    #[error("k-point {ik}, spin {ispn}: Q acts on {q} projectors, the generator has {beta}")]
    SizeMismatch { ik: usize, ispn: usize, q: usize, beta: usize },

    #[error("no operator for k-point {ik}, spin {ispn}")]
    UnknownKey { ik: usize, ispn: usize },

    #[error(transparent)]
    Beta(#[from] BetaError),

    #[error(transparent)]
    Linalg(LinalgError),
}
