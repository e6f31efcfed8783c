use std::fmt;
use std::str::FromStr;
use thiserror::Error;

mod gemm;
pub use gemm::*;

mod lu;
pub use lu::*;

/// Backend for dense linear algebra.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinalgType {
    Blas,
    Lapack,
    Scalapack,
    GpuBlas,
}

impl LinalgType {
    /// Whether the backend works on device-resident buffers.
    pub fn is_device(&self) -> bool {
        matches!(self, LinalgType::GpuBlas)
    }
}

#[derive(Debug, Error)]
pub enum LinalgError {
    #[error("unknown linear algebra type '{0}' (blas|lapack|scalapack|gpublas)")]
    UnknownLinalgType(String),

    #[error("{nrow}x{ncol} matrix is not square")]
    NotSquare { nrow: usize, ncol: usize },

    #[error("{n}x{n} matrix is singular: smallest pivot {min_pivot:.3e}, largest {max_pivot:.3e}")]
    Singular {
        n: usize,
        min_pivot: f64,
        max_pivot: f64,
    },
}

impl fmt::Display for LinalgType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            LinalgType::Blas => "blas",
            LinalgType::Lapack => "lapack",
            LinalgType::Scalapack => "scalapack",
            LinalgType::GpuBlas => "gpublas",
        };

        write!(f, "{}", s)
    }
}

impl FromStr for LinalgType {
    type Err = LinalgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "blas" => Ok(LinalgType::Blas),
            "lapack" => Ok(LinalgType::Lapack),
            "scalapack" => Ok(LinalgType::Scalapack),
            "gpublas" | "cublas" => Ok(LinalgType::GpuBlas),
            _ => Err(LinalgError::UnknownLinalgType(s.to_string())),
        }
    }
}

#[test]
fn test_parse_linalg_type() {
    assert_eq!("ScaLAPACK".parse::<LinalgType>().unwrap(), LinalgType::Scalapack);
    assert!("cublas".parse::<LinalgType>().unwrap().is_device());
    assert!("magma".parse::<LinalgType>().is_err());
}
