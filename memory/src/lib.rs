use std::fmt;
use std::str::FromStr;
use thiserror::Error;

mod pool;
pub use pool::*;

mod dual;
pub use dual::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemoryType {
    Host,
    Device,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingUnit {
    Cpu,
    Gpu,
}

impl ProcessingUnit {
    /// Residency the unit computes on.
    pub fn memory_t(&self) -> MemoryType {
        match self {
            ProcessingUnit::Cpu => MemoryType::Host,
            ProcessingUnit::Gpu => MemoryType::Device,
        }
    }
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("{kind} pool exhausted: requested {requested} bytes with {in_use} in use, limit {limit}")]
    Exhausted {
        kind: MemoryType,
        requested: usize,
        in_use: usize,
        limit: usize,
    },

    #[error("unknown memory type '{0}' (host|device)")]
    UnknownMemoryType(String),

    #[error("unknown processing unit '{0}' (cpu|gpu)")]
    UnknownProcessingUnit(String),
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MemoryType::Host => write!(f, "host"),
            MemoryType::Device => write!(f, "device"),
        }
    }
}

impl FromStr for MemoryType {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "host" => Ok(MemoryType::Host),
            "device" => Ok(MemoryType::Device),
            _ => Err(MemoryError::UnknownMemoryType(s.to_string())),
        }
    }
}

impl fmt::Display for ProcessingUnit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProcessingUnit::Cpu => write!(f, "cpu"),
            ProcessingUnit::Gpu => write!(f, "gpu"),
        }
    }
}

impl FromStr for ProcessingUnit {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(ProcessingUnit::Cpu),
            "gpu" => Ok(ProcessingUnit::Gpu),
            _ => Err(MemoryError::UnknownProcessingUnit(s.to_string())),
        }
    }
}

#[test]
fn test_parse_tags() {
    assert_eq!("Device".parse::<MemoryType>().unwrap(), MemoryType::Device);
    assert_eq!(" cpu ".parse::<ProcessingUnit>().unwrap(), ProcessingUnit::Cpu);
    assert_eq!(ProcessingUnit::Gpu.memory_t(), MemoryType::Device);
    assert!("managed".parse::<MemoryType>().is_err());
}
