use linalg::LinalgType;
use log::info;
use memory::{MemoryType, ProcessingUnit};
use std::{fmt::Display, fs, str::FromStr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: unknown parameter '{key}'")]
    UnknownKey { line: usize, key: String },

    #[error("line {line}: parameter '{key}' has no value")]
    MissingValue { line: usize, key: String },

    #[error("line {line}: bad value '{value}' for '{key}': {reason}")]
    BadValue {
        line: usize,
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Control {
    processing_unit: ProcessingUnit,
    memory_t: MemoryType,
    linalg_t: LinalgType,

    mpi_grid_dims: [usize; 2],

    cutoff: f64,    // plane-wave cutoff, a.u.^-1
    gk_cutoff: f64, // |G+k| cutoff of the wave functions, a.u.^-1

    num_bands: usize,
    bs: usize,
    num_mag_dims: usize,

    beta_chunk_size: usize,
    num_beta_chunks: usize, // 0: derived from beta_chunk_size

    device_memory_limit: usize, // MiB, 0: unlimited
}

impl Default for Control {
    fn default() -> Self {
        Control {
            processing_unit: ProcessingUnit::Cpu,
            memory_t: MemoryType::Host,
            linalg_t: LinalgType::Blas,
            mpi_grid_dims: [1, 1],
            cutoff: 8.0,
            gk_cutoff: 4.0,
            num_bands: 100,
            bs: 32,
            num_mag_dims: 0,
            beta_chunk_size: 256,
            num_beta_chunks: 0,
            device_memory_limit: 0,
        }
    }
}

impl Control {
    pub fn new() -> Control {
        Control::default()
    }

    pub fn get_processing_unit(&self) -> ProcessingUnit {
        self.processing_unit
    }

    pub fn get_memory_t(&self) -> MemoryType {
        self.memory_t
    }

    pub fn get_linalg_t(&self) -> LinalgType {
        self.linalg_t
    }

    pub fn get_mpi_grid_dims(&self) -> [usize; 2] {
        self.mpi_grid_dims
    }

    pub fn get_cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn get_gk_cutoff(&self) -> f64 {
        self.gk_cutoff
    }

    pub fn get_num_bands(&self) -> usize {
        self.num_bands
    }

    pub fn get_bs(&self) -> usize {
        self.bs
    }

    pub fn get_num_mag_dims(&self) -> usize {
        self.num_mag_dims
    }

    pub fn get_num_spins(&self) -> usize {
        if self.num_mag_dims == 0 {
            1
        } else {
            2
        }
    }

    pub fn get_beta_chunk_size(&self) -> usize {
        self.beta_chunk_size
    }

    pub fn get_num_beta_chunks(&self) -> usize {
        self.num_beta_chunks
    }

    /// Bytes, `None` when unlimited.
    pub fn get_device_memory_limit(&self) -> Option<usize> {
        if self.device_memory_limit == 0 {
            None
        } else {
            Some(self.device_memory_limit * 1024 * 1024)
        }
    }

    pub fn set_processing_unit(&mut self, pu: ProcessingUnit) {
        self.processing_unit = pu;
    }

    pub fn set_memory_t(&mut self, mem: MemoryType) {
        self.memory_t = mem;
    }

    pub fn set_linalg_t(&mut self, la: LinalgType) {
        self.linalg_t = la;
    }

    pub fn set_mpi_grid_dims(&mut self, dims: [usize; 2]) {
        self.mpi_grid_dims = dims;
    }

    pub fn set_cutoff(&mut self, cutoff: f64) {
        self.cutoff = cutoff;
    }

    pub fn set_num_bands(&mut self, n: usize) {
        self.num_bands = n;
    }

    pub fn set_bs(&mut self, bs: usize) {
        self.bs = bs;
    }

    pub fn set_num_mag_dims(&mut self, n: usize) {
        self.num_mag_dims = n;
    }

    pub fn set_beta_chunk_size(&mut self, n: usize) {
        self.beta_chunk_size = n;
    }

    pub fn set_num_beta_chunks(&mut self, n: usize) {
        self.num_beta_chunks = n;
    }

    pub fn read_file(&mut self, inpfile: &str) -> Result<(), ControlError> {
        let text = fs::read_to_string(inpfile).map_err(|source| ControlError::Io {
            path: inpfile.to_string(),
            source,
        })?;

        self.parse_str(&text)
    }

    /// `key = value` lines; `#` starts a comment. Keys not given keep their
    /// current value.
    pub fn parse_str(&mut self, text: &str) -> Result<(), ControlError> {
        for (iline, raw) in text.lines().enumerate() {
            let line = iline + 1;

            let content = match raw.find('#') {
                Some(p) => &raw[..p],
                None => raw,
            };

            if content.trim().is_empty() {
                continue;
            }

            let mut s = content.splitn(2, '=').map(|x| x.trim());

            let key = s.next().unwrap_or("");
            let value = s.next().unwrap_or("");

            if value.is_empty() {
                return Err(ControlError::MissingValue {
                    line,
                    key: key.to_string(),
                });
            }

            match key {
                "processing_unit" => self.processing_unit = parse_value(line, key, value)?,
                "memory_t" => self.memory_t = parse_value(line, key, value)?,
                "linalg_t" => self.linalg_t = parse_value(line, key, value)?,
                "mpi_grid_dims" => self.mpi_grid_dims = parse_grid_dims(line, key, value)?,
                "cutoff" => self.cutoff = parse_value(line, key, value)?,
                "gk_cutoff" => self.gk_cutoff = parse_value(line, key, value)?,
                "num_bands" => self.num_bands = parse_value(line, key, value)?,
                "bs" => self.bs = parse_value(line, key, value)?,
                "num_mag_dims" => {
                    let n: usize = parse_value(line, key, value)?;

                    if n != 0 && n != 1 && n != 3 {
                        return Err(bad_value(line, key, value, "expected 0, 1 or 3"));
                    }

                    self.num_mag_dims = n;
                }
                "beta_chunk_size" => self.beta_chunk_size = parse_value(line, key, value)?,
                "num_beta_chunks" => self.num_beta_chunks = parse_value(line, key, value)?,
                "device_memory_limit" => self.device_memory_limit = parse_value(line, key, value)?,
                _ => {
                    return Err(ControlError::UnknownKey {
                        line,
                        key: key.to_string(),
                    })
                }
            }
        }

        if self.bs == 0 {
            return Err(bad_value(0, "bs", "0", "block size must be positive"));
        }

        if self.beta_chunk_size == 0 && self.num_beta_chunks == 0 {
            return Err(bad_value(0, "beta_chunk_size", "0", "either beta_chunk_size or num_beta_chunks must be set"));
        }

        Ok(())
    }

    pub fn display(&self) {
        const OUT_WIDTH1: usize = 28;
        const OUT_WIDTH2: usize = 18;

        info!("   {:-^80}", " control parameters ");

        let dims = format!("{} {}", self.mpi_grid_dims[0], self.mpi_grid_dims[1]);

        let rows: [(&str, String); 11] = [
            ("processing_unit", self.processing_unit.to_string()),
            ("memory_t", self.memory_t.to_string()),
            ("linalg_t", self.linalg_t.to_string()),
            ("mpi_grid_dims", dims),
            ("cutoff", format!("{:.3}", self.cutoff)),
            ("gk_cutoff", format!("{:.3}", self.gk_cutoff)),
            ("num_bands", self.num_bands.to_string()),
            ("bs", self.bs.to_string()),
            ("num_mag_dims", self.num_mag_dims.to_string()),
            ("beta_chunk_size", self.beta_chunk_size.to_string()),
            ("num_beta_chunks", self.num_beta_chunks.to_string()),
        ];

        for (key, value) in rows.iter() {
            info!(
                "   {:<width1$} = {:>width2$}",
                key,
                value,
                width1 = OUT_WIDTH1,
                width2 = OUT_WIDTH2
            );
        }
    }
}

fn bad_value(line: usize, key: &str, value: &str, reason: &str) -> ControlError {
    ControlError::BadValue {
        line,
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_value<V>(line: usize, key: &str, value: &str) -> Result<V, ControlError>
where
    V: FromStr,
    V::Err: Display,
{
    value
        .parse::<V>()
        .map_err(|e| bad_value(line, key, value, &e.to_string()))
}

fn parse_grid_dims(line: usize, key: &str, value: &str) -> Result<[usize; 2], ControlError> {
    let dims: Vec<usize> = value
        .split(|c: char| c.is_whitespace() || c == ':' || c == ',')
        .filter(|x| !x.is_empty())
        .map(|x| parse_value(line, key, x))
        .collect::<Result<_, _>>()?;

    if dims.len() != 2 || dims.iter().any(|&d| d == 0) {
        return Err(bad_value(line, key, value, "expected two positive integers"));
    }

    Ok([dims[0], dims[1]])
}
