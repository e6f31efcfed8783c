use dwmpi::Communicator;
use gvector::GvecPartition;
use log::debug;
use memory::{DualArray, MemoryError, MemoryPool, MemoryType, ProcessingUnit};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;
use types::{c64, Scalar};

mod mt;
pub use mt::*;

mod spin;
pub use spin::*;

/// Plane-wave and, optionally, muffin-tin coefficients of `num_wf` bands for
/// `num_sc` spin components. Rows are distributed: every rank owns the
/// coefficients of its local G-vectors and of its local atoms.
pub struct WaveFunctions<T: Scalar> {
    gvp: Arc<GvecPartition>,
    mt: Option<MtBasis>,
    num_wf: usize,
    num_sc: usize,
    pw: Vec<DualArray<T>>,
    mt_coeffs: Vec<DualArray<T>>,
}

impl<T: Scalar> WaveFunctions<T> {
    /// Host buffers are allocated and zeroed.
    pub fn new(gvp: Arc<GvecPartition>, mt: Option<MtBasis>, num_wf: usize, num_sc: usize) -> WaveFunctions<T> {
        assert!(num_sc == 1 || num_sc == 2, "WaveFunctions: {} spin components", num_sc);

        if let Some(basis) = mt.as_ref() {
            let comm = gvp.comm();

            assert!(
                basis.rank() == comm.rank() && basis.num_ranks() == comm.size(),
                "WaveFunctions::new: muffin-tin basis split for rank {} of {}, G-vector communicator is rank {} of {}",
                basis.rank(),
                basis.num_ranks(),
                comm.rank(),
                comm.size()
            );
        }

        let ngk = gvp.count();

        let pw = (0..num_sc).map(|_| DualArray::new(ngk, num_wf)).collect();

        let mt_coeffs = match mt.as_ref() {
            Some(basis) => (0..num_sc).map(|_| DualArray::new(basis.num_local_rows(), num_wf)).collect(),
            None => Vec::new(),
        };

        WaveFunctions {
            gvp,
            mt,
            num_wf,
            num_sc,
            pw,
            mt_coeffs,
        }
    }

    pub fn gvp(&self) -> &GvecPartition {
        &self.gvp
    }

    pub fn comm(&self) -> &dyn Communicator {
        self.gvp.comm()
    }

    pub fn num_wf(&self) -> usize {
        self.num_wf
    }

    pub fn num_sc(&self) -> usize {
        self.num_sc
    }

    pub fn has_mt(&self) -> bool {
        self.mt.is_some()
    }

    pub fn mt_basis(&self) -> Option<&MtBasis> {
        self.mt.as_ref()
    }

    /// Local number of plane-wave rows.
    pub fn num_pw_loc(&self) -> usize {
        self.gvp.count()
    }

    pub fn num_mt_loc(&self) -> usize {
        self.mt.as_ref().map_or(0, |m| m.num_local_rows())
    }

    fn check_spins(&self, spins: SpinRange, op: &str) {
        assert!(
            spins.last() < self.num_sc,
            "WaveFunctions::{}: spins {}..={} with {} component(s)",
            op,
            spins.first(),
            spins.last(),
            self.num_sc
        );
    }

    fn check_bands(&self, i0: usize, n: usize, op: &str) {
        assert!(
            i0 + n <= self.num_wf,
            "WaveFunctions::{}: bands {}..{} outside {}",
            op,
            i0,
            i0 + n,
            self.num_wf
        );
    }

    pub fn pw_coeffs(&self, ispn: usize) -> &DualArray<T> {
        &self.pw[ispn]
    }

    pub fn pw_coeffs_mut(&mut self, ispn: usize) -> &mut DualArray<T> {
        &mut self.pw[ispn]
    }

    pub fn mt_coeffs(&self, ispn: usize) -> &DualArray<T> {
        assert!(self.has_mt(), "WaveFunctions::mt_coeffs: no muffin-tin part");

        &self.mt_coeffs[ispn]
    }

    pub fn mt_coeffs_mut(&mut self, ispn: usize) -> &mut DualArray<T> {
        assert!(self.has_mt(), "WaveFunctions::mt_coeffs_mut: no muffin-tin part");

        &mut self.mt_coeffs[ispn]
    }

    /// Borrows device memory from `pool` for every selected component.
    pub fn allocate(&mut self, spins: SpinRange, mem: MemoryType, pool: &Arc<MemoryPool>) -> Result<(), MemoryError> {
        self.check_spins(spins, "allocate");

        for ispn in spins.iter() {
            self.pw[ispn].allocate(mem, pool)?;

            if let Some(a) = self.mt_coeffs.get_mut(ispn) {
                a.allocate(mem, pool)?;
            }
        }

        Ok(())
    }

    pub fn deallocate(&mut self, spins: SpinRange, mem: MemoryType) {
        self.check_spins(spins, "deallocate");

        for ispn in spins.iter() {
            self.pw[ispn].deallocate(mem);

            if let Some(a) = self.mt_coeffs.get_mut(ispn) {
                a.deallocate(mem);
            }
        }
    }

    /// Copies bands `i0..i0+n` into residency `mem`.
    pub fn copy_to(&mut self, spins: SpinRange, mem: MemoryType, i0: usize, n: usize) {
        self.check_spins(spins, "copy_to");
        self.check_bands(i0, n, "copy_to");

        for ispn in spins.iter() {
            self.pw[ispn].copy_cols_to(mem, i0, n);

            if let Some(a) = self.mt_coeffs.get_mut(ispn) {
                a.copy_cols_to(mem, i0, n);
            }
        }
    }

    /// Zeroes bands `i0..i0+n` in the memory of `pu`.
    pub fn zero(&mut self, pu: ProcessingUnit, spins: SpinRange, i0: usize, n: usize) {
        self.check_spins(spins, "zero");
        self.check_bands(i0, n, "zero");

        let mem = pu.memory_t();

        for ispn in spins.iter() {
            zero_cols(&mut self.pw[ispn], mem, i0, n);

            if let Some(a) = self.mt_coeffs.get_mut(ispn) {
                zero_cols(a, mem, i0, n);
            }
        }
    }

    pub fn checksum_pw(&self, pu: ProcessingUnit, spins: SpinRange, i0: usize, n: usize) -> c64 {
        self.check_spins(spins, "checksum_pw");
        self.check_bands(i0, n, "checksum_pw");

        let mut cs = c64::new(0.0, 0.0);

        for ispn in spins.iter() {
            cs += sum_cols(&self.pw[ispn], pu.memory_t(), i0, n);
        }

        let cs = dwmpi::sum_scalar(self.comm(), cs);

        debug!("checksum_pw(spins {:?}, bands {}..{}) = {}", spins, i0, i0 + n, cs);

        cs
    }

    pub fn checksum_mt(&self, pu: ProcessingUnit, spins: SpinRange, i0: usize, n: usize) -> c64 {
        self.check_spins(spins, "checksum_mt");
        self.check_bands(i0, n, "checksum_mt");

        let mut cs = c64::new(0.0, 0.0);

        for ispn in spins.iter() {
            if let Some(a) = self.mt_coeffs.get(ispn) {
                cs += sum_cols(a, pu.memory_t(), i0, n);
            }
        }

        let cs = dwmpi::sum_scalar(self.comm(), cs);

        debug!("checksum_mt(spins {:?}, bands {}..{}) = {}", spins, i0, i0 + n, cs);

        cs
    }

    pub fn checksum(&self, pu: ProcessingUnit, spins: SpinRange, i0: usize, n: usize) -> c64 {
        self.checksum_pw(pu, spins, i0, n) + self.checksum_mt(pu, spins, i0, n)
    }

    /// Host copy of bands `i0..i0+n` of `src` into bands `j0..j0+n` of self,
    /// spin component `ispn`.
    pub fn copy_from(&mut self, src: &WaveFunctions<T>, ispn: usize, i0: usize, n: usize, j0: usize) {
        src.check_bands(i0, n, "copy_from");
        self.check_bands(j0, n, "copy_from");

        assert_eq!(
            src.num_pw_loc(),
            self.num_pw_loc(),
            "WaveFunctions::copy_from: local G-vector counts differ"
        );
        assert_eq!(
            src.num_mt_loc(),
            self.num_mt_loc(),
            "WaveFunctions::copy_from: local muffin-tin counts differ"
        );

        copy_cols(&src.pw[ispn], i0, &mut self.pw[ispn], j0, n);

        if let (Some(s), Some(d)) = (src.mt_coeffs.get(ispn), self.mt_coeffs.get_mut(ispn)) {
            copy_cols(s, i0, d, j0, n);
        }
    }

    /// Host fill of bands `i0..i0+n` with uniform values in [-0.5, 0.5).
    /// A coefficient depends on its global row only, not on the number of
    /// ranks.
    pub fn fill_random(&mut self, seed: u64, spins: SpinRange, i0: usize, n: usize) {
        self.check_spins(spins, "fill_random");
        self.check_bands(i0, n, "fill_random");

        let pw_rows = self.gvp.range();

        let mt_rows = self.mt.as_ref().map(|m| m.local_rows());

        for ispn in spins.iter() {
            for j in i0..i0 + n {
                let stream = (ispn * self.num_wf + j) as u64;

                fill_col(&mut self.pw[ispn], j, pw_rows.start, seed, 2 * stream);

                if let (Some(rows), Some(a)) = (mt_rows.as_ref(), self.mt_coeffs.get_mut(ispn)) {
                    fill_col(a, j, rows.start, seed, 2 * stream + 1);
                }
            }
        }
    }
}

fn zero_cols<T: Scalar>(a: &mut DualArray<T>, mem: MemoryType, i0: usize, n: usize) {
    let nrow = a.nrow();

    a.at_mut(mem)[i0 * nrow..(i0 + n) * nrow]
        .iter_mut()
        .for_each(|x| *x = T::zero());
}

fn sum_cols<T: Scalar>(a: &DualArray<T>, mem: MemoryType, i0: usize, n: usize) -> c64 {
    let nrow = a.nrow();

    a.at(mem)[i0 * nrow..(i0 + n) * nrow]
        .iter()
        .fold(c64::new(0.0, 0.0), |acc, &x| acc + x.to_c64())
}

fn copy_cols<T: Scalar>(src: &DualArray<T>, i0: usize, dst: &mut DualArray<T>, j0: usize, n: usize) {
    let nrow = src.nrow();

    dst.at_mut(MemoryType::Host)[j0 * nrow..(j0 + n) * nrow]
        .copy_from_slice(&src.at(MemoryType::Host)[i0 * nrow..(i0 + n) * nrow]);
}

// rows per generator; a rank skips at most this many draws per column
const FILL_BLOCK: usize = 64;

fn fill_rng(seed: u64, stream: u64, block: usize) -> StdRng {
    let key = stream
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add((block as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9));

    StdRng::seed_from_u64(seed ^ key)
}

fn fill_col<T: Scalar>(a: &mut DualArray<T>, j: usize, row0: usize, seed: u64, stream: u64) {
    let mut rng = fill_rng(seed, stream, row0 / FILL_BLOCK);

    for _ in 0..row0 % FILL_BLOCK {
        let _: (f64, f64) = (rng.gen(), rng.gen());
    }

    for (il, x) in a.col_mut(MemoryType::Host, j).iter_mut().enumerate() {
        let row = row0 + il;

        if il > 0 && row % FILL_BLOCK == 0 {
            rng = fill_rng(seed, stream, row / FILL_BLOCK);
        }

        let re: f64 = rng.gen();
        let im: f64 = rng.gen();

        *x = if T::IS_COMPLEX {
            T::from_parts(re - 0.5, im - 0.5)
        } else {
            T::from_re(re - 0.5)
        };
    }
}

#[cfg(test)]
mod tests;
