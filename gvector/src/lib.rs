use dwmpi::Communicator;
use itertools::multizip;
use log::{info, warn};
use nalgebra::{Matrix3, Vector3};
use std::cmp::Ordering;
use thiserror::Error;

mod partition;
pub use partition::*;

#[derive(Debug, Error)]
pub enum GvecError {
    #[error("cutoff {0} must be positive")]
    InvalidCutoff(f64),

    #[error("reciprocal lattice is singular")]
    SingularLattice,

    #[error("rank {rank} enumerated {found} G-vectors, rank 0 enumerated {expected}")]
    CountMismatch {
        rank: usize,
        found: usize,
        expected: usize,
    },

    #[error("local G-vector counts sum to {sum}, global count is {num_gvec}")]
    PartitionMismatch { sum: usize, num_gvec: usize },

    #[error("G+k cutoff {gk_cutoff} is too large for plane-wave cutoff {pw_cutoff}")]
    GkCutoff { gk_cutoff: f64, pw_cutoff: f64 },
}

/// G+k vectors with |G+k| <= cutoff, ordered by length, then by Miller
/// index. The order only depends on the arguments, so every rank builds the
/// same set.
#[derive(Debug, Clone)]
pub struct GVector {
    miller: Vec<[i32; 3]>,
    cart: Vec<[f64; 3]>,
    length: Vec<f64>,
    vk: [f64; 3],
    cutoff: f64,
}

impl GVector {
    /// `reciprocal[i]` is the i-th reciprocal lattice vector in Cartesian
    /// coordinates, `vk` the k-point in fractional coordinates.
    pub fn new(
        reciprocal: &[[f64; 3]; 3],
        vk: [f64; 3],
        cutoff: f64,
        comm: &dyn Communicator,
    ) -> Result<GVector, GvecError> {
        if !(cutoff > 0.0) {
            return Err(GvecError::InvalidCutoff(cutoff));
        }

        let b = Matrix3::from_columns(&[
            Vector3::from(reciprocal[0]),
            Vector3::from(reciprocal[1]),
            Vector3::from(reciprocal[2]),
        ]);

        let binv = b.try_inverse().ok_or(GvecError::SingularLattice)?;

        // |m_i + k_i| <= |row_i(B^-1)| * |G+k|
        let mut bound = [0i32; 3];

        for i in 0..3 {
            let r = binv.row(i).norm() * cutoff + vk[i].abs();
            bound[i] = r.ceil() as i32;
        }

        let mut gv: Vec<([i32; 3], [f64; 3], f64)> = Vec::new();

        for i in -bound[0]..=bound[0] {
            for j in -bound[1]..=bound[1] {
                for k in -bound[2]..=bound[2] {
                    let f = Vector3::new(i as f64 + vk[0], j as f64 + vk[1], k as f64 + vk[2]);

                    let c = b * f;
                    let len = c.norm();

                    if len <= cutoff {
                        gv.push(([i, j, k], [c.x, c.y, c.z], len));
                    }
                }
            }
        }

        gv.sort_by(|x, y| match x.2.partial_cmp(&y.2) {
            Some(Ordering::Equal) | None => x.0.cmp(&y.0),
            Some(o) => o,
        });

        let gvec = GVector {
            miller: gv.iter().map(|x| x.0).collect(),
            cart: gv.iter().map(|x| x.1).collect(),
            length: gv.iter().map(|x| x.2).collect(),
            vk,
            cutoff,
        };

        let counts = dwmpi::allgather(comm, &[gvec.num_gvec() as u64]);

        for (rank, &n) in counts.iter().enumerate() {
            if n != counts[0] {
                return Err(GvecError::CountMismatch {
                    rank,
                    found: n as usize,
                    expected: counts[0] as usize,
                });
            }
        }

        if comm.is_root() {
            info!("G+k vectors: {} within cutoff {:.3}", gvec.num_gvec(), cutoff);
        }

        Ok(gvec)
    }

    pub fn num_gvec(&self) -> usize {
        self.miller.len()
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn vk(&self) -> [f64; 3] {
        self.vk
    }

    pub fn miller(&self, ig: usize) -> [i32; 3] {
        self.miller[ig]
    }

    /// Cartesian G+k.
    pub fn cart(&self, ig: usize) -> [f64; 3] {
        self.cart[ig]
    }

    /// Fractional G+k.
    pub fn frac(&self, ig: usize) -> [f64; 3] {
        let m = self.miller[ig];

        [
            m[0] as f64 + self.vk[0],
            m[1] as f64 + self.vk[1],
            m[2] as f64 + self.vk[2],
        ]
    }

    pub fn length(&self, ig: usize) -> f64 {
        self.length[ig]
    }

    /// Number of shells of equal length (within `tol`).
    pub fn num_shells(&self, tol: f64) -> usize {
        if self.length.is_empty() {
            return 0;
        }

        1 + multizip((self.length.iter(), self.length.iter().skip(1)))
            .filter(|(a, b)| **b - **a > tol)
            .count()
    }
}

/// The wave-function basis must fit twice into the plane-wave cutoff.
pub fn check_gk_cutoff(gk_cutoff: f64, pw_cutoff: f64) -> Result<(), GvecError> {
    if gk_cutoff * 2.0 > pw_cutoff {
        return Err(GvecError::GkCutoff { gk_cutoff, pw_cutoff });
    }

    Ok(())
}

/// Warns when `gk_cutoff * mt_radius` exceeds `lmax` and returns the
/// suggested minimum lmax in that case.
pub fn suggest_lmax(gk_cutoff: f64, mt_radius: f64, lmax: usize) -> Option<usize> {
    if gk_cutoff * mt_radius > lmax as f64 {
        let suggested = (gk_cutoff * mt_radius) as usize + 1;

        warn!(
            "G+k cutoff ({}) is too large for lmax ({}) and maximum MT radius ({}); suggested minimum lmax: {}",
            gk_cutoff, lmax, mt_radius, suggested
        );

        return Some(suggested);
    }

    None
}

#[cfg(test)]
mod tests;
