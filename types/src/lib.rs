#![allow(non_camel_case_types)]

use bytemuck::Pod;
use nalgebra::ComplexField;
use std::fmt::Debug;

pub use num_complex::Complex;

pub type c64 = Complex<f64>;
pub type c32 = Complex<f32>;

/// Element type of wave functions, dense and distributed matrices.
///
/// `ComplexField` brings the field arithmetic, conjugation and the nalgebra
/// factorisations; `Pod` lets buffers travel through a communicator as bytes.
pub trait Scalar: ComplexField + Copy + Default + Pod + Send + Sync + Debug + 'static {
    const IS_COMPLEX: bool;

    /// Machine epsilon of the underlying real type.
    const EPSILON: f64;

    fn from_re(re: f64) -> Self;

    /// Real types only accept a vanishing imaginary part (checked in debug
    /// builds).
    fn from_parts(re: f64, im: f64) -> Self;

    fn to_c64(self) -> c64;

    fn modulus_f64(self) -> f64 {
        self.to_c64().norm()
    }
}

#[inline]
fn check_real_parts(re: f64, im: f64) {
    debug_assert!(
        im.abs() <= 1e-12 * re.abs().max(1.0),
        "real scalar from {} + {}i would drop the imaginary part",
        re,
        im
    );
}

impl Scalar for f64 {
    const IS_COMPLEX: bool = false;
    const EPSILON: f64 = f64::EPSILON;

    fn from_re(re: f64) -> Self {
        re
    }

    fn from_parts(re: f64, im: f64) -> Self {
        check_real_parts(re, im);
        re
    }

    fn to_c64(self) -> c64 {
        c64::new(self, 0.0)
    }
}

impl Scalar for f32 {
    const IS_COMPLEX: bool = false;
    const EPSILON: f64 = f32::EPSILON as f64;

    fn from_re(re: f64) -> Self {
        re as f32
    }

    fn from_parts(re: f64, im: f64) -> Self {
        check_real_parts(re, im);
        re as f32
    }

    fn to_c64(self) -> c64 {
        c64::new(self as f64, 0.0)
    }
}

impl Scalar for c64 {
    const IS_COMPLEX: bool = true;
    const EPSILON: f64 = f64::EPSILON;

    fn from_re(re: f64) -> Self {
        c64::new(re, 0.0)
    }

    fn from_parts(re: f64, im: f64) -> Self {
        c64::new(re, im)
    }

    fn to_c64(self) -> c64 {
        self
    }
}

impl Scalar for c32 {
    const IS_COMPLEX: bool = true;
    const EPSILON: f64 = f32::EPSILON as f64;

    fn from_re(re: f64) -> Self {
        c32::new(re as f32, 0.0)
    }

    fn from_parts(re: f64, im: f64) -> Self {
        c32::new(re as f32, im as f32)
    }

    fn to_c64(self) -> c64 {
        c64::new(self.re as f64, self.im as f64)
    }
}
