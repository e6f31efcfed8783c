use crate::Matrix;
use log::debug;
use types::Scalar;

/// Largest deviation `|A[i,j] - conj(A[j,i])|` of a square matrix.
pub fn hermitian_deviation<T: Scalar>(mat: &Matrix<T>) -> f64 {
    assert_eq!(mat.nrow(), mat.ncol(), "hermitian_deviation requires a square matrix");

    let n = mat.nrow();

    let mut diff: f64 = 0.0;

    for j in 0..n {
        for i in j..n {
            diff = diff.max((mat[[i, j]] - mat[[j, i]].conjugate()).modulus_f64());
        }
    }

    diff
}

/// Logs the deviation at debug level and reports whether it is below `tol`.
pub fn check_hermitian<T: Scalar>(label: &str, mat: &Matrix<T>, tol: f64) -> bool {
    let diff = hermitian_deviation(mat);

    debug!("{} ({}x{}) hermitian deviation {:.3e}", label, mat.nrow(), mat.ncol(), diff);

    diff <= tol
}

pub fn checksum<T: Scalar>(mat: &Matrix<T>) -> T {
    mat.sum()
}

#[test]
fn test_hermitian_deviation() {
    use types::c64;

    let mut m = Matrix::<c64>::from_row_slice(
        2,
        2,
        &[
            c64 { re: 1.0, im: 0.0 },
            c64 { re: 0.0, im: 0.01 },
            c64 { re: 0.0, im: -0.01 },
            c64 { re: 1.0, im: 0.0 },
        ],
    );

    assert!(check_hermitian("m", &m, 1e-14));

    m[[0, 1]] = c64 { re: 0.5, im: 0.01 };

    assert!((hermitian_deviation(&m) - 0.5).abs() < 1e-14);
}
