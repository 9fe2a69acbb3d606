//! Dense symmetric positive definite solves for the normal equations.
//!
//! Matrices are square and row-major, `n * n` entries.

/// Lower Cholesky factor of `a`, or `None` when `a` is not positive
/// definite.
pub fn cholesky(a: &[f64], n: usize) -> Option<Vec<f64>> {
    debug_assert_eq!(a.len(), n * n);
    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[i * n + k] * l[j * n + k];
            }
            if i == j {
                let val = a[i * n + i] - sum;
                if val <= 0.0 || !val.is_finite() {
                    return None;
                }
                l[i * n + i] = val.sqrt();
            } else {
                l[i * n + j] = (a[i * n + j] - sum) / l[j * n + j];
            }
        }
    }
    Some(l)
}

/// Solves `L L^T x = b` by forward then backward substitution.
pub fn cholesky_solve(l: &[f64], n: usize, b: &[f64]) -> Vec<f64> {
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[i * n + k] * y[k];
        }
        y[i] = sum / l[i * n + i];
    }
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in i + 1..n {
            sum -= l[k * n + i] * x[k];
        }
        x[i] = sum / l[i * n + i];
    }
    x
}

/// Diagonal of `a^-1`, column by column.
pub fn inverse_diagonal(a: &[f64], n: usize) -> Option<Vec<f64>> {
    let l = cholesky(a, n)?;
    let mut e = vec![0.0; n];
    let mut diag = Vec::with_capacity(n);
    for i in 0..n {
        e[i] = 1.0;
        diag.push(cholesky_solve(&l, n, &e)[i]);
        e[i] = 0.0;
    }
    Some(diag)
}
