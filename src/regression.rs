//! Least-squares fitting shared by the elasticity and forecast models.

use ndarray::{Array1, Array2};

/// Ordinary least squares of `y` on a single predictor plus intercept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleOls {
    pub intercept: f64,
    pub slope: f64,
}

/// Fit `y = intercept + slope * x`. Returns `None` when the predictor is
/// degenerate (zero variance) or the inputs produce non-finite coefficients.
pub fn fit_simple(x: &[f64], y: &[f64]) -> Option<SimpleOls> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let n = x.len() as f64;
    let x_mean = x.iter().sum::<f64>() / n;
    let y_mean = y.iter().sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        sxx += (xi - x_mean) * (xi - x_mean);
        sxy += (xi - x_mean) * (yi - y_mean);
    }
    if sxx <= 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    if slope.is_finite() && intercept.is_finite() {
        Some(SimpleOls { intercept, slope })
    } else {
        None
    }
}

/// Multi-feature least squares via the normal equations, with a small ridge
/// term so near-collinear seasonal designs stay solvable.
///
/// Returns `None` if the system is singular or yields non-finite
/// coefficients.
pub fn least_squares(x: &Array2<f64>, y: &Array1<f64>) -> Option<Array1<f64>> {
    let p = x.ncols();
    if x.nrows() != y.len() || x.nrows() < p {
        return None;
    }
    let xt = x.t();
    let mut a = xt.dot(x);
    let b = xt.dot(y);
    for i in 0..p {
        a[[i, i]] += 1e-8;
    }
    let beta = solve(a, b)?;
    if beta.iter().all(|c| c.is_finite()) {
        Some(beta)
    } else {
        None
    }
}

/// Gaussian elimination with partial pivoting on a small dense system.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| {
            a[[i, col]]
                .abs()
                .partial_cmp(&a[[j, col]].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[[pivot, col]].abs() < 1e-12 {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([pivot, k], [col, k]);
            }
            b.swap(pivot, col);
        }
        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in (row + 1)..n {
            sum -= a[[row, k]] * x[k];
        }
        x[row] = sum / a[[row, row]];
    }
    Some(x)
}
