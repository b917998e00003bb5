// Absorption probabilities via the fundamental matrix
//
// For an absorbing chain with transient block Q and transient-to-sink block R,
// the absorption probabilities are B = (I - Q)^-1 R. We solve (I - Q) B = R
// directly with Gaussian elimination instead of forming the inverse.
//
// Transient vertices that cannot reach a sink are left out of the system:
// their absorption probabilities are all zero, and including them would make
// (I - Q) singular. Mass flowing from the system into such vertices is lost,
// matching the limit of the matrix power.

use super::matrix::TransitionMatrix;
use crate::error::{AttributionError, Result};
use ndarray::Array2;

/// Pivots smaller than this are treated as zero
const PIVOT_EPSILON: f64 = 1e-12;

/// Limiting matrix restricted to sink columns
///
/// Entry `(i, j)` is the probability that a walk from vertex `i` is absorbed
/// in sink `j`. Non-sink columns are zero.
pub(crate) fn absorption_matrix(span: &str, tm: &TransitionMatrix) -> Result<Array2<f64>> {
    let n = tm.len();
    let p = tm.matrix();
    let sinks = tm.sink_indices();
    let transient = tm.transient_reaching_sink();

    let mut limit = Array2::<f64>::zeros((n, n));
    for &s in &sinks {
        limit[[s, s]] = 1.0;
    }
    if transient.is_empty() {
        return Ok(limit);
    }

    // augmented system [I - Q | R]
    let t = transient.len();
    let width = t + sinks.len();
    let mut system = Array2::<f64>::zeros((t, width));
    for (row, &i) in transient.iter().enumerate() {
        for (col, &j) in transient.iter().enumerate() {
            let identity = if row == col { 1.0 } else { 0.0 };
            system[[row, col]] = identity - p[[i, j]];
        }
        for (col, &s) in sinks.iter().enumerate() {
            system[[row, t + col]] = p[[i, s]];
        }
    }

    gauss_jordan(&mut system, t).map_err(|pivot| AttributionError::SingularSystem {
        span: span.to_string(),
        vertex: tm.vertices()[transient[pivot]].clone(),
    })?;

    for (row, &i) in transient.iter().enumerate() {
        for (col, &s) in sinks.iter().enumerate() {
            limit[[i, s]] = system[[row, t + col]];
        }
    }
    Ok(limit)
}

/// Reduce the left `t x t` block of `system` to the identity in place
///
/// On failure returns the column whose pivot vanished.
fn gauss_jordan(system: &mut Array2<f64>, t: usize) -> std::result::Result<(), usize> {
    let width = system.ncols();

    for col in 0..t {
        // partial pivoting
        let pivot_row = (col..t)
            .max_by(|&a, &b| system[[a, col]].abs().total_cmp(&system[[b, col]].abs()))
            .unwrap_or(col);
        if system[[pivot_row, col]].abs() < PIVOT_EPSILON {
            return Err(col);
        }
        if pivot_row != col {
            for k in 0..width {
                system.swap([col, k], [pivot_row, k]);
            }
        }

        let pivot = system[[col, col]];
        for k in col..width {
            system[[col, k]] /= pivot;
        }

        for row in 0..t {
            if row == col {
                continue;
            }
            let factor = system[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..width {
                system[[row, k]] -= factor * system[[col, k]];
            }
        }
    }
    Ok(())
}
