// Absorption probabilities via repeated squaring of the transition matrix
//
// P^(2^k) converges to the limiting matrix of an absorbing chain at a rate set
// by the spectral gap of the transient block. The exponent is a tuning knob,
// so it is taken from configuration rather than fixed here.

use super::matrix::TransitionMatrix;
use ndarray::Array2;

/// Raise the transition matrix to `2^squarings` and keep the sink columns
pub(crate) fn absorption_matrix(tm: &TransitionMatrix, squarings: u32) -> Array2<f64> {
    let mut power = tm.matrix().clone();
    for _ in 0..squarings {
        power = power.dot(&power);
    }

    for j in 0..tm.len() {
        if !tm.is_sink(j) {
            power.column_mut(j).fill(0.0);
        }
    }
    power
}
