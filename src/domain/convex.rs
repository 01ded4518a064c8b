//! Shared plumbing for the cvxrust-backed optimizers.
//!
//! cvxrust matrix constants take their data in column-major order, the same
//! layout nalgebra stores, so `as_slice` can be handed over directly.

use std::fmt::Debug;
use std::ops::Index;

use nalgebra::{DMatrix, DVector};

use super::error::AllocatorError;

/// Column-major copy of `m` for `constant_matrix(data, rows, cols)`.
pub fn column_major(m: &DMatrix<f64>) -> Vec<f64> {
    m.as_slice().to_vec()
}

pub fn entries(v: &DVector<f64>) -> Vec<f64> {
    v.iter().copied().collect()
}

pub fn solver_error<E: Debug>(err: E) -> AllocatorError {
    AllocatorError::solver(format!("{err:?}"))
}

/// Reject a solve that produced no finite optimal value.
pub fn ensure_optimal(value: Option<f64>) -> Result<f64, AllocatorError> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(AllocatorError::solver(format!("non-finite optimal value {v}"))),
        None => Err(AllocatorError::solver("solver returned no optimal value")),
    }
}

/// First `n` entries of a solved column variable.
pub fn leading<M>(values: &M, n: usize) -> Result<DVector<f64>, AllocatorError>
where
    M: Index<(usize, usize), Output = f64> + ?Sized,
{
    let v = DVector::from_iterator(n, (0..n).map(|i| values[(i, 0)]));
    if v.iter().all(|x| x.is_finite()) {
        Ok(v)
    } else {
        Err(AllocatorError::solver("solution contains non-finite entries"))
    }
}

/// Clip the tiny negatives an interior-point solve leaves on `w >= 0` and
/// rescale to a unit sum.
pub fn onto_simplex(w: &DVector<f64>) -> Result<DVector<f64>, AllocatorError> {
    let clipped = w.map(|x| x.max(0.0));
    let total = clipped.sum();
    if total <= f64::EPSILON {
        return Err(AllocatorError::solver("long-only solution has no positive weight"));
    }
    Ok(clipped / total)
}
