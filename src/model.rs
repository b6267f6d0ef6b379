//! Transition and emission probability models.
//!
//! Both models are stacks of `n_classes x n_classes` row-stochastic matrices
//! with a single value on the diagonal and the remaining mass spread evenly
//! over the off-diagonal entries. They are built once per run and shared,
//! read-only, by every per-sample inference.

use log::{debug, warn};
use ndarray::{s, Array2, Array3};

use crate::error::AncestryError;

/// Conversion from centiMorgans to Morgans.
pub const CM_TO_MORGANS: f64 = 0.01;

/// Probability that no ancestry switch occurs across `delta_cm` centiMorgans
/// after `n_gens` generations of recombination: `exp(-delta_cm / 100 * n_gens)`.
///
/// The result is clipped to `(0, 1]`. Fails with [`AncestryError::Numeric`]
/// if the exponent is not finite.
pub fn retention_probability(delta_cm: f64, n_gens: f64) -> Result<f64, AncestryError> {
    let exponent = -delta_cm * CM_TO_MORGANS * n_gens;
    let e = exponent.exp();
    if !exponent.is_finite() || e.is_nan() {
        return Err(AncestryError::Numeric(format!(
            "non-finite retention probability for distance {} cM and {} generations",
            delta_cm, n_gens
        )));
    }
    Ok(e.clamp(f64::MIN_POSITIVE, 1.0))
}

/// A matrix with `diag` on the diagonal and `(1 - diag) / (n_classes - 1)`
/// everywhere else.
fn symmetric_channel(diag: f64, n_classes: usize) -> Array2<f64> {
    let off = (1.0 - diag) / (n_classes - 1) as f64;
    let mut m = Array2::from_elem((n_classes, n_classes), off);
    m.diag_mut().fill(diag);
    m
}

fn check_n_classes(n_classes: usize) -> Result<(), AncestryError> {
    if n_classes < 2 {
        return Err(AncestryError::Configuration(format!(
            "number of classes must be at least 2, got {}",
            n_classes
        )));
    }
    Ok(())
}

/// Builds per-boundary state transition matrices from window genetic positions.
#[derive(Debug, Clone)]
pub struct TransitionModelBuilder {
    pub n_gens: f64,
    pub n_classes: usize,
}

impl TransitionModelBuilder {
    pub fn new(n_gens: f64, n_classes: usize) -> Result<Self, AncestryError> {
        check_n_classes(n_classes)?;
        if !(n_gens.is_finite() && n_gens > 0.0) {
            return Err(AncestryError::Configuration(format!(
                "generations since admixture must be a positive number, got {}",
                n_gens
            )));
        }
        Ok(Self { n_gens, n_classes })
    }

    /// Build the `W - 1` transition matrices for `W` window positions (cM).
    ///
    /// Matrix `t` holds P(state at window `t + 1` | state at window `t`). The
    /// returned array has shape `(W - 1, n_classes, n_classes)`; it is empty
    /// for a single window.
    pub fn build(&self, window_pos: &[f64]) -> Result<Array3<f64>, AncestryError> {
        let n_boundaries = window_pos.len().saturating_sub(1);
        let k = self.n_classes;
        let mut matrices = Array3::<f64>::zeros((n_boundaries, k, k));

        for (t, pair) in window_pos.windows(2).enumerate() {
            let delta = pair[1] - pair[0];
            if delta < 0.0 {
                warn!(
                    "window {} lies {:.6} cM before window {}; clipping retention to 1",
                    t + 1,
                    -delta,
                    t
                );
            }
            let e = retention_probability(delta, self.n_gens).map_err(|e| {
                AncestryError::Numeric(format!("window boundary {}: {}", t, e))
            })?;
            matrices
                .slice_mut(s![t, .., ..])
                .assign(&symmetric_channel(e, k));
        }
        debug!(
            "built {} transition matrices ({} classes, {} generations)",
            n_boundaries, k, self.n_gens
        );
        Ok(matrices)
    }
}

/// Builds per-window emission (classifier confusion) matrices.
#[derive(Debug, Clone)]
pub struct EmissionModelBuilder {
    pub n_classes: usize,
}

impl EmissionModelBuilder {
    pub fn new(n_classes: usize) -> Result<Self, AncestryError> {
        check_n_classes(n_classes)?;
        Ok(Self { n_classes })
    }

    /// Build one emission matrix per window from the classifier success rates.
    ///
    /// Entry `[t, s, o]` is P(raw call `o` | true state `s`) at window `t`.
    pub fn build(&self, success_rate: &[f64]) -> Result<Array3<f64>, AncestryError> {
        let k = self.n_classes;
        let mut matrices = Array3::<f64>::zeros((success_rate.len(), k, k));
        for (t, &rate) in success_rate.iter().enumerate() {
            if !(rate.is_finite() && (0.0..=1.0).contains(&rate)) {
                return Err(AncestryError::Data(format!(
                    "success rate {} at window {} is outside [0, 1]",
                    rate, t
                )));
            }
            matrices
                .slice_mut(s![t, .., ..])
                .assign(&symmetric_channel(rate, k));
        }
        debug!("built {} emission matrices ({} classes)", success_rate.len(), k);
        Ok(matrices)
    }
}
