//! Forward-backward smoothing of one sample's window calls.
//!
//! The hidden state at each window is the true ancestry and the observation
//! is the raw classifier call. Forward and backward messages are rescaled to
//! sum to one at every window, so sequences of any length stay clear of
//! underflow; the log of the forward scale factors gives the log-likelihood.

use ndarray::{s, Array1, Array2, Array3, ArrayView1, ArrayView3};

use crate::error::AncestryError;
use crate::numeric::{argmax, first_invalid_row, normalize_in_place, ROW_SUM_TOLERANCE};

/// The result of smoothing one observation sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    /// `W x n_classes` posterior state probabilities; every row sums to one.
    pub posteriors: Array2<f64>,
    /// The most probable state at each window (ties go to the lowest state).
    pub calls: Vec<usize>,
    /// Log-likelihood of the observation sequence under the model.
    pub log_likelihood: f64,
}

/// A validated discrete HMM over `W` windows with time-varying matrices.
#[derive(Debug, Clone)]
pub struct HmmEngine {
    /// `(W - 1, K, K)`: entry `[t, i, j]` = P(state `j` at `t + 1` | state `i` at `t`).
    transitions: Array3<f64>,
    /// `(W, K, K)`: entry `[t, i, o]` = P(call `o` at `t` | state `i`).
    emissions: Array3<f64>,
    /// Belief over states at the first window, before its call is seen.
    initial: Array1<f64>,
}

fn check_stack(
    name: &str,
    stack: ArrayView3<f64>,
    n_classes: usize,
) -> Result<(), AncestryError> {
    let (_, rows, cols) = stack.dim();
    if rows != n_classes || cols != n_classes {
        return Err(AncestryError::Configuration(format!(
            "{} matrices are {}x{}, expected {}x{}",
            name, rows, cols, n_classes, n_classes
        )));
    }
    for (t, matrix) in stack.outer_iter().enumerate() {
        if let Some(row) = first_invalid_row(matrix, ROW_SUM_TOLERANCE) {
            return Err(AncestryError::Numeric(format!(
                "{} matrix {} row {} is not a probability distribution",
                name, t, row
            )));
        }
    }
    Ok(())
}

impl HmmEngine {
    /// Create an engine, checking that all matrices agree in shape and that
    /// every row of every matrix (and the initial belief) sums to one.
    pub fn new(
        transitions: Array3<f64>,
        emissions: Array3<f64>,
        initial: Array1<f64>,
    ) -> Result<Self, AncestryError> {
        let (n_windows, n_classes, _) = emissions.dim();
        if n_windows == 0 {
            return Err(AncestryError::Configuration(
                "model has no windows".to_string(),
            ));
        }
        if n_classes < 2 {
            return Err(AncestryError::Configuration(format!(
                "number of classes must be at least 2, got {}",
                n_classes
            )));
        }
        if transitions.dim().0 != n_windows - 1 {
            return Err(AncestryError::Configuration(format!(
                "{} transition matrices given for {} windows (expected {})",
                transitions.dim().0,
                n_windows,
                n_windows - 1
            )));
        }
        check_stack("emission", emissions.view(), n_classes)?;
        check_stack("transition", transitions.view(), n_classes)?;

        if initial.len() != n_classes {
            return Err(AncestryError::Configuration(format!(
                "initial belief has {} states, expected {}",
                initial.len(),
                n_classes
            )));
        }
        if first_invalid_row(initial.view().insert_axis(ndarray::Axis(0)), ROW_SUM_TOLERANCE)
            .is_some()
        {
            return Err(AncestryError::Numeric(
                "initial belief is not a probability distribution".to_string(),
            ));
        }

        Ok(Self {
            transitions,
            emissions,
            initial,
        })
    }

    /// Number of windows, `W`.
    pub fn n_windows(&self) -> usize {
        self.emissions.dim().0
    }

    /// Number of ancestry states.
    pub fn n_classes(&self) -> usize {
        self.emissions.dim().1
    }

    fn check_observations(&self, observations: &[usize]) -> Result<(), AncestryError> {
        if observations.len() != self.n_windows() {
            return Err(AncestryError::Data(format!(
                "observation sequence has {} windows, model has {}",
                observations.len(),
                self.n_windows()
            )));
        }
        if let Some((t, &o)) = observations
            .iter()
            .enumerate()
            .find(|&(_, &o)| o >= self.n_classes())
        {
            return Err(AncestryError::Data(format!(
                "call {} at window {} is outside [0, {})",
                o,
                t,
                self.n_classes()
            )));
        }
        Ok(())
    }

    /// Column of the emission matrix at window `t` for call `o`.
    fn emission(&self, t: usize, o: usize) -> ArrayView1<f64> {
        self.emissions.slice(s![t, .., o])
    }

    /// Scaled forward messages and the log of each window's scale factor.
    fn forward(&self, observations: &[usize]) -> Result<(Array2<f64>, f64), AncestryError> {
        let (w, k) = (self.n_windows(), self.n_classes());
        let mut alpha = Array2::<f64>::zeros((w, k));
        let mut log_likelihood = 0.0;

        for (t, &o) in observations.iter().enumerate() {
            let mut message = if t == 0 {
                &self.initial * &self.emission(0, o)
            } else {
                let predicted = alpha
                    .row(t - 1)
                    .dot(&self.transitions.slice(s![t - 1, .., ..]));
                predicted * &self.emission(t, o)
            };
            let scale = message
                .as_slice_mut()
                .and_then(normalize_in_place)
                .ok_or_else(|| {
                    AncestryError::Numeric(format!(
                        "forward probabilities vanish at window {} (call {})",
                        t, o
                    ))
                })?;
            log_likelihood += scale.ln();
            alpha.row_mut(t).assign(&message);
        }
        Ok((alpha, log_likelihood))
    }

    /// Scaled backward messages.
    fn backward(&self, observations: &[usize]) -> Result<Array2<f64>, AncestryError> {
        let (w, k) = (self.n_windows(), self.n_classes());
        let mut beta = Array2::<f64>::zeros((w, k));
        beta.row_mut(w - 1).fill(1.0 / k as f64);

        for t in (0..w - 1).rev() {
            let weighted = &self.emission(t + 1, observations[t + 1]) * &beta.row(t + 1);
            let mut message = self.transitions.slice(s![t, .., ..]).dot(&weighted);
            message
                .as_slice_mut()
                .and_then(normalize_in_place)
                .ok_or_else(|| {
                    AncestryError::Numeric(format!("backward probabilities vanish at window {}", t))
                })?;
            beta.row_mut(t).assign(&message);
        }
        Ok(beta)
    }

    /// Run forward-backward on one sample's raw calls.
    pub fn infer(&self, observations: &[usize]) -> Result<Inference, AncestryError> {
        self.check_observations(observations)?;
        let (alpha, log_likelihood) = self.forward(observations)?;
        let beta = self.backward(observations)?;

        let mut posteriors = alpha * beta;
        let mut calls = Vec::with_capacity(observations.len());
        for (t, mut row) in posteriors.outer_iter_mut().enumerate() {
            row.as_slice_mut()
                .and_then(normalize_in_place)
                .ok_or_else(|| {
                    AncestryError::Numeric(format!("posterior probabilities vanish at window {}", t))
                })?;
            let call = argmax(row.view()).ok_or_else(|| {
                AncestryError::Numeric(format!("no posterior state at window {}", t))
            })?;
            calls.push(call);
        }

        Ok(Inference {
            posteriors,
            calls,
            log_likelihood,
        })
    }

    /// Log-likelihood of one sample's raw calls, without the backward pass.
    pub fn log_likelihood(&self, observations: &[usize]) -> Result<f64, AncestryError> {
        self.check_observations(observations)?;
        Ok(self.forward(observations)?.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EmissionModelBuilder, TransitionModelBuilder};
    use crate::numeric::{assert_float_eq, assert_floats_eq};
    use ndarray::{array, Array};

    fn uniform(k: usize) -> Array1<f64> {
        Array1::from_elem(k, 1.0 / k as f64)
    }

    fn engine(window_pos: &[f64], success: &[f64], n_gens: f64, k: usize) -> HmmEngine {
        let a = TransitionModelBuilder::new(n_gens, k)
            .unwrap()
            .build(window_pos)
            .unwrap();
        let b = EmissionModelBuilder::new(k).unwrap().build(success).unwrap();
        HmmEngine::new(a, b, uniform(k)).unwrap()
    }

    #[test]
    fn test_identity_model() {
        let a: Array3<f64> = Array::eye(3).insert_axis(ndarray::Axis(0));
        let b = Array3::from_shape_fn((2, 3, 3), |(_, i, j)| if i == j { 1.0 } else { 0.0 });
        let hmm = HmmEngine::new(a, b, uniform(3)).unwrap();
        let result = hmm.infer(&[1, 1]).unwrap();
        assert_eq!(result.posteriors, array![[0.0, 1.0, 0.0], [0.0, 1.0, 0.0]]);
        assert_eq!(result.calls, vec![1, 1]);
    }

    #[test]
    fn test_single_window_is_emission_posterior() {
        let hmm = engine(&[0.0], &[0.8], 6.0, 2);
        let result = hmm.infer(&[1]).unwrap();
        assert_floats_eq(result.posteriors.row(0).as_slice().unwrap(), &[0.2, 0.8], 1e-12);
        assert_eq!(result.calls, vec![1]);
        assert_float_eq(result.log_likelihood, 0.5f64.ln(), 1e-12);
    }

    #[test]
    fn test_isolated_error_is_smoothed() {
        // closely spaced windows with a single discordant call
        let pos: Vec<f64> = (0..9).map(|i| i as f64 * 0.01).collect();
        let hmm = engine(&pos, &[0.8; 9], 6.0, 3);
        let obs = [2, 2, 2, 2, 0, 2, 2, 2, 2];
        let result = hmm.infer(&obs).unwrap();
        assert_eq!(result.calls, vec![2; 9]);
        for row in result.posteriors.outer_iter() {
            assert_float_eq(row.sum(), 1.0, 1e-9);
            assert!(row.iter().all(|&p| p >= 0.0));
        }
    }

    #[test]
    fn test_distant_windows_keep_their_calls() {
        // exp(-11 / 100 * 10) is close to 1/3, so with three states the
        // windows are nearly independent
        let pos = [0.0, 11.0, 22.0];
        let hmm = engine(&pos, &[0.9; 3], 10.0, 3);
        assert_eq!(hmm.infer(&[0, 1, 2]).unwrap().calls, vec![0, 1, 2]);
    }

    #[test]
    fn test_inference_is_repeatable() {
        let pos: Vec<f64> = (0..20).map(|i| (i as f64).sqrt()).collect();
        let success: Vec<f64> = (0..20).map(|i| 0.5 + 0.02 * i as f64).collect();
        let hmm = engine(&pos, &success, 8.0, 3);
        let obs: Vec<usize> = (0..20).map(|i| (i * 7 / 5) % 3).collect();
        let first = hmm.infer(&obs).unwrap();
        let second = hmm.infer(&obs).unwrap();
        assert_eq!(first, second);
        assert_float_eq(hmm.log_likelihood(&obs).unwrap(), first.log_likelihood, 1e-12);
    }

    #[test]
    fn test_observation_errors() {
        let hmm = engine(&[0.0, 1.0], &[0.9, 0.9], 6.0, 2);
        assert!(matches!(hmm.infer(&[0]), Err(AncestryError::Data(_))));
        assert!(matches!(hmm.infer(&[0, 2]), Err(AncestryError::Data(_))));
    }

    #[test]
    fn test_impossible_observations() {
        let a: Array3<f64> = Array::eye(2).insert_axis(ndarray::Axis(0));
        let b = EmissionModelBuilder::new(2)
            .unwrap()
            .build(&[1.0, 1.0])
            .unwrap();
        let hmm = HmmEngine::new(a, b, uniform(2)).unwrap();
        assert!(matches!(hmm.infer(&[0, 1]), Err(AncestryError::Numeric(_))));
    }

    #[test]
    fn test_model_validation() {
        let b = EmissionModelBuilder::new(2).unwrap().build(&[0.9, 0.9]).unwrap();
        let bad_rows = array![[[0.5, 0.6], [0.5, 0.5]]];
        assert!(matches!(
            HmmEngine::new(bad_rows, b.clone(), uniform(2)),
            Err(AncestryError::Numeric(_))
        ));

        let wrong_count = Array3::from_elem((2, 2, 2), 0.5);
        assert!(matches!(
            HmmEngine::new(wrong_count, b.clone(), uniform(2)),
            Err(AncestryError::Configuration(_))
        ));

        let wrong_dim = Array3::from_elem((1, 3, 3), 1.0 / 3.0);
        assert!(matches!(
            HmmEngine::new(wrong_dim, b.clone(), uniform(2)),
            Err(AncestryError::Configuration(_))
        ));

        let a = Array3::from_elem((1, 2, 2), 0.5);
        assert!(matches!(
            HmmEngine::new(a.clone(), b.clone(), uniform(3)),
            Err(AncestryError::Configuration(_))
        ));
        assert!(matches!(
            HmmEngine::new(a, b, array![0.9, 0.9]),
            Err(AncestryError::Numeric(_))
        ));
    }
}
