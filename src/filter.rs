//! Post-classification filters over whole call matrices.
//!
//! [`CallFilter`] is the seam between the upstream window classifier and
//! whatever cleans up its calls; [`HmmFilter`] is the genetic-map-aware
//! forward-backward implementation.

use log::{debug, info};
use ndarray::{s, Array2, Array3, ArrayView1, ArrayView2};
use rayon::prelude::*;

use crate::config::FilterConfig;
use crate::error::AncestryError;
use crate::genetic_map::{GeneticMap, Position};
use crate::hmm::{HmmEngine, Inference};
use crate::model::{EmissionModelBuilder, TransitionModelBuilder};
use crate::windows::window_genetic_positions;

/// Smoothed output for a whole `W x S` call matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedCalls {
    /// `W x S` smoothed calls, oriented like the raw calls.
    pub calls: Array2<usize>,
    /// `S x W x n_classes` posteriors, if requested.
    pub posteriors: Option<Array3<f64>>,
    /// Per-sample log-likelihood of the raw calls.
    pub log_likelihoods: Vec<f64>,
}

impl SmoothedCalls {
    /// Number of entries that differ from `raw_calls`.
    pub fn n_changed(&self, raw_calls: ArrayView2<usize>) -> usize {
        self.calls
            .iter()
            .zip(raw_calls.iter())
            .filter(|(a, b)| a != b)
            .count()
    }
}

/// Anything that turns a matrix of noisy per-window calls into cleaned calls.
pub trait CallFilter {
    /// Filter `raw_calls` (`W` windows by `S` samples).
    ///
    /// # Arguments
    ///  * `snp_positions`: strictly increasing physical positions of every SNP
    ///      used by the classifier; consecutive runs of them form the windows.
    ///  * `success_rate`: the classifier's estimated accuracy in each window.
    ///  * `raw_calls`: the classifier's calls, one row per window.
    fn filter(
        &self,
        snp_positions: &[Position],
        success_rate: &[f64],
        raw_calls: ArrayView2<usize>,
    ) -> Result<SmoothedCalls, AncestryError>;
}

/// Forward-backward smoothing with transitions driven by genetic distance.
#[derive(Debug, Clone)]
pub struct HmmFilter {
    genetic_map: GeneticMap,
    config: FilterConfig,
    keep_posteriors: bool,
}

fn for_sample(err: AncestryError, sample: usize) -> AncestryError {
    match err {
        AncestryError::Data(msg) => AncestryError::Data(format!("sample {}: {}", sample, msg)),
        AncestryError::Numeric(msg) => {
            AncestryError::Numeric(format!("sample {}: {}", sample, msg))
        }
        other => other,
    }
}

impl HmmFilter {
    pub fn new(genetic_map: GeneticMap, config: FilterConfig) -> Result<Self, AncestryError> {
        config.validate()?;
        Ok(Self {
            genetic_map,
            config,
            keep_posteriors: false,
        })
    }

    /// Create a filter, reading the genetic map from `filepath`.
    pub fn from_genetic_map_file(
        filepath: &str,
        config: FilterConfig,
    ) -> Result<Self, AncestryError> {
        Self::new(GeneticMap::from_file(filepath)?, config)
    }

    /// Keep the per-sample posterior tables in the output.
    pub fn with_posteriors(mut self, keep: bool) -> Self {
        self.keep_posteriors = keep;
        self
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn genetic_map(&self) -> &GeneticMap {
        &self.genetic_map
    }

    /// Build the shared HMM for `n_windows` windows.
    pub fn build_engine(
        &self,
        snp_positions: &[Position],
        success_rate: &[f64],
        n_windows: usize,
    ) -> Result<HmmEngine, AncestryError> {
        if success_rate.len() != n_windows {
            return Err(AncestryError::Data(format!(
                "{} success rates given for {} windows",
                success_rate.len(),
                n_windows
            )));
        }
        let window_pos = window_genetic_positions(&self.genetic_map, snp_positions, n_windows)?;
        let transitions = TransitionModelBuilder::new(self.config.n_gens, self.config.n_classes)?
            .build(&window_pos)?;
        let emissions = EmissionModelBuilder::new(self.config.n_classes)?.build(success_rate)?;
        let initial = self.config.initial_belief.to_vector(self.config.n_classes)?;
        HmmEngine::new(transitions, emissions, initial)
    }
}

impl CallFilter for HmmFilter {
    fn filter(
        &self,
        snp_positions: &[Position],
        success_rate: &[f64],
        raw_calls: ArrayView2<usize>,
    ) -> Result<SmoothedCalls, AncestryError> {
        let (n_windows, n_samples) = raw_calls.dim();
        let engine = self.build_engine(snp_positions, success_rate, n_windows)?;
        debug!(
            "smoothing {} samples over {} windows with {} classes",
            n_samples, n_windows, self.config.n_classes
        );

        let inferences: Vec<Inference> = (0..n_samples)
            .into_par_iter()
            .map(|sample| {
                let observations = raw_calls.column(sample).to_vec();
                engine
                    .infer(&observations)
                    .map_err(|e| for_sample(e, sample))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut calls = Array2::<usize>::zeros((n_windows, n_samples));
        let mut posteriors = self
            .keep_posteriors
            .then(|| Array3::<f64>::zeros((n_samples, n_windows, self.config.n_classes)));
        let mut log_likelihoods = Vec::with_capacity(n_samples);
        for (sample, inference) in inferences.into_iter().enumerate() {
            calls
                .column_mut(sample)
                .assign(&ArrayView1::from(&inference.calls));
            if let Some(posteriors) = posteriors.as_mut() {
                posteriors
                    .slice_mut(s![sample, .., ..])
                    .assign(&inference.posteriors);
            }
            log_likelihoods.push(inference.log_likelihood);
        }

        let smoothed = SmoothedCalls {
            calls,
            posteriors,
            log_likelihoods,
        };
        info!(
            "smoothed {} samples x {} windows; {} calls changed",
            n_samples,
            n_windows,
            smoothed.n_changed(raw_calls)
        );
        Ok(smoothed)
    }
}
