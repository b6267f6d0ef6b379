use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::AncestryError;
use crate::file::InputFile;
use crate::numeric::ROW_SUM_TOLERANCE;

/// Default number of generations since admixture.
pub const DEFAULT_N_GENS: f64 = 6.0;

/// Default number of ancestral populations.
pub const DEFAULT_N_CLASSES: usize = 2;

/// Belief over ancestry states at the first window, before its call is seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InitialBelief {
    /// Every state equally likely.
    #[default]
    Uniform,
    /// Explicit per-state probabilities, which must sum to one.
    Custom(Vec<f64>),
}

impl InitialBelief {
    /// The belief as a probability vector over `n_classes` states.
    pub fn to_vector(&self, n_classes: usize) -> Result<Array1<f64>, AncestryError> {
        match self {
            InitialBelief::Uniform => Ok(Array1::from_elem(n_classes, 1.0 / n_classes as f64)),
            InitialBelief::Custom(probs) => {
                if probs.len() != n_classes {
                    return Err(AncestryError::Configuration(format!(
                        "initial belief has {} entries but there are {} classes",
                        probs.len(),
                        n_classes
                    )));
                }
                let total: f64 = probs.iter().sum();
                if probs.iter().any(|&p| !p.is_finite() || p < 0.0)
                    || (total - 1.0).abs() > ROW_SUM_TOLERANCE
                {
                    return Err(AncestryError::Configuration(format!(
                        "initial belief {:?} is not a probability distribution",
                        probs
                    )));
                }
                Ok(Array1::from_vec(probs.clone()))
            }
        }
    }
}

/// Parameters of the HMM smoothing filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Generations since admixture.
    pub n_gens: f64,
    /// Number of ancestry states (classifier labels).
    pub n_classes: usize,
    pub initial_belief: InitialBelief,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            n_gens: DEFAULT_N_GENS,
            n_classes: DEFAULT_N_CLASSES,
            initial_belief: InitialBelief::Uniform,
        }
    }
}

impl FilterConfig {
    pub fn new(n_gens: f64, n_classes: usize) -> Self {
        Self {
            n_gens,
            n_classes,
            ..Default::default()
        }
    }

    /// Read a config from a JSON file; missing keys take their defaults.
    ///
    /// ```json
    /// { "n_gens": 10.0, "n_classes": 3, "initial_belief": "uniform" }
    /// ```
    pub fn from_json_file(filepath: &str) -> Result<Self, AncestryError> {
        let reader = InputFile::new(filepath).reader()?;
        let config: FilterConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every parameter is usable.
    pub fn validate(&self) -> Result<(), AncestryError> {
        if self.n_classes < 2 {
            return Err(AncestryError::Configuration(format!(
                "number of classes must be at least 2, got {}",
                self.n_classes
            )));
        }
        if !(self.n_gens.is_finite() && self.n_gens > 0.0) {
            return Err(AncestryError::Configuration(format!(
                "generations since admixture must be a positive number, got {}",
                self.n_gens
            )));
        }
        self.initial_belief.to_vector(self.n_classes)?;
        Ok(())
    }
}
