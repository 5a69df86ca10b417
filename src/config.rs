//! Loader and pipeline configuration

use crate::core::{OptimizerConfig, Result, RiskError};
use crate::data::synthetic;
use std::path::PathBuf;
use std::time::Duration;

/// Public copy of the Pima Indians diabetes table
pub const DEFAULT_DATASET_URL: &str =
    "https://raw.githubusercontent.com/jbrownlee/Datasets/master/pima-indians-diabetes.csv";

/// Where the dataset comes from and what replaces it when unavailable
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub url: String,
    pub timeout: Duration,
    /// Skip the network and use the synthetic table
    pub offline: bool,
    /// Read a local CSV file instead of the URL
    pub file: Option<PathBuf>,
    pub synthetic_seed: u64,
    pub synthetic_rows: usize,
    /// Reject a fetched table whose row count differs
    pub expected_rows: Option<usize>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATASET_URL.to_string(),
            timeout: Duration::from_secs(10),
            offline: false,
            file: None,
            synthetic_seed: synthetic::DEFAULT_SEED,
            synthetic_rows: synthetic::DEFAULT_ROWS,
            expected_rows: None,
        }
    }
}

/// Everything that shapes a fitted pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub optimizer: OptimizerConfig,
    /// Fraction of rows held out for accuracy reporting
    pub test_fraction: f64,
    pub split_seed: u64,
    /// Folds used to produce out-of-sample margins for Platt scaling;
    /// below 2 the in-sample margins are used
    pub calibration_folds: usize,
    pub calibration_seed: u64,
    /// Fail the fit when holdout accuracy falls below this
    pub min_test_accuracy: Option<f64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            optimizer: OptimizerConfig::default(),
            test_fraction: 0.2,
            split_seed: 2,
            calibration_folds: 5,
            calibration_seed: 0,
            min_test_accuracy: None,
        }
    }
}

impl PipelineConfig {
    /// Check parameter ranges before any work is done
    pub fn validate(&self) -> Result<()> {
        let c = self.optimizer.c;
        if !(c.is_finite() && c > 0.0) {
            return Err(RiskError::InvalidParameter(format!("C must be positive, got {c}")));
        }
        let epsilon = self.optimizer.epsilon;
        if !(epsilon.is_finite() && epsilon > 0.0) {
            return Err(RiskError::InvalidParameter(format!(
                "epsilon must be positive, got {epsilon}"
            )));
        }
        if self.optimizer.max_iterations == 0 {
            return Err(RiskError::InvalidParameter(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(RiskError::InvalidParameter(format!(
                "test fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if let Some(threshold) = self.min_test_accuracy {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(RiskError::InvalidParameter(format!(
                    "minimum test accuracy must be in [0, 1], got {threshold}"
                )));
            }
        }
        Ok(())
    }
}
