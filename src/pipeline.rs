//! Fit-once risk scoring pipeline
//!
//! A fit standardizes the full feature matrix, holds out a stratified test
//! partition, trains a linear SVM on the rest and calibrates its margin with
//! Platt scaling. The result is immutable and shared behind an `Arc`;
//! [`ModelCell`] makes sure a process fits it at most once.

use crate::api::{EvaluationMetrics, SVM};
use crate::calibration::PlattScaling;
use crate::config::PipelineConfig;
use crate::core::{Dataset, Prediction, Result, RiskError, SVMModel, Sample};
use crate::data::{DatasetOrigin, Outcome, PatientFeatures, PimaDataset, FEATURE_NAMES};
use crate::optimizer::LinearModel;
use crate::utils::scaling::FeatureScaler;
use crate::utils::split::stratified_split;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Score for one patient
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: Outcome,
    pub probability_positive: f64,
    pub probability_negative: f64,
    /// Raw SVM margin before calibration
    pub decision_value: f64,
}

impl PredictionResult {
    /// Label from the classifier's margin, probabilities from the calibration
    fn new(prediction: Prediction, platt: &PlattScaling) -> Self {
        let probability_positive = platt.probability(prediction.decision_value);
        Self {
            label: Outcome::from_svm_label(prediction.label),
            probability_positive,
            probability_negative: 1.0 - probability_positive,
            decision_value: prediction.decision_value,
        }
    }

    /// Headline shown to the user
    pub fn verdict(&self) -> &'static str {
        match self.label {
            Outcome::Diabetic => "Diabetic — High Risk",
            Outcome::NonDiabetic => "Non-Diabetic — Low Risk",
        }
    }
}

/// Serializable description of a fitted pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub origin: DatasetOrigin,
    pub n_records: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub n_features: usize,
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    pub test_metrics: EvaluationMetrics,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub specificity: f64,
    pub n_support_vectors: usize,
    pub iterations: usize,
    pub platt_a: f64,
    pub feature_names: Vec<String>,
    /// Weights in standardized feature space
    pub weights: Vec<f64>,
    pub bias: f64,
    pub fitted_at: DateTime<Utc>,
}

/// Scaler, classifier and calibration fitted together
#[derive(Debug, Clone)]
pub struct FittedPipeline {
    scaler: FeatureScaler,
    model: LinearModel,
    platt: PlattScaling,
    train_metrics: EvaluationMetrics,
    test_metrics: EvaluationMetrics,
    iterations: usize,
    origin: DatasetOrigin,
    fitted_at: DateTime<Utc>,
}

/// Entry point for fitting
pub struct Pipeline;

impl Pipeline {
    /// Fit the full pipeline on a dataset
    pub fn fit(dataset: &PimaDataset, config: &PipelineConfig) -> Result<FittedPipeline> {
        config.validate()?;
        if dataset.is_empty() {
            return Err(RiskError::EmptyDataset);
        }

        let features = dataset.feature_matrix();
        let labels: Vec<bool> = dataset.outcomes().iter().map(|o| o.is_positive()).collect();

        let scaler = FeatureScaler::fit(&features)?;
        let scaled = scaler.transform_rows(&features)?;

        let split = stratified_split(&labels, config.test_fraction, config.split_seed)?;
        let to_samples = |indices: &[usize]| -> Vec<Sample> {
            indices
                .iter()
                .map(|&i| Sample::new(scaled[i].clone(), if labels[i] { 1.0 } else { -1.0 }))
                .collect()
        };
        let train = to_samples(&split.train);
        let test = to_samples(&split.test);
        debug!(
            "Split {} records into {} train / {} test",
            dataset.len(),
            train.len(),
            test.len()
        );

        let trained = SVM::new()
            .with_config(config.optimizer.clone())
            .with_calibration(config.calibration_folds, config.calibration_seed)
            .train_samples(&train)
            .map_err(into_fit_failure)?;

        let info = trained.info();
        if !info.converged {
            return Err(RiskError::FitFailure(format!(
                "solver did not converge within {} iterations",
                config.optimizer.max_iterations
            )));
        }
        let platt = trained
            .platt()
            .ok_or_else(|| RiskError::FitFailure("probability calibration missing".to_string()))?;

        let mut pipeline = FittedPipeline {
            scaler,
            model: trained.inner().to_linear(),
            platt,
            train_metrics: EvaluationMetrics::default(),
            test_metrics: EvaluationMetrics::default(),
            iterations: info.iterations,
            origin: dataset.origin().clone(),
            fitted_at: Utc::now(),
        };
        pipeline.train_metrics = pipeline.evaluate_scaled(&train);
        pipeline.test_metrics = pipeline.evaluate_scaled(&test);

        let test_accuracy = pipeline.test_accuracy();
        if let Some(threshold) = config.min_test_accuracy {
            if test_accuracy < threshold {
                return Err(RiskError::FitFailure(format!(
                    "holdout accuracy {test_accuracy:.4} is below the required {threshold:.4}"
                )));
            }
        }

        info!(
            "Fitted on {} ({} records): train accuracy {:.2}%, test accuracy {:.2}%, {} support vectors, {} iterations",
            pipeline.origin,
            dataset.len(),
            pipeline.train_accuracy() * 100.0,
            test_accuracy * 100.0,
            pipeline.model.n_support_vectors,
            pipeline.iterations
        );
        debug!("Platt scaling A={:.6}", platt.a);

        Ok(pipeline)
    }
}

fn into_fit_failure(err: RiskError) -> RiskError {
    match err {
        RiskError::InvalidDataset(message) | RiskError::OptimizationError(message) => {
            RiskError::FitFailure(message)
        }
        other => other,
    }
}

impl FittedPipeline {
    /// Score one patient
    ///
    /// Finite values outside the advisory bounds are scored as given.
    pub fn predict(&self, features: &PatientFeatures) -> Result<PredictionResult> {
        if let Some(name) = features.first_non_finite() {
            return Err(RiskError::MalformedInput(format!(
                "{name} must be a finite number"
            )));
        }

        let scaled = self.scaler.transform(&features.to_array())?;
        Ok(self.score_scaled(&scaled))
    }

    /// Score many patients, failing on the first malformed one
    pub fn predict_batch(&self, batch: &[PatientFeatures]) -> Result<Vec<PredictionResult>> {
        batch.iter().map(|features| self.predict(features)).collect()
    }

    fn score_scaled(&self, scaled: &[f64]) -> PredictionResult {
        let prediction = Prediction::from_decision_value(self.model.decision_function(scaled));
        PredictionResult::new(prediction, &self.platt)
    }

    fn evaluate_scaled(&self, samples: &[Sample]) -> EvaluationMetrics {
        let predicted: Vec<bool> = samples
            .iter()
            .map(|s| self.score_scaled(&s.features).label.is_positive())
            .collect();
        let actual: Vec<bool> = samples.iter().map(Sample::is_positive).collect();
        EvaluationMetrics::from_labels(&predicted, &actual)
    }

    /// Fraction of training rows the classifier labels correctly
    pub fn train_accuracy(&self) -> f64 {
        self.train_metrics.accuracy()
    }

    /// Fraction of holdout rows the classifier labels correctly
    pub fn test_accuracy(&self) -> f64 {
        self.test_metrics.accuracy()
    }

    pub fn train_metrics(&self) -> &EvaluationMetrics {
        &self.train_metrics
    }

    pub fn test_metrics(&self) -> &EvaluationMetrics {
        &self.test_metrics
    }

    pub fn scaler(&self) -> &FeatureScaler {
        &self.scaler
    }

    pub fn model(&self) -> &LinearModel {
        &self.model
    }

    pub fn platt(&self) -> &PlattScaling {
        &self.platt
    }

    pub fn origin(&self) -> &DatasetOrigin {
        &self.origin
    }

    pub fn summary(&self) -> ModelSummary {
        let test = &self.test_metrics;
        let n_train = self.train_metrics.total();
        let n_test = test.total();

        ModelSummary {
            origin: self.origin.clone(),
            n_records: n_train + n_test,
            n_train,
            n_test,
            n_features: self.scaler.dim(),
            train_accuracy: self.train_accuracy(),
            test_accuracy: self.test_accuracy(),
            test_metrics: *test,
            precision: test.precision(),
            recall: test.recall(),
            f1_score: test.f1_score(),
            specificity: test.specificity(),
            n_support_vectors: self.model.n_support_vectors,
            iterations: self.iterations,
            platt_a: self.platt.a,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            weights: self.model.weights.clone(),
            bias: self.model.bias,
            fitted_at: self.fitted_at,
        }
    }
}

/// Lifecycle of a [`ModelCell`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Unfit,
    Ready,
}

/// Holds at most one fitted pipeline for the life of the process
///
/// Concurrent first callers serialize on an init lock so the fit runs once;
/// afterwards every caller gets a clone of the same `Arc` without locking.
#[derive(Debug, Default)]
pub struct ModelCell {
    pipeline: OnceLock<Arc<FittedPipeline>>,
    init: Mutex<()>,
}

impl ModelCell {
    pub const fn new() -> Self {
        Self {
            pipeline: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    pub fn state(&self) -> PipelineState {
        if self.pipeline.get().is_some() {
            PipelineState::Ready
        } else {
            PipelineState::Unfit
        }
    }

    pub fn get(&self) -> Option<Arc<FittedPipeline>> {
        self.pipeline.get().cloned()
    }

    /// Return the cached pipeline, running `fit` if there is none yet
    ///
    /// A failed fit leaves the cell unfit so a later call may retry.
    pub fn get_or_fit<F>(&self, fit: F) -> Result<Arc<FittedPipeline>>
    where
        F: FnOnce() -> Result<FittedPipeline>,
    {
        if let Some(pipeline) = self.pipeline.get() {
            return Ok(Arc::clone(pipeline));
        }

        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pipeline) = self.pipeline.get() {
            return Ok(Arc::clone(pipeline));
        }

        let pipeline = Arc::new(fit()?);
        Ok(Arc::clone(self.pipeline.get_or_init(|| pipeline)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{synthetic, PatientRecord};
    use approx::assert_abs_diff_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// Small separable table: risk driven by glucose and BMI
    fn signal_dataset(rows: usize) -> PimaDataset {
        let records = (0..rows)
            .map(|i| {
                let t = i as f64 / rows as f64;
                let glucose = 80.0 + 120.0 * t;
                let bmi = 22.0 + 20.0 * ((i * 7) % rows) as f64 / rows as f64;
                let features = PatientFeatures::from_array([
                    (i % 6) as f64,
                    glucose,
                    60.0 + (i % 20) as f64,
                    20.0 + (i % 15) as f64,
                    (i * 13 % 200) as f64,
                    bmi,
                    0.2 + (i % 10) as f64 * 0.1,
                    21.0 + (i % 40) as f64,
                ]);
                let score = (glucose - 140.0) / 30.0 + (bmi - 32.0) / 10.0;
                let outcome = if score > 0.0 {
                    Outcome::Diabetic
                } else {
                    Outcome::NonDiabetic
                };
                PatientRecord::new(features, outcome)
            })
            .collect();
        PimaDataset::new(records, DatasetOrigin::Synthetic { seed: 0 })
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            calibration_folds: 3,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_fit_on_signal_reaches_high_accuracy() {
        let dataset = signal_dataset(120);
        let pipeline = Pipeline::fit(&dataset, &fast_config()).expect("fit");

        assert!(pipeline.train_accuracy() > 0.9);
        assert!(pipeline.test_accuracy() > 0.8);
        assert_eq!(pipeline.train_metrics().total(), 96);
        assert_eq!(pipeline.test_metrics().total(), 24);
        assert!(pipeline.platt().a < 0.0);
    }

    #[test]
    fn test_probabilities_are_complementary_and_consistent() {
        let pipeline = Pipeline::fit(&signal_dataset(120), &fast_config()).expect("fit");

        for glucose in [60.0, 100.0, 140.0, 180.0, 240.0] {
            let features = PatientFeatures {
                glucose,
                ..PatientFeatures::defaults()
            };
            let result = pipeline.predict(&features).expect("predict");
            assert_abs_diff_eq!(
                result.probability_positive + result.probability_negative,
                1.0,
                epsilon = 1e-9
            );
            assert_eq!(
                result.label == Outcome::Diabetic,
                result.probability_positive > result.probability_negative
            );
        }
    }

    #[test]
    fn test_predict_rejects_non_finite_input() {
        let pipeline = Pipeline::fit(&signal_dataset(60), &fast_config()).expect("fit");
        let features = PatientFeatures {
            insulin: f64::INFINITY,
            ..PatientFeatures::defaults()
        };

        match pipeline.predict(&features) {
            Err(RiskError::MalformedInput(message)) => assert!(message.contains("Insulin")),
            other => panic!("expected malformed input, got {other:?}"),
        }
        assert!(pipeline
            .predict_batch(&[PatientFeatures::defaults(), features])
            .is_err());
    }

    #[test]
    fn test_single_class_dataset_is_a_fit_failure() {
        let records = (0..30)
            .map(|i| {
                let mut features = PatientFeatures::defaults();
                features.glucose += i as f64;
                PatientRecord::new(features, Outcome::NonDiabetic)
            })
            .collect();
        let dataset = PimaDataset::new(records, DatasetOrigin::Synthetic { seed: 0 });

        assert!(matches!(
            Pipeline::fit(&dataset, &fast_config()),
            Err(RiskError::FitFailure(_))
        ));
    }

    #[test]
    fn test_non_convergence_is_a_fit_failure() {
        let mut config = fast_config();
        config.optimizer.max_iterations = 1;

        match Pipeline::fit(&synthetic::generate(200, 3), &config) {
            Err(RiskError::FitFailure(message)) => {
                assert!(message.contains("calibration fold"), "{message}")
            }
            other => panic!("expected fit failure, got {other:?}"),
        }

        config.calibration_folds = 0;
        match Pipeline::fit(&synthetic::generate(200, 3), &config) {
            Err(RiskError::FitFailure(message)) => assert!(message.contains("solver"), "{message}"),
            other => panic!("expected fit failure, got {other:?}"),
        }
    }

    #[test]
    fn test_accuracy_gate() {
        let dataset = signal_dataset(120);
        let mut config = fast_config();

        config.min_test_accuracy = Some(0.5);
        assert!(Pipeline::fit(&dataset, &config).is_ok());

        config.min_test_accuracy = Some(1.0);
        let noisy = synthetic::generate(200, 5);
        assert!(matches!(
            Pipeline::fit(&noisy, &config),
            Err(RiskError::FitFailure(_))
        ));
    }

    #[test]
    fn test_empty_dataset() {
        let dataset = PimaDataset::new(Vec::new(), DatasetOrigin::Synthetic { seed: 0 });
        assert!(matches!(
            Pipeline::fit(&dataset, &fast_config()),
            Err(RiskError::EmptyDataset)
        ));
    }

    #[test]
    fn test_summary() {
        let dataset = signal_dataset(120);
        let pipeline = Pipeline::fit(&dataset, &fast_config()).expect("fit");
        let summary = pipeline.summary();

        assert_eq!(summary.n_records, 120);
        assert_eq!(summary.n_train + summary.n_test, 120);
        assert_eq!(summary.n_features, 8);
        assert_eq!(summary.weights.len(), 8);
        assert_eq!(summary.feature_names[1], "Glucose");
        assert_eq!(summary.origin, DatasetOrigin::Synthetic { seed: 0 });
        // Glucose drives the label, so its weight must push toward the positive class
        assert!(summary.weights[1] > 0.0);

        let json = serde_json::to_string(&summary).expect("serialize");
        assert!(json.contains("\"test_accuracy\""));
        assert!(json.contains("\"fitted_at\""));
    }

    #[test]
    fn test_verdict_text() {
        let platt = PlattScaling { a: -1.5 };
        let high = PredictionResult::new(Prediction::from_decision_value(1.2), &platt);
        let low = PredictionResult::new(Prediction::from_decision_value(0.0), &platt);
        assert_eq!(high.verdict(), "Diabetic — High Risk");
        assert!(high.probability_positive > 0.5);
        assert_eq!(low.label, Outcome::NonDiabetic);
        assert_eq!(low.probability_positive, 0.5);
        assert_eq!(low.verdict(), "Non-Diabetic — Low Risk");
    }

    #[test]
    fn test_model_cell_fits_once() {
        let cell = ModelCell::new();
        let calls = AtomicUsize::new(0);
        let dataset = signal_dataset(60);
        assert_eq!(cell.state(), PipelineState::Unfit);

        let fit = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Pipeline::fit(&dataset, &fast_config())
        };
        let first = cell.get_or_fit(fit).expect("fit");
        let second = cell.get_or_fit(fit).expect("fit");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cell.state(), PipelineState::Ready);
    }

    #[test]
    fn test_model_cell_concurrent_first_use() {
        let cell = ModelCell::new();
        let calls = AtomicUsize::new(0);
        let dataset = signal_dataset(60);

        let pipelines: Vec<Arc<FittedPipeline>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        cell.get_or_fit(|| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Pipeline::fit(&dataset, &fast_config())
                        })
                        .expect("fit")
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().expect("join")).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(pipelines.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_model_cell_failed_fit_stays_unfit() {
        let cell = ModelCell::new();
        let result = cell.get_or_fit(|| Err(RiskError::FitFailure("boom".to_string())));

        assert!(result.is_err());
        assert_eq!(cell.state(), PipelineState::Unfit);
        assert!(cell.get().is_none());
    }
}
