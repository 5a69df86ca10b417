//! Fixed-schema patient records
//!
//! Column order is part of the model contract: the scaler and the classifier
//! see features exactly in the order of [`FEATURE_NAMES`].

use crate::core::{Dataset, Sample};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Number of feature columns feeding the model
pub const N_FEATURES: usize = 8;

/// Feature column names, in model order
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
    "Pregnancies",
    "Glucose",
    "BloodPressure",
    "SkinThickness",
    "Insulin",
    "BMI",
    "DiabetesPedigreeFunction",
    "Age",
];

/// Advisory input envelope for one feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureBounds {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

impl FeatureBounds {
    /// Clamp a value into `[min, max]`
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Realistic input envelope used by front-ends; the model itself scores
/// anything finite.
pub const ADVISORY_BOUNDS: [FeatureBounds; N_FEATURES] = [
    FeatureBounds {
        name: "Pregnancies",
        min: 0.0,
        max: 17.0,
        default: 1.0,
    },
    FeatureBounds {
        name: "Glucose",
        min: 50.0,
        max: 250.0,
        default: 120.0,
    },
    FeatureBounds {
        name: "BloodPressure",
        min: 20.0,
        max: 140.0,
        default: 70.0,
    },
    FeatureBounds {
        name: "SkinThickness",
        min: 0.0,
        max: 100.0,
        default: 23.0,
    },
    FeatureBounds {
        name: "Insulin",
        min: 0.0,
        max: 850.0,
        default: 80.0,
    },
    FeatureBounds {
        name: "BMI",
        min: 10.0,
        max: 70.0,
        default: 32.0,
    },
    FeatureBounds {
        name: "DiabetesPedigreeFunction",
        min: 0.05,
        max: 2.5,
        default: 0.47,
    },
    FeatureBounds {
        name: "Age",
        min: 21.0,
        max: 90.0,
        default: 33.0,
    },
];

/// The eight clinical measurements of one patient, in natural units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PatientFeatures {
    pub pregnancies: f64,
    /// mg/dL
    pub glucose: f64,
    /// mmHg
    pub blood_pressure: f64,
    /// mm
    pub skin_thickness: f64,
    /// µU/mL
    pub insulin: f64,
    /// kg/m²
    pub bmi: f64,
    pub diabetes_pedigree: f64,
    /// years
    pub age: f64,
}

impl PatientFeatures {
    pub fn from_array(values: [f64; N_FEATURES]) -> Self {
        Self {
            pregnancies: values[0],
            glucose: values[1],
            blood_pressure: values[2],
            skin_thickness: values[3],
            insulin: values[4],
            bmi: values[5],
            diabetes_pedigree: values[6],
            age: values[7],
        }
    }

    pub fn to_array(&self) -> [f64; N_FEATURES] {
        [
            self.pregnancies,
            self.glucose,
            self.blood_pressure,
            self.skin_thickness,
            self.insulin,
            self.bmi,
            self.diabetes_pedigree,
            self.age,
        ]
    }

    /// The documented default patient of the input form
    pub fn defaults() -> Self {
        Self::from_array(ADVISORY_BOUNDS.map(|b| b.default))
    }

    /// Clamp every feature into its advisory range
    ///
    /// Returns the clamped features and the names of the fields that moved.
    pub fn clamp_to_bounds(&self) -> (Self, Vec<&'static str>) {
        let raw = self.to_array();
        let mut clamped = raw;
        let mut adjusted = Vec::new();
        for (i, bounds) in ADVISORY_BOUNDS.iter().enumerate() {
            clamped[i] = bounds.clamp(raw[i]);
            if clamped[i] != raw[i] {
                adjusted.push(bounds.name);
            }
        }
        (Self::from_array(clamped), adjusted)
    }

    /// Name of the first non-finite feature, if any
    pub fn first_non_finite(&self) -> Option<&'static str> {
        self.to_array()
            .iter()
            .zip(FEATURE_NAMES.iter())
            .find(|(v, _)| !v.is_finite())
            .map(|(_, name)| *name)
    }
}

impl Default for PatientFeatures {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Binary diagnosis label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    NonDiabetic = 0,
    Diabetic = 1,
}

impl Outcome {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Outcome::NonDiabetic),
            1 => Some(Outcome::Diabetic),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Label in the solver's {-1, +1} convention
    pub fn as_svm_label(self) -> f64 {
        match self {
            Outcome::NonDiabetic => -1.0,
            Outcome::Diabetic => 1.0,
        }
    }

    pub fn from_svm_label(label: f64) -> Self {
        if label > 0.0 {
            Outcome::Diabetic
        } else {
            Outcome::NonDiabetic
        }
    }

    pub fn is_positive(self) -> bool {
        self == Outcome::Diabetic
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::NonDiabetic => write!(f, "Non-Diabetic"),
            Outcome::Diabetic => write!(f, "Diabetic"),
        }
    }
}

/// One labelled row of the dataset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub features: PatientFeatures,
    pub outcome: Outcome,
}

impl PatientRecord {
    pub fn new(features: PatientFeatures, outcome: Outcome) -> Self {
        Self { features, outcome }
    }

    pub fn to_sample(&self) -> Sample {
        Sample::new(
            self.features.to_array().to_vec(),
            self.outcome.as_svm_label(),
        )
    }
}

/// Where a dataset came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetOrigin {
    Remote(String),
    File(PathBuf),
    Synthetic { seed: u64 },
}

impl DatasetOrigin {
    pub fn is_synthetic(&self) -> bool {
        matches!(self, DatasetOrigin::Synthetic { .. })
    }
}

impl fmt::Display for DatasetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetOrigin::Remote(url) => write!(f, "remote ({url})"),
            DatasetOrigin::File(path) => write!(f, "file ({})", path.display()),
            DatasetOrigin::Synthetic { seed } => write!(f, "synthetic (seed {seed})"),
        }
    }
}

/// The Pima Indians diabetes table, or a stand-in with the same schema
#[derive(Debug, Clone)]
pub struct PimaDataset {
    records: Vec<PatientRecord>,
    origin: DatasetOrigin,
}

impl PimaDataset {
    pub fn new(records: Vec<PatientRecord>, origin: DatasetOrigin) -> Self {
        Self { records, origin }
    }

    pub fn records(&self) -> &[PatientRecord] {
        &self.records
    }

    pub fn origin(&self) -> &DatasetOrigin {
        &self.origin
    }

    /// Row-major feature matrix in model column order
    pub fn feature_matrix(&self) -> Vec<[f64; N_FEATURES]> {
        self.records.iter().map(|r| r.features.to_array()).collect()
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        self.records.iter().map(|r| r.outcome).collect()
    }

    /// Number of diabetic records
    pub fn positive_count(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_positive()).count()
    }
}

impl Dataset for PimaDataset {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn dim(&self) -> usize {
        N_FEATURES
    }

    fn get_sample(&self, i: usize) -> Sample {
        self.records[i].to_sample()
    }
}
