//! Seeded stand-in for the Pima table
//!
//! Columns are drawn independently and the outcome is a fair coin, so the
//! table has the right schema and ranges but no real signal.

use super::record::{DatasetOrigin, Outcome, PatientFeatures, PatientRecord, PimaDataset};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seed used by the loader fallback
pub const DEFAULT_SEED: u64 = 42;

/// Row count of the real table, used by the loader fallback
pub const DEFAULT_ROWS: usize = 768;

/// Generate `rows` synthetic records from `seed`
pub fn generate(rows: usize, seed: u64) -> PimaDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let records = (0..rows).map(|_| random_record(&mut rng)).collect();
    PimaDataset::new(records, DatasetOrigin::Synthetic { seed })
}

fn random_record(rng: &mut StdRng) -> PatientRecord {
    let features = PatientFeatures {
        pregnancies: rng.gen_range(0..17) as f64,
        glucose: rng.gen_range(70..200) as f64,
        blood_pressure: rng.gen_range(40..122) as f64,
        skin_thickness: rng.gen_range(0..99) as f64,
        insulin: rng.gen_range(0..846) as f64,
        bmi: round_to(rng.gen_range(18.0..67.0), 1),
        diabetes_pedigree: round_to(rng.gen_range(0.07..2.4), 3),
        age: rng.gen_range(21..81) as f64,
    };
    let outcome = if rng.gen_bool(0.5) {
        Outcome::Diabetic
    } else {
        Outcome::NonDiabetic
    };

    PatientRecord::new(features, outcome)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Dataset;

    #[test]
    fn test_generate_shape_and_origin() {
        let dataset = generate(DEFAULT_ROWS, DEFAULT_SEED);
        assert_eq!(dataset.len(), 768);
        assert_eq!(dataset.origin(), &DatasetOrigin::Synthetic { seed: 42 });
    }

    #[test]
    fn test_generate_is_deterministic() {
        let first = generate(50, 7);
        let second = generate(50, 7);
        let other = generate(50, 8);

        assert_eq!(first.records(), second.records());
        assert_ne!(first.records(), other.records());
    }

    #[test]
    fn test_generated_values_stay_in_range() {
        let dataset = generate(DEFAULT_ROWS, DEFAULT_SEED);
        for record in dataset.records() {
            let f = &record.features;
            assert!((0.0..17.0).contains(&f.pregnancies));
            assert!((70.0..200.0).contains(&f.glucose));
            assert!((40.0..122.0).contains(&f.blood_pressure));
            assert!((0.0..99.0).contains(&f.skin_thickness));
            assert!((0.0..846.0).contains(&f.insulin));
            assert!((18.0..=67.0).contains(&f.bmi));
            assert!((0.07..=2.4).contains(&f.diabetes_pedigree));
            assert!((21.0..81.0).contains(&f.age));
            assert_eq!(f.pregnancies.fract(), 0.0);
            assert_eq!(round_to(f.bmi, 1), f.bmi);
        }
    }

    #[test]
    fn test_generate_has_both_classes() {
        let dataset = generate(DEFAULT_ROWS, DEFAULT_SEED);
        let positives = dataset.positive_count();
        assert!(positives > 300 && positives < 468, "positives = {positives}");
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(32.04, 1), 32.0);
        assert_eq!(round_to(1.23456, 3), 1.235);
    }
}
